//! # Task abstraction.
//!
//! This module defines the [`Task`] trait executed by leaf workers. The common
//! handle type is [`TaskRef`], an `Arc<dyn Task>` suitable for registration.
//!
//! A task receives a [`WorkerContext`] and the start payload. It reports progress
//! with [`WorkerContext::emit`] and finishes with [`WorkerContext::done`]. A task
//! that never calls `done` keeps its worker alive until the parent kills it.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::worker::WorkerContext;

/// Shared handle to a task.
pub type TaskRef = Arc<dyn Task>;

/// # Work executed exactly once per leaf worker.
///
/// # Example
/// ```
/// use async_trait::async_trait;
/// use serde_json::Value;
/// use legion::{Task, WorkerContext};
///
/// struct Crunch;
///
/// #[async_trait]
/// impl Task for Crunch {
///     fn name(&self) -> &str { "crunch" }
///
///     async fn run(&self, ctx: WorkerContext, payload: Value) {
///         let _ = ctx.emit("crunching", payload);
///         ctx.done(Ok(()));
///     }
/// }
/// ```
#[async_trait]
pub trait Task: Send + Sync + 'static {
    /// Stable name the task is registered under.
    fn name(&self) -> &str;

    /// Executes the task.
    async fn run(&self, ctx: WorkerContext, payload: Value);
}
