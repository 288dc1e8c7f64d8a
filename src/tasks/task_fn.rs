//! # Function-backed task (`TaskFn`)
//!
//! [`TaskFn`] wraps a closure `F: Fn(WorkerContext, Value) -> Fut`, producing a
//! fresh future per run. Shared state, if any, goes in an explicit `Arc` inside
//! the closure.
//!
//! ## Example
//! ```rust
//! use legion::{TaskFn, TaskRef};
//!
//! let t: TaskRef = TaskFn::arc("hello", |ctx, _payload| async move {
//!     let _ = ctx.emit("hello", "world");
//!     ctx.done(Ok(()));
//! });
//! assert_eq!(t.name(), "hello");
//! ```

use std::borrow::Cow;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use super::task::Task;
use crate::worker::WorkerContext;

/// Function-backed task implementation.
#[derive(Debug)]
pub struct TaskFn<F> {
    name: Cow<'static, str>,
    f: F,
}

impl<F> TaskFn<F> {
    /// Creates a new function-backed task.
    ///
    /// Prefer [`TaskFn::arc`] when you immediately need a [`TaskRef`](super::TaskRef).
    pub fn new<Fut>(name: impl Into<Cow<'static, str>>, f: F) -> Self
    where
        F: Fn(WorkerContext, Value) -> Fut,
        Fut: Future<Output = ()>,
    {
        Self {
            name: name.into(),
            f,
        }
    }

    /// Creates the task and returns it as a shared handle.
    pub fn arc<Fut>(name: impl Into<Cow<'static, str>>, f: F) -> Arc<Self>
    where
        F: Fn(WorkerContext, Value) -> Fut,
        Fut: Future<Output = ()>,
    {
        Arc::new(Self::new(name, f))
    }
}

#[async_trait]
impl<F, Fut> Task for TaskFn<F>
where
    F: Fn(WorkerContext, Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, ctx: WorkerContext, payload: Value) {
        (self.f)(ctx, payload).await
    }
}
