//! # Process entry points.
//!
//! The same executable plays every role. [`dispatch`] is called first thing in
//! `main`: in a process spawned as a unit it serves the unit runtime over
//! stdin/stdout and exits; in the root process it returns immediately.
//!
//! ```rust,no_run
//! use legion::{Legion, LegionOptions, TaskFn, TaskRegistry, TaskSource};
//!
//! #[tokio::main]
//! async fn main() {
//!     legion::init_tracing();
//!     let registry = TaskRegistry::new().with(TaskFn::arc("crunch", |ctx, _payload| async move {
//!         ctx.done(Ok(()));
//!     }));
//!     legion::dispatch(&registry).await;
//!
//!     let mut options = LegionOptions::default();
//!     options.pool.task = Some(TaskSource::registered("crunch"));
//!     let code = match Legion::new(options).with_registry(registry).run(serde_json::Value::Null).await {
//!         Ok(code) => code,
//!         Err(e) => {
//!             eprintln!("cannot start: {e}");
//!             2
//!         }
//!     };
//!     std::process::exit(code);
//! }
//! ```
//!
//! Logging always goes to stderr: stdout carries the envelope stream of units.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use crate::core::wait_for_shutdown_signal;
use crate::envelope::{codec, Role};
use crate::group::GroupRuntime;
use crate::process::{CommandSpawner, ROLE_ENV};
use crate::tasks::TaskRegistry;
use crate::worker::WorkerRuntime;

/// Role this process was spawned as, if any.
pub fn unit_role() -> Option<Role> {
    match std::env::var(ROLE_ENV).ok().map(|role| Role::parse(&role)) {
        Some(role @ (Role::Worker | Role::Group)) => Some(role),
        _ => None,
    }
}

/// Runs the unit runtime when this process was spawned as a unit, then exits.
///
/// Returns without doing anything in the root process.
pub async fn dispatch(registry: &TaskRegistry) {
    let Some(role) = unit_role() else {
        return;
    };
    let code = serve_stdio(role, Arc::new(registry.clone())).await;
    std::process::exit(code);
}

/// Serves the runtime of `role` over this process's stdin/stdout.
///
/// Returns the exit code once the runtime is done and stdout is flushed.
pub async fn serve_stdio(role: Role, registry: Arc<TaskRegistry>) -> i32 {
    let (outbound, pending) = mpsc::unbounded_channel();
    let closing = CancellationToken::new();
    let writer = tokio::spawn(codec::write_envelopes(
        tokio::io::stdout(),
        pending,
        closing.clone(),
    ));
    let inbound = codec::read_envelopes(tokio::io::stdin());

    tracing::debug!(role = %role, pid = std::process::id(), "unit runtime starting");
    let code = match role {
        Role::Group => {
            GroupRuntime::new(registry, Arc::new(CommandSpawner::new()), outbound)
                .with_os_signals(true)
                .run(inbound)
                .await
        }
        _ => {
            let mut worker = WorkerRuntime::new(registry, outbound);
            tokio::select! {
                code = worker.run(inbound) => code,
                signal = terminated() => {
                    tracing::info!(signal, "termination signal received");
                    1
                }
            }
        }
    };

    closing.cancel();
    let _ = writer.await;
    tracing::debug!(role = %role, code, "unit runtime finished");
    code
}

async fn terminated() -> &'static str {
    match wait_for_shutdown_signal().await {
        Ok(signal) => signal,
        Err(e) => {
            tracing::warn!(error = %e, "cannot listen for termination signals");
            std::future::pending().await
        }
    }
}

/// Installs a `tracing` subscriber writing to stderr.
///
/// The filter comes from `RUST_LOG` and defaults to `info`. Does nothing if a
/// global subscriber is already set.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
