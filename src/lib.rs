//! # legion
//!
//! **Legion** supervises pools of OS processes. A pool is started with a payload,
//! grows to its target size (optionally staggered), replaces units that exit,
//! enforces per-unit and global deadlines, and reports every lifecycle change as
//! a structured [`Envelope`].
//!
//! Supervision is recursive: the same [`Supervisor`] event loop runs in the root
//! process and, in the hierarchical topology, inside every group process.
//!
//! ## Architecture
//! ### Flat topology
//! ```text
//!                ┌──────────────────────────────┐
//!   Legion ────► │ root Supervisor (event loop) │ ──► uplink ──► Bus / SubscriberSet
//!                └──────┬───────────┬───────────┘
//!                 spawn │     spawn │   (Spawner: CommandSpawner over stdio)
//!                       ▼           ▼
//!                 leaf-worker   leaf-worker     WorkerRuntime ──► Task::run(ctx, payload)
//! ```
//!
//! ### Hierarchical topology
//! ```text
//!   Legion ──► root Supervisor ──► mid-tier (GroupRuntime + nested Supervisor) ──► leaf-workers
//!                     ▲                       │
//!                     └──── Relay::upward ◄───┘   (worker envelopes forwarded verbatim)
//! ```
//!
//! ### Supervisor loop
//! ```text
//! start(payload)
//!   ├─► emit own start, arm global deadline
//!   ├─► spawn `initial` units, schedule ramp-up (k·interval when staggered)
//!   └─► loop select! {
//!         unit message   ─► relay upward
//!         unit exited    ─► emit end {reason, exitCode, duration}
//!                           ├─ reinforce  ─► schedule one replacement
//!                           └─ !reinforce ─► shutdown(code) once no unit is left
//!         timer          ─► ramp / reinforce spawn, unit deadline kill, global deadline
//!         command        ─► shutdown | deliver | snapshot
//!         OS signal      ─► shutdown(1)
//!       }
//! ```
//!
//! ## Features
//! | Area              | Description                                                  | Key types / traits                         |
//! |-------------------|--------------------------------------------------------------|--------------------------------------------|
//! | **Facade**        | One root supervisor, subscription by event name.             | [`Legion`], [`LegionOptions`]              |
//! | **Supervision**   | Pool sizing, stagger, reinforcement, deadlines, shutdown.    | [`Supervisor`], [`SupervisorBuilder`]      |
//! | **Protocol**      | Envelope wire format and lifecycle naming.                   | [`Envelope`], [`Vocabulary`], [`Role`]     |
//! | **Tasks**         | Work executed by leaf workers.                               | [`Task`], [`TaskFn`], [`TaskRegistry`]     |
//! | **Processes**     | Spawn primitive and unit runtimes.                           | [`Spawner`], [`dispatch`]                  |
//! | **Subscribers**   | Observe everything that reaches the root.                    | [`Subscribe`], [`SubscriberSet`], [`Bus`]  |
//! | **Errors**        | Typed errors with stable log labels.                         | [`ConfigError`], [`ProtocolError`]         |
//!
//! ## Optional features
//! - `logging`: exports a [`LogWriter`] subscriber writing envelopes to `tracing`.
//!
//! ## Example
//! ```rust,no_run
//! use legion::{ConfigError, Legion, LegionOptions, TaskError, TaskFn, TaskRegistry, TaskSource};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), ConfigError> {
//!     legion::init_tracing();
//!
//!     let registry = TaskRegistry::new().with(TaskFn::arc("crunch", |ctx, payload| async move {
//!         let _ = ctx.emit("progress", &payload);
//!         if payload.is_null() {
//!             ctx.done(Err(TaskError::fail("nothing to crunch")));
//!         } else {
//!             ctx.done(Ok(()));
//!         }
//!     }));
//!     // Spawned units serve their runtime here and never return.
//!     legion::dispatch(&registry).await;
//!
//!     let mut options = LegionOptions::default();
//!     options.pool.max_pool_size = Some(4);
//!     options.pool.stagger = true;
//!     options.pool.stagger_interval_ms = 200;
//!
//!     let mut legion = Legion::new(options).with_registry(registry);
//!     legion.on("ended", |ev| println!("unit {} ended: {}", ev.id(), ev.data()));
//!     legion.start_with(TaskSource::registered("crunch"), serde_json::json!({ "n": 7 }))?;
//!     std::process::exit(legion.wait().await.unwrap_or(1));
//! }
//! ```
mod config;
mod core;
mod envelope;
mod error;
mod events;
mod group;
mod legion;
mod process;
mod relay;
mod runtime;
mod subscribers;
mod tasks;
mod worker;

// ---- Public re-exports ----

pub use crate::core::{
    wait_for_shutdown_signal, Supervisor, SupervisorBuilder, SupervisorHandle, FAULT_EXIT_CODE,
};
pub use config::{
    available_cpus, LegionOptions, PoolConfig, PoolOptions, Topology, DEFAULT_PER_GROUP,
    DEFAULT_STAGGER_INTERVAL_MS, MAX_DELAY_MS,
};
pub use envelope::{
    codec, is_reserved, Envelope, ExitReason, ExitReport, Identity, Orders, Role, Vocabulary,
    ERROR_EVENT, RESERVED_EVENT_NAMES,
};
pub use error::{ConfigError, ProtocolError, RuntimeError, TaskError};
pub use events::Bus;
pub use group::GroupRuntime;
pub use legion::Legion;
pub use process::{
    CommandSpawner, ExitStatus, SpawnRequest, Spawner, UnitLink, UnitSignal, UnitSignals,
    ROLE_ENV, SIGNAL_EXIT_CODE, TASK_ENV,
};
pub use relay::{Inbound, Relay};
pub use runtime::{dispatch, init_tracing, serve_stdio, unit_role};
pub use subscribers::{Listener, Subscribe, SubscriberSet};
pub use tasks::{Task, TaskFn, TaskRef, TaskRegistry, TaskSource};
pub use worker::{WorkerContext, WorkerRuntime, WorkerState};

// Optional: expose a tracing-backed logger subscriber.
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
