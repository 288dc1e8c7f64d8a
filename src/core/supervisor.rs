//! # Supervisor: one pool of units and its lifecycle.
//!
//! A [`Supervisor`] is the recursive building block of a legion. The facade owns
//! the root one; each group process owns a nested one. All of them run the same
//! event loop and differ only in configuration (see [`SupervisorBuilder`]).
//!
//! ## Lifecycle
//! ```text
//! build() ──► start(payload) ──► [event loop task] ──► exit code
//!                │                     ▲
//!                └─► SupervisorHandle ─┘  shutdown(code) | deliver(env) | live_units()
//! ```
//!
//! ## Rules
//! - `start` validates the pool configuration before anything is spawned.
//! - `start` succeeds at most once per instance; later calls fail with
//!   [`ConfigError::AlreadyStarted`] and leave the running loop untouched.
//! - A panic inside the loop is an unrecoverable fault: the whole subtree is
//!   killed, an `error` event is emitted and the exit code becomes `1`.
//!
//! ## Example
//! ```rust,no_run
//! use std::sync::Arc;
//! use legion::SupervisorBuilder;
//! use legion::{CommandSpawner, Identity, PoolOptions, TaskRegistry, TaskSource};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let (uplink, mut events) = tokio::sync::mpsc::unbounded_channel();
//! let options = PoolOptions {
//!     max_pool_size: Some(2),
//!     reinforce: false,
//!     task: Some(TaskSource::program("/usr/local/bin/crunch")),
//!     ..PoolOptions::default()
//! };
//!
//! let mut sup = SupervisorBuilder::new(Identity::root(), options, uplink)
//!     .registry(Arc::new(TaskRegistry::new()))
//!     .spawner(Arc::new(CommandSpawner::new()))
//!     .build();
//! let handle = sup.start(serde_json::json!({ "batch": 1 }))?;
//!
//! tokio::spawn(async move {
//!     while let Some(ev) = events.recv().await {
//!         println!("{} from {}", ev.kind(), ev.id());
//!     }
//! });
//! std::process::exit(handle.wait().await);
//! # }
//! ```

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::{Arc, OnceLock};

use futures::FutureExt;
use serde_json::{json, Value};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::pool::{Command, Pool, PoolSetup, Uplink};
use crate::config::PoolOptions;
use crate::envelope::{Envelope, ExitReport, Identity, Orders, Role, Vocabulary, ERROR_EVENT};
use crate::error::{panic_reason, ConfigError};
use crate::process::{SpawnRequest, Spawner};
use crate::relay::Relay;
use crate::tasks::TaskRegistry;

/// Exit code of a supervisor that faulted.
pub const FAULT_EXIT_CODE: i32 = 1;

/// A pool supervisor that has not been started yet (or was started once).
pub struct Supervisor {
    pub(super) identity: Identity,
    pub(super) vocabulary: Vocabulary,
    pub(super) units: Role,
    pub(super) options: PoolOptions,
    pub(super) unit_pool: Option<PoolOptions>,
    pub(super) registry: Arc<TaskRegistry>,
    pub(super) spawner: Arc<dyn Spawner>,
    pub(super) uplink: Uplink,
    pub(super) program: Option<PathBuf>,
    pub(super) announce: bool,
    pub(super) os_signals: bool,
    pub(super) started: bool,
}

impl Supervisor {
    /// Identity this supervisor stamps on its own events.
    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// True once [`start`](Self::start) has succeeded.
    pub fn is_started(&self) -> bool {
        self.started
    }

    /// Validates the configuration and starts the event loop.
    ///
    /// `payload` is forwarded to every leaf worker in its start command.
    /// Must be called from within a Tokio runtime.
    pub fn start(&mut self, payload: Value) -> Result<SupervisorHandle, ConfigError> {
        if self.started {
            return Err(ConfigError::AlreadyStarted);
        }
        let config = self.options.validate(&self.registry)?;
        if let Some(pool) = &self.unit_pool {
            pool.validate(&self.registry)?;
        }
        self.started = true;

        let orders = Orders {
            task: config.task.clone(),
            payload,
            pool: self.unit_pool.clone(),
        };
        let request = SpawnRequest {
            role: self.units.clone(),
            task: config.task.clone(),
            program: self.program.clone(),
            quiet: config.quiet,
        };

        let runtime = CancellationToken::new();
        let terminal = Arc::new(OnceLock::new());
        let started_at = Instant::now();
        let guard = FaultGuard {
            identity: self.identity.clone(),
            vocabulary: self.vocabulary,
            uplink: self.uplink.clone(),
            announce: self.announce,
            runtime: runtime.clone(),
            terminal: Arc::clone(&terminal),
            started_at,
        };
        let (pool, inbox) = Pool::new(PoolSetup {
            identity: self.identity.clone(),
            vocabulary: self.vocabulary,
            relay: Relay::new(self.identity.role.clone(), &self.units),
            config,
            request,
            orders: orders.to_value(),
            spawner: Arc::clone(&self.spawner),
            uplink: self.uplink.clone(),
            announce: self.announce,
            os_signals: self.os_signals,
            runtime,
            terminal,
            started_at,
        });

        let (commands, pending) = mpsc::unbounded_channel();
        let (exit_tx, exit) = watch::channel(None);
        tokio::spawn(async move {
            let code = match AssertUnwindSafe(pool.run(inbox, pending)).catch_unwind().await {
                Ok(code) => code,
                Err(panic) => guard.recover(panic),
            };
            guard.runtime.cancel();
            exit_tx.send_replace(Some(code));
        });

        Ok(SupervisorHandle { commands, exit })
    }
}

/// What survives a panic of the event loop.
struct FaultGuard {
    identity: Identity,
    vocabulary: Vocabulary,
    uplink: Uplink,
    announce: bool,
    runtime: CancellationToken,
    terminal: Arc<OnceLock<i32>>,
    started_at: Instant,
}

impl FaultGuard {
    fn recover(&self, panic: Box<dyn Any + Send>) -> i32 {
        let reason = panic_reason(panic.as_ref());
        tracing::error!(id = self.identity.id, reason = %reason, "supervisor loop panicked");
        self.runtime.cancel();

        if self.terminal.set(FAULT_EXIT_CODE).is_ok() {
            let me = &self.identity;
            let _ = self.uplink.send(Envelope::control(
                ERROR_EVENT,
                me.role.clone(),
                me.id,
                me.owner,
                json!({ "error": reason }),
            ));
            if self.announce {
                let report =
                    ExitReport::new(&self.vocabulary, FAULT_EXIT_CODE, self.started_at.elapsed());
                let _ = self.uplink.send(Envelope::control(
                    self.vocabulary.end,
                    me.role.clone(),
                    me.id,
                    me.owner,
                    report.to_value(),
                ));
            }
        }
        self.terminal.get().copied().unwrap_or(FAULT_EXIT_CODE)
    }
}

/// Handle to a running supervisor. Cheap to clone.
#[derive(Clone, Debug)]
pub struct SupervisorHandle {
    commands: mpsc::UnboundedSender<Command>,
    exit: watch::Receiver<Option<i32>>,
}

impl SupervisorHandle {
    /// Shuts the supervisor down and waits for it to finish.
    ///
    /// Idempotent: the first recorded exit code wins and is returned to every caller.
    pub async fn shutdown(&self, exit_code: i32) -> i32 {
        let _ = self.commands.send(Command::Shutdown(exit_code));
        self.wait().await
    }

    /// Waits until the supervisor has shut down and reaped its units.
    pub async fn wait(&self) -> i32 {
        let mut exit = self.exit.clone();
        let _ = exit.wait_for(Option::is_some).await;
        let code = *exit.borrow();
        code.unwrap_or(FAULT_EXIT_CODE)
    }

    /// Terminal exit code, once the supervisor has finished.
    pub fn exit_code(&self) -> Option<i32> {
        *self.exit.borrow()
    }

    /// Routes an envelope down to the addressed unit (or every unit, for deeper tiers).
    pub fn deliver(&self, envelope: Envelope) {
        let _ = self.commands.send(Command::Deliver(envelope));
    }

    /// Identifiers of the currently live units (empty once finished).
    pub async fn live_units(&self) -> Vec<u32> {
        let (reply, ids) = oneshot::channel();
        if self.commands.send(Command::Snapshot(reply)).is_err() {
            return Vec::new();
        }
        ids.await.unwrap_or_default()
    }
}
