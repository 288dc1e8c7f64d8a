//! # Legion: the top-level facade.
//!
//! [`Legion`] owns exactly one root [`Supervisor`](crate::Supervisor) and wires
//! what it reports to the outside world:
//!
//! ```text
//! Legion::start ──► root Supervisor ──► uplink ──► pump task ──┬──► Bus ──► subscribe()
//!                                                              └──► SubscriberSet
//!                                                                      ├─► Listener (on)
//!                                                                      └─► Subscribe impls
//! ```
//!
//! ## Rules
//! - `start`/`start_with`/`run` succeed at most once; later calls fail with
//!   [`ConfigError::AlreadyStarted`].
//! - At most one hierarchical legion is active per process; a second one fails
//!   with [`ConfigError::RootAlreadyActive`] until the first has finished.
//! - Event names passed to [`Legion::on`] may use lifecycle aliases
//!   (`started`/`ended` or `recruited`/`terminated`), resolved against the
//!   topology in effect at start.
//! - [`Legion::wait`] returns once the root has reaped its units and every
//!   subscriber has drained its queue.
//!
//! ## Example
//! ```rust,no_run
//! use legion::{Legion, LegionOptions, TaskSource};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), legion::ConfigError> {
//! let mut options = LegionOptions::default();
//! options.pool.max_pool_size = Some(3);
//! options.pool.reinforce = false;
//!
//! let mut legion = Legion::new(options);
//! legion.on("ended", |ev| println!("{} ended: {}", ev.id(), ev.data()));
//! legion.start_with(TaskSource::program("/usr/local/bin/crunch"), serde_json::json!({ "n": 7 }))?;
//! let code = legion.wait().await.unwrap_or(1);
//! # let _ = code;
//! # Ok(())
//! # }
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use crate::config::{LegionOptions, Topology};
use crate::core::{SupervisorBuilder, SupervisorHandle, FAULT_EXIT_CODE};
use crate::envelope::{Envelope, Identity};
use crate::error::ConfigError;
use crate::events::Bus;
use crate::process::Spawner;
use crate::subscribers::{Listener, Subscribe, SubscriberSet};
use crate::tasks::{TaskRegistry, TaskSource};

type Callback = Box<dyn Fn(&Envelope) + Send + Sync>;

static HIERARCHICAL_ROOT: AtomicBool = AtomicBool::new(false);

/// Marks the process as hosting a hierarchical root; released on drop.
struct RootClaim;

impl RootClaim {
    fn acquire() -> Result<Self, ConfigError> {
        HIERARCHICAL_ROOT
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| RootClaim)
            .map_err(|_| ConfigError::RootAlreadyActive)
    }
}

impl Drop for RootClaim {
    fn drop(&mut self) {
        HIERARCHICAL_ROOT.store(false, Ordering::Release);
    }
}

struct Running {
    handle: SupervisorHandle,
    pump: Option<JoinHandle<i32>>,
    code: Option<i32>,
}

/// Top-level facade over one root supervisor.
pub struct Legion {
    options: LegionOptions,
    registry: Arc<TaskRegistry>,
    spawner: Option<Arc<dyn Spawner>>,
    subscribers: Vec<Arc<dyn Subscribe>>,
    listeners: Vec<(String, Callback)>,
    bus: Bus,
    os_signals: bool,
    running: Option<Running>,
}

impl Legion {
    /// Creates a facade with `options`.
    ///
    /// `bus_capacity` is read here; later [`configure`](Self::configure) calls
    /// do not resize the bus.
    pub fn new(options: LegionOptions) -> Self {
        let bus = Bus::new(options.bus_capacity_clamped());
        Self {
            options,
            registry: Arc::new(TaskRegistry::new()),
            spawner: None,
            subscribers: Vec::new(),
            listeners: Vec::new(),
            bus,
            os_signals: true,
            running: None,
        }
    }

    /// Tasks this executable can run when re-spawned as a worker.
    pub fn with_registry(mut self, registry: TaskRegistry) -> Self {
        self.registry = Arc::new(registry);
        self
    }

    /// Replaces the spawn primitive of the root supervisor.
    pub fn with_spawner(mut self, spawner: Arc<dyn Spawner>) -> Self {
        self.spawner = Some(spawner);
        self
    }

    /// Adds a subscriber receiving every envelope that reaches the root.
    pub fn with_subscriber(mut self, subscriber: Arc<dyn Subscribe>) -> Self {
        self.subscribers.push(subscriber);
        self
    }

    /// Leaves termination signals to the embedding program.
    pub fn without_signal_handling(mut self) -> Self {
        self.os_signals = false;
        self
    }

    /// Options currently in effect.
    pub fn options(&self) -> &LegionOptions {
        &self.options
    }

    /// Replaces the options. Fails once started.
    pub fn configure(&mut self, options: LegionOptions) -> Result<(), ConfigError> {
        if self.running.is_some() {
            return Err(ConfigError::AlreadyStarted);
        }
        self.options = options;
        Ok(())
    }

    /// Calls `callback` for every envelope named `name`.
    ///
    /// Before start the callback runs on its own subscriber queue. Once
    /// started it is fed from the bus and only sees later envelopes.
    pub fn on<F>(&mut self, name: impl Into<String>, callback: F) -> &mut Self
    where
        F: Fn(&Envelope) + Send + Sync + 'static,
    {
        let name = name.into();
        if self.running.is_none() {
            self.listeners.push((name, Box::new(callback)));
            return self;
        }

        let wire = self.options.topology.vocabulary().wire_name(&name).to_string();
        let mut rx = self.bus.subscribe();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(ev) if ev.kind() == wire => callback(&ev),
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(event = %wire, skipped, "listener lagged behind the bus");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
        self
    }

    /// Receiver of every envelope that reaches the root from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Envelope> {
        self.bus.subscribe()
    }

    /// True once started.
    pub fn is_started(&self) -> bool {
        self.running.is_some()
    }

    /// Assigns `task` and starts. See [`start`](Self::start).
    pub fn start_with(&mut self, task: TaskSource, payload: Value) -> Result<(), ConfigError> {
        if self.running.is_some() {
            return Err(ConfigError::AlreadyStarted);
        }
        self.options.pool.task = Some(task);
        self.start(payload)
    }

    /// Validates the options and starts the root supervisor.
    ///
    /// `payload` reaches every leaf worker in its start command.
    /// Must be called from within a Tokio runtime.
    pub fn start(&mut self, payload: Value) -> Result<(), ConfigError> {
        if self.running.is_some() {
            return Err(ConfigError::AlreadyStarted);
        }
        let topology = self.options.topology;
        let claim = match topology {
            Topology::Hierarchical => Some(RootClaim::acquire()?),
            Topology::Flat => None,
        };

        let vocabulary = topology.vocabulary();
        let (uplink, mut events) = mpsc::unbounded_channel();
        let mut builder = SupervisorBuilder::new(Identity::root(), self.options.root_pool(), uplink)
            .vocabulary(vocabulary)
            .units(topology.root_units())
            .registry(Arc::clone(&self.registry))
            .program(self.options.program.clone())
            .handle_os_signals(self.os_signals);
        if let Some(pool) = self.options.group_pool() {
            builder = builder.unit_pool(pool);
        }
        if let Some(spawner) = &self.spawner {
            builder = builder.spawner(Arc::clone(spawner));
        }
        let handle = builder.build().start(payload)?;

        let mut subscribers = std::mem::take(&mut self.subscribers);
        for (name, callback) in std::mem::take(&mut self.listeners) {
            let wire = vocabulary.wire_name(&name).to_string();
            subscribers.push(Arc::new(Listener::new(wire, callback)));
        }
        let set = SubscriberSet::new(subscribers);
        let bus = self.bus.clone();
        let root = handle.clone();

        tracing::info!(topology = ?topology, "legion started");
        let pump = tokio::spawn(async move {
            let _claim = claim;
            let code = loop {
                tokio::select! {
                    biased;
                    Some(ev) = events.recv() => {
                        set.emit(&ev);
                        bus.publish(ev);
                    }
                    code = root.wait() => break code,
                }
            };
            while let Ok(ev) = events.try_recv() {
                set.emit(&ev);
                bus.publish(ev);
            }
            set.shutdown().await;
            tracing::info!(code, "legion finished");
            code
        });

        self.running = Some(Running {
            handle,
            pump: Some(pump),
            code: None,
        });
        Ok(())
    }

    /// Shuts the root down with `exit_code` and waits for it.
    ///
    /// Idempotent: returns the first recorded exit code. `None` if never started.
    pub async fn shutdown(&mut self, exit_code: i32) -> Option<i32> {
        let handle = self.running.as_ref()?.handle.clone();
        handle.shutdown(exit_code).await;
        self.wait().await
    }

    /// Waits for the root to finish and returns its exit code.
    ///
    /// `None` if never started. Cancel-safe.
    pub async fn wait(&mut self) -> Option<i32> {
        let running = self.running.as_mut()?;
        if let Some(pump) = running.pump.as_mut() {
            let code = match pump.await {
                Ok(code) => code,
                Err(e) => {
                    tracing::error!(error = %e, "event pump failed");
                    running.handle.exit_code().unwrap_or(FAULT_EXIT_CODE)
                }
            };
            running.pump = None;
            running.code = Some(code);
        }
        running.code
    }

    /// Identifiers of the root's live units.
    pub async fn live_units(&self) -> Vec<u32> {
        match &self.running {
            Some(running) => running.handle.live_units().await,
            None => Vec::new(),
        }
    }

    /// Starts with `payload` and waits for the exit code.
    pub async fn run(mut self, payload: Value) -> Result<i32, ConfigError> {
        self.start(payload)?;
        Ok(self.wait().await.unwrap_or(FAULT_EXIT_CODE))
    }
}
