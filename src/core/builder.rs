use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::mpsc;

use super::supervisor::Supervisor;
use crate::config::PoolOptions;
use crate::envelope::{Envelope, Identity, Role, Vocabulary};
use crate::process::{CommandSpawner, Spawner};
use crate::tasks::TaskRegistry;

/// Builder for a [`Supervisor`].
///
/// Defaults describe a flat root pool of leaf workers:
/// flat vocabulary, worker units, empty registry, [`CommandSpawner`], announces
/// its own lifecycle, does not listen for OS signals.
pub struct SupervisorBuilder {
    identity: Identity,
    options: PoolOptions,
    uplink: mpsc::UnboundedSender<Envelope>,
    vocabulary: Vocabulary,
    units: Role,
    unit_pool: Option<PoolOptions>,
    registry: Arc<TaskRegistry>,
    spawner: Option<Arc<dyn Spawner>>,
    program: Option<PathBuf>,
    announce: bool,
    os_signals: bool,
}

impl SupervisorBuilder {
    /// Creates a builder for a supervisor speaking as `identity`, reporting to `uplink`.
    pub fn new(
        identity: Identity,
        options: PoolOptions,
        uplink: mpsc::UnboundedSender<Envelope>,
    ) -> Self {
        Self {
            identity,
            options,
            uplink,
            vocabulary: Vocabulary::FLAT,
            units: Role::Worker,
            unit_pool: None,
            registry: Arc::new(TaskRegistry::new()),
            spawner: None,
            program: None,
            announce: true,
            os_signals: false,
        }
    }

    /// Lifecycle naming used for emitted events and start commands.
    pub fn vocabulary(mut self, vocabulary: Vocabulary) -> Self {
        self.vocabulary = vocabulary;
        self
    }

    /// Role of the units this supervisor spawns.
    pub fn units(mut self, role: Role) -> Self {
        self.units = role;
        self
    }

    /// Pool options handed to each unit in its start command (group units only).
    pub fn unit_pool(mut self, options: PoolOptions) -> Self {
        self.unit_pool = Some(options);
        self
    }

    /// Registry used to resolve registered task names.
    pub fn registry(mut self, registry: Arc<TaskRegistry>) -> Self {
        self.registry = registry;
        self
    }

    /// Spawn primitive (defaults to [`CommandSpawner`]).
    pub fn spawner(mut self, spawner: Arc<dyn Spawner>) -> Self {
        self.spawner = Some(spawner);
        self
    }

    /// Executable used for registered tasks and group units.
    pub fn program(mut self, program: Option<PathBuf>) -> Self {
        self.program = program;
        self
    }

    /// Whether the supervisor emits its own `started`/`ended`.
    ///
    /// Nested supervisors leave this to their parent, which reports them as units.
    pub fn announce(mut self, announce: bool) -> Self {
        self.announce = announce;
        self
    }

    /// Whether termination signals shut the supervisor down with code `1`.
    pub fn handle_os_signals(mut self, enabled: bool) -> Self {
        self.os_signals = enabled;
        self
    }

    /// Builds the supervisor. Nothing runs until [`Supervisor::start`].
    pub fn build(self) -> Supervisor {
        Supervisor {
            identity: self.identity,
            vocabulary: self.vocabulary,
            units: self.units,
            options: self.options,
            unit_pool: self.unit_pool,
            registry: self.registry,
            spawner: self
                .spawner
                .unwrap_or_else(|| Arc::new(CommandSpawner::new())),
            uplink: self.uplink,
            program: self.program,
            announce: self.announce,
            os_signals: self.os_signals,
            started: false,
        }
    }
}
