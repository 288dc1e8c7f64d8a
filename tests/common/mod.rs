//! In-memory spawn primitive for driving supervisors without real processes.
//!
//! Every unit is a tokio task that waits for its start command, then follows a
//! [`Script`]. Cancelling the kill token ends the unit with a signal status.
#![allow(dead_code)]

use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use legion::{
    Envelope, ExitReport, ExitStatus, Identity, PoolOptions, Role, RuntimeError, SpawnRequest,
    Spawner, SupervisorBuilder, TaskFn, TaskRegistry, TaskSource, UnitLink, UnitSignal,
    UnitSignals,
};
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Identifier of the supervisor under test.
pub const ROOT_ID: u32 = 1;
/// First identifier handed out to units.
pub const FIRST_UNIT: u32 = 100;

/// What a scripted unit does after receiving its start command.
#[derive(Clone, Debug)]
pub enum Script {
    /// Exit with `code` after `after`.
    Exit { after: Duration, code: i32 },
    /// Never exit on its own.
    Hang,
    /// Send an envelope named `kind` as `role`, then exit with `code` after `after`.
    Emit {
        kind: &'static str,
        role: Role,
        after: Duration,
        code: i32,
    },
}

impl Script {
    pub fn exit(after_ms: u64, code: i32) -> Self {
        Script::Exit {
            after: Duration::from_millis(after_ms),
            code,
        }
    }
}

enum Mode {
    Normal,
    Fail,
    Panic,
}

type Plan = Arc<dyn Fn(usize) -> Script + Send + Sync>;

/// Spawner whose units are scripted tokio tasks.
pub struct ScriptedSpawner {
    plan: Plan,
    mode: Mode,
    next_id: AtomicU32,
    spawned_at: Mutex<Vec<Instant>>,
    inboxes: Arc<Mutex<HashMap<u32, Vec<Envelope>>>>,
    killed: Arc<AtomicUsize>,
}

impl ScriptedSpawner {
    /// Every unit follows `script`.
    pub fn new(script: Script) -> Arc<Self> {
        Self::per_unit(move |_| script.clone())
    }

    /// The n-th spawned unit (from 0) follows `plan(n)`.
    pub fn per_unit(plan: impl Fn(usize) -> Script + Send + Sync + 'static) -> Arc<Self> {
        Arc::new(Self::with_mode(Arc::new(plan), Mode::Normal))
    }

    /// Every spawn fails with an I/O error.
    pub fn failing() -> Arc<Self> {
        Arc::new(Self::with_mode(Arc::new(|_| Script::Hang), Mode::Fail))
    }

    /// Every spawn panics.
    pub fn panicking() -> Arc<Self> {
        Arc::new(Self::with_mode(Arc::new(|_| Script::Hang), Mode::Panic))
    }

    fn with_mode(plan: Plan, mode: Mode) -> Self {
        Self {
            plan,
            mode,
            next_id: AtomicU32::new(FIRST_UNIT),
            spawned_at: Mutex::new(Vec::new()),
            inboxes: Arc::new(Mutex::new(HashMap::new())),
            killed: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Number of units spawned so far.
    pub fn spawned(&self) -> usize {
        self.spawned_at.lock().unwrap().len()
    }

    /// Spawn instants, in order.
    pub fn spawn_times(&self) -> Vec<Instant> {
        self.spawned_at.lock().unwrap().clone()
    }

    /// Envelopes received by unit `id`, start command included.
    pub fn received(&self, id: u32) -> Vec<Envelope> {
        self.inboxes
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .unwrap_or_default()
    }

    /// Units that ended because their kill token was cancelled.
    pub fn killed(&self) -> usize {
        self.killed.load(Ordering::SeqCst)
    }
}

impl Spawner for ScriptedSpawner {
    fn spawn(
        &self,
        _request: &SpawnRequest,
        kill: CancellationToken,
        signals: UnitSignals,
    ) -> Result<UnitLink, RuntimeError> {
        match self.mode {
            Mode::Normal => {}
            Mode::Fail => {
                return Err(RuntimeError::Spawn(io::Error::new(
                    io::ErrorKind::Other,
                    "scripted spawn failure",
                )))
            }
            Mode::Panic => panic!("scripted spawner panic"),
        }

        let ordinal = {
            let mut spawned = self.spawned_at.lock().unwrap();
            spawned.push(Instant::now());
            spawned.len() - 1
        };
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let script = (self.plan)(ordinal);
        let (outbox, inbox) = mpsc::unbounded_channel();
        let inboxes = Arc::clone(&self.inboxes);
        let killed = Arc::clone(&self.killed);

        tokio::spawn(async move {
            let status = tokio::select! {
                _ = kill.cancelled() => {
                    killed.fetch_add(1, Ordering::SeqCst);
                    ExitStatus::Signaled
                }
                status = act(id, script, inbox, inboxes, &signals) => status,
            };
            let _ = signals.send(UnitSignal::Exited { unit: id, status });
        });
        Ok(UnitLink { id, outbox })
    }
}

async fn act(
    id: u32,
    script: Script,
    mut inbox: mpsc::UnboundedReceiver<Envelope>,
    inboxes: Arc<Mutex<HashMap<u32, Vec<Envelope>>>>,
    signals: &UnitSignals,
) -> ExitStatus {
    let Some(start) = inbox.recv().await else {
        return ExitStatus::Code(1);
    };
    let owner = Some(start.owner().unwrap_or_default());
    inboxes.lock().unwrap().entry(id).or_default().push(start);

    let recorder = Arc::clone(&inboxes);
    tokio::spawn(async move {
        while let Some(envelope) = inbox.recv().await {
            recorder.lock().unwrap().entry(id).or_default().push(envelope);
        }
    });

    match script {
        Script::Hang => std::future::pending().await,
        Script::Exit { after, code } => {
            tokio::time::sleep(after).await;
            ExitStatus::Code(code)
        }
        Script::Emit {
            kind,
            role,
            after,
            code,
        } => {
            let envelope = Envelope::control(kind, role, id, owner, json!({ "from": id }));
            let _ = signals.send(UnitSignal::Message { unit: id, envelope });
            tokio::time::sleep(after).await;
            ExitStatus::Code(code)
        }
    }
}

/// Registry with a no-op task named `job`.
pub fn tasks() -> TaskRegistry {
    TaskRegistry::new().with(TaskFn::arc("job", |ctx, _payload| async move {
        ctx.done(Ok(()));
    }))
}

/// Shared form of [`tasks`].
pub fn registry() -> Arc<TaskRegistry> {
    Arc::new(tasks())
}

/// Pool options running `job`.
pub fn pool(initial: i64, max: i64, reinforce: bool) -> PoolOptions {
    PoolOptions {
        initial_pool_size: initial,
        max_pool_size: Some(max),
        reinforce,
        task: Some(TaskSource::registered("job")),
        ..PoolOptions::default()
    }
}

/// Flat root supervisor builder wired to `spawner`, plus its event stream.
pub fn root(
    options: PoolOptions,
    spawner: Arc<ScriptedSpawner>,
) -> (SupervisorBuilder, mpsc::UnboundedReceiver<Envelope>) {
    let (uplink, events) = mpsc::unbounded_channel();
    let identity = Identity {
        role: Role::Root,
        id: ROOT_ID,
        owner: None,
    };
    let builder = SupervisorBuilder::new(identity, options, uplink)
        .registry(registry())
        .spawner(spawner);
    (builder, events)
}

/// Everything currently queued on `events`.
pub fn drain(events: &mut mpsc::UnboundedReceiver<Envelope>) -> Vec<Envelope> {
    let mut out = Vec::new();
    while let Ok(ev) = events.try_recv() {
        out.push(ev);
    }
    out
}

/// Exit report carried by a terminate envelope.
pub fn report(ev: &Envelope) -> ExitReport {
    ExitReport::from_value(ev.data()).expect("terminate payload")
}

/// Envelopes named `kind` sent with `role`.
pub fn of<'a>(events: &'a [Envelope], kind: &str, role: &Role) -> Vec<&'a Envelope> {
    events
        .iter()
        .filter(|ev| ev.kind() == kind && ev.role() == role)
        .collect()
}

/// Payload shorthand.
pub fn payload() -> Value {
    json!({ "batch": 7 })
}

/// Everything currently buffered on a bus receiver.
pub fn drain_bus(events: &mut tokio::sync::broadcast::Receiver<Envelope>) -> Vec<Envelope> {
    let mut out = Vec::new();
    while let Ok(ev) = events.try_recv() {
        out.push(ev);
    }
    out
}
