//! # Supervisor event loop.
//!
//! [`Pool`] owns every piece of a supervisor's bookkeeping: live unit records,
//! timers, the terminal exit code. It runs as one task and is never shared;
//! the outside world talks to it through [`Command`]s and units talk to it
//! through [`UnitSignal`]s.
//!
//! ```text
//!                 ┌────────────── select! ───────────────┐
//!  UnitSignal ───►│ Message → relay upward               │
//!                 │ Exited  → ended, reinforce | shutdown│──► uplink (Envelopes)
//!  Command ──────►│ Shutdown | Deliver | Snapshot        │
//!  Timers ───────►│ Ramp | Reinforce | deadlines | Grace │
//!  OS signal ────►│ Shutdown(1)                          │
//!                 └──────────────────────────────────────┘
//! ```
//!
//! ## Rules
//! - A unit's `started` event precedes its start command.
//! - Reserved control names sent by a direct unit are dropped; only the
//!   supervisor reports its own units' lifecycle.
//! - Exits are handled one at a time, in the order the transport reports them.
//! - A replacement is scheduled only after its predecessor's exit is fully handled.
//! - Killing a unit cancels only its own deadline.
//! - Shutdown runs once: it kills every live unit, clears all timers and emits
//!   the supervisor's own `ended`; later calls are no-ops.
//! - After shutdown the loop only reaps killed units (bounded by [`REAP_GRACE`]).

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use serde_json::{json, Value};
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tokio_util::time::delay_queue::Key;

use super::shutdown;
use super::timers::{Timer, Timers};
use super::unit::{UnitRecord, UnitState};
use crate::config::PoolConfig;
use crate::envelope::{is_reserved, Envelope, ExitReport, Identity, Vocabulary, ERROR_EVENT};
use crate::error::{ProtocolError, RuntimeError};
use crate::process::{SpawnRequest, Spawner, UnitSignal, UnitSignals, SIGNAL_EXIT_CODE};
use crate::relay::Relay;

/// How long a shut-down supervisor waits for killed units to be reaped.
pub(crate) const REAP_GRACE: Duration = Duration::from_secs(5);

/// Where a supervisor sends what it reports to its parent.
pub(crate) type Uplink = mpsc::UnboundedSender<Envelope>;

/// Requests from supervisor handles.
#[derive(Debug)]
pub(crate) enum Command {
    Shutdown(i32),
    Deliver(Envelope),
    Snapshot(oneshot::Sender<Vec<u32>>),
}

/// Everything a pool needs, fixed before the loop starts.
pub(crate) struct PoolSetup {
    pub(crate) identity: Identity,
    pub(crate) vocabulary: Vocabulary,
    pub(crate) relay: Relay,
    pub(crate) config: PoolConfig,
    pub(crate) request: SpawnRequest,
    /// Payload of every start command.
    pub(crate) orders: Value,
    pub(crate) spawner: Arc<dyn Spawner>,
    pub(crate) uplink: Uplink,
    pub(crate) announce: bool,
    pub(crate) os_signals: bool,
    pub(crate) runtime: CancellationToken,
    pub(crate) terminal: Arc<OnceLock<i32>>,
    pub(crate) started_at: Instant,
}

pub(crate) struct Pool {
    setup: PoolSetup,
    units: HashMap<u32, UnitRecord>,
    dying: HashSet<u32>,
    timers: Timers,
    global: Option<Key>,
    signals: UnitSignals,
}

impl Pool {
    pub(crate) fn new(setup: PoolSetup) -> (Self, mpsc::UnboundedReceiver<UnitSignal>) {
        let (signals, inbox) = mpsc::unbounded_channel();
        let pool = Self {
            setup,
            units: HashMap::new(),
            dying: HashSet::new(),
            timers: Timers::new(),
            global: None,
            signals,
        };
        (pool, inbox)
    }

    /// Runs the supervisor until it has shut down and reaped its units.
    ///
    /// Returns the terminal exit code.
    pub(crate) async fn run(
        mut self,
        mut inbox: mpsc::UnboundedReceiver<UnitSignal>,
        mut commands: mpsc::UnboundedReceiver<Command>,
    ) -> i32 {
        let os_signal = os_shutdown(self.setup.os_signals);
        tokio::pin!(os_signal);
        let mut commands_open = true;

        self.begin();
        while !self.finished() {
            tokio::select! {
                Some(signal) = inbox.recv() => self.on_signal(signal),
                command = commands.recv(), if commands_open => match command {
                    Some(command) => self.on_command(command),
                    None => commands_open = false,
                },
                Some(timer) = self.timers.next(), if !self.timers.is_empty() => self.on_timer(timer),
                signal = &mut os_signal, if self.terminal().is_none() => {
                    tracing::warn!(id = self.setup.identity.id, signal, "termination signal received");
                    self.shutdown(1);
                }
            }
        }
        self.terminal().unwrap_or(1)
    }

    fn terminal(&self) -> Option<i32> {
        self.setup.terminal.get().copied()
    }

    fn finished(&self) -> bool {
        self.terminal().is_some() && self.dying.is_empty()
    }

    fn begin(&mut self) {
        let config = &self.setup.config;
        tracing::info!(
            role = %self.setup.identity.role,
            id = self.setup.identity.id,
            initial = config.initial,
            max = config.max,
            task = %config.task,
            "supervisor starting"
        );

        if self.setup.announce {
            let me = &self.setup.identity;
            self.emit(Envelope::control(
                self.setup.vocabulary.start,
                me.role.clone(),
                me.id,
                me.owner,
                Value::Null,
            ));
        }
        if let Some(after) = self.setup.config.global_timeout {
            self.global = Some(self.timers.insert(Timer::GlobalDeadline, after));
        }

        for _ in 0..self.setup.config.initial {
            if !self.enlist() {
                return;
            }
        }

        let ramp = self.setup.config.ramp_up();
        match self.setup.config.stagger {
            Some(interval) => {
                for k in 1..=ramp {
                    let after = interval.saturating_mul(u32::try_from(k).unwrap_or(u32::MAX));
                    self.timers.insert(Timer::Ramp, after);
                }
            }
            None => {
                for _ in 0..ramp {
                    if !self.enlist() {
                        return;
                    }
                }
            }
        }

        if !self.setup.config.reinforce && self.units.is_empty() && ramp == 0 {
            tracing::info!("empty pool without reinforcement, nothing to supervise");
            self.shutdown(0);
        }
    }

    /// Spawns one unit; `false` if spawning faulted the supervisor.
    fn enlist(&mut self) -> bool {
        let kill = self.setup.runtime.child_token();
        let link = match self
            .setup
            .spawner
            .spawn(&self.setup.request, kill.clone(), self.signals.clone())
        {
            Ok(link) => link,
            Err(e) => {
                self.fault(e);
                return false;
            }
        };

        let deadline = self
            .setup
            .config
            .unit_timeout
            .map(|after| self.timers.insert(Timer::UnitDeadline(link.id), after));
        let mut unit = UnitRecord::new(link, kill, deadline);

        let role = self.setup.request.role.clone();
        let owner = Some(self.setup.identity.id);
        let start = self.setup.vocabulary.start;
        self.emit(Envelope::control(start, role.clone(), unit.id, owner, Value::Null));

        let orders = Envelope::control(start, role, unit.id, owner, self.setup.orders.clone());
        if unit.send(orders) {
            unit.state = UnitState::Running;
        } else {
            tracing::warn!(unit = unit.id, "start command not delivered");
        }

        tracing::debug!(unit = unit.id, live = self.units.len() + 1, "unit enlisted");
        self.units.insert(unit.id, unit);
        true
    }

    fn on_signal(&mut self, signal: UnitSignal) {
        match signal {
            UnitSignal::Message { unit, envelope } if self.terminal().is_none() => {
                // Lifecycle events of direct units are written here, never relayed.
                if is_reserved(envelope.kind()) && *envelope.role() == self.setup.request.role {
                    let error = ProtocolError::ReservedEventName {
                        name: envelope.kind().to_string(),
                    };
                    tracing::warn!(
                        unit,
                        label = error.as_label(),
                        error = %error,
                        "dropping unit envelope"
                    );
                    return;
                }
                if let Some(envelope) = self.setup.relay.upward(envelope) {
                    self.emit(envelope);
                }
            }
            UnitSignal::Message { .. } => {}
            UnitSignal::Exited { unit, status } => self.on_exit(unit, status.code()),
        }
    }

    fn on_exit(&mut self, id: u32, code: i32) {
        if self.terminal().is_some() {
            self.dying.remove(&id);
            return;
        }
        let Some(unit) = self.units.remove(&id) else {
            tracing::debug!(unit = id, "exit of unknown unit ignored");
            return;
        };
        if let Some(key) = &unit.deadline {
            self.timers.cancel(key);
        }

        let report = ExitReport::new(&self.setup.vocabulary, code, unit.elapsed());
        tracing::info!(unit = id, code, reason = ?report.reason, state = ?unit.state, "unit exited");
        self.emit(Envelope::control(
            self.setup.vocabulary.end,
            self.setup.request.role.clone(),
            id,
            Some(self.setup.identity.id),
            report.to_value(),
        ));

        if self.setup.config.reinforce {
            let after = self.setup.config.stagger.unwrap_or(Duration::ZERO);
            self.timers.insert(Timer::Reinforce, after);
        } else if self.units.is_empty() {
            self.shutdown(code);
        }
    }

    fn on_timer(&mut self, timer: Timer) {
        match timer {
            Timer::Ramp | Timer::Reinforce => {
                if self.terminal().is_none() {
                    self.enlist();
                }
            }
            Timer::UnitDeadline(id) => {
                if let Some(unit) = self.units.get_mut(&id) {
                    tracing::warn!(unit = id, "unit exceeded its time budget, killing");
                    unit.deadline = None;
                    unit.kill.cancel();
                }
            }
            Timer::GlobalDeadline => {
                self.global = None;
                tracing::info!(id = self.setup.identity.id, "global deadline reached");
                self.shutdown(0);
            }
            Timer::Grace => {
                tracing::warn!(remaining = self.dying.len(), "killed units not reaped in time");
                self.dying.clear();
            }
        }
    }

    fn on_command(&mut self, command: Command) {
        match command {
            Command::Shutdown(code) => self.shutdown(code),
            Command::Deliver(envelope) => self.deliver(envelope),
            Command::Snapshot(reply) => {
                let mut ids: Vec<u32> = self.units.keys().copied().collect();
                ids.sort_unstable();
                let _ = reply.send(ids);
            }
        }
    }

    /// Routes an envelope from above to the addressed unit, or to every unit
    /// when it targets a deeper tier.
    fn deliver(&mut self, envelope: Envelope) {
        if *envelope.role() == self.setup.request.role {
            match self.units.get(&envelope.id()) {
                Some(unit) => {
                    unit.send(envelope);
                }
                None => tracing::debug!(unit = envelope.id(), "no such unit, envelope dropped"),
            }
        } else if self.setup.relay.is_subordinate(envelope.role()) {
            for unit in self.units.values() {
                unit.send(envelope.clone());
            }
        } else {
            tracing::debug!(role = %envelope.role(), "envelope not addressed below this supervisor");
        }
    }

    fn shutdown(&mut self, code: i32) {
        if self.setup.terminal.set(code).is_err() {
            return;
        }
        self.timers.clear();
        self.global = None;

        let mut killed: Vec<UnitRecord> = self.units.drain().map(|(_, unit)| unit).collect();
        killed.sort_by_key(|unit| unit.started_at);
        for unit in &killed {
            unit.kill.cancel();
            let report = ExitReport::new(&self.setup.vocabulary, SIGNAL_EXIT_CODE, unit.elapsed());
            self.emit(Envelope::control(
                self.setup.vocabulary.end,
                self.setup.request.role.clone(),
                unit.id,
                Some(self.setup.identity.id),
                report.to_value(),
            ));
            self.dying.insert(unit.id);
        }
        if !self.dying.is_empty() {
            self.timers.insert(Timer::Grace, REAP_GRACE);
        }

        if self.setup.announce {
            let me = &self.setup.identity;
            let report = ExitReport::new(&self.setup.vocabulary, code, self.setup.started_at.elapsed());
            self.emit(Envelope::control(
                self.setup.vocabulary.end,
                me.role.clone(),
                me.id,
                me.owner,
                report.to_value(),
            ));
        }
        tracing::info!(id = self.setup.identity.id, code, killed = killed.len(), "supervisor shut down");
    }

    fn fault(&mut self, error: RuntimeError) {
        tracing::error!(label = error.as_label(), error = %error, "supervisor fault");
        let me = &self.setup.identity;
        self.emit(Envelope::control(
            ERROR_EVENT,
            me.role.clone(),
            me.id,
            me.owner,
            json!({ "error": error.to_string() }),
        ));
        self.shutdown(1);
    }

    fn emit(&self, envelope: Envelope) {
        if self.setup.uplink.send(envelope).is_err() {
            tracing::trace!("uplink closed, envelope dropped");
        }
    }
}

async fn os_shutdown(enabled: bool) -> &'static str {
    if enabled {
        match shutdown::wait_for_shutdown_signal().await {
            Ok(signal) => return signal,
            Err(e) => tracing::warn!(error = %e, "cannot listen for termination signals"),
        }
    }
    std::future::pending().await
}
