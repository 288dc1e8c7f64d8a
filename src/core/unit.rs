//! # Unit records.
//!
//! One [`UnitRecord`] per live unit, owned by the supervisor loop and never
//! shared. A record is removed as soon as its unit exits; a replacement always
//! gets a fresh record.
//!
//! ```text
//! Spawned ──(start command sent)──► Running ──(exit observed)──► removed
//! ```

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tokio_util::time::delay_queue::Key;

use crate::envelope::Envelope;
use crate::process::UnitLink;

/// Lifecycle stage of a live unit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum UnitState {
    /// Process exists, start command not delivered yet.
    Spawned,
    /// Start command delivered.
    Running,
}

/// Supervisor-side bookkeeping for one unit.
#[derive(Debug)]
pub(crate) struct UnitRecord {
    pub(crate) id: u32,
    pub(crate) started_at: Instant,
    pub(crate) state: UnitState,
    /// Key of the per-unit deadline timer, if armed.
    pub(crate) deadline: Option<Key>,
    /// Cancelling hard-kills the unit.
    pub(crate) kill: CancellationToken,
    outbox: mpsc::UnboundedSender<Envelope>,
}

impl UnitRecord {
    pub(crate) fn new(link: UnitLink, kill: CancellationToken, deadline: Option<Key>) -> Self {
        Self {
            id: link.id,
            started_at: Instant::now(),
            state: UnitState::Spawned,
            deadline,
            kill,
            outbox: link.outbox,
        }
    }

    /// Sends an envelope to the unit; `false` if its channel is closed.
    pub(crate) fn send(&self, envelope: Envelope) -> bool {
        self.outbox.send(envelope).is_ok()
    }

    /// Time since the unit was spawned.
    pub(crate) fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }
}
