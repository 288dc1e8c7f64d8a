//! # Spawn primitive consumed by the supervisor core.
//!
//! The core never touches OS processes directly. It asks a [`Spawner`] for a
//! unit and gets back a [`UnitLink`]; everything the unit does afterwards
//! arrives as a [`UnitSignal`] on the one channel the supervisor owns.
//!
//! ```text
//!  Supervisor loop ── spawn(request, kill, signals) ──► Spawner
//!        ▲                                                 │
//!        │          UnitSignal::Message{unit, envelope}    │  (child stdout)
//!        └───────── UnitSignal::Exited{unit, status}  ◄────┘  (child exit)
//!
//!  UnitLink.outbox ──► child stdin        kill.cancel() ──► hard kill
//! ```
//!
//! ## Rules
//! - Signals of one unit are delivered in the order the transport observed them.
//! - `Exited` is the last signal for a unit; exactly one is delivered.
//! - Cancelling the kill token terminates the unit unconditionally.

use std::path::PathBuf;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::envelope::{Envelope, Role};
use crate::error::RuntimeError;
use crate::tasks::TaskSource;

/// Exit code assigned to a unit killed by a signal without a numeric exit code.
///
/// Distinguishes "killed by signal" from a natural non-zero exit.
pub const SIGNAL_EXIT_CODE: i32 = 128;

/// How a unit process ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExitStatus {
    /// Exited with a numeric code.
    Code(i32),
    /// Terminated by a signal, no numeric code available.
    Signaled,
}

impl ExitStatus {
    /// Numeric exit code, [`SIGNAL_EXIT_CODE`] for [`ExitStatus::Signaled`].
    #[inline]
    pub fn code(self) -> i32 {
        match self {
            ExitStatus::Code(code) => code,
            ExitStatus::Signaled => SIGNAL_EXIT_CODE,
        }
    }
}

impl From<std::process::ExitStatus> for ExitStatus {
    fn from(status: std::process::ExitStatus) -> Self {
        match status.code() {
            Some(code) => ExitStatus::Code(code),
            None => ExitStatus::Signaled,
        }
    }
}

/// Notification from a unit to its supervisor.
#[derive(Clone, Debug, PartialEq)]
pub enum UnitSignal {
    /// The unit sent an envelope.
    Message {
        /// Unit identifier.
        unit: u32,
        /// The envelope, as received.
        envelope: Envelope,
    },
    /// The unit process ended.
    Exited {
        /// Unit identifier.
        unit: u32,
        /// Exit status.
        status: ExitStatus,
    },
}

/// Channel the transport pushes [`UnitSignal`]s into.
pub type UnitSignals = mpsc::UnboundedSender<UnitSignal>;

/// What to spawn.
#[derive(Clone, Debug)]
pub struct SpawnRequest {
    /// Role the new unit plays.
    pub role: Role,
    /// Task the unit (or its subtree) executes.
    pub task: TaskSource,
    /// Executable for registered tasks (`None` = current executable).
    pub program: Option<PathBuf>,
    /// Suppress the unit's standard error.
    pub quiet: bool,
}

/// Handle to a spawned unit.
#[derive(Debug)]
pub struct UnitLink {
    /// Unit identifier (process id).
    pub id: u32,
    /// Envelopes sent here are delivered to the unit.
    pub outbox: mpsc::UnboundedSender<Envelope>,
}

/// OS process-spawn primitive.
pub trait Spawner: Send + Sync + 'static {
    /// Spawns one unit.
    ///
    /// The transport must kill the unit once `kill` is cancelled and must report
    /// its messages and its exit through `signals`.
    fn spawn(
        &self,
        request: &SpawnRequest,
        kill: CancellationToken,
        signals: UnitSignals,
    ) -> Result<UnitLink, RuntimeError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signal_sentinel() {
        assert_eq!(ExitStatus::Code(0).code(), 0);
        assert_eq!(ExitStatus::Code(3).code(), 3);
        assert_eq!(ExitStatus::Signaled.code(), SIGNAL_EXIT_CODE);
    }

    #[cfg(unix)]
    #[test]
    fn std_status_mapping() {
        use std::os::unix::process::ExitStatusExt;

        let exited = std::process::ExitStatus::from_raw(2 << 8);
        assert_eq!(ExitStatus::from(exited), ExitStatus::Code(2));

        let killed = std::process::ExitStatus::from_raw(9);
        assert_eq!(ExitStatus::from(killed), ExitStatus::Signaled);
    }
}
