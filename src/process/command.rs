//! # OS process transport.
//!
//! [`CommandSpawner`] spawns each unit as a child process and talks to it with
//! JSON-lines envelopes over its stdin/stdout.
//!
//! Per unit, three tasks are started:
//! - **writer**: drains the unit's outbox into the child's stdin until the outbox
//!   closes or the unit is killed; closing stdin is a terminate command to the child;
//! - **reader**: forwards every envelope read from stdout as [`UnitSignal::Message`];
//! - **waiter**: waits for the exit (or kills the child once the kill token fires),
//!   lets the reader drain, then sends the single [`UnitSignal::Exited`].
//!
//! The executable is chosen by role and task:
//!
//! | role        | task                  | executable                         |
//! |-------------|-----------------------|------------------------------------|
//! | leaf worker | `Program { path, .. }`| `path` with its arguments          |
//! | leaf worker | `Registered(_)`       | `program` override or current exe  |
//! | mid-tier    | any                   | `program` override or current exe  |
//!
//! Children spawned from the current executable find their role in
//! [`ROLE_ENV`] and enter the unit runtime through [`dispatch`](crate::dispatch).

use std::io;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use futures::StreamExt;
use tokio::process::{Child, ChildStdout, Command};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::spawner::{ExitStatus, SpawnRequest, Spawner, UnitLink, UnitSignal, UnitSignals};
use crate::envelope::{codec, Role};
use crate::error::RuntimeError;
use crate::tasks::TaskSource;

/// Environment variable carrying the role of a spawned unit.
pub const ROLE_ENV: &str = "LEGION_ROLE";

/// Environment variable carrying the display form of the unit's task.
pub const TASK_ENV: &str = "LEGION_TASK";

/// How long the waiter lets the reader drain trailing output after an exit.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

/// Spawns units as OS processes via [`tokio::process::Command`].
///
/// Must be used from within a Tokio runtime.
#[derive(Clone, Debug, Default)]
pub struct CommandSpawner;

impl CommandSpawner {
    /// Creates the spawner.
    pub fn new() -> Self {
        Self
    }

    fn command(request: &SpawnRequest) -> io::Result<Command> {
        let mut cmd = match (&request.role, &request.task) {
            (Role::Worker, TaskSource::Program { path, args }) => {
                let mut cmd = Command::new(path);
                cmd.args(args);
                cmd
            }
            _ => Command::new(Self::own_executable(request)?),
        };

        cmd.env(ROLE_ENV, request.role.as_str())
            .env(TASK_ENV, request.task.to_string())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(if request.quiet {
                Stdio::null()
            } else {
                Stdio::inherit()
            })
            .kill_on_drop(true);
        Ok(cmd)
    }

    fn own_executable(request: &SpawnRequest) -> io::Result<PathBuf> {
        match &request.program {
            Some(path) => Ok(path.clone()),
            None => std::env::current_exe(),
        }
    }
}

impl Spawner for CommandSpawner {
    fn spawn(
        &self,
        request: &SpawnRequest,
        kill: CancellationToken,
        signals: UnitSignals,
    ) -> Result<UnitLink, RuntimeError> {
        let mut child = Self::command(request)?.spawn()?;

        let id = child.id().ok_or_else(|| missing("pid"))?;
        let stdin = child.stdin.take().ok_or_else(|| missing("stdin"))?;
        let stdout = child.stdout.take().ok_or_else(|| missing("stdout"))?;

        let (outbox, pending) = mpsc::unbounded_channel();
        tokio::spawn(codec::write_envelopes(stdin, pending, kill.clone()));
        let reader = tokio::spawn(forward_envelopes(id, stdout, signals.clone()));
        tokio::spawn(await_exit(id, child, kill, reader, signals));

        tracing::debug!(unit = id, role = %request.role, task = %request.task, "unit process spawned");
        Ok(UnitLink { id, outbox })
    }
}

fn missing(what: &str) -> io::Error {
    io::Error::new(
        io::ErrorKind::Other,
        format!("spawned process has no {what}"),
    )
}

async fn forward_envelopes(unit: u32, stdout: ChildStdout, signals: UnitSignals) {
    let mut inbound = codec::read_envelopes(stdout);
    while let Some(envelope) = inbound.next().await {
        if signals.send(UnitSignal::Message { unit, envelope }).is_err() {
            break;
        }
    }
}

async fn await_exit(
    unit: u32,
    mut child: Child,
    kill: CancellationToken,
    mut reader: JoinHandle<()>,
    signals: UnitSignals,
) {
    let natural = tokio::select! {
        status = child.wait() => Some(status),
        _ = kill.cancelled() => None,
    };
    let status = match natural {
        Some(status) => status,
        None => {
            if let Err(e) = child.start_kill() {
                tracing::debug!(unit, error = %e, "kill failed, process already gone");
            }
            child.wait().await
        }
    };
    let status = match status {
        Ok(status) => ExitStatus::from(status),
        Err(e) => {
            tracing::warn!(unit, error = %e, "failed to collect exit status");
            ExitStatus::Signaled
        }
    };

    if tokio::time::timeout(DRAIN_TIMEOUT, &mut reader).await.is_err() {
        tracing::debug!(unit, "stdout still open after exit, abandoning reader");
        reader.abort();
    }
    let _ = signals.send(UnitSignal::Exited { unit, status });
}
