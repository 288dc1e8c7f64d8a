//! # Mid-tier group runtime.
//!
//! A group process sits between the root and its leaf workers. It waits for its
//! own start command, builds a nested [`Supervisor`](crate::Supervisor) from the
//! pool options carried in it, and then relays traffic in both directions:
//!
//! ```text
//! parent ──► inbound ──► Relay::inbound ─┬─ Local(start)     → start nested supervisor
//!                                        ├─ Local(terminate) → shutdown(1)
//!                                        └─ Forward          → deliver to workers
//! workers ──► nested supervisor ──► Relay::upward ──► outbound ──► parent
//! ```
//!
//! The nested supervisor does not announce itself; the parent already reports
//! the group as one of its units. Losing the parent channel counts as a
//! terminate command.

use std::path::PathBuf;
use std::sync::Arc;

use futures::{Stream, StreamExt};
use tokio::sync::mpsc;

use crate::config::PoolOptions;
use crate::core::SupervisorBuilder;
use crate::envelope::{Envelope, Identity, Orders, Role, Vocabulary};
use crate::process::Spawner;
use crate::relay::{Inbound, Relay};
use crate::tasks::TaskRegistry;

/// Group supervisor runtime over an abstract envelope channel.
pub struct GroupRuntime {
    registry: Arc<TaskRegistry>,
    spawner: Arc<dyn Spawner>,
    outbound: mpsc::UnboundedSender<Envelope>,
    program: Option<PathBuf>,
    os_signals: bool,
}

impl GroupRuntime {
    /// Creates a runtime spawning workers with `spawner`, reporting to `outbound`.
    pub fn new(
        registry: Arc<TaskRegistry>,
        spawner: Arc<dyn Spawner>,
        outbound: mpsc::UnboundedSender<Envelope>,
    ) -> Self {
        Self {
            registry,
            spawner,
            outbound,
            program: None,
            os_signals: false,
        }
    }

    /// Executable used for registered worker tasks.
    pub fn with_program(mut self, program: Option<PathBuf>) -> Self {
        self.program = program;
        self
    }

    /// Shut the nested supervisor down on termination signals.
    pub fn with_os_signals(mut self, enabled: bool) -> Self {
        self.os_signals = enabled;
        self
    }

    /// Serves `inbound` (envelopes from the parent) and returns the exit code.
    pub async fn run<S>(self, mut inbound: S) -> i32
    where
        S: Stream<Item = Envelope> + Unpin,
    {
        let relay = Relay::new(Role::Group, &Role::Worker);

        let start = loop {
            let Some(envelope) = inbound.next().await else {
                tracing::info!("parent channel closed before start");
                return 1;
            };
            match relay.inbound(&envelope) {
                Inbound::Local if envelope.is_start() => break envelope,
                Inbound::Local if envelope.is_end() => {
                    tracing::info!("terminated before start");
                    return 1;
                }
                _ => tracing::debug!(kind = envelope.kind(), "ignored before start"),
            }
        };

        let vocabulary = if start.kind() == Vocabulary::FLAT.start {
            Vocabulary::FLAT
        } else {
            Vocabulary::HIERARCHICAL
        };
        let identity = Identity {
            role: Role::Group,
            id: start.id(),
            owner: start.owner(),
        };
        let orders = match Orders::from_value(start.into_data()) {
            Ok(orders) => orders,
            Err(e) => {
                tracing::error!(label = e.as_label(), error = %e, "unreadable start command");
                return 1;
            }
        };
        let options = PoolOptions {
            task: Some(orders.task),
            ..orders.pool.unwrap_or_default()
        };

        let mut supervisor = SupervisorBuilder::new(identity, options, self.outbound)
            .vocabulary(vocabulary)
            .units(Role::Worker)
            .registry(self.registry)
            .spawner(self.spawner)
            .program(self.program)
            .announce(false)
            .handle_os_signals(self.os_signals)
            .build();
        let handle = match supervisor.start(orders.payload) {
            Ok(handle) => handle,
            Err(e) => {
                tracing::error!(label = e.as_label(), error = %e, "group cannot start its pool");
                return 1;
            }
        };

        loop {
            tokio::select! {
                code = handle.wait() => return code,
                envelope = inbound.next() => match envelope {
                    None => {
                        tracing::info!("parent channel closed");
                        return handle.shutdown(1).await;
                    }
                    Some(envelope) => match relay.inbound(&envelope) {
                        Inbound::Local if envelope.is_end() => return handle.shutdown(1).await,
                        Inbound::Forward => handle.deliver(envelope),
                        _ => {}
                    },
                },
            }
        }
    }
}
