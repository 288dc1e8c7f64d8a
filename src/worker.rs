//! # Leaf worker runtime.
//!
//! A leaf worker waits for its start command, runs the task exactly once and
//! exits with the code the task reports.
//!
//! ```text
//! AwaitingOrders ──start command──► Executing ──done(result)──► Done
//!       │                               │
//!       └── terminate / parent gone ────┴──► exit 1
//! ```
//!
//! The task only sees a [`WorkerContext`]: it can `emit` events to the parent
//! and call `done`. If it never calls `done`, the worker keeps running until
//! its parent kills it.
//!
//! | outcome                             | exit code |
//! |-------------------------------------|-----------|
//! | `done(Ok(()))`                      | `0`       |
//! | `done(Err(_))`                      | `1`       |
//! | task panicked                       | `1`       |
//! | terminate command / parent gone     | `1`       |
//! | task unknown to this executable     | `1`       |

use std::sync::Arc;

use futures::{Stream, StreamExt};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::envelope::{codec, Envelope, Identity, Orders, Role};
use crate::error::{panic_reason, ProtocolError, TaskError};
use crate::tasks::{TaskRef, TaskRegistry, TaskSource};

/// Capability handed to a running task.
#[derive(Clone, Debug)]
pub struct WorkerContext {
    identity: Identity,
    outbound: mpsc::UnboundedSender<Envelope>,
    done: mpsc::UnboundedSender<Result<(), TaskError>>,
}

impl WorkerContext {
    /// Creates a context reporting as `identity`.
    ///
    /// Emitted envelopes go to `outbound`; the first `done` result goes to `done`.
    pub fn new(
        identity: Identity,
        outbound: mpsc::UnboundedSender<Envelope>,
        done: mpsc::UnboundedSender<Result<(), TaskError>>,
    ) -> Self {
        Self {
            identity,
            outbound,
            done,
        }
    }

    /// This worker's identifier.
    pub fn id(&self) -> u32 {
        self.identity.id
    }

    /// The parent supervisor's identifier.
    pub fn owner(&self) -> Option<u32> {
        self.identity.owner
    }

    /// Sends a user event to the parent.
    ///
    /// Fails with [`ProtocolError`] for empty or reserved names, for data that
    /// does not serialize and for envelopes too large for one protocol line;
    /// nothing is sent in that case.
    pub fn emit(&self, name: &str, data: impl Serialize) -> Result<(), ProtocolError> {
        let data = serde_json::to_value(data)?;
        let envelope = Envelope::user(name, &self.identity, data)?;
        codec::encode(&envelope)?;
        if self.outbound.send(envelope).is_err() {
            tracing::debug!(event = name, "parent channel closed, event dropped");
        }
        Ok(())
    }

    /// Reports completion. Only the first call counts.
    pub fn done(&self, result: Result<(), TaskError>) {
        let _ = self.done.send(result);
    }
}

/// Lifecycle stage of a leaf worker.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WorkerState {
    /// Waiting for the start command.
    AwaitingOrders,
    /// Task running.
    Executing,
    /// Exit code decided.
    Done,
}

/// Leaf worker runtime over an abstract envelope channel.
pub struct WorkerRuntime {
    registry: Arc<TaskRegistry>,
    outbound: mpsc::UnboundedSender<Envelope>,
    state: WorkerState,
}

impl WorkerRuntime {
    /// Creates a runtime resolving tasks in `registry` and reporting to `outbound`.
    pub fn new(registry: Arc<TaskRegistry>, outbound: mpsc::UnboundedSender<Envelope>) -> Self {
        Self {
            registry,
            outbound,
            state: WorkerState::AwaitingOrders,
        }
    }

    /// Current stage.
    pub fn state(&self) -> WorkerState {
        self.state
    }

    /// Serves `inbound` (envelopes from the parent) and returns the exit code.
    pub async fn run<S>(&mut self, mut inbound: S) -> i32
    where
        S: Stream<Item = Envelope> + Unpin,
    {
        let code = match self.await_orders(&mut inbound).await {
            Some((identity, task, payload)) => {
                self.state = WorkerState::Executing;
                self.execute(identity, task, payload, &mut inbound).await
            }
            None => 1,
        };
        self.state = WorkerState::Done;
        code
    }

    async fn await_orders<S>(&self, inbound: &mut S) -> Option<(Identity, TaskRef, Value)>
    where
        S: Stream<Item = Envelope> + Unpin,
    {
        while let Some(envelope) = inbound.next().await {
            if *envelope.role() != Role::Worker {
                continue;
            }
            if envelope.is_end() {
                tracing::info!("terminated before start");
                return None;
            }
            if !envelope.is_start() {
                continue;
            }

            let identity = Identity {
                role: Role::Worker,
                id: envelope.id(),
                owner: envelope.owner(),
            };
            let orders = match Orders::from_value(envelope.into_data()) {
                Ok(orders) => orders,
                Err(e) => {
                    tracing::error!(label = e.as_label(), error = %e, "unreadable start command");
                    return None;
                }
            };
            let task = match &orders.task {
                TaskSource::Registered(name) => self.registry.get(name),
                TaskSource::Program { .. } => None,
            };
            return match task {
                Some(task) => Some((identity, task, orders.payload)),
                None => {
                    tracing::error!(task = %orders.task, "task is not registered in this executable");
                    None
                }
            };
        }
        tracing::info!("parent channel closed before start");
        None
    }

    async fn execute<S>(
        &self,
        identity: Identity,
        task: TaskRef,
        payload: Value,
        inbound: &mut S,
    ) -> i32
    where
        S: Stream<Item = Envelope> + Unpin,
    {
        let (done, mut finished) = mpsc::unbounded_channel();
        let ctx = WorkerContext::new(identity, self.outbound.clone(), done);
        tracing::debug!(task = task.name(), id = ctx.id(), "task starting");

        let mut work = tokio::spawn(async move { task.run(ctx, payload).await });
        let mut running = true;
        loop {
            tokio::select! {
                Some(result) = finished.recv() => {
                    work.abort();
                    return exit_code(result);
                }
                joined = &mut work, if running => {
                    running = false;
                    if let Err(e) = joined {
                        if e.is_panic() {
                            let reason = panic_reason(e.into_panic().as_ref());
                            tracing::error!(reason = %reason, "task panicked");
                            return 1;
                        }
                    }
                    if let Ok(result) = finished.try_recv() {
                        return exit_code(result);
                    }
                    tracing::debug!("task returned without calling done, waiting to be stopped");
                }
                envelope = inbound.next() => match envelope {
                    None => {
                        tracing::info!("parent channel closed");
                        work.abort();
                        return 1;
                    }
                    Some(envelope) if envelope.is_end() && *envelope.role() == Role::Worker => {
                        tracing::info!("terminate command received");
                        work.abort();
                        return 1;
                    }
                    Some(_) => {}
                },
            }
        }
    }
}

fn exit_code(result: Result<(), TaskError>) -> i32 {
    match result {
        Ok(()) => 0,
        Err(e) => {
            tracing::warn!(label = e.as_label(), error = %e, "task failed");
            1
        }
    }
}
