//! # SubscriberSet: non-blocking fan-out over multiple subscribers
//!
//! [`SubscriberSet`] distributes each [`Envelope`] to multiple subscribers
//! **without awaiting** their processing.
//!
//! ## What it guarantees
//! - `emit(&Envelope)` returns immediately.
//! - Per-subscriber FIFO (queue order).
//! - Only envelopes a subscriber [`accepts`](Subscribe::accepts) take queue space.
//! - [`lossless`](Subscribe::lossless) subscribers never lose accepted envelopes.
//! - Panics inside subscribers are caught and logged (isolation).
//! - `shutdown` lets every worker finish what is already queued.
//!
//! ## What it does **not** guarantee
//! - No global ordering across different subscribers.
//! - No retries on bounded queue overflow (events are dropped for that
//!   subscriber).
//!
//! ## Diagram
//! ```text
//!    emit(&Envelope)
//!        │                        (Arc-clone per subscriber)
//!        ├────────────────► [queue S1] ─► worker S1 ─► on_event()
//!        ├────────────────► [queue S2] ─► worker S2 ─► on_event()
//!        └────────────────► [queue SN] ─► worker SN ─► on_event()
//! ```

use std::sync::Arc;

use futures::FutureExt;
use tokio::{sync::mpsc, task::JoinHandle};

use super::Subscribe;
use crate::envelope::Envelope;
use crate::error::panic_reason;

/// Sending half of one subscriber queue.
enum Queue {
    Bounded(mpsc::Sender<Arc<Envelope>>),
    Unbounded(mpsc::UnboundedSender<Arc<Envelope>>),
}

/// Receiving half of one subscriber queue.
enum Inbox {
    Bounded(mpsc::Receiver<Arc<Envelope>>),
    Unbounded(mpsc::UnboundedReceiver<Arc<Envelope>>),
}

impl Inbox {
    async fn recv(&mut self) -> Option<Arc<Envelope>> {
        match self {
            Inbox::Bounded(rx) => rx.recv().await,
            Inbox::Unbounded(rx) => rx.recv().await,
        }
    }
}

/// Per-subscriber channel with metadata
struct SubscriberChannel {
    sub: Arc<dyn Subscribe>,
    queue: Queue,
}

/// Composite fan-out with per-subscriber queues and worker tasks.
pub struct SubscriberSet {
    channels: Vec<SubscriberChannel>,
    workers: Vec<JoinHandle<()>>,
}

impl SubscriberSet {
    /// Creates a new set and spawns one worker task per subscriber.
    ///
    /// Must be called from within a Tokio runtime.
    #[must_use]
    pub fn new(subs: Vec<Arc<dyn Subscribe>>) -> Self {
        let mut channels = Vec::with_capacity(subs.len());
        let mut workers = Vec::with_capacity(subs.len());

        for sub in subs {
            let (queue, mut inbox) = if sub.lossless() {
                let (tx, rx) = mpsc::unbounded_channel();
                (Queue::Unbounded(tx), Inbox::Unbounded(rx))
            } else {
                let (tx, rx) = mpsc::channel(sub.queue_capacity().max(1));
                (Queue::Bounded(tx), Inbox::Bounded(rx))
            };

            let worker = Arc::clone(&sub);
            let handle = tokio::spawn(async move {
                while let Some(ev) = inbox.recv().await {
                    let fut = worker.on_event(ev.as_ref());
                    if let Err(panic_err) = std::panic::AssertUnwindSafe(fut).catch_unwind().await {
                        tracing::error!(
                            subscriber = worker.name(),
                            reason = %panic_reason(panic_err.as_ref()),
                            "subscriber panicked"
                        );
                    }
                }
            });
            channels.push(SubscriberChannel { sub, queue });
            workers.push(handle);
        }
        Self { channels, workers }
    }

    /// Number of subscribers.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.channels.len()
    }

    /// True if the set has no subscribers.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Emits an envelope to all subscribers (clones it once).
    pub fn emit(&self, event: &Envelope) {
        self.emit_arc(Arc::new(event.clone()));
    }

    /// Emits a pre-allocated `Arc<Envelope>` to every subscriber accepting it.
    ///
    /// Bounded queues use `try_send`; a full or closed queue drops the event for
    /// that subscriber.
    pub fn emit_arc(&self, event: Arc<Envelope>) {
        for channel in &self.channels {
            if !channel.sub.accepts(&event) {
                continue;
            }
            let dropped = match &channel.queue {
                Queue::Bounded(tx) => match tx.try_send(Arc::clone(&event)) {
                    Ok(()) => None,
                    Err(mpsc::error::TrySendError::Full(_)) => Some("subscriber queue full"),
                    Err(mpsc::error::TrySendError::Closed(_)) => Some("subscriber queue closed"),
                },
                Queue::Unbounded(tx) => tx
                    .send(Arc::clone(&event))
                    .err()
                    .map(|_| "subscriber queue closed"),
            };
            if let Some(why) = dropped {
                tracing::warn!(
                    subscriber = channel.sub.name(),
                    kind = event.kind(),
                    "{}, event dropped",
                    why
                );
            }
        }
    }

    /// Gracefully shuts down all subscriber workers.
    ///
    /// 1. Drops all channel senders (workers see channel closed)
    /// 2. Awaits all worker tasks to finish
    pub async fn shutdown(self) {
        drop(self.channels);

        for h in self.workers {
            let _ = h.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    use crate::envelope::Role;

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Subscribe for Recorder {
        async fn on_event(&self, ev: &Envelope) {
            self.seen.lock().unwrap().push(ev.kind().to_string());
        }
    }

    struct Grumpy;

    #[async_trait]
    impl Subscribe for Grumpy {
        async fn on_event(&self, _ev: &Envelope) {
            panic!("grumpy");
        }
        fn name(&self) -> &'static str {
            "grumpy"
        }
    }

    #[tokio::test]
    async fn flooded_listener_keeps_every_match() {
        use crate::subscribers::Listener;
        use std::sync::atomic::{AtomicUsize, Ordering};

        let ended = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&ended);
        let listener = Listener::new("end", move |_ev: &Envelope| {
            std::thread::sleep(std::time::Duration::from_micros(50));
            counter.fetch_add(1, Ordering::SeqCst);
        });
        let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(listener)];
        let set = SubscriberSet::new(subs);

        for round in 0..3_000u32 {
            set.emit(&Envelope::control("progress", Role::Worker, 1, Some(0), json!(round)));
            if round % 2 == 0 {
                set.emit(&Envelope::control("end", Role::Worker, round, Some(0), json!(null)));
            }
        }
        set.shutdown().await;

        assert_eq!(ended.load(Ordering::SeqCst), 1_500);
    }

    #[tokio::test]
    async fn panicking_subscriber_does_not_starve_others() {
        let recorder = Arc::new(Recorder::default());
        let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(Grumpy), recorder.clone()];
        let set = SubscriberSet::new(subs);
        assert_eq!(set.len(), 2);

        for kind in ["start", "progress", "end"] {
            set.emit(&Envelope::control(kind, Role::Worker, 1, Some(0), json!(null)));
        }
        set.shutdown().await;

        assert_eq!(*recorder.seen.lock().unwrap(), ["start", "progress", "end"]);
    }
}
