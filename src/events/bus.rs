//! # Broadcast bus for envelopes reported to the facade.
//!
//! [`Bus`] is a thin wrapper around [`tokio::sync::broadcast`]. The facade's
//! pump task publishes every envelope that reaches the root, and
//! [`Legion::subscribe`](crate::Legion::subscribe) hands out receivers.
//!
//! ```text
//!   root supervisor ──► uplink ──► pump ──┬──► Bus ──► receivers
//!                                         └──► SubscriberSet ──► subscribers
//! ```
//!
//! ## Rules
//! - **Non-blocking publish**: `publish()` never blocks.
//! - **Bounded capacity**: one ring buffer shared by all receivers.
//! - **Lag handling**: slow receivers get `RecvError::Lagged(n)` and skip `n` oldest items.
//! - **No persistence**: envelopes are lost if nobody is subscribed at send time.

use tokio::sync::broadcast;

use crate::envelope::Envelope;

/// Broadcast channel of envelopes. Cheap to clone.
#[derive(Clone, Debug)]
pub struct Bus {
    tx: broadcast::Sender<Envelope>,
}

impl Bus {
    /// Creates a new bus with the given channel capacity (min 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (tx, _rx) = broadcast::channel::<Envelope>(capacity);
        Self { tx }
    }

    /// Publishes an envelope to all active receivers; dropped if there are none.
    pub fn publish(&self, ev: Envelope) {
        let _ = self.tx.send(ev);
    }

    /// Publishes a borrowed envelope by cloning it.
    pub fn publish_ref(&self, ev: &Envelope) {
        let _ = self.tx.send(ev.clone());
    }

    /// Creates a receiver observing envelopes sent from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Envelope> {
        self.tx.subscribe()
    }

    /// Number of live receivers.
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}
