//! # Closure subscriber filtered by event name.
//!
//! Backs [`Legion::on`](crate::Legion::on). The name is matched against the
//! envelope `type` after alias resolution, so `"ended"` on a flat legion
//! receives every `end` envelope (units and the root alike).
//!
//! Only matching envelopes are queued, and the queue is unbounded: a slow
//! callback delays its own events but never loses them.

use async_trait::async_trait;

use super::Subscribe;
use crate::envelope::Envelope;

/// Calls `F` for every envelope whose `type` equals `kind`.
pub struct Listener<F> {
    kind: String,
    callback: F,
}

impl<F> Listener<F>
where
    F: Fn(&Envelope) + Send + Sync + 'static,
{
    /// Listens for envelopes of wire type `kind`.
    pub fn new(kind: impl Into<String>, callback: F) -> Self {
        Self {
            kind: kind.into(),
            callback,
        }
    }

    /// Wire type this listener reacts to.
    pub fn kind(&self) -> &str {
        &self.kind
    }
}

#[async_trait]
impl<F> Subscribe for Listener<F>
where
    F: Fn(&Envelope) + Send + Sync + 'static,
{
    async fn on_event(&self, event: &Envelope) {
        if self.accepts(event) {
            (self.callback)(event);
        }
    }

    fn name(&self) -> &'static str {
        "listener"
    }

    fn accepts(&self, event: &Envelope) -> bool {
        event.kind() == self.kind
    }

    fn lossless(&self) -> bool {
        true
    }
}
