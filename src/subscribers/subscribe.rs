//! # Event subscriber trait.
//!
//! Provides [`Subscribe`] an extension point for observing the lifecycle and
//! user events a legion reports.
//!
//! Each subscriber gets:
//! - **Dedicated worker task** (runs independently)
//! - **Per-subscriber bounded queue** (capacity via [`Subscribe::queue_capacity`],
//!   unbounded when [`Subscribe::lossless`])
//! - **Panic isolation** (panics are caught and logged)
//!
//! ## Rules
//! - A slow subscriber only affects its own queue.
//! - Envelopes rejected by [`Subscribe::accepts`] never enter the queue.
//! - Queue overflow drops the event **for this subscriber only** (logged at `warn`).
//! - Events are processed sequentially (FIFO) per subscriber.
//!
//! ## Example
//! ```rust
//! use async_trait::async_trait;
//! use legion::{Envelope, Subscribe};
//!
//! struct Audit;
//!
//! #[async_trait]
//! impl Subscribe for Audit {
//!     async fn on_event(&self, ev: &Envelope) {
//!         if ev.kind() == "end" {
//!             // write an audit record
//!         }
//!     }
//!
//!     fn name(&self) -> &'static str { "audit" }
//!     fn queue_capacity(&self) -> usize { 512 }
//! }
//! ```

use async_trait::async_trait;

use crate::envelope::Envelope;

/// Event subscriber.
///
/// ### Implementation requirements
/// - Use async I/O; avoid blocking the executor.
/// - Handle errors internally; do not panic.
#[async_trait]
pub trait Subscribe: Send + Sync + 'static {
    /// Processes a single envelope.
    ///
    /// Called from a dedicated worker task, in FIFO order per subscriber.
    async fn on_event(&self, event: &Envelope);

    /// Returns the subscriber name used in logs.
    ///
    /// The default uses `type_name::<Self>()`, which can be verbose - override it when possible.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Returns the preferred queue capacity for this subscriber.
    ///
    /// The runtime clamps capacity to a minimum of 1.
    ///
    /// Default: 1024.
    fn queue_capacity(&self) -> usize {
        1024
    }

    /// Filter applied before queueing.
    ///
    /// Default: every envelope.
    fn accepts(&self, _event: &Envelope) -> bool {
        true
    }

    /// When `true` the queue is unbounded and accepted envelopes are never dropped.
    ///
    /// Default: `false`.
    fn lossless(&self) -> bool {
        false
    }
}
