//! # Envelope subscribers.
//!
//! The facade fans every envelope reaching the root out to a
//! [`SubscriberSet`], one queue and worker task per [`Subscribe`]r.
//!
//! ```text
//!   pump ── emit(&Envelope) ──► SubscriberSet ─┬─► [queue] ─► Listener("end")
//!                                              ├─► [queue] ─► LogWriter
//!                                              └─► [queue] ─► custom
//! ```
//!
//! - [`Subscribe`] the trait to implement
//! - [`Listener`] closure filtered by event name (backs `Legion::on`)
//! - [`LogWriter`] `tracing` output, behind the `logging` feature

mod listener;
#[cfg(feature = "logging")]
mod log;
mod set;
mod subscribe;

pub use listener::Listener;
#[cfg(feature = "logging")]
pub use log::LogWriter;
pub use set::SubscriberSet;
pub use subscribe::Subscribe;
