//! Envelope broadcast.
//!
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast` carrying [`Envelope`](crate::Envelope)s
//!
//! The only publisher is the facade's pump task; consumers are the receivers
//! handed out by [`Legion::subscribe`](crate::Legion::subscribe).

mod bus;

pub use bus::Bus;
