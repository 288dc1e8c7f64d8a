//! Runtime core: the supervisor event loop and its lifecycle.
//!
//! The public API of this module is [`Supervisor`] (built with
//! [`SupervisorBuilder`]) and the [`SupervisorHandle`] returned by `start`.
//!
//! Internal modules:
//! - [`pool`]: the single-owner `select!` loop (spawn, exit handling, reinforcement, shutdown);
//! - [`unit`]: per-unit records;
//! - [`timers`]: stagger, deadline and grace timers on one delay queue;
//! - [`shutdown`]: cross-platform termination signal handling.

mod builder;
mod pool;
mod shutdown;
mod supervisor;
mod timers;
mod unit;

pub use builder::SupervisorBuilder;
pub use shutdown::wait_for_shutdown_signal;
pub use supervisor::{Supervisor, SupervisorHandle, FAULT_EXIT_CODE};
