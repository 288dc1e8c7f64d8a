//! # Task abstractions and references.
//!
//! - [`Task`] - trait implemented by the work leaf workers execute
//! - [`TaskFn`] - closure-backed task
//! - [`TaskRef`] - shared reference to a task (`Arc<dyn Task>`)
//! - [`TaskRegistry`] - name → task lookup linked into the executable
//! - [`TaskSource`] - resolvable reference carried in configuration and start commands

mod registry;
mod source;
mod task;
mod task_fn;

pub use registry::TaskRegistry;
pub use source::TaskSource;
pub use task::{Task, TaskRef};
pub use task_fn::TaskFn;
