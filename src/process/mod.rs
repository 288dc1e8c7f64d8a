//! Process transport: how supervisors create units and exchange envelopes with them.
//!
//! - [`Spawner`] the spawn primitive the supervisor core depends on
//! - [`CommandSpawner`] the OS implementation (child processes, JSON lines over stdio)
//! - [`UnitSignal`] what a unit reports back (messages, then exactly one exit)

mod command;
mod spawner;

pub use command::{CommandSpawner, ROLE_ENV, TASK_ENV};
pub use spawner::{
    ExitStatus, SpawnRequest, Spawner, UnitLink, UnitSignal, UnitSignals, SIGNAL_EXIT_CODE,
};
