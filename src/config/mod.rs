//! Configuration: raw options, validation, and topology.
//!
//! - [`PoolOptions`] / [`PoolConfig`] - one supervisor's pool, raw and frozen
//! - [`LegionOptions`] / [`Topology`] - what the facade accepts
//!
//! Configuration is validated once per supervisor, before any unit is spawned,
//! and never changes afterwards.

mod options;
mod pool;

pub use options::{LegionOptions, Topology, DEFAULT_PER_GROUP};
pub use pool::{
    available_cpus, PoolConfig, PoolOptions, DEFAULT_STAGGER_INTERVAL_MS, MAX_DELAY_MS,
};
