//! # Per-supervisor pool configuration.
//!
//! [`PoolOptions`] is the raw, deserializable form; [`PoolOptions::validate`]
//! turns it into a frozen [`PoolConfig`]. A supervisor validates once, in `start`,
//! before spawning anything.
//!
//! ## Sentinel values
//! - `initial_pool_size < 0` → treated as `0`
//! - `max_pool_size = None` or negative → [`ConfigError::InvalidPoolSize`]
//! - `per_unit_timeout_ms` / `global_timeout_ms` of `0` → no deadline
//! - `stagger = false` → `stagger_interval_ms` ignored
//! - durations above [`MAX_DELAY_MS`] (one year) are clamped to it

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::tasks::{TaskRegistry, TaskSource};

/// Default pacing interval between staggered spawns.
pub const DEFAULT_STAGGER_INTERVAL_MS: u64 = 5_000;

/// Longest deadline or pacing interval a supervisor can arm (one year).
pub const MAX_DELAY_MS: u64 = 365 * 24 * 60 * 60 * 1_000;

/// Number of CPUs available to this process (at least 1).
pub fn available_cpus() -> i64 {
    std::thread::available_parallelism()
        .map(|n| n.get() as i64)
        .unwrap_or(1)
}

/// Raw configuration of one supervisor's pool.
///
/// Field semantics:
/// - `initial_pool_size`: units created immediately, ignoring stagger
/// - `max_pool_size`: steady-state target pool size
/// - `stagger` / `stagger_interval_ms`: pace ramp-up beyond the initial burst
/// - `reinforce`: replace every unit that exits
/// - `per_unit_timeout_ms`: hard deadline per unit
/// - `global_timeout_ms`: hard deadline for the whole subtree
/// - `task`: what leaf workers execute (mandatory before start)
/// - `quiet`: suppress subordinate standard error
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolOptions {
    pub initial_pool_size: i64,
    pub max_pool_size: Option<i64>,
    pub stagger: bool,
    pub stagger_interval_ms: u64,
    pub reinforce: bool,
    pub per_unit_timeout_ms: Option<u64>,
    pub global_timeout_ms: Option<u64>,
    pub task: Option<TaskSource>,
    pub quiet: bool,
}

impl Default for PoolOptions {
    /// Default options:
    ///
    /// - `initial_pool_size = 0`
    /// - `max_pool_size = available CPUs`
    /// - `stagger = false`, `stagger_interval_ms = 5000`
    /// - `reinforce = true`
    /// - no deadlines, no task
    /// - `quiet = true`
    fn default() -> Self {
        Self {
            initial_pool_size: 0,
            max_pool_size: Some(available_cpus()),
            stagger: false,
            stagger_interval_ms: DEFAULT_STAGGER_INTERVAL_MS,
            reinforce: true,
            per_unit_timeout_ms: None,
            global_timeout_ms: None,
            task: None,
            quiet: true,
        }
    }
}

impl PoolOptions {
    /// Validates and freezes the options.
    ///
    /// Fails with [`ConfigError`] when the pool size is missing or negative, or
    /// when the task is unset or cannot be resolved against `registry`.
    pub fn validate(&self, registry: &TaskRegistry) -> Result<PoolConfig, ConfigError> {
        let max = match self.max_pool_size {
            Some(n) if n >= 0 => n as usize,
            other => return Err(ConfigError::InvalidPoolSize { value: other }),
        };
        let task = self.task.clone().ok_or(ConfigError::MissingTask)?;
        task.resolve(registry)?;

        Ok(PoolConfig {
            initial: self.initial_pool_size.max(0) as usize,
            max,
            stagger: self.stagger.then(|| clamped_ms(self.stagger_interval_ms)),
            reinforce: self.reinforce,
            unit_timeout: non_zero_ms(self.per_unit_timeout_ms),
            global_timeout: non_zero_ms(self.global_timeout_ms),
            task,
            quiet: self.quiet,
        })
    }
}

fn non_zero_ms(ms: Option<u64>) -> Option<Duration> {
    ms.filter(|ms| *ms > 0).map(clamped_ms)
}

fn clamped_ms(ms: u64) -> Duration {
    Duration::from_millis(ms.min(MAX_DELAY_MS))
}

/// Validated, immutable pool configuration.
#[derive(Clone, Debug, PartialEq)]
pub struct PoolConfig {
    /// Units spawned unconditionally at start.
    pub initial: usize,
    /// Steady-state pool size.
    pub max: usize,
    /// Pacing interval for ramp-up and reinforcement (`None` = no stagger).
    pub stagger: Option<Duration>,
    /// Replace exited units.
    pub reinforce: bool,
    /// Hard deadline per unit.
    pub unit_timeout: Option<Duration>,
    /// Hard deadline for the whole supervisor.
    pub global_timeout: Option<Duration>,
    /// Task reference, already resolved.
    pub task: TaskSource,
    /// Suppress subordinate standard error.
    pub quiet: bool,
}

impl PoolConfig {
    /// Units spawned after the initial burst (`0` when `initial >= max`).
    #[inline]
    pub fn ramp_up(&self) -> usize {
        self.max.saturating_sub(self.initial)
    }

    /// True when no unit will ever be spawned.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.initial == 0 && self.max == 0
    }
}
