//! # Facade-level configuration.
//!
//! [`LegionOptions`] embeds one [`PoolOptions`] plus topology knobs. For the
//! flat topology the pool options describe the root pool directly. For the
//! hierarchical topology the root owns `groups` group supervisors, and each group
//! runs a pool of leaf workers built from the same pool options, sized by
//! `per_group` when set and by `max_pool_size` otherwise.
//!
//! Options can be written in TOML:
//! ```rust
//! use legion::{LegionOptions, Topology};
//!
//! let opts = LegionOptions::from_toml_str(r#"
//!     topology = "hierarchical"
//!     groups = 2
//!     per_group = 4
//!     max_pool_size = 4
//!     stagger = true
//!     stagger_interval_ms = 250
//!     task = { registered = "crunch" }
//! "#).unwrap();
//! assert_eq!(opts.topology, Topology::Hierarchical);
//! assert_eq!(opts.pool.stagger_interval_ms, 250);
//! ```

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::pool::{available_cpus, PoolOptions};
use crate::envelope::{Role, Vocabulary};
use crate::error::ConfigError;

/// Leaf workers per group when neither `per_group` nor `max_pool_size` is set.
pub const DEFAULT_PER_GROUP: i64 = 8;

/// Shape of the supervision tree.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Topology {
    /// Root supervisor directly owns leaf workers.
    #[default]
    Flat,
    /// Root → group supervisors → leaf workers.
    Hierarchical,
}

impl Topology {
    /// Lifecycle naming used by this topology.
    pub fn vocabulary(self) -> Vocabulary {
        match self {
            Topology::Flat => Vocabulary::FLAT,
            Topology::Hierarchical => Vocabulary::HIERARCHICAL,
        }
    }

    /// Role of the units the root spawns.
    pub fn root_units(self) -> Role {
        match self {
            Topology::Flat => Role::Worker,
            Topology::Hierarchical => Role::Group,
        }
    }
}

/// Configuration accepted by the [`Legion`](crate::Legion) facade.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LegionOptions {
    /// Flat or hierarchical.
    pub topology: Topology,
    /// Pool options (root pool when flat, per-group pool when hierarchical).
    #[serde(flatten)]
    pub pool: PoolOptions,
    /// Number of group supervisors (hierarchical only).
    pub groups: Option<i64>,
    /// Leaf workers per group (hierarchical only); takes precedence over
    /// `pool.max_pool_size`.
    pub per_group: Option<i64>,
    /// Executable spawned for registered tasks (defaults to the current executable).
    pub program: Option<PathBuf>,
    /// Capacity of the facade's event bus.
    pub bus_capacity: usize,
}

impl Default for LegionOptions {
    fn default() -> Self {
        Self {
            topology: Topology::Flat,
            pool: PoolOptions::default(),
            groups: Some(available_cpus()),
            per_group: None,
            program: None,
            bus_capacity: 1024,
        }
    }
}

impl LegionOptions {
    /// Parses options from a TOML document; absent fields take their defaults.
    pub fn from_toml_str(doc: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(doc)?)
    }

    /// Options of the root supervisor's pool.
    ///
    /// Hierarchical roots create every group at once, never reinforce groups and
    /// own the global deadline; per-unit deadlines apply to leaf workers only.
    pub fn root_pool(&self) -> PoolOptions {
        match self.topology {
            Topology::Flat => self.pool.clone(),
            Topology::Hierarchical => PoolOptions {
                initial_pool_size: self.groups.unwrap_or(0).max(0),
                max_pool_size: self.groups,
                stagger: false,
                reinforce: false,
                per_unit_timeout_ms: None,
                ..self.pool.clone()
            },
        }
    }

    /// Options handed to each group supervisor (hierarchical only).
    ///
    /// Group size: `per_group`, else `pool.max_pool_size`, else [`DEFAULT_PER_GROUP`].
    pub fn group_pool(&self) -> Option<PoolOptions> {
        match self.topology {
            Topology::Flat => None,
            Topology::Hierarchical => Some(PoolOptions {
                max_pool_size: Some(
                    self.per_group
                        .or(self.pool.max_pool_size)
                        .unwrap_or(DEFAULT_PER_GROUP),
                ),
                global_timeout_ms: None,
                ..self.pool.clone()
            }),
        }
    }

    /// Effective bus capacity (min 1).
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }
}
