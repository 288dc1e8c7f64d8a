//! # Task references.
//!
//! A [`TaskSource`] names the work a leaf worker executes without carrying the
//! work itself:
//! - [`TaskSource::Registered`] - a name looked up in the [`TaskRegistry`] of
//!   the (re-spawned) current executable;
//! - [`TaskSource::Program`] - an external executable that speaks the envelope
//!   protocol on its stdin/stdout.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::registry::TaskRegistry;
use crate::error::ConfigError;

/// Resolvable reference to a task.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskSource {
    /// A task registered by name in this executable.
    Registered(String),
    /// An external executable.
    Program {
        /// Path of the executable.
        path: PathBuf,
        /// Arguments passed to it.
        #[serde(default)]
        args: Vec<String>,
    },
}

impl TaskSource {
    /// Shorthand for [`TaskSource::Registered`].
    pub fn registered(name: impl Into<String>) -> Self {
        TaskSource::Registered(name.into())
    }

    /// Shorthand for [`TaskSource::Program`] without arguments.
    pub fn program(path: impl Into<PathBuf>) -> Self {
        TaskSource::Program {
            path: path.into(),
            args: Vec::new(),
        }
    }

    /// Checks that the reference points at something runnable.
    ///
    /// Registered names must exist in `registry`; program paths must be
    /// existing regular files.
    pub fn resolve(&self, registry: &TaskRegistry) -> Result<(), ConfigError> {
        match self {
            TaskSource::Registered(name) if registry.contains(name) => Ok(()),
            TaskSource::Registered(_) => Err(self.unresolvable("not registered")),
            TaskSource::Program { path, .. } => match std::fs::metadata(path) {
                Ok(meta) if meta.is_file() => Ok(()),
                Ok(_) => Err(self.unresolvable("not a regular file")),
                Err(e) => Err(self.unresolvable(e)),
            },
        }
    }

    fn unresolvable(&self, reason: impl fmt::Display) -> ConfigError {
        ConfigError::UnresolvableTask {
            task: self.to_string(),
            reason: reason.to_string(),
        }
    }
}

impl fmt::Display for TaskSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskSource::Registered(name) => write!(f, "registered:{name}"),
            TaskSource::Program { path, .. } => write!(f, "program:{}", path.display()),
        }
    }
}
