//! Start command payload.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::PoolOptions;
use crate::tasks::TaskSource;

/// What a freshly spawned unit is told to do.
///
/// Leaf workers use `task` and `payload`. Group supervisors additionally receive
/// `pool`, the options of the pool they must build.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Orders {
    /// Resolvable task reference.
    pub task: TaskSource,
    /// Opaque payload handed to `start`, forwarded to every leaf worker.
    #[serde(default)]
    pub payload: Value,
    /// Pool options for a nested supervisor.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pool: Option<PoolOptions>,
}

impl Orders {
    /// JSON payload form.
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// Parses orders out of a start command payload.
    pub fn from_value(value: Value) -> Result<Self, crate::error::ProtocolError> {
        Ok(serde_json::from_value(value)?)
    }
}
