//! # Envelope: the one message type exchanged across process boundaries.
//!
//! Envelopes are immutable once constructed; fields are exposed through
//! accessors only. Two constructors exist:
//! - [`Envelope::control`] for lifecycle and command traffic produced by the runtime;
//! - [`Envelope::user`] for task events, which rejects reserved names.
//!
//! ## Example
//! ```rust
//! use legion::{Envelope, Identity, Role};
//! use serde_json::json;
//!
//! let me = Identity { role: Role::Worker, id: 4242, owner: Some(4200) };
//! let ev = Envelope::user("progress", &me, json!({ "done": 3 })).unwrap();
//! assert_eq!(ev.kind(), "progress");
//! assert_eq!(ev.owner(), Some(4200));
//!
//! assert!(Envelope::user("end", &me, json!(null)).is_err());
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::role::Role;
use crate::error::ProtocolError;

/// Names reserved for spawn/terminate control traffic, across both vocabularies.
///
/// Flat pools use `start`/`end`; hierarchical ones use `recruit`/`terminate`.
pub const RESERVED_EVENT_NAMES: [&str; 4] = ["start", "end", "recruit", "terminate"];

/// Event name used to surface an unrecoverable supervisor fault.
pub const ERROR_EVENT: &str = "error";

/// Returns `true` if `name` is one of the reserved control names.
#[inline]
pub fn is_reserved(name: &str) -> bool {
    RESERVED_EVENT_NAMES.contains(&name)
}

/// Who is speaking: the triple a node stamps on every envelope it originates.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Identity {
    /// Tier of the node.
    pub role: Role,
    /// Process identifier of the node.
    pub id: u32,
    /// Process identifier of the node's parent (`None` at the root).
    pub owner: Option<u32>,
}

impl Identity {
    /// Identity of the current process acting as root supervisor.
    pub fn root() -> Self {
        Self {
            role: Role::Root,
            id: std::process::id(),
            owner: None,
        }
    }
}

/// Structured message `{ type, role, id, owner, data }`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    kind: String,
    role: Role,
    id: u32,
    owner: Option<u32>,
    #[serde(default)]
    data: Value,
}

impl Envelope {
    /// Builds a control or lifecycle envelope without name checks.
    pub fn control(
        kind: impl Into<String>,
        role: Role,
        id: u32,
        owner: Option<u32>,
        data: Value,
    ) -> Self {
        Self {
            kind: kind.into(),
            role,
            id,
            owner,
            data,
        }
    }

    /// Builds a user event sent by `from`.
    ///
    /// Fails with [`ProtocolError`] if `kind` is empty or reserved; nothing is sent.
    pub fn user(kind: &str, from: &Identity, data: Value) -> Result<Self, ProtocolError> {
        if kind.is_empty() {
            return Err(ProtocolError::EmptyEventName);
        }
        if is_reserved(kind) {
            return Err(ProtocolError::ReservedEventName {
                name: kind.to_string(),
            });
        }
        Ok(Self::control(kind, from.role.clone(), from.id, from.owner, data))
    }

    /// Event name (`type` on the wire).
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Sender tier.
    pub fn role(&self) -> &Role {
        &self.role
    }

    /// Sender identifier.
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Sender's parent identifier.
    pub fn owner(&self) -> Option<u32> {
        self.owner
    }

    /// Payload.
    pub fn data(&self) -> &Value {
        &self.data
    }

    /// Consumes the envelope, returning its payload.
    pub fn into_data(self) -> Value {
        self.data
    }

    /// True for either vocabulary's start command/event.
    pub fn is_start(&self) -> bool {
        matches!(self.kind.as_str(), "start" | "recruit")
    }

    /// True for either vocabulary's terminate command/event.
    pub fn is_end(&self) -> bool {
        matches!(self.kind.as_str(), "end" | "terminate")
    }
}
