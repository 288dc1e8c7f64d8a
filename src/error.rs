//! Error types used by the supervision runtime, the envelope protocol and tasks.
//!
//! - [`ConfigError`] - invalid or missing configuration, raised before any unit is spawned.
//! - [`ProtocolError`] - reserved event names or malformed envelopes.
//! - [`TaskError`] - a task reporting failure through `done`.
//! - [`RuntimeError`] - failures of the supervision machinery itself.
//!
//! Every enum provides `as_label` for logs, in the same stable snake_case form.
//! Operational failures of units (crashes, expired deadlines) are **not** errors:
//! they are reported through the lifecycle event stream and exit codes.

use std::io;

use thiserror::Error;

/// # Configuration errors.
///
/// Fatal and synchronous: raised by `start` before any unit exists, never retried.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Pool size missing, negative, or otherwise not a non-negative integer.
    #[error("pool size must be a non-negative integer, got {value:?}")]
    InvalidPoolSize {
        /// The offending value (`None` when missing).
        value: Option<i64>,
    },

    /// No task reference was configured.
    #[error("no task was assigned")]
    MissingTask,

    /// The task reference does not point at anything runnable.
    #[error("task `{task}` cannot be resolved: {reason}")]
    UnresolvableTask {
        /// Display form of the task reference.
        task: String,
        /// Why resolution failed.
        reason: String,
    },

    /// `start` was called on a supervisor that already started.
    #[error("supervisor was already started")]
    AlreadyStarted,

    /// A second hierarchical root was started in this process.
    #[error("another hierarchical root supervisor is already active in this process")]
    RootAlreadyActive,

    /// Configuration document could not be parsed.
    #[error("invalid configuration document: {0}")]
    Parse(#[from] toml::de::Error),
}

impl ConfigError {
    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// # Example
    /// ```
    /// use legion::ConfigError;
    ///
    /// assert_eq!(ConfigError::MissingTask.as_label(), "config_missing_task");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            ConfigError::InvalidPoolSize { .. } => "config_invalid_pool_size",
            ConfigError::MissingTask => "config_missing_task",
            ConfigError::UnresolvableTask { .. } => "config_unresolvable_task",
            ConfigError::AlreadyStarted => "config_already_started",
            ConfigError::RootAlreadyActive => "config_root_already_active",
            ConfigError::Parse(_) => "config_parse",
        }
    }
}

/// # Envelope protocol errors.
///
/// Fatal to the emitting call only: the envelope is logged and dropped, the
/// process keeps running.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// A user event tried to use one of the reserved control names.
    #[error("`{name}` is a reserved control event name")]
    ReservedEventName {
        /// The rejected name.
        name: String,
    },

    /// Event names must be non-empty.
    #[error("event name must be a non-empty string")]
    EmptyEventName,

    /// The envelope (or its payload) is not valid JSON of the expected shape.
    #[error("malformed envelope: {0}")]
    Malformed(#[from] serde_json::Error),

    /// The encoded envelope does not fit on one protocol line.
    #[error("envelope of {len} bytes exceeds the {max} byte line limit")]
    Oversized {
        /// Encoded length.
        len: usize,
        /// Line limit.
        max: usize,
    },
}

impl ProtocolError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            ProtocolError::ReservedEventName { .. } => "protocol_reserved_name",
            ProtocolError::EmptyEventName => "protocol_empty_name",
            ProtocolError::Malformed(_) => "protocol_malformed",
            ProtocolError::Oversized { .. } => "protocol_oversized",
        }
    }
}

/// # Errors produced by task execution.
///
/// A task passes one to `done` to report failure; its worker then exits with
/// code `1` and the owning supervisor treats it like any other non-zero exit.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TaskError {
    /// Task execution failed.
    #[error("execution failed: {error}")]
    Fail {
        /// The underlying error message.
        error: String,
    },
}

impl TaskError {
    /// Shorthand for [`TaskError::Fail`].
    pub fn fail(error: impl std::fmt::Display) -> Self {
        TaskError::Fail {
            error: error.to_string(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// # Example
    /// ```
    /// use legion::TaskError;
    ///
    /// assert_eq!(TaskError::fail("boom").as_label(), "task_failed");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            TaskError::Fail { .. } => "task_failed",
        }
    }
}

/// # Errors produced by the supervision runtime.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// The spawn primitive failed to create a unit process.
    #[error("failed to spawn unit: {0}")]
    Spawn(#[from] io::Error),

    /// The supervisor's own logic faulted; its invariants can no longer be trusted.
    #[error("unrecoverable supervisor fault: {reason}")]
    Fault {
        /// Panic message or description.
        reason: String,
    },
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::Spawn(_) => "runtime_spawn",
            RuntimeError::Fault { .. } => "runtime_fault",
        }
    }
}

/// Extracts a readable message from a caught panic payload.
pub(crate) fn panic_reason(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
