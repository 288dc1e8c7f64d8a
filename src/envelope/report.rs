//! # Lifecycle vocabulary and exit reports.
//!
//! The flat and hierarchical topologies name the same two lifecycle events
//! differently. [`Vocabulary`] captures one naming scheme so the supervisor core
//! never special-cases a topology.
//!
//! | topology     | start     | end         | clean exit   | failed exit |
//! |--------------|-----------|-------------|--------------|-------------|
//! | flat         | `start`   | `end`       | `quit`       | `fired`     |
//! | hierarchical | `recruit` | `terminate` | `discharged` | `killed`    |
//!
//! Subscribers may use either the wire name or the past-tense alias
//! (`started`/`ended`, `recruited`/`terminated`).

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Why a unit or supervisor ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExitReason {
    /// Flat topology, exit code `0`.
    Quit,
    /// Hierarchical topology, exit code `0`.
    Discharged,
    /// Flat topology, non-zero exit code.
    Fired,
    /// Hierarchical topology, non-zero exit code.
    Killed,
}

impl ExitReason {
    /// True for the zero-exit-code reasons.
    pub fn is_clean(self) -> bool {
        matches!(self, ExitReason::Quit | ExitReason::Discharged)
    }
}

/// Naming scheme for lifecycle traffic.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Vocabulary {
    /// Wire name of the start command and of the "unit started" event.
    pub start: &'static str,
    /// Wire name of the terminate event.
    pub end: &'static str,
    /// Subscription alias of `start`.
    pub started: &'static str,
    /// Subscription alias of `end`.
    pub ended: &'static str,
    /// Reason reported for exit code `0`.
    pub clean: ExitReason,
    /// Reason reported for any other exit code.
    pub failed: ExitReason,
}

impl Vocabulary {
    /// Names used by flat (one-tier) pools.
    pub const FLAT: Vocabulary = Vocabulary {
        start: "start",
        end: "end",
        started: "started",
        ended: "ended",
        clean: ExitReason::Quit,
        failed: ExitReason::Fired,
    };

    /// Names used by hierarchical (group) pools.
    pub const HIERARCHICAL: Vocabulary = Vocabulary {
        start: "recruit",
        end: "terminate",
        started: "recruited",
        ended: "terminated",
        clean: ExitReason::Discharged,
        failed: ExitReason::Killed,
    };

    /// Maps an exit code to its reason.
    #[inline]
    pub fn reason(&self, exit_code: i32) -> ExitReason {
        if exit_code == 0 {
            self.clean
        } else {
            self.failed
        }
    }

    /// Resolves a subscription name to the wire event name.
    ///
    /// Lifecycle aliases map to their wire names; anything else is returned as is.
    pub fn wire_name<'a>(&self, name: &'a str) -> &'a str {
        if name == self.started {
            self.start
        } else if name == self.ended {
            self.end
        } else {
            name
        }
    }
}

/// Payload of the terminate event: `{ reason, exitCode, duration }`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExitReport {
    /// Reason derived from the exit code.
    pub reason: ExitReason,
    /// Final exit code (the signal sentinel when killed by a signal).
    #[serde(rename = "exitCode")]
    pub exit_code: i32,
    /// Wall-clock milliseconds since the unit (or supervisor) started.
    pub duration: u64,
}

impl ExitReport {
    /// Builds a report for `exit_code` after `elapsed`.
    pub fn new(vocabulary: &Vocabulary, exit_code: i32, elapsed: Duration) -> Self {
        Self {
            reason: vocabulary.reason(exit_code),
            exit_code,
            duration: elapsed.as_millis().min(u128::from(u64::MAX)) as u64,
        }
    }

    /// JSON payload form.
    pub fn to_value(&self) -> Value {
        serde_json::json!({
            "reason": self.reason,
            "exitCode": self.exit_code,
            "duration": self.duration,
        })
    }

    /// Parses a terminate payload; `None` if the shape does not match.
    pub fn from_value(value: &Value) -> Option<Self> {
        serde_json::from_value(value.clone()).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reasons_follow_exit_code() {
        assert_eq!(Vocabulary::FLAT.reason(0), ExitReason::Quit);
        assert_eq!(Vocabulary::FLAT.reason(128), ExitReason::Fired);
        assert_eq!(Vocabulary::HIERARCHICAL.reason(0), ExitReason::Discharged);
        assert_eq!(Vocabulary::HIERARCHICAL.reason(1), ExitReason::Killed);
    }

    #[test]
    fn aliases_resolve_to_wire_names() {
        assert_eq!(Vocabulary::FLAT.wire_name("started"), "start");
        assert_eq!(Vocabulary::FLAT.wire_name("ended"), "end");
        assert_eq!(Vocabulary::HIERARCHICAL.wire_name("terminated"), "terminate");
        assert_eq!(Vocabulary::HIERARCHICAL.wire_name("progress"), "progress");
    }

    #[test]
    fn report_uses_camel_case_exit_code() {
        let report = ExitReport::new(&Vocabulary::FLAT, 0, Duration::from_millis(1500));
        let v = report.to_value();
        assert_eq!(v["reason"], "quit");
        assert_eq!(v["exitCode"], 0);
        assert_eq!(v["duration"], 1500);
        assert_eq!(ExitReport::from_value(&v), Some(report));
    }
}
