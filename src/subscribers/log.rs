//! # Logging subscriber for debugging and demos.
//!
//! [`LogWriter`] turns every envelope into a `tracing` event. Lifecycle
//! terminations carry their exit report as fields.
//!
//! ## Output format (fmt subscriber)
//! ```text
//! INFO legion::log: start role=leaf-worker unit=4242 owner=Some(4200)
//! INFO legion::log: end role=leaf-worker unit=4242 owner=Some(4200) reason=quit code=0 duration_ms=1503
//! INFO legion::log: progress role=leaf-worker unit=4242 owner=Some(4200) data={"done":3}
//! ```

use async_trait::async_trait;

use crate::envelope::{Envelope, ExitReport};
use crate::subscribers::Subscribe;

/// Writes envelopes as `tracing` events under the `legion::log` target.
///
/// Enabled via the `logging` feature. Implement a custom [`Subscribe`] for
/// anything beyond debugging.
pub struct LogWriter;

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Envelope) {
        let role = e.role().as_str();
        if e.is_end() {
            if let Some(report) = ExitReport::from_value(e.data()) {
                tracing::info!(
                    target: "legion::log",
                    role,
                    unit = e.id(),
                    owner = ?e.owner(),
                    reason = ?report.reason,
                    code = report.exit_code,
                    duration_ms = report.duration,
                    "{}",
                    e.kind()
                );
                return;
            }
        }
        if e.data().is_null() {
            tracing::info!(target: "legion::log", role, unit = e.id(), owner = ?e.owner(), "{}", e.kind());
        } else {
            tracing::info!(
                target: "legion::log",
                role,
                unit = e.id(),
                owner = ?e.owner(),
                data = %e.data(),
                "{}",
                e.kind()
            );
        }
    }

    fn name(&self) -> &'static str {
        "log_writer"
    }
}
