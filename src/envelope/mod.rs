//! Envelope protocol: the wire schema every inter-process message conforms to.
//!
//! ## Contents
//! - [`Envelope`] immutable `{ type, role, id, owner, data }` message
//! - [`Role`] sender tier (`supervisor-root` | `mid-tier` | `leaf-worker`)
//! - [`Identity`] the `(role, id, owner)` triple a node stamps on what it sends
//! - [`Vocabulary`] per-topology names of the two lifecycle control events
//! - [`ExitReport`], [`ExitReason`] payload of the terminate event
//! - [`Orders`] payload of the start command
//! - [`codec`] JSON-lines encoding used over process pipes
//!
//! ## Wire shape
//! ```text
//! { "type": "end", "role": "leaf-worker", "id": 4242, "owner": 4200,
//!   "data": { "reason": "quit", "exitCode": 0, "duration": 1503 } }
//! ```

pub mod codec;
mod message;
mod orders;
mod report;
mod role;

pub use message::{is_reserved, Envelope, Identity, ERROR_EVENT, RESERVED_EVENT_NAMES};
pub use orders::Orders;
pub use report::{ExitReason, ExitReport, Vocabulary};
pub use role::Role;
