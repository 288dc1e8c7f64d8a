//! # Relay: routing of envelopes between tiers.
//!
//! A relay sits in every supervising node. It knows its own role and the set of
//! subordinate roles below it (its direct units and their descendants).
//!
//! ```text
//!              parent
//!                ▲  │
//!      upward()  │  │  inbound()
//!  (known roles) │  ▼  Local | Forward | Ignore
//!            ┌────────┐
//!            │ Relay  │
//!            └────────┘
//!                ▲  │
//!                │  ▼
//!              units
//! ```
//!
//! ## Rules
//! - Upward: envelopes whose role is a known subordinate role pass verbatim;
//!   anything else is dropped silently.
//! - Inbound: envelopes addressed to this tier's role are handled locally;
//!   those addressed to a subordinate role are forwarded down unmodified.

use crate::envelope::{Envelope, Role};

/// Where an inbound envelope goes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Inbound {
    /// Addressed to this tier.
    Local,
    /// Addressed to a subordinate tier.
    Forward,
    /// Addressed to nobody this relay knows.
    Ignore,
}

/// Role-based envelope filter of one supervising node.
#[derive(Clone, Debug)]
pub struct Relay {
    role: Role,
    subordinates: Vec<Role>,
}

impl Relay {
    /// Relay for a node of `role` whose direct units play `units`.
    ///
    /// Group units bring their leaf workers along, so their role set is both.
    pub fn new(role: Role, units: &Role) -> Self {
        let subordinates = match units {
            Role::Group => vec![Role::Group, Role::Worker],
            other => vec![other.clone()],
        };
        Self { role, subordinates }
    }

    /// Role of the node this relay belongs to.
    pub fn role(&self) -> &Role {
        &self.role
    }

    /// True if `role` is below this node.
    pub fn is_subordinate(&self, role: &Role) -> bool {
        self.subordinates.contains(role)
    }

    /// Filters an envelope coming up from a unit.
    pub fn upward(&self, envelope: Envelope) -> Option<Envelope> {
        if self.is_subordinate(envelope.role()) {
            Some(envelope)
        } else {
            tracing::trace!(
                role = %envelope.role(),
                kind = envelope.kind(),
                "dropping envelope from unknown role"
            );
            None
        }
    }

    /// Classifies an envelope coming down from the parent.
    pub fn inbound(&self, envelope: &Envelope) -> Inbound {
        if *envelope.role() == self.role {
            Inbound::Local
        } else if self.is_subordinate(envelope.role()) {
            Inbound::Forward
        } else {
            Inbound::Ignore
        }
    }
}
