//! Constraint emitter.
//!
//! Turns a finalized clock allocation into the placement and timing
//! directives that sharing generators makes necessary. Records are
//! structured; text is produced only by [`crate::render`].

use serde::{Deserialize, Serialize};
use tracing::debug;
use vidsoc_platform::SystemClock;

use crate::clock::{ClockAllocation, ClockRole, DomainId};

/// One platform directive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", tag = "kind")]
pub enum Constraint {
    /// Pin a clock primitive to its site.
    LocationLock { primitive: String, site: String },
    /// Allow a clock buffer output to use general routing.
    DisableDedicatedRoute { pin: String, domain: DomainId },
    /// Tag a clock net with its own timing group.
    TimingGroup {
        net: String,
        group: String,
        domain: DomainId,
    },
    /// Ignore timing between the system clock and a pixel domain.
    FalsePath {
        from_net: String,
        from_group: String,
        to_net: String,
        to_group: String,
        domain: DomainId,
    },
}

impl Constraint {
    /// Domain the record refers to, if any.
    pub fn domain(&self) -> Option<DomainId> {
        match self {
            Constraint::LocationLock { .. } => None,
            Constraint::DisableDedicatedRoute { domain, .. }
            | Constraint::TimingGroup { domain, .. }
            | Constraint::FalsePath { domain, .. } => Some(*domain),
        }
    }
}

/// Ordered, append-only list of constraints.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConstraintSet {
    records: Vec<Constraint>,
}

impl ConstraintSet {
    fn push(&mut self, constraint: Constraint) {
        debug!(?constraint, "emitted constraint");
        self.records.push(constraint);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Constraint> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Emit the constraints a finalized allocation needs.
///
/// Rule groups, in order: location locks for shared generators, dedicated
/// route release for borrowers, timing groups for every realized domain,
/// false paths from the system clock to every realized domain.
pub fn emit(allocation: &ClockAllocation, sys_clock: &SystemClock) -> ConstraintSet {
    let mut set = ConstraintSet::default();

    for (generator, users) in allocation.occupancy() {
        if users.len() > 1 {
            set.push(Constraint::LocationLock {
                primitive: generator.primitive.clone(),
                site: generator.site.clone(),
            });
        }
    }

    for domain in allocation.domains() {
        if allocation.role(domain.id) == Some(ClockRole::Borrower) {
            set.push(Constraint::DisableDedicatedRoute {
                pin: domain.buffer_pin(),
                domain: domain.id,
            });
        }
    }

    for domain in allocation.domains() {
        set.push(Constraint::TimingGroup {
            net: domain.clock_net(),
            group: domain.timing_group(),
            domain: domain.id,
        });
    }

    let sys_group = format!("GRP{}", sys_clock.net);
    for domain in allocation.domains() {
        set.push(Constraint::FalsePath {
            from_net: sys_clock.net.clone(),
            from_group: sys_group.clone(),
            to_net: domain.clock_net(),
            to_group: domain.timing_group(),
            domain: domain.id,
        });
    }

    set
}
