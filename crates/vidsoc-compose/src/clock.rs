//! Clock resource arbiter.
//!
//! Hands out physical clock generators to video pipelines first-come,
//! first-served. Once the pool is exhausted a request borrows the clock of
//! the most recently allocated independent domain of the same class. The
//! donor never learns about its borrowers; the donor → borrowers side table
//! exists only so the constraint emitter can see the sharing.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use vidsoc_platform::{ClockGenerator, ResourceKind, ResourcePool};

use crate::error::{ComposeError, Result};

/// Index of a domain within its allocation.
pub type DomainId = usize;

/// Compatibility class: only peers of the same class may share a clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ClockClass {
    VideoInput,
    VideoOutput,
}

impl fmt::Display for ClockClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClockClass::VideoInput => f.write_str("video-input"),
            ClockClass::VideoOutput => f.write_str("video-output"),
        }
    }
}

/// What physically drives a domain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", tag = "kind")]
pub enum ClockSource {
    /// A generator drawn from the pool.
    Own { generator: ClockGenerator },
    /// The generator of another domain.
    Borrowed { donor: DomainId },
}

/// Role of a domain once the allocation is final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ClockRole {
    Independent,
    Donor,
    Borrower,
}

/// A logical clock domain granted to one pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClockDomain {
    pub id: DomainId,
    /// Domain name, e.g. "hdmi_out0_pix".
    pub name: String,
    /// Pipeline the domain was granted to.
    pub owner: String,
    /// Only domains of the same class may share a generator.
    pub class: ClockClass,
    /// Own generator, or the donor domain this one borrows from.
    pub source: ClockSource,
}

impl ClockDomain {
    /// Clock net driven into the domain.
    pub fn clock_net(&self) -> String {
        format!("{}_clk", self.name)
    }

    /// Output pin of the global buffer deriving this domain's clock.
    pub fn buffer_pin(&self) -> String {
        format!("{}_bufg.O", self.name)
    }

    /// Timing group tag used by timing analysis.
    pub fn timing_group(&self) -> String {
        format!("GRP{}", self.name)
    }

    pub fn donor(&self) -> Option<DomainId> {
        match self.source {
            ClockSource::Borrowed { donor } => Some(donor),
            ClockSource::Own { .. } => None,
        }
    }
}

/// Limits on clock sharing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct BorrowPolicy {
    /// Maximum borrowers a single donor may feed (unbounded if absent).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_borrowers_per_donor: Option<usize>,
}

/// Allocates clock generators during composition.
#[derive(Debug)]
pub struct ClockArbiter {
    pool: ResourcePool<ClockGenerator>,
    next_generator: usize,
    domains: Vec<ClockDomain>,
    borrowers: IndexMap<DomainId, Vec<DomainId>>,
    policy: BorrowPolicy,
}

impl ClockArbiter {
    pub fn new(pool: ResourcePool<ClockGenerator>, policy: BorrowPolicy) -> Self {
        Self {
            pool,
            next_generator: 0,
            domains: Vec::new(),
            borrowers: IndexMap::new(),
            policy,
        }
    }

    /// Request a pixel clock domain for `owner`.
    pub fn request(&mut self, owner: &str, class: ClockClass) -> Result<ClockDomain> {
        if self.domains.iter().any(|d| d.owner == owner) {
            return Err(ComposeError::DuplicateName {
                name: owner.to_string(),
            });
        }
        let id = self.domains.len();
        let name = format!("{owner}_pix");

        let source = match self.pool.get(self.next_generator) {
            Some(generator) => {
                self.next_generator += 1;
                debug!(domain = %name, site = %generator.site, "allocated clock generator");
                ClockSource::Own {
                    generator: generator.clone(),
                }
            }
            None => {
                let donor = self.pick_donor(owner, class)?;
                warn!(
                    domain = %name,
                    donor = %self.domains[donor].name,
                    "no clock generator left, sharing donor clock"
                );
                self.borrowers.entry(donor).or_default().push(id);
                ClockSource::Borrowed { donor }
            }
        };

        let domain = ClockDomain {
            id,
            name,
            owner: owner.to_string(),
            class,
            source,
        };
        self.domains.push(domain.clone());
        Ok(domain)
    }

    fn pick_donor(&self, owner: &str, class: ClockClass) -> Result<DomainId> {
        let donor = self
            .domains
            .iter()
            .rev()
            .find(|d| d.class == class && d.donor().is_none())
            .ok_or_else(|| {
                ComposeError::exhausted(
                    ResourceKind::ClockGenerator,
                    format!(
                        "'{owner}' needs a clock, all {} generator(s) are taken and no {class} domain can donate",
                        self.pool.len()
                    ),
                )
            })?;

        if let Some(max) = self.policy.max_borrowers_per_donor {
            let current = self.borrowers.get(&donor.id).map_or(0, Vec::len);
            if current >= max {
                return Err(ComposeError::exhausted(
                    ResourceKind::ClockGenerator,
                    format!(
                        "'{owner}' would be borrower #{} of '{}', policy allows {max}",
                        current + 1,
                        donor.name
                    ),
                ));
            }
        }
        Ok(donor.id)
    }

    /// Fix every domain's role.
    pub fn finalize(self) -> ClockAllocation {
        ClockAllocation {
            generators: self.pool.iter().cloned().collect(),
            domains: self.domains,
            borrowers: self.borrowers,
        }
    }
}

/// Immutable result of clock arbitration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClockAllocation {
    generators: Vec<ClockGenerator>,
    domains: Vec<ClockDomain>,
    borrowers: IndexMap<DomainId, Vec<DomainId>>,
}

impl ClockAllocation {
    /// All domains in allocation order.
    pub fn domains(&self) -> &[ClockDomain] {
        &self.domains
    }

    pub fn domain(&self, id: DomainId) -> Option<&ClockDomain> {
        self.domains.get(id)
    }

    pub fn by_name(&self, name: &str) -> Option<&ClockDomain> {
        self.domains.iter().find(|d| d.name == name)
    }

    pub fn role(&self, id: DomainId) -> Option<ClockRole> {
        let domain = self.domains.get(id)?;
        Some(match domain.source {
            ClockSource::Borrowed { .. } => ClockRole::Borrower,
            ClockSource::Own { .. } if self.borrowers.contains_key(&id) => ClockRole::Donor,
            ClockSource::Own { .. } => ClockRole::Independent,
        })
    }

    /// Borrowers fed by `donor`, in request order.
    pub fn borrowers_of(&self, donor: DomainId) -> &[DomainId] {
        self.borrowers.get(&donor).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Generator physically driving a domain.
    pub fn generator_of(&self, id: DomainId) -> Option<&ClockGenerator> {
        let domain = self.domains.get(id)?;
        match &domain.source {
            ClockSource::Own { generator } => Some(generator),
            ClockSource::Borrowed { donor } => self.generator_of(*donor),
        }
    }

    /// Generators in pool order with the domains each one drives.
    pub fn occupancy(&self) -> Vec<(&ClockGenerator, Vec<DomainId>)> {
        self.generators
            .iter()
            .map(|g| {
                let users = self
                    .domains
                    .iter()
                    .filter(|d| self.generator_of(d.id) == Some(g))
                    .map(|d| d.id)
                    .collect();
                (g, users)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool(n: usize) -> ResourcePool<ClockGenerator> {
        let gens = (0..n)
            .map(|i| ClockGenerator::new("PLL_ADV", format!("PLL_ADV_X0Y{i}")))
            .collect();
        ResourcePool::new(ResourceKind::ClockGenerator, gens).unwrap()
    }

    #[test]
    fn first_owns_second_borrows() {
        let mut arb = ClockArbiter::new(pool(1), BorrowPolicy::default());
        let out0 = arb.request("hdmi_out0", ClockClass::VideoOutput).unwrap();
        let out1 = arb.request("hdmi_out1", ClockClass::VideoOutput).unwrap();
        assert!(matches!(out0.source, ClockSource::Own { .. }));
        assert_eq!(out1.donor(), Some(out0.id));

        let alloc = arb.finalize();
        assert_eq!(alloc.role(out0.id), Some(ClockRole::Donor));
        assert_eq!(alloc.role(out1.id), Some(ClockRole::Borrower));
        assert_eq!(alloc.borrowers_of(out0.id), &[out1.id]);
        assert_eq!(alloc.generator_of(out1.id).unwrap().site, "PLL_ADV_X0Y0");
    }

    #[test]
    fn third_request_borrows_from_first() {
        let mut arb = ClockArbiter::new(pool(1), BorrowPolicy::default());
        let out0 = arb.request("hdmi_out0", ClockClass::VideoOutput).unwrap();
        arb.request("hdmi_out1", ClockClass::VideoOutput).unwrap();
        let out2 = arb.request("hdmi_out2", ClockClass::VideoOutput).unwrap();
        assert_eq!(out2.donor(), Some(out0.id));
        assert_eq!(arb.finalize().borrowers_of(out0.id).len(), 2);
    }

    #[test]
    fn policy_caps_borrowers() {
        let policy = BorrowPolicy {
            max_borrowers_per_donor: Some(1),
        };
        let mut arb = ClockArbiter::new(pool(1), policy);
        arb.request("hdmi_out0", ClockClass::VideoOutput).unwrap();
        arb.request("hdmi_out1", ClockClass::VideoOutput).unwrap();
        let err = arb
            .request("hdmi_out2", ClockClass::VideoOutput)
            .unwrap_err();
        assert!(matches!(
            err,
            ComposeError::ResourceExhausted {
                resource: ResourceKind::ClockGenerator,
                ..
            }
        ));
    }

    #[test]
    fn no_compatible_donor() {
        let mut arb = ClockArbiter::new(pool(1), BorrowPolicy::default());
        arb.request("hdmi_in0", ClockClass::VideoInput).unwrap();
        let err = arb
            .request("hdmi_out0", ClockClass::VideoOutput)
            .unwrap_err();
        assert!(err.to_string().contains("no video-output domain can donate"));
    }

    #[test]
    fn empty_pool_first_request_fails() {
        let mut arb = ClockArbiter::new(pool(0), BorrowPolicy::default());
        assert!(arb.request("hdmi_out0", ClockClass::VideoOutput).is_err());
    }

    #[test]
    fn donor_is_most_recent_independent_of_class() {
        let mut arb = ClockArbiter::new(pool(3), BorrowPolicy::default());
        arb.request("hdmi_out0", ClockClass::VideoOutput).unwrap();
        let out1 = arb.request("hdmi_out1", ClockClass::VideoOutput).unwrap();
        arb.request("hdmi_in0", ClockClass::VideoInput).unwrap();
        let out2 = arb.request("hdmi_out2", ClockClass::VideoOutput).unwrap();
        assert_eq!(out2.donor(), Some(out1.id));
    }

    #[test]
    fn same_owner_twice_rejected() {
        let mut arb = ClockArbiter::new(pool(2), BorrowPolicy::default());
        arb.request("hdmi_out0", ClockClass::VideoOutput).unwrap();
        assert!(matches!(
            arb.request("hdmi_out0", ClockClass::VideoOutput),
            Err(ComposeError::DuplicateName { .. })
        ));
    }

    #[test]
    fn occupancy_tracks_sharing() {
        let mut arb = ClockArbiter::new(pool(2), BorrowPolicy::default());
        arb.request("hdmi_in0", ClockClass::VideoInput).unwrap();
        arb.request("hdmi_out0", ClockClass::VideoOutput).unwrap();
        arb.request("hdmi_out1", ClockClass::VideoOutput).unwrap();
        let alloc = arb.finalize();
        let occ = alloc.occupancy();
        assert_eq!(occ[0].1, vec![0]);
        assert_eq!(occ[1].1, vec![1, 2]);
        assert_eq!(alloc.role(0), Some(ClockRole::Independent));
    }

    #[test]
    fn derived_names() {
        let mut arb = ClockArbiter::new(pool(1), BorrowPolicy::default());
        let d = arb.request("hdmi_out1", ClockClass::VideoOutput).unwrap();
        assert_eq!(d.name, "hdmi_out1_pix");
        assert_eq!(d.clock_net(), "hdmi_out1_pix_clk");
        assert_eq!(d.buffer_pin(), "hdmi_out1_pix_bufg.O");
        assert_eq!(d.timing_group(), "GRPhdmi_out1_pix");
    }
}
