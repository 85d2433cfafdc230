//! Complete board model.
//!
//! Describes the finite resource spaces a system image is composed against:
//! CSR slots, interrupt lines, clock generators, crossbar ports and the
//! physical connectors pipelines attach to.

use serde::{Deserialize, Serialize};

use crate::error::{PlatformError, Result};
use crate::pool::{RangePool, ResourceKind, ResourcePool};

/// Layout of the control/status register address space.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CsrSpace {
    /// Number of addressable CSR slots.
    pub slots: u32,
    /// Bus address of slot 0.
    pub base_address: u64,
    /// Bytes of address space per slot.
    pub region_size: u64,
}

impl CsrSpace {
    /// Bus address of a CSR slot, or `None` past the 64-bit address space.
    pub fn slot_address(&self, slot: u32) -> Option<u64> {
        u64::from(slot)
            .checked_mul(self.region_size)?
            .checked_add(self.base_address)
    }

    /// Last byte of the CSR window. `None` for an empty window or one that
    /// does not fit in 64 bits.
    pub fn window_end(&self) -> Option<u64> {
        let last = self.slots.checked_sub(1)?;
        self.slot_address(last)?
            .checked_add(self.region_size.checked_sub(1)?)
    }
}

/// A physical clock generator site on the device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ClockGenerator {
    /// Primitive type (e.g. "PLL_ADV").
    pub primitive: String,
    /// Placement site (e.g. "PLL_ADV_X0Y0").
    pub site: String,
    /// Base-system block holding this generator, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reserved_by: Option<String>,
}

impl ClockGenerator {
    /// An unreserved generator.
    pub fn new(primitive: impl Into<String>, site: impl Into<String>) -> Self {
        Self {
            primitive: primitive.into(),
            site: site.into(),
            reserved_by: None,
        }
    }

    /// Mark the generator as held by a base-system block.
    pub fn reserved(mut self, by: impl Into<String>) -> Self {
        self.reserved_by = Some(by.into());
        self
    }
}

/// A physical connector a pipeline can be attached to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Connector {
    /// Connector kind (e.g. "hdmi_in", "hdmi_out").
    pub kind: String,
    /// Index among connectors of the same kind.
    pub index: u32,
}

impl Connector {
    /// Create a connector descriptor.
    pub fn new(kind: impl Into<String>, index: u32) -> Self {
        Self {
            kind: kind.into(),
            index,
        }
    }
}

/// The system (CPU/bus) clock every pixel domain crosses into.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SystemClock {
    /// Clock net name.
    pub net: String,
    /// Frequency in Hz.
    pub frequency_hz: u64,
}

/// A complete board description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Platform {
    /// Board name (e.g. "opsis").
    pub name: String,
    /// FPGA device part.
    pub device: String,
    /// CSR address space.
    pub csr: CsrSpace,
    /// Number of interrupt lines on the interrupt controller.
    pub interrupt_lines: u32,
    /// Clock generator sites, in allocation order.
    pub clock_generators: Vec<ClockGenerator>,
    /// Number of user ports on the memory crossbar.
    pub crossbar_ports: u32,
    /// System clock.
    pub sys_clock: SystemClock,
    /// Physical connectors.
    #[serde(default)]
    pub connectors: Vec<Connector>,
}

impl Platform {
    /// Pool of CSR slots. Fails if the CSR window overflows the address
    /// space.
    pub fn register_pool(&self) -> Result<RangePool> {
        if self.csr.slots > 0 && self.csr.window_end().is_none() {
            return Err(PlatformError::Validation {
                detail: format!(
                    "{} CSR slots of 0x{:X} bytes from 0x{:X} overflow the address space",
                    self.csr.slots, self.csr.region_size, self.csr.base_address
                ),
            });
        }
        Ok(RangePool::new(ResourceKind::RegisterSlot, self.csr.slots))
    }

    /// Pool of interrupt lines.
    pub fn interrupt_pool(&self) -> RangePool {
        RangePool::new(ResourceKind::InterruptLine, self.interrupt_lines)
    }

    /// Pool of clock generators available to pipelines (reserved ones excluded).
    pub fn clock_pool(&self) -> Result<ResourcePool<ClockGenerator>> {
        let free = self
            .clock_generators
            .iter()
            .filter(|g| g.reserved_by.is_none())
            .cloned()
            .collect();
        ResourcePool::new(ResourceKind::ClockGenerator, free)
    }

    /// Start tracking connector claims against this board.
    pub fn connector_claims(&self) -> ConnectorClaims {
        ConnectorClaims {
            connectors: self.connectors.iter().map(|c| (c.clone(), false)).collect(),
        }
    }

    /// Construct the Numato Opsis board.
    ///
    /// Spartan-6 LX45T with four PLL_ADV sites, one of which is taken by the
    /// clock/reset generator, two HDMI inputs and two HDMI outputs.
    pub fn opsis() -> Self {
        Self {
            name: "opsis".into(),
            device: "xc6slx45t-fgg484-3".into(),
            csr: CsrSpace {
                slots: 32,
                base_address: 0xe000_0000,
                region_size: 0x800,
            },
            interrupt_lines: 32,
            clock_generators: vec![
                ClockGenerator::new("PLL_ADV", "PLL_ADV_X0Y3").reserved("crg"),
                ClockGenerator::new("PLL_ADV", "PLL_ADV_X0Y2"),
                ClockGenerator::new("PLL_ADV", "PLL_ADV_X0Y1"),
                ClockGenerator::new("PLL_ADV", "PLL_ADV_X0Y0"),
            ],
            crossbar_ports: 8,
            sys_clock: SystemClock {
                net: "sys_clk".into(),
                frequency_hz: 50_000_000,
            },
            connectors: vec![
                Connector::new("hdmi_in", 0),
                Connector::new("hdmi_in", 1),
                Connector::new("hdmi_out", 0),
                Connector::new("hdmi_out", 1),
            ],
        }
    }
}

/// Tracks which connectors have been handed out during one composition.
#[derive(Debug, Clone)]
pub struct ConnectorClaims {
    connectors: Vec<(Connector, bool)>,
}

impl ConnectorClaims {
    /// Claim a connector. Each connector can be claimed once.
    pub fn request(&mut self, kind: &str, index: u32) -> Result<Connector> {
        let entry = self
            .connectors
            .iter_mut()
            .find(|(c, _)| c.kind == kind && c.index == index)
            .ok_or_else(|| PlatformError::ConnectorUnavailable {
                kind: kind.into(),
                index,
                reason: "not present on this board",
            })?;
        if entry.1 {
            return Err(PlatformError::ConnectorUnavailable {
                kind: kind.into(),
                index,
                reason: "already claimed",
            });
        }
        entry.1 = true;
        Ok(entry.0.clone())
    }

    /// Number of connectors not yet claimed.
    pub fn unclaimed(&self) -> usize {
        self.connectors.iter().filter(|(_, claimed)| !claimed).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opsis_pools() {
        let p = Platform::opsis();
        assert_eq!(p.register_pool().unwrap().len(), 32);
        assert_eq!(p.interrupt_pool().len(), 32);
        let clocks = p.clock_pool().unwrap();
        assert_eq!(clocks.len(), 3);
        assert!(clocks.iter().all(|g| g.reserved_by.is_none()));
        assert_eq!(clocks.get(2).unwrap().site, "PLL_ADV_X0Y0");
    }

    #[test]
    fn csr_slot_address() {
        let p = Platform::opsis();
        assert_eq!(p.csr.slot_address(0), Some(0xe000_0000));
        assert_eq!(p.csr.slot_address(13), Some(0xe000_6800));
        assert_eq!(p.csr.window_end(), Some(0xe000_ffff));
    }

    #[test]
    fn csr_window_past_address_space() {
        let mut p = Platform::opsis();
        p.csr.base_address = 0;
        p.csr.region_size = 1 << 62;
        assert_eq!(p.csr.slot_address(3), Some(3 << 62));
        assert_eq!(p.csr.slot_address(4), None);
        assert_eq!(p.csr.window_end(), None);
        assert!(matches!(
            p.register_pool(),
            Err(PlatformError::Validation { .. })
        ));
    }

    #[test]
    fn full_width_pools_are_cheap() {
        let mut p = Platform::opsis();
        p.csr.slots = u32::MAX;
        p.interrupt_lines = u32::MAX;
        assert_eq!(p.register_pool().unwrap().len(), u32::MAX);
        assert!(p.interrupt_pool().contains(u32::MAX - 1));
    }

    #[test]
    fn connector_claimed_once() {
        let p = Platform::opsis();
        let mut claims = p.connector_claims();
        let c = claims.request("hdmi_in", 0).unwrap();
        assert_eq!(c, Connector::new("hdmi_in", 0));
        assert_eq!(claims.unclaimed(), 3);

        let err = claims.request("hdmi_in", 0).unwrap_err();
        assert!(err.to_string().contains("already claimed"));
    }

    #[test]
    fn missing_connector() {
        let p = Platform::opsis();
        let mut claims = p.connector_claims();
        let err = claims.request("hdmi_in", 2).unwrap_err();
        assert!(matches!(err, PlatformError::ConnectorUnavailable { index: 2, .. }));
    }

    #[test]
    fn duplicate_generator_site_rejected() {
        let mut p = Platform::opsis();
        p.clock_generators
            .push(ClockGenerator::new("PLL_ADV", "PLL_ADV_X0Y0"));
        assert!(p.clock_pool().is_err());
    }
}
