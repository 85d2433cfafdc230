//! Human-readable summary of a composed system.

use std::fmt;

use crate::clock::ClockRole;
use crate::system::Composition;

/// Summary of one composition, rendered for the terminal.
#[derive(Debug, Clone)]
pub struct CompositionReport {
    pub system: String,
    pub platform: String,
    /// (name, slot, address) in slot order.
    pub registers: Vec<(String, u32, u64)>,
    /// (name, line) in line order.
    pub interrupts: Vec<(String, u32)>,
    /// (domain, role, generator site) in allocation order.
    pub clocks: Vec<(String, ClockRole, String)>,
    /// (donor, borrowers) for every generator shared between domains.
    pub sharing: Vec<(String, Vec<String>)>,
    pub constraint_count: usize,
    pub free_crossbar_ports: u32,
    pub unclaimed_connectors: usize,
    /// (depth, data width, domain) of the trace capturer, if bound.
    pub trace: Option<(u32, u32, String)>,
    pub fingerprint: String,
}

impl CompositionReport {
    pub fn new(composition: &Composition) -> Self {
        let registers = composition
            .registers
            .iter()
            .filter_map(|(name, slot)| {
                let address = composition.csr.slot_address(slot)?;
                Some((name.to_string(), slot, address))
            })
            .collect();
        let interrupts = composition
            .interrupts
            .iter()
            .map(|(name, line)| (name.to_string(), line))
            .collect();
        let alloc = &composition.clocks;
        let clocks = alloc
            .domains()
            .iter()
            .filter_map(|d| {
                let role = alloc.role(d.id)?;
                let site = alloc.generator_of(d.id)?.site.clone();
                Some((d.name.clone(), role, site))
            })
            .collect();
        let sharing = alloc
            .domains()
            .iter()
            .filter(|d| alloc.role(d.id) == Some(ClockRole::Donor))
            .map(|d| {
                let borrowers = alloc
                    .borrowers_of(d.id)
                    .iter()
                    .filter_map(|&b| alloc.domain(b))
                    .map(|b| b.name.clone())
                    .collect();
                (d.name.clone(), borrowers)
            })
            .collect();

        Self {
            system: composition.system.clone(),
            platform: composition.platform.clone(),
            registers,
            interrupts,
            clocks,
            sharing,
            constraint_count: composition.constraints.len(),
            free_crossbar_ports: composition.free_crossbar_ports,
            unclaimed_connectors: composition.unclaimed_connectors,
            trace: composition
                .trace
                .as_ref()
                .map(|t| (t.depth(), t.data_width(), t.clock_domain().to_string())),
            fingerprint: composition.fingerprint.clone(),
        }
    }
}

impl fmt::Display for CompositionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Composition Report ===")?;
        writeln!(f, "System: {}", self.system)?;
        writeln!(f, "Platform: {}", self.platform)?;
        writeln!(f)?;

        writeln!(f, "--- CSR map ({} peripherals) ---", self.registers.len())?;
        for (name, slot, address) in &self.registers {
            writeln!(f, "  {slot:>3}  0x{address:08x}  {name}")?;
        }

        writeln!(f)?;
        writeln!(f, "--- Interrupts ({}) ---", self.interrupts.len())?;
        for (name, line) in &self.interrupts {
            writeln!(f, "  {line:>3}  {name}")?;
        }

        writeln!(f)?;
        writeln!(f, "--- Clock domains ({}) ---", self.clocks.len())?;
        for (name, role, site) in &self.clocks {
            let role = match role {
                ClockRole::Independent => "independent",
                ClockRole::Donor => "donor",
                ClockRole::Borrower => "borrower",
            };
            writeln!(f, "  {name:<16} {role:<12} {site}")?;
        }
        for (donor, borrowers) in &self.sharing {
            writeln!(f, "  {donor} feeds {}", borrowers.join(", "))?;
        }

        writeln!(f)?;
        writeln!(f, "--- Constraints: {} ---", self.constraint_count)?;
        match &self.trace {
            Some((depth, width, domain)) => writeln!(
                f,
                "--- Trace: {width} bits x {depth} samples in {domain} ---"
            )?,
            None => writeln!(f, "--- Trace: none ---")?,
        }
        writeln!(
            f,
            "--- Spare: {} crossbar port(s), {} connector(s) ---",
            self.free_crossbar_ports, self.unclaimed_connectors
        )?;
        writeln!(f)?;
        writeln!(f, "Fingerprint: {}", self.fingerprint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::PipelineDecl;
    use crate::system::{compose_system, SystemConfig};
    use vidsoc_platform::Platform;

    #[test]
    fn report_display() {
        let composition =
            compose_system(&Platform::opsis(), &SystemConfig::opsis_video()).unwrap();
        let report = CompositionReport::new(&composition);
        let output = report.to_string();

        assert!(output.contains("System: opsis_video"));
        assert!(output.contains("--- CSR map (18 peripherals) ---"));
        assert!(output.contains("0xe0005800  hdmi_in0"));
        assert!(output.contains("hdmi_out1_pix    borrower     PLL_ADV_X0Y0"));
        assert!(output.contains("31 bits x 2048 samples in hdmi_in0_pix"));
        assert!(output.contains("  hdmi_out0_pix feeds hdmi_out1_pix\n"));
        assert!(output.contains("--- Spare: 4 crossbar port(s), 0 connector(s) ---"));
        assert!(output.ends_with(&format!("Fingerprint: {}\n", composition.fingerprint)));
    }

    #[test]
    fn report_without_trace() {
        let mut config = SystemConfig::opsis_video();
        config.trace = None;
        let composition = compose_system(&Platform::opsis(), &config).unwrap();
        let report = CompositionReport::new(&composition);
        assert!(report.trace.is_none());
        assert!(report.to_string().contains("--- Trace: none ---"));
        assert_eq!(report.registers.len(), 17);
    }

    #[test]
    fn report_lists_every_borrower() {
        let mut platform = Platform::opsis();
        platform.clock_generators.truncate(3);
        let mut config = SystemConfig::opsis_video();
        config.pipelines = vec![
            PipelineDecl::input(0).with_interrupt(3),
            PipelineDecl::output(0),
            PipelineDecl::output(1),
        ];
        config.trace = None;
        let composition = compose_system(&platform, &config).unwrap();
        let report = CompositionReport::new(&composition);
        assert_eq!(
            report.sharing,
            vec![("hdmi_out0_pix".to_string(), vec!["hdmi_out1_pix".to_string()])]
        );
        assert_eq!(report.unclaimed_connectors, 1);
    }
}
