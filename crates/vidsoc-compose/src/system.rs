//! Single-pass elaboration of a complete system image.
//!
//! Registries, the crossbar and the clock arbiter are created fresh for
//! every call and consumed into an immutable [`Composition`]. Any error
//! aborts the whole elaboration; nothing partial is returned.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use vidsoc_platform::{CsrSpace, Platform};

use crate::clock::{BorrowPolicy, ClockAllocation, ClockArbiter};
use crate::constraint::{emit, ConstraintSet};
use crate::digest::Fingerprinter;
use crate::error::{ComposeError, Result};
use crate::interrupt::{InterruptMap, InterruptRegistry};
use crate::memory::{Crossbar, SYS_DOMAIN};
use crate::network::IpRange;
use crate::pipeline::{PipelineComposer, PipelineDecl, VideoPipeline};
use crate::registry::{PeripheralRegistry, RegisterMap};
use crate::trace::{bind, TraceCapture, ANALYZER};

/// Trace capturer attachment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct TraceConfig {
    /// Pipeline whose signals are captured.
    pub pipeline: String,
    /// Signal short names, e.g. "chansync.valid_i".
    pub signals: Vec<String>,
    /// Samples held by the capture buffer.
    pub depth: u32,
    /// Sampling domain; the pipeline's own pixel domain if absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clock_domain: Option<String>,
}

/// Description of one system image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SystemConfig {
    pub name: String,
    #[serde(default = "default_iprange")]
    pub iprange: String,
    /// Native word width of the memory crossbar.
    #[serde(default = "default_crossbar_width")]
    pub crossbar_width: u32,
    /// CSR slots held by the base system.
    #[serde(default)]
    pub csr_base: IndexMap<String, u32>,
    /// Interrupt lines held by the base system.
    #[serde(default)]
    pub interrupt_base: IndexMap<String, u32>,
    /// Pipelines, in composition order.
    pub pipelines: Vec<PipelineDecl>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace: Option<TraceConfig>,
    #[serde(default)]
    pub clock_policy: BorrowPolicy,
}

fn default_iprange() -> String {
    "192.168.100".to_string()
}

fn default_crossbar_width() -> u32 {
    64
}

impl SystemConfig {
    /// The two-in, two-out HDMI video mixer with a logic analyzer on the
    /// first input's channel synchronizer.
    pub fn opsis_video() -> Self {
        let csr_base = [
            "ctrl",
            "crg",
            "uart_phy",
            "uart",
            "identifier_mem",
            "timer0",
            "ddrphy",
            "sdram",
            "info",
            "ethphy",
            "ethmac",
        ]
        .into_iter()
        .enumerate()
        .map(|(slot, name)| (name.to_string(), slot as u32))
        .collect();
        let interrupt_base = [("uart", 0), ("timer0", 1), ("ethmac", 2)]
            .into_iter()
            .map(|(name, line)| (name.to_string(), line))
            .collect();

        Self {
            name: "opsis_video".into(),
            csr_base,
            interrupt_base,
            pipelines: vec![
                PipelineDecl::input(0).with_interrupt(3),
                PipelineDecl::input(1).with_interrupt(4),
                PipelineDecl::output(0),
                PipelineDecl::output(1),
            ],
            trace: Some(TraceConfig {
                pipeline: "hdmi_in0".into(),
                signals: vec![
                    "chansync.valid_i".into(),
                    "chansync.data_in0".into(),
                    "chansync.data_in1".into(),
                    "chansync.data_in2".into(),
                ],
                depth: 2048,
                clock_domain: Some("hdmi_in0_pix".into()),
            }),
            clock_policy: BorrowPolicy::default(),
            iprange: default_iprange(),
            crossbar_width: default_crossbar_width(),
        }
    }
}

/// The finished, immutable system image.
#[derive(Debug, Serialize)]
pub struct Composition {
    pub system: String,
    pub platform: String,
    pub csr: CsrSpace,
    pub registers: RegisterMap,
    pub interrupts: InterruptMap,
    pub clocks: ClockAllocation,
    pub pipelines: Vec<VideoPipeline>,
    pub constraints: ConstraintSet,
    pub trace: Option<TraceCapture>,
    pub constants: IndexMap<String, u64>,
    /// Crossbar ports left for further masters.
    pub free_crossbar_ports: u32,
    /// Board connectors no pipeline claimed.
    pub unclaimed_connectors: usize,
    /// SHA-256 over maps, constraints and constants.
    pub fingerprint: String,
}

impl Composition {
    pub fn pipeline(&self, name: &str) -> Option<&VideoPipeline> {
        self.pipelines.iter().find(|p| p.name == name)
    }
}

/// Compose `config` against `platform`.
pub fn compose_system(platform: &Platform, config: &SystemConfig) -> Result<Composition> {
    info!(system = %config.name, platform = %platform.name, "composing system");
    let constants = IpRange::parse(&config.iprange)?.constants();

    let register_pool = platform.register_pool()?;
    let mut registers = PeripheralRegistry::with_base(register_pool, &config.csr_base)?;
    let mut interrupts = InterruptRegistry::new(platform.interrupt_pool());
    let mut connectors = platform.connector_claims();
    let mut crossbar = Crossbar::new(platform.crossbar_ports, config.crossbar_width);
    let mut clocks = ClockArbiter::new(platform.clock_pool()?, config.clock_policy.clone());

    let mut pipelines = Vec::with_capacity(config.pipelines.len());
    for decl in &config.pipelines {
        let name = decl.name();
        let connector = connectors.request(decl.kind.prefix(), decl.index)?;
        let clock = clocks.request(&name, decl.kind.clock_class())?;
        let port = crossbar.get_port(decl.kind.port_request(&clock.name))?;
        let pipeline = PipelineComposer::new(&mut registers, &mut interrupts)
            .compose(decl, connector, port, &clock)?;
        pipelines.push(pipeline);
    }
    interrupts.merge(&config.interrupt_base)?;

    let clocks = clocks.finalize();
    let constraints = emit(&clocks, &platform.sys_clock);
    debug!(count = constraints.len(), "constraints emitted");

    let trace = match &config.trace {
        Some(trace) => {
            let capture = bind_trace(trace, &pipelines, &clocks)?;
            registers.register(ANALYZER)?;
            Some(capture)
        }
        None => None,
    };

    let registers = registers.snapshot();
    let interrupts = interrupts.snapshot();
    let mut digest = Fingerprinter::new();
    digest
        .section("registers", &registers)?
        .section("interrupts", &interrupts)?
        .section("clocks", &clocks)?
        .section("constraints", &constraints)?
        .section("constants", &constants)?;
    let fingerprint = digest.finish().to_string();
    info!(
        peripherals = registers.len(),
        interrupts = interrupts.len(),
        domains = clocks.domains().len(),
        constraints = constraints.len(),
        %fingerprint,
        "system composed"
    );

    Ok(Composition {
        system: config.name.clone(),
        platform: platform.name.clone(),
        csr: platform.csr.clone(),
        registers,
        interrupts,
        clocks,
        pipelines,
        constraints,
        trace,
        constants,
        free_crossbar_ports: crossbar.remaining(),
        unclaimed_connectors: connectors.unclaimed(),
        fingerprint,
    })
}

fn bind_trace(
    config: &TraceConfig,
    pipelines: &[VideoPipeline],
    clocks: &ClockAllocation,
) -> Result<TraceCapture> {
    let pipeline = pipelines
        .iter()
        .find(|p| p.name == config.pipeline)
        .ok_or_else(|| ComposeError::UnknownPipeline {
            name: config.pipeline.clone(),
        })?;
    let signals = config
        .signals
        .iter()
        .map(|short| {
            pipeline
                .signal(short)
                .cloned()
                .ok_or_else(|| ComposeError::UnknownSignal {
                    pipeline: pipeline.name.clone(),
                    signal: short.clone(),
                })
        })
        .collect::<Result<Vec<_>>>()?;
    let domain = config
        .clock_domain
        .clone()
        .unwrap_or_else(|| pipeline.clock_domain.clone());
    if domain != SYS_DOMAIN && clocks.by_name(&domain).is_none() {
        return Err(ComposeError::UnknownClockDomain { name: domain });
    }
    bind(signals, config.depth, &domain)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ClockRole;
    use crate::constraint::Constraint;
    use vidsoc_platform::{ClockGenerator, ResourceKind};

    fn outputs_only(generators: usize) -> (Platform, SystemConfig) {
        let mut platform = Platform::opsis();
        platform.clock_generators = (0..generators)
            .map(|i| ClockGenerator::new("PLL_ADV", format!("PLL_ADV_X0Y{i}")))
            .collect();
        let mut config = SystemConfig::opsis_video();
        config.pipelines = vec![PipelineDecl::output(0), PipelineDecl::output(1)];
        config.trace = None;
        (platform, config)
    }

    #[test]
    fn opsis_video_composes() {
        let c = compose_system(&Platform::opsis(), &SystemConfig::opsis_video()).unwrap();

        assert_eq!(c.registers.get("hdmi_in0"), Some(11));
        assert_eq!(c.registers.get("hdmi_in0_edid_mem"), Some(12));
        assert_eq!(c.registers.get("hdmi_out1"), Some(16));
        assert_eq!(c.registers.get("analyzer"), Some(17));
        assert_eq!(c.interrupts.get("hdmi_in0"), Some(3));
        assert_eq!(c.interrupts.get("hdmi_in1"), Some(4));
        assert_eq!(c.interrupts.get("ethmac"), Some(2));

        let out0 = c.clocks.by_name("hdmi_out0_pix").unwrap();
        let out1 = c.clocks.by_name("hdmi_out1_pix").unwrap();
        assert_eq!(c.clocks.role(out0.id), Some(ClockRole::Donor));
        assert_eq!(out1.donor(), Some(out0.id));
        assert_eq!(c.clocks.generator_of(out0.id).unwrap().site, "PLL_ADV_X0Y0");

        let trace = c.trace.as_ref().unwrap();
        assert_eq!(trace.depth(), 2048);
        assert_eq!(trace.clock_domain(), "hdmi_in0_pix");
        assert_eq!(trace.signals().len(), 4);
        assert_eq!(c.constants["LOCALIP3"], 100);
        assert_eq!(c.free_crossbar_ports, 4);
        assert_eq!(c.unclaimed_connectors, 0);
    }

    #[test]
    fn spare_resources_after_outputs_only() {
        let (platform, config) = outputs_only(2);
        let c = compose_system(&platform, &config).unwrap();
        assert_eq!(c.free_crossbar_ports, 6);
        assert_eq!(c.unclaimed_connectors, 2);
    }

    #[test]
    fn full_width_controllers_compose() {
        let mut platform = Platform::opsis();
        platform.csr.slots = u32::MAX;
        platform.csr.base_address = 0;
        platform.csr.region_size = 1;
        platform.interrupt_lines = u32::MAX;
        let c = compose_system(&platform, &SystemConfig::opsis_video()).unwrap();
        assert_eq!(c.registers.get("analyzer"), Some(17));
        assert_eq!(c.interrupts.get("hdmi_in1"), Some(4));
    }

    #[test]
    fn csr_window_overflow_fails() {
        let mut platform = Platform::opsis();
        platform.csr.base_address = 0;
        platform.csr.region_size = 1 << 62;
        let err = compose_system(&platform, &SystemConfig::opsis_video()).unwrap_err();
        assert!(matches!(err, ComposeError::Platform(_)));
        assert!(err.to_string().contains("overflow"));
    }

    #[test]
    fn borrowed_output_scenario() {
        let (platform, config) = outputs_only(1);
        let c = compose_system(&platform, &config).unwrap();

        let out0 = c.clocks.by_name("hdmi_out0_pix").unwrap();
        let out1 = c.clocks.by_name("hdmi_out1_pix").unwrap();
        assert_eq!(c.clocks.role(out0.id), Some(ClockRole::Donor));
        assert_eq!(c.clocks.role(out1.id), Some(ClockRole::Borrower));
        assert_eq!(out1.donor(), Some(out0.id));

        let routes: Vec<_> = c
            .constraints
            .iter()
            .filter(|x| matches!(x, Constraint::DisableDedicatedRoute { .. }))
            .collect();
        assert_eq!(routes.len(), 1);
        assert!(matches!(
            routes[0],
            Constraint::DisableDedicatedRoute { pin, .. } if pin == "hdmi_out1_pix_bufg.O"
        ));
        let groups = c
            .constraints
            .iter()
            .filter(|x| matches!(x, Constraint::TimingGroup { .. }))
            .count();
        let false_paths = c
            .constraints
            .iter()
            .filter(|x| matches!(x, Constraint::FalsePath { .. }))
            .count();
        assert_eq!(groups, 2);
        assert_eq!(false_paths, 2);
    }

    #[test]
    fn deterministic_across_runs() {
        let platform = Platform::opsis();
        let config = SystemConfig::opsis_video();
        let a = compose_system(&platform, &config).unwrap();
        let b = compose_system(&platform, &config).unwrap();
        assert_eq!(a.registers, b.registers);
        assert_eq!(a.interrupts, b.interrupts);
        assert_eq!(a.constraints, b.constraints);
        assert_eq!(a.fingerprint, b.fingerprint);
    }

    #[test]
    fn declaration_order_changes_fingerprint() {
        let platform = Platform::opsis();
        let mut config = SystemConfig::opsis_video();
        let a = compose_system(&platform, &config).unwrap();
        config.pipelines.swap(0, 1);
        let b = compose_system(&platform, &config).unwrap();
        assert_ne!(a.fingerprint, b.fingerprint);
        assert_eq!(b.registers.get("hdmi_in1"), Some(11));
    }

    #[test]
    fn outputs_first_gives_classic_opsis_layout() {
        let mut config = SystemConfig::opsis_video();
        config.pipelines.rotate_left(2);
        let c = compose_system(&Platform::opsis(), &config).unwrap();
        let declared: Vec<(&str, u32)> = c.registers.iter().filter(|(_, s)| *s >= 11).collect();
        assert_eq!(
            declared,
            vec![
                ("hdmi_out0", 11),
                ("hdmi_out1", 12),
                ("hdmi_in0", 13),
                ("hdmi_in0_edid_mem", 14),
                ("hdmi_in1", 15),
                ("hdmi_in1_edid_mem", 16),
                ("analyzer", 17),
            ]
        );
        let in1 = c.clocks.by_name("hdmi_in1_pix").unwrap();
        assert_eq!(in1.donor(), Some(c.clocks.by_name("hdmi_in0_pix").unwrap().id));
    }

    #[test]
    fn duplicate_pipeline_fails() {
        let mut config = SystemConfig::opsis_video();
        config.pipelines.push(PipelineDecl::input(0));
        let err = compose_system(&Platform::opsis(), &config).unwrap_err();
        // The connector is claimed before any name is registered.
        assert!(matches!(err, ComposeError::Platform(_)));
    }

    #[test]
    fn duplicate_with_base_name_fails() {
        let mut config = SystemConfig::opsis_video();
        config.csr_base.insert("hdmi_out0".into(), 20);
        let err = compose_system(&Platform::opsis(), &config).unwrap_err();
        assert!(matches!(err, ComposeError::DuplicateName { ref name } if name == "hdmi_out0"));
    }

    #[test]
    fn interrupt_collision_with_base_fails() {
        let mut config = SystemConfig::opsis_video();
        config.pipelines[0].interrupt = Some(1);
        let err = compose_system(&Platform::opsis(), &config).unwrap_err();
        assert!(matches!(err, ComposeError::InterruptConflict { line: 1, .. }));
    }

    #[test]
    fn inputs_cannot_borrow_from_outputs() {
        let (platform, mut config) = outputs_only(1);
        config.pipelines = vec![PipelineDecl::output(0), PipelineDecl::input(0)];
        let err = compose_system(&platform, &config).unwrap_err();
        assert!(matches!(
            err,
            ComposeError::ResourceExhausted {
                resource: ResourceKind::ClockGenerator,
                ..
            }
        ));
    }

    #[test]
    fn register_pool_exhaustion() {
        let mut platform = Platform::opsis();
        platform.csr.slots = 14;
        let err = compose_system(&platform, &SystemConfig::opsis_video()).unwrap_err();
        assert!(matches!(
            err,
            ComposeError::ResourceExhausted {
                resource: ResourceKind::RegisterSlot,
                ..
            }
        ));
    }

    #[test]
    fn trace_on_unknown_signal() {
        let mut config = SystemConfig::opsis_video();
        if let Some(trace) = config.trace.as_mut() {
            trace.signals.push("chansync.bogus".into());
        }
        assert!(matches!(
            compose_system(&Platform::opsis(), &config),
            Err(ComposeError::UnknownSignal { .. })
        ));
    }

    #[test]
    fn trace_on_unknown_domain() {
        let mut config = SystemConfig::opsis_video();
        if let Some(trace) = config.trace.as_mut() {
            trace.clock_domain = Some("hdmi_in7_pix".into());
        }
        assert!(matches!(
            compose_system(&Platform::opsis(), &config),
            Err(ComposeError::UnknownClockDomain { .. })
        ));
    }

    #[test]
    fn trace_defaults_to_pipeline_domain() {
        let mut config = SystemConfig::opsis_video();
        if let Some(trace) = config.trace.as_mut() {
            trace.pipeline = "hdmi_out1".into();
            trace.signals = vec!["driver.de".into()];
            trace.clock_domain = None;
        }
        let c = compose_system(&Platform::opsis(), &config).unwrap();
        assert_eq!(c.trace.unwrap().clock_domain(), "hdmi_out1_pix");
    }

    #[test]
    fn bad_iprange_fails_before_allocation() {
        let mut config = SystemConfig::opsis_video();
        config.iprange = "192.168.999".into();
        assert!(matches!(
            compose_system(&Platform::opsis(), &config),
            Err(ComposeError::InvalidIpRange { .. })
        ));
    }
}
