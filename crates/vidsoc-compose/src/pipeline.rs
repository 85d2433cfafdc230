//! Pipeline composer: wires a connector, a crossbar port and a clock domain
//! into one HDMI input or output pipeline.
//!
//! The composer allocates nothing itself. It checks that the capabilities
//! it was handed match the pipeline's protocol and records the pipeline's
//! peripherals and interrupt source in the registries.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;
use vidsoc_platform::Connector;

use crate::clock::{ClockClass, ClockDomain, DomainId};
use crate::error::{ComposeError, Result};
use crate::interrupt::InterruptRegistry;
use crate::memory::{MemoryPort, PortDirection, PortRequest};
use crate::registry::PeripheralRegistry;

/// Word width of output pipeline read ports.
pub const OUTPUT_WORD_WIDTH: u32 = 16;
/// Default input FIFO depth, in words.
pub const INPUT_FIFO_DEPTH: u32 = 512;
/// Default output FIFO depth, in words.
pub const OUTPUT_FIFO_DEPTH: u32 = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PipelineKind {
    Input,
    Output,
}

impl PipelineKind {
    /// Connector kind and peripheral name prefix.
    pub fn prefix(self) -> &'static str {
        match self {
            PipelineKind::Input => "hdmi_in",
            PipelineKind::Output => "hdmi_out",
        }
    }

    pub fn clock_class(self) -> ClockClass {
        match self {
            PipelineKind::Input => ClockClass::VideoInput,
            PipelineKind::Output => ClockClass::VideoOutput,
        }
    }

    /// Pipeline name for an index, e.g. "hdmi_in0".
    pub fn name(self, index: u32) -> String {
        format!("{}{index}", self.prefix())
    }

    /// Crossbar port this kind of pipeline needs.
    ///
    /// Inputs write captured frames; outputs read with reversed 16-bit words
    /// in their own pixel domain, as the output encoder expects.
    pub fn port_request(self, pixel_domain: &str) -> PortRequest {
        match self {
            PipelineKind::Input => PortRequest::write(),
            PipelineKind::Output => PortRequest::read(OUTPUT_WORD_WIDTH)
                .reversed()
                .clocked_in(pixel_domain),
        }
    }

    pub fn default_fifo_depth(self) -> u32 {
        match self {
            PipelineKind::Input => INPUT_FIFO_DEPTH,
            PipelineKind::Output => OUTPUT_FIFO_DEPTH,
        }
    }
}

impl fmt::Display for PipelineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineKind::Input => f.write_str("input"),
            PipelineKind::Output => f.write_str("output"),
        }
    }
}

/// Pixel format of an output pipeline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PixelMode {
    #[default]
    Ycbcr422,
    Rgb,
}

/// A pipeline as declared in a system configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PipelineDecl {
    pub kind: PipelineKind,
    pub index: u32,
    /// Interrupt line, if the pipeline raises interrupts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interrupt: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fifo_depth: Option<u32>,
    /// Output pixel mode (outputs only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<PixelMode>,
}

impl PipelineDecl {
    pub fn input(index: u32) -> Self {
        Self {
            kind: PipelineKind::Input,
            index,
            interrupt: None,
            fifo_depth: None,
            mode: None,
        }
    }

    pub fn output(index: u32) -> Self {
        Self {
            kind: PipelineKind::Output,
            index,
            interrupt: None,
            fifo_depth: None,
            mode: None,
        }
    }

    pub fn with_interrupt(mut self, line: u32) -> Self {
        self.interrupt = Some(line);
        self
    }

    pub fn name(&self) -> String {
        self.kind.name(self.index)
    }

    /// Peripherals this pipeline owns, in registration order.
    pub fn peripherals(&self) -> Vec<String> {
        let name = self.name();
        match self.kind {
            PipelineKind::Input => {
                let edid = format!("{name}_edid_mem");
                vec![name, edid]
            }
            PipelineKind::Output => vec![name],
        }
    }
}

/// A signal a pipeline exposes for tracing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceSignal {
    pub name: String,
    pub width: u32,
}

impl TraceSignal {
    pub fn new(name: impl Into<String>, width: u32) -> Self {
        Self {
            name: name.into(),
            width,
        }
    }
}

/// A composed input or output pipeline.
#[derive(Debug, Serialize)]
pub struct VideoPipeline {
    pub kind: PipelineKind,
    /// Connector index, e.g. 1 for "hdmi_out1".
    pub index: u32,
    pub name: String,
    /// Board connector claimed for this pipeline.
    pub connector: Connector,
    /// Crossbar port the pipeline owns.
    pub port: MemoryPort,
    /// Pixel clock domain granted by the arbiter.
    pub clock: DomainId,
    pub clock_domain: String,
    /// FIFO depth in words, the declared value or the kind default.
    pub fifo_depth: u32,
    /// Pixel format; `None` for inputs.
    pub mode: Option<PixelMode>,
    /// Interrupt line, for pipelines that raise one.
    pub interrupt: Option<u32>,
    /// CSR peripherals registered for the pipeline, in registration order.
    pub peripherals: Vec<String>,
    /// Signals a trace capturer may sample.
    pub signals: Vec<TraceSignal>,
}

impl VideoPipeline {
    /// Look up a declared signal by its short name (e.g. "chansync.valid_i").
    pub fn signal(&self, short: &str) -> Option<&TraceSignal> {
        let full = format!("{}.{short}", self.name);
        self.signals.iter().find(|s| s.name == full)
    }
}

fn declared_signals(kind: PipelineKind, name: &str) -> Vec<TraceSignal> {
    let signals: &[(&str, u32)] = match kind {
        PipelineKind::Input => &[
            ("chansync.valid_i", 1),
            ("chansync.data_in0", 10),
            ("chansync.data_in1", 10),
            ("chansync.data_in2", 10),
        ],
        PipelineKind::Output => &[
            ("driver.de", 1),
            ("driver.hsync", 1),
            ("driver.vsync", 1),
            ("core.source.data", OUTPUT_WORD_WIDTH),
        ],
    };
    signals
        .iter()
        .map(|(s, w)| TraceSignal::new(format!("{name}.{s}"), *w))
        .collect()
}

/// Registers pipelines against the shared registries.
pub struct PipelineComposer<'a> {
    registers: &'a mut PeripheralRegistry,
    interrupts: &'a mut InterruptRegistry,
}

impl<'a> PipelineComposer<'a> {
    pub fn new(registers: &'a mut PeripheralRegistry, interrupts: &'a mut InterruptRegistry) -> Self {
        Self {
            registers,
            interrupts,
        }
    }

    /// Compose one pipeline. On error neither registry is modified.
    pub fn compose(
        &mut self,
        decl: &PipelineDecl,
        connector: Connector,
        port: MemoryPort,
        clock: &ClockDomain,
    ) -> Result<VideoPipeline> {
        let name = decl.name();
        check_port(decl.kind, &name, &port, clock)?;
        if clock.class != decl.kind.clock_class() {
            return Err(ComposeError::PortMismatch {
                pipeline: name,
                reason: format!("clock domain '{}' is {}", clock.name, clock.class),
            });
        }

        let peripherals = decl.peripherals();
        let names: Vec<&str> = peripherals.iter().map(String::as_str).collect();
        let mut registers = self.registers.clone();
        let mut interrupts = self.interrupts.clone();
        registers.register_all(&names)?;
        if let Some(line) = decl.interrupt {
            interrupts.assign(&name, line)?;
        }
        *self.registers = registers;
        *self.interrupts = interrupts;

        let mode = match decl.kind {
            PipelineKind::Output => Some(decl.mode.unwrap_or_default()),
            PipelineKind::Input => None,
        };
        debug!(pipeline = %name, clock = %clock.name, port = port.id(), "composed pipeline");

        Ok(VideoPipeline {
            kind: decl.kind,
            index: decl.index,
            signals: declared_signals(decl.kind, &name),
            name,
            connector,
            port,
            clock: clock.id,
            clock_domain: clock.name.clone(),
            fifo_depth: decl
                .fifo_depth
                .unwrap_or_else(|| decl.kind.default_fifo_depth()),
            mode,
            interrupt: decl.interrupt,
            peripherals,
        })
    }
}

fn check_port(
    kind: PipelineKind,
    name: &str,
    port: &MemoryPort,
    clock: &ClockDomain,
) -> Result<()> {
    let mismatch = |reason: String| ComposeError::PortMismatch {
        pipeline: name.to_string(),
        reason,
    };
    match kind {
        PipelineKind::Input => {
            if port.direction() != PortDirection::Write {
                return Err(mismatch(format!(
                    "input needs a write port, got {}",
                    port.direction()
                )));
            }
        }
        PipelineKind::Output => {
            if port.direction() != PortDirection::Read {
                return Err(mismatch(format!(
                    "output needs a read port, got {}",
                    port.direction()
                )));
            }
            if port.data_width() != OUTPUT_WORD_WIDTH {
                return Err(mismatch(format!(
                    "output needs {OUTPUT_WORD_WIDTH}-bit words, got {}",
                    port.data_width()
                )));
            }
            if !port.is_reversed() {
                return Err(mismatch("output needs reversed byte order".into()));
            }
            if port.clock_domain() != clock.name {
                return Err(mismatch(format!(
                    "port is clocked in '{}', pipeline runs in '{}'",
                    port.clock_domain(),
                    clock.name
                )));
            }
        }
    }
    Ok(())
}
