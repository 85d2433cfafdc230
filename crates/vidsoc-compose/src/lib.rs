//! Resource composition for HDMI video SoC images.
//!
//! Elaborates a declarative system description against a board into CSR and
//! interrupt maps, a clock allocation with donor/borrower sharing, composed
//! video pipelines, timing constraints and an optional trace capturer.
//! Composition runs once, single-threaded, and either produces a complete
//! [`Composition`] or fails without partial results.

pub mod clock;
pub mod constraint;
pub mod digest;
pub mod error;
pub mod interrupt;
pub mod memory;
pub mod network;
pub mod pipeline;
pub mod registry;
pub mod render;
pub mod report;
pub mod system;
pub mod trace;

pub use clock::{
    BorrowPolicy, ClockAllocation, ClockArbiter, ClockClass, ClockDomain, ClockRole, ClockSource,
    DomainId,
};
pub use constraint::{emit, Constraint, ConstraintSet};
pub use digest::{Fingerprint, Fingerprinter};
pub use error::{ComposeError, Result};
pub use interrupt::{InterruptMap, InterruptRegistry};
pub use memory::{Crossbar, MemoryPort, PortDirection, PortRequest, SYS_DOMAIN};
pub use network::IpRange;
pub use pipeline::{
    PipelineComposer, PipelineDecl, PipelineKind, PixelMode, TraceSignal, VideoPipeline,
};
pub use registry::{Origin, Peripheral, PeripheralRegistry, RegisterMap};
pub use render::{render, ConstraintFormat};
pub use report::CompositionReport;
pub use system::{compose_system, Composition, SystemConfig, TraceConfig};
pub use trace::{bind, read_export, BuildArtifact, CaptureState, TraceCapture, TraceExport};
