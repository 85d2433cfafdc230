//! Composition errors.

use std::path::PathBuf;

use thiserror::Error;
use vidsoc_platform::{PlatformError, ResourceKind};

/// Errors that can occur while composing a system image.
///
/// All of these are configuration or programmer defects found during
/// elaboration. None are retried.
#[derive(Debug, Error)]
pub enum ComposeError {
    #[error("peripheral name '{name}' is already registered")]
    DuplicateName { name: String },

    #[error("interrupt line {line} requested by '{requested}' is already held by '{holder}'")]
    InterruptConflict {
        line: u32,
        holder: String,
        requested: String,
    },

    #[error("'{name}' already uses interrupt line {held}, cannot also take line {requested}")]
    InterruptReassigned {
        name: String,
        held: u32,
        requested: u32,
    },

    #[error("{resource} exhausted: {detail}")]
    ResourceExhausted {
        resource: ResourceKind,
        detail: String,
    },

    #[error("trace export to {} requested before the build artifact exists", path.display())]
    ExportBeforeBuild { path: PathBuf },

    #[error("trace capture was already exported to {}", path.display())]
    AlreadyExported { path: PathBuf },

    #[error("trace capture needs {what}")]
    EmptyTrace { what: &'static str },

    #[error("unknown clock domain '{name}'")]
    UnknownClockDomain { name: String },

    #[error("no pipeline named '{name}' was composed")]
    UnknownPipeline { name: String },

    #[error("pipeline '{pipeline}' has no signal '{signal}'")]
    UnknownSignal { pipeline: String, signal: String },

    #[error("memory port for '{pipeline}' does not match protocol: {reason}")]
    PortMismatch { pipeline: String, reason: String },

    #[error("invalid base map: {detail}")]
    InvalidBaseMap { detail: String },

    #[error("invalid IP range '{range}'")]
    InvalidIpRange { range: String },

    #[error("platform error: {0}")]
    Platform(#[from] PlatformError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl ComposeError {
    pub(crate) fn exhausted(resource: ResourceKind, detail: impl Into<String>) -> Self {
        ComposeError::ResourceExhausted {
            resource,
            detail: detail.into(),
        }
    }
}

/// Result type for composition operations.
pub type Result<T> = std::result::Result<T, ComposeError>;
