//! Error types for platform operations.

use std::path::PathBuf;

/// Errors that can occur while loading or querying a platform.
#[derive(Debug, thiserror::Error)]
pub enum PlatformError {
    /// TOML deserialization error.
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// TOML serialization error.
    #[error("TOML serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    /// I/O error reading/writing platform files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Platform file not found.
    #[error("platform file not found: {}", path.display())]
    NotFound {
        /// The path that was not found.
        path: PathBuf,
    },

    /// A physical connector was requested that the board does not have,
    /// or that was already handed out.
    #[error("connector {kind}:{index} is {reason}")]
    ConnectorUnavailable {
        /// Connector kind (e.g. "hdmi_in").
        kind: String,
        /// Connector index.
        index: u32,
        /// Why it cannot be handed out.
        reason: &'static str,
    },

    /// Validation error in platform definition.
    #[error("validation error: {detail}")]
    Validation {
        /// Description of the validation failure.
        detail: String,
    },
}

/// Result type for platform operations.
pub type Result<T> = std::result::Result<T, PlatformError>;
