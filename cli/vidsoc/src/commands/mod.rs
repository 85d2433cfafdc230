//! CLI command implementations.

pub mod build;
pub mod clean;
pub mod describe;
pub mod new_platform;
