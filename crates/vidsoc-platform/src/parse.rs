//! TOML parsing, serialization, validation, and discovery for board definitions.
//!
//! Board definitions are stored as `.platform.toml` files in the `platforms/`
//! directory of a project. This module provides functions to load, validate,
//! serialize, and discover these files.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::error::{PlatformError, Result};
use crate::platform::Platform;

/// A validation issue found in a board definition.
#[derive(Debug, Clone)]
pub struct ValidationIssue {
    /// Severity: "error" or "warning".
    pub severity: &'static str,
    /// Human-readable description.
    pub message: String,
}

/// Load a platform from a `.platform.toml` file.
pub fn load_platform_toml(path: &Path) -> Result<Platform> {
    if !path.exists() {
        return Err(PlatformError::NotFound {
            path: path.to_path_buf(),
        });
    }
    let content = std::fs::read_to_string(path)?;
    parse_platform_toml(&content)
}

/// Parse a platform from a TOML string.
pub fn parse_platform_toml(toml_str: &str) -> Result<Platform> {
    let platform: Platform = toml::from_str(toml_str)?;
    Ok(platform)
}

/// Serialize a platform to pretty TOML.
pub fn platform_to_toml(platform: &Platform) -> Result<String> {
    let toml_str = toml::to_string_pretty(platform)?;
    Ok(toml_str)
}

/// Validate a board definition for structural correctness.
///
/// Returns `Ok(())` if valid, or `Err(issues)` with a list of problems.
pub fn validate_platform(platform: &Platform) -> std::result::Result<(), Vec<ValidationIssue>> {
    let mut issues = Vec::new();

    // 1. CSR space is usable
    if platform.csr.slots == 0 {
        issues.push(ValidationIssue {
            severity: "error",
            message: "CSR space has no slots".into(),
        });
    }

    // 2. CSR regions are aligned power-of-two windows
    if !platform.csr.region_size.is_power_of_two() {
        issues.push(ValidationIssue {
            severity: "error",
            message: format!(
                "CSR region size 0x{:X} is not a power of 2",
                platform.csr.region_size
            ),
        });
    } else if platform.csr.base_address % platform.csr.region_size != 0 {
        issues.push(ValidationIssue {
            severity: "error",
            message: format!(
                "CSR base address 0x{:X} is not aligned to region size 0x{:X}",
                platform.csr.base_address, platform.csr.region_size
            ),
        });
    }

    // 2b. The whole CSR window is addressable
    if platform.csr.slots > 0
        && platform.csr.region_size > 0
        && platform.csr.window_end().is_none()
    {
        issues.push(ValidationIssue {
            severity: "error",
            message: format!(
                "CSR window of {} slots x 0x{:X} from 0x{:X} overflows the 64-bit address space",
                platform.csr.slots, platform.csr.region_size, platform.csr.base_address
            ),
        });
    }

    // 3. Interrupt controller has lines
    if platform.interrupt_lines == 0 {
        issues.push(ValidationIssue {
            severity: "error",
            message: "interrupt controller has no lines".into(),
        });
    }

    // 4. Clock generator sites are unique
    let mut sites = HashSet::new();
    for generator in &platform.clock_generators {
        if !sites.insert(generator.site.as_str()) {
            issues.push(ValidationIssue {
                severity: "error",
                message: format!("clock generator site '{}' listed twice", generator.site),
            });
        }
    }

    // 5. At least one generator is free for pipelines
    if platform
        .clock_generators
        .iter()
        .all(|g| g.reserved_by.is_some())
    {
        issues.push(ValidationIssue {
            severity: "warning",
            message: "no clock generator is free for video pipelines".into(),
        });
    }

    // 6. Crossbar has ports
    if platform.crossbar_ports == 0 {
        issues.push(ValidationIssue {
            severity: "error",
            message: "memory crossbar has no ports".into(),
        });
    }

    // 7. Connectors are unique
    let mut connectors = HashSet::new();
    for connector in &platform.connectors {
        if !connectors.insert((connector.kind.as_str(), connector.index)) {
            issues.push(ValidationIssue {
                severity: "error",
                message: format!(
                    "connector '{}:{}' listed twice",
                    connector.kind, connector.index
                ),
            });
        }
    }

    // 8. System clock is defined
    if platform.sys_clock.frequency_hz == 0 {
        issues.push(ValidationIssue {
            severity: "error",
            message: format!("system clock '{}' has frequency 0", platform.sys_clock.net),
        });
    }

    if issues.is_empty() {
        Ok(())
    } else {
        Err(issues)
    }
}

/// Generate a template `.platform.toml` for a new board.
///
/// Seeds from the Opsis board with the given custom name.
pub fn generate_template(name: &str) -> Result<String> {
    let mut platform = Platform::opsis();
    platform.name = name.into();
    platform_to_toml(&platform)
}

/// Discover all `.platform.toml` files in a project's `platforms/` directory.
///
/// Returns a list of (platform_name, file_path) pairs.
pub fn discover_platforms(project_dir: &Path) -> Result<Vec<(String, PathBuf)>> {
    let platforms_dir = project_dir.join("platforms");
    if !platforms_dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut platforms = Vec::new();
    for entry in std::fs::read_dir(&platforms_dir)? {
        let path = entry?.path();
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(|n| n.strip_suffix(".platform.toml"))
            .map(str::to_string);
        if let Some(name) = name {
            platforms.push((name, path));
        }
    }
    platforms.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(platforms)
}
