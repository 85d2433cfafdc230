//! System configuration files and platform resolution.

use std::path::Path;

use anyhow::{bail, Context, Result};
use vidsoc_compose::SystemConfig;
use vidsoc_platform::parse::{discover_platforms, load_platform_toml, validate_platform};
use vidsoc_platform::Platform;

/// Load a system configuration from a TOML file.
pub fn load_system_config(path: &Path) -> Result<SystemConfig> {
    let content =
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    parse_system_config(&content).with_context(|| format!("parsing {}", path.display()))
}

/// Parse a system configuration from a TOML string.
pub fn parse_system_config(s: &str) -> Result<SystemConfig> {
    Ok(toml::from_str(s)?)
}

/// Resolve a system configuration: a file if given, else the built-in
/// `opsis_video` system.
pub fn resolve_system(config: Option<&Path>) -> Result<SystemConfig> {
    match config {
        Some(path) => load_system_config(path),
        None => Ok(SystemConfig::opsis_video()),
    }
}

/// Resolve a platform by built-in name, `.platform.toml` path, or a name
/// discovered under `<project_dir>/platforms/`.
pub fn resolve_platform(name: Option<&str>, project_dir: &Path) -> Result<Platform> {
    let platform = match name {
        None | Some("opsis") => Platform::opsis(),
        Some(name) if name.ends_with(".toml") => load_platform_toml(Path::new(name))
            .with_context(|| format!("loading platform {name}"))?,
        Some(name) => {
            let discovered = discover_platforms(project_dir)?;
            let Some((_, path)) = discovered.iter().find(|(n, _)| n == name) else {
                bail!(
                    "unknown platform: '{name}'. Built-in: {}; found in platforms/: {}",
                    builtin_platforms().join(", "),
                    discovered.len()
                );
            };
            load_platform_toml(path).with_context(|| format!("loading {}", path.display()))?
        }
    };

    if let Err(issues) = validate_platform(&platform) {
        let mut errors = 0;
        for issue in &issues {
            match issue.severity {
                "error" => {
                    errors += 1;
                    eprintln!("error: platform {}: {}", platform.name, issue.message)
                }
                _ => eprintln!("warning: platform {}: {}", platform.name, issue.message),
            }
        }
        if errors > 0 {
            bail!("platform '{}' has {errors} validation error(s)", platform.name);
        }
    }
    Ok(platform)
}

/// Names of the built-in platforms.
pub fn builtin_platforms() -> Vec<&'static str> {
    vec!["opsis"]
}

#[cfg(test)]
mod tests {
    use super::*;
    use vidsoc_compose::{PipelineKind, PixelMode};
    use vidsoc_platform::parse::platform_to_toml;

    #[test]
    fn parse_minimal_config() {
        let config = parse_system_config(
            r#"
name = "single_out"

[[pipelines]]
kind = "output"
index = 0
mode = "rgb"
"#,
        )
        .unwrap();
        assert_eq!(config.name, "single_out");
        assert_eq!(config.iprange, "192.168.100");
        assert_eq!(config.crossbar_width, 64);
        assert_eq!(config.pipelines[0].kind, PipelineKind::Output);
        assert_eq!(config.pipelines[0].mode, Some(PixelMode::Rgb));
        assert!(config.trace.is_none());
    }

    #[test]
    fn parse_full_config() {
        let config = parse_system_config(
            r#"
name = "mixer"
iprange = "10.0.0"

[csr-base]
ctrl = 0
uart = 1

[interrupt-base]
uart = 0

[clock-policy]
max-borrowers-per-donor = 1

[[pipelines]]
kind = "input"
index = 0
interrupt = 3
fifo-depth = 1024

[trace]
pipeline = "hdmi_in0"
signals = ["chansync.valid_i"]
depth = 512
"#,
        )
        .unwrap();
        assert_eq!(config.csr_base["uart"], 1);
        assert_eq!(config.interrupt_base["uart"], 0);
        assert_eq!(config.clock_policy.max_borrowers_per_donor, Some(1));
        assert_eq!(config.pipelines[0].fifo_depth, Some(1024));
        let trace = config.trace.unwrap();
        assert_eq!(trace.depth, 512);
        assert!(trace.clock_domain.is_none());
    }

    #[test]
    fn builtin_system_round_trips_through_toml() {
        let text = toml::to_string(&SystemConfig::opsis_video()).unwrap();
        assert_eq!(parse_system_config(&text).unwrap(), SystemConfig::opsis_video());
    }

    #[test]
    fn reject_invalid_toml() {
        assert!(parse_system_config("name = [[[").is_err());
    }

    #[test]
    fn resolve_builtin_and_discovered_platforms() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(resolve_platform(None, dir.path()).unwrap().name, "opsis");

        let mut custom = Platform::opsis();
        custom.name = "atlys".into();
        let platforms = dir.path().join("platforms");
        std::fs::create_dir(&platforms).unwrap();
        std::fs::write(
            platforms.join("atlys.platform.toml"),
            platform_to_toml(&custom).unwrap(),
        )
        .unwrap();

        assert_eq!(
            resolve_platform(Some("atlys"), dir.path()).unwrap().name,
            "atlys"
        );
        assert!(resolve_platform(Some("nonexistent"), dir.path()).is_err());
    }

    #[test]
    fn invalid_platform_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut broken = Platform::opsis();
        broken.csr.slots = 0;
        let path = dir.path().join("broken.platform.toml");
        std::fs::write(&path, platform_to_toml(&broken).unwrap()).unwrap();
        assert!(resolve_platform(path.to_str(), dir.path()).is_err());
    }
}
