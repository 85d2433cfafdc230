//! `vidsoc new-platform`: scaffold a board definition under `platforms/`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use vidsoc_platform::parse::generate_template;

use crate::manifest::builtin_platforms;

/// Write `platforms/<name>.platform.toml` under the current directory.
pub fn run(name: &str, project_dir: &Path) -> Result<()> {
    let path = create_platform(project_dir, name)?;
    println!("Created platform '{name}'");
    println!("  {}", path.display());
    println!("Edit it, then build with --platform {name}");
    Ok(())
}

pub(crate) fn create_platform(project_dir: &Path, name: &str) -> Result<PathBuf> {
    if name.is_empty()
        || name.contains(['/', '\\'])
        || name.starts_with('.')
        || name.ends_with(".toml")
    {
        bail!("invalid platform name: '{name}'");
    }
    if builtin_platforms().contains(&name) {
        bail!("'{name}' is a built-in platform");
    }
    let platforms_dir = project_dir.join("platforms");
    let path = platforms_dir.join(format!("{name}.platform.toml"));
    if path.exists() {
        bail!("platform file '{}' already exists", path.display());
    }

    fs::create_dir_all(&platforms_dir).context("creating platforms/ directory")?;
    let template = generate_template(name).context("generating platform template")?;
    fs::write(&path, template).with_context(|| format!("writing {}", path.display()))?;
    Ok(path)
}
