//! `vidsoc clean`: remove build products.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

/// Remove the build directory.
pub fn run(build_dir: &Path) -> Result<()> {
    if build_dir.exists() {
        fs::remove_dir_all(build_dir)
            .with_context(|| format!("removing {}", build_dir.display()))?;
        println!("Removed {}", build_dir.display());
    } else {
        println!("Already clean: {} does not exist", build_dir.display());
    }
    Ok(())
}
