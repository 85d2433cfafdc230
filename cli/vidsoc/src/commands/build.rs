//! `vidsoc build`: compose the system, write build products, optionally run
//! the gateware toolchain, then export the trace description.

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{bail, Context, Result};
use tracing::info;
use vidsoc_compose::{
    compose_system, render, BuildArtifact, Composition, CompositionReport, ConstraintFormat,
    SystemConfig,
};
use vidsoc_platform::Platform;

/// Where and how to build.
#[derive(Debug, Clone)]
pub struct BuildOptions {
    pub build_dir: PathBuf,
    pub compile_gateware: bool,
    pub constraint_format: ConstraintFormat,
}

/// Paths of everything a build wrote.
#[derive(Debug)]
pub struct BuildOutputs {
    /// `csr.csv`: CSR bases, interrupt lines and build constants.
    pub csr_csv: PathBuf,
    /// `gateware/top.ucf` or `gateware/top.xdc`.
    pub constraints: PathBuf,
    /// `composition.json`: the full serialized composition.
    pub composition: PathBuf,
    /// `gateware/build_top.sh`, written even with compilation skipped.
    pub build_script: PathBuf,
    /// `test/analyzer.csv`, when a trace capturer is bound.
    pub trace: Option<PathBuf>,
}

/// Run the build and print a report.
pub fn run(platform: &Platform, system: &SystemConfig, options: &BuildOptions) -> Result<()> {
    let (composition, outputs) = build(platform, system, options)?;
    print!("{}", CompositionReport::new(&composition));
    println!();
    println!("CSR map:     {}", outputs.csr_csv.display());
    println!("Constraints: {}", outputs.constraints.display());
    println!("Composition: {}", outputs.composition.display());
    if let Some(trace) = &outputs.trace {
        println!("Trace:       {}", trace.display());
    }
    Ok(())
}

/// Compose and write all build products.
pub fn build(
    platform: &Platform,
    system: &SystemConfig,
    options: &BuildOptions,
) -> Result<(Composition, BuildOutputs)> {
    let mut composition = compose_system(platform, system)
        .with_context(|| format!("composing '{}' for {}", system.name, platform.name))?;

    let gateware_dir = options.build_dir.join("gateware");
    fs::create_dir_all(&gateware_dir)
        .with_context(|| format!("creating {}", gateware_dir.display()))?;

    let csr_csv = options.build_dir.join("csr.csv");
    write(&csr_csv, &csr_table(&composition))?;

    let format = options.constraint_format;
    let constraints = gateware_dir.join(format!("top.{}", format.extension()));
    write(&constraints, &render(&composition.constraints, format))?;

    let build_script = gateware_dir.join("build_top.sh");
    write(&build_script, &toolchain_script(platform, format))?;

    let artifact = if options.compile_gateware {
        run_toolchain(&gateware_dir)?;
        BuildArtifact::new(gateware_dir.join("top.bit"))
    } else {
        info!("skipping gateware compilation");
        BuildArtifact::new(csr_csv.clone())
    };

    let trace = match composition.trace.as_mut() {
        Some(capture) => {
            let test_dir = options.build_dir.join("test");
            fs::create_dir_all(&test_dir)
                .with_context(|| format!("creating {}", test_dir.display()))?;
            let path = test_dir.join("analyzer.csv");
            capture
                .export(&artifact, &path)
                .context("exporting trace description")?;
            Some(path)
        }
        None => None,
    };

    let composition_path = options.build_dir.join("composition.json");
    write(
        &composition_path,
        &serde_json::to_string_pretty(&composition).context("serializing composition")?,
    )?;

    Ok((
        composition,
        BuildOutputs {
            csr_csv,
            constraints,
            composition: composition_path,
            build_script,
            trace,
        },
    ))
}

fn write(path: &Path, content: &str) -> Result<()> {
    fs::write(path, content).with_context(|| format!("writing {}", path.display()))
}

/// CSR base addresses, interrupt lines and build constants, one per line.
pub fn csr_table(composition: &Composition) -> String {
    let mut out = String::new();
    for (name, address) in composition.registers.address_table(&composition.csr) {
        let _ = writeln!(out, "csr_base,{name},0x{address:08x},,");
    }
    for (name, line) in composition.interrupts.iter() {
        let _ = writeln!(out, "constant,{name}_interrupt,{line},,");
    }
    for (name, value) in &composition.constants {
        let _ = writeln!(out, "constant,{},{value},,", name.to_lowercase());
    }
    out
}

fn toolchain_script(platform: &Platform, format: ConstraintFormat) -> String {
    match format {
        ConstraintFormat::Ucf => format!(
            "#!/bin/sh\nset -e\n\
             xst -ifn top.xst\n\
             ngdbuild -uc top.ucf -p {device} top.ngc top.ngd\n\
             map -ol high -w -o top_map.ncd top.ngd top.pcf\n\
             par -ol high -w top_map.ncd top.ncd top.pcf\n\
             bitgen -g Binary:Yes -w top.ncd top.bit\n",
            device = platform.device
        ),
        ConstraintFormat::Xdc => format!(
            "#!/bin/sh\nset -e\n\
             vivado -mode batch -source top.tcl -tclargs {device} top.xdc\n",
            device = platform.device
        ),
    }
}

fn run_toolchain(gateware_dir: &Path) -> Result<()> {
    info!(dir = %gateware_dir.display(), "running gateware toolchain");
    let status = Command::new("sh")
        .arg("build_top.sh")
        .current_dir(gateware_dir)
        .status()
        .context("launching gateware toolchain")?;
    if !status.success() {
        bail!("gateware toolchain failed ({status})");
    }
    Ok(())
}
