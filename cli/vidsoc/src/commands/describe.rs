//! `vidsoc describe`: show a platform's composable resources.

use anyhow::{bail, Result};
use serde::Serialize;
use vidsoc_platform::parse::platform_to_toml;
use vidsoc_platform::Platform;

/// Resource counts a composition draws from.
#[derive(Debug, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct ResourceSummary {
    pub platform: String,
    pub device: String,
    pub register_slots: u32,
    pub interrupt_lines: u32,
    pub clock_generators: usize,
    pub free_clock_generators: usize,
    pub crossbar_ports: u32,
    pub connectors: Vec<String>,
}

impl ResourceSummary {
    pub fn new(platform: &Platform) -> Self {
        Self {
            platform: platform.name.clone(),
            device: platform.device.clone(),
            register_slots: platform.csr.slots,
            interrupt_lines: platform.interrupt_lines,
            clock_generators: platform.clock_generators.len(),
            free_clock_generators: platform
                .clock_generators
                .iter()
                .filter(|g| g.reserved_by.is_none())
                .count(),
            crossbar_ports: platform.crossbar_ports,
            connectors: platform
                .connectors
                .iter()
                .map(|c| format!("{}{}", c.kind, c.index))
                .collect(),
        }
    }
}

/// Describe a platform in the requested format.
pub fn run(platform: &Platform, format: Option<&str>) -> Result<()> {
    match format {
        None | Some("human") => print_human(platform),
        Some("toml") => print!("{}", platform_to_toml(platform)?),
        Some("json") => println!(
            "{}",
            serde_json::to_string_pretty(&ResourceSummary::new(platform))?
        ),
        Some(other) => bail!("unknown format: '{other}'. Choose: human, toml, json"),
    }
    Ok(())
}

fn print_human(platform: &Platform) {
    let csr = &platform.csr;
    println!("=== Platform: {} ===", platform.name);
    println!("Device: {}", platform.device);
    println!();

    println!("--- CSR space ---");
    println!("  Slots:  {}", csr.slots);
    match csr.window_end() {
        Some(end) => println!(
            "  Window: 0x{:08X} - 0x{:08X} (0x{:X} per slot)",
            csr.base_address, end, csr.region_size
        ),
        None => println!(
            "  Window: 0x{:08X} (0x{:X} per slot, does not fit the address space)",
            csr.base_address, csr.region_size
        ),
    }
    println!();

    println!("--- Interrupts ---");
    println!("  Lines: {}", platform.interrupt_lines);
    println!();

    println!("--- Clock generators ---");
    for generator in &platform.clock_generators {
        match &generator.reserved_by {
            Some(by) => println!("  {} {} [reserved: {by}]", generator.primitive, generator.site),
            None => println!("  {} {}", generator.primitive, generator.site),
        }
    }
    println!(
        "  System clock: {} @ {} Hz",
        platform.sys_clock.net, platform.sys_clock.frequency_hz
    );
    println!();

    println!("--- Memory crossbar ---");
    println!("  Ports: {}", platform.crossbar_ports);
    println!();

    println!("--- Connectors ---");
    for connector in &platform.connectors {
        println!("  {}{}", connector.kind, connector.index);
    }
}
