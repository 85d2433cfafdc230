//! vidsoc CLI: compose and build HDMI video SoC images.

mod commands;
mod manifest;

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use vidsoc_compose::ConstraintFormat;

#[derive(Parser)]
#[command(name = "vidsoc", version, about = "HDMI video SoC composer")]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compose a system and write its build products
    Build {
        /// Output directory
        #[arg(long, default_value = "build/opsis_video")]
        build_dir: PathBuf,
        /// Generate sources only, do not run the gateware toolchain
        #[arg(long)]
        nocompile_gateware: bool,
        /// Network the board and TFTP server live on
        #[arg(long)]
        iprange: Option<String>,
        /// System configuration TOML (default: built-in opsis_video)
        #[arg(long)]
        config: Option<PathBuf>,
        /// Platform name or .platform.toml path (default: opsis)
        #[arg(long)]
        platform: Option<String>,
        /// Constraint file syntax (ucf, xdc)
        #[arg(long, default_value = "ucf")]
        constraint_format: ConstraintFormat,
    },
    /// Show a platform's composable resources
    Describe {
        /// Platform name or .platform.toml path (default: opsis)
        platform: Option<String>,
        /// Output format (default: human-readable, "toml" for TOML)
        #[arg(long)]
        format: Option<String>,
    },
    /// Scaffold platforms/<name>.platform.toml from the Opsis board
    NewPlatform {
        /// Board name
        name: String,
    },
    /// Remove build products
    Clean {
        /// Output directory
        #[arg(long, default_value = "build/opsis_video")]
        build_dir: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let result = run(cli);
    if let Err(e) = result {
        eprintln!("error: {e:#}");
        process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let cwd = std::env::current_dir()?;

    match cli.command {
        Commands::Build {
            build_dir,
            nocompile_gateware,
            iprange,
            config,
            platform,
            constraint_format,
        } => {
            let platform = manifest::resolve_platform(platform.as_deref(), &cwd)?;
            let mut system = manifest::resolve_system(config.as_deref())?;
            if let Some(range) = iprange {
                system.iprange = range;
            }
            let options = commands::build::BuildOptions {
                build_dir: cwd.join(build_dir),
                compile_gateware: !nocompile_gateware,
                constraint_format,
            };
            commands::build::run(&platform, &system, &options)
        }

        Commands::Describe { platform, format } => {
            let platform = manifest::resolve_platform(platform.as_deref(), &cwd)?;
            commands::describe::run(&platform, format.as_deref())
        }

        Commands::NewPlatform { name } => commands::new_platform::run(&name, &cwd),

        Commands::Clean { build_dir } => commands::clean::run(&cwd.join(build_dir)),
    }
}
