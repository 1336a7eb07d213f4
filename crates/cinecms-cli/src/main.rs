//! cinecms - colour profile tool
//!
//! Inspects ICC profiles, converts colour values through profile chains
//! and writes device links.

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt as _, util::SubscriberInitExt as _, EnvFilter};

mod commands;

#[derive(Parser)]
#[command(name = "cinecms")]
#[command(author, version, about = "Colour profile tool")]
#[command(long_about = "
Inspects ICC profiles, converts colour values and builds device links.

Profiles are given as file paths, bare file names (searched in the
profile directories) or built-in names: srgb, linear-srgb, adobe-rgb,
display-p3, rec2020, xyz, lab, gray.

Examples:
  cinecms info monitor.icc                    # Show profile tags
  cinecms list --class display                # Installed display profiles
  cinecms apply srgb display-p3 -c 1,0,0      # Convert one colour
  cinecms link srgb press.icc -o proof.icc    # Write a device link
  cinecms sweep                               # Remove stale temp links
")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Settings file (YAML)
    #[arg(long, global = true, env = "CINECMS_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show profile information
    #[command(visible_alias = "i")]
    Info(InfoArgs),

    /// List profiles in the profile directories
    #[command(visible_alias = "ls")]
    List(ListArgs),

    /// Convert colour values through a profile chain
    #[command(visible_alias = "a")]
    Apply(ApplyArgs),

    /// Collapse a profile chain into a device link file
    Link(LinkArgs),

    /// Delete stale device link files from the temp directory
    Sweep(SweepArgs),
}

#[derive(Args)]
struct InfoArgs {
    /// Profiles
    #[arg(required = true)]
    profiles: Vec<String>,

    /// Also show the cache identity key
    #[arg(short, long)]
    key: bool,
}

#[derive(Args)]
struct ListArgs {
    /// Directories to scan (default: configured or system dirs)
    dirs: Vec<PathBuf>,

    /// Only profiles of this device class
    #[arg(long)]
    class: Option<String>,
}

#[derive(Args)]
struct ApplyArgs {
    /// Profile chain, source first
    #[arg(required = true, num_args = 2..)]
    profiles: Vec<String>,

    /// Colour values, comma separated (0..1; CMYK in 0..1 too)
    #[arg(short, long, value_delimiter = ',', required = true)]
    color: Vec<f32>,

    /// Rendering intent
    #[arg(short, long)]
    intent: Option<String>,

    /// Black point compensation
    #[arg(long)]
    bpc: bool,

    /// Treat the second-to-last profile as a proofing target
    #[arg(long)]
    proof: bool,
}

#[derive(Args)]
struct LinkArgs {
    /// Profile chain, source first
    #[arg(required = true, num_args = 2..)]
    profiles: Vec<String>,

    /// Output device link file
    #[arg(short, long)]
    output: PathBuf,

    /// Rendering intent
    #[arg(short, long)]
    intent: Option<String>,

    /// Black point compensation
    #[arg(long)]
    bpc: bool,
}

#[derive(Args)]
struct SweepArgs {
    /// Only report what would be removed
    #[arg(short = 'n', long)]
    dry_run: bool,
}

fn init_logging(verbose: bool) {
    let default = if verbose { "cinecms_icc=debug,cinecms=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let config = commands::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Info(args) => commands::info::run(args, config, cli.verbose),
        Commands::List(args) => commands::list::run(args, config, cli.verbose),
        Commands::Apply(args) => commands::apply::run(args, config, cli.verbose),
        Commands::Link(args) => commands::link::run(args, config, cli.verbose),
        Commands::Sweep(args) => commands::sweep::run(args, config, cli.verbose),
    }
}
