//! Plume CLI - Headless driver for the Plume particle simulator

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{run, validate};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "plume")]
#[command(about = "Fixed-step particle fountain simulator", long_about = None)]
#[command(version)]
struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a scene for a fixed number of steps and report particle counts
    Run {
        /// Path to scene file (defaults to the built-in three-burst scene)
        scene: Option<String>,

        /// Number of fixed steps to simulate
        #[arg(long, default_value_t = 500)]
        steps: u64,

        /// Override the scene's random seed
        #[arg(long)]
        seed: Option<u64>,

        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// Parse and validate a scene file
    Validate {
        /// Path to scene file
        scene: String,
    },
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Run {
            scene,
            steps,
            seed,
            format,
        } => run::run(run::RunArgs {
            scene,
            steps,
            seed,
            format,
        }),
        Commands::Validate { scene } => validate::run(&scene),
    }
}
