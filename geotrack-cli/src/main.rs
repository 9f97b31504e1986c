//! GeoTrack CLI - Command-line interface
//!
//! Runs the location tracker against a simulated sensor, prints the fallback
//! schedule, and manages the configuration file.

mod commands;
mod error;
mod viewport;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use commands::config::ConfigCommands;
use commands::simulate::SimulateArgs;
use error::CliError;

#[derive(Parser)]
#[command(name = "geotrack")]
#[command(version = geotrack::VERSION)]
#[command(about = "Resilient continuous location tracking for map views", long_about = None)]
struct Cli {
    /// Config file (defaults to the platform config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log at debug level unless RUST_LOG is set
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the tracker against a simulated sensor
    Simulate(SimulateArgs),

    /// Print the watch options and backoff used for each retry attempt
    Options {
        /// Retry budget (defaults to the configured value)
        #[arg(long)]
        max_attempts: Option<u8>,
    },

    /// Manage the configuration file
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    let config_path = match cli.config {
        Some(path) => path,
        None => geotrack::config::ConfigFile::default_path()?,
    };

    match cli.command {
        Commands::Simulate(args) => commands::simulate::run(args, &config_path, cli.verbose),
        Commands::Options { max_attempts } => commands::options::run(&config_path, max_attempts),
        Commands::Config { command } => commands::config::run(command, &config_path),
    }
}
