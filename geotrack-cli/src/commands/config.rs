//! Configuration management CLI commands.
//!
//! Provides `config init`, `config show`, and `config path` for creating and
//! inspecting the INI file.

use std::path::Path;

use clap::Subcommand;
use geotrack::config::ConfigFile;

use super::common::load_config;
use crate::error::CliError;

/// Config subcommands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Write a config file with default values
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Show the effective configuration
    Show,

    /// Show the configuration file path
    Path,
}

/// Run a config subcommand.
pub fn run(command: ConfigCommands, path: &Path) -> Result<(), CliError> {
    match command {
        ConfigCommands::Init { force } => {
            run_init(path, force)?;
            println!("Wrote default configuration to {}", path.display());
            Ok(())
        }
        ConfigCommands::Show => run_show(path),
        ConfigCommands::Path => {
            println!("{}", path.display());
            Ok(())
        }
    }
}

/// Write defaults to `path`. Refuses to overwrite unless `force` is set.
fn run_init(path: &Path, force: bool) -> Result<(), CliError> {
    if path.exists() && !force {
        return Err(CliError::Config(format!(
            "{} already exists. Use --force to overwrite it.",
            path.display()
        )));
    }
    ConfigFile::default().save(path)?;
    Ok(())
}

/// Print the effective configuration.
fn run_show(path: &Path) -> Result<(), CliError> {
    let source = if path.exists() {
        path.display().to_string()
    } else {
        "(defaults, no file)".to_string()
    };
    let config = load_config(path)?.tracker;

    println!("Configuration Settings");
    println!("======================");
    println!("Source: {}", source);
    println!();
    println!("[tracking]");
    println!("  max_attempts = {}", config.max_attempts);
    println!("  initial_timeout_ms = {}", config.initial_fix.timeout_ms);
    println!("  initial_max_age_ms = {}", config.initial_fix.max_fix_age_ms);
    println!();
    println!("[map]");
    println!("  center_longitude = {}", config.map.center_lng);
    println!("  center_latitude = {}", config.map.center_lat);
    println!("  default_zoom = {}", config.map.default_zoom);
    println!("  focus_zoom = {}", config.map.focus_zoom);
    println!();
    println!("[logging]");
    println!("  level = {}", config.logging.level);
    match &config.logging.directory {
        Some(dir) => println!("  directory = {}", dir.display()),
        None => println!("  directory = (not set)"),
    }

    Ok(())
}
