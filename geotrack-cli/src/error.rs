//! CLI error type.

use std::fmt;

use geotrack::config::ConfigError;
use geotrack::logging::LoggingError;

/// Errors reported by CLI commands.
#[derive(Debug)]
pub enum CliError {
    /// Invalid settings or arguments.
    Config(String),
    /// Config file could not be loaded or saved.
    ConfigFile(ConfigError),
    /// Logging could not be set up.
    Logging(LoggingError),
    /// The async runtime could not be built.
    Runtime(std::io::Error),
    /// A `--route` argument could not be parsed.
    InvalidRoute(String),
    /// Status could not be serialized.
    Output(String),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Config(msg) => write!(f, "Configuration error: {}", msg),
            CliError::ConfigFile(e) => write!(f, "{}", e),
            CliError::Logging(e) => write!(f, "Failed to initialize logging: {}", e),
            CliError::Runtime(e) => write!(f, "Failed to start async runtime: {}", e),
            CliError::InvalidRoute(msg) => write!(f, "Invalid route: {}", msg),
            CliError::Output(msg) => write!(f, "Failed to render output: {}", msg),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::ConfigFile(e) => Some(e),
            CliError::Logging(e) => Some(e),
            CliError::Runtime(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        CliError::ConfigFile(e)
    }
}

impl From<LoggingError> for CliError {
    fn from(e: LoggingError) -> Self {
        CliError::Logging(e)
    }
}
