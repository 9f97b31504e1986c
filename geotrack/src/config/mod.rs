//! Tracker configuration.
//!
//! [`TrackerConfig`] is the typed configuration handed to the tracker.
//! [`ConfigFile`] loads and saves it as INI.

mod file;

pub use file::{ConfigError, ConfigFile};

use std::path::PathBuf;

use crate::watch::{WatchOptions, DEFAULT_MAX_ATTEMPTS};

// ==================== Map Defaults ====================

/// Default map center longitude (London).
pub const DEFAULT_CENTER_LNG: f64 = -0.1278;

/// Default map center latitude (London).
pub const DEFAULT_CENTER_LAT: f64 = 51.5074;

/// Zoom level shown before any fix exists.
pub const DEFAULT_ZOOM: f64 = 10.0;

/// Zoom level the camera flies to on the first fix and on recenter.
pub const DEFAULT_FOCUS_ZOOM: f64 = 15.0;

/// Default log filter when `RUST_LOG` is unset.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Camera defaults for the map view.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MapDefaults {
    pub center_lng: f64,
    pub center_lat: f64,
    pub default_zoom: f64,
    pub focus_zoom: f64,
}

impl Default for MapDefaults {
    fn default() -> Self {
        Self {
            center_lng: DEFAULT_CENTER_LNG,
            center_lat: DEFAULT_CENTER_LAT,
            default_zoom: DEFAULT_ZOOM,
            focus_zoom: DEFAULT_FOCUS_ZOOM,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is unset (e.g. "info", "geotrack=debug").
    pub level: String,
    /// Directory for daily rolling log files. Stderr only when unset.
    pub directory: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL.to_string(),
            directory: None,
        }
    }
}

/// Configuration for a location tracker.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackerConfig {
    /// Retries allowed after consecutive watch timeouts.
    pub max_attempts: u8,
    /// Options for the one-shot initial fix.
    pub initial_fix: WatchOptions,
    /// Camera defaults.
    pub map: MapDefaults,
    /// Logging setup.
    pub logging: LoggingConfig,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            initial_fix: WatchOptions::initial_fix(),
            map: MapDefaults::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl TrackerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the retry budget.
    pub fn with_max_attempts(mut self, max_attempts: u8) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Set the initial fix options.
    pub fn with_initial_fix(mut self, options: WatchOptions) -> Self {
        self.initial_fix = options;
        self
    }

    /// Set the map defaults.
    pub fn with_map(mut self, map: MapDefaults) -> Self {
        self.map = map;
        self
    }

    /// Set the logging configuration.
    pub fn with_logging(mut self, logging: LoggingConfig) -> Self {
        self.logging = logging;
        self
    }
}
