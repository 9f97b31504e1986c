//! INI configuration file.
//!
//! ```ini
//! [tracking]
//! max_attempts = 3
//! initial_timeout_ms = 30000
//! initial_max_age_ms = 1000
//!
//! [map]
//! center_longitude = -0.1278
//! center_latitude = 51.5074
//! default_zoom = 10
//! focus_zoom = 15
//!
//! [logging]
//! level = info
//! directory = /var/log/geotrack
//! ```
//!
//! Missing sections and keys fall back to defaults. Values outside their
//! accepted range are rejected as [`ConfigError::InvalidValue`].

use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use ini::Ini;
use thiserror::Error;

use super::{LoggingConfig, MapDefaults, TrackerConfig};

const SECTION_TRACKING: &str = "tracking";
const SECTION_MAP: &str = "map";
const SECTION_LOGGING: &str = "logging";

const MAX_ATTEMPTS_RANGE: RangeInclusive<u8> = 1..=10;
const INITIAL_TIMEOUT_MS_RANGE: RangeInclusive<u32> = 1_000..=120_000;
const INITIAL_MAX_AGE_MS_RANGE: RangeInclusive<u32> = 0..=600_000;

/// Errors loading or saving the configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read or parsed.
    #[error("Failed to read config {path}: {reason}")]
    Read { path: PathBuf, reason: String },

    /// The file could not be written.
    #[error("Failed to write config {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A key holds a value of the wrong type or out of range.
    #[error("Invalid value for [{section}] {key}: {value:?}")]
    InvalidValue {
        section: String,
        key: String,
        value: String,
    },

    /// No platform config directory could be determined.
    #[error("Could not determine the configuration directory")]
    NoConfigDir,
}

/// The on-disk configuration.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ConfigFile {
    pub tracker: TrackerConfig,
}

impl ConfigFile {
    /// Default location: `<config dir>/geotrack/config.ini`.
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        dirs::config_dir()
            .map(|dir| dir.join("geotrack").join("config.ini"))
            .ok_or(ConfigError::NoConfigDir)
    }

    /// Load from `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let ini = Ini::load_from_file(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Self::from_ini(&ini)
    }

    /// Load from `path`, or defaults if the file does not exist.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Parse from INI text.
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let ini = Ini::load_from_str(text).map_err(|e| ConfigError::Read {
            path: PathBuf::from("<string>"),
            reason: e.to_string(),
        })?;
        Self::from_ini(&ini)
    }

    /// Write to `path`, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let write_err = |source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(write_err)?;
        }
        self.to_ini().write_to_file(path).map_err(write_err)
    }

    fn from_ini(ini: &Ini) -> Result<Self, ConfigError> {
        let mut tracker = TrackerConfig::default();

        if let Some(value) = read(ini, SECTION_TRACKING, "max_attempts")? {
            tracker.max_attempts = check_range(
                SECTION_TRACKING,
                "max_attempts",
                value,
                MAX_ATTEMPTS_RANGE,
            )?;
        }
        if let Some(value) = read(ini, SECTION_TRACKING, "initial_timeout_ms")? {
            tracker.initial_fix.timeout_ms = check_range(
                SECTION_TRACKING,
                "initial_timeout_ms",
                value,
                INITIAL_TIMEOUT_MS_RANGE,
            )?;
        }
        if let Some(value) = read(ini, SECTION_TRACKING, "initial_max_age_ms")? {
            tracker.initial_fix.max_fix_age_ms = check_range(
                SECTION_TRACKING,
                "initial_max_age_ms",
                value,
                INITIAL_MAX_AGE_MS_RANGE,
            )?;
        }

        let map = &mut tracker.map;
        if let Some(value) = read(ini, SECTION_MAP, "center_longitude")? {
            map.center_lng = check_range(SECTION_MAP, "center_longitude", value, -180.0..=180.0)?;
        }
        if let Some(value) = read(ini, SECTION_MAP, "center_latitude")? {
            map.center_lat = check_range(SECTION_MAP, "center_latitude", value, -90.0..=90.0)?;
        }
        if let Some(value) = read(ini, SECTION_MAP, "default_zoom")? {
            map.default_zoom = check_range(SECTION_MAP, "default_zoom", value, 0.0..=22.0)?;
        }
        if let Some(value) = read(ini, SECTION_MAP, "focus_zoom")? {
            map.focus_zoom = check_range(SECTION_MAP, "focus_zoom", value, 0.0..=22.0)?;
        }

        if let Some(level) = raw(ini, SECTION_LOGGING, "level") {
            tracker.logging.level = level.to_string();
        }
        tracker.logging.directory = raw(ini, SECTION_LOGGING, "directory")
            .filter(|dir| !dir.is_empty())
            .map(PathBuf::from);

        Ok(Self { tracker })
    }

    fn to_ini(&self) -> Ini {
        let TrackerConfig {
            max_attempts,
            initial_fix,
            map,
            logging,
        } = &self.tracker;
        let MapDefaults {
            center_lng,
            center_lat,
            default_zoom,
            focus_zoom,
        } = map;
        let LoggingConfig { level, directory } = logging;

        let mut ini = Ini::new();
        ini.with_section(Some(SECTION_TRACKING))
            .set("max_attempts", max_attempts.to_string())
            .set("initial_timeout_ms", initial_fix.timeout_ms.to_string())
            .set("initial_max_age_ms", initial_fix.max_fix_age_ms.to_string());
        ini.with_section(Some(SECTION_MAP))
            .set("center_longitude", center_lng.to_string())
            .set("center_latitude", center_lat.to_string())
            .set("default_zoom", default_zoom.to_string())
            .set("focus_zoom", focus_zoom.to_string());
        let mut section = ini.with_section(Some(SECTION_LOGGING));
        section.set("level", level.as_str());
        if let Some(dir) = directory {
            section.set("directory", dir.to_string_lossy().to_string());
        }
        ini
    }
}

fn raw<'a>(ini: &'a Ini, section: &str, key: &str) -> Option<&'a str> {
    ini.section(Some(section))
        .and_then(|s| s.get(key))
        .map(str::trim)
}

fn read<T: FromStr>(ini: &Ini, section: &str, key: &str) -> Result<Option<T>, ConfigError> {
    match raw(ini, section, key) {
        None => Ok(None),
        Some(value) => value
            .parse()
            .map(Some)
            .map_err(|_| invalid(section, key, value)),
    }
}

fn check_range<T>(
    section: &str,
    key: &str,
    value: T,
    range: RangeInclusive<T>,
) -> Result<T, ConfigError>
where
    T: PartialOrd + ToString,
{
    if range.contains(&value) {
        Ok(value)
    } else {
        Err(invalid(section, key, &value.to_string()))
    }
}

fn invalid(section: &str, key: &str, value: &str) -> ConfigError {
    ConfigError::InvalidValue {
        section: section.to_string(),
        key: key.to_string(),
        value: value.to_string(),
    }
}
