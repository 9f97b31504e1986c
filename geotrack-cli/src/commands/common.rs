//! Common types and utilities shared across CLI commands.

use std::path::Path;

use clap::ValueEnum;
use console::style;
use geotrack::config::ConfigFile;
use geotrack::error::SensorError;
use geotrack::fix::RawFix;
use geotrack::permission::PermissionState;
use geotrack::tracker::{TrackingPhase, TrackingStatus};

use crate::error::CliError;

/// Default route: a short walk along the Thames in London.
pub const DEFAULT_ROUTE: &str =
    "51.5074,-0.1278;51.5079,-0.1263;51.5085,-0.1247;51.5090,-0.1230;51.5096,-0.1213";

/// Permission state the simulated platform starts in.
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum PermissionArg {
    /// Access already allowed
    Granted,
    /// The platform will ask; the simulator grants after a short delay
    Prompt,
    /// Access blocked
    Denied,
    /// No permission API
    Unknown,
}

impl From<PermissionArg> for PermissionState {
    fn from(arg: PermissionArg) -> Self {
        match arg {
            PermissionArg::Granted => PermissionState::Granted,
            PermissionArg::Prompt => PermissionState::Prompt,
            PermissionArg::Denied => PermissionState::Denied,
            PermissionArg::Unknown => PermissionState::Unknown,
        }
    }
}

/// Outcome of the simulated initial fix request.
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum InitialFixArg {
    /// Answer with the first route point
    Fix,
    /// Time out
    Timeout,
    /// Report the position as unavailable
    Unavailable,
    /// Report a permission denial
    Denied,
}

impl InitialFixArg {
    /// Sensor answer for this outcome, using `first` as the fix.
    pub fn to_result(self, first: RawFix) -> Result<RawFix, SensorError> {
        match self {
            InitialFixArg::Fix => Ok(first),
            InitialFixArg::Timeout => Err(SensorError::Timeout),
            InitialFixArg::Unavailable => Err(SensorError::PositionUnavailable),
            InitialFixArg::Denied => Err(SensorError::PermissionDenied),
        }
    }
}

/// Load the config file, falling back to defaults when it does not exist.
pub fn load_config(path: &Path) -> Result<ConfigFile, CliError> {
    Ok(ConfigFile::load_or_default(path)?)
}

/// Parse `lat,lon;lat,lon;...` into raw fixes.
pub fn parse_route(route: &str) -> Result<Vec<RawFix>, CliError> {
    let points = route
        .split(';')
        .map(str::trim)
        .filter(|point| !point.is_empty())
        .map(parse_point)
        .collect::<Result<Vec<_>, _>>()?;

    if points.is_empty() {
        return Err(CliError::InvalidRoute("route has no points".to_string()));
    }
    Ok(points)
}

fn parse_point(point: &str) -> Result<RawFix, CliError> {
    let (lat, lon) = point
        .split_once(',')
        .ok_or_else(|| CliError::InvalidRoute(format!("'{}' is not lat,lon", point)))?;

    let parse = |value: &str, name: &str, limit: f64| -> Result<f64, CliError> {
        let parsed: f64 = value.trim().parse().map_err(|_| {
            CliError::InvalidRoute(format!("'{}' is not a valid {}", value.trim(), name))
        })?;
        if parsed.abs() > limit {
            return Err(CliError::InvalidRoute(format!(
                "{} {} out of range",
                name, parsed
            )));
        }
        Ok(parsed)
    };

    Ok(RawFix::new(
        parse(lat, "latitude", 90.0)?,
        parse(lon, "longitude", 180.0)?,
    ))
}

/// Print a one-line status summary.
pub fn print_status(status: &TrackingStatus) {
    let phase = match status.phase {
        TrackingPhase::Idle => style("idle").dim(),
        TrackingPhase::Acquiring => style("acquiring").yellow(),
        TrackingPhase::Tracking => style("tracking").green(),
        TrackingPhase::Retrying => style("retrying").yellow(),
        TrackingPhase::Stopped => style("stopped").red(),
    };
    let message = if status.error.is_some() {
        style(status.message()).red()
    } else {
        style(status.message()).cyan()
    };
    println!(
        "  [{}] permission={} attempt={} errors={} | {}",
        phase, status.permission, status.attempt, status.error_count, message
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_default_route() {
        let route = parse_route(DEFAULT_ROUTE).unwrap();
        assert_eq!(route.len(), 5);
        assert_eq!(route[0].latitude, 51.5074);
        assert_eq!(route[0].longitude, -0.1278);
    }

    #[test]
    fn test_parse_route_tolerates_spacing_and_trailing_separator() {
        let route = parse_route(" 10.5 , 20.25 ; -33.9,18.4; ").unwrap();
        assert_eq!(route.len(), 2);
        assert_eq!(route[1].latitude, -33.9);
        assert_eq!(route[1].longitude, 18.4);
    }

    #[test]
    fn test_parse_route_rejects_garbage() {
        assert!(matches!(
            parse_route("51.5"),
            Err(CliError::InvalidRoute(_))
        ));
        assert!(matches!(
            parse_route("north,west"),
            Err(CliError::InvalidRoute(_))
        ));
        assert!(matches!(
            parse_route("91,0"),
            Err(CliError::InvalidRoute(_))
        ));
        assert!(matches!(parse_route(";;"), Err(CliError::InvalidRoute(_))));
    }

    #[test]
    fn test_initial_fix_arg() {
        let first = RawFix::new(1.0, 2.0);
        assert_eq!(InitialFixArg::Fix.to_result(first), Ok(first));
        assert_eq!(
            InitialFixArg::Timeout.to_result(first),
            Err(SensorError::Timeout)
        );
    }

    #[test]
    fn test_permission_arg_maps_to_state() {
        assert_eq!(
            PermissionState::from(PermissionArg::Prompt),
            PermissionState::Prompt
        );
        assert_eq!(
            PermissionState::from(PermissionArg::Unknown),
            PermissionState::Unknown
        );
    }
}
