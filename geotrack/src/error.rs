//! Error taxonomy for location tracking.
//!
//! [`SensorError`] is what adapters report. [`TrackingError`] is what the
//! tracker surfaces to the user: it carries the user-facing message and knows
//! whether the failure ends the current tracking session.

use serde::Serialize;
use thiserror::Error;

/// Errors reported by a location sensor adapter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SensorError {
    /// The user or platform refused access to the sensor.
    #[error("Permission denied")]
    PermissionDenied,

    /// The sensor could not resolve a position.
    #[error("Position unavailable")]
    PositionUnavailable,

    /// No position arrived within the requested timeout.
    #[error("Timed out waiting for a position")]
    Timeout,

    /// The platform has no location sensor.
    #[error("Location sensor not supported")]
    Unsupported,

    /// The adapter failed to set up a request.
    #[error("Sensor initialization failed: {0}")]
    InitializationFailure(String),

    /// Any other adapter-specific failure.
    #[error("Sensor error: {0}")]
    Other(String),
}

impl SensorError {
    /// Whether a watch session may retry after this error.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SensorError::Timeout)
    }
}

/// Errors surfaced to the user by the tracker.
///
/// Display strings are the messages shown in the UI.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", content = "detail")]
pub enum TrackingError {
    /// The sensor reported a permission denial.
    #[error("Location access was denied. Please enable location services and refresh the page.")]
    PermissionDenied,

    /// Permission was revoked while the view was open.
    #[error(
        "To use location tracking:\n1. Click the location icon in your browser address bar\n2. Select \"Allow\"\n3. Reload the page"
    )]
    PermissionRevoked,

    /// The sensor cannot resolve a position.
    #[error("Unable to determine your location. Please check your device settings.")]
    PositionUnavailable,

    /// The initial fix timed out. Continuous tracking keeps trying.
    #[error("Location request timed out. Please check your connection and try again.")]
    Timeout,

    /// Watch retries were exhausted.
    #[error("Location tracking is currently unavailable. Please try again later.")]
    TrackingUnavailable,

    /// The platform has no location sensor.
    #[error("Geolocation is not supported by your browser.")]
    Unsupported,

    /// The sensor subscription could not be opened.
    #[error("Unable to start location tracking. Please check your browser settings.")]
    InitializationFailure(String),

    /// Any unclassified sensor failure.
    #[error("An error occurred while tracking your location.")]
    Unknown(String),
}

impl TrackingError {
    /// Classify a sensor error into its user-facing form.
    pub fn from_sensor(error: &SensorError) -> Self {
        match error {
            SensorError::PermissionDenied => TrackingError::PermissionDenied,
            SensorError::PositionUnavailable => TrackingError::PositionUnavailable,
            SensorError::Timeout => TrackingError::Timeout,
            SensorError::Unsupported => TrackingError::Unsupported,
            SensorError::InitializationFailure(reason) => {
                TrackingError::InitializationFailure(reason.clone())
            }
            SensorError::Other(reason) => TrackingError::Unknown(reason.clone()),
        }
    }

    /// Whether this error ends the current tracking session.
    ///
    /// Only an initial-fix timeout is informational; the watch keeps going.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TrackingError::Timeout)
    }

    /// Whether the user has to act (grant access) before tracking can work.
    pub fn needs_user_action(&self) -> bool {
        matches!(
            self,
            TrackingError::PermissionDenied | TrackingError::PermissionRevoked
        )
    }
}

impl From<SensorError> for TrackingError {
    fn from(error: SensorError) -> Self {
        TrackingError::from_sensor(&error)
    }
}
