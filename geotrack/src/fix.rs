//! Location fixes.
//!
//! A [`RawFix`] is what a sensor adapter reports. It is converted into an
//! immutable [`LocationFix`] before entering the tracking core.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// A single position reading as reported by a sensor adapter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawFix {
    /// Latitude in degrees.
    pub latitude: f64,
    /// Longitude in degrees.
    pub longitude: f64,
    /// Horizontal accuracy radius in meters, when the sensor knows it.
    pub accuracy_m: Option<f64>,
    /// When the sensor captured the reading.
    pub timestamp: DateTime<Utc>,
}

impl RawFix {
    /// Create a raw fix captured now.
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            accuracy_m: None,
            timestamp: Utc::now(),
        }
    }

    /// Set the accuracy radius.
    pub fn with_accuracy(mut self, accuracy_m: f64) -> Self {
        self.accuracy_m = Some(accuracy_m);
        self
    }

    /// Set an explicit capture time.
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}

/// A resolved geographic coordinate with its capture time.
///
/// Immutable once created. Two fixes describe the same position when their
/// latitude and longitude are exactly equal; capture time is ignored.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LocationFix {
    latitude: f64,
    longitude: f64,
    captured_at: DateTime<Utc>,
}

impl LocationFix {
    /// Create a fix captured now.
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self::captured_at(latitude, longitude, Utc::now())
    }

    /// Create a fix with an explicit capture time.
    pub fn captured_at(latitude: f64, longitude: f64, captured_at: DateTime<Utc>) -> Self {
        Self {
            latitude,
            longitude,
            captured_at,
        }
    }

    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }

    pub fn captured_at_time(&self) -> DateTime<Utc> {
        self.captured_at
    }

    /// Coordinates in map order: `(longitude, latitude)`.
    pub fn lng_lat(&self) -> (f64, f64) {
        (self.longitude, self.latitude)
    }

    /// Exact coordinate equality, the deduplication rule for fix updates.
    #[allow(clippy::float_cmp)]
    pub fn same_position(&self, other: &LocationFix) -> bool {
        self.latitude == other.latitude && self.longitude == other.longitude
    }
}

impl From<RawFix> for LocationFix {
    fn from(raw: RawFix) -> Self {
        Self::captured_at(raw.latitude, raw.longitude, raw.timestamp)
    }
}

/// Whether `candidate` would change what `current` shows.
pub fn differs_from(current: Option<&LocationFix>, candidate: &LocationFix) -> bool {
    current.map_or(true, |c| !c.same_position(candidate))
}
