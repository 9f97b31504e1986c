//! Tracker status types for the presentation layer.
//!
//! [`TrackingStatus`] is a snapshot of the tracker's user-visible state. The
//! event loop publishes it through a [`StatusBoard`] after every event it
//! processes, so observers never see a half-applied transition.

use serde::Serialize;
use tokio::sync::watch;

use crate::error::TrackingError;
use crate::fix::LocationFix;
use crate::permission::{guidance, PermissionState};

/// Shown when nothing else needs saying and no live fix exists.
pub const IDLE_MESSAGE: &str = "Click the location button to find charging stations near you";

/// Shown while live updates are arriving.
pub const ACTIVE_MESSAGE: &str = "Location tracking active";

/// Coarse tracking phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackingPhase {
    /// Tracking was never started.
    #[default]
    Idle,
    /// Waiting for the first fix of this run.
    Acquiring,
    /// Fixes are arriving.
    Tracking,
    /// The watch timed out and is backing off or waiting on a fallback profile.
    Retrying,
    /// Tracking ended, by request or by a terminal error.
    Stopped,
}

/// Snapshot of the tracker's user-visible state.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct TrackingStatus {
    /// Current phase.
    pub phase: TrackingPhase,

    /// Last known permission state.
    pub permission: PermissionState,

    /// Latest surfaced error. Cleared by the next successful fix.
    pub error: Option<TrackingError>,

    /// Number of errors surfaced since the tracker started.
    pub error_count: u32,

    /// Retry attempt of the continuous watch.
    pub attempt: u8,

    /// Whether the stored fix is backed by live updates.
    pub live: bool,
}

impl TrackingStatus {
    /// Whether a start is in progress and no fix has arrived for it yet.
    pub fn is_loading(&self) -> bool {
        self.phase == TrackingPhase::Acquiring
    }

    /// Whether the tracker is working towards or receiving fixes.
    pub fn is_running(&self) -> bool {
        matches!(
            self.phase,
            TrackingPhase::Acquiring | TrackingPhase::Tracking | TrackingPhase::Retrying
        )
    }

    /// The single line shown to the user.
    pub fn message(&self) -> String {
        if let Some(error) = &self.error {
            return error.to_string();
        }
        if let Some(hint) = guidance(self.permission) {
            return hint.to_string();
        }
        if self.live {
            ACTIVE_MESSAGE.to_string()
        } else {
            IDLE_MESSAGE.to_string()
        }
    }

    /// Serialize the snapshot, including the rendered message.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        #[derive(Serialize)]
        struct Rendered<'a> {
            #[serde(flatten)]
            status: &'a TrackingStatus,
            message: String,
        }

        serde_json::to_string_pretty(&Rendered {
            status: self,
            message: self.message(),
        })
    }
}

/// What the UI should draw for the user's position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LocationDisplay {
    /// A fix backed by live updates.
    Live(LocationFix),
    /// The last fix, kept after live updates stopped or while retrying.
    Stale(LocationFix),
    /// No fix was ever obtained.
    Unknown,
}

impl LocationDisplay {
    pub fn from_parts(fix: Option<LocationFix>, live: bool) -> Self {
        match fix {
            Some(fix) if live => LocationDisplay::Live(fix),
            Some(fix) => LocationDisplay::Stale(fix),
            None => LocationDisplay::Unknown,
        }
    }

    pub fn fix(&self) -> Option<LocationFix> {
        match self {
            LocationDisplay::Live(fix) | LocationDisplay::Stale(fix) => Some(*fix),
            LocationDisplay::Unknown => None,
        }
    }
}

/// Publishes [`TrackingStatus`] snapshots to any number of observers.
#[derive(Debug)]
pub struct StatusBoard {
    tx: watch::Sender<TrackingStatus>,
}

impl StatusBoard {
    pub fn new() -> (Self, watch::Receiver<TrackingStatus>) {
        let (tx, rx) = watch::channel(TrackingStatus::default());
        (Self { tx }, rx)
    }

    /// Publish `status`. Observers are only woken when it changed.
    pub fn publish(&self, status: &TrackingStatus) -> bool {
        self.tx.send_if_modified(|current| {
            if current == status {
                false
            } else {
                *current = status.clone();
                true
            }
        })
    }

    pub fn receiver(&self) -> watch::Receiver<TrackingStatus> {
        self.tx.subscribe()
    }
}
