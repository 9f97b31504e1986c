//! The location tracker: one event loop owning all tracking state.
//!
//! - [`LocationTracker`]: the loop itself, run as a task
//! - [`TrackerHandle`]: cloneable commands and read-only state for the UI
//! - [`TrackingStatus`]: the snapshot the loop publishes after every event

mod daemon;
mod handle;
mod status;

pub use daemon::LocationTracker;
pub use handle::{TrackerCommand, TrackerHandle};
pub use status::{
    LocationDisplay, StatusBoard, TrackingPhase, TrackingStatus, ACTIVE_MESSAGE, IDLE_MESSAGE,
};
