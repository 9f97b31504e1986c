//! Front door to a running [`LocationTracker`](super::LocationTracker).

use tokio::sync::{mpsc, watch};

use crate::fix::LocationFix;

use super::status::{LocationDisplay, TrackingStatus};

/// User commands accepted by the tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerCommand {
    /// Start tracking. No-op while tracking is already in progress.
    Start,
    /// Stop tracking. The last fix stays in the store.
    Stop,
    /// Fly back to the current fix. No-op without a fix.
    Recenter,
    /// The location button: recenter when possible, start when not running.
    Locate,
}

/// Cloneable handle for issuing commands and reading state.
///
/// Command methods return `false` once the tracker loop has exited.
#[derive(Debug, Clone)]
pub struct TrackerHandle {
    commands: mpsc::UnboundedSender<TrackerCommand>,
    status: watch::Receiver<TrackingStatus>,
    fixes: watch::Receiver<Option<LocationFix>>,
}

impl TrackerHandle {
    pub(super) fn new(
        commands: mpsc::UnboundedSender<TrackerCommand>,
        status: watch::Receiver<TrackingStatus>,
        fixes: watch::Receiver<Option<LocationFix>>,
    ) -> Self {
        Self {
            commands,
            status,
            fixes,
        }
    }

    pub fn start(&self) -> bool {
        self.send(TrackerCommand::Start)
    }

    pub fn stop(&self) -> bool {
        self.send(TrackerCommand::Stop)
    }

    pub fn recenter(&self) -> bool {
        self.send(TrackerCommand::Recenter)
    }

    pub fn locate(&self) -> bool {
        self.send(TrackerCommand::Locate)
    }

    fn send(&self, command: TrackerCommand) -> bool {
        self.commands.send(command).is_ok()
    }

    /// Latest status snapshot.
    pub fn status(&self) -> TrackingStatus {
        self.status.borrow().clone()
    }

    /// Receiver woken on every status change.
    pub fn status_receiver(&self) -> watch::Receiver<TrackingStatus> {
        self.status.clone()
    }

    /// The stored fix, live or not.
    pub fn current_fix(&self) -> Option<LocationFix> {
        *self.fixes.borrow()
    }

    /// Receiver woken on every published fix.
    pub fn fix_receiver(&self) -> watch::Receiver<Option<LocationFix>> {
        self.fixes.clone()
    }

    /// What to draw for the user's position.
    pub fn location_display(&self) -> LocationDisplay {
        let live = self.status.borrow().live;
        LocationDisplay::from_parts(self.current_fix(), live)
    }
}
