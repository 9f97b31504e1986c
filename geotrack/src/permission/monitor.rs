//! Permission observation and the tracking policy attached to it.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::adapter::{PermissionAdapter, PermissionError, PermissionSink, PermissionState};
use super::subscription::Subscription;

/// Guidance shown while access is blocked.
pub const DENIED_GUIDANCE: &str = "Location access is blocked. To enable:\n1. Click the location icon in your browser address bar\n2. Select \"Allow\"\n3. Reload the page";

/// Guidance shown while the platform will prompt.
pub const PROMPT_GUIDANCE: &str = "Click the location button to allow access to your location";

/// What the tracker must do after a permission transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionAction {
    /// Start tracking (no-op when already tracking).
    StartTracking,
    /// Stop everything and surface the denial. Never retried automatically.
    StopWithDenial,
    /// Nothing to do.
    None,
}

/// Observes permission transitions through a [`PermissionAdapter`].
pub struct PermissionMonitor<P: PermissionAdapter> {
    adapter: Arc<P>,
}

impl<P: PermissionAdapter> std::fmt::Debug for PermissionMonitor<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PermissionMonitor").finish_non_exhaustive()
    }
}

impl<P: PermissionAdapter> PermissionMonitor<P> {
    pub fn new(adapter: Arc<P>) -> Self {
        Self { adapter }
    }

    /// Current permission state.
    ///
    /// Fails softly to [`PermissionState::Unknown`] when the platform cannot
    /// answer, in which case callers should attempt acquisition directly.
    pub async fn check_permission(&self) -> PermissionState {
        match self.adapter.query_permission().await {
            Ok(state) => {
                debug!(%state, "Permission queried");
                state
            }
            Err(PermissionError::Unsupported) => {
                debug!("Permission API unavailable, assuming unknown");
                PermissionState::Unknown
            }
            Err(error) => {
                warn!(error = %error, "Permission check failed, assuming unknown");
                PermissionState::Unknown
            }
        }
    }

    /// Register for transitions, delivered into `tx`.
    ///
    /// Returns `None` when the platform cannot report transitions.
    pub fn subscribe(&self, tx: mpsc::UnboundedSender<PermissionState>) -> Option<Subscription> {
        match self.adapter.on_permission_change(PermissionSink::new(tx)) {
            Ok(subscription) => Some(subscription),
            Err(error) => {
                debug!(error = %error, "Permission changes cannot be observed");
                None
            }
        }
    }

    /// Tracking policy for a transition to `state`.
    pub fn policy_for(state: PermissionState) -> PermissionAction {
        match state {
            PermissionState::Granted => PermissionAction::StartTracking,
            PermissionState::Denied => PermissionAction::StopWithDenial,
            PermissionState::Prompt | PermissionState::Unknown => PermissionAction::None,
        }
    }

    /// Whether tracking may start right away after the initial check.
    pub fn allows_immediate_start(state: PermissionState) -> bool {
        matches!(state, PermissionState::Granted | PermissionState::Unknown)
    }
}

/// User-facing hint for a permission state, if any.
pub fn guidance(state: PermissionState) -> Option<&'static str> {
    match state {
        PermissionState::Denied => Some(DENIED_GUIDANCE),
        PermissionState::Prompt => Some(PROMPT_GUIDANCE),
        PermissionState::Granted | PermissionState::Unknown => None,
    }
}
