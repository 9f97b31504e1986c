//! Permission adapter boundary and bundled adapters.
//!
//! Both capabilities are optional: a platform without a permission API answers
//! [`PermissionError::Unsupported`] and the tracker falls back to direct
//! acquisition attempts.

use std::fmt;

use parking_lot::Mutex;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::sensor::BoxFuture;

use super::subscription::Subscription;

/// Access state of the location sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionState {
    /// Not known yet, or the platform cannot tell.
    #[default]
    Unknown,
    Granted,
    Denied,
    /// The platform will ask the user on the next request.
    Prompt,
}

impl fmt::Display for PermissionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PermissionState::Unknown => "unknown",
            PermissionState::Granted => "granted",
            PermissionState::Denied => "denied",
            PermissionState::Prompt => "prompt",
        };
        f.write_str(name)
    }
}

/// Errors from a permission adapter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PermissionError {
    /// The platform has no such capability.
    #[error("Permission API not supported")]
    Unsupported,

    /// The platform query failed.
    #[error("Permission query failed: {0}")]
    QueryFailed(String),
}

/// Callback target for permission transitions.
#[derive(Debug, Clone)]
pub struct PermissionSink {
    tx: mpsc::UnboundedSender<PermissionState>,
}

impl PermissionSink {
    pub fn new(tx: mpsc::UnboundedSender<PermissionState>) -> Self {
        Self { tx }
    }

    /// Report a transition. Returns false once nobody listens.
    pub fn notify(&self, state: PermissionState) -> bool {
        self.tx.send(state).is_ok()
    }
}

/// Platform permission service.
pub trait PermissionAdapter: Send + Sync + 'static {
    /// Ask the platform for the current state.
    fn query_permission(&self) -> BoxFuture<'_, Result<PermissionState, PermissionError>>;

    /// Register for transitions. The listener lives as long as the returned
    /// [`Subscription`].
    fn on_permission_change(&self, sink: PermissionSink)
        -> Result<Subscription, PermissionError>;
}

/// Adapter for platforms without a permission API.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnsupportedPermissions;

impl PermissionAdapter for UnsupportedPermissions {
    fn query_permission(&self) -> BoxFuture<'_, Result<PermissionState, PermissionError>> {
        Box::pin(async { Err(PermissionError::Unsupported) })
    }

    fn on_permission_change(
        &self,
        _sink: PermissionSink,
    ) -> Result<Subscription, PermissionError> {
        Err(PermissionError::Unsupported)
    }
}

#[derive(Debug)]
struct ScriptedInner {
    state: PermissionState,
    listeners: Vec<(CancellationToken, PermissionSink)>,
}

/// Permission adapter whose state is set explicitly.
///
/// Stands in for the platform in the simulator and in tests. Transitions made
/// with [`set_state`](Self::set_state) reach every live listener.
#[derive(Debug)]
pub struct ScriptedPermissions {
    inner: Mutex<ScriptedInner>,
}

impl ScriptedPermissions {
    pub fn new(state: PermissionState) -> Self {
        Self {
            inner: Mutex::new(ScriptedInner {
                state,
                listeners: Vec::new(),
            }),
        }
    }

    pub fn state(&self) -> PermissionState {
        self.inner.lock().state
    }

    /// Change the state and notify listeners. Setting the same state again
    /// is not a transition and notifies nobody.
    pub fn set_state(&self, state: PermissionState) {
        let mut inner = self.inner.lock();
        if inner.state == state {
            return;
        }
        inner.state = state;
        inner.listeners.retain(|(token, _)| !token.is_cancelled());
        debug!(%state, listeners = inner.listeners.len(), "Permission transition");
        for (_, sink) in &inner.listeners {
            sink.notify(state);
        }
    }

    /// Number of listeners still registered.
    pub fn listener_count(&self) -> usize {
        self.inner
            .lock()
            .listeners
            .iter()
            .filter(|(token, _)| !token.is_cancelled())
            .count()
    }
}

impl PermissionAdapter for ScriptedPermissions {
    fn query_permission(&self) -> BoxFuture<'_, Result<PermissionState, PermissionError>> {
        let state = self.state();
        Box::pin(async move { Ok(state) })
    }

    fn on_permission_change(
        &self,
        sink: PermissionSink,
    ) -> Result<Subscription, PermissionError> {
        let token = CancellationToken::new();
        self.inner.lock().listeners.push((token.clone(), sink));
        Ok(Subscription::new(token))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unsupported_adapter() {
        let adapter = UnsupportedPermissions;
        assert_eq!(
            adapter.query_permission().await,
            Err(PermissionError::Unsupported)
        );
        let (tx, _rx) = mpsc::unbounded_channel();
        assert!(adapter.on_permission_change(PermissionSink::new(tx)).is_err());
    }

    #[tokio::test]
    async fn test_scripted_transitions_reach_listeners() {
        let adapter = ScriptedPermissions::new(PermissionState::Prompt);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let _subscription = adapter
            .on_permission_change(PermissionSink::new(tx))
            .unwrap();

        adapter.set_state(PermissionState::Granted);
        adapter.set_state(PermissionState::Granted);
        adapter.set_state(PermissionState::Denied);

        assert_eq!(rx.recv().await, Some(PermissionState::Granted));
        assert_eq!(rx.recv().await, Some(PermissionState::Denied));
        assert!(rx.try_recv().is_err());
        assert_eq!(adapter.query_permission().await, Ok(PermissionState::Denied));
    }

    #[test]
    fn test_dropped_subscription_is_pruned() {
        let adapter = ScriptedPermissions::new(PermissionState::Prompt);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let subscription = adapter
            .on_permission_change(PermissionSink::new(tx))
            .unwrap();
        assert_eq!(adapter.listener_count(), 1);

        drop(subscription);
        assert_eq!(adapter.listener_count(), 0);

        adapter.set_state(PermissionState::Granted);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_state_display() {
        assert_eq!(PermissionState::Granted.to_string(), "granted");
        assert_eq!(PermissionState::default(), PermissionState::Unknown);
    }
}
