//! The single source of truth for the current location.
//!
//! [`LocationStore`] keeps only the latest fix. Producers (the initial fix
//! and the watch session) write to it; the viewport and any other consumer
//! only read. Writes with unchanged coordinates are dropped here as well as
//! in the watch session, so every producer path is deduplicated.
//!
//! Listeners run synchronously inside the tracker's event loop. Consumers on
//! other tasks use [`LocationStore::watch`] instead.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::trace;

use crate::fix::{differs_from, LocationFix};

/// Receives fix changes from a [`LocationStore`].
pub trait FixListener: Send + Sync {
    fn on_fix_changed(&self, fix: &LocationFix);
}

/// Identifies a registered listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Latest-fix store with change notifications.
pub struct LocationStore {
    current: Option<LocationFix>,
    listeners: Vec<(ListenerId, Arc<dyn FixListener>)>,
    next_listener: u64,
    published: watch::Sender<Option<LocationFix>>,
}

impl std::fmt::Debug for LocationStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocationStore")
            .field("current", &self.current)
            .field("listeners", &self.listeners.len())
            .finish_non_exhaustive()
    }
}

impl Default for LocationStore {
    fn default() -> Self {
        Self::new()
    }
}

impl LocationStore {
    pub fn new() -> Self {
        let (published, _) = watch::channel(None);
        Self {
            current: None,
            listeners: Vec::new(),
            next_listener: 0,
            published,
        }
    }

    /// Store `fix` and notify listeners if its coordinates changed.
    ///
    /// Returns true if listeners were notified.
    pub fn set_fix(&mut self, fix: LocationFix) -> bool {
        if !differs_from(self.current.as_ref(), &fix) {
            trace!(
                lat = fix.latitude(),
                lon = fix.longitude(),
                "Duplicate fix ignored"
            );
            return false;
        }

        self.current = Some(fix);
        self.published.send_replace(Some(fix));
        for (_, listener) in &self.listeners {
            listener.on_fix_changed(&fix);
        }
        true
    }

    pub fn current_fix(&self) -> Option<LocationFix> {
        self.current
    }

    /// Register a listener for future changes.
    pub fn subscribe(&mut self, listener: Arc<dyn FixListener>) -> ListenerId {
        self.next_listener += 1;
        let id = ListenerId(self.next_listener);
        self.listeners.push((id, listener));
        id
    }

    /// Remove a listener. Returns false if it was not registered.
    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(existing, _)| *existing != id);
        self.listeners.len() < before
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Read-only view of the current fix for other tasks.
    pub fn watch(&self) -> watch::Receiver<Option<LocationFix>> {
        self.published.subscribe()
    }
}
