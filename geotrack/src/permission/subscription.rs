//! Disposable listener registrations.

use tokio_util::sync::{CancellationToken, DropGuard};

/// Handle to a registered platform listener.
///
/// The listener stays registered while the handle is alive. Dropping the
/// handle, or calling [`unsubscribe`](Self::unsubscribe), cancels the
/// associated token and the adapter tears the listener down.
#[derive(Debug)]
pub struct Subscription {
    token: CancellationToken,
    _guard: DropGuard,
}

impl Subscription {
    /// Create a subscription bound to `token`.
    ///
    /// Adapters keep a clone of `token` next to the listener and stop
    /// delivering once it is cancelled.
    pub fn new(token: CancellationToken) -> Self {
        Self {
            _guard: token.clone().drop_guard(),
            token,
        }
    }

    pub fn is_active(&self) -> bool {
        !self.token.is_cancelled()
    }

    /// Tear the listener down now.
    pub fn unsubscribe(self) {
        drop(self);
    }
}
