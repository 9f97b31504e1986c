//! Sensor adapter boundary.
//!
//! A [`SensorAdapter`] maps onto a platform geolocation service. Watch
//! callbacks go through a [`FixSink`], which tags every report with the
//! [`SessionToken`] of the subscription that produced it. The tracker compares
//! that token against its current session and drops anything stale, so a
//! callback racing a cancellation can never leak into a newer session.

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use tokio::sync::mpsc;

use crate::error::SensorError;
use crate::fix::RawFix;
use crate::watch::WatchOptions;

/// Boxed future type for dyn-compatible async methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Identity of one tracking session (one subscription or one acquisition).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionToken(u64);

impl SessionToken {
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session#{}", self.0)
    }
}

/// Monotonic source of session tokens.
#[derive(Debug, Default)]
pub struct TokenSource {
    next: u64,
}

impl TokenSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a token never handed out before by this source.
    pub fn issue(&mut self) -> SessionToken {
        self.next += 1;
        SessionToken(self.next)
    }
}

/// Adapter-side identifier of an open watch subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle(pub u64);

/// One watch callback: a fix or an error, tagged with its session.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorReport {
    pub token: SessionToken,
    pub result: Result<RawFix, SensorError>,
}

/// Callback target handed to [`SensorAdapter::watch_fix`].
///
/// Cheap to clone. Delivering never blocks; reports are queued for the
/// tracker's event loop.
#[derive(Debug, Clone)]
pub struct FixSink {
    token: SessionToken,
    tx: mpsc::UnboundedSender<SensorReport>,
}

impl FixSink {
    pub fn new(token: SessionToken, tx: mpsc::UnboundedSender<SensorReport>) -> Self {
        Self { token, tx }
    }

    pub fn token(&self) -> SessionToken {
        self.token
    }

    /// Report a new position. Returns false once the tracker is gone.
    pub fn deliver_fix(&self, fix: RawFix) -> bool {
        self.deliver(Ok(fix))
    }

    /// Report a sensor failure. Returns false once the tracker is gone.
    pub fn deliver_error(&self, error: SensorError) -> bool {
        self.deliver(Err(error))
    }

    fn deliver(&self, result: Result<RawFix, SensorError>) -> bool {
        self.tx
            .send(SensorReport {
                token: self.token,
                result,
            })
            .is_ok()
    }
}

/// Platform location sensor.
pub trait SensorAdapter: Send + Sync + 'static {
    /// Whether the platform has a location sensor at all.
    fn is_supported(&self) -> bool {
        true
    }

    /// Request a single position.
    fn get_current_fix(&self, options: WatchOptions) -> BoxFuture<'_, Result<RawFix, SensorError>>;

    /// Open a continuous subscription delivering into `sink`.
    fn watch_fix(
        &self,
        options: WatchOptions,
        sink: FixSink,
    ) -> Result<SubscriptionHandle, SensorError>;

    /// Close a subscription. Unknown handles are ignored.
    fn cancel_watch(&self, handle: SubscriptionHandle);
}
