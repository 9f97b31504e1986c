//! Continuous position watch with retry and degrading fallback accuracy.
//!
//! # State Machine
//!
//! ```text
//! Idle ──start──► Starting ──fix──► Active
//!                    │                 │
//!                    └──timeout────────┴──► Retrying ──backoff elapsed──► Starting
//!                    │                 │        │
//!                    └──other error────┴────────┴──exhausted / other──► Stopped
//! ```
//!
//! `Starting` means a subscription is open and nothing has arrived on it yet.
//! While `Retrying`, the stale subscription stays open until the backoff
//! elapses; a fix arriving in that window cancels the pending retry. A
//! timeout arriving in that window counts as the next attempt and replaces
//! the pending timer.
//!
//! # Session tokens
//!
//! Every subscription gets a fresh [`SessionToken`]. Sensor reports and retry
//! timers carry the token they were created under, and anything whose token
//! is not the current one is ignored. Subscriptions are always cancelled
//! before a replacement is opened, so at most one is open at any time.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{SensorError, TrackingError};
use crate::fix::{differs_from, LocationFix};
use crate::sensor::{
    FixSink, SensorAdapter, SensorReport, SessionToken, SubscriptionHandle, TokenSource,
};
use crate::store::LocationStore;

use super::options::WatchOptions;
use super::retry::{RetryDecision, RetryState};

/// Lifecycle state of a [`WatchSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchState {
    Idle,
    Starting,
    Active,
    Retrying,
    Stopped,
}

impl WatchState {
    /// Whether a subscription (or a scheduled replacement) is live.
    pub fn is_live(&self) -> bool {
        matches!(
            self,
            WatchState::Starting | WatchState::Active | WatchState::Retrying
        )
    }
}

/// Outcome of feeding an event into a [`WatchSession`].
#[derive(Debug, Clone, PartialEq)]
pub enum WatchEvent {
    /// The event belonged to a cancelled session or was redundant.
    Ignored,
    /// A fix arrived. `published` is false when the store already had it.
    Fix { published: bool },
    /// A timeout was absorbed; a re-subscription is scheduled.
    RetryScheduled { attempt: u8, delay: Duration },
    /// The scheduled re-subscription was opened.
    Resubscribed { attempt: u8 },
    /// The session ended and this error must be surfaced.
    Stopped(TrackingError),
}

/// Continuous watch over a sensor adapter.
pub struct WatchSession<S: SensorAdapter> {
    sensor: Arc<S>,
    reports: mpsc::UnboundedSender<SensorReport>,
    retries: mpsc::UnboundedSender<SessionToken>,
    tokens: TokenSource,
    state: WatchState,
    retry: RetryState,
    current: Option<SessionToken>,
    subscription: Option<SubscriptionHandle>,
    pending_retry: Option<CancellationToken>,
}

impl<S: SensorAdapter> std::fmt::Debug for WatchSession<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchSession")
            .field("state", &self.state)
            .field("retry", &self.retry)
            .field("current", &self.current)
            .field("subscription", &self.subscription)
            .finish_non_exhaustive()
    }
}

impl<S: SensorAdapter> WatchSession<S> {
    /// Create an idle session.
    ///
    /// Sensor reports are delivered into `reports`; elapsed retry backoffs
    /// into `retries`. The owner feeds both back through
    /// [`handle_report`](Self::handle_report) and
    /// [`handle_retry_due`](Self::handle_retry_due).
    pub fn new(
        sensor: Arc<S>,
        max_attempts: u8,
        reports: mpsc::UnboundedSender<SensorReport>,
        retries: mpsc::UnboundedSender<SessionToken>,
    ) -> Self {
        Self {
            sensor,
            reports,
            retries,
            tokens: TokenSource::new(),
            state: WatchState::Idle,
            retry: RetryState::new(max_attempts),
            current: None,
            subscription: None,
            pending_retry: None,
        }
    }

    pub fn state(&self) -> WatchState {
        self.state
    }

    pub fn attempt(&self) -> u8 {
        self.retry.attempt()
    }

    pub fn last_fix(&self) -> Option<LocationFix> {
        self.retry.last_fix()
    }

    pub fn current_token(&self) -> Option<SessionToken> {
        self.current
    }

    pub fn has_pending_retry(&self) -> bool {
        self.pending_retry.is_some()
    }

    /// Start watching at attempt 0 with high accuracy.
    pub fn start(&mut self) -> Result<(), TrackingError> {
        self.begin(0, None)
    }

    /// Start watching at attempt 0, seeded with a fix obtained elsewhere.
    ///
    /// The seed becomes the stand-in republished on transient errors.
    pub fn start_after_fix(&mut self, fix: LocationFix) -> Result<(), TrackingError> {
        self.begin(0, Some(fix))
    }

    /// Start watching with the degraded profile of attempt 1.
    pub fn start_degraded(&mut self) -> Result<(), TrackingError> {
        self.begin(1, None)
    }

    fn begin(&mut self, attempt: u8, seed: Option<LocationFix>) -> Result<(), TrackingError> {
        if matches!(self.state, WatchState::Starting | WatchState::Active) {
            debug!(state = ?self.state, "Watch already running, start ignored");
            return Ok(());
        }

        self.cancel_pending_retry();
        self.close_subscription();

        let mut retry = self.retry.reset().starting_at(attempt);
        if let Some(fix) = seed {
            retry = retry.on_fix(fix);
        }
        self.retry = retry;

        self.open_subscription()
    }

    /// Feed one sensor report into the state machine.
    pub fn handle_report(&mut self, report: SensorReport, store: &mut LocationStore) -> WatchEvent {
        if !self.state.is_live() || self.current != Some(report.token) {
            debug!(
                token = %report.token,
                current = ?self.current,
                "Stale sensor report ignored"
            );
            return WatchEvent::Ignored;
        }

        match report.result {
            Ok(raw) => self.on_fix(LocationFix::from(raw), store),
            Err(error) => self.on_error(error, store),
        }
    }

    fn on_fix(&mut self, fix: LocationFix, store: &mut LocationStore) -> WatchEvent {
        self.retry = self.retry.on_fix(fix);
        if self.cancel_pending_retry() {
            debug!("Fix arrived during backoff, pending retry cancelled");
        }
        self.state = WatchState::Active;

        let published = if differs_from(store.current_fix().as_ref(), &fix) {
            store.set_fix(fix)
        } else {
            false
        };
        debug!(
            lat = fix.latitude(),
            lon = fix.longitude(),
            published,
            "Watch fix received"
        );
        WatchEvent::Fix { published }
    }

    fn on_error(&mut self, error: SensorError, store: &mut LocationStore) -> WatchEvent {
        // Keep the UI on the last good position while the sensor struggles.
        if let Some(last) = self.retry.last_fix() {
            store.set_fix(last);
        }

        let (next, decision) = self.retry.on_error(&error);
        self.retry = next;

        match decision {
            RetryDecision::Retry { attempt, delay } => {
                info!(
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "Watch timed out, scheduling retry"
                );
                self.state = WatchState::Retrying;
                self.schedule_retry(delay);
                WatchEvent::RetryScheduled { attempt, delay }
            }
            RetryDecision::Exhausted => {
                warn!(
                    attempts = self.retry.max_attempts(),
                    "Watch retries exhausted, tracking unavailable"
                );
                self.stop();
                WatchEvent::Stopped(TrackingError::TrackingUnavailable)
            }
            RetryDecision::GiveUp => {
                warn!(error = %error, "Watch failed");
                self.stop();
                WatchEvent::Stopped(TrackingError::from_sensor(&error))
            }
        }
    }

    /// Re-subscribe after a backoff elapsed.
    pub fn handle_retry_due(&mut self, token: SessionToken) -> WatchEvent {
        if self.state != WatchState::Retrying || self.current != Some(token) {
            debug!(token = %token, "Stale retry timer ignored");
            return WatchEvent::Ignored;
        }

        self.pending_retry = None;
        self.close_subscription();
        let attempt = self.retry.attempt();
        info!(attempt, "Retrying watch with fallback options");

        match self.open_subscription() {
            Ok(()) => WatchEvent::Resubscribed { attempt },
            Err(error) => WatchEvent::Stopped(error),
        }
    }

    /// Cancel the subscription and any pending retry.
    pub fn stop(&mut self) {
        let was_live = self.state.is_live();
        self.cancel_pending_retry();
        self.close_subscription();
        self.current = None;
        self.retry = self.retry.reset();
        self.state = WatchState::Stopped;
        if was_live {
            info!("Watch stopped");
        }
    }

    fn open_subscription(&mut self) -> Result<(), TrackingError> {
        let token = self.tokens.issue();
        let options = self.retry.options();
        let sink = FixSink::new(token, self.reports.clone());

        match self.sensor.watch_fix(options, sink) {
            Ok(handle) => {
                info!(
                    token = %token,
                    attempt = self.retry.attempt(),
                    high_accuracy = options.high_accuracy,
                    timeout_ms = options.timeout_ms,
                    max_fix_age_ms = options.max_fix_age_ms,
                    "Watch subscription opened"
                );
                self.current = Some(token);
                self.subscription = Some(handle);
                self.state = WatchState::Starting;
                Ok(())
            }
            Err(error) => {
                warn!(error = %error, "Could not open watch subscription");
                self.stop();
                Err(match error {
                    SensorError::Unsupported => TrackingError::Unsupported,
                    SensorError::PermissionDenied => TrackingError::PermissionDenied,
                    other => TrackingError::InitializationFailure(other.to_string()),
                })
            }
        }
    }

    fn close_subscription(&mut self) {
        if let Some(handle) = self.subscription.take() {
            self.sensor.cancel_watch(handle);
        }
    }

    fn schedule_retry(&mut self, delay: Duration) {
        let Some(token) = self.current else {
            return;
        };
        self.cancel_pending_retry();

        let cancel = CancellationToken::new();
        let timer = cancel.clone();
        let retries = self.retries.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = timer.cancelled() => {}
                _ = tokio::time::sleep(delay) => {
                    let _ = retries.send(token);
                }
            }
        });
        self.pending_retry = Some(cancel);
    }

    /// Returns true if a retry was pending.
    fn cancel_pending_retry(&mut self) -> bool {
        match self.pending_retry.take() {
            Some(cancel) => {
                cancel.cancel();
                true
            }
            None => false,
        }
    }

    /// Options the current subscription was opened with.
    pub fn current_options(&self) -> WatchOptions {
        self.retry.options()
    }
}

impl<S: SensorAdapter> Drop for WatchSession<S> {
    fn drop(&mut self) {
        self.cancel_pending_retry();
        self.close_subscription();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fix::RawFix;
    use crate::sensor::SimulatedSensor;

    struct Harness {
        sensor: Arc<SimulatedSensor>,
        session: WatchSession<SimulatedSensor>,
        store: LocationStore,
        reports: mpsc::UnboundedReceiver<SensorReport>,
        retries: mpsc::UnboundedReceiver<SessionToken>,
    }

    impl Harness {
        fn new() -> Self {
            let sensor = Arc::new(SimulatedSensor::new());
            let (report_tx, reports) = mpsc::unbounded_channel();
            let (retry_tx, retries) = mpsc::unbounded_channel();
            let session = WatchSession::new(Arc::clone(&sensor), 3, report_tx, retry_tx);
            Self {
                sensor,
                session,
                store: LocationStore::new(),
                reports,
                retries,
            }
        }

        async fn fix(&mut self, lat: f64, lon: f64) -> WatchEvent {
            assert!(self.sensor.emit_fix(RawFix::new(lat, lon)));
            let report = self.reports.recv().await.unwrap();
            self.session.handle_report(report, &mut self.store)
        }

        async fn error(&mut self, error: SensorError) -> WatchEvent {
            assert!(self.sensor.emit_error(error));
            let report = self.reports.recv().await.unwrap();
            self.session.handle_report(report, &mut self.store)
        }

        async fn wait_retry(&mut self) -> WatchEvent {
            let token = self.retries.recv().await.unwrap();
            self.session.handle_retry_due(token)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_opens_single_high_accuracy_watch() {
        let mut h = Harness::new();
        h.session.start().unwrap();

        assert_eq!(h.session.state(), WatchState::Starting);
        assert_eq!(h.sensor.active_watches(), 1);
        assert_eq!(h.sensor.watch_requests(), vec![WatchOptions::for_attempt(0)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_start_while_active_is_noop() {
        let mut h = Harness::new();
        h.session.start().unwrap();
        h.fix(51.5, -0.12).await;
        assert_eq!(h.session.state(), WatchState::Active);

        h.session.start().unwrap();
        h.session.start().unwrap();

        assert_eq!(h.sensor.watch_requests().len(), 1);
        assert_eq!(h.sensor.cancel_count(), 0);
        assert_eq!(h.sensor.active_watches(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fix_is_published_once() {
        let mut h = Harness::new();
        h.session.start().unwrap();

        assert_eq!(h.fix(51.5, -0.12).await, WatchEvent::Fix { published: true });
        assert_eq!(h.fix(51.5, -0.12).await, WatchEvent::Fix { published: false });
        assert_eq!(h.fix(51.6, -0.12).await, WatchEvent::Fix { published: true });
        assert_eq!(h.store.current_fix().unwrap().latitude(), 51.6);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_backs_off_and_resubscribes_with_fallback() {
        let mut h = Harness::new();
        h.session.start().unwrap();
        h.fix(51.5, -0.12).await;

        let started = tokio::time::Instant::now();
        assert_eq!(
            h.error(SensorError::Timeout).await,
            WatchEvent::RetryScheduled {
                attempt: 1,
                delay: Duration::from_secs(1)
            }
        );
        assert_eq!(h.session.state(), WatchState::Retrying);
        // The stale subscription stays open during backoff.
        assert_eq!(h.sensor.active_watches(), 1);

        assert_eq!(h.wait_retry().await, WatchEvent::Resubscribed { attempt: 1 });
        assert!(started.elapsed() >= Duration::from_secs(1));
        assert_eq!(h.session.state(), WatchState::Starting);
        assert_eq!(h.sensor.cancel_count(), 1);
        assert_eq!(h.sensor.active_watches(), 1);
        assert_eq!(
            h.sensor.watch_requests(),
            vec![WatchOptions::for_attempt(0), WatchOptions::for_attempt(1)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_error_republishes_last_fix() {
        let mut h = Harness::new();
        h.session.start().unwrap();
        h.fix(40.0, -74.0).await;

        let mut rx = h.store.watch();
        rx.borrow_and_update();
        h.error(SensorError::Timeout).await;

        // Same coordinates, so the stand-in is deduplicated but still present.
        assert!(!rx.has_changed().unwrap());
        assert_eq!(h.store.current_fix().unwrap().latitude(), 40.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_stops_with_single_terminal_error() {
        let mut h = Harness::new();
        h.session.start().unwrap();
        h.fix(48.85, 2.35).await;

        let mut terminal = Vec::new();
        for expected_attempt in 1..=3u8 {
            let event = h.error(SensorError::Timeout).await;
            assert!(matches!(
                event,
                WatchEvent::RetryScheduled { attempt, .. } if attempt == expected_attempt
            ));
            assert_eq!(
                h.wait_retry().await,
                WatchEvent::Resubscribed {
                    attempt: expected_attempt
                }
            );
        }

        let event = h.error(SensorError::Timeout).await;
        if let WatchEvent::Stopped(error) = &event {
            terminal.push(error.clone());
        }

        assert_eq!(terminal, vec![TrackingError::TrackingUnavailable]);
        assert_eq!(h.session.state(), WatchState::Stopped);
        assert_eq!(h.sensor.active_watches(), 0);
        assert_eq!(h.store.current_fix().unwrap().latitude(), 48.85);
        assert_eq!(
            h.sensor.watch_requests(),
            (0..=3).map(WatchOptions::for_attempt).collect::<Vec<_>>()
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_back_to_back_timeouts_exhaust_without_backoff() {
        let mut h = Harness::new();
        h.session.start().unwrap();
        h.fix(48.85, 2.35).await;

        let mut events = Vec::new();
        for _ in 0..4 {
            events.push(h.error(SensorError::Timeout).await);
        }

        assert_eq!(
            events[..3],
            [
                WatchEvent::RetryScheduled {
                    attempt: 1,
                    delay: Duration::from_secs(1)
                },
                WatchEvent::RetryScheduled {
                    attempt: 2,
                    delay: Duration::from_secs(2)
                },
                WatchEvent::RetryScheduled {
                    attempt: 3,
                    delay: Duration::from_secs(4)
                },
            ]
        );
        let terminal: Vec<_> = events
            .iter()
            .filter(|event| matches!(event, WatchEvent::Stopped(_)))
            .collect();
        assert_eq!(
            terminal,
            vec![&WatchEvent::Stopped(TrackingError::TrackingUnavailable)]
        );
        assert_eq!(h.session.state(), WatchState::Stopped);
        assert_eq!(h.sensor.active_watches(), 0);
        assert!(!h.session.has_pending_retry());
        assert_eq!(h.store.current_fix().unwrap().latitude(), 48.85);

        // No replaced timer survives to re-subscribe.
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert!(h.retries.try_recv().is_err());
        assert_eq!(h.sensor.watch_requests().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_during_backoff_replaces_pending_retry() {
        let mut h = Harness::new();
        h.session.start().unwrap();
        h.error(SensorError::Timeout).await;
        h.error(SensorError::Timeout).await;
        assert_eq!(h.session.attempt(), 2);

        let started = tokio::time::Instant::now();
        assert_eq!(h.wait_retry().await, WatchEvent::Resubscribed { attempt: 2 });
        assert!(started.elapsed() >= Duration::from_secs(2));
        assert!(h.retries.try_recv().is_err());
        assert_eq!(
            h.sensor.watch_requests(),
            vec![WatchOptions::for_attempt(0), WatchOptions::for_attempt(2)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_fix_after_retries_resets_attempt() {
        let mut h = Harness::new();
        h.session.start().unwrap();

        for _ in 0..2 {
            h.error(SensorError::Timeout).await;
            h.wait_retry().await;
        }
        assert_eq!(h.session.attempt(), 2);

        h.fix(1.0, 2.0).await;
        assert_eq!(h.session.attempt(), 0);
        assert_eq!(h.session.state(), WatchState::Active);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fix_during_backoff_cancels_retry() {
        let mut h = Harness::new();
        h.session.start().unwrap();
        h.error(SensorError::Timeout).await;
        assert!(h.session.has_pending_retry());

        h.fix(3.0, 4.0).await;
        assert!(!h.session.has_pending_retry());
        assert_eq!(h.session.attempt(), 0);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(h.retries.try_recv().is_err());
        assert_eq!(h.sensor.watch_requests().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_timeout_error_stops_without_retry() {
        let mut h = Harness::new();
        h.session.start().unwrap();

        assert_eq!(
            h.error(SensorError::PositionUnavailable).await,
            WatchEvent::Stopped(TrackingError::PositionUnavailable)
        );
        assert_eq!(h.session.state(), WatchState::Stopped);
        assert_eq!(h.sensor.active_watches(), 0);
        assert!(!h.session.has_pending_retry());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_report_is_ignored() {
        let mut h = Harness::new();
        h.session.start().unwrap();
        let stale = h.sensor.active_sink().unwrap();

        h.session.stop();
        h.session.start().unwrap();

        stale.deliver_fix(RawFix::new(9.0, 9.0));
        let report = h.reports.recv().await.unwrap();
        assert_eq!(
            h.session.handle_report(report, &mut h.store),
            WatchEvent::Ignored
        );
        assert!(h.store.current_fix().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_cancels_pending_retry() {
        let mut h = Harness::new();
        h.session.start().unwrap();
        h.error(SensorError::Timeout).await;

        h.session.stop();
        assert_eq!(h.session.state(), WatchState::Stopped);
        assert_eq!(h.session.attempt(), 0);
        assert_eq!(h.sensor.active_watches(), 0);

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert!(h.retries.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_degraded_start_uses_attempt_one() {
        let mut h = Harness::new();
        h.session.start_degraded().unwrap();

        assert_eq!(h.session.attempt(), 1);
        let options = h.sensor.watch_requests()[0];
        assert!(!options.high_accuracy);
        assert_eq!(options.timeout_ms, 40_000);
        assert_eq!(options.max_fix_age_ms, 5_000);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refused_subscription_surfaces_initialization_failure() {
        let mut h = Harness::new();
        h.sensor
            .refuse_next_watch(SensorError::InitializationFailure("no provider".into()));

        let err = h.session.start().unwrap_err();
        assert!(matches!(err, TrackingError::InitializationFailure(_)));
        assert_eq!(h.session.state(), WatchState::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_releases_subscription() {
        let mut h = Harness::new();
        h.session.start().unwrap();
        let sensor = Arc::clone(&h.sensor);
        drop(h);
        assert_eq!(sensor.active_watches(), 0);
    }
}
