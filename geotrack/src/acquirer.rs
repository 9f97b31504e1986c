//! One-shot initial fix acquisition.
//!
//! The first fix is requested with strict options (high accuracy, 30 s
//! timeout, at most 1 s old). Whatever the outcome, continuous watching
//! follows: a success seeds the watch at attempt 0, a failure is surfaced and
//! the watch starts on the degraded attempt-1 profile instead.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{SensorError, TrackingError};
use crate::fix::LocationFix;
use crate::sensor::{SensorAdapter, SessionToken, TokenSource};
use crate::watch::WatchOptions;

/// Result of a background acquisition, tagged with its token.
#[derive(Debug, Clone, PartialEq)]
pub struct InitialFixOutcome {
    pub token: SessionToken,
    pub result: Result<LocationFix, SensorError>,
}

/// How continuous watching continues after the initial fix.
#[derive(Debug, Clone, PartialEq)]
pub enum WatchPlan {
    /// Publish the fix and watch at attempt 0.
    AfterFix(LocationFix),
    /// Surface the error and watch on the degraded profile.
    Degraded(TrackingError),
}

impl WatchPlan {
    pub fn from_result(result: Result<LocationFix, SensorError>) -> Self {
        match result {
            Ok(fix) => WatchPlan::AfterFix(fix),
            Err(error) => WatchPlan::Degraded(TrackingError::from_sensor(&error)),
        }
    }
}

/// Obtains the initial fix.
pub struct FixAcquirer<S: SensorAdapter> {
    sensor: Arc<S>,
    options: WatchOptions,
    results: mpsc::UnboundedSender<InitialFixOutcome>,
    tokens: TokenSource,
    in_flight: Option<(SessionToken, CancellationToken)>,
}

impl<S: SensorAdapter> std::fmt::Debug for FixAcquirer<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FixAcquirer")
            .field("options", &self.options)
            .field("in_flight", &self.in_flight.as_ref().map(|(t, _)| *t))
            .finish_non_exhaustive()
    }
}

impl<S: SensorAdapter> FixAcquirer<S> {
    /// Create an acquirer posting background results into `results`.
    pub fn new(
        sensor: Arc<S>,
        options: WatchOptions,
        results: mpsc::UnboundedSender<InitialFixOutcome>,
    ) -> Self {
        Self {
            sensor,
            options,
            results,
            tokens: TokenSource::new(),
            in_flight: None,
        }
    }

    pub fn options(&self) -> WatchOptions {
        self.options
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Request one fix and wait for it.
    pub async fn acquire_initial_fix(&self) -> Result<LocationFix, SensorError> {
        self.sensor
            .get_current_fix(self.options)
            .await
            .map(LocationFix::from)
    }

    /// Request one fix in the background.
    ///
    /// The outcome is posted with the returned token. Any earlier request
    /// still running is abandoned first.
    pub fn begin(&mut self) -> SessionToken {
        self.abandon();

        let token = self.tokens.issue();
        let cancel = CancellationToken::new();
        let sensor = Arc::clone(&self.sensor);
        let options = self.options;
        let results = self.results.clone();
        let guard = cancel.clone();

        info!(
            token = %token,
            timeout_ms = options.timeout_ms,
            "Requesting initial position"
        );
        tokio::spawn(async move {
            tokio::select! {
                _ = guard.cancelled() => {}
                result = sensor.get_current_fix(options) => {
                    let _ = results.send(InitialFixOutcome {
                        token,
                        result: result.map(LocationFix::from),
                    });
                }
            }
        });

        self.in_flight = Some((token, cancel));
        token
    }

    /// Accept a posted outcome. Returns `None` for abandoned requests.
    pub fn accept(&mut self, outcome: InitialFixOutcome) -> Option<WatchPlan> {
        match &self.in_flight {
            Some((token, _)) if *token == outcome.token => {
                self.in_flight = None;
            }
            _ => {
                debug!(token = %outcome.token, "Stale initial fix ignored");
                return None;
            }
        }

        match &outcome.result {
            Ok(fix) => info!(
                lat = fix.latitude(),
                lon = fix.longitude(),
                "Initial position received"
            ),
            Err(error) => warn!(error = %error, "Initial position failed, falling back"),
        }
        Some(WatchPlan::from_result(outcome.result))
    }

    /// Abandon the running request, if any.
    pub fn abandon(&mut self) {
        if let Some((token, cancel)) = self.in_flight.take() {
            debug!(token = %token, "Initial fix request abandoned");
            cancel.cancel();
        }
    }
}

impl<S: SensorAdapter> Drop for FixAcquirer<S> {
    fn drop(&mut self) {
        self.abandon();
    }
}
