//! Scriptable in-process sensor.
//!
//! Used by the CLI simulator and by tests. Every watch and cancel call is
//! recorded so callers can check that subscriptions never overlap and never
//! leak.

use std::collections::VecDeque;

use parking_lot::Mutex;
use tracing::trace;

use crate::error::SensorError;
use crate::fix::RawFix;
use crate::watch::WatchOptions;

use super::adapter::{BoxFuture, FixSink, SensorAdapter, SubscriptionHandle};

#[derive(Debug, Default)]
struct SimulatedInner {
    next_handle: u64,
    active: Vec<(SubscriptionHandle, FixSink)>,
    watch_requests: Vec<WatchOptions>,
    cancelled: Vec<SubscriptionHandle>,
    initial_requests: Vec<WatchOptions>,
    initial_results: VecDeque<Result<RawFix, SensorError>>,
    refuse_next_watch: Option<SensorError>,
}

/// In-process sensor driven by explicit `emit_*` calls.
#[derive(Debug, Default)]
pub struct SimulatedSensor {
    unsupported: bool,
    inner: Mutex<SimulatedInner>,
}

impl SimulatedSensor {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sensor on a platform without location support.
    pub fn unsupported() -> Self {
        Self {
            unsupported: true,
            ..Self::default()
        }
    }

    /// Queue the answer for the next `get_current_fix` call.
    ///
    /// With nothing queued, the request times out after its own timeout.
    pub fn queue_initial(&self, result: Result<RawFix, SensorError>) {
        self.inner.lock().initial_results.push_back(result);
    }

    /// Make the next `watch_fix` call fail with `error`.
    pub fn refuse_next_watch(&self, error: SensorError) {
        self.inner.lock().refuse_next_watch = Some(error);
    }

    /// Deliver a fix on the newest live subscription.
    pub fn emit_fix(&self, fix: RawFix) -> bool {
        self.active_sink().is_some_and(|sink| sink.deliver_fix(fix))
    }

    /// Deliver an error on the newest live subscription.
    pub fn emit_error(&self, error: SensorError) -> bool {
        self.active_sink()
            .is_some_and(|sink| sink.deliver_error(error))
    }

    /// Sink of the newest live subscription.
    pub fn active_sink(&self) -> Option<FixSink> {
        self.inner.lock().active.last().map(|(_, sink)| sink.clone())
    }

    /// Number of subscriptions currently open.
    pub fn active_watches(&self) -> usize {
        self.inner.lock().active.len()
    }

    /// Options of every `watch_fix` call, oldest first.
    pub fn watch_requests(&self) -> Vec<WatchOptions> {
        self.inner.lock().watch_requests.clone()
    }

    /// Options of every `get_current_fix` call, oldest first.
    pub fn initial_requests(&self) -> Vec<WatchOptions> {
        self.inner.lock().initial_requests.clone()
    }

    /// Number of `cancel_watch` calls that closed a live subscription.
    pub fn cancel_count(&self) -> usize {
        self.inner.lock().cancelled.len()
    }
}

impl SensorAdapter for SimulatedSensor {
    fn is_supported(&self) -> bool {
        !self.unsupported
    }

    fn get_current_fix(&self, options: WatchOptions) -> BoxFuture<'_, Result<RawFix, SensorError>> {
        let queued = {
            let mut inner = self.inner.lock();
            inner.initial_requests.push(options);
            inner.initial_results.pop_front()
        };
        Box::pin(async move {
            match queued {
                Some(result) => result,
                None => {
                    tokio::time::sleep(options.timeout()).await;
                    Err(SensorError::Timeout)
                }
            }
        })
    }

    fn watch_fix(
        &self,
        options: WatchOptions,
        sink: FixSink,
    ) -> Result<SubscriptionHandle, SensorError> {
        if self.unsupported {
            return Err(SensorError::Unsupported);
        }
        let mut inner = self.inner.lock();
        if let Some(error) = inner.refuse_next_watch.take() {
            return Err(error);
        }
        inner.next_handle += 1;
        let handle = SubscriptionHandle(inner.next_handle);
        inner.watch_requests.push(options);
        inner.active.push((handle, sink));
        trace!(handle = handle.0, ?options, "Simulated watch opened");
        Ok(handle)
    }

    fn cancel_watch(&self, handle: SubscriptionHandle) {
        let mut inner = self.inner.lock();
        let before = inner.active.len();
        inner.active.retain(|(h, _)| *h != handle);
        if inner.active.len() < before {
            inner.cancelled.push(handle);
            trace!(handle = handle.0, "Simulated watch cancelled");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensor::adapter::TokenSource;
    use tokio::sync::mpsc;

    #[test]
    fn test_watch_and_cancel_bookkeeping() {
        let sensor = SimulatedSensor::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut tokens = TokenSource::new();

        let handle = sensor
            .watch_fix(WatchOptions::for_attempt(0), FixSink::new(tokens.issue(), tx))
            .unwrap();
        assert_eq!(sensor.active_watches(), 1);
        assert!(sensor.emit_fix(RawFix::new(1.0, 2.0)));
        assert!(rx.try_recv().is_ok());

        sensor.cancel_watch(handle);
        sensor.cancel_watch(handle);
        assert_eq!(sensor.active_watches(), 0);
        assert_eq!(sensor.cancel_count(), 1);
        assert!(!sensor.emit_fix(RawFix::new(1.0, 2.0)));
    }

    #[test]
    fn test_refused_watch() {
        let sensor = SimulatedSensor::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        sensor.refuse_next_watch(SensorError::InitializationFailure("busy".into()));

        let result = sensor.watch_fix(
            WatchOptions::for_attempt(0),
            FixSink::new(TokenSource::new().issue(), tx),
        );
        assert!(matches!(result, Err(SensorError::InitializationFailure(_))));
        assert_eq!(sensor.active_watches(), 0);
        assert!(sensor.watch_requests().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_initial_fix_uses_queue_then_times_out() {
        let sensor = SimulatedSensor::new();
        sensor.queue_initial(Ok(RawFix::new(3.0, 4.0)));

        let fix = sensor
            .get_current_fix(WatchOptions::initial_fix())
            .await
            .unwrap();
        assert_eq!(fix.latitude, 3.0);

        let err = sensor
            .get_current_fix(WatchOptions::initial_fix())
            .await
            .unwrap_err();
        assert_eq!(err, SensorError::Timeout);
        assert_eq!(sensor.initial_requests().len(), 2);
    }
}
