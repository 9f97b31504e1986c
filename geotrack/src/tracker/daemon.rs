//! The tracking event loop.
//!
//! [`LocationTracker`] owns every piece of tracking state and runs as a
//! single task. Everything that can change that state arrives on a channel:
//!
//! ```text
//!   TrackerHandle ──commands────┐
//!   PermissionAdapter ──states──┤
//!   FixAcquirer task ──outcome──┼──► run() ──► WatchSession ──► LocationStore ──► ViewportSync
//!   SensorAdapter ──reports─────┤                                    │
//!   retry timers ──tokens───────┘                                    └──► TrackerHandle (watch)
//! ```
//!
//! The loop handles one event at a time and publishes a [`TrackingStatus`]
//! snapshot after each, so no locks guard tracking state.
//!
//! # Example
//!
//! ```ignore
//! let (tracker, handle) = LocationTracker::new(config, sensor, permissions);
//! let shutdown = CancellationToken::new();
//! tokio::spawn(tracker.run(shutdown.clone()));
//!
//! handle.locate();
//! ```

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::acquirer::{FixAcquirer, InitialFixOutcome, WatchPlan};
use crate::config::{MapDefaults, TrackerConfig};
use crate::error::TrackingError;
use crate::permission::{
    PermissionAction, PermissionAdapter, PermissionMonitor, PermissionState, Subscription,
};
use crate::sensor::{SensorAdapter, SensorReport, SessionToken};
use crate::store::{FixListener, ListenerId, LocationStore};
use crate::viewport::{Viewport, ViewportSync};
use crate::watch::{WatchEvent, WatchSession};

use super::handle::{TrackerCommand, TrackerHandle};
use super::status::{StatusBoard, TrackingPhase, TrackingStatus};

/// Receiving ends of the loop's channels.
struct Inbox {
    commands: mpsc::UnboundedReceiver<TrackerCommand>,
    reports: mpsc::UnboundedReceiver<SensorReport>,
    retries: mpsc::UnboundedReceiver<SessionToken>,
    outcomes: mpsc::UnboundedReceiver<InitialFixOutcome>,
}

/// Continuous location tracker.
pub struct LocationTracker<S: SensorAdapter, P: PermissionAdapter> {
    core: TrackerCore<S, P>,
    inbox: Inbox,
}

impl<S: SensorAdapter, P: PermissionAdapter> LocationTracker<S, P> {
    /// Creates a tracker and its handle.
    ///
    /// Nothing happens until [`run`](Self::run) is awaited.
    pub fn new(config: TrackerConfig, sensor: Arc<S>, permissions: Arc<P>) -> (Self, TrackerHandle) {
        let (command_tx, commands) = mpsc::unbounded_channel();
        let (report_tx, reports) = mpsc::unbounded_channel();
        let (retry_tx, retries) = mpsc::unbounded_channel();
        let (outcome_tx, outcomes) = mpsc::unbounded_channel();

        let store = LocationStore::new();
        let (board, status_rx) = StatusBoard::new();
        let handle = TrackerHandle::new(command_tx, status_rx, store.watch());

        let core = TrackerCore {
            acquirer: FixAcquirer::new(Arc::clone(&sensor), config.initial_fix, outcome_tx),
            watch: WatchSession::new(
                Arc::clone(&sensor),
                config.max_attempts,
                report_tx,
                retry_tx,
            ),
            monitor: PermissionMonitor::new(permissions),
            sensor,
            store,
            viewport: None,
            map: config.map,
            board,
            status: TrackingStatus::default(),
        };

        let inbox = Inbox {
            commands,
            reports,
            retries,
            outcomes,
        };

        (Self { core, inbox }, handle)
    }

    /// Drive `viewport` from the store.
    pub fn with_viewport(mut self, viewport: Arc<dyn Viewport>) -> Self {
        let sync = Arc::new(ViewportSync::new(viewport, self.core.map));
        self.core.store.subscribe(sync.clone());
        self.core.viewport = Some(sync);
        self
    }

    /// Register an extra store listener. Called inside the loop, so it must
    /// not block.
    pub fn subscribe(&mut self, listener: Arc<dyn FixListener>) -> ListenerId {
        self.core.store.subscribe(listener)
    }

    /// Runs the tracker until shutdown is signalled.
    ///
    /// On exit the watch is stopped, any in-flight acquisition is abandoned
    /// and the permission listener is released.
    pub async fn run(self, shutdown: CancellationToken) {
        info!("Location tracker starting");

        let Self { mut core, inbox } = self;
        let Inbox {
            mut commands,
            mut reports,
            mut retries,
            mut outcomes,
        } = inbox;

        let (permission_tx, mut permissions) = mpsc::unbounded_channel();
        let subscription = tokio::select! {
            biased;

            _ = shutdown.cancelled() => None,
            subscription = core.bootstrap(permission_tx) => Some(subscription),
        };
        let Some(subscription) = subscription else {
            info!("Location tracker shut down during startup");
            core.teardown();
            return;
        };
        core.publish();

        loop {
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => {
                    info!("Location tracker shutting down");
                    break;
                }

                Some(state) = permissions.recv() => {
                    core.handle_permission(state);
                }

                Some(command) = commands.recv() => {
                    core.handle_command(command);
                }

                Some(outcome) = outcomes.recv() => {
                    core.handle_initial_fix(outcome);
                }

                Some(report) = reports.recv() => {
                    core.handle_report(report);
                }

                Some(token) = retries.recv() => {
                    core.handle_retry_due(token);
                }
            }
            core.publish();
        }

        core.teardown();
        drop(subscription);
        info!("Location tracker stopped");
    }
}

/// Tracking state owned by the loop.
struct TrackerCore<S: SensorAdapter, P: PermissionAdapter> {
    sensor: Arc<S>,
    monitor: PermissionMonitor<P>,
    acquirer: FixAcquirer<S>,
    watch: WatchSession<S>,
    store: LocationStore,
    viewport: Option<Arc<ViewportSync>>,
    map: MapDefaults,
    board: StatusBoard,
    status: TrackingStatus,
}

impl<S: SensorAdapter, P: PermissionAdapter> TrackerCore<S, P> {
    async fn bootstrap(
        &mut self,
        permission_tx: mpsc::UnboundedSender<PermissionState>,
    ) -> Option<Subscription> {
        if let Some(viewport) = &self.viewport {
            viewport.show_default();
        }

        if !self.sensor.is_supported() {
            warn!("Location sensor not supported");
            self.fail(TrackingError::Unsupported);
            return None;
        }

        let state = self.monitor.check_permission().await;
        self.status.permission = state;
        if PermissionMonitor::<P>::allows_immediate_start(state) {
            self.start_tracking();
        } else {
            info!(%state, "Waiting for location permission");
        }

        self.monitor.subscribe(permission_tx)
    }

    fn handle_command(&mut self, command: TrackerCommand) {
        debug!(?command, "Tracker command");
        match command {
            TrackerCommand::Start => self.start_tracking(),
            TrackerCommand::Stop => {
                if self.status.is_running() {
                    info!("Location tracking stopped by user");
                    self.halt();
                    self.status.phase = TrackingPhase::Stopped;
                }
            }
            TrackerCommand::Recenter => self.recenter(),
            TrackerCommand::Locate => {
                let has_fix = self.store.current_fix().is_some();
                if has_fix && !self.status.is_loading() {
                    self.recenter();
                }
                if !self.status.is_running() {
                    self.start_tracking();
                }
            }
        }
    }

    fn handle_permission(&mut self, state: PermissionState) {
        let previous = self.status.permission;
        self.status.permission = state;

        match PermissionMonitor::<P>::policy_for(state) {
            PermissionAction::StartTracking => {
                info!(%previous, "Location permission granted");
                self.start_tracking();
            }
            PermissionAction::StopWithDenial => {
                warn!(%previous, "Location permission revoked, stopping");
                self.halt();
                self.fail(TrackingError::PermissionRevoked);
            }
            PermissionAction::None => {
                debug!(%previous, %state, "Permission transition needs no action");
            }
        }
    }

    fn handle_initial_fix(&mut self, outcome: InitialFixOutcome) {
        let Some(plan) = self.acquirer.accept(outcome) else {
            return;
        };

        let started = match plan {
            WatchPlan::AfterFix(fix) => {
                self.store.set_fix(fix);
                self.on_live_fix();
                self.watch.start_after_fix(fix)
            }
            WatchPlan::Degraded(error) => {
                self.surface(error);
                self.status.phase = TrackingPhase::Retrying;
                self.watch.start_degraded()
            }
        };

        if let Err(error) = started {
            self.fail(error);
        }
    }

    fn handle_report(&mut self, report: SensorReport) {
        let event = self.watch.handle_report(report, &mut self.store);
        self.apply(event);
    }

    fn handle_retry_due(&mut self, token: SessionToken) {
        let event = self.watch.handle_retry_due(token);
        self.apply(event);
    }

    fn apply(&mut self, event: WatchEvent) {
        match event {
            WatchEvent::Ignored => {}
            WatchEvent::Fix { .. } => self.on_live_fix(),
            WatchEvent::RetryScheduled { .. } | WatchEvent::Resubscribed { .. } => {
                self.status.phase = TrackingPhase::Retrying;
                self.status.live = false;
            }
            WatchEvent::Stopped(error) => self.fail(error),
        }
    }

    /// Start the initial acquisition unless tracking is already in progress.
    fn start_tracking(&mut self) {
        if !self.sensor.is_supported() {
            self.fail(TrackingError::Unsupported);
            return;
        }
        if self.acquirer.is_in_flight() || self.watch.state().is_live() {
            debug!("Location tracking already in progress");
            return;
        }

        info!("Starting location tracking");
        self.status.error = None;
        self.status.live = false;
        self.status.phase = TrackingPhase::Acquiring;
        self.acquirer.begin();
    }

    fn recenter(&self) {
        match (self.store.current_fix(), &self.viewport) {
            (Some(fix), Some(viewport)) => viewport.recenter(&fix),
            (None, _) => debug!("No location to recenter on"),
            (Some(_), None) => debug!("No viewport attached, recenter ignored"),
        }
    }

    fn on_live_fix(&mut self) {
        self.status.error = None;
        self.status.live = true;
        self.status.phase = TrackingPhase::Tracking;
    }

    /// Cancel the watch and any in-flight acquisition.
    fn halt(&mut self) {
        self.acquirer.abandon();
        self.watch.stop();
        self.status.live = false;
    }

    /// Surface a terminal error and stop.
    fn fail(&mut self, error: TrackingError) {
        self.halt();
        self.surface(error);
        self.status.phase = TrackingPhase::Stopped;
    }

    fn surface(&mut self, error: TrackingError) {
        self.status.error_count += 1;
        warn!(
            error = %error,
            count = self.status.error_count,
            "Tracking error surfaced"
        );
        self.status.error = Some(error);
    }

    fn publish(&mut self) {
        self.status.attempt = self.watch.attempt();
        self.board.publish(&self.status);
    }

    fn teardown(&mut self) {
        self.halt();
        if self.status.is_running() {
            self.status.phase = TrackingPhase::Stopped;
        }
        self.publish();
    }
}
