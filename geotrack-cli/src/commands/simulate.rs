//! Simulate command - run the tracker against a scripted sensor.
//!
//! The simulated platform answers the initial fix request, walks a route,
//! optionally injects watch timeouts and a permission revocation, and prints
//! every viewport call and status change on the way.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use clap::Args;
use console::style;
use tokio_util::sync::CancellationToken;

use geotrack::config::TrackerConfig;
use geotrack::error::SensorError;
use geotrack::fix::RawFix;
use geotrack::logging::init_logging;
use geotrack::permission::{PermissionState, ScriptedPermissions};
use geotrack::sensor::SimulatedSensor;
use geotrack::tracker::{LocationDisplay, LocationTracker, TrackerHandle, TrackingPhase};

use super::common::{
    load_config, parse_route, print_status, InitialFixArg, PermissionArg, DEFAULT_ROUTE,
};
use crate::error::CliError;
use crate::viewport::ConsoleViewport;

/// Longest wait for a re-subscription after an injected timeout.
const RESUBSCRIBE_WAIT: Duration = Duration::from_secs(15);

/// Arguments for the simulate command.
#[derive(Debug, Args)]
pub struct SimulateArgs {
    /// Permission state the platform starts in
    #[arg(long, value_enum, default_value_t = PermissionArg::Granted)]
    pub permission: PermissionArg,

    /// Route to walk, as lat,lon;lat,lon;...
    #[arg(long, default_value = DEFAULT_ROUTE)]
    pub route: String,

    /// Answer to the initial fix request
    #[arg(long, value_enum, default_value_t = InitialFixArg::Fix)]
    pub initial: InitialFixArg,

    /// Watch timeouts to inject after the first route point
    #[arg(long, default_value_t = 0)]
    pub timeouts: u8,

    /// Revoke location permission after the route
    #[arg(long)]
    pub revoke: bool,

    /// Delay between route points in milliseconds
    #[arg(long, default_value_t = 500)]
    pub interval_ms: u64,

    /// Print the final status as JSON
    #[arg(long)]
    pub json: bool,
}

/// Run the simulate command.
pub fn run(args: SimulateArgs, config_path: &Path, verbose: bool) -> Result<(), CliError> {
    let mut config = load_config(config_path)?.tracker;
    if verbose {
        config.logging.level = "debug".to_string();
    }
    let _log_guard = init_logging(&config.logging)?;

    let route = parse_route(&args.route)?;

    println!("GeoTrack Simulator v{}", geotrack::VERSION);
    println!("======================");
    println!();
    println!("Permission:  {:?}", args.permission);
    println!("Initial fix: {:?}", args.initial);
    println!("Route:       {} points", route.len());
    println!("Timeouts:    {}", args.timeouts);
    println!("Retries:     {}", config.max_attempts);
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(CliError::Runtime)?;

    let handle = runtime.block_on(simulate(&args, config, route))?;
    let status = handle.status();

    println!();
    println!("Final Status");
    println!("────────────");
    print_status(&status);
    match handle.location_display() {
        LocationDisplay::Live(fix) => {
            println!("  Location: {:.5}, {:.5} (live)", fix.latitude(), fix.longitude())
        }
        LocationDisplay::Stale(fix) => println!(
            "  Location: {:.5}, {:.5} (last known)",
            fix.latitude(),
            fix.longitude()
        ),
        LocationDisplay::Unknown => println!("  Location: unknown"),
    }

    if args.json {
        let json = status
            .to_json()
            .map_err(|e| CliError::Output(e.to_string()))?;
        println!();
        println!("{}", json);
    }

    Ok(())
}

async fn simulate(
    args: &SimulateArgs,
    config: TrackerConfig,
    route: Vec<RawFix>,
) -> Result<TrackerHandle, CliError> {
    let first = route
        .first()
        .copied()
        .ok_or_else(|| CliError::InvalidRoute("route has no points".to_string()))?;
    let initial_wait = config.initial_fix.timeout() + Duration::from_secs(1);

    let sensor = Arc::new(SimulatedSensor::new());
    sensor.queue_initial(args.initial.to_result(first));
    let permissions = Arc::new(ScriptedPermissions::new(args.permission.into()));

    let (tracker, handle) =
        LocationTracker::new(config, Arc::clone(&sensor), Arc::clone(&permissions));
    let tracker = tracker.with_viewport(Arc::new(ConsoleViewport));

    // Set up signal handler for graceful shutdown
    let shutdown = CancellationToken::new();
    let signal = shutdown.clone();
    ctrlc::set_handler(move || {
        println!();
        println!("Received shutdown signal, stopping...");
        signal.cancel();
    })
    .map_err(|e| CliError::Config(format!("Failed to set signal handler: {}", e)))?;

    let task = tokio::spawn(tracker.run(shutdown.clone()));

    let script = Script {
        sensor,
        permissions,
        handle: handle.clone(),
        interval: Duration::from_millis(args.interval_ms),
        initial_wait,
    };

    tokio::select! {
        _ = shutdown.cancelled() => {}
        _ = script.play(args, &route) => {}
    }

    shutdown.cancel();
    task.await
        .map_err(|e| CliError::Config(format!("Tracker task failed: {}", e)))?;

    Ok(handle)
}

/// Drives the simulated platform.
struct Script {
    sensor: Arc<SimulatedSensor>,
    permissions: Arc<ScriptedPermissions>,
    handle: TrackerHandle,
    interval: Duration,
    initial_wait: Duration,
}

impl Script {
    async fn play(&self, args: &SimulateArgs, route: &[RawFix]) {
        match args.permission {
            PermissionArg::Denied => {
                self.pause().await;
                print_status(&self.handle.status());
                return;
            }
            PermissionArg::Prompt => {
                self.pause().await;
                print_status(&self.handle.status());
                step("User allows location access");
                self.permissions.set_state(PermissionState::Granted);
            }
            PermissionArg::Granted | PermissionArg::Unknown => {}
        }

        if !self.wait_for_watch().await {
            print_status(&self.handle.status());
            return;
        }
        print_status(&self.handle.status());

        for (index, fix) in route.iter().enumerate() {
            if index == 1 && args.timeouts > 0 && !self.inject_timeouts(args.timeouts).await {
                return;
            }
            if !self.sensor.emit_fix(*fix) {
                step("Watch closed, route abandoned");
                break;
            }
            self.pause().await;
            print_status(&self.handle.status());
        }

        if args.revoke {
            step("User blocks location access");
            self.permissions.set_state(PermissionState::Denied);
            self.pause().await;
            print_status(&self.handle.status());
        }
    }

    /// Inject `count` timeouts, waiting out each backoff.
    ///
    /// Returns false once tracking stopped.
    async fn inject_timeouts(&self, count: u8) -> bool {
        for n in 1..=count {
            let opened = self.sensor.watch_requests().len();
            step(&format!("Sensor timeout #{}", n));
            if !self.sensor.emit_error(SensorError::Timeout) {
                return false;
            }

            let resubscribed = tokio::time::timeout(RESUBSCRIBE_WAIT, async {
                loop {
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    if self.sensor.watch_requests().len() > opened {
                        return true;
                    }
                    if self.handle.status().phase == TrackingPhase::Stopped {
                        return false;
                    }
                }
            })
            .await
            .unwrap_or(false);

            print_status(&self.handle.status());
            if !resubscribed {
                return false;
            }
        }
        true
    }

    /// Wait until a watch subscription is open. False if tracking stopped.
    async fn wait_for_watch(&self) -> bool {
        tokio::time::timeout(self.initial_wait, async {
            loop {
                if self.sensor.active_watches() > 0 {
                    return true;
                }
                if self.handle.status().phase == TrackingPhase::Stopped {
                    return false;
                }
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        })
        .await
        .unwrap_or(false)
    }

    async fn pause(&self) {
        tokio::time::sleep(self.interval).await;
    }
}

fn step(message: &str) {
    println!("{} {}", style("»").bold(), message);
}
