//! GeoTrack - resilient continuous location tracking for map views
//!
//! This library acquires and maintains a live geographic fix from an
//! unreliable, permission-gated location sensor and keeps a map viewport and
//! its position marker synchronized with it.
//!
//! # Architecture
//!
//! ```text
//! PermissionMonitor ──► FixAcquirer ──► WatchSession ──► LocationStore ──► ViewportSync
//!    (gates start)      (first fix)     (continuous,      (dedup, single    (camera +
//!                                        retry/backoff)    source of truth)  marker)
//! ```
//!
//! Everything above is owned by a single [`tracker::LocationTracker`] event
//! loop. Sensor callbacks, permission transitions, retry timers and user
//! commands are funnelled through channels into that loop, so tracking state
//! is never touched from two places at once.

pub mod acquirer;
pub mod config;
pub mod error;
pub mod fix;
pub mod logging;
pub mod permission;
pub mod sensor;
pub mod store;
pub mod tracker;
pub mod viewport;
pub mod watch;

/// Library version, as declared in Cargo.toml.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
