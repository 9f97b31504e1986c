//! Continuous position watching.
//!
//! - [`options`]: pure derivation of sensor options and backoff per attempt
//! - [`retry`]: the retry counter as a value-in/value-out state machine
//! - [`session`]: the subscription lifecycle built on top of both

pub mod options;
pub mod retry;
mod session;

pub use options::{backoff_delay, WatchOptions};
pub use retry::{RetryDecision, RetryState, DEFAULT_MAX_ATTEMPTS};
pub use session::{WatchEvent, WatchSession, WatchState};
