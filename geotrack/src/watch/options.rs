//! Sensor request options and retry backoff.
//!
//! Both are pure functions of the retry attempt. Each retry trades precision
//! for reliability: accuracy drops, the timeout grows and older cached
//! readings become acceptable.
//!
//! | attempt | high accuracy | timeout | max fix age | backoff before it |
//! |---------|---------------|---------|-------------|-------------------|
//! | 0       | yes           | 30 s    | 2 s         | -                 |
//! | 1       | no            | 40 s    | 5 s         | 1 s               |
//! | 2       | no            | 50 s    | 8 s         | 2 s               |
//! | 3       | no            | 60 s    | 11 s        | 4 s               |

use std::time::Duration;

use serde::Serialize;

/// Base sensor timeout for attempt 0 in milliseconds.
pub const BASE_TIMEOUT_MS: u32 = 30_000;

/// Timeout added per retry attempt in milliseconds.
pub const TIMEOUT_STEP_MS: u32 = 10_000;

/// Upper bound for the sensor timeout in milliseconds.
pub const MAX_TIMEOUT_MS: u32 = 60_000;

/// Base accepted fix age for attempt 0 in milliseconds.
pub const BASE_MAX_FIX_AGE_MS: u32 = 2_000;

/// Accepted fix age added per retry attempt in milliseconds.
pub const MAX_FIX_AGE_STEP_MS: u32 = 3_000;

/// Backoff before the first retry in milliseconds.
pub const BASE_BACKOFF_MS: u64 = 1_000;

/// Upper bound for the retry backoff in milliseconds.
pub const MAX_BACKOFF_MS: u64 = 10_000;

/// Timeout for the one-shot initial fix in milliseconds.
pub const INITIAL_FIX_TIMEOUT_MS: u32 = 30_000;

/// Accepted fix age for the one-shot initial fix in milliseconds.
pub const INITIAL_FIX_MAX_AGE_MS: u32 = 1_000;

/// Options for a sensor request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WatchOptions {
    /// Ask the sensor for its most precise (and most power hungry) mode.
    pub high_accuracy: bool,
    /// How long the sensor may take to produce a reading.
    pub timeout_ms: u32,
    /// Oldest cached reading the sensor may return instead of a fresh one.
    pub max_fix_age_ms: u32,
}

impl WatchOptions {
    /// Options for a continuous watch at the given retry attempt.
    pub fn for_attempt(attempt: u8) -> Self {
        let attempt = u32::from(attempt);
        Self {
            high_accuracy: attempt < 1,
            timeout_ms: (BASE_TIMEOUT_MS + attempt * TIMEOUT_STEP_MS).min(MAX_TIMEOUT_MS),
            max_fix_age_ms: BASE_MAX_FIX_AGE_MS + attempt * MAX_FIX_AGE_STEP_MS,
        }
    }

    /// Options for the one-shot initial fix.
    pub fn initial_fix() -> Self {
        Self {
            high_accuracy: true,
            timeout_ms: INITIAL_FIX_TIMEOUT_MS,
            max_fix_age_ms: INITIAL_FIX_MAX_AGE_MS,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(u64::from(self.timeout_ms))
    }

    pub fn max_fix_age(&self) -> Duration {
        Duration::from_millis(u64::from(self.max_fix_age_ms))
    }
}

/// Delay before re-subscribing for the given retry attempt (1-based).
///
/// `min(1000 * 2^(attempt-1), 10000)` ms. Attempt 0 has no backoff.
pub fn backoff_delay(attempt: u8) -> Duration {
    if attempt == 0 {
        return Duration::ZERO;
    }
    let exponent = u32::from(attempt - 1);
    let millis = 2u64
        .checked_pow(exponent)
        .and_then(|factor| factor.checked_mul(BASE_BACKOFF_MS))
        .map_or(MAX_BACKOFF_MS, |ms| ms.min(MAX_BACKOFF_MS));
    Duration::from_millis(millis)
}
