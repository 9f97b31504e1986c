//! Retry bookkeeping for a watch session.
//!
//! [`RetryState`] is a plain value. Each transition consumes the current state
//! and returns the next one together with the decision the session has to act
//! on, so the transition table can be tested without a sensor.
//!
//! ```text
//! fix            : attempt := 0, last_fix := fix
//! timeout        : attempt += 1; attempt <= max            -> Retry { attempt, delay }
//!                                attempt >  max            -> Exhausted
//! other error    : unchanged                               -> GiveUp
//! ```

use std::time::Duration;

use crate::error::SensorError;
use crate::fix::LocationFix;

use super::options::{backoff_delay, WatchOptions};

/// Default number of retries after consecutive timeouts.
pub const DEFAULT_MAX_ATTEMPTS: u8 = 3;

/// What the session must do after an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Re-subscribe with [`WatchOptions::for_attempt`] after `delay`.
    Retry { attempt: u8, delay: Duration },
    /// Timeouts exceeded the retry budget.
    Exhausted,
    /// The error is not retryable.
    GiveUp,
}

/// Retry counter and last good fix of a watch session.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryState {
    attempt: u8,
    max_attempts: u8,
    last_fix: Option<LocationFix>,
}

impl Default for RetryState {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS)
    }
}

impl RetryState {
    pub fn new(max_attempts: u8) -> Self {
        Self {
            attempt: 0,
            max_attempts,
            last_fix: None,
        }
    }

    /// Start counting from `attempt` (the degraded fallback starts at 1).
    pub fn starting_at(self, attempt: u8) -> Self {
        Self { attempt, ..self }
    }

    pub fn attempt(&self) -> u8 {
        self.attempt
    }

    pub fn max_attempts(&self) -> u8 {
        self.max_attempts
    }

    pub fn last_fix(&self) -> Option<LocationFix> {
        self.last_fix
    }

    /// Options for the current attempt.
    pub fn options(&self) -> WatchOptions {
        WatchOptions::for_attempt(self.attempt)
    }

    /// A fix arrived: the retry depth no longer matters.
    pub fn on_fix(self, fix: LocationFix) -> Self {
        Self {
            attempt: 0,
            last_fix: Some(fix),
            ..self
        }
    }

    /// An error arrived on the subscription.
    pub fn on_error(self, error: &SensorError) -> (Self, RetryDecision) {
        if !error.is_retryable() {
            return (self, RetryDecision::GiveUp);
        }

        let attempt = self.attempt.saturating_add(1);
        let next = Self { attempt, ..self };
        if attempt <= self.max_attempts {
            let delay = backoff_delay(attempt);
            (next, RetryDecision::Retry { attempt, delay })
        } else {
            (next, RetryDecision::Exhausted)
        }
    }

    /// Forget the counter and the last fix.
    pub fn reset(self) -> Self {
        Self::new(self.max_attempts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_budget() {
        let state = RetryState::default();
        assert_eq!(state.attempt(), 0);
        assert_eq!(state.max_attempts(), 3);
        assert!(state.last_fix().is_none());
    }

    #[test]
    fn test_timeouts_back_off_then_exhaust() {
        let mut state = RetryState::default();
        let mut decisions = Vec::new();
        for _ in 0..4 {
            let (next, decision) = state.on_error(&SensorError::Timeout);
            state = next;
            decisions.push(decision);
        }

        assert_eq!(
            decisions,
            vec![
                RetryDecision::Retry {
                    attempt: 1,
                    delay: Duration::from_secs(1)
                },
                RetryDecision::Retry {
                    attempt: 2,
                    delay: Duration::from_secs(2)
                },
                RetryDecision::Retry {
                    attempt: 3,
                    delay: Duration::from_secs(4)
                },
                RetryDecision::Exhausted,
            ]
        );
        assert_eq!(state.attempt(), 4);
    }

    #[test]
    fn test_fix_resets_attempt_at_any_depth() {
        let mut state = RetryState::default();
        for _ in 0..3 {
            state = state.on_error(&SensorError::Timeout).0;
        }
        assert_eq!(state.attempt(), 3);

        let fix = LocationFix::new(51.5, -0.12);
        let state = state.on_fix(fix);
        assert_eq!(state.attempt(), 0);
        assert_eq!(state.last_fix(), Some(fix));
        assert!(state.options().high_accuracy);
    }

    #[test]
    fn test_non_timeout_errors_give_up_without_counting() {
        for error in [
            SensorError::PermissionDenied,
            SensorError::PositionUnavailable,
            SensorError::Other("driver".into()),
        ] {
            let (state, decision) = RetryState::default().on_error(&error);
            assert_eq!(decision, RetryDecision::GiveUp);
            assert_eq!(state.attempt(), 0);
        }
    }

    #[test]
    fn test_fallback_start_spends_one_retry() {
        let state = RetryState::default().starting_at(1);
        assert_eq!(state.options(), WatchOptions::for_attempt(1));

        let (state, decision) = state.on_error(&SensorError::Timeout);
        assert_eq!(
            decision,
            RetryDecision::Retry {
                attempt: 2,
                delay: Duration::from_secs(2)
            }
        );
        let (state, _) = state.on_error(&SensorError::Timeout);
        let (_, decision) = state.on_error(&SensorError::Timeout);
        assert_eq!(decision, RetryDecision::Exhausted);
    }

    #[test]
    fn test_reset_keeps_budget() {
        let state = RetryState::new(5)
            .on_fix(LocationFix::new(1.0, 1.0))
            .on_error(&SensorError::Timeout)
            .0
            .reset();
        assert_eq!(state, RetryState::new(5));
    }
}
