//! Per-stream observation state and the classification that turns it into a
//! health outcome.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use serde_json::Value;
use vigil_status::{HealthError, HealthState};

use crate::config::{ErrorMode, ErrorSourceConfig};

/// Owned snapshot of a submitted error. Captured at submit time so the
/// caller's error value is never retained.
#[derive(Debug, Clone)]
pub(crate) struct SubmittedError {
    pub(crate) message: String,
    pub(crate) safe_params: BTreeMap<String, Value>,
}

impl SubmittedError {
    pub(crate) fn capture(error: &dyn HealthError) -> Self {
        Self { message: error.message(), safe_params: error.safe_params() }
    }
}

/// Minimal per-stream state: only the most recent error and the most recent
/// observation instants are retained.
#[derive(Debug, Default)]
pub(crate) struct ErrorState {
    last_error: Option<SubmittedError>,
    last_error_time: Option<Instant>,
    last_success_time: Option<Instant>,
}

impl ErrorState {
    /// Records a submission. A missing error is a success.
    pub(crate) fn record(&mut self, now: Instant, error: Option<&dyn HealthError>) {
        match error {
            Some(error) => {
                self.last_error = Some(SubmittedError::capture(error));
                self.last_error_time = Some(self.last_error_time.map_or(now, |t| t.max(now)));
            }
            None => {
                self.last_success_time = Some(self.last_success_time.map_or(now, |t| t.max(now)));
            }
        }
    }

    pub(crate) fn has_error_in_window(&self, now: Instant, window: Duration) -> bool {
        self.last_error_time
            .is_some_and(|t| now.saturating_duration_since(t) <= window)
    }

    pub(crate) fn has_success_in_window(&self, now: Instant, window: Duration) -> bool {
        self.last_success_time
            .is_some_and(|t| now.saturating_duration_since(t) <= window)
    }

    pub(crate) fn has_activity_in_window(&self, now: Instant, window: Duration) -> bool {
        self.has_error_in_window(now, window) || self.has_success_in_window(now, window)
    }

    /// Whether the newest observation is a success. Ties go to the error.
    fn success_is_latest(&self) -> bool {
        match (self.last_success_time, self.last_error_time) {
            (Some(success), Some(error)) => success > error,
            (Some(_), None) => true,
            _ => false,
        }
    }

    /// The newest observation instant, if any. Used for garbage collection.
    pub(crate) fn last_observed(&self) -> Option<Instant> {
        match (self.last_error_time, self.last_success_time) {
            (Some(error), Some(success)) => Some(error.max(success)),
            (time, None) | (None, time) => time,
        }
    }
}

/// Outcome of classifying one stream.
#[derive(Debug)]
pub(crate) enum Assessment {
    Healthy,
    Unhealthy {
        state: HealthState,
        error: SubmittedError,
    },
}

/// Rates a stream against the policy at `now`.
///
/// An in-window error dominates unless the mode's healthy condition holds.
/// Dominating errors stamped before the repairing deadline, or older than
/// the maximum error age, rate as `REPAIRING`; anything else rates as the
/// configured error state. Streams that never observed anything are healthy.
pub(crate) fn classify(
    config: &ErrorSourceConfig,
    state: &ErrorState,
    repairing_deadline: Instant,
    now: Instant,
) -> Assessment {
    let error_in_window = state.has_error_in_window(now, config.window_size);
    let healthy = match config.error_mode {
        ErrorMode::UnhealthyIfAtLeastOneError => !error_in_window,
        ErrorMode::HealthyIfNotAllErrors => {
            !error_in_window || state.has_success_in_window(now, config.window_size)
        }
        ErrorMode::HealthyIfNoRecentErrors => !error_in_window || state.success_is_latest(),
    };
    if healthy {
        return Assessment::Healthy;
    }

    // An in-window error implies both fields are set; recorded together.
    let (Some(error), Some(error_time)) = (&state.last_error, state.last_error_time) else {
        return Assessment::Healthy;
    };

    let stale = config
        .maximum_error_age
        .is_some_and(|age| now.saturating_duration_since(error_time) > age);
    let state_value = if error_time < repairing_deadline || stale {
        HealthState::Repairing
    } else {
        config.error_state
    };

    Assessment::Unhealthy { state: state_value, error: error.clone() }
}
