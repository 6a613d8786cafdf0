//! Policy configuration for windowed error sources.

use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;
use vigil_status::{CheckType, HealthState};

use crate::keyed::KeyedErrorHealthCheckSource;
use crate::source::ErrorHealthCheckSource;
use crate::time::{SystemTimeProvider, TimeProvider};

/// How a window of observations maps to health.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorMode {
    /// Any in-window error marks the stream unhealthy, regardless of
    /// successes. For singletons where one failure matters.
    UnhealthyIfAtLeastOneError,
    /// Successes dominate; only an all-error window is unhealthy. For
    /// replicated calls where one good replica means the system still serves.
    HealthyIfNotAllErrors,
    /// The latest observation wins: a success strictly after the latest
    /// error restores health. For checks where only freshness matters.
    HealthyIfNoRecentErrors,
}

/// Rejected policy configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum InvalidConfiguration {
    /// The window size was not set or was set to zero.
    #[error("window size must be positive")]
    NonPositiveWindowSize,
    /// The maximum error age was set to zero.
    #[error("maximum error age must be positive")]
    NonPositiveMaximumErrorAge,
}

/// Immutable policy bundle shared by the scalar and keyed sources.
#[derive(Debug, Clone)]
pub(crate) struct ErrorSourceConfig {
    pub(crate) check_type: CheckType,
    pub(crate) error_mode: ErrorMode,
    pub(crate) window_size: Duration,
    pub(crate) repairing_grace_period: Duration,
    pub(crate) require_full_window: bool,
    pub(crate) maximum_error_age: Option<Duration>,
    pub(crate) message: Option<String>,
    pub(crate) error_state: HealthState,
    pub(crate) time_provider: Arc<dyn TimeProvider>,
}

impl ErrorSourceConfig {
    /// The deadline before which in-window errors rate as `REPAIRING`.
    /// Starts at construction time; requiring a full window pushes it one
    /// window out, giving new sources a startup phase.
    pub(crate) fn initial_repairing_deadline(&self) -> Instant {
        let now = self.time_provider.now();
        if self.require_full_window { now + self.window_size } else { now }
    }
}

/// Builds scalar and keyed error sources.
///
/// Each setter overwrites its field, so when the same knob is applied twice
/// the last call wins.
#[derive(Debug)]
pub struct ErrorSourceBuilder {
    check_type: CheckType,
    error_mode: ErrorMode,
    window_size: Duration,
    repairing_grace_period: Duration,
    require_full_window: bool,
    maximum_error_age: Option<Duration>,
    message: Option<String>,
    error_state: HealthState,
    time_provider: Arc<dyn TimeProvider>,
}

impl ErrorSourceBuilder {
    /// Creates a builder for the given check type and error mode. The window
    /// size is required; everything else has a default.
    pub fn new(check_type: impl Into<CheckType>, error_mode: ErrorMode) -> Self {
        Self {
            check_type: check_type.into(),
            error_mode,
            window_size: Duration::ZERO,
            repairing_grace_period: Duration::ZERO,
            require_full_window: false,
            maximum_error_age: None,
            message: None,
            error_state: HealthState::Error,
            time_provider: Arc::new(SystemTimeProvider),
        }
    }

    /// Sets the sliding window size. Must be positive.
    #[must_use]
    pub fn window_size(mut self, window_size: Duration) -> Self {
        self.window_size = window_size;
        self
    }

    /// Sets the grace period granted when submissions resume after a gap of
    /// at least one window: errors submitted within it rate as `REPAIRING`.
    #[must_use]
    pub fn repairing_grace_period(mut self, grace_period: Duration) -> Self {
        self.repairing_grace_period = grace_period;
        self
    }

    /// Rates errors submitted during the source's first full window as
    /// `REPAIRING` instead of the error state.
    #[must_use]
    pub fn require_full_window(mut self) -> Self {
        self.require_full_window = true;
        self
    }

    /// Demotes errors older than `age` to `REPAIRING` even while they remain
    /// inside the window, so a single stale failure cannot keep the check
    /// red indefinitely. Must be positive.
    #[must_use]
    pub fn maximum_error_age(mut self, age: Duration) -> Self {
        self.maximum_error_age = Some(age);
        self
    }

    /// Sets the message displayed on unhealthy results.
    #[must_use]
    pub fn check_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Overrides the state reported for authoritative errors (default
    /// [`HealthState::Error`]). `REPAIRING` outcomes are never overridden.
    #[must_use]
    pub fn error_state(mut self, state: HealthState) -> Self {
        self.error_state = state;
        self
    }

    /// Injects a clock. Defaults to the system clock.
    #[must_use]
    pub fn time_provider(mut self, time_provider: Arc<dyn TimeProvider>) -> Self {
        self.time_provider = time_provider;
        self
    }

    /// Builds a scalar source tracking a single error stream.
    pub fn build(self) -> Result<ErrorHealthCheckSource, InvalidConfiguration> {
        Ok(ErrorHealthCheckSource::new(self.into_config()?))
    }

    /// Builds a keyed source tracking many independent streams under one
    /// check.
    pub fn build_keyed(self) -> Result<KeyedErrorHealthCheckSource, InvalidConfiguration> {
        Ok(KeyedErrorHealthCheckSource::new(self.into_config()?))
    }

    fn into_config(self) -> Result<ErrorSourceConfig, InvalidConfiguration> {
        if self.window_size == Duration::ZERO {
            return Err(InvalidConfiguration::NonPositiveWindowSize);
        }
        if self.maximum_error_age == Some(Duration::ZERO) {
            return Err(InvalidConfiguration::NonPositiveMaximumErrorAge);
        }

        Ok(ErrorSourceConfig {
            check_type: self.check_type,
            error_mode: self.error_mode,
            window_size: self.window_size,
            repairing_grace_period: self.repairing_grace_period,
            require_full_window: self.require_full_window,
            maximum_error_age: self.maximum_error_age,
            message: self.message,
            error_state: self.error_state,
            time_provider: self.time_provider,
        })
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[test]
    fn missing_window_size_is_rejected() {
        let result = ErrorSourceBuilder::new("TEST_CHECK", ErrorMode::HealthyIfNotAllErrors).build();
        assert_eq!(result.unwrap_err(), InvalidConfiguration::NonPositiveWindowSize);
    }

    #[rstest]
    #[case::scalar(false)]
    #[case::keyed(true)]
    fn zero_window_size_is_rejected(#[case] keyed: bool) {
        let builder = ErrorSourceBuilder::new("TEST_CHECK", ErrorMode::UnhealthyIfAtLeastOneError)
            .window_size(Duration::ZERO);
        let err = if keyed {
            builder.build_keyed().map(drop).unwrap_err()
        } else {
            builder.build().map(drop).unwrap_err()
        };
        assert_eq!(err, InvalidConfiguration::NonPositiveWindowSize);
    }

    #[test]
    fn zero_maximum_error_age_is_rejected() {
        let result = ErrorSourceBuilder::new("TEST_CHECK", ErrorMode::HealthyIfNotAllErrors)
            .window_size(Duration::from_secs(60))
            .maximum_error_age(Duration::ZERO)
            .build();
        assert_eq!(result.unwrap_err(), InvalidConfiguration::NonPositiveMaximumErrorAge);
    }

    #[test]
    fn later_options_win() {
        // A zero window set first is overwritten by the later positive one.
        let result = ErrorSourceBuilder::new("TEST_CHECK", ErrorMode::HealthyIfNotAllErrors)
            .window_size(Duration::ZERO)
            .window_size(Duration::from_secs(60))
            .build();
        assert!(result.is_ok());

        let result = ErrorSourceBuilder::new("TEST_CHECK", ErrorMode::HealthyIfNotAllErrors)
            .window_size(Duration::from_secs(60))
            .window_size(Duration::ZERO)
            .build();
        assert_eq!(result.unwrap_err(), InvalidConfiguration::NonPositiveWindowSize);
    }
}
