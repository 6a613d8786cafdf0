//! Scalar windowed error source: one stream of submissions, one check.

use std::sync::Arc;
use std::time::Instant;

use parking_lot::RwLock;
use serde_json::Value;
use tracing::debug;
use vigil_status::{HealthCheckResult, HealthCheckSource, HealthError, HealthStatus};

use crate::config::ErrorSourceConfig;
use crate::state::{classify, Assessment, ErrorState};

/// Records success/failure observations. Handed to components whose job is
/// only to report, keeping the status-reading capability separate.
pub trait ErrorSubmitter: Send + Sync {
    /// Records a submission; a missing error counts as a success. Never
    /// fails.
    fn submit(&self, error: Option<&dyn HealthError>);

    /// Records a success.
    fn submit_ok(&self) {
        self.submit(None);
    }

    /// Records a failure.
    fn submit_error(&self, error: &dyn HealthError) {
        self.submit(Some(error));
    }
}

/// A health check source rated from a single stream of submitted errors.
///
/// Cloning is cheap and clones share state, so producers and readers can
/// each hold a handle. Submissions and status reads are thread-safe.
#[derive(Debug, Clone)]
pub struct ErrorHealthCheckSource {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    config: ErrorSourceConfig,
    state: RwLock<ScalarState>,
}

#[derive(Debug)]
struct ScalarState {
    stream: ErrorState,
    repairing_deadline: Instant,
}

impl ErrorHealthCheckSource {
    pub(crate) fn new(config: ErrorSourceConfig) -> Self {
        let repairing_deadline = config.initial_repairing_deadline();
        Self {
            inner: Arc::new(Inner {
                config,
                state: RwLock::new(ScalarState {
                    stream: ErrorState::default(),
                    repairing_deadline,
                }),
            }),
        }
    }
}

impl ErrorSubmitter for ErrorHealthCheckSource {
    fn submit(&self, error: Option<&dyn HealthError>) {
        let config = &self.inner.config;
        let mut guard = self.inner.state.write();
        let now = config.time_provider.now();

        // First submission after a gap of at least one window re-anchors the
        // repairing deadline, granting the fresh burst a grace period.
        if !guard.stream.has_activity_in_window(now, config.window_size) {
            let candidate = now + config.repairing_grace_period;
            if candidate > guard.repairing_deadline {
                guard.repairing_deadline = candidate;
                debug!(
                    check_type = %config.check_type,
                    grace_period = ?config.repairing_grace_period,
                    "re-anchored repairing deadline after submission gap"
                );
            }
        }

        guard.stream.record(now, error);
    }
}

impl HealthCheckSource for ErrorHealthCheckSource {
    fn health_status(&self) -> HealthStatus {
        let config = &self.inner.config;
        let guard = self.inner.state.read();
        let now = config.time_provider.now();

        let result = match classify(config, &guard.stream, guard.repairing_deadline, now) {
            Assessment::Healthy => HealthCheckResult::healthy(config.check_type.clone()),
            Assessment::Unhealthy { state, error } => {
                let mut params = error.safe_params;
                params.insert("error".to_string(), Value::String(error.message));
                HealthCheckResult::with_state(
                    config.check_type.clone(),
                    state,
                    config.message.clone(),
                    params,
                )
            }
        };
        HealthStatus::single(result)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::time::Duration;

    use rstest::rstest;
    use serde_json::json;
    use vigil_status::{CheckError, HealthState};

    use super::*;
    use crate::config::{ErrorMode, ErrorSourceBuilder};
    use crate::time::OffsetTimeProvider;

    const TEST_CHECK: &str = "TEST_CHECK";
    const CHECK_MESSAGE: &str = "found an error";
    const WINDOW: Duration = Duration::from_millis(100);

    fn source_with(
        mode: ErrorMode,
        provider: &Arc<OffsetTimeProvider>,
        configure: impl FnOnce(ErrorSourceBuilder) -> ErrorSourceBuilder,
    ) -> ErrorHealthCheckSource {
        configure(
            ErrorSourceBuilder::new(TEST_CHECK, mode)
                .check_message(CHECK_MESSAGE)
                .time_provider(provider.clone()),
        )
        .build()
        .expect("valid configuration")
    }

    fn submit_all(
        source: &ErrorHealthCheckSource,
        provider: &OffsetTimeProvider,
        submissions: &[Option<CheckError>],
    ) {
        for submission in submissions {
            source.submit(submission.as_ref().map(|e| e as &dyn HealthError));
            // Keep submissions strictly ordered in virtual time.
            provider.restless_sleep(Duration::from_millis(1));
        }
    }

    fn check_state(source: &ErrorHealthCheckSource) -> HealthState {
        source.health_status().checks.get(TEST_CHECK).expect("check present").state
    }

    fn unhealthy_result(state: HealthState, params: BTreeMap<String, Value>) -> HealthStatus {
        HealthStatus::single(HealthCheckResult::with_state(
            TEST_CHECK,
            state,
            Some(CHECK_MESSAGE.to_string()),
            params,
        ))
    }

    #[rstest]
    #[case::healthy_when_no_submissions(vec![], None)]
    #[case::healthy_when_only_successes(vec![None, None, None], None)]
    #[case::unhealthy_when_at_least_one_error(
        vec![
            None,
            Some(CheckError::new("Error #1")),
            None,
            Some(CheckError::new("Error #2").with_safe_param("foo", "bar")),
            None,
        ],
        Some(BTreeMap::from([
            ("error".to_string(), json!("Error #2")),
            ("foo".to_string(), json!("bar")),
        ])),
    )]
    fn unhealthy_if_at_least_one_error(
        #[case] submissions: Vec<Option<CheckError>>,
        #[case] expected_params: Option<BTreeMap<String, Value>>,
    ) {
        let provider = Arc::new(OffsetTimeProvider::new());
        let source = source_with(ErrorMode::UnhealthyIfAtLeastOneError, &provider, |b| {
            b.window_size(Duration::from_secs(3600))
        });
        submit_all(&source, &provider, &submissions);

        let expected = match expected_params {
            None => HealthStatus::single(HealthCheckResult::healthy(TEST_CHECK)),
            Some(params) => unhealthy_result(HealthState::Error, params),
        };
        assert_eq!(source.health_status(), expected);
    }

    #[rstest]
    #[case::healthy_when_no_submissions(vec![], None)]
    #[case::healthy_when_only_successes(vec![None, None, None], None)]
    #[case::healthy_when_at_least_one_success(
        vec![
            None,
            Some(CheckError::new("Error #1")),
            None,
            Some(CheckError::new("Error #2")),
            None,
        ],
        None,
    )]
    #[case::unhealthy_when_only_errors(
        vec![
            Some(CheckError::new("Error #1")),
            Some(CheckError::new("Error #2").with_safe_param("foo", "bar")),
        ],
        Some(BTreeMap::from([
            ("error".to_string(), json!("Error #2")),
            ("foo".to_string(), json!("bar")),
        ])),
    )]
    fn healthy_if_not_all_errors(
        #[case] submissions: Vec<Option<CheckError>>,
        #[case] expected_params: Option<BTreeMap<String, Value>>,
    ) {
        let provider = Arc::new(OffsetTimeProvider::new());
        let source = source_with(ErrorMode::HealthyIfNotAllErrors, &provider, |b| {
            b.window_size(Duration::from_secs(3600))
        });
        submit_all(&source, &provider, &submissions);

        let expected = match expected_params {
            None => HealthStatus::single(HealthCheckResult::healthy(TEST_CHECK)),
            Some(params) => unhealthy_result(HealthState::Error, params),
        };
        assert_eq!(source.health_status(), expected);
    }

    #[rstest]
    #[case::healthy_when_no_submissions(vec![], None)]
    #[case::healthy_when_only_successes(vec![None, None, None], None)]
    #[case::healthy_when_latest_is_a_success(
        vec![
            None,
            Some(CheckError::new("Error #1")),
            None,
            Some(CheckError::new("Error #2")),
            None,
        ],
        None,
    )]
    #[case::unhealthy_when_latest_is_an_error(
        vec![
            Some(CheckError::new("Error #1")),
            None,
            Some(CheckError::new("Error #2").with_safe_param("foo", "bar")),
        ],
        Some(BTreeMap::from([
            ("error".to_string(), json!("Error #2")),
            ("foo".to_string(), json!("bar")),
        ])),
    )]
    fn healthy_if_no_recent_errors(
        #[case] submissions: Vec<Option<CheckError>>,
        #[case] expected_params: Option<BTreeMap<String, Value>>,
    ) {
        let provider = Arc::new(OffsetTimeProvider::new());
        let source = source_with(ErrorMode::HealthyIfNoRecentErrors, &provider, |b| {
            b.window_size(Duration::from_secs(3600))
        });
        submit_all(&source, &provider, &submissions);

        let expected = match expected_params {
            None => HealthStatus::single(HealthCheckResult::healthy(TEST_CHECK)),
            Some(params) => unhealthy_result(HealthState::Error, params),
        };
        assert_eq!(source.health_status(), expected);
    }

    #[test]
    fn error_in_first_window_rates_repairing_when_full_window_required() {
        let provider = Arc::new(OffsetTimeProvider::new());
        let source = source_with(ErrorMode::HealthyIfNotAllErrors, &provider, |b| {
            b.window_size(WINDOW).require_full_window()
        });

        source.submit_error(&CheckError::new("an error"));
        assert_eq!(check_state(&source), HealthState::Repairing);
    }

    #[test]
    fn error_in_initial_anchored_window_rates_repairing() {
        let provider = Arc::new(OffsetTimeProvider::new());
        let source = source_with(ErrorMode::HealthyIfNotAllErrors, &provider, |b| {
            b.window_size(WINDOW).repairing_grace_period(WINDOW)
        });

        source.submit_error(&CheckError::new("an error"));
        assert_eq!(check_state(&source), HealthState::Repairing);
    }

    #[test]
    fn gap_then_repairing() {
        let provider = Arc::new(OffsetTimeProvider::new());
        let source = source_with(ErrorMode::HealthyIfNotAllErrors, &provider, |b| {
            b.window_size(WINDOW).repairing_grace_period(WINDOW).require_full_window()
        });

        provider.restless_sleep(2 * WINDOW);
        source.submit_error(&CheckError::new("an error"));
        provider.restless_sleep(WINDOW / 2);

        assert_eq!(check_state(&source), HealthState::Repairing);
    }

    #[test]
    fn gap_then_repairing_then_error() {
        let provider = Arc::new(OffsetTimeProvider::new());
        let source = source_with(ErrorMode::HealthyIfNotAllErrors, &provider, |b| {
            b.window_size(WINDOW).repairing_grace_period(WINDOW).require_full_window()
        });

        provider.restless_sleep(2 * WINDOW);
        source.submit_error(&CheckError::new("an error"));
        provider.restless_sleep(WINDOW / 2);
        source.submit_error(&CheckError::new("an error"));
        assert_eq!(check_state(&source), HealthState::Repairing);

        provider.restless_sleep(WINDOW / 2);
        source.submit_error(&CheckError::new("an error"));
        assert_eq!(check_state(&source), HealthState::Error);
    }

    #[test]
    fn gap_then_repairing_then_healthy() {
        let provider = Arc::new(OffsetTimeProvider::new());
        let source = source_with(ErrorMode::HealthyIfNotAllErrors, &provider, |b| {
            b.window_size(WINDOW).repairing_grace_period(WINDOW).require_full_window()
        });

        provider.restless_sleep(2 * WINDOW);
        source.submit_error(&CheckError::new("an error"));
        provider.restless_sleep(WINDOW / 2);
        source.submit_error(&CheckError::new("an error"));
        assert_eq!(check_state(&source), HealthState::Repairing);

        provider.restless_sleep(WINDOW / 2);
        source.submit_ok();
        assert_eq!(check_state(&source), HealthState::Healthy);
    }

    #[test]
    fn repairing_then_gap_recovers() {
        let provider = Arc::new(OffsetTimeProvider::new());
        let source = source_with(ErrorMode::HealthyIfNotAllErrors, &provider, |b| {
            b.window_size(WINDOW).repairing_grace_period(WINDOW).require_full_window()
        });

        provider.restless_sleep(2 * WINDOW);
        source.submit_error(&CheckError::new("an error"));
        provider.restless_sleep(WINDOW / 2);
        source.submit_error(&CheckError::new("an error"));
        assert_eq!(check_state(&source), HealthState::Repairing);

        provider.restless_sleep(3 * WINDOW / 2);
        assert_eq!(check_state(&source), HealthState::Healthy);
    }

    #[test]
    fn maximum_error_age_demotes_stale_errors() {
        let provider = Arc::new(OffsetTimeProvider::new());
        let source = source_with(ErrorMode::HealthyIfNotAllErrors, &provider, |b| {
            b.window_size(WINDOW).maximum_error_age(WINDOW / 2)
        });

        source.submit_error(&CheckError::new("an error"));
        provider.restless_sleep(WINDOW / 4);
        assert_eq!(check_state(&source), HealthState::Error);

        provider.restless_sleep(WINDOW / 2);
        assert_eq!(check_state(&source), HealthState::Repairing);

        source.submit_error(&CheckError::new("an error"));
        assert_eq!(check_state(&source), HealthState::Error);
    }

    #[rstest]
    #[case::healthy(HealthState::Healthy)]
    #[case::deferring(HealthState::Deferring)]
    #[case::suspended(HealthState::Suspended)]
    #[case::repairing(HealthState::Repairing)]
    #[case::warning(HealthState::Warning)]
    #[case::error(HealthState::Error)]
    #[case::terminal(HealthState::Terminal)]
    fn error_state_override_is_reported(#[case] state: HealthState) {
        let provider = Arc::new(OffsetTimeProvider::new());
        let source = source_with(ErrorMode::HealthyIfNoRecentErrors, &provider, |b| {
            b.window_size(Duration::from_secs(3600)).error_state(state)
        });

        source.submit_error(&CheckError::new("an error"));
        assert_eq!(check_state(&source), state);
    }

    #[test]
    fn override_never_applies_to_repairing() {
        let provider = Arc::new(OffsetTimeProvider::new());
        let source = source_with(ErrorMode::HealthyIfNotAllErrors, &provider, |b| {
            b.window_size(WINDOW)
                .maximum_error_age(WINDOW / 2)
                .error_state(HealthState::Warning)
        });

        source.submit_error(&CheckError::new("an error"));
        provider.restless_sleep(WINDOW / 4);
        assert_eq!(check_state(&source), HealthState::Warning);

        provider.restless_sleep(WINDOW / 2);
        assert_eq!(check_state(&source), HealthState::Repairing);
    }

    #[test]
    fn submitters_can_be_handed_out_as_trait_objects() {
        let provider = Arc::new(OffsetTimeProvider::new());
        let source = source_with(ErrorMode::UnhealthyIfAtLeastOneError, &provider, |b| {
            b.window_size(Duration::from_secs(3600))
        });

        let submitter: Arc<dyn ErrorSubmitter> = Arc::new(source.clone());
        submitter.submit_error(&CheckError::new("boom"));

        assert_eq!(check_state(&source), HealthState::Error);
    }
}
