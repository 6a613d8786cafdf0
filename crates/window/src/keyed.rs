//! Keyed windowed error source: many independent streams under one check.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::RwLock;
use serde_json::Value;
use tracing::debug;
use vigil_status::{HealthCheckResult, HealthCheckSource, HealthError, HealthState, HealthStatus};

use crate::config::ErrorSourceConfig;
use crate::state::{classify, Assessment, ErrorState};

/// Records keyed success/failure observations and manages key lifecycle.
/// Handed to components whose job is only to report.
pub trait KeyedErrorSubmitter: Send + Sync {
    /// Records a submission for `key`; a missing error counts as a success.
    /// The key's stream is created on first submission. Never fails.
    fn submit(&self, key: &str, error: Option<&dyn HealthError>);

    /// Records a success for `key`.
    fn submit_ok(&self, key: &str) {
        self.submit(key, None);
    }

    /// Records a failure for `key`.
    fn submit_error(&self, key: &str, error: &dyn HealthError) {
        self.submit(key, Some(error));
    }

    /// Drops every stream whose key is not in `keys`. Used to evict keys
    /// that no longer exist in the caller's domain.
    fn preserve_keys(&self, keys: &[&str]);
}

/// A health check source rating many keyed error streams and reporting the
/// worst of them under a single check.
///
/// Each key is classified independently under the shared policy; the result
/// state is the maximum severity over all keys, and the parameters name
/// every unhealthy key. The repairing deadline is source-wide: a gap means
/// no key saw activity for a full window, so one noisy new key cannot
/// silence errors from long-quiet keys.
///
/// The key map grows without bound unless the caller evicts via
/// [`preserve_keys`](KeyedErrorSubmitter::preserve_keys) or [`gc`](Self::gc);
/// there is no automatic TTL.
#[derive(Debug, Clone)]
pub struct KeyedErrorHealthCheckSource {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    config: ErrorSourceConfig,
    state: RwLock<KeyedState>,
}

#[derive(Debug)]
struct KeyedState {
    streams: BTreeMap<String, ErrorState>,
    repairing_deadline: Instant,
    last_activity: Option<Instant>,
}

impl KeyedErrorHealthCheckSource {
    pub(crate) fn new(config: ErrorSourceConfig) -> Self {
        let repairing_deadline = config.initial_repairing_deadline();
        Self {
            inner: Arc::new(Inner {
                config,
                state: RwLock::new(KeyedState {
                    streams: BTreeMap::new(),
                    repairing_deadline,
                    last_activity: None,
                }),
            }),
        }
    }

    /// Drops every stream whose newest observation predates `before`.
    /// Complements [`preserve_keys`](KeyedErrorSubmitter::preserve_keys)
    /// when the live key set is not known but stale keys should not linger.
    pub fn gc(&self, before: Instant) {
        let mut guard = self.inner.state.write();
        let kept = |stream: &ErrorState| stream.last_observed().is_some_and(|t| t >= before);
        let total = guard.streams.len();
        guard.streams.retain(|_, stream| kept(stream));
        let dropped = total - guard.streams.len();
        if dropped > 0 {
            debug!(
                check_type = %self.inner.config.check_type,
                dropped,
                "collected stale keyed streams"
            );
        }
    }
}

impl KeyedErrorSubmitter for KeyedErrorHealthCheckSource {
    fn submit(&self, key: &str, error: Option<&dyn HealthError>) {
        let config = &self.inner.config;
        let mut guard = self.inner.state.write();
        let now = config.time_provider.now();

        // A gap is source-wide: no key saw activity for a full window.
        let gap = guard
            .last_activity
            .is_none_or(|t| now.saturating_duration_since(t) > config.window_size);
        if gap {
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
        guard.last_activity = Some(now);

        guard.streams.entry(key.to_string()).or_default().record(now, error);
    }

    fn preserve_keys(&self, keys: &[&str]) {
        let mut guard = self.inner.state.write();
        let total = guard.streams.len();
        guard.streams.retain(|key, _| keys.contains(&key.as_str()));
        let dropped = total - guard.streams.len();
        if dropped > 0 {
            debug!(
                check_type = %self.inner.config.check_type,
                dropped,
                "dropped unpreserved keyed streams"
            );
        }
    }
}

impl HealthCheckSource for KeyedErrorHealthCheckSource {
    fn health_status(&self) -> HealthStatus {
        let config = &self.inner.config;
        let guard = self.inner.state.read();
        let now = config.time_provider.now();

        let mut worst = HealthState::Healthy;
        let mut any_unhealthy = false;
        let mut params = BTreeMap::new();
        for (key, stream) in &guard.streams {
            match classify(config, stream, guard.repairing_deadline, now) {
                Assessment::Healthy => {}
                Assessment::Unhealthy { state, error } => {
                    any_unhealthy = true;
                    worst = worst.max(state);
                    params.insert(key.clone(), Value::String(error.message));
                    for (param_key, param_value) in error.safe_params {
                        params.insert(format!("{key}-{param_key}"), param_value);
                    }
                }
            }
        }

        let result = if any_unhealthy {
            HealthCheckResult::with_state(
                config.check_type.clone(),
                worst,
                config.message.clone(),
                params,
            )
        } else {
            HealthCheckResult::healthy(config.check_type.clone())
        };
        HealthStatus::single(result)
    }
}
