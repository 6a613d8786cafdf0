//! Check results and the aggregate status returned by sources.

use std::borrow::Borrow;
use std::collections::BTreeMap;

use derive_more::Display;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::HealthState;

/// Identifier distinguishing one health check from another within a process.
#[derive(Debug, Display, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CheckType(String);

impl CheckType {
    /// Creates a check type from any string-like identifier.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for CheckType {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

impl From<String> for CheckType {
    fn from(name: String) -> Self {
        Self(name)
    }
}

impl Borrow<str> for CheckType {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Outcome of evaluating a single health check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthCheckResult {
    /// The check this result belongs to.
    #[serde(rename = "type")]
    pub check_type: CheckType,
    /// Reported severity.
    pub state: HealthState,
    /// Operator-facing message, present on unhealthy outcomes.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub message: Option<String>,
    /// Safe parameters describing the outcome.
    #[serde(skip_serializing_if = "BTreeMap::is_empty", default)]
    pub params: BTreeMap<String, Value>,
}

impl HealthCheckResult {
    /// A healthy result carrying no message or parameters.
    pub fn healthy(check_type: impl Into<CheckType>) -> Self {
        Self::with_state(check_type, HealthState::Healthy, None, BTreeMap::new())
    }

    /// An unhealthy ([`HealthState::Error`]) result.
    pub fn unhealthy(
        check_type: impl Into<CheckType>,
        message: impl Into<String>,
        params: BTreeMap<String, Value>,
    ) -> Self {
        Self::with_state(check_type, HealthState::Error, Some(message.into()), params)
    }

    /// A [`HealthState::Repairing`] result.
    pub fn repairing(
        check_type: impl Into<CheckType>,
        message: impl Into<String>,
        params: BTreeMap<String, Value>,
    ) -> Self {
        Self::with_state(check_type, HealthState::Repairing, Some(message.into()), params)
    }

    /// A result with an explicit state.
    pub fn with_state(
        check_type: impl Into<CheckType>,
        state: HealthState,
        message: Option<String>,
        params: BTreeMap<String, Value>,
    ) -> Self {
        Self { check_type: check_type.into(), state, message, params }
    }
}

/// Health of every check a source reports, keyed by check type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HealthStatus {
    /// Individual check results.
    pub checks: BTreeMap<CheckType, HealthCheckResult>,
}

impl HealthStatus {
    /// A status containing a single check result.
    pub fn single(result: HealthCheckResult) -> Self {
        let mut checks = BTreeMap::new();
        checks.insert(result.check_type.clone(), result);
        Self { checks }
    }
}
