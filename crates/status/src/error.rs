//! The error value interface consumed by health check sources.

use std::collections::BTreeMap;
use std::error::Error as StdError;
use std::fmt;

use serde_json::Value;

/// An error observation submitted to a health check source.
///
/// Sources read the message and the safe-parameter map and introspect
/// nothing else, so unsafe details never reach a health report.
pub trait HealthError: Send + Sync {
    /// Operator-safe description of the failure.
    fn message(&self) -> String;

    /// Safe parameters attached to the failure.
    fn safe_params(&self) -> BTreeMap<String, Value> {
        BTreeMap::new()
    }
}

/// A plain [`HealthError`] carrying a message and optional safe parameters.
#[derive(Debug, Clone)]
pub struct CheckError {
    message: String,
    safe_params: BTreeMap<String, Value>,
}

impl CheckError {
    /// Creates an error with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into(), safe_params: BTreeMap::new() }
    }

    /// Attaches a safe parameter.
    #[must_use]
    pub fn with_safe_param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.safe_params.insert(key.into(), value.into());
        self
    }
}

impl fmt::Display for CheckError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl StdError for CheckError {}

impl HealthError for CheckError {
    fn message(&self) -> String {
        self.message.clone()
    }

    fn safe_params(&self) -> BTreeMap<String, Value> {
        self.safe_params.clone()
    }
}
