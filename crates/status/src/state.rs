//! Contains the [`HealthState`] enum, the severity scale for check results.

use std::fmt;

use serde::de::{Deserializer, Error as _};
use serde::ser::{SerializeStruct, Serializer};
use serde::{Deserialize, Serialize};

/// Severity of a health check outcome.
///
/// Declaration order is the reporting order: aggregating over several
/// streams keeps the maximum value, so `Error` dominates `Warning`, which
/// dominates `Repairing`, and so on down to `Healthy`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum HealthState {
    /// The check is functioning normally.
    Healthy,
    /// The check is lagging behind but otherwise fine.
    Deferring,
    /// The check has been deliberately paused.
    Suspended,
    /// The check is recovering and its errors are not yet authoritative.
    Repairing,
    /// The check observed a problem that does not require paging.
    Warning,
    /// The check observed a problem requiring attention.
    Error,
    /// The check failed in a way that will not resolve without intervention.
    Terminal,
}

impl HealthState {
    /// Wire name of the state.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Healthy => "HEALTHY",
            Self::Deferring => "DEFERRING",
            Self::Suspended => "SUSPENDED",
            Self::Repairing => "REPAIRING",
            Self::Warning => "WARNING",
            Self::Error => "ERROR",
            Self::Terminal => "TERMINAL",
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        match name {
            "HEALTHY" => Some(Self::Healthy),
            "DEFERRING" => Some(Self::Deferring),
            "SUSPENDED" => Some(Self::Suspended),
            "REPAIRING" => Some(Self::Repairing),
            "WARNING" => Some(Self::Warning),
            "ERROR" => Some(Self::Error),
            "TERMINAL" => Some(Self::Terminal),
            _ => None,
        }
    }
}

impl fmt::Display for HealthState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Serializes as the enum-value wrapper consumed by health endpoints:
/// `{"value": "<NAME>"}`.
impl Serialize for HealthState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut wrapper = serializer.serialize_struct("HealthState", 1)?;
        wrapper.serialize_field("value", self.as_str())?;
        wrapper.end()
    }
}

impl<'de> Deserialize<'de> for HealthState {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        struct Wrapper {
            value: String,
        }

        const NAMES: &[&str] = &[
            "HEALTHY",
            "DEFERRING",
            "SUSPENDED",
            "REPAIRING",
            "WARNING",
            "ERROR",
            "TERMINAL",
        ];

        let wrapper = Wrapper::deserialize(deserializer)?;
        Self::from_name(&wrapper.value)
            .ok_or_else(|| D::Error::unknown_variant(&wrapper.value, NAMES))
    }
}
