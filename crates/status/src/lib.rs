#![doc = include_str!("../README.md")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![cfg_attr(not(test), warn(unused_crate_dependencies))]

mod error;
pub use error::{CheckError, HealthError};

mod result;
pub use result::{CheckType, HealthCheckResult, HealthStatus};

mod source;
pub use source::HealthCheckSource;

mod state;
pub use state::HealthState;
