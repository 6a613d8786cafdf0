#![doc = include_str!("../README.md")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![cfg_attr(not(test), warn(unused_crate_dependencies))]

mod config;
pub use config::{ErrorMode, ErrorSourceBuilder, InvalidConfiguration};

mod keyed;
pub use keyed::{KeyedErrorHealthCheckSource, KeyedErrorSubmitter};

mod source;
pub use source::{ErrorHealthCheckSource, ErrorSubmitter};

mod state;

mod time;
pub use time::{OffsetTimeProvider, SystemTimeProvider, TimeProvider};
