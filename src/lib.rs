pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use crate::config::{CliConfig, Command, RunSettings};

pub use crate::adapters::edgeos::{ClientOptions, EdgeOsClient};
pub use crate::config::{Credentials, TomlConfig};
pub use crate::core::parser::KeyValueParser;
pub use crate::core::policy::{ReadinessPolicy, RetryPolicy};
pub use crate::core::reconciler::{CommitMode, PortForwarder, SyncSummary};
pub use crate::domain::model::{Feature, Record, RuleEntry, RulesConfig};
pub use crate::domain::port::{load_port_records, PortBatch, PortRecord};
pub use crate::domain::ports::RouterFeatureStore;
pub use crate::utils::error::{Result, SyncError};
