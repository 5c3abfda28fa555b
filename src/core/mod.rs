pub mod parser;
pub mod policy;
pub mod reconciler;

pub use crate::domain::model::{Feature, Record, RuleEntry, RulesConfig};
pub use crate::domain::port::PortRecord;
pub use crate::domain::ports::RouterFeatureStore;
pub use crate::utils::error::Result;
