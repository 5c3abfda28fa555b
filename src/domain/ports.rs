use crate::domain::model::Feature;
use crate::utils::error::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// Remote store holding the router's port forwarding feature.
///
/// Implementations report transient failures as retryable errors
/// (see [`crate::SyncError::is_retryable`]) and malformed payloads as
/// `MalformedResponseError`. No concurrency token is exchanged, so callers
/// must not run two reconciliations against the same router at once.
#[async_trait]
pub trait RouterFeatureStore: Send + Sync {
    async fn fetch_rule_feature(&self) -> Result<Feature>;
    async fn commit_rule_feature(&self, feature: &Feature) -> Result<()>;
}

#[async_trait]
impl<T: RouterFeatureStore + ?Sized> RouterFeatureStore for Arc<T> {
    async fn fetch_rule_feature(&self) -> Result<Feature> {
        (**self).fetch_rule_feature().await
    }

    async fn commit_rule_feature(&self, feature: &Feature) -> Result<()> {
        (**self).commit_rule_feature(feature).await
    }
}
