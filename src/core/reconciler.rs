use crate::core::policy::{sleep_or_cancel, ReadinessPolicy, RetryPolicy};
use crate::domain::model::{Feature, RuleEntry, RulesConfig};
use crate::domain::port::PortRecord;
use crate::domain::ports::RouterFeatureStore;
use crate::utils::error::{Result, SyncError};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Index of the first entry in `rules` that structurally equals `target`.
pub fn find_rule(rules: &[RuleEntry], target: &PortRecord) -> Option<usize> {
    rules.iter().position(|entry| target.matches_entry(entry))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CommitMode {
    #[default]
    Apply,
    /// Compute the change set but never write to the router.
    DryRun,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SyncSummary {
    pub added: usize,
    pub removed: usize,
    /// Live entries that could not be normalized and were left as they are.
    pub unmatchable: usize,
}

impl SyncSummary {
    pub fn changes(&self) -> usize {
        self.added + self.removed
    }

    pub fn is_noop(&self) -> bool {
        self.changes() == 0
    }
}

/// Reconciles desired port forwarding rules against a [`RouterFeatureStore`].
///
/// Every operation is one fetch, wait-for-ready, compute, commit unit of work
/// with at most one write. Operations on the same instance run one at a time.
pub struct PortForwarder<S: RouterFeatureStore> {
    store: S,
    readiness: ReadinessPolicy,
    retry: RetryPolicy,
    cancel: CancellationToken,
    mode: CommitMode,
    op_lock: Mutex<()>,
}

impl<S: RouterFeatureStore> PortForwarder<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            readiness: ReadinessPolicy::default(),
            retry: RetryPolicy::default(),
            cancel: CancellationToken::new(),
            mode: CommitMode::Apply,
            op_lock: Mutex::new(()),
        }
    }

    pub fn with_readiness(mut self, readiness: ReadinessPolicy) -> Self {
        self.readiness = readiness;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Use `token` to interrupt in-flight operations.
    ///
    /// Cancellation is sticky: once the token fires, every later call on this
    /// engine returns [`SyncError::CancelledError`] without touching the
    /// router. Build a new engine (or pass a fresh child token) to continue.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn with_mode(mut self, mode: CommitMode) -> Self {
        self.mode = mode;
        self
    }

    /// Handle to the engine's token; see [`PortForwarder::with_cancellation`].
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Append every desired rule that is not already present. Rules appended
    /// earlier in the same call count as present, so repeats are added once.
    pub async fn add_ports(&self, desired: &[PortRecord]) -> Result<usize> {
        let _guard = self.op_lock.lock().await;
        let (mut feature, mut rules) = self.fetch_ready().await?;

        let mut added = 0;
        for port in desired {
            if find_rule(&rules, port).is_none() {
                tracing::debug!("➕ Adding {}", port);
                rules.push(port.to_rule_entry());
                added += 1;
            } else {
                tracing::debug!("Rule already present: {}", port);
            }
        }

        if added > 0 {
            feature.set_rules(rules);
            self.commit("add_ports", &feature, added).await?;
        } else {
            tracing::info!("✅ All {} desired rule(s) already present", desired.len());
        }

        Ok(added)
    }

    /// Remove the first live match of each target. The working copy is
    /// rescanned per target, so a live entry is consumed by one target only.
    pub async fn remove_ports(&self, targets: &[PortRecord]) -> Result<usize> {
        let _guard = self.op_lock.lock().await;
        let (mut feature, mut rules) = self.fetch_ready().await?;

        let mut removed = 0;
        for port in targets {
            if let Some(index) = find_rule(&rules, port) {
                tracing::debug!("➖ Removing {} at index {}", port, index);
                rules.remove(index);
                removed += 1;
            }
        }

        if removed > 0 {
            feature.set_rules(rules);
            self.commit("remove_ports", &feature, removed).await?;
        } else {
            tracing::info!("✅ None of the {} target rule(s) are present", targets.len());
        }

        Ok(removed)
    }

    /// Replace the live collection with an empty one. Always commits.
    pub async fn remove_all_ports(&self) -> Result<usize> {
        let _guard = self.op_lock.lock().await;
        let (mut feature, rules) = self.fetch_ready().await?;

        let removed = rules.len();
        feature.set_rules(Vec::new());
        self.commit("remove_all_ports", &feature, removed).await?;

        Ok(removed)
    }

    /// Converge the live collection onto `desired` with a single commit.
    ///
    /// Keeps the first live match of each desired rule, drops every other
    /// normalizable entry, appends what is missing. Entries that cannot be
    /// normalized are left in place.
    pub async fn sync_ports(&self, desired: &[PortRecord]) -> Result<SyncSummary> {
        let _guard = self.op_lock.lock().await;
        let (mut feature, rules) = self.fetch_ready().await?;

        let mut wanted: Vec<&PortRecord> = Vec::with_capacity(desired.len());
        for port in desired {
            if !wanted.contains(&port) {
                wanted.push(port);
            }
        }

        let mut summary = SyncSummary::default();
        let mut satisfied = vec![false; wanted.len()];
        let mut kept = Vec::with_capacity(rules.len() + wanted.len());

        for entry in rules {
            let Some(fields) = entry.normalize() else {
                summary.unmatchable += 1;
                kept.push(entry);
                continue;
            };

            match wanted.iter().position(|port| port.matches_fields(&fields)) {
                Some(i) if !satisfied[i] => {
                    satisfied[i] = true;
                    kept.push(entry);
                }
                _ => {
                    tracing::debug!("➖ Dropping {}", PortRecord::from_rule_fields(&fields));
                    summary.removed += 1;
                }
            }
        }

        for (port, present) in wanted.iter().zip(&satisfied) {
            if !present {
                tracing::debug!("➕ Adding {}", port);
                kept.push(port.to_rule_entry());
                summary.added += 1;
            }
        }

        if summary.unmatchable > 0 {
            tracing::warn!(
                "⚠️ {} live rule(s) could not be normalized and were left untouched",
                summary.unmatchable
            );
        }

        if summary.is_noop() {
            tracing::info!("✅ Router already matches the {} desired rule(s)", wanted.len());
        } else {
            feature.set_rules(kept);
            self.commit("sync_ports", &feature, summary.changes()).await?;
        }

        Ok(summary)
    }

    /// Live rules that normalize, in router order.
    pub async fn forwarded_ports(&self) -> Result<Vec<PortRecord>> {
        let _guard = self.op_lock.lock().await;
        let (_, rules) = self.fetch_ready().await?;

        let mut ports = Vec::with_capacity(rules.len());
        for (index, entry) in rules.iter().enumerate() {
            match entry.normalize() {
                Some(fields) => ports.push(PortRecord::from_rule_fields(&fields)),
                None => tracing::warn!("⚠️ Skipping unreadable rule at index {}: {:?}", index, entry),
            }
        }

        Ok(ports)
    }

    /// Fetch until the rule collection is populated, within the readiness bound.
    async fn fetch_ready(&self) -> Result<(Feature, Vec<RuleEntry>)> {
        let started = Instant::now();
        let mut attempts = 0u32;

        loop {
            let feature = self.fetch_with_retry().await?;
            attempts += 1;

            match feature.rules_config()? {
                RulesConfig::Ready(rules) => {
                    tracing::debug!(
                        "Rule collection ready after {} fetch(es): {} rule(s)",
                        attempts,
                        rules.len()
                    );
                    return Ok((feature, rules));
                }
                RulesConfig::NotReady => {
                    let waited = started.elapsed();
                    if !self.readiness.allows_another_poll(attempts, waited) {
                        return Err(SyncError::ReadinessTimeoutError { attempts, waited });
                    }
                    tracing::info!(
                        "⏳ Rule collection not ready (attempt {}/{}), retrying in {:?}",
                        attempts,
                        self.readiness.max_attempts,
                        self.readiness.interval
                    );
                    sleep_or_cancel(self.readiness.interval, &self.cancel).await?;
                }
            }
        }
    }

    async fn fetch_with_retry(&self) -> Result<Feature> {
        let max_attempts = self.retry.max_attempts.max(1);

        for attempt in 0..max_attempts {
            if self.cancel.is_cancelled() {
                return Err(SyncError::CancelledError);
            }

            // 讀取中途也可取消；送出後的 commit 則不中斷
            let fetched = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => Err(SyncError::CancelledError),
                result = self.store.fetch_rule_feature() => result,
            };

            match fetched {
                Ok(feature) => return Ok(feature),
                Err(e) if e.is_retryable() && attempt + 1 < max_attempts => {
                    let delay = self.retry.backoff_for(attempt);
                    tracing::warn!(
                        "Fetch failed (attempt {}/{}): {} - retrying in {:?}",
                        attempt + 1,
                        max_attempts,
                        e,
                        delay
                    );
                    sleep_or_cancel(delay, &self.cancel).await?;
                }
                Err(e) => return Err(e),
            }
        }

        // 迴圈最後一次必定回傳
        Err(SyncError::TransportError {
            message: format!("fetch failed after {} attempts", max_attempts),
        })
    }

    async fn commit(&self, operation: &str, feature: &Feature, pending: usize) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(SyncError::CancelledError);
        }

        if self.mode == CommitMode::DryRun {
            tracing::info!("🔍 Dry run: {} would commit {} change(s)", operation, pending);
            return Ok(());
        }

        self.store
            .commit_rule_feature(feature)
            .await
            .map_err(|e| SyncError::CommitFailedError {
                operation: operation.to_string(),
                pending,
                source: Box::new(e),
            })?;

        tracing::info!("💾 {} committed {} change(s)", operation, pending);
        Ok(())
    }
}
