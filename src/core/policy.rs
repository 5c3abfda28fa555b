use crate::utils::error::{Result, SyncError};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub const DEFAULT_READINESS_INTERVAL: Duration = Duration::from_secs(2);
pub const DEFAULT_READINESS_ATTEMPTS: u32 = 30;

/// Bound on how long to wait for the router to publish its rule collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadinessPolicy {
    pub interval: Duration,
    /// Total fetches allowed, including the first one.
    pub max_attempts: u32,
    pub deadline: Option<Duration>,
}

impl Default for ReadinessPolicy {
    fn default() -> Self {
        Self {
            interval: DEFAULT_READINESS_INTERVAL,
            max_attempts: DEFAULT_READINESS_ATTEMPTS,
            deadline: None,
        }
    }
}

impl ReadinessPolicy {
    /// Whether another poll is allowed after `attempts` fetches and `waited` time.
    pub fn allows_another_poll(&self, attempts: u32, waited: Duration) -> bool {
        if attempts >= self.max_attempts.max(1) {
            return false;
        }
        match self.deadline {
            Some(deadline) => waited + self.interval <= deadline,
            None => true,
        }
    }
}

/// Exponential backoff for transient fetch failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Delay before retry number `attempt` (0-based): `initial * 2^attempt`, capped.
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }
}

/// Sleep for `duration` unless `token` fires first.
pub async fn sleep_or_cancel(duration: Duration, token: &CancellationToken) -> Result<()> {
    tokio::select! {
        biased;
        _ = token.cancelled() => Err(SyncError::CancelledError),
        _ = tokio::time::sleep(duration) => Ok(()),
    }
}
