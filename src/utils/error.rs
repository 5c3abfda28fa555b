use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Configuration validation failed for '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration field: {field}")]
    MissingConfigError { field: String },

    #[error("Line {line}: cannot build port record: {reason}")]
    RecordConstructionError { line: usize, reason: String },

    #[error("Router transport error: {message}")]
    TransportError { message: String },

    #[error("Router authentication failed: {message}")]
    AuthenticationError { message: String },

    #[error("Malformed router response: {message}")]
    MalformedResponseError { message: String },

    #[error("Rule collection not ready after {attempts} attempts ({waited:?})")]
    ReadinessTimeoutError { attempts: u32, waited: Duration },

    #[error("Operation cancelled before commit")]
    CancelledError,

    #[error("{operation} commit failed with {pending} rule change(s) unconfirmed: {source}")]
    CommitFailedError {
        operation: String,
        pending: usize,
        #[source]
        source: Box<SyncError>,
    },
}

pub type Result<T> = std::result::Result<T, SyncError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Input,
    Network,
    Router,
    Interrupted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl SyncError {
    /// 只有暫時性的網路錯誤可以退避重試；結構性錯誤立即回報
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::TransportError { .. } => true,
            SyncError::HttpError(e) => {
                e.is_timeout()
                    || e.is_connect()
                    || e.status().map(|s| s.is_server_error()).unwrap_or(false)
            }
            _ => false,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            SyncError::ConfigError { .. }
            | SyncError::ConfigValidationError { .. }
            | SyncError::InvalidConfigValueError { .. }
            | SyncError::MissingConfigError { .. } => ErrorCategory::Configuration,
            SyncError::IoError(_)
            | SyncError::SerializationError(_)
            | SyncError::RecordConstructionError { .. } => ErrorCategory::Input,
            SyncError::HttpError(_)
            | SyncError::TransportError { .. }
            | SyncError::AuthenticationError { .. } => ErrorCategory::Network,
            SyncError::MalformedResponseError { .. }
            | SyncError::ReadinessTimeoutError { .. }
            | SyncError::CommitFailedError { .. } => ErrorCategory::Router,
            SyncError::CancelledError => ErrorCategory::Interrupted,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            SyncError::CancelledError => ErrorSeverity::Low,
            SyncError::TransportError { .. }
            | SyncError::HttpError(_)
            | SyncError::ReadinessTimeoutError { .. } => ErrorSeverity::Medium,
            SyncError::CommitFailedError { .. } | SyncError::MalformedResponseError { .. } => {
                ErrorSeverity::Critical
            }
            _ => ErrorSeverity::High,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            SyncError::ConfigError { .. }
            | SyncError::ConfigValidationError { .. }
            | SyncError::InvalidConfigValueError { .. }
            | SyncError::MissingConfigError { .. } => {
                "Check the credentials file and TOML configuration"
            }
            SyncError::IoError(_) => "Make sure the input files exist and are readable",
            SyncError::RecordConstructionError { .. } => {
                "Fix the reported line in the ports file; the other rules were still processed"
            }
            SyncError::SerializationError(_) | SyncError::MalformedResponseError { .. } => {
                "The router returned an unexpected payload; verify the firmware version"
            }
            SyncError::HttpError(_) | SyncError::TransportError { .. } => {
                "Check that the router is reachable and retry"
            }
            SyncError::AuthenticationError { .. } => "Verify the router username and password",
            SyncError::ReadinessTimeoutError { .. } => {
                "The router never published its port forwarding rules; raise the readiness bound or check the router UI"
            }
            SyncError::CancelledError => "Nothing was committed; rerun when ready",
            SyncError::CommitFailedError { .. } => {
                "Run `list` to inspect the live rules before retrying; the router state may differ from the requested one"
            }
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            SyncError::ReadinessTimeoutError { attempts, .. } => format!(
                "Router did not report its port forwarding rules after {} attempts",
                attempts
            ),
            SyncError::CommitFailedError {
                operation, pending, ..
            } => format!(
                "{} failed while committing: {} change(s) may not have been applied",
                operation, pending
            ),
            SyncError::AuthenticationError { .. } => "Could not log in to the router".to_string(),
            SyncError::CancelledError => "Operation cancelled, no changes committed".to_string(),
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_errors_are_retryable() {
        let transient = SyncError::TransportError {
            message: "connection reset".to_string(),
        };
        let structural = SyncError::MalformedResponseError {
            message: "data is not an object".to_string(),
        };

        assert!(transient.is_retryable());
        assert!(!structural.is_retryable());
        assert!(!SyncError::CancelledError.is_retryable());
    }

    #[test]
    fn test_readiness_timeout_is_distinct_from_transport() {
        let timeout = SyncError::ReadinessTimeoutError {
            attempts: 3,
            waited: Duration::from_secs(6),
        };

        assert_eq!(timeout.category(), ErrorCategory::Router);
        assert!(!timeout.is_retryable());
        assert!(timeout.user_friendly_message().contains("3 attempts"));
    }

    #[test]
    fn test_commit_failure_reports_pending_changes() {
        let err = SyncError::CommitFailedError {
            operation: "add_ports".to_string(),
            pending: 2,
            source: Box::new(SyncError::TransportError {
                message: "timeout".to_string(),
            }),
        };

        assert_eq!(err.severity(), ErrorSeverity::Critical);
        assert!(err.to_string().contains("2 rule change(s) unconfirmed"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
