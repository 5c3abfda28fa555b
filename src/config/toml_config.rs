use crate::adapters::edgeos::ClientOptions;
use crate::config::credentials::Credentials;
use crate::core::policy::{ReadinessPolicy, RetryPolicy};
use crate::utils::error::{Result, SyncError};
use crate::utils::validation::{validate_path, validate_positive_number, Validate};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::LazyLock;
use std::time::Duration;

static ENV_VAR_PATTERN: LazyLock<regex::Regex> =
    LazyLock::new(|| regex::Regex::new(r"\$\{([^}]+)\}").expect("env var pattern is valid"));

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    pub router: Option<RouterConfig>,
    pub files: Option<FilesConfig>,
    pub readiness: Option<ReadinessConfig>,
    pub retry: Option<RetryConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RouterConfig {
    pub address: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub accept_invalid_certs: Option<bool>,
    pub timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilesConfig {
    pub ports: Option<String>,
    pub credentials: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReadinessConfig {
    pub interval_seconds: Option<u64>,
    pub max_attempts: Option<u32>,
    pub deadline_seconds: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RetryConfig {
    pub max_attempts: Option<u32>,
    pub initial_backoff_ms: Option<u64>,
    pub max_backoff_ms: Option<u64>,
}

impl TomlConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(SyncError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content);

        toml::from_str(&processed_content).map_err(|e| SyncError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${ROUTER_PASSWORD})；未設定的保持原樣
    fn substitute_env_vars(content: &str) -> String {
        ENV_VAR_PATTERN
            .replace_all(content, |caps: &regex::Captures| {
                let var_name = &caps[1];
                std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
            })
            .to_string()
    }

    pub fn readiness_policy(&self) -> ReadinessPolicy {
        let defaults = ReadinessPolicy::default();
        match &self.readiness {
            Some(r) => ReadinessPolicy {
                interval: r
                    .interval_seconds
                    .map(Duration::from_secs)
                    .unwrap_or(defaults.interval),
                max_attempts: r.max_attempts.unwrap_or(defaults.max_attempts),
                deadline: r.deadline_seconds.map(Duration::from_secs),
            },
            None => defaults,
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        let defaults = RetryPolicy::default();
        match &self.retry {
            Some(r) => RetryPolicy {
                max_attempts: r.max_attempts.unwrap_or(defaults.max_attempts),
                initial_backoff: r
                    .initial_backoff_ms
                    .map(Duration::from_millis)
                    .unwrap_or(defaults.initial_backoff),
                max_backoff: r
                    .max_backoff_ms
                    .map(Duration::from_millis)
                    .unwrap_or(defaults.max_backoff),
            },
            None => defaults,
        }
    }

    pub fn client_options(&self) -> ClientOptions {
        let defaults = ClientOptions::default();
        match &self.router {
            Some(r) => ClientOptions {
                accept_invalid_certs: r
                    .accept_invalid_certs
                    .unwrap_or(defaults.accept_invalid_certs),
                timeout: r
                    .timeout_seconds
                    .map(Duration::from_secs)
                    .unwrap_or(defaults.timeout),
            },
            None => defaults,
        }
    }

    /// Values set in `[router]` take precedence over the credentials file.
    pub fn apply_credential_overrides(&self, credentials: &mut Credentials) {
        let Some(router) = &self.router else {
            return;
        };
        if let Some(address) = &router.address {
            credentials.router_address = address.clone();
        }
        if let Some(username) = &router.username {
            credentials.username = username.clone();
        }
        if let Some(password) = &router.password {
            credentials.password = password.clone();
        }
    }

    pub fn ports_file(&self) -> Option<&str> {
        self.files.as_ref().and_then(|f| f.ports.as_deref())
    }

    pub fn credentials_file(&self) -> Option<&str> {
        self.files.as_ref().and_then(|f| f.credentials.as_deref())
    }
}

impl Validate for TomlConfig {
    fn validate(&self) -> Result<()> {
        if let Some(readiness) = &self.readiness {
            if let Some(attempts) = readiness.max_attempts {
                validate_positive_number("readiness.max_attempts", attempts.into(), 1)?;
            }
            if let Some(interval) = readiness.interval_seconds {
                validate_positive_number("readiness.interval_seconds", interval, 1)?;
            }
        }

        if let Some(retry) = &self.retry {
            if let Some(attempts) = retry.max_attempts {
                validate_positive_number("retry.max_attempts", attempts.into(), 1)?;
            }
            if let (Some(initial), Some(max)) = (retry.initial_backoff_ms, retry.max_backoff_ms) {
                if initial > max {
                    return Err(SyncError::ConfigValidationError {
                        field: "retry.initial_backoff_ms".to_string(),
                        message: "must not exceed retry.max_backoff_ms".to_string(),
                    });
                }
            }
        }

        if let Some(path) = self.ports_file() {
            validate_path("files.ports", path)?;
        }
        if let Some(path) = self.credentials_file() {
            validate_path("files.credentials", path)?;
        }

        Ok(())
    }
}
