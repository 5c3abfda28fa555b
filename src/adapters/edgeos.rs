use crate::config::credentials::Credentials;
use crate::domain::model::Feature;
use crate::domain::ports::RouterFeatureStore;
use crate::utils::error::{Result, SyncError};
use async_trait::async_trait;
use reqwest::cookie::{CookieStore, Jar};
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

pub const PORT_FORWARDING_SCENARIO: &str = ".Port_Forwarding";
const FEATURE_PATH: &str = "/api/edge/feature.json";
const SESSION_COOKIE: &str = "PHPSESSID";
const CSRF_COOKIE: &str = "X-CSRF-TOKEN";

#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// EdgeOS ships a self-signed certificate by default.
    pub accept_invalid_certs: bool,
    pub timeout: Duration,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            accept_invalid_certs: false,
            timeout: Duration::from_secs(30),
        }
    }
}

/// EdgeOS web API session exposing the port forwarding feature.
pub struct EdgeOsClient {
    base_url: Url,
    client: Client,
    cookies: Arc<Jar>,
    credentials: Credentials,
}

impl EdgeOsClient {
    pub fn new(credentials: Credentials, options: ClientOptions) -> Result<Self> {
        let base_url = router_base_url(&credentials.router_address)?;
        let cookies = Arc::new(Jar::default());

        if options.accept_invalid_certs {
            tracing::warn!("⚠️ TLS certificate verification disabled for {}", base_url);
        }

        let client = Client::builder()
            .cookie_provider(cookies.clone())
            .danger_accept_invalid_certs(options.accept_invalid_certs)
            .timeout(options.timeout)
            // 登入成功時回傳 303，需要直接看到這個狀態碼
            .redirect(reqwest::redirect::Policy::none())
            .build()?;

        Ok(Self {
            base_url,
            client,
            cookies,
            credentials,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Open a session. The router answers the login form with a session cookie
    /// and a CSRF token cookie that later API calls must echo back.
    pub async fn login(&self) -> Result<()> {
        tracing::info!(
            "🔐 Logging in to {} as {}",
            self.base_url,
            self.credentials.username
        );

        let response = self
            .client
            .post(self.base_url.clone())
            .form(&[
                ("username", self.credentials.username.as_str()),
                ("password", self.credentials.password.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        tracing::debug!("Login response status: {}", status);
        check_status(status)?;

        if self.cookie(SESSION_COOKIE).is_none() {
            return Err(SyncError::AuthenticationError {
                message: "router did not issue a session cookie".to_string(),
            });
        }

        tracing::info!("✅ Session established");
        Ok(())
    }

    pub fn is_logged_in(&self) -> bool {
        self.cookie(SESSION_COOKIE).is_some()
    }

    fn cookie(&self, name: &str) -> Option<String> {
        let header = self.cookies.cookies(&self.base_url)?;
        let header = header.to_str().ok()?;
        header.split(';').find_map(|pair| {
            let (key, value) = pair.trim().split_once('=')?;
            (key == name).then(|| value.to_string())
        })
    }

    async fn post_feature(&self, body: Value) -> Result<Value> {
        let url = self
            .base_url
            .join(FEATURE_PATH)
            .map_err(|e| SyncError::ConfigError {
                message: format!("cannot build feature URL: {}", e),
            })?;

        let mut request = self.client.post(url).json(&body);
        if let Some(token) = self.cookie(CSRF_COOKIE) {
            request = request.header(CSRF_COOKIE, token);
        }

        let response = request.send().await?;
        let status = response.status();
        tracing::debug!("Feature API response status: {}", status);
        check_status(status)?;

        let text = response.text().await?;
        let payload: Value =
            serde_json::from_str(&text).map_err(|e| SyncError::MalformedResponseError {
                message: format!("feature response is not JSON: {}", e),
            })?;

        if !is_truthy(payload.get("success")) {
            return Err(SyncError::TransportError {
                message: format!(
                    "router reported failure: {}",
                    error_message(&payload).unwrap_or("no detail")
                ),
            });
        }

        Ok(payload)
    }
}

#[async_trait]
impl RouterFeatureStore for EdgeOsClient {
    async fn fetch_rule_feature(&self) -> Result<Feature> {
        let mut payload = self
            .post_feature(json!({
                "data": null,
                "action": "load",
                "scenario": PORT_FORWARDING_SCENARIO,
            }))
            .await?;

        match payload.get_mut("FEATURE").map(Value::take) {
            Some(envelope) => Feature::from_envelope(envelope),
            None => Err(SyncError::MalformedResponseError {
                message: "response has no FEATURE section".to_string(),
            }),
        }
    }

    async fn commit_rule_feature(&self, feature: &Feature) -> Result<()> {
        let payload = self
            .post_feature(json!({
                "data": feature.data,
                "action": "apply",
                "scenario": PORT_FORWARDING_SCENARIO,
            }))
            .await?;

        // apply 的結果也可能只在 FEATURE 區段標記失敗
        if let Some(section) = payload.get("FEATURE") {
            if section.get("success").is_some() && !is_truthy(section.get("success")) {
                return Err(SyncError::TransportError {
                    message: format!(
                        "router rejected port forwarding change: {}",
                        error_message(section).unwrap_or("no detail")
                    ),
                });
            }
        }

        Ok(())
    }
}

fn router_base_url(address: &str) -> Result<Url> {
    let candidate = if address.contains("://") {
        address.to_string()
    } else {
        format!("https://{}", address)
    };

    Url::parse(&candidate).map_err(|e| SyncError::InvalidConfigValueError {
        field: "router_ip".to_string(),
        value: address.to_string(),
        reason: format!("Invalid router address: {}", e),
    })
}

fn check_status(status: StatusCode) -> Result<()> {
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(SyncError::AuthenticationError {
            message: format!("router answered {}", status),
        });
    }
    if status.is_server_error() {
        return Err(SyncError::TransportError {
            message: format!("router answered {}", status),
        });
    }
    if status.is_client_error() {
        return Err(SyncError::MalformedResponseError {
            message: format!("router rejected the request with {}", status),
        });
    }
    Ok(())
}

fn is_truthy(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => s == "1" || s.eq_ignore_ascii_case("true"),
        Some(Value::Number(n)) => n.as_i64() == Some(1),
        _ => false,
    }
}

fn error_message(payload: &Value) -> Option<&str> {
    payload
        .get("error")
        .or_else(|| payload.get("message"))
        .and_then(Value::as_str)
}
