use std::fmt;
use std::time::Duration;

use thiserror::Error;
use url::Url;

/// Environment variable that overrides the configured API token.
pub const TOKEN_ENV_VAR: &str = "PINGDOM_API_TOKEN";

pub const DEFAULT_BASE_URL: &str = "https://api.pingdom.com/api/3.1";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no API token configured (set {TOKEN_ENV_VAR} or provider.api_token)")]
    MissingToken,
    #[error("invalid API base URL '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },
    #[error("failed to build HTTP client: {0}")]
    HttpClient(String),
}

/// Connection settings for the remote maintenance API.
///
/// Built once per client handle; the token is not re-read afterwards.
#[derive(Clone)]
pub struct ClientConfig {
    pub api_token: String,
    pub base_url: Url,
    pub request_timeout: Duration,
}

impl ClientConfig {
    pub fn new(api_token: impl Into<String>) -> Self {
        Self {
            api_token: api_token.into(),
            base_url: default_base_url(),
            request_timeout: Duration::from_secs(30),
        }
    }

    /// Build from a configured token, letting [`TOKEN_ENV_VAR`] take precedence.
    pub fn from_env_or(configured: Option<&str>) -> Result<Self, ConfigError> {
        resolve_token(configured).map(Self::new)
    }

    pub fn with_base_url(mut self, base_url: &str) -> Result<Self, ConfigError> {
        self.base_url = parse_base_url(base_url)?;
        Ok(self)
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("api_token", &"[REDACTED]")
            .field("base_url", &self.base_url.as_str())
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

pub fn resolve_token(configured: Option<&str>) -> Result<String, ConfigError> {
    resolve_token_with(std::env::var(TOKEN_ENV_VAR).ok(), configured)
}

fn resolve_token_with(env_value: Option<String>, configured: Option<&str>) -> Result<String, ConfigError> {
    env_value
        .filter(|v| !v.is_empty())
        .or_else(|| configured.filter(|v| !v.is_empty()).map(str::to_string))
        .ok_or(ConfigError::MissingToken)
}

fn parse_base_url(raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw).map_err(|e| ConfigError::InvalidBaseUrl {
        url: raw.to_string(),
        reason: e.to_string(),
    })?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidBaseUrl {
            url: raw.to_string(),
            reason: "scheme must be http or https".into(),
        });
    }
    Ok(url)
}

fn default_base_url() -> Url {
    Url::parse(DEFAULT_BASE_URL).expect("default base URL is valid")
}
