//! TOML configuration file schema and parsing.
//!
//! Example config file:
//!
//! ```toml
//! [provider]
//! # PINGDOM_API_TOKEN takes precedence when set.
//! api_token = "..."
//! request_timeout_ms = 30000
//!
//! [logging]
//! format = "json"
//!
//! [[maintenance]]
//! name = "release-freeze"
//! description = "Release freeze"
//! from = "2020-07-16T12:00:00Z"
//! to = "2020-07-16T13:00:00Z"
//! uptime_check_ids = [1234, 5678]
//!
//! [[maintenance]]
//! name = "nightly-backup"
//! description = "Nightly backup"
//! from = "2020-07-16T01:00:00Z"
//! to = "2020-07-16T02:00:00Z"
//! recurrence_type = "day"
//! repeat_every = 1
//! recurrence_end = "2021-07-16T00:00:00Z"
//! ```

use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use pingdom_core::config::DEFAULT_BASE_URL;
use pingdom_core::{ClientConfig, WindowSpec};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub provider: ProviderConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub maintenance: Vec<MaintenanceDef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    #[serde(default)]
    pub api_token: Option<String>,

    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_token: None,
            base_url: default_base_url(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.into()
}

fn default_request_timeout_ms() -> u64 {
    30_000
}

impl ProviderConfig {
    pub fn client_config(&self) -> Result<ClientConfig, String> {
        let config = ClientConfig::from_env_or(self.api_token.as_deref())
            .map_err(|e| e.to_string())?
            .with_base_url(&self.base_url)
            .map_err(|e| e.to_string())?
            .with_request_timeout(Duration::from_millis(self.request_timeout_ms));
        Ok(config)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub format: LogFormat,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MaintenanceDef {
    pub name: String,

    #[serde(flatten)]
    pub spec: WindowSpec,
}

impl AppConfig {
    pub fn load(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file {}: {}", path.display(), e))?;

        let config: AppConfig = toml::from_str(&content)
            .map_err(|e| format!("Failed to parse config file {}: {}", path.display(), e))?;

        config.validate()?;
        Ok(config)
    }

    pub fn declared(&self) -> BTreeMap<String, WindowSpec> {
        self.maintenance
            .iter()
            .map(|m| (m.name.clone(), m.spec.clone()))
            .collect()
    }

    fn validate(&self) -> Result<(), String> {
        let base = url::Url::parse(&self.provider.base_url).map_err(|e| {
            format!("Invalid provider base_url: {} ({})", self.provider.base_url, e)
        })?;
        if base.scheme() != "http" && base.scheme() != "https" {
            return Err(format!(
                "Provider base_url must use http or https: {}",
                self.provider.base_url
            ));
        }

        let mut names = HashSet::new();
        for m in &self.maintenance {
            if m.name.is_empty() {
                return Err("Maintenance name must not be empty".into());
            }
            if !names.insert(&m.name) {
                return Err(format!("Duplicate maintenance name: {}", m.name));
            }
            if m.spec.repeat_every == Some(0) {
                return Err(format!(
                    "repeat_every must be positive in maintenance '{}'",
                    m.name
                ));
            }
            m.spec
                .resolve()
                .map_err(|e| format!("Maintenance '{}': {}", m.name, e))?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pingdom_core::RecurrenceType;

    #[test]
    fn parse_minimal_config() {
        let toml = r#"
[[maintenance]]
name = "freeze"
description = "Release freeze"
from = "2020-07-16T12:00:00Z"
to = "2020-07-16T13:00:00Z"
"#;
        let config: AppConfig = toml::from_str(toml).unwrap();
        config.validate().unwrap();
        assert_eq!(config.maintenance.len(), 1);
        assert_eq!(config.maintenance[0].spec.description, "Release freeze");
        assert_eq!(config.provider.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.provider.request_timeout_ms, 30_000);
        assert_eq!(config.logging.format, LogFormat::Pretty);
    }

    #[test]
    fn parse_full_config() {
        let toml = r#"
[provider]
api_token = "abc"
base_url = "http://127.0.0.1:9000/api/3.1"
request_timeout_ms = 5000

[logging]
format = "json"

[[maintenance]]
name = "nightly"
description = "Nightly backup"
from = "now"
to = "2030-01-01T02:00:00Z"
recurrence_type = "daily"
repeat_every = 1
recurrence_end = "2031-01-01T00:00:00+02:00"
uptime_check_ids = [3, 1, 3]
transaction_check_ids = [9]
"#;
        let config: AppConfig = toml::from_str(toml).unwrap();
        config.validate().unwrap();

        assert_eq!(config.provider.api_token.as_deref(), Some("abc"));
        assert_eq!(config.logging.format, LogFormat::Json);

        let declared = config.declared();
        let spec = &declared["nightly"];
        assert_eq!(spec.recurrence_type, Some(RecurrenceType::Day));
        assert_eq!(spec.repeat_every, Some(1));
        assert_eq!(spec.uptime_check_ids.iter().copied().collect::<Vec<_>>(), vec![1, 3]);
        assert_eq!(spec.transaction_check_ids.len(), 1);
    }

    #[test]
    fn client_config_applies_timeout_and_base_url() {
        let provider = ProviderConfig {
            api_token: Some("abc".into()),
            base_url: "http://127.0.0.1:9000/api".into(),
            request_timeout_ms: 1500,
        };
        // The env override may be set on the machine running tests, so only
        // non-token fields are checked.
        let client = provider.client_config().unwrap();
        assert_eq!(client.base_url.as_str(), "http://127.0.0.1:9000/api");
        assert_eq!(client.request_timeout, Duration::from_millis(1500));
    }

    #[test]
    fn validate_rejects_duplicate_names() {
        let toml = r#"
[[maintenance]]
name = "same"
description = "a"
from = "now"
to = "now"

[[maintenance]]
name = "same"
description = "b"
from = "now"
to = "now"
"#;
        let config: AppConfig = toml::from_str(toml).unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.contains("Duplicate maintenance name"), "{}", err);
    }

    #[test]
    fn validate_rejects_unparseable_time() {
        let toml = r#"
[[maintenance]]
name = "bad"
description = "a"
from = "2020-07-16:12:00:00"
to = "now"
"#;
        let config: AppConfig = toml::from_str(toml).unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.contains("Maintenance 'bad'"), "{}", err);
        assert!(err.contains("2020-07-16:12:00:00"), "{}", err);
    }

    #[test]
    fn validate_rejects_zero_repeat_every() {
        let toml = r#"
[[maintenance]]
name = "zero"
description = "a"
from = "now"
to = "now"
repeat_every = 0
"#;
        let config: AppConfig = toml::from_str(toml).unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.contains("repeat_every must be positive"), "{}", err);
    }

    #[test]
    fn validate_rejects_non_http_base_url() {
        let toml = r#"
[provider]
base_url = "ftp://api.example.com"
"#;
        let config: AppConfig = toml::from_str(toml).unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.contains("http or https"), "{}", err);
    }

    #[test]
    fn parse_rejects_unknown_log_format() {
        let toml = r#"
[logging]
format = "xml"
"#;
        let err = toml::from_str::<AppConfig>(toml).unwrap_err().to_string();
        assert!(err.contains("unknown variant `xml`"), "{}", err);
    }
}
