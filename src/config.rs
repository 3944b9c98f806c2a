use std::time::Duration;

use serde::Deserialize;

use crate::logger::MessageLogMode;
use crate::protocol::WireFormat;
use crate::session::{Credentials, RetryPolicy};
use crate::{Error, Result};

/// Connection settings as supplied by the host application.
#[derive(Clone, Deserialize)]
pub struct Config {
    pub url: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub format: WireFormat,
    #[serde(default = "default_scan_interval_secs")]
    pub scan_interval_secs: u64,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub message_log: Option<MessageLogConfig>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 500,
            max_delay_ms: 5000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MessageLogConfig {
    pub mode: MessageLogMode,
    pub path: String,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("url", &self.url)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("format", &self.format)
            .field("scan_interval_secs", &self.scan_interval_secs)
            .field("timeout_secs", &self.timeout_secs)
            .field("retry", &self.retry)
            .field("message_log", &self.message_log)
            .finish()
    }
}

fn default_scan_interval_secs() -> u64 {
    30
}

fn default_timeout_secs() -> u64 {
    10
}

impl Config {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            username: None,
            password: None,
            format: WireFormat::default(),
            scan_interval_secs: default_scan_interval_secs(),
            timeout_secs: default_timeout_secs(),
            retry: RetryConfig::default(),
            message_log: None,
        }
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).map_err(|e| Error::Config(e.to_string()))
    }

    /// Username and password must be given together or not at all.
    pub fn credentials(&self) -> Result<Option<Credentials>> {
        match (&self.username, &self.password) {
            (Some(user), Some(pass)) => Ok(Some(Credentials::new(user, pass))),
            (None, None) => Ok(None),
            (Some(_), None) => Err(Error::Config("username given without password".to_string())),
            (None, Some(_)) => Err(Error::Config("password given without username".to_string())),
        }
    }

    pub fn scan_interval(&self) -> Duration {
        Duration::from_secs(self.scan_interval_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.retry.max_attempts.max(1),
            initial_delay: Duration::from_millis(self.retry.initial_delay_ms),
            max_delay: Duration::from_millis(self.retry.max_delay_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config_uses_defaults() {
        let config = Config::from_json(r#"{"url": "http://192.168.1.20/"}"#).unwrap();
        assert_eq!(config.format, WireFormat::Json);
        assert_eq!(config.scan_interval(), Duration::from_secs(30));
        assert_eq!(config.retry_policy(), RetryPolicy::default());
        assert!(config.credentials().unwrap().is_none());
        assert!(config.message_log.is_none());
    }

    #[test]
    fn debug_output_hides_password() {
        let config = Config::from_json(
            r#"{"url": "http://192.168.1.20/", "username": "admin", "password": "hunter2"}"#,
        )
        .unwrap();
        let printed = format!("{config:?}");
        assert!(printed.contains("admin"));
        assert!(printed.contains("<redacted>"));
        assert!(!printed.contains("hunter2"));
    }

    #[test]
    fn legacy_config_with_credentials() {
        let config = Config::from_json(
            r#"{
                "url": "https://controller.local/",
                "username": "admin",
                "password": "secret",
                "format": "csv",
                "retry": {"max_attempts": 5},
                "message_log": {"mode": "diffed", "path": "/tmp/fujitsu.ndjson"}
            }"#,
        )
        .unwrap();
        assert_eq!(config.format, WireFormat::Csv);
        let creds = config.credentials().unwrap().unwrap();
        assert_eq!(creds.username, "admin");
        let retry = config.retry_policy();
        assert_eq!(retry.max_attempts, 5);
        assert_eq!(retry.initial_delay, Duration::from_millis(500));
        assert_eq!(config.message_log.unwrap().mode, MessageLogMode::Diffed);
    }

    #[test]
    fn half_credentials_rejected() {
        let mut config = Config::new("http://x/");
        config.username = Some("admin".into());
        assert!(matches!(config.credentials(), Err(Error::Config(_))));
    }

    #[test]
    fn missing_url_rejected() {
        assert!(matches!(Config::from_json("{}"), Err(Error::Config(_))));
    }

    #[test]
    fn unknown_format_rejected() {
        assert!(Config::from_json(r#"{"url": "http://x/", "format": "xml"}"#).is_err());
    }
}
