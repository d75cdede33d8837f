use std::fmt;
use std::time::Duration;

use serde::Deserialize;

use crate::types::{DeviceIdentity, DEFAULT_NAME};
use crate::{Error, Result};

pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Connection settings for one thermostat, as supplied by the host.
#[derive(Clone, Deserialize)]
pub struct Config {
    pub username: String,
    pub password: String,
    pub device_id: String,
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub legacy_mode_inference: bool,
}

fn default_name() -> String {
    DEFAULT_NAME.to_string()
}

impl Config {
    pub fn new(
        username: impl Into<String>,
        password: impl Into<String>,
        device_id: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            device_id: device_id.into(),
            name: default_name(),
            base_url: None,
            timeout_secs: None,
            legacy_mode_inference: false,
        }
    }

    pub fn from_json(s: &str) -> Result<Self> {
        let config: Config =
            serde_json::from_str(s).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("username", &self.username),
            ("password", &self.password),
            ("device_id", &self.device_id),
        ] {
            if value.trim().is_empty() {
                return Err(Error::Config(format!("{field} must not be empty")));
            }
        }
        if self.timeout_secs == Some(0) {
            return Err(Error::Config("timeout_secs must be positive".to_string()));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS))
    }

    pub fn identity(&self) -> DeviceIdentity {
        DeviceIdentity::new(&self.name, &self.device_id)
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("username", &self.username)
            .field("password", &"***")
            .field("device_id", &self.device_id)
            .field("name", &self.name)
            .field("base_url", &self.base_url)
            .field("timeout_secs", &self.timeout_secs)
            .field("legacy_mode_inference", &self.legacy_mode_inference)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_minimal() {
        let config = Config::from_json(
            r#"{"username": "a@b.com", "password": "x", "device_id": "STA00012345"}"#,
        )
        .unwrap();
        assert_eq!(config.name, DEFAULT_NAME);
        assert_eq!(config.base_url, None);
        assert_eq!(config.timeout(), Duration::from_secs(DEFAULT_TIMEOUT_SECS));
        assert!(!config.legacy_mode_inference);
    }

    #[test]
    fn parse_full() {
        let config = Config::from_json(
            r#"{
                "username": "a@b.com",
                "password": "x",
                "device_id": "STA1",
                "name": "Hall",
                "base_url": "http://127.0.0.1:8080",
                "timeout_secs": 5,
                "legacy_mode_inference": true
            }"#,
        )
        .unwrap();
        assert_eq!(config.identity().unique_id(), "hall_sta1");
        assert_eq!(config.base_url.as_deref(), Some("http://127.0.0.1:8080"));
        assert_eq!(config.timeout(), Duration::from_secs(5));
        assert!(config.legacy_mode_inference);
    }

    #[test]
    fn rejects_missing_or_empty_fields() {
        assert!(matches!(
            Config::from_json(r#"{"username": "a", "password": "x"}"#),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            Config::from_json(r#"{"username": " ", "password": "x", "device_id": "d"}"#),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            Config::from_json(r#"{"username": "a", "password": "x", "device_id": "d", "timeout_secs": 0}"#),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn debug_redacts_password() {
        let config = Config::new("a@b.com", "hunter2", "d");
        let printed = format!("{config:?}");
        assert!(!printed.contains("hunter2"));
        assert!(printed.contains("a@b.com"));
    }
}
