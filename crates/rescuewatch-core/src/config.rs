//! Startup configuration. Every field has a default; a TOML file may
//! override any subset, and the console binary layers CLI flags on top.

use std::path::Path;

use serde::Deserialize;

use crate::connection::ReconnectPolicy;
use crate::error::ConfigError;

pub const DEFAULT_ENDPOINT: &str = "ws://localhost:8000/events";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ConsoleConfig {
    /// WebSocket URL of the relay.
    pub endpoint: String,
    pub reconnect: ReconnectPolicy,
    /// Events kept in history before the oldest are dropped.
    pub history_capacity: usize,
    /// How long a toast stays visible.
    pub toast_display_ms: u64,
    /// Identifier stamped on every operator response.
    pub operator_id: String,
    /// Map zoom used when centring on a selected event.
    pub focus_zoom: u8,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_owned(),
            reconnect: ReconnectPolicy::default(),
            history_capacity: 100,
            toast_display_ms: 5_000,
            operator_id: "operator_1".to_owned(),
            focus_zoom: 16,
        }
    }
}

impl ConsoleConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |field, detail: &str| {
            Err(ConfigError::Invalid {
                field,
                detail: detail.to_owned(),
            })
        };
        if self.endpoint.trim().is_empty() {
            return invalid("endpoint", "must not be empty");
        }
        if self.reconnect.max_attempts == 0 {
            return invalid("reconnect.max_attempts", "must be at least 1");
        }
        if self.reconnect.base_delay_ms == 0 {
            return invalid("reconnect.base_delay_ms", "must be at least 1");
        }
        if self.reconnect.max_delay_ms < self.reconnect.base_delay_ms {
            return invalid("reconnect.max_delay_ms", "must not be below base_delay_ms");
        }
        if self.history_capacity == 0 {
            return invalid("history_capacity", "must be at least 1");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = ConsoleConfig::default();
        assert_eq!(c.endpoint, "ws://localhost:8000/events");
        assert_eq!(c.reconnect.base_delay_ms, 3_000);
        assert_eq!(c.reconnect.max_delay_ms, 30_000);
        assert_eq!(c.reconnect.max_attempts, 5);
        assert_eq!(c.history_capacity, 100);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let c = ConsoleConfig::from_toml_str(
            r#"
            endpoint = "ws://10.0.0.2:9000/events"
            history_capacity = 20

            [reconnect]
            max_attempts = 3
            "#,
        )
        .unwrap();
        assert_eq!(c.endpoint, "ws://10.0.0.2:9000/events");
        assert_eq!(c.history_capacity, 20);
        assert_eq!(c.reconnect.max_attempts, 3);
        assert_eq!(c.reconnect.base_delay_ms, 3_000);
        assert_eq!(c.operator_id, "operator_1");
    }

    #[test]
    fn invalid_values_rejected() {
        let err = ConsoleConfig::from_toml_str("history_capacity = 0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "history_capacity", .. }));

        let err = ConsoleConfig::from_toml_str(
            "[reconnect]\nbase_delay_ms = 5000\nmax_delay_ms = 1000",
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "reconnect.max_delay_ms", .. }));
    }

    #[test]
    fn bad_toml_is_parse_error() {
        assert!(matches!(
            ConsoleConfig::from_toml_str("history_capacity = \"lots\""),
            Err(ConfigError::Parse(_))
        ));
    }
}
