//! Configuration structures for deserialisation.
//!
//! These structures map directly to the JSON configuration file format.

use serde::Deserialize;

use crate::blender::{DEFAULT_COMMAND_TIMEOUT_SECS, DEFAULT_HOST, DEFAULT_PORT};
use crate::error::ConfigError;
use crate::mcp::framing::Framing;

/// Root configuration structure.
///
/// This is the top-level structure that matches the JSON config file.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Optional JSON schema reference (ignored during parsing).
    #[serde(rename = "$schema", default)]
    _schema: Option<String>,

    /// Optional comment field (ignored during parsing).
    #[serde(rename = "_comment", default)]
    _comment: Option<String>,

    /// Framing discipline for messages on stdin/stdout.
    #[serde(default)]
    pub framing: Framing,

    /// Blender addon socket settings.
    #[serde(default)]
    pub blender: BlenderConfig,

    /// Telemetry settings.
    #[serde(default)]
    pub telemetry: TelemetryConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any validation checks fail.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.blender.validate()?;
        self.telemetry.validate()?;
        Ok(())
    }

    /// Applies `BLENDER_HOST` and `BLENDER_PORT` overrides from the
    /// process environment. Environment values win over the file.
    ///
    /// # Errors
    ///
    /// Returns an error if `BLENDER_PORT` is set but is not a valid
    /// TCP port number.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_env_from(|name| std::env::var(name).ok())
    }

    fn apply_env_from(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(host) = lookup("BLENDER_HOST") {
            self.blender.host = host;
        }
        if let Some(port) = lookup("BLENDER_PORT") {
            self.blender.port =
                port.trim()
                    .parse()
                    .map_err(|_| ConfigError::ValidationError {
                        message: format!("invalid BLENDER_PORT value '{port}'"),
                    })?;
        }
        Ok(())
    }
}

/// Settings for the TCP connection to the Blender addon.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BlenderConfig {
    /// Host the Blender addon listens on.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port the Blender addon listens on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Receive deadline for a single command, in seconds.
    ///
    /// Blender operations such as model imports can legitimately run for
    /// minutes, hence the generous default.
    #[serde(default = "default_command_timeout")]
    pub command_timeout_secs: u64,
}

impl BlenderConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.host.is_empty() {
            return Err(ConfigError::ValidationError {
                message: "blender.host must not be empty".to_string(),
            });
        }
        if self.command_timeout_secs == 0 {
            return Err(ConfigError::ValidationError {
                message: "blender.command_timeout_secs must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

impl Default for BlenderConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            command_timeout_secs: default_command_timeout(),
        }
    }
}

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

const fn default_port() -> u16 {
    DEFAULT_PORT
}

const fn default_command_timeout() -> u64 {
    DEFAULT_COMMAND_TIMEOUT_SECS
}

/// Telemetry configuration.
///
/// Telemetry only runs when `enabled` is true, an endpoint is configured
/// and none of the opt-out environment variables are set.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TelemetryConfig {
    /// Master switch for usage telemetry.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// HTTP endpoint events are posted to.
    #[serde(default)]
    pub endpoint: Option<String>,

    /// API key sent with each event.
    #[serde(default)]
    pub api_key: Option<String>,
}

impl TelemetryConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(ref endpoint) = self.endpoint {
            if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
                return Err(ConfigError::ValidationError {
                    message: "telemetry.endpoint must be an http(s) URL".to_string(),
                });
            }
        }
        Ok(())
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            endpoint: None,
            api_key: None,
        }
    }
}

const fn default_true() -> bool {
    true
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "warn".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_minimal_config() {
        let json = r"{}";
        let config: Config = serde_json::from_str(json).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.framing, Framing::NewlineDelimited);
        assert_eq!(config.blender.host, "localhost");
        assert_eq!(config.blender.port, 9876);
        assert_eq!(config.blender.command_timeout_secs, 180);
        assert!(config.telemetry.enabled);
    }

    #[test]
    fn parse_full_config() {
        let json = r#"{
            "$schema": "https://json-schema.org/draft/2020-12/schema",
            "_comment": "Test config",
            "framing": "content-length",
            "blender": {
                "host": "10.0.0.5",
                "port": 9999,
                "command_timeout_secs": 30
            },
            "telemetry": {
                "enabled": false,
                "endpoint": "https://telemetry.example.com/events",
                "api_key": "abc123"
            },
            "logging": {
                "level": "debug"
            }
        }"#;

        let config: Config = serde_json::from_str(json).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.framing, Framing::ContentLength);
        assert_eq!(config.blender.host, "10.0.0.5");
        assert_eq!(config.blender.port, 9999);
        assert_eq!(config.blender.command_timeout_secs, 30);
        assert!(!config.telemetry.enabled);
        assert_eq!(config.telemetry.api_key.as_deref(), Some("abc123"));
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn blender_config_defaults() {
        let config = BlenderConfig::default();
        assert_eq!(config.host, "localhost");
        assert_eq!(config.port, 9876);
        assert_eq!(config.command_timeout_secs, 180);
    }

    #[test]
    fn logging_config_defaults() {
        let config = LoggingConfig::default();
        assert_eq!(config.level, "warn");
    }

    #[test]
    fn reject_zero_timeout() {
        let json = r#"{
            "blender": {
                "command_timeout_secs": 0
            }
        }"#;

        let config: Config = serde_json::from_str(json).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn reject_non_http_telemetry_endpoint() {
        let json = r#"{
            "telemetry": {
                "endpoint": "ftp://example.com"
            }
        }"#;

        let config: Config = serde_json::from_str(json).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn reject_unknown_fields() {
        let json = r#"{
            "unknown_field": "value"
        }"#;

        let result: Result<Config, _> = serde_json::from_str(json);
        assert!(result.is_err());
    }

    #[test]
    fn env_overrides_win_over_file() {
        let mut config = Config::default();
        config
            .apply_env_from(|name| match name {
                "BLENDER_HOST" => Some("blender.lan".to_string()),
                "BLENDER_PORT" => Some("7777".to_string()),
                _ => None,
            })
            .unwrap();
        assert_eq!(config.blender.host, "blender.lan");
        assert_eq!(config.blender.port, 7777);
    }

    #[test]
    fn env_overrides_absent_leave_defaults() {
        let mut config = Config::default();
        config.apply_env_from(|_| None).unwrap();
        assert_eq!(config.blender.host, "localhost");
        assert_eq!(config.blender.port, 9876);
    }

    #[test]
    fn invalid_env_port_rejected() {
        let mut config = Config::default();
        let result = config.apply_env_from(|name| match name {
            "BLENDER_PORT" => Some("not-a-port".to_string()),
            _ => None,
        });
        assert!(result.is_err());
    }
}
