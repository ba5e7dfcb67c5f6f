//! Configuration module for Gamblr Chat.

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::chat::MAX_MESSAGE_LENGTH;
use crate::{GamblrError, Result};

/// Chat channel configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatConfig {
    /// Name of the shared room collection.
    #[serde(default = "default_room")]
    pub room: String,
    /// Number of most recent messages kept in the live view.
    #[serde(default = "default_window_size")]
    pub window_size: usize,
    /// Minimum time between two accepted sends of one participant.
    #[serde(default = "default_cooldown_ms")]
    pub cooldown_ms: u64,
    /// Maximum message length in characters after sanitization. May be
    /// lowered, but not raised above what storage accepts.
    #[serde(default = "default_max_message_length")]
    pub max_message_length: usize,
}

fn default_room() -> String {
    "degen-chat".to_string()
}

fn default_window_size() -> usize {
    50
}

fn default_cooldown_ms() -> u64 {
    5000
}

fn default_max_message_length() -> usize {
    MAX_MESSAGE_LENGTH
}

impl ChatConfig {
    /// Cooldown window as a `Duration`.
    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            room: default_room(),
            window_size: default_window_size(),
            cooldown_ms: default_cooldown_ms(),
            max_message_length: default_max_message_length(),
        }
    }
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub path: String,
}

fn default_db_path() -> String {
    "data/gamblr.db".to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Path to the log file.
    #[serde(default = "default_log_file")]
    pub file: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_file() -> String {
    "logs/gamblr.log".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: default_log_file(),
        }
    }
}

/// WebSocket gateway configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct WebConfig {
    /// Whether the gateway is enabled.
    #[serde(default = "default_web_enabled")]
    pub enabled: bool,
    /// Host address to bind.
    #[serde(default = "default_web_host")]
    pub host: String,
    /// Port number for the gateway.
    #[serde(default = "default_web_port")]
    pub port: u16,
    /// CORS allowed origins.
    #[serde(default)]
    pub cors_origins: Vec<String>,
    /// Secret shared with the identity provider for HS256 tokens.
    #[serde(default)]
    pub jwt_secret: String,
}

fn default_web_enabled() -> bool {
    true
}

fn default_web_host() -> String {
    "0.0.0.0".to_string()
}

fn default_web_port() -> u16 {
    8080
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            enabled: default_web_enabled(),
            host: default_web_host(),
            port: default_web_port(),
            cors_origins: vec![],
            jwt_secret: String::new(),
        }
    }
}

/// Main configuration structure.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    /// Chat channel configuration.
    #[serde(default)]
    pub chat: ChatConfig,
    /// Database configuration.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Gateway configuration.
    #[serde(default)]
    pub web: WebConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(GamblrError::Io)?;
        Self::parse(&content)
    }

    /// Load configuration from a TOML file and apply environment variable overrides.
    pub fn load_with_env<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| GamblrError::Validation(format!("config parse error: {e}")))
    }

    /// Apply environment variable overrides to the configuration.
    ///
    /// Supported environment variables:
    /// - `GAMBLR_JWT_SECRET`: Override the JWT secret key
    pub fn apply_env_overrides(&mut self) {
        if let Ok(jwt_secret) = std::env::var("GAMBLR_JWT_SECRET") {
            if !jwt_secret.is_empty() {
                self.web.jwt_secret = jwt_secret;
            }
        }
    }

    /// Validate the configuration.
    ///
    /// Returns an error if:
    /// - the gateway is enabled but the JWT secret is not set
    /// - the chat window or the maximum message length is zero
    pub fn validate(&self) -> Result<()> {
        if self.web.enabled && self.web.jwt_secret.is_empty() {
            return Err(GamblrError::Validation(
                "web gateway is enabled but jwt_secret is not set. \
                 Set it in config.toml or via GAMBLR_JWT_SECRET environment variable."
                    .to_string(),
            ));
        }
        if self.chat.window_size == 0 {
            return Err(GamblrError::Validation(
                "chat.window_size must be at least 1".to_string(),
            ));
        }
        if self.chat.max_message_length == 0 {
            return Err(GamblrError::Validation(
                "chat.max_message_length must be at least 1".to_string(),
            ));
        }
        if self.chat.max_message_length > MAX_MESSAGE_LENGTH {
            return Err(GamblrError::Validation(format!(
                "chat.max_message_length must be at most {}",
                MAX_MESSAGE_LENGTH
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.chat.room, "degen-chat");
        assert_eq!(config.chat.window_size, 50);
        assert_eq!(config.chat.cooldown_ms, 5000);
        assert_eq!(config.chat.cooldown(), Duration::from_secs(5));
        assert_eq!(config.chat.max_message_length, 160);

        assert_eq!(config.database.path, "data/gamblr.db");

        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.file, "logs/gamblr.log");

        assert!(config.web.enabled);
        assert_eq!(config.web.host, "0.0.0.0");
        assert_eq!(config.web.port, 8080);
        assert!(config.web.cors_origins.is_empty());
        assert!(config.web.jwt_secret.is_empty());
    }

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
[chat]
room = "lobby"
window_size = 20
cooldown_ms = 2500
max_message_length = 100

[database]
path = "custom/chat.sqlite"

[logging]
level = "debug"
file = "custom/logs/app.log"

[web]
enabled = true
host = "127.0.0.1"
port = 3000
cors_origins = ["http://localhost:3000", "http://localhost:9002"]
jwt_secret = "test-secret-key"
"#;

        let config = Config::parse(toml).unwrap();

        assert_eq!(config.chat.room, "lobby");
        assert_eq!(config.chat.window_size, 20);
        assert_eq!(config.chat.cooldown(), Duration::from_millis(2500));
        assert_eq!(config.chat.max_message_length, 100);

        assert_eq!(config.database.path, "custom/chat.sqlite");

        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.file, "custom/logs/app.log");

        assert!(config.web.enabled);
        assert_eq!(config.web.host, "127.0.0.1");
        assert_eq!(config.web.port, 3000);
        assert_eq!(config.web.cors_origins.len(), 2);
        assert_eq!(config.web.cors_origins[1], "http://localhost:9002");
        assert_eq!(config.web.jwt_secret, "test-secret-key");
    }

    #[test]
    fn test_parse_partial_config() {
        let toml = r#"
[chat]
cooldown_ms = 1000
"#;

        let config = Config::parse(toml).unwrap();

        assert_eq!(config.chat.cooldown_ms, 1000);
        assert_eq!(config.chat.window_size, 50);
        assert_eq!(config.chat.room, "degen-chat");
        assert_eq!(config.database.path, "data/gamblr.db");
    }

    #[test]
    fn test_parse_empty_config() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.chat.max_message_length, 160);
        assert_eq!(config.web.port, 8080);
    }

    #[test]
    fn test_parse_invalid_config() {
        let result = Config::parse("this is not valid toml [[[");

        assert!(result.is_err());
        if let Err(GamblrError::Validation(msg)) = result {
            assert!(msg.contains("config parse error"));
        } else {
            panic!("Expected Validation error");
        }
    }

    #[test]
    fn test_load_nonexistent_file() {
        let result = Config::load("nonexistent.toml");
        assert!(matches!(result, Err(GamblrError::Io(_))));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[chat]\nroom = \"from-file\"\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.chat.room, "from-file");
    }

    #[test]
    fn test_apply_env_overrides_jwt_secret() {
        let original = std::env::var("GAMBLR_JWT_SECRET").ok();

        std::env::set_var("GAMBLR_JWT_SECRET", "env-secret-key");
        let mut config = Config::default();
        config.apply_env_overrides();
        assert_eq!(config.web.jwt_secret, "env-secret-key");

        std::env::set_var("GAMBLR_JWT_SECRET", "");
        let mut config = Config::default();
        config.web.jwt_secret = "original-secret".to_string();
        config.apply_env_overrides();
        // Empty values never override
        assert_eq!(config.web.jwt_secret, "original-secret");

        if let Some(val) = original {
            std::env::set_var("GAMBLR_JWT_SECRET", val);
        } else {
            std::env::remove_var("GAMBLR_JWT_SECRET");
        }
    }

    #[test]
    fn test_validate_web_enabled_no_secret() {
        let config = Config::default();
        let result = config.validate();
        if let Err(GamblrError::Validation(msg)) = result {
            assert!(msg.contains("jwt_secret"));
        } else {
            panic!("Expected Validation error");
        }
    }

    #[test]
    fn test_validate_web_disabled() {
        let mut config = Config::default();
        config.web.enabled = false;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_zero_window() {
        let mut config = Config::default();
        config.web.jwt_secret = "secret".to_string();
        config.chat.window_size = 0;
        assert!(config.validate().is_err());

        config.chat.window_size = 50;
        config.chat.max_message_length = 0;
        assert!(config.validate().is_err());

        config.chat.max_message_length = 160;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_message_length_ceiling() {
        let mut config = Config::default();
        config.web.jwt_secret = "secret".to_string();

        config.chat.max_message_length = 100;
        assert!(config.validate().is_ok());

        config.chat.max_message_length = 161;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("at most 160"));

        let mut parsed = Config::parse("[chat]\nmax_message_length = 500\n").unwrap();
        parsed.web.jwt_secret = "secret".to_string();
        assert!(parsed.validate().is_err());
    }
}
