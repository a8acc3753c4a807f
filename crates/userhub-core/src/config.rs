//! userhub Configuration Management
//!
//! Handles configuration from environment variables and TOML files with
//! sensible defaults for development. Signing secrets have no default:
//! `validate()` must pass before the server starts.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Server configuration
    pub server: ServerConfig,

    /// Token signing and lifetimes
    pub auth: AuthConfig,

    /// Database connection
    pub database: DatabaseConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().with_env_override()
    }

    /// Load from a TOML file
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::FileReadError {
            path: path.clone(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path,
            message: e.to_string(),
        })
    }

    /// Apply environment variables on top of this configuration (env wins)
    pub fn with_env_override(mut self) -> Result<Self, ConfigError> {
        // Server
        if let Ok(host) = std::env::var("API_HOST") {
            self.server.host = host;
        }
        if let Ok(port) = std::env::var("API_PORT") {
            self.server.port = port.parse().map_err(|_| ConfigError::InvalidValue {
                key: "API_PORT".to_string(),
                value: port,
            })?;
        }
        if let Ok(prefix) = std::env::var("API_PREFIX") {
            self.server.api_prefix = prefix;
        }
        // CORS origins from environment variable (comma-separated)
        if let Ok(origins) = std::env::var("CORS_ORIGINS") {
            self.server.cors_origins = origins
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }

        // Auth
        if let Ok(secret) = std::env::var("JWT_SECRET") {
            self.auth.jwt_secret = secret;
        }
        if let Ok(secret) = std::env::var("JWT_REFRESH_SECRET") {
            self.auth.jwt_refresh_secret = Some(secret);
        }
        if let Ok(ttl) = std::env::var("JWT_ACCESS_EXPIRATION") {
            self.auth.access_ttl_secs = parse_duration_secs(&ttl).ok_or(
                ConfigError::InvalidValue {
                    key: "JWT_ACCESS_EXPIRATION".to_string(),
                    value: ttl,
                },
            )?;
        }
        if let Ok(ttl) = std::env::var("JWT_REFRESH_EXPIRATION") {
            self.auth.refresh_ttl_secs = parse_duration_secs(&ttl).ok_or(
                ConfigError::InvalidValue {
                    key: "JWT_REFRESH_EXPIRATION".to_string(),
                    value: ttl,
                },
            )?;
        }

        // Database
        if let Ok(url) = std::env::var("DATABASE_URL") {
            self.database.url = Some(url);
        }

        // Logging
        if let Ok(level) = std::env::var("LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("LOG_FORMAT") {
            self.logging.json_format = format.eq_ignore_ascii_case("json");
        }

        Ok(self)
    }

    /// Reject configurations the server cannot safely run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.auth.validate()
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Prefix for versioned API routes
    pub api_prefix: String,

    /// Allowed origins for CORS; `*` allows any
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            api_prefix: "/api/v1".to_string(),
            cors_origins: vec![],
        }
    }
}

/// Token signing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// HMAC secret for access tokens
    pub jwt_secret: String,

    /// HMAC secret for refresh tokens; falls back to `jwt_secret`
    pub jwt_refresh_secret: Option<String>,

    /// Access token lifetime in seconds (default: 15 minutes)
    pub access_ttl_secs: u64,

    /// Refresh token lifetime in seconds (default: 7 days)
    pub refresh_ttl_secs: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: String::new(),
            jwt_refresh_secret: None,
            access_ttl_secs: 15 * 60,
            refresh_ttl_secs: 7 * 24 * 60 * 60,
        }
    }
}

impl AuthConfig {
    /// Configuration with the given secret and default lifetimes
    pub fn with_secret(secret: impl Into<String>) -> Self {
        Self {
            jwt_secret: secret.into(),
            ..Default::default()
        }
    }

    /// Secret used for refresh tokens
    pub fn refresh_secret(&self) -> &str {
        self.jwt_refresh_secret
            .as_deref()
            .filter(|s| !s.is_empty())
            .unwrap_or(&self.jwt_secret)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.jwt_secret.trim().is_empty() {
            return Err(ConfigError::MissingRequired("JWT_SECRET".to_string()));
        }
        if self.access_ttl_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "access_ttl_secs".to_string(),
                value: "0".to_string(),
            });
        }
        if self.refresh_ttl_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "refresh_ttl_secs".to_string(),
                value: "0".to_string(),
            });
        }
        Ok(())
    }
}

/// Database connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL; the in-memory directory is used when unset
    pub url: Option<String>,

    /// PostgreSQL connection pool size
    pub pool_size: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            pool_size: 10,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// JSON format for logs
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
        }
    }
}

/// Parse a lifetime such as `"15m"`, `"12h"`, `"7d"`, `"30s"` or `"900"` into seconds
pub fn parse_duration_secs(value: &str) -> Option<u64> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    let (digits, multiplier) = match value.as_bytes()[value.len() - 1] {
        b's' => (&value[..value.len() - 1], 1),
        b'm' => (&value[..value.len() - 1], 60),
        b'h' => (&value[..value.len() - 1], 60 * 60),
        b'd' => (&value[..value.len() - 1], 24 * 60 * 60),
        _ => (value, 1),
    };

    digits
        .parse::<u64>()
        .ok()
        .and_then(|n| n.checked_mul(multiplier))
        .filter(|&n| n > 0)
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("Missing required configuration: {0}")]
    MissingRequired(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 5000);
        assert_eq!(config.server.api_prefix, "/api/v1");
        assert_eq!(config.auth.access_ttl_secs, 900);
        assert_eq!(config.auth.refresh_ttl_secs, 604_800);
        assert!(config.database.url.is_none());
    }

    #[test]
    fn test_missing_secret_is_rejected() {
        let config = AppConfig::default();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingRequired(_))
        ));

        let config = AppConfig {
            auth: AuthConfig::with_secret("s3cret"),
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_refresh_secret_fallback() {
        let mut auth = AuthConfig::with_secret("access");
        assert_eq!(auth.refresh_secret(), "access");

        auth.jwt_refresh_secret = Some(String::new());
        assert_eq!(auth.refresh_secret(), "access");

        auth.jwt_refresh_secret = Some("refresh".to_string());
        assert_eq!(auth.refresh_secret(), "refresh");
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration_secs("15m"), Some(900));
        assert_eq!(parse_duration_secs("7d"), Some(604_800));
        assert_eq!(parse_duration_secs("2h"), Some(7200));
        assert_eq!(parse_duration_secs("45s"), Some(45));
        assert_eq!(parse_duration_secs("900"), Some(900));
        assert_eq!(parse_duration_secs("0m"), None);
        assert_eq!(parse_duration_secs("m"), None);
        assert_eq!(parse_duration_secs("abc"), None);
        assert_eq!(parse_duration_secs(""), None);
    }

    #[test]
    fn test_toml_round_trip_with_partial_sections() {
        let config: AppConfig = toml::from_str(
            r#"
            [server]
            port = 9000

            [auth]
            jwt_secret = "from-file"
            access_ttl_secs = 60
            "#,
        )
        .unwrap();

        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.auth.jwt_secret, "from-file");
        assert_eq!(config.auth.access_ttl_secs, 60);
        assert_eq!(config.auth.refresh_ttl_secs, 604_800);
    }
}
