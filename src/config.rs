//! Process-wide configuration, loaded once from the environment.
//!
//! Every field is parsed with a documented default and validated once at
//! startup. A malformed value is a `ConfigError`, never a panic.

use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;

/// Configuration error, fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An environment variable was present but could not be parsed.
    #[error("invalid value for {var}: {value:?} ({reason})")]
    Invalid {
        /// Name of the offending environment variable.
        var: &'static str,
        /// The value that failed to parse.
        value: String,
        /// Why it failed.
        reason: String,
    },
}

/// Server-wide configuration, assembled once in `main`.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Default Kafka bootstrap servers for the Inspector when a request
    /// does not supply its own `bootstrap_servers`.
    pub kafka_bootstrap_servers: String,
    /// Address the HTTP surface binds to.
    pub http_bind_addr: SocketAddr,
    /// Bound on `Extractor::stop`; exceeding it marks the consumer ERROR.
    pub stop_timeout: Duration,
    /// Bound on each Kafka poll call inside an Extractor's loop.
    pub poll_timeout: Duration,
    /// Overall bound on an Inspector call.
    pub inspector_timeout: Duration,
    /// `DEBUG | INFO | WARN | ERROR`, passed straight to `EnvFilter` if set.
    pub log_level: String,
    /// `text` (default) or `json`.
    pub log_format: LogFormat,
}

/// Output format for structured logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable, single line per event.
    Text,
    /// One JSON object per event.
    Json,
}

impl AppConfig {
    /// Load configuration from the environment, applying defaults for any
    /// variable that is unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        let kafka_bootstrap_servers = std::env::var("KAFKA_BOOTSTRAP_SERVERS")
            .unwrap_or_else(|_| "localhost:9092".to_string());

        let http_bind_addr = parse_env("HTTP_BIND_ADDR", "0.0.0.0:8080")?;

        let stop_timeout = Duration::from_secs(parse_env("STOP_TIMEOUT_SECONDS", 30u64)?);
        let poll_timeout = Duration::from_millis(parse_env("POLL_TIMEOUT_MS", 1000u64)?);
        let inspector_timeout =
            Duration::from_secs(parse_env("INSPECTOR_TIMEOUT_SECONDS", 10u64)?);

        let log_level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| "INFO".to_string());

        let log_format = match std::env::var("LOG_FORMAT")
            .unwrap_or_else(|_| "text".to_string())
            .to_ascii_lowercase()
            .as_str()
        {
            "json" => LogFormat::Json,
            "text" => LogFormat::Text,
            other => {
                return Err(ConfigError::Invalid {
                    var: "LOG_FORMAT",
                    value: other.to_string(),
                    reason: "expected \"text\" or \"json\"".to_string(),
                })
            }
        };

        let config = Self {
            kafka_bootstrap_servers,
            http_bind_addr,
            stop_timeout,
            poll_timeout,
            inspector_timeout,
            log_level,
            log_format,
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.stop_timeout.is_zero() {
            return Err(ConfigError::Invalid {
                var: "STOP_TIMEOUT_SECONDS",
                value: "0".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.poll_timeout.is_zero() {
            return Err(ConfigError::Invalid {
                var: "POLL_TIMEOUT_MS",
                value: "0".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.inspector_timeout.is_zero() {
            return Err(ConfigError::Invalid {
                var: "INSPECTOR_TIMEOUT_SECONDS",
                value: "0".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

fn parse_env<T>(var: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(var) {
        Ok(value) => value.parse::<T>().map_err(|e| ConfigError::Invalid {
            var,
            value,
            reason: e.to_string(),
        }),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn defaults_when_unset() {
        for var in [
            "KAFKA_BOOTSTRAP_SERVERS",
            "HTTP_BIND_ADDR",
            "STOP_TIMEOUT_SECONDS",
            "POLL_TIMEOUT_MS",
            "INSPECTOR_TIMEOUT_SECONDS",
            "LOG_LEVEL",
            "LOG_FORMAT",
        ] {
            std::env::remove_var(var);
        }

        let config = AppConfig::from_env().expect("defaults must be valid");
        assert_eq!(config.kafka_bootstrap_servers, "localhost:9092");
        assert_eq!(config.stop_timeout, Duration::from_secs(30));
        assert_eq!(config.poll_timeout, Duration::from_millis(1000));
        assert_eq!(config.inspector_timeout, Duration::from_secs(10));
        assert_eq!(config.log_format, LogFormat::Text);
    }

    #[test]
    #[serial]
    fn rejects_malformed_timeout() {
        std::env::set_var("STOP_TIMEOUT_SECONDS", "not-a-number");
        let result = AppConfig::from_env();
        std::env::remove_var("STOP_TIMEOUT_SECONDS");
        assert!(result.is_err());
    }

    #[test]
    #[serial]
    fn rejects_unknown_log_format() {
        std::env::set_var("LOG_FORMAT", "yaml");
        let result = AppConfig::from_env();
        std::env::remove_var("LOG_FORMAT");
        assert!(result.is_err());
    }
}
