use std::{env, net::SocketAddr, time::Duration};

use thiserror::Error;
use url::Url;

pub const DEFAULT_SENDGRID_BASE_URL: &str = "https://api.sendgrid.com";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const MAX_TIMEOUT_SECS: u64 = 300;

#[derive(Debug, Clone)]
pub struct Config {
    pub api_token: String,
    pub sendgrid: SendGridConfig,
    pub bind_addr: String,
    pub bind_port: u16,
}

/// Everything the outbound client needs; built once and handed to
/// [`crate::sendgrid_client::HttpSendGridClient`].
#[derive(Debug, Clone)]
pub struct SendGridConfig {
    pub api_key: String,
    pub base_url: Url,
    pub timeout: Duration,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("MCP_API_TOKEN is required and must not be empty")]
    MissingApiToken,
    #[error("SENDGRID_API_KEY is required and must not be empty")]
    MissingSendGridApiKey,
    #[error("SENDGRID_API_BASE_URL must be an absolute http(s) URL")]
    InvalidBaseUrl,
    #[error("SENDGRID_TIMEOUT_SECS must be an integer between 1 and 300")]
    InvalidTimeout,
    #[error("BIND_PORT must be a valid u16")]
    InvalidPort,
    #[error("invalid bind address or port")]
    InvalidSocket,
}

impl SendGridConfig {
    pub fn new(api_key: impl Into<String>, base_url: Url) -> Self {
        Self {
            api_key: api_key.into(),
            base_url,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let api_token = read("MCP_API_TOKEN").ok_or(ConfigError::MissingApiToken)?;
        let api_key = read("SENDGRID_API_KEY").ok_or(ConfigError::MissingSendGridApiKey)?;

        let base_url = read("SENDGRID_API_BASE_URL")
            .unwrap_or_else(|| DEFAULT_SENDGRID_BASE_URL.to_string())
            .parse::<Url>()
            .map_err(|_| ConfigError::InvalidBaseUrl)?;
        if !matches!(base_url.scheme(), "http" | "https") || base_url.cannot_be_a_base() {
            return Err(ConfigError::InvalidBaseUrl);
        }

        let timeout_secs = read("SENDGRID_TIMEOUT_SECS")
            .map(|value| value.parse::<u64>().map_err(|_| ConfigError::InvalidTimeout))
            .transpose()?
            .unwrap_or(DEFAULT_TIMEOUT_SECS);
        if timeout_secs == 0 || timeout_secs > MAX_TIMEOUT_SECS {
            return Err(ConfigError::InvalidTimeout);
        }

        let bind_addr = read("BIND_ADDR").unwrap_or_else(|| "127.0.0.1".to_string());
        let bind_port = read("BIND_PORT")
            .map(|value| value.parse::<u16>().map_err(|_| ConfigError::InvalidPort))
            .transpose()?
            .unwrap_or(8080);

        let config = Self {
            api_token,
            sendgrid: SendGridConfig {
                api_key,
                base_url,
                timeout: Duration::from_secs(timeout_secs),
            },
            bind_addr,
            bind_port,
        };

        let _ = config.bind_socket()?;
        Ok(config)
    }

    pub fn bind_socket(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.bind_addr, self.bind_port)
            .parse::<SocketAddr>()
            .map_err(|_| ConfigError::InvalidSocket)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn parse_defaults() {
        let config = config_from(&[("MCP_API_TOKEN", "abc"), ("SENDGRID_API_KEY", "SG.key")])
            .expect("config should parse");

        assert_eq!(config.bind_addr, "127.0.0.1");
        assert_eq!(config.bind_port, 8080);
        assert_eq!(config.sendgrid.api_key, "SG.key");
        assert_eq!(config.sendgrid.base_url.as_str(), "https://api.sendgrid.com/");
        assert_eq!(config.sendgrid.timeout, Duration::from_secs(30));
    }

    #[test]
    fn missing_token_fails() {
        let err = config_from(&[("SENDGRID_API_KEY", "SG.key")])
            .expect_err("expected missing token error");
        assert!(matches!(err, ConfigError::MissingApiToken));
    }

    #[test]
    fn blank_sendgrid_key_fails_fast() {
        let err = config_from(&[("MCP_API_TOKEN", "abc"), ("SENDGRID_API_KEY", "   ")])
            .expect_err("expected missing sendgrid key error");
        assert!(matches!(err, ConfigError::MissingSendGridApiKey));
    }

    #[test]
    fn custom_base_url_and_timeout_parse() {
        let config = config_from(&[
            ("MCP_API_TOKEN", "abc"),
            ("SENDGRID_API_KEY", "SG.key"),
            ("SENDGRID_API_BASE_URL", "http://127.0.0.1:9000"),
            ("SENDGRID_TIMEOUT_SECS", "5"),
        ])
        .expect("config should parse");

        assert_eq!(config.sendgrid.base_url.as_str(), "http://127.0.0.1:9000/");
        assert_eq!(config.sendgrid.timeout, Duration::from_secs(5));
    }

    #[test]
    fn non_http_base_url_fails() {
        let err = config_from(&[
            ("MCP_API_TOKEN", "abc"),
            ("SENDGRID_API_KEY", "SG.key"),
            ("SENDGRID_API_BASE_URL", "mailto:ops@example.com"),
        ])
        .expect_err("expected invalid base url");
        assert!(matches!(err, ConfigError::InvalidBaseUrl));
    }

    #[test]
    fn zero_timeout_fails() {
        let err = config_from(&[
            ("MCP_API_TOKEN", "abc"),
            ("SENDGRID_API_KEY", "SG.key"),
            ("SENDGRID_TIMEOUT_SECS", "0"),
        ])
        .expect_err("expected invalid timeout");
        assert!(matches!(err, ConfigError::InvalidTimeout));
    }

    #[test]
    fn invalid_port_fails() {
        let err = config_from(&[
            ("MCP_API_TOKEN", "abc"),
            ("SENDGRID_API_KEY", "SG.key"),
            ("BIND_PORT", "70000"),
        ])
        .expect_err("expected invalid port");
        assert!(matches!(err, ConfigError::InvalidPort));
    }
}
