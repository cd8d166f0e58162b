//! Server and backend configuration
//!
//! Configuration is plain structs with builders, plus `from_env()` for the binary.
//!
//! Supported environment variables:
//! - `HISTORY_SERVER_BIND`: listen address (default `0.0.0.0:8080`)
//! - `HISTORY_BACKEND_URL`: base URL of the backend HTTP API (default `http://127.0.0.1:7243`)
//! - `HISTORY_BACKEND_API_KEY`: bearer token for the backend (optional)
//! - `HISTORY_BACKEND_TIMEOUT_SECS`: per-fetch timeout in seconds (default 30)
//! - `HISTORY_PAGE_SIZE`: maximum events per fetched page (optional)
//! - `HISTORY_LOG_LEVEL`, `HISTORY_LOG_FORMAT`, `HISTORY_LOG_FILE`: see [`crate::telemetry`]

use std::fmt::Display;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;
use crate::telemetry::SubscriberConfig;

const DEFAULT_BACKEND_URL: &str = "http://127.0.0.1:7243";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Connection settings for the history backend.
#[derive(Debug, Clone)]
pub struct BackendConfig {
    /// Base URL of the backend HTTP API, without trailing path.
    pub base_url: String,
    /// Bearer token sent with every fetch.
    pub api_key: Option<SecretString>,
    /// Per-fetch timeout.
    pub timeout: Duration,
    /// Maximum events per page requested from the backend.
    pub maximum_page_size: Option<u32>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BACKEND_URL.to_string(),
            api_key: None,
            timeout: DEFAULT_TIMEOUT,
            maximum_page_size: None,
        }
    }
}

impl BackendConfig {
    pub fn builder() -> BackendConfigBuilder {
        BackendConfigBuilder::default()
    }
}

/// Builder for [`BackendConfig`].
#[derive(Debug, Default)]
pub struct BackendConfigBuilder {
    base_url: Option<String>,
    api_key: Option<SecretString>,
    timeout: Option<Duration>,
    maximum_page_size: Option<u32>,
}

impl BackendConfigBuilder {
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(SecretString::from(api_key.into()));
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn maximum_page_size(mut self, size: u32) -> Self {
        self.maximum_page_size = Some(size);
        self
    }

    pub fn build(self) -> BackendConfig {
        BackendConfig {
            base_url: self
                .base_url
                .unwrap_or_else(|| DEFAULT_BACKEND_URL.to_string()),
            api_key: self.api_key,
            timeout: self.timeout.unwrap_or(DEFAULT_TIMEOUT),
            maximum_page_size: self.maximum_page_size,
        }
    }
}

/// Everything the `history-server` binary needs.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    pub backend: BackendConfig,
    pub telemetry: SubscriberConfig,
}

impl ServerConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let bind_addr = parse_var(&lookup, "HISTORY_SERVER_BIND")?
            .unwrap_or_else(default_bind_addr);

        let mut backend = BackendConfig::builder();
        if let Some(url) = lookup("HISTORY_BACKEND_URL") {
            backend = backend.base_url(url);
        }
        if let Some(key) = lookup("HISTORY_BACKEND_API_KEY").filter(|k| !k.is_empty()) {
            backend = backend.api_key(key);
        }
        if let Some(secs) = parse_var::<u64, _>(&lookup, "HISTORY_BACKEND_TIMEOUT_SECS")? {
            backend = backend.timeout(Duration::from_secs(secs));
        }
        if let Some(size) = parse_var(&lookup, "HISTORY_PAGE_SIZE")? {
            backend = backend.maximum_page_size(size);
        }

        let telemetry = SubscriberConfig::from_lookup(&lookup)?;

        Ok(Self {
            bind_addr,
            backend: backend.build(),
            telemetry,
        })
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            backend: BackendConfig::default(),
            telemetry: SubscriberConfig::default(),
        }
    }
}

fn parse_var<T, F>(lookup: &F, key: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(value) => {
            let parsed = value.trim().parse::<T>();
            match parsed {
                Ok(v) => Ok(Some(v)),
                Err(e) => Err(ConfigError::InvalidValue {
                    key,
                    reason: e.to_string(),
                    value,
                }),
            }
        }
    }
}

fn default_bind_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8080))
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_environment_is_empty() {
        let config = ServerConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.bind_addr, "0.0.0.0:8080".parse::<SocketAddr>().unwrap());
        assert_eq!(config.backend.base_url, "http://127.0.0.1:7243");
        assert!(config.backend.api_key.is_none());
        assert_eq!(config.backend.timeout, Duration::from_secs(30));
        assert_eq!(config.backend.maximum_page_size, None);
    }

    #[test]
    fn reads_all_backend_settings() {
        let config = ServerConfig::from_lookup(lookup(&[
            ("HISTORY_SERVER_BIND", "127.0.0.1:9000"),
            ("HISTORY_BACKEND_URL", "https://history.internal"),
            ("HISTORY_BACKEND_API_KEY", "secret-key"),
            ("HISTORY_BACKEND_TIMEOUT_SECS", "5"),
            ("HISTORY_PAGE_SIZE", "100"),
        ]))
        .unwrap();

        assert_eq!(config.bind_addr, "127.0.0.1:9000".parse::<SocketAddr>().unwrap());
        assert_eq!(config.backend.base_url, "https://history.internal");
        assert_eq!(
            config.backend.api_key.as_ref().unwrap().expose_secret(),
            "secret-key"
        );
        assert_eq!(config.backend.timeout, Duration::from_secs(5));
        assert_eq!(config.backend.maximum_page_size, Some(100));
    }

    #[test]
    fn rejects_unparseable_values() {
        let err = ServerConfig::from_lookup(lookup(&[("HISTORY_PAGE_SIZE", "lots")])).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                key: "HISTORY_PAGE_SIZE",
                ..
            }
        ));
    }

    #[test]
    fn api_key_is_not_printed_by_debug() {
        let config = BackendConfig::builder().api_key("super-secret").build();
        assert!(!format!("{config:?}").contains("super-secret"));
    }
}
