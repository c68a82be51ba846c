//! Client configuration
//!
//! Read from the process environment after `.env` has been loaded. Unset or
//! empty variables fall back to their defaults.

use std::time::Duration;

use crate::client::DEFAULT_TIMEOUT;
use crate::error::ConfigError;

/// Endpoint used when `API_URL` is unset
pub const DEFAULT_API_URL: &str = "http://localhost:4000/graphql";

/// Runtime settings for the client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// GraphQL endpoint (`API_URL`)
    pub api_url: reqwest::Url,

    /// Bound on each request
    pub timeout: Duration,
}

impl ClientConfig {
    /// Load from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load using `lookup` to read variables
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let raw = lookup("API_URL")
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());

        let api_url = reqwest::Url::parse(&raw)
            .ok()
            .filter(|url| matches!(url.scheme(), "http" | "https"))
            .ok_or(ConfigError::InvalidValue {
                name: "API_URL",
                value: raw.clone(),
            })?;

        Ok(Self {
            api_url,
            timeout: DEFAULT_TIMEOUT,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<ClientConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ClientConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[]).unwrap();
        assert_eq!(config.api_url.as_str(), DEFAULT_API_URL);
        assert_eq!(config.timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_empty_is_unset() {
        assert_eq!(load(&[("API_URL", " ")]).unwrap().api_url.as_str(), DEFAULT_API_URL);
    }

    #[test]
    fn test_custom_url() {
        let config = load(&[("API_URL", "https://api.example.com/graphql")]).unwrap();
        assert_eq!(config.api_url.host_str(), Some("api.example.com"));
    }

    #[test]
    fn test_invalid_url() {
        assert!(matches!(
            load(&[("API_URL", "not a url")]),
            Err(ConfigError::InvalidValue { name: "API_URL", .. })
        ));
        assert!(load(&[("API_URL", "ftp://example.com")]).is_err());
    }
}
