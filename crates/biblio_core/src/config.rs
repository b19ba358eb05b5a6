//! Client configuration
//!
//! Where the REST API lives and how long to wait for it. Values come from defaults, the
//! process environment (optionally primed from a `.env` file by the application), or are set
//! programmatically.
use core::time::Duration;
use reqwest::Url;
use std::env;

/// Base URL of the library server as deployed by default
pub const DEFAULT_API_URL: &str = "http://127.0.0.1:8080/api/v1/rest";

pub const API_URL_VAR: &str = "BIBLIO_API_URL";
pub const CONNECT_TIMEOUT_VAR: &str = "BIBLIO_CONNECT_TIMEOUT_SECS";
pub const TIMEOUT_VAR: &str = "BIBLIO_TIMEOUT_SECS";

#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} is not a valid URL ({value}): {reason}")]
    InvalidUrl {
        var: &'static str,
        value: String,
        reason: String,
    },
    #[error("{var} must be a whole number of seconds, got {value}")]
    InvalidSeconds { var: &'static str, value: String },
}

#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub base_url: String,
    pub connect_timeout: Duration,
    pub timeout: Duration,
    pub user_agent: String,
}

impl Default for ClientConfig {
    #[inline]
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_URL.to_owned(),
            connect_timeout: Duration::from_secs(10),
            timeout: Duration::from_secs(25),
            user_agent: format!("biblio/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl ClientConfig {
    /// Reads the configuration from the process environment, falling back to defaults for
    /// unset variables
    /// # Errors
    /// Fails if a variable is set to a value that cannot be used
    #[allow(
        clippy::missing_inline_in_public_items,
        reason = "Called once per program run"
    )]
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| env::var(var).ok())
    }

    /// Same as [`Self::from_env`] with an arbitrary variable source
    /// # Errors
    /// Fails if a variable is set to a value that cannot be used
    #[allow(
        clippy::missing_inline_in_public_items,
        reason = "Called once per program run"
    )]
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&'static str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(url) = lookup(API_URL_VAR) {
            config = config.with_base_url(&url)?;
        }
        if let Some(value) = lookup(CONNECT_TIMEOUT_VAR) {
            config.connect_timeout = parse_seconds(CONNECT_TIMEOUT_VAR, &value)?;
        }
        if let Some(value) = lookup(TIMEOUT_VAR) {
            config.timeout = parse_seconds(TIMEOUT_VAR, &value)?;
        }
        Ok(config)
    }

    /// Replaces the base URL after checking it is an absolute http(s) URL
    /// # Errors
    /// Fails if the URL does not parse or uses another scheme
    #[allow(clippy::missing_inline_in_public_items, reason = "Called rarely")]
    pub fn with_base_url(mut self, url: &str) -> Result<Self, ConfigError> {
        let invalid = |reason: String| ConfigError::InvalidUrl {
            var: API_URL_VAR,
            value: url.to_owned(),
            reason,
        };
        let parsed = Url::parse(url.trim()).map_err(|err| invalid(err.to_string()))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(invalid(format!("unsupported scheme {}", parsed.scheme())));
        }
        self.base_url = parsed.as_str().trim_end_matches('/').to_owned();
        Ok(self)
    }
}

fn parse_seconds(var: &'static str, value: &str) -> Result<Duration, ConfigError> {
    value
        .trim()
        .parse::<u64>()
        .map(Duration::from_secs)
        .map_err(|_err| ConfigError::InvalidSeconds {
            var,
            value: value.to_owned(),
        })
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    reason = "Tests are predefined and guaranteed to be Some/Ok"
)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn lookup_in(vars: &[(&'static str, &str)]) -> impl Fn(&'static str) -> Option<String> {
        let vars: HashMap<&'static str, String> = vars
            .iter()
            .map(|&(key, value)| (key, value.to_owned()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults_without_environment() {
        let config = ClientConfig::from_lookup(lookup_in(&[])).unwrap();
        assert_eq!(config, ClientConfig::default());
        assert_eq!(config.base_url, "http://127.0.0.1:8080/api/v1/rest");
    }

    #[test]
    fn environment_overrides_defaults() {
        let config = ClientConfig::from_lookup(lookup_in(&[
            (API_URL_VAR, "https://biblio.example.org/api/v1/rest/"),
            (TIMEOUT_VAR, "5"),
        ]))
        .unwrap();

        assert_eq!(config.base_url, "https://biblio.example.org/api/v1/rest");
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
    }

    #[test]
    fn rejects_unusable_values() {
        assert!(matches!(
            ClientConfig::from_lookup(lookup_in(&[(API_URL_VAR, "ftp://biblio")])),
            Err(ConfigError::InvalidUrl { .. })
        ));
        assert!(matches!(
            ClientConfig::from_lookup(lookup_in(&[(CONNECT_TIMEOUT_VAR, "ten")])),
            Err(ConfigError::InvalidSeconds { .. })
        ));
    }
}
