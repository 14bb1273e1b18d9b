//! Soil Data Access service configuration.
//!
//! Defaults are embedded at compile time from
//! `config/soil_data_access.toml` and can be overridden per process with
//! environment variables.

use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

/// Overrides [`SoilDataServiceConfig::endpoint`].
pub const ENDPOINT_ENV: &str = "SOIL_MAP_ENDPOINT";
/// Overrides [`SoilDataServiceConfig::timeout_secs`].
pub const TIMEOUT_ENV: &str = "SOIL_MAP_TIMEOUT_SECS";
/// Overrides [`SoilDataServiceConfig::max_retries`].
pub const MAX_RETRIES_ENV: &str = "SOIL_MAP_MAX_RETRIES";

const SERVICE_TOML: &str = include_str!("../config/soil_data_access.toml");

/// Errors from loading the service configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The TOML document is malformed.
    #[error("Invalid service config: {0}")]
    Toml(#[from] toml::de::Error),

    /// An environment override could not be parsed.
    #[error("Invalid value for {key}: {value:?}")]
    InvalidOverride {
        /// Environment variable name.
        key: &'static str,
        /// The rejected value.
        value: String,
    },
}

/// Connection settings for the Soil Data Access tabular service.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SoilDataServiceConfig {
    /// Tabular POST endpoint.
    pub endpoint: String,
    /// Per-attempt timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Total number of attempts per query.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// `User-Agent` header sent with every request.
    #[serde(default)]
    pub user_agent: Option<String>,
}

const fn default_timeout_secs() -> u64 {
    60
}

const fn default_max_retries() -> u32 {
    3
}

impl SoilDataServiceConfig {
    /// Parses a configuration document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Toml`] if the document is malformed.
    pub fn parse(toml_str: &str) -> Result<Self, ConfigError> {
        Ok(toml::de::from_str(toml_str)?)
    }

    /// The configuration embedded in the binary.
    ///
    /// # Panics
    ///
    /// Panics if the embedded TOML is malformed (a build-time defect).
    #[must_use]
    pub fn embedded() -> Self {
        Self::parse(SERVICE_TOML)
            .unwrap_or_else(|e| panic!("Failed to parse embedded soil data access config: {e}"))
    }

    /// The embedded configuration with `SOIL_MAP_*` environment overrides
    /// applied.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidOverride`] if an override is not a
    /// valid number.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::embedded();
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Applies overrides from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidOverride`] if a numeric override does
    /// not parse.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(endpoint) = lookup(ENDPOINT_ENV).filter(|v| !v.trim().is_empty()) {
            self.endpoint = endpoint.trim().to_string();
        }
        if let Some(value) = lookup(TIMEOUT_ENV) {
            self.timeout_secs = parse_override(TIMEOUT_ENV, &value)?;
        }
        if let Some(value) = lookup(MAX_RETRIES_ENV) {
            self.max_retries = parse_override(MAX_RETRIES_ENV, &value)?;
        }
        Ok(())
    }

    /// Per-attempt timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn parse_override<T: std::str::FromStr>(key: &'static str, value: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidOverride {
            key,
            value: value.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    #[test]
    fn embedded_config_loads() {
        let config = SoilDataServiceConfig::embedded();
        assert!(config.endpoint.starts_with("https://"));
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.timeout(), Duration::from_secs(60));
    }

    #[test]
    fn missing_optional_fields_use_defaults() {
        let config = SoilDataServiceConfig::parse(r#"endpoint = "http://localhost""#).unwrap();
        assert_eq!(config.timeout_secs, 60);
        assert_eq!(config.max_retries, 3);
        assert!(config.user_agent.is_none());
    }

    #[test]
    fn overrides_apply() {
        let env: BTreeMap<&str, &str> = [
            (ENDPOINT_ENV, "http://127.0.0.1:9000/post.rest"),
            (TIMEOUT_ENV, "5"),
            (MAX_RETRIES_ENV, " 7 "),
        ]
        .into_iter()
        .collect();

        let mut config = SoilDataServiceConfig::embedded();
        config
            .apply_overrides(|key| env.get(key).map(ToString::to_string))
            .unwrap();

        assert_eq!(config.endpoint, "http://127.0.0.1:9000/post.rest");
        assert_eq!(config.timeout_secs, 5);
        assert_eq!(config.max_retries, 7);
    }

    #[test]
    fn bad_override_is_rejected() {
        let mut config = SoilDataServiceConfig::embedded();
        let err = config
            .apply_overrides(|key| (key == MAX_RETRIES_ENV).then(|| "lots".to_string()))
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidOverride {
                key: MAX_RETRIES_ENV,
                ..
            }
        ));
    }

    #[test]
    fn malformed_toml_is_rejected() {
        assert!(SoilDataServiceConfig::parse("endpoint = ").is_err());
    }
}
