//! # Configuration
//!
//! Pipeline tuning, read from the environment (after loading `.env`) or from YAML.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

pub const ENV_BATCH_SIZE: &str = "ANALYTICS_BATCH_SIZE";
pub const ENV_BATCH_INTERVAL_MS: &str = "ANALYTICS_BATCH_INTERVAL_MS";
pub const ENV_BEACON_URL: &str = "ANALYTICS_BEACON_URL";
pub const ENV_DATABASE_URL: &str = "DATABASE_URL";
pub const ENV_MAX_REQUEUE_ATTEMPTS: &str = "ANALYTICS_MAX_REQUEUE_ATTEMPTS";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyticsConfig {
    /// Queue length at which a batch timer tick flushes. Default: 10.
    pub batch_size: usize,
    /// Batch timer period in milliseconds. Default: 5000.
    pub batch_interval_ms: u64,
    /// Endpoint for fire-and-forget delivery on page unload. Disabled when unset.
    pub beacon_url: Option<String>,
    /// Backend store location. Default: `sqlite:analytics.db`.
    pub database_url: String,
    /// How many times a batch may be requeued after a failed primary insert.
    /// Unset means unbounded.
    pub max_requeue_attempts: Option<u32>,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            batch_size: 10,
            batch_interval_ms: 5000,
            beacon_url: None,
            database_url: "sqlite:analytics.db".to_string(),
            max_requeue_attempts: None,
        }
    }
}

impl AnalyticsConfig {
    pub fn batch_interval(&self) -> Duration {
        Duration::from_millis(self.batch_interval_ms)
    }

    /// Loads `.env` if present, then reads overrides from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Applies overrides from `lookup` on top of the defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(v) = parse_var(&lookup, ENV_BATCH_SIZE)? {
            config.batch_size = v;
        }
        if let Some(v) = parse_var(&lookup, ENV_BATCH_INTERVAL_MS)? {
            config.batch_interval_ms = v;
        }
        if let Some(v) = lookup(ENV_BEACON_URL).filter(|v| !v.is_empty()) {
            config.beacon_url = Some(v);
        }
        if let Some(v) = lookup(ENV_DATABASE_URL).filter(|v| !v.is_empty()) {
            config.database_url = v;
        }
        if let Some(v) = parse_var(&lookup, ENV_MAX_REQUEUE_ATTEMPTS)? {
            config.max_requeue_attempts = Some(v);
        }

        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_size == 0 {
            return Err(ConfigError::ZeroBatchSize);
        }
        if self.batch_interval_ms == 0 {
            return Err(ConfigError::ZeroInterval);
        }
        Ok(())
    }
}

fn parse_var<T, F>(lookup: &F, key: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) if raw.trim().is_empty() => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue { key, value: raw }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults_match_storefront_tuning() {
        let config = AnalyticsConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.batch_size, 10);
        assert_eq!(config.batch_interval(), Duration::from_secs(5));
        assert_eq!(config.beacon_url, None);
        assert_eq!(config.max_requeue_attempts, None);
    }

    #[test]
    fn environment_overrides_defaults() {
        let config = AnalyticsConfig::from_lookup(lookup(&[
            (ENV_BATCH_SIZE, "25"),
            (ENV_BATCH_INTERVAL_MS, "750"),
            (ENV_BEACON_URL, "http://localhost:3000/api/analytics"),
            (ENV_DATABASE_URL, "sqlite::memory:"),
            (ENV_MAX_REQUEUE_ATTEMPTS, "3"),
        ]))
        .unwrap();

        assert_eq!(config.batch_size, 25);
        assert_eq!(config.batch_interval_ms, 750);
        assert_eq!(
            config.beacon_url.as_deref(),
            Some("http://localhost:3000/api/analytics")
        );
        assert_eq!(config.database_url, "sqlite::memory:");
        assert_eq!(config.max_requeue_attempts, Some(3));
    }

    #[test]
    fn bad_values_are_rejected() {
        let err = AnalyticsConfig::from_lookup(lookup(&[(ENV_BATCH_SIZE, "ten")])).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue { key: ENV_BATCH_SIZE, .. }
        ));

        let err = AnalyticsConfig::from_lookup(lookup(&[(ENV_BATCH_SIZE, "0")])).unwrap_err();
        assert!(matches!(err, ConfigError::ZeroBatchSize));
    }

    #[test]
    fn yaml_fills_missing_fields_with_defaults() {
        let config = AnalyticsConfig::from_yaml_str("batch_size: 3\nmax_requeue_attempts: 5\n")
            .unwrap();
        assert_eq!(config.batch_size, 3);
        assert_eq!(config.batch_interval_ms, 5000);
        assert_eq!(config.max_requeue_attempts, Some(5));

        assert!(matches!(
            AnalyticsConfig::from_yaml_str("batch_interval_ms: 0\n"),
            Err(ConfigError::ZeroInterval)
        ));
    }
}
