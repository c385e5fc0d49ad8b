//! Sign-acceptance configuration with validation.
//!
//! Defaults match the router's production settings; every field can be
//! overridden from a config file (serde) or `ROUTER_ACCEPT_*` environment
//! variables.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use super::cache::DEFAULT_MAX_CACHED_KEYS;

/// Default retry delay after a failed poll.
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_secs(3);

/// Default delay between polls.
pub const DEFAULT_WAIT_INTERVAL: Duration = Duration::from_secs(5);

/// Default concurrent verifications.
pub const DEFAULT_MAX_CONCURRENT_VERIFICATIONS: usize = 10;

/// Default age of sign requests still worth answering.
pub const DEFAULT_MAX_SIGN_AGE_SECS: u64 = 600;

/// Default capacity of the producer → dispatcher queue.
pub const DEFAULT_QUEUE_CAPACITY: usize = 10;

/// Sign-acceptance worker configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AcceptConfig {
    /// Router deployment identifier. Requests for other identifiers are foreign.
    pub identifier: String,
    /// Account allowed to initiate sign ceremonies.
    pub mpc_initiator_account: String,
    /// Ignore undecidable requests and discard config mismatches instead of
    /// disagreeing.
    pub tolerant_mode: bool,
    /// Seconds between polls (0 = default).
    pub poll_interval_secs: u64,
    /// Maximum verifier tasks in flight.
    pub max_concurrent_verifications: usize,
    /// Maximum keys kept in the dedup cache.
    pub max_cached_keys: usize,
    /// Only requests younger than this are polled.
    pub max_sign_age_secs: u64,
    /// Capacity of the producer → dispatcher queue.
    pub queue_capacity: usize,
}

impl Default for AcceptConfig {
    fn default() -> Self {
        Self {
            identifier: String::new(),
            mpc_initiator_account: String::new(),
            tolerant_mode: false,
            poll_interval_secs: 0,
            max_concurrent_verifications: DEFAULT_MAX_CONCURRENT_VERIFICATIONS,
            max_cached_keys: DEFAULT_MAX_CACHED_KEYS,
            max_sign_age_secs: DEFAULT_MAX_SIGN_AGE_SECS,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

impl AcceptConfig {
    /// Create a config for an identifier and initiator, other fields default.
    pub fn new(identifier: impl Into<String>, mpc_initiator_account: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            mpc_initiator_account: mpc_initiator_account.into(),
            ..Self::default()
        }
    }

    /// Load from `ROUTER_ACCEPT_*` environment variables on top of defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load from an arbitrary variable lookup on top of defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(v) = lookup("ROUTER_ACCEPT_IDENTIFIER") {
            config.identifier = v;
        }
        if let Some(v) = lookup("ROUTER_ACCEPT_MPC_INITIATOR") {
            config.mpc_initiator_account = v;
        }
        if let Some(v) = lookup("ROUTER_ACCEPT_TOLERANT_MODE") {
            config.tolerant_mode = parse_var("ROUTER_ACCEPT_TOLERANT_MODE", &v)?;
        }
        if let Some(v) = lookup("ROUTER_ACCEPT_POLL_INTERVAL_SECS") {
            config.poll_interval_secs = parse_var("ROUTER_ACCEPT_POLL_INTERVAL_SECS", &v)?;
        }
        if let Some(v) = lookup("ROUTER_ACCEPT_MAX_CONCURRENT") {
            config.max_concurrent_verifications = parse_var("ROUTER_ACCEPT_MAX_CONCURRENT", &v)?;
        }
        if let Some(v) = lookup("ROUTER_ACCEPT_MAX_CACHED_KEYS") {
            config.max_cached_keys = parse_var("ROUTER_ACCEPT_MAX_CACHED_KEYS", &v)?;
        }
        if let Some(v) = lookup("ROUTER_ACCEPT_MAX_SIGN_AGE_SECS") {
            config.max_sign_age_secs = parse_var("ROUTER_ACCEPT_MAX_SIGN_AGE_SECS", &v)?;
        }

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.identifier.trim().is_empty() {
            return Err(ConfigError::Missing("identifier"));
        }
        if self.mpc_initiator_account.trim().is_empty() {
            return Err(ConfigError::Missing("mpcInitiatorAccount"));
        }
        if self.max_concurrent_verifications == 0 {
            return Err(ConfigError::InvalidLimit(
                "maxConcurrentVerifications cannot be 0".into(),
            ));
        }
        if self.max_cached_keys == 0 {
            return Err(ConfigError::InvalidLimit("maxCachedKeys cannot be 0".into()));
        }
        if self.queue_capacity == 0 {
            return Err(ConfigError::InvalidLimit("queueCapacity cannot be 0".into()));
        }
        Ok(())
    }

    /// Delay between polls.
    pub fn wait_interval(&self) -> Duration {
        if self.poll_interval_secs > 0 {
            Duration::from_secs(self.poll_interval_secs)
        } else {
            DEFAULT_WAIT_INTERVAL
        }
    }

    /// Delay after a failed poll, never longer than the wait interval.
    pub fn retry_interval(&self) -> Duration {
        DEFAULT_RETRY_INTERVAL.min(self.wait_interval())
    }
}

fn parse_var<T: std::str::FromStr>(name: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        name,
        value: value.to_string(),
    })
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A required field is empty.
    #[error("missing required config: {0}")]
    Missing(&'static str),

    /// A limit is out of range.
    #[error("invalid limit: {0}")]
    InvalidLimit(String),

    /// An environment value could not be parsed.
    #[error("invalid value for {name}: {value:?}")]
    InvalidValue {
        /// Variable name
        name: &'static str,
        /// Raw value
        value: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = AcceptConfig::default();
        assert_eq!(config.max_concurrent_verifications, 10);
        assert_eq!(config.max_cached_keys, 500);
        assert_eq!(config.max_sign_age_secs, 600);
        assert_eq!(config.queue_capacity, 10);
        assert!(!config.tolerant_mode);
    }

    #[test]
    fn test_validate_requires_identity() {
        assert_eq!(
            AcceptConfig::default().validate(),
            Err(ConfigError::Missing("identifier"))
        );
        assert_eq!(
            AcceptConfig::new("router", "").validate(),
            Err(ConfigError::Missing("mpcInitiatorAccount"))
        );
        assert!(AcceptConfig::new("router", "0xinit").validate().is_ok());
    }

    #[test]
    fn test_validate_limits() {
        let mut config = AcceptConfig::new("router", "0xinit");
        config.max_concurrent_verifications = 0;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidLimit(_))));
    }

    #[test]
    fn test_intervals() {
        let mut config = AcceptConfig::default();
        assert_eq!(config.wait_interval(), Duration::from_secs(5));
        assert_eq!(config.retry_interval(), Duration::from_secs(3));

        config.poll_interval_secs = 1;
        assert_eq!(config.wait_interval(), Duration::from_secs(1));
        assert_eq!(config.retry_interval(), Duration::from_secs(1));

        config.poll_interval_secs = 20;
        assert_eq!(config.retry_interval(), Duration::from_secs(3));
    }

    #[test]
    fn test_from_lookup() {
        let vars: HashMap<&str, &str> = [
            ("ROUTER_ACCEPT_IDENTIFIER", "router-testnet"),
            ("ROUTER_ACCEPT_MPC_INITIATOR", "0xinit"),
            ("ROUTER_ACCEPT_TOLERANT_MODE", "true"),
            ("ROUTER_ACCEPT_MAX_CONCURRENT", "4"),
        ]
        .into_iter()
        .collect();

        let config = AcceptConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(config.identifier, "router-testnet");
        assert!(config.tolerant_mode);
        assert_eq!(config.max_concurrent_verifications, 4);
        assert_eq!(config.max_cached_keys, 500);
    }

    #[test]
    fn test_from_lookup_rejects_bad_number() {
        let result = AcceptConfig::from_lookup(|k| {
            (k == "ROUTER_ACCEPT_MAX_CACHED_KEYS").then(|| "lots".to_string())
        });
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn test_deserialize_partial() {
        let json = r#"{"identifier":"r","mpcInitiatorAccount":"0x1","tolerantMode":true}"#;
        let config: AcceptConfig = serde_json::from_str(json).unwrap();
        assert!(config.tolerant_mode);
        assert_eq!(config.max_concurrent_verifications, 10);
    }
}
