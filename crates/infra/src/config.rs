//! Engine configuration.
//!
//! Values come from `HOLDFAST_*` environment variables, falling back to the
//! defaults below.

use std::path::PathBuf;
use std::time::Duration as StdDuration;

use chrono::Duration;
use thiserror::Error;

use holdfast_events::MAX_SUBSCRIBER_CAPACITY;

pub const ENV_SWEEP_INTERVAL_MS: &str = "HOLDFAST_SWEEP_INTERVAL_MS";
pub const ENV_SWEEP_BATCH_LIMIT: &str = "HOLDFAST_SWEEP_BATCH_LIMIT";
pub const ENV_DEFAULT_TTL_SECS: &str = "HOLDFAST_DEFAULT_TTL_SECS";
pub const ENV_MAX_TTL_SECS: &str = "HOLDFAST_MAX_TTL_SECS";
pub const ENV_SUBSCRIBER_CAPACITY: &str = "HOLDFAST_SUBSCRIBER_CAPACITY";
pub const ENV_COMMIT_STRIPES: &str = "HOLDFAST_COMMIT_STRIPES";
pub const ENV_INVENTORY: &str = "HOLDFAST_INVENTORY";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{key}={value:?} is invalid: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },

    #[error("inconsistent configuration: {0}")]
    Inconsistent(String),
}

/// Runtime settings for the reservation engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Pause between expiry sweeps. An elapsed hold is reclaimed at most one
    /// interval after its expiry.
    pub sweep_interval: StdDuration,
    /// Maximum holds reclaimed per sweep cycle.
    pub sweep_batch_limit: usize,
    /// Hold length used when a caller does not ask for one.
    pub default_ttl: Duration,
    /// Longest hold a single reserve or extend may establish.
    pub max_ttl: Duration,
    /// Pending events buffered per subscriber before the oldest are dropped.
    pub subscriber_capacity: usize,
    /// Number of per-unit commit stripes sequencing commit and publish.
    pub commit_stripes: usize,
    /// Seed file loaded at startup.
    pub inventory_path: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sweep_interval: StdDuration::from_secs(1),
            sweep_batch_limit: 500,
            default_ttl: Duration::hours(48),
            max_ttl: Duration::days(7),
            subscriber_capacity: 1024,
            commit_stripes: 64,
            inventory_path: None,
        }
    }
}

impl EngineConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through `lookup` (environment-like key/value source).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(ms) = parse_u64(&lookup, ENV_SWEEP_INTERVAL_MS)? {
            config.sweep_interval = StdDuration::from_millis(ms);
        }
        if let Some(limit) = parse_u64(&lookup, ENV_SWEEP_BATCH_LIMIT)? {
            config.sweep_batch_limit = limit as usize;
        }
        if let Some(secs) = parse_u64(&lookup, ENV_DEFAULT_TTL_SECS)? {
            config.default_ttl = seconds(ENV_DEFAULT_TTL_SECS, secs)?;
        }
        if let Some(secs) = parse_u64(&lookup, ENV_MAX_TTL_SECS)? {
            config.max_ttl = seconds(ENV_MAX_TTL_SECS, secs)?;
        }
        if let Some(capacity) = parse_u64(&lookup, ENV_SUBSCRIBER_CAPACITY)? {
            config.subscriber_capacity = capacity as usize;
        }
        if let Some(stripes) = parse_u64(&lookup, ENV_COMMIT_STRIPES)? {
            config.commit_stripes = stripes as usize;
        }
        if let Some(path) = lookup(ENV_INVENTORY).filter(|p| !p.trim().is_empty()) {
            config.inventory_path = Some(PathBuf::from(path));
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sweep_interval.is_zero() {
            return Err(ConfigError::Inconsistent(
                "sweep interval must be positive".to_string(),
            ));
        }
        if self.sweep_batch_limit == 0 {
            return Err(ConfigError::Inconsistent(
                "sweep batch limit must be positive".to_string(),
            ));
        }
        if self.default_ttl <= Duration::zero() || self.max_ttl <= Duration::zero() {
            return Err(ConfigError::Inconsistent("ttls must be positive".to_string()));
        }
        if self.default_ttl > self.max_ttl {
            return Err(ConfigError::Inconsistent(format!(
                "default ttl ({}s) exceeds max ttl ({}s)",
                self.default_ttl.num_seconds(),
                self.max_ttl.num_seconds()
            )));
        }
        if self.subscriber_capacity == 0 || self.commit_stripes == 0 {
            return Err(ConfigError::Inconsistent(
                "subscriber capacity and commit stripes must be positive".to_string(),
            ));
        }
        if self.subscriber_capacity > MAX_SUBSCRIBER_CAPACITY {
            return Err(ConfigError::Inconsistent(format!(
                "subscriber capacity exceeds {MAX_SUBSCRIBER_CAPACITY}"
            )));
        }
        Ok(())
    }

    pub fn with_sweep_interval(mut self, interval: StdDuration) -> Self {
        self.sweep_interval = interval;
        self
    }

    pub fn with_sweep_batch_limit(mut self, limit: usize) -> Self {
        self.sweep_batch_limit = limit;
        self
    }

    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    pub fn with_max_ttl(mut self, ttl: Duration) -> Self {
        self.max_ttl = ttl;
        self
    }

    pub fn with_subscriber_capacity(mut self, capacity: usize) -> Self {
        self.subscriber_capacity = capacity;
        self
    }

    pub fn with_commit_stripes(mut self, stripes: usize) -> Self {
        self.commit_stripes = stripes;
        self
    }

    pub fn with_inventory_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.inventory_path = Some(path.into());
        self
    }
}

fn parse_u64<F>(lookup: &F, key: &'static str) -> Result<Option<u64>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|e| ConfigError::Invalid {
                key,
                value: raw.clone(),
                reason: e.to_string(),
            }),
    }
}

fn seconds(key: &'static str, secs: u64) -> Result<Duration, ConfigError> {
    i64::try_from(secs)
        .ok()
        .and_then(Duration::try_seconds)
        .ok_or_else(|| ConfigError::Invalid {
            key,
            value: secs.to_string(),
            reason: "out of range".to_string(),
        })
}
