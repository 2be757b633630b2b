//! Pool, queue and scheduler configuration structures.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Resource pool configuration.
///
/// All durations are milliseconds so the struct maps one-to-one onto JSON and
/// environment variables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Resources created eagerly and kept through idle eviction.
    pub min_size: usize,
    /// Hard ceiling on allocated resources.
    pub max_size: usize,
    /// How long a resource may sit idle before eviction (above `min_size`).
    pub idle_timeout_ms: u64,
    /// How long `acquire` waits before failing with a timeout.
    pub acquire_timeout_ms: u64,
    /// Period of the background idle reaper.
    pub reap_interval_ms: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            min_size: 8,
            max_size: 20,
            idle_timeout_ms: 15_000,
            acquire_timeout_ms: 2_000,
            reap_interval_ms: 1_000,
        }
    }
}

impl PoolConfig {
    /// Configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the minimum pool size.
    #[must_use]
    pub const fn with_min_size(mut self, min_size: usize) -> Self {
        self.min_size = min_size;
        self
    }

    /// Set the maximum pool size.
    #[must_use]
    pub const fn with_max_size(mut self, max_size: usize) -> Self {
        self.max_size = max_size;
        self
    }

    /// Set the idle timeout.
    #[must_use]
    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout_ms = duration_ms(timeout);
        self
    }

    /// Set the acquire timeout.
    #[must_use]
    pub fn with_acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout_ms = duration_ms(timeout);
        self
    }

    /// Set the reaper interval.
    #[must_use]
    pub fn with_reap_interval(mut self, interval: Duration) -> Self {
        self.reap_interval_ms = duration_ms(interval);
        self
    }

    /// Idle timeout as a `Duration`.
    #[must_use]
    pub const fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }

    /// Acquire timeout as a `Duration`.
    #[must_use]
    pub const fn acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.acquire_timeout_ms)
    }

    /// Reaper interval as a `Duration`.
    #[must_use]
    pub const fn reap_interval(&self) -> Duration {
        Duration::from_millis(self.reap_interval_ms)
    }

    /// Validate pool configuration values.
    ///
    /// # Errors
    ///
    /// Returns a description of the first invalid value.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_size == 0 {
            return Err("max_size must be greater than 0".into());
        }
        if self.min_size > self.max_size {
            return Err(format!(
                "min_size ({}) must not exceed max_size ({})",
                self.min_size, self.max_size
            ));
        }
        if self.acquire_timeout_ms == 0 {
            return Err("acquire_timeout_ms must be greater than 0".into());
        }
        if self.idle_timeout_ms == 0 {
            return Err("idle_timeout_ms must be greater than 0".into());
        }
        if self.reap_interval_ms == 0 {
            return Err("reap_interval_ms must be greater than 0".into());
        }
        Ok(())
    }

    /// Load from `POOL_*` environment variables, after reading a `.env` file
    /// if one exists. Unset variables keep their defaults.
    ///
    /// Recognized: `POOL_MIN_SIZE`, `POOL_MAX_SIZE`, `POOL_IDLE_TIMEOUT_MS`,
    /// `POOL_ACQUIRE_TIMEOUT_MS`, `POOL_REAP_INTERVAL_MS`.
    ///
    /// # Errors
    ///
    /// Returns an error for unparsable values or an invalid result.
    pub fn from_env() -> Result<Self, String> {
        // A missing .env file is fine; the process environment still applies.
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup using the `POOL_*` names.
    ///
    /// # Errors
    ///
    /// Returns an error for unparsable values or an invalid result.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, String> {
        fn parse<T: std::str::FromStr>(
            lookup: &impl Fn(&str) -> Option<String>,
            key: &str,
            target: &mut T,
        ) -> Result<(), String>
        where
            T::Err: std::fmt::Display,
        {
            if let Some(raw) = lookup(key) {
                *target = raw
                    .trim()
                    .parse()
                    .map_err(|e| format!("{key}: invalid value `{raw}`: {e}"))?;
            }
            Ok(())
        }

        let mut cfg = Self::default();
        parse(&lookup, "POOL_MIN_SIZE", &mut cfg.min_size)?;
        parse(&lookup, "POOL_MAX_SIZE", &mut cfg.max_size)?;
        parse(&lookup, "POOL_IDLE_TIMEOUT_MS", &mut cfg.idle_timeout_ms)?;
        parse(&lookup, "POOL_ACQUIRE_TIMEOUT_MS", &mut cfg.acquire_timeout_ms)?;
        parse(&lookup, "POOL_REAP_INTERVAL_MS", &mut cfg.reap_interval_ms)?;
        cfg.validate()?;
        Ok(cfg)
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Task queue configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Maximum tasks in flight at once.
    pub concurrency: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self { concurrency: 1 }
    }
}

impl QueueConfig {
    /// Configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the concurrency limit.
    #[must_use]
    pub const fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Validate queue configuration values.
    ///
    /// # Errors
    ///
    /// Returns a description of the invalid value.
    pub fn validate(&self) -> Result<(), String> {
        if self.concurrency == 0 {
            return Err("concurrency must be greater than 0".into());
        }
        Ok(())
    }
}

/// Root configuration: one pool plus named queues.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Resource pool configuration.
    pub pool: PoolConfig,
    /// Map of queue name to configuration.
    pub queues: HashMap<String, QueueConfig>,
}

impl SchedulerConfig {
    /// Validate the pool and every queue.
    ///
    /// # Errors
    ///
    /// Returns the first validation failure, prefixed with its location.
    pub fn validate(&self) -> Result<(), String> {
        self.pool
            .validate()
            .map_err(|e| format!("pool invalid: {e}"))?;
        for (name, queue) in &self.queues {
            if name.is_empty() {
                return Err("queue names must not be empty".into());
            }
            queue
                .validate()
                .map_err(|e| format!("queue `{name}` invalid: {e}"))?;
        }
        Ok(())
    }

    /// Parse scheduler configuration from a JSON string and validate.
    ///
    /// # Errors
    ///
    /// Returns a parse or validation error message.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self =
            serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }
}
