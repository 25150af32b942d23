//! Engine configuration.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{SyncError, SyncResult};
use crate::reconciliation::ReconciliationConfig;
use crate::sync::RetryPolicy;

const DEFAULT_MAX_RECEIVE_COUNT: u32 = 5;

/// Settings for synchronization and reconciliation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    /// Backoff for mapping-write retries.
    pub retry: RetryPolicy,
    /// Deliveries of one event before it is dead-lettered.
    pub max_receive_count: u32,
    /// Paging and concurrency for report runs.
    pub reconciliation: ReconciliationConfig,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            max_receive_count: DEFAULT_MAX_RECEIVE_COUNT,
            reconciliation: ReconciliationConfig::default(),
        }
    }
}

impl SyncConfig {
    /// Load configuration from environment variables. Every variable is optional.
    ///
    /// - `SYNC_MAPPING_RETRY_MAX_ATTEMPTS`: Mapping retries before dead-lettering (default: 3)
    /// - `SYNC_MAPPING_RETRY_BASE_DELAY_MS`: Base backoff delay (default: 1000)
    /// - `SYNC_MAPPING_RETRY_MAX_DELAY_MS`: Backoff cap (default: 60000)
    /// - `SYNC_MAX_RECEIVE_COUNT`: Deliveries per event (default: 5)
    /// - `RECONCILIATION_PAGE_SIZE`: Keys per population page (default: 10)
    /// - `RECONCILIATION_CONCURRENCY`: Concurrent key calls per page (default: 4)
    pub fn from_env() -> SyncResult<Self> {
        let defaults = Self::default();

        Self::builder()
            .max_attempts(env_or("SYNC_MAPPING_RETRY_MAX_ATTEMPTS", defaults.retry.max_attempts)?)
            .base_delay(Duration::from_millis(env_or(
                "SYNC_MAPPING_RETRY_BASE_DELAY_MS",
                1000u64,
            )?))
            .max_delay(Duration::from_millis(env_or(
                "SYNC_MAPPING_RETRY_MAX_DELAY_MS",
                60_000u64,
            )?))
            .max_receive_count(env_or("SYNC_MAX_RECEIVE_COUNT", defaults.max_receive_count)?)
            .page_size(env_or(
                "RECONCILIATION_PAGE_SIZE",
                defaults.reconciliation.page_size,
            )?)
            .concurrency(env_or(
                "RECONCILIATION_CONCURRENCY",
                defaults.reconciliation.concurrency,
            )?)
            .build()
    }

    /// Create a new configuration builder.
    #[must_use]
    pub fn builder() -> SyncConfigBuilder {
        SyncConfigBuilder::default()
    }
}

fn env_or<T>(var: &str, default: T) -> SyncResult<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(var) {
        Ok(value) => value.trim().parse::<T>().map_err(|e| SyncError::ConfigInvalid {
            var: var.to_string(),
            reason: e.to_string(),
        }),
        Err(_) => Ok(default),
    }
}

/// Builder for `SyncConfig`.
#[derive(Debug, Default)]
pub struct SyncConfigBuilder {
    max_attempts: Option<u32>,
    base_delay: Option<Duration>,
    max_delay: Option<Duration>,
    max_receive_count: Option<u32>,
    page_size: Option<u64>,
    concurrency: Option<usize>,
}

impl SyncConfigBuilder {
    #[must_use]
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = Some(attempts);
        self
    }

    #[must_use]
    pub fn base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = Some(delay);
        self
    }

    #[must_use]
    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = Some(delay);
        self
    }

    #[must_use]
    pub fn max_receive_count(mut self, count: u32) -> Self {
        self.max_receive_count = Some(count);
        self
    }

    #[must_use]
    pub fn page_size(mut self, size: u64) -> Self {
        self.page_size = Some(size);
        self
    }

    #[must_use]
    pub fn concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = Some(concurrency);
        self
    }

    /// Build the configuration, rejecting zero counts and an inverted delay range.
    pub fn build(self) -> SyncResult<SyncConfig> {
        let defaults = SyncConfig::default();

        let retry = RetryPolicy {
            max_attempts: self.max_attempts.unwrap_or(defaults.retry.max_attempts),
            base_delay: self.base_delay.unwrap_or(defaults.retry.base_delay),
            max_delay: self.max_delay.unwrap_or(defaults.retry.max_delay),
        };
        if retry.base_delay > retry.max_delay {
            return Err(invalid(
                "SYNC_MAPPING_RETRY_BASE_DELAY_MS",
                "base delay exceeds max delay",
            ));
        }

        let max_receive_count = self.max_receive_count.unwrap_or(defaults.max_receive_count);
        if max_receive_count == 0 {
            return Err(invalid("SYNC_MAX_RECEIVE_COUNT", "must be at least 1"));
        }

        let reconciliation = ReconciliationConfig {
            page_size: self.page_size.unwrap_or(defaults.reconciliation.page_size),
            concurrency: self
                .concurrency
                .unwrap_or(defaults.reconciliation.concurrency),
        };
        if reconciliation.page_size == 0 {
            return Err(invalid("RECONCILIATION_PAGE_SIZE", "must be at least 1"));
        }
        if reconciliation.concurrency == 0 {
            return Err(invalid("RECONCILIATION_CONCURRENCY", "must be at least 1"));
        }

        Ok(SyncConfig {
            retry,
            max_receive_count,
            reconciliation,
        })
    }
}

fn invalid(var: &str, reason: &str) -> SyncError {
    SyncError::ConfigInvalid {
        var: var.to_string(),
        reason: reason.to_string(),
    }
}
