//! Client configuration.

use std::time::Duration;

/// Configuration for a [`crate::Client`].
#[derive(Debug, Clone)]
pub struct Config {
    /// Interval for periodic sync (`Duration::ZERO` disables the scheduler).
    pub sync_interval: Duration,
    /// Retry configuration for adapter calls.
    pub retry: RetryConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sync_interval: Duration::from_secs(30),
            retry: RetryConfig::default(),
        }
    }
}

impl Config {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the periodic sync interval.
    #[must_use]
    pub const fn sync_interval(mut self, interval: Duration) -> Self {
        self.sync_interval = interval;
        self
    }

    /// Disables periodic sync; changes are persisted only by `sync` and `close`.
    #[must_use]
    pub const fn manual_sync(mut self) -> Self {
        self.sync_interval = Duration::ZERO;
        self
    }

    /// Sets the maximum number of retries after the first attempt.
    #[must_use]
    pub const fn max_retries(mut self, retries: u32) -> Self {
        self.retry.max_retries = retries;
        self
    }

    /// Sets the base backoff interval.
    #[must_use]
    pub const fn retry_interval(mut self, interval: Duration) -> Self {
        self.retry.retry_interval = interval;
        self
    }

    /// Sets the retry configuration.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Returns true if a background scheduler should run.
    pub fn scheduler_enabled(&self) -> bool {
        !self.sync_interval.is_zero()
    }
}

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retries after the first attempt.
    pub max_retries: u32,
    /// Base delay; doubled after every failed attempt.
    pub retry_interval: Duration,
    /// Ceiling for a single backoff delay.
    pub max_backoff: Duration,
}

impl RetryConfig {
    /// Creates a new retry configuration.
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            retry_interval: Duration::from_millis(100),
            max_backoff: Duration::from_secs(2),
        }
    }

    /// Creates a configuration with a single attempt and no delay.
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            retry_interval: Duration::ZERO,
            max_backoff: Duration::ZERO,
        }
    }

    /// Sets the base delay.
    pub fn with_retry_interval(mut self, delay: Duration) -> Self {
        self.retry_interval = delay;
        self
    }

    /// Sets the maximum delay.
    pub fn with_max_backoff(mut self, delay: Duration) -> Self {
        self.max_backoff = delay;
        self
    }

    /// Total number of attempts, including the first one.
    pub fn total_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Delay to wait after the failed attempt `attempt` (0-indexed).
    pub fn delay_after_attempt(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.retry_interval
            .saturating_mul(factor)
            .min(self.max_backoff)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::new(3)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = Config::default();
        assert_eq!(config.sync_interval, Duration::from_secs(30));
        assert_eq!(config.retry.max_retries, 3);
        assert!(config.scheduler_enabled());
    }

    #[test]
    fn builder_pattern() {
        let config = Config::new()
            .manual_sync()
            .max_retries(0)
            .retry_interval(Duration::from_millis(5));

        assert!(!config.scheduler_enabled());
        assert_eq!(config.retry.total_attempts(), 1);
        assert_eq!(config.retry.retry_interval, Duration::from_millis(5));
    }

    #[test]
    fn backoff_doubles_until_cap() {
        let retry = RetryConfig::new(10)
            .with_retry_interval(Duration::from_millis(100))
            .with_max_backoff(Duration::from_secs(2));

        assert_eq!(retry.delay_after_attempt(0), Duration::from_millis(100));
        assert_eq!(retry.delay_after_attempt(1), Duration::from_millis(200));
        assert_eq!(retry.delay_after_attempt(3), Duration::from_millis(800));
        assert_eq!(retry.delay_after_attempt(5), Duration::from_secs(2));
        assert_eq!(retry.delay_after_attempt(40), Duration::from_secs(2));
    }

    #[test]
    fn no_retry_has_no_delay() {
        let retry = RetryConfig::no_retry();
        assert_eq!(retry.total_attempts(), 1);
        assert_eq!(retry.delay_after_attempt(0), Duration::ZERO);
    }
}
