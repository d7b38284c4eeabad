//! Configuration for the client engine.

use std::time::Duration;
use uuid::Uuid;

/// Configuration for sync cycles.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Device identity sent with every push and pull.
    pub device_id: String,
    /// Page size requested on pull.
    pub pull_limit: u32,
    /// Maximum operations per push request.
    pub push_batch_size: usize,
    /// Maximum pages one pull phase may consume before yielding.
    pub max_pull_pages: u32,
    /// Retry behavior for `sync_with_retry`.
    pub retry: RetryConfig,
}

impl SyncConfig {
    /// Creates a configuration for an existing device identity.
    pub fn new(device_id: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            pull_limit: 100,
            push_batch_size: 100,
            max_pull_pages: 64,
            retry: RetryConfig::default(),
        }
    }

    /// Creates a configuration with a freshly generated device identity.
    ///
    /// Callers should persist `device_id` and reuse it; a new identity per
    /// process would fragment the server's per-device cursors.
    pub fn with_generated_device_id() -> Self {
        Self::new(Uuid::new_v4().to_string())
    }

    /// Sets the pull page size.
    pub fn with_pull_limit(mut self, limit: u32) -> Self {
        self.pull_limit = limit;
        self
    }

    /// Sets the push batch size.
    pub fn with_push_batch_size(mut self, size: usize) -> Self {
        self.push_batch_size = size;
        self
    }

    /// Sets the pull page bound.
    pub fn with_max_pull_pages(mut self, pages: u32) -> Self {
        self.max_pull_pages = pages;
        self
    }

    /// Sets the retry configuration.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }
}

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first.
    pub max_attempts: u32,
    /// Delay before the second attempt.
    pub initial_delay: Duration,
    /// Ceiling on the backoff delay.
    pub max_delay: Duration,
    /// Multiplier for exponential backoff.
    pub backoff_multiplier: f64,
}

impl RetryConfig {
    /// Creates a retry configuration.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
        }
    }

    /// Creates a configuration with no retries.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            backoff_multiplier: 1.0,
        }
    }

    /// Sets the initial delay.
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Sets the delay ceiling.
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Calculates the delay before a given attempt (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let base = self.initial_delay.as_secs_f64()
            * self.backoff_multiplier.powi(attempt.saturating_sub(1) as i32);
        Duration::from_secs_f64(base.min(self.max_delay.as_secs_f64()))
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
    fn sync_config_builder() {
        let config = SyncConfig::new("device-1")
            .with_pull_limit(50)
            .with_push_batch_size(25)
            .with_max_pull_pages(8);
        assert_eq!(config.device_id, "device-1");
        assert_eq!(config.pull_limit, 50);
        assert_eq!(config.push_batch_size, 25);
        assert_eq!(config.max_pull_pages, 8);
    }

    #[test]
    fn generated_device_ids_are_unique() {
        let a = SyncConfig::with_generated_device_id();
        let b = SyncConfig::with_generated_device_id();
        assert_ne!(a.device_id, b.device_id);
        assert!(!a.device_id.is_empty());
    }

    #[test]
    fn retry_delay_backoff() {
        let config = RetryConfig::new(5)
            .with_initial_delay(Duration::from_millis(100))
            .with_max_delay(Duration::from_millis(300));
        assert_eq!(config.delay_for_attempt(0), Duration::ZERO);
        assert_eq!(config.delay_for_attempt(1), Duration::from_millis(100));
        assert_eq!(config.delay_for_attempt(2), Duration::from_millis(200));
        // Capped at the ceiling.
        assert_eq!(config.delay_for_attempt(4), Duration::from_millis(300));
    }
}
