//! Configuration for the dispatch engine.

use crate::classify::THROUGHPUT_EXCEEDED;
use crate::error::DispatchError;
use std::time::Duration;

/// Configuration for dispatching mutations.
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Retry configuration.
    pub retry: RetryConfig,
    /// Backend error codes that signal a transient capacity condition.
    pub retryable_error_types: Vec<String>,
    /// Label of the callback queue delegate notifications run on.
    pub callback_queue_label: String,
}

impl DispatchConfig {
    /// Creates a new dispatch configuration with default settings.
    pub fn new() -> Self {
        Self {
            retry: RetryConfig::default(),
            retryable_error_types: vec![THROUGHPUT_EXCEEDED.to_string()],
            callback_queue_label: "mutsync.callbacks".to_string(),
        }
    }

    /// Sets the retry configuration.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Adds a backend error code that should be retried.
    pub fn with_retryable_error_type(mut self, error_type: impl Into<String>) -> Self {
        self.retryable_error_types.push(error_type.into());
        self
    }

    /// Sets the callback queue label.
    pub fn with_callback_queue_label(mut self, label: impl Into<String>) -> Self {
        self.callback_queue_label = label.into();
        self
    }

    /// Retry predicate using the configured capacity codes.
    ///
    /// Client-family errors always retry, whatever the error type. Otherwise
    /// only a configured capacity code retries.
    pub fn should_retry(&self, error_type: Option<&str>, error: Option<&DispatchError>) -> bool {
        if error.is_some_and(DispatchError::is_client_error) {
            return true;
        }

        match error_type {
            Some(error_type) => self.retryable_error_types.iter().any(|t| t == error_type),
            None => false,
        }
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts, `None` for no cap.
    pub max_attempts: Option<u32>,
    /// Delay before the first retry.
    pub delay: Duration,
    /// Maximum delay between retries.
    pub max_delay: Duration,
    /// Multiplier applied to the delay for each further retry.
    pub backoff_multiplier: f64,
}

impl RetryConfig {
    /// Creates an uncapped configuration with a fixed delay.
    pub fn fixed(delay: Duration) -> Self {
        Self {
            max_attempts: None,
            delay,
            max_delay: delay,
            backoff_multiplier: 1.0,
        }
    }

    /// Creates a configuration with no retries.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: Some(1),
            delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            backoff_multiplier: 1.0,
        }
    }

    /// Caps the number of attempts.
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = Some(attempts.max(1));
        self
    }

    /// Sets the delay before the first retry.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        if self.max_delay < delay {
            self.max_delay = delay;
        }
        self
    }

    /// Sets the maximum delay.
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Sets the backoff multiplier.
    pub fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier.max(1.0);
        self
    }

    /// Returns true if another attempt may follow `attempts` completed ones.
    pub fn allows_attempt(&self, attempts: u32) -> bool {
        self.max_attempts.map_or(true, |max| attempts < max)
    }

    /// Calculates the delay before the given retry (1-indexed).
    pub fn delay_for_retry(&self, retry: u32) -> Duration {
        if retry == 0 {
            return Duration::ZERO;
        }

        let exponent = retry.saturating_sub(1).min(i32::MAX as u32) as i32;
        let delay_secs = self.delay.as_secs_f64() * self.backoff_multiplier.powi(exponent);

        // Durations near `Duration::MAX` do not survive the f64 round trip
        Duration::try_from_secs_f64(delay_secs.min(self.max_delay.as_secs_f64()))
            .unwrap_or(self.max_delay)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::fixed(Duration::from_secs(1))
    }
}
