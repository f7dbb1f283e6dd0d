//! Retry policy configuration for tasks.
//!
//! Supports fixed delay retry with configurable max attempts. Failures of
//! required tasks are never retried by the requester; the failed task already
//! applied its own policy.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::task::TaskError;

/// Retry policy for a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Maximum number of retry attempts, not including the initial attempt (0 = no retries).
    /// For example, `max_attempts = 3` means up to 3 retries after the initial failure,
    /// for a total of 4 attempts (1 initial + 3 retries).
    pub max_attempts: u32,

    /// Fixed delay between retry attempts.
    #[serde(rename = "delay_ms", with = "serde_millis")]
    pub delay: Duration,

    /// Condition for when to retry.
    pub retry_on: RetryCondition,
}

/// Conditions under which a task should be retried.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryCondition {
    /// Retry on any error.
    #[default]
    Always,

    /// Retry only on transient errors (network hiccups, timeouts).
    TransientOnly,

    /// Never retry, regardless of max_attempts.
    Never,
}

impl RetryPolicy {
    /// Create a policy with no retries.
    pub fn none() -> Self {
        Self {
            max_attempts: 0,
            delay: Duration::ZERO,
            retry_on: RetryCondition::Never,
        }
    }

    /// Create a policy with fixed delay retries.
    ///
    /// # Arguments
    /// * `max_attempts` - Maximum retry attempts (not including initial try)
    /// * `delay` - Fixed delay between retries
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
            retry_on: RetryCondition::Always,
        }
    }

    /// Builder: set the retry condition.
    pub fn with_condition(mut self, condition: RetryCondition) -> Self {
        self.retry_on = condition;
        self
    }

    /// Check if retries are enabled.
    pub fn is_enabled(&self) -> bool {
        self.max_attempts > 0 && self.retry_on != RetryCondition::Never
    }

    /// Check if we should retry given the number of attempts already made.
    pub fn should_retry(&self, attempts: u32) -> bool {
        if self.retry_on == RetryCondition::Never {
            return false;
        }
        attempts <= self.max_attempts
    }

    /// Check if `err`, raised by attempt number `attempts`, warrants another try.
    pub fn should_retry_error(&self, attempts: u32, err: &TaskError) -> bool {
        if matches!(err, TaskError::Upstream(_)) || !self.should_retry(attempts) {
            return false;
        }
        match self.retry_on {
            RetryCondition::Always => true,
            RetryCondition::TransientOnly => err.is_transient(),
            RetryCondition::Never => false,
        }
    }

    /// Get the delay before the next retry.
    pub fn get_delay(&self) -> Duration {
        self.delay
    }
}

impl Default for RetryPolicy {
    /// Default policy: no retries.
    fn default() -> Self {
        Self::none()
    }
}

/// Serializes Duration as whole milliseconds.
mod serde_millis {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        (duration.as_millis() as u64).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
