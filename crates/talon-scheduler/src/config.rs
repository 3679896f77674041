//! Scheduler configuration.

use std::time::Duration;
use thiserror::Error;

/// Shortest accepted scheduler poll interval.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_secs(1);
/// Longest accepted scheduler poll interval.
pub const MAX_POLL_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("poll interval {actual:?} must be between {min:?} and {max:?}")]
    PollIntervalOutOfRange {
        actual: Duration,
        min: Duration,
        max: Duration,
    },

    #[error("disconnect timeout must be greater than zero")]
    ZeroDisconnectTimeout,
}

/// Validated settings for the scheduler loop.
///
/// Built once at startup and handed to the [`crate::Scheduler`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    poll_interval: Duration,
    disconnect_timeout: Duration,
}

impl SchedulerConfig {
    pub fn new(poll_interval: Duration, disconnect_timeout: Duration) -> Result<Self, ConfigError> {
        if !(MIN_POLL_INTERVAL..=MAX_POLL_INTERVAL).contains(&poll_interval) {
            return Err(ConfigError::PollIntervalOutOfRange {
                actual: poll_interval,
                min: MIN_POLL_INTERVAL,
                max: MAX_POLL_INTERVAL,
            });
        }
        if disconnect_timeout.is_zero() {
            return Err(ConfigError::ZeroDisconnectTimeout);
        }
        Ok(Self {
            poll_interval,
            disconnect_timeout,
        })
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub fn disconnect_timeout(&self) -> Duration {
        self.disconnect_timeout
    }
}
