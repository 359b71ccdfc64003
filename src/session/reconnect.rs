use crate::config::StreamConfig;
use std::time::Duration;

/// How long to wait before reconnecting after a dropped or failed connection.
///
/// The base delay comes from the session's [`StreamingConfig`](super::StreamingConfig);
/// this policy only decides growth and the give-up point.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectPolicy {
    pub exponential_backoff: bool,
    pub max_delay: Duration,
    /// Consecutive failures allowed before giving up, unlimited when `None`
    pub max_attempts: Option<u32>,
}

impl ReconnectPolicy {
    /// Fixed delay, retry forever
    pub fn fixed() -> Self {
        Self {
            exponential_backoff: false,
            max_delay: Duration::from_secs(30),
            max_attempts: None,
        }
    }

    pub fn from_config(config: &StreamConfig) -> Self {
        Self {
            exponential_backoff: config.exponential_backoff,
            max_delay: Duration::from_millis(config.max_backoff_ms),
            max_attempts: config.max_reconnect_attempts,
        }
    }

    /// Delay before reconnect `attempt` (1-based), or `None` once attempts are exhausted
    pub fn delay(&self, base: Duration, attempt: u32) -> Option<Duration> {
        if let Some(max) = self.max_attempts {
            if attempt > max {
                return None;
            }
        }

        if !self.exponential_backoff {
            return Some(base);
        }

        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        let delay = base.saturating_mul(factor);
        Some(delay.min(self.max_delay.max(base)))
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::fixed()
    }
}
