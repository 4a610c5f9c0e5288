//! Reconnection Policy
//!
//! Exponential backoff with jitter between socket connection attempts. The
//! delay starts at the minimum, grows by a fixed factor per failed attempt and
//! is capped at the maximum.

use std::time::Duration;

use rand::Rng;

use crate::infrastructure::config::TransportSettings;

/// Backoff bounds for the socket task.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// First delay after a lost socket.
    pub min_delay: Duration,
    /// Ceiling for the grown delay.
    pub max_delay: Duration,
    /// Growth per failed attempt.
    pub growth_factor: f64,
    /// Random spread around each delay, as a fraction of it.
    pub jitter_factor: f64,
    /// Attempts allowed between successful connections (0 = unlimited).
    pub max_retries: u32,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            min_delay: Duration::from_millis(4000),
            max_delay: Duration::from_millis(10_000),
            growth_factor: 1.3,
            jitter_factor: 0.1,
            max_retries: 0, // Unlimited
        }
    }
}

impl ReconnectConfig {
    /// Create configuration from `TransportSettings`.
    #[must_use]
    pub fn from_transport_settings(settings: &TransportSettings) -> Self {
        Self {
            min_delay: settings.min_reconnect_delay,
            max_delay: settings.max_reconnect_delay,
            max_retries: settings.max_retries,
            ..Self::default()
        }
    }
}

/// Backoff state between connection attempts. [`reset`](Self::reset) after
/// every socket that opens.
#[derive(Debug)]
pub struct ReconnectPolicy {
    config: ReconnectConfig,
    current_delay: Duration,
    attempt_count: u32,
}

impl ReconnectPolicy {
    #[must_use]
    pub const fn new(config: ReconnectConfig) -> Self {
        let min_delay = config.min_delay;
        Self {
            config,
            current_delay: min_delay,
            attempt_count: 0,
        }
    }

    /// Delay before the next attempt, or `None` once the retry budget is
    /// spent.
    #[must_use]
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.config.max_retries > 0 && self.attempt_count >= self.config.max_retries {
            return None;
        }

        self.attempt_count += 1;

        let delay_with_jitter = self.apply_jitter(self.current_delay);

        #[allow(clippy::cast_precision_loss)]
        let scaled = (self.current_delay.as_millis() as f64 * self.config.growth_factor).round();
        let next_millis = if scaled.is_finite() && scaled > 0.0 {
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            {
                scaled as u128
            }
        } else {
            0
        };
        let capped = next_millis.min(self.config.max_delay.as_millis());
        self.current_delay = Duration::from_millis(u64::try_from(capped).unwrap_or(u64::MAX));

        Some(delay_with_jitter)
    }

    /// Start over from the minimum delay.
    pub const fn reset(&mut self) {
        self.current_delay = self.config.min_delay;
        self.attempt_count = 0;
    }

    /// Attempts since the last reset.
    #[must_use]
    pub const fn attempt_count(&self) -> u32 {
        self.attempt_count
    }

    fn apply_jitter(&self, duration: Duration) -> Duration {
        if self.config.jitter_factor <= 0.0 {
            return duration;
        }

        #[allow(clippy::cast_precision_loss)]
        let base_millis = duration.as_millis() as f64;
        let jitter_range = base_millis * self.config.jitter_factor;
        let jitter: f64 = rand::rng().random_range(-jitter_range..=jitter_range);
        let adjusted_millis = (base_millis + jitter).max(1.0);

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        Duration::from_millis(adjusted_millis as u64)
    }
}

/// Error type for reconnection failures.
#[derive(Debug, thiserror::Error)]
pub enum ReconnectError {
    /// Retry budget spent.
    #[error("maximum reconnection attempts ({0}) exceeded")]
    RetriesExhausted(u32),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_jitter(max_retries: u32) -> ReconnectConfig {
        ReconnectConfig {
            jitter_factor: 0.0,
            max_retries,
            ..ReconnectConfig::default()
        }
    }

    #[test]
    fn takes_bounds_from_transport_settings() {
        let settings = TransportSettings {
            min_reconnect_delay: Duration::from_millis(100),
            max_reconnect_delay: Duration::from_millis(500),
            max_retries: 7,
            ..TransportSettings::default()
        };
        let config = ReconnectConfig::from_transport_settings(&settings);
        assert_eq!(config.min_delay, Duration::from_millis(100));
        assert_eq!(config.max_delay, Duration::from_millis(500));
        assert_eq!(config.max_retries, 7);
    }

    #[test]
    fn delay_grows_then_caps() {
        let mut policy = ReconnectPolicy::new(no_jitter(0));

        let delays: Vec<u128> = (0..6)
            .map(|_| policy.next_delay().unwrap().as_millis())
            .collect();
        assert_eq!(delays, vec![4000, 5200, 6760, 8788, 10_000, 10_000]);
    }

    #[test]
    fn budget_runs_out_until_reset() {
        let mut policy = ReconnectPolicy::new(no_jitter(2));
        assert!(policy.next_delay().is_some());
        assert!(policy.next_delay().is_some());
        assert!(policy.next_delay().is_none());
        assert_eq!(policy.attempt_count(), 2);

        policy.reset();
        assert_eq!(policy.next_delay(), Some(Duration::from_millis(4000)));
    }

    #[test]
    fn jitter_stays_within_ten_percent() {
        for _ in 0..100 {
            let mut policy = ReconnectPolicy::new(ReconnectConfig::default());
            let millis = policy.next_delay().unwrap().as_millis();
            assert!((3600..=4400).contains(&millis), "delay {millis}ms out of bounds");
        }
    }
}
