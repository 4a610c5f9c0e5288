//! Keepalive Timer
//!
//! Keeps an idle connection alive by sending a `ping` once no frame has been
//! received for a full period. Every inbound frame pushes the deadline back,
//! so a busy stream never pings.
//!
//! The timer is owned by the session loop and polled inside its `select!`:
//!
//! ```rust,no_run
//! use okotoki_stream_client::infrastructure::okotoki::keepalive::{
//!     KeepaliveConfig, KeepaliveTimer,
//! };
//!
//! async fn example() {
//!     let mut keepalive = KeepaliveTimer::new(KeepaliveConfig::default());
//!     keepalive.start();
//!
//!     loop {
//!         tokio::select! {
//!             () = keepalive.expired() => {
//!                 // send ping
//!                 keepalive.reset();
//!             }
//!         }
//!     }
//! }
//! ```

use std::time::Duration;

use tokio::time::{Instant, sleep_until};

/// Shortest accepted interval. Anything below is raised to this.
pub const MIN_KEEPALIVE_INTERVAL: Duration = Duration::from_secs(1);

/// Configuration for keepalive behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeepaliveConfig {
    /// Idle time after which a ping is sent.
    pub interval: Duration,
}

impl Default for KeepaliveConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
        }
    }
}

impl KeepaliveConfig {
    /// Create a new configuration with a custom interval, raised to
    /// [`MIN_KEEPALIVE_INTERVAL`] if shorter.
    #[must_use]
    pub const fn new(interval: Duration) -> Self {
        let interval = if interval.as_nanos() < MIN_KEEPALIVE_INTERVAL.as_nanos() {
            MIN_KEEPALIVE_INTERVAL
        } else {
            interval
        };
        Self { interval }
    }
}

/// Restartable idle timer.
#[derive(Debug)]
pub struct KeepaliveTimer {
    config: KeepaliveConfig,
    deadline: Option<Instant>,
}

impl KeepaliveTimer {
    /// Create a stopped timer.
    #[must_use]
    pub const fn new(config: KeepaliveConfig) -> Self {
        Self {
            config,
            deadline: None,
        }
    }

    /// Arm the timer for one full interval from now.
    pub fn start(&mut self) {
        self.deadline = Some(Instant::now() + self.interval());
    }

    /// Restart the countdown. Same as [`start`](Self::start); named for the
    /// inbound-frame call site.
    pub fn reset(&mut self) {
        self.start();
    }

    /// Disarm the timer.
    pub const fn stop(&mut self) {
        self.deadline = None;
    }

    /// Check if the timer is armed.
    #[must_use]
    pub const fn is_running(&self) -> bool {
        self.deadline.is_some()
    }

    /// Get the effective interval.
    #[must_use]
    pub fn interval(&self) -> Duration {
        self.config.interval.max(MIN_KEEPALIVE_INTERVAL)
    }

    /// Resolve when the deadline passes. Pending forever while stopped.
    ///
    /// Cancel-safe: dropping the future leaves the deadline untouched.
    pub async fn expired(&self) {
        match self.deadline {
            Some(deadline) => sleep_until(deadline).await,
            None => std::future::pending().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timer(secs: u64) -> KeepaliveTimer {
        KeepaliveTimer::new(KeepaliveConfig::new(Duration::from_secs(secs)))
    }

    #[test]
    fn default_interval_is_one_minute() {
        assert_eq!(KeepaliveConfig::default().interval, Duration::from_secs(60));
    }

    #[test]
    fn start_and_stop() {
        let mut keepalive = timer(60);
        assert!(!keepalive.is_running());

        keepalive.start();
        assert!(keepalive.is_running());

        keepalive.stop();
        assert!(!keepalive.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn fires_after_interval() {
        let mut keepalive = timer(60);
        keepalive.start();

        let started = Instant::now();
        keepalive.expired().await;
        assert_eq!(started.elapsed(), Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn reset_pushes_deadline_back() {
        let mut keepalive = timer(60);
        keepalive.start();

        tokio::time::advance(Duration::from_secs(59)).await;
        keepalive.reset();

        let fired = tokio::time::timeout(Duration::from_secs(59), keepalive.expired()).await;
        assert!(fired.is_err(), "reset timer must not fire early");

        keepalive.expired().await;
    }

    #[test]
    fn zero_interval_is_raised_to_minimum() {
        assert_eq!(KeepaliveConfig::new(Duration::ZERO).interval, MIN_KEEPALIVE_INTERVAL);

        let literal = KeepaliveTimer::new(KeepaliveConfig {
            interval: Duration::ZERO,
        });
        assert_eq!(literal.interval(), MIN_KEEPALIVE_INTERVAL);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_interval_does_not_fire_immediately() {
        let mut keepalive = KeepaliveTimer::new(KeepaliveConfig::new(Duration::ZERO));
        keepalive.start();

        let started = Instant::now();
        keepalive.expired().await;
        assert_eq!(started.elapsed(), MIN_KEEPALIVE_INTERVAL);
    }

    #[tokio::test(start_paused = true)]
    async fn stopped_timer_never_fires() {
        let keepalive = timer(1);
        let fired = tokio::time::timeout(Duration::from_secs(3600), keepalive.expired()).await;
        assert!(fired.is_err());
    }
}
