//! Time utilities for authflow
//!
//! All unconditional waits in the login flow go through a [`Clock`] so tests
//! can run the retry loops without sleeping.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

/// Get current timestamp in milliseconds since Unix epoch
pub fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Get current timestamp in whole seconds since Unix epoch
pub fn now_secs() -> u64 {
    now_ms() / 1000
}

/// Source of delays
#[async_trait]
pub trait Clock: Send + Sync {
    /// Suspend for the given duration.
    async fn sleep(&self, duration: Duration);
}

/// Real clock backed by tokio timers
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioClock;

#[async_trait]
impl Clock for TokioClock {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Clock that returns immediately and records every requested sleep
#[derive(Debug, Default)]
pub struct ManualClock {
    sleeps: Mutex<Vec<Duration>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every sleep requested so far, in order
    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().map(|s| s.clone()).unwrap_or_default()
    }

    /// Number of sleeps of exactly this length
    pub fn count(&self, duration: Duration) -> usize {
        self.sleeps().iter().filter(|d| **d == duration).count()
    }

    /// Total simulated time elapsed
    pub fn elapsed(&self) -> Duration {
        self.sleeps().iter().sum()
    }
}

#[async_trait]
impl Clock for ManualClock {
    async fn sleep(&self, duration: Duration) {
        if let Ok(mut sleeps) = self.sleeps.lock() {
            sleeps.push(duration);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_now_ms_returns_reasonable_timestamp() {
        let ts = now_ms();
        // Should be after 2024-01-01
        assert!(ts > 1_704_067_200_000);
    }

    #[test]
    fn test_now_secs_matches_ms() {
        let secs = now_secs();
        let ms = now_ms();
        assert!(ms / 1000 >= secs);
        assert!(ms / 1000 - secs <= 1);
    }

    #[tokio::test]
    async fn test_manual_clock_records() {
        let clock = ManualClock::new();
        clock.sleep(Duration::from_secs(1)).await;
        clock.sleep(Duration::from_millis(500)).await;
        clock.sleep(Duration::from_secs(1)).await;
        assert_eq!(clock.count(Duration::from_secs(1)), 2);
        assert_eq!(clock.elapsed(), Duration::from_millis(2500));
    }

    #[tokio::test]
    async fn test_tokio_clock_sleeps() {
        let start = std::time::Instant::now();
        TokioClock.sleep(Duration::from_millis(5)).await;
        assert!(start.elapsed() >= Duration::from_millis(5));
    }
}
