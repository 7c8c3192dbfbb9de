use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};

/// Minimum spacing between outbound model calls.
///
/// The lock is held across the wait, so concurrent callers are serialized and
/// no two of them can see the interval as elapsed at the same time. Order of
/// acquisition among waiters is whatever the mutex grants (not FIFO-guaranteed).
#[derive(Debug)]
pub struct RateLimiter {
    min_interval: Duration,
    last_call: Mutex<Option<Instant>>,
}

impl RateLimiter {
    /// `calls_per_minute` of zero is treated as one.
    pub fn new(calls_per_minute: u32) -> Self {
        let per_minute = calls_per_minute.max(1);
        Self::with_interval(Duration::from_secs_f64(60.0 / f64::from(per_minute)))
    }

    pub fn with_interval(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_call: Mutex::new(None),
        }
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Wait until the interval since the previous granted acquisition has passed.
    pub async fn acquire(&self) {
        let mut last = self.last_call.lock().await;
        if let Some(prev) = *last {
            let elapsed = prev.elapsed();
            if elapsed < self.min_interval {
                sleep(self.min_interval - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn interval_from_calls_per_minute() {
        assert_eq!(RateLimiter::new(60).min_interval(), Duration::from_secs(1));
        assert_eq!(
            RateLimiter::new(120).min_interval(),
            Duration::from_millis(500)
        );
        assert_eq!(RateLimiter::new(0).min_interval(), Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn first_acquire_does_not_wait() {
        let rl = RateLimiter::new(1);
        let start = Instant::now();
        rl.acquire().await;
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn back_to_back_acquisitions_are_spaced() {
        let rl = RateLimiter::with_interval(Duration::from_secs(2));
        let start = Instant::now();
        for _ in 0..4 {
            rl.acquire().await;
        }
        // N acquisitions take at least (N - 1) * interval.
        assert!(start.elapsed() >= Duration::from_secs(6));
    }

    #[tokio::test(start_paused = true)]
    async fn no_wait_after_interval_already_elapsed() {
        let rl = RateLimiter::with_interval(Duration::from_secs(1));
        rl.acquire().await;
        sleep(Duration::from_secs(5)).await;
        let start = Instant::now();
        rl.acquire().await;
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_callers_are_serialized() {
        let rl = Arc::new(RateLimiter::with_interval(Duration::from_secs(1)));
        let start = Instant::now();

        let mut handles = Vec::new();
        for _ in 0..5 {
            let rl = rl.clone();
            handles.push(tokio::spawn(async move {
                rl.acquire().await;
                Instant::now()
            }));
        }

        let mut grants = Vec::new();
        for h in handles {
            grants.push(h.await.unwrap());
        }
        grants.sort();

        for pair in grants.windows(2) {
            assert!(pair[1] - pair[0] >= Duration::from_secs(1));
        }
        assert!(start.elapsed() >= Duration::from_secs(4));
    }
}
