//! Global dispatch throttle.
//!
//! One watermark ("earliest next permitted dispatch") is shared by every call
//! made through a pipeline. Each call reserves its slot synchronously, which
//! advances the watermark before the caller suspends, so calls issued in the
//! same scheduling turn can never compute the same slot.

use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

/// Enforces a minimum interval between the start of consecutive calls.
#[derive(Debug)]
pub struct RateLimiter {
    interval: Duration,
    watermark: Mutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn new(interval: Duration) -> Self {
        RateLimiter {
            interval,
            watermark: Mutex::new(None),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Claim the next dispatch slot and return how long to wait for it.
    ///
    /// The watermark moves to `now + wait + interval` before this returns.
    pub fn reserve(&self) -> Duration {
        let now = Instant::now();
        // The guard never spans an await, so a poisoned lock can only come
        // from a panic in this block; its value is still a valid watermark.
        let mut watermark = self.watermark.lock().unwrap_or_else(|e| e.into_inner());
        let slot = match *watermark {
            Some(next) if next > now => next,
            _ => now,
        };
        *watermark = Some(slot + self.interval);
        slot - now
    }

    /// Wait until this caller may dispatch.
    pub async fn acquire(&self) {
        let wait = self.reserve();
        if !wait.is_zero() {
            tracing::debug!(wait_ms = wait.as_millis() as u64, "throttling dispatch");
            tokio::time::sleep(wait).await;
        }
    }
}

impl Default for RateLimiter {
    /// 500ms spacing: at most two calls per second.
    fn default() -> Self {
        RateLimiter::new(Duration::from_millis(500))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    const INTERVAL: Duration = Duration::from_millis(500);

    #[tokio::test(start_paused = true)]
    async fn back_to_back_reservations_are_spaced() {
        let limiter = RateLimiter::new(INTERVAL);

        assert_eq!(limiter.reserve(), Duration::ZERO);
        assert_eq!(limiter.reserve(), INTERVAL);
        assert_eq!(limiter.reserve(), INTERVAL * 2);
    }

    #[tokio::test(start_paused = true)]
    async fn idle_limiter_does_not_wait() {
        let limiter = RateLimiter::new(INTERVAL);
        limiter.acquire().await;

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(limiter.reserve(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn partial_elapsed_interval_waits_remainder() {
        let limiter = RateLimiter::new(INTERVAL);
        limiter.acquire().await;

        tokio::time::advance(Duration::from_millis(200)).await;
        assert_eq!(limiter.reserve(), Duration::from_millis(300));
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_acquire_is_monotonic() {
        let limiter = Arc::new(RateLimiter::new(INTERVAL));
        let start = Instant::now();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let limiter = limiter.clone();
                tokio::spawn(async move {
                    limiter.acquire().await;
                    Instant::now()
                })
            })
            .collect();

        let mut times = Vec::new();
        for h in handles {
            times.push(h.await.unwrap());
        }
        times.sort();

        for pair in times.windows(2) {
            assert!(pair[1] - pair[0] >= INTERVAL, "dispatches closer than interval");
        }
        assert!(times[7] - start >= INTERVAL * 7);
    }

    #[test]
    fn independent_limiters_do_not_share_state() {
        tokio_test::block_on(async {
            let a = RateLimiter::new(INTERVAL);
            let b = RateLimiter::new(INTERVAL);
            a.reserve();
            assert_eq!(b.reserve(), Duration::ZERO);
        });
    }
}
