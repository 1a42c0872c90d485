//! Token-bucket client-side throttle for outbound order/market-data calls.
//! Adapted from the teacher's per-IP `RateLimitLayer` windowing idiom (the
//! removed `rate_limit_raw_ref` prototype) — same `Instant`-based
//! bookkeeping under `parking_lot::Mutex`, turned inside out: one shared
//! limiter instance per endpoint class instead of one entry per client IP.

use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::time::sleep;

struct State {
    last_call: Option<Instant>,
}

/// `min_interval = 1 / rate`. `wait()` blocks until at least `min_interval`
/// has elapsed since the last call. FIFO under lock: concurrent callers
/// serialize in arrival order.
pub struct RateLimiter {
    min_interval: Duration,
    state: Mutex<State>,
}

impl RateLimiter {
    pub fn new(rate_per_sec: f64) -> Self {
        Self {
            min_interval: Duration::from_secs_f64(1.0 / rate_per_sec),
            state: Mutex::new(State { last_call: None }),
        }
    }

    pub async fn wait(&self) {
        let sleep_for = {
            let mut state = self.state.lock();
            let now = Instant::now();
            let sleep_for = match state.last_call {
                Some(last) => {
                    let elapsed = now.duration_since(last);
                    self.min_interval.saturating_sub(elapsed)
                }
                None => Duration::ZERO,
            };
            state.last_call = Some(now + sleep_for);
            sleep_for
        };
        if !sleep_for.is_zero() {
            sleep(sleep_for).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn serializes_calls_to_min_interval() {
        let limiter = Arc::new(RateLimiter::new(10.0)); // 100ms min interval
        let start = Instant::now();
        limiter.wait().await;
        limiter.wait().await;
        limiter.wait().await;
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(180));
    }
}
