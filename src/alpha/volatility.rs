//! Rolling realized volatility and the spread multiplier derived from it.
//! Grounded on the original bot's volatility tracker and the teacher's
//! `statrs`/`VecDeque`-ring idiom (`risk.rs`'s `KellyCalculator::win_history`).

use std::collections::VecDeque;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VolRegime {
    Low,
    Normal,
    High,
    Extreme,
}

struct Sample {
    at: Instant,
    price: f64,
}

pub struct VolatilityTracker {
    sample_interval: Duration,
    window: Duration,
    min_samples: usize,
    mult_min: f64,
    mult_max: f64,
    samples: VecDeque<Sample>,
    last_sample_at: Option<Instant>,
}

impl VolatilityTracker {
    pub fn new(
        sample_interval_secs: u64,
        window_secs: u64,
        min_samples: usize,
        mult_min: f64,
        mult_max: f64,
    ) -> Self {
        Self {
            sample_interval: Duration::from_secs(sample_interval_secs),
            window: Duration::from_secs(window_secs),
            min_samples,
            mult_min,
            mult_max,
            samples: VecDeque::new(),
            last_sample_at: None,
        }
    }

    pub fn update(&mut self, mid: f64) {
        self.update_at(mid, Instant::now());
    }

    fn update_at(&mut self, mid: f64, now: Instant) {
        if let Some(last) = self.last_sample_at {
            if now.duration_since(last) < self.sample_interval {
                return;
            }
        }
        self.last_sample_at = Some(now);
        self.samples.push_back(Sample { at: now, price: mid });
        while let Some(front) = self.samples.front() {
            if now.duration_since(front.at) > self.window {
                self.samples.pop_front();
            } else {
                break;
            }
        }
    }

    /// Sample standard deviation of `ln(p_i / p_{i-1})`, annualized.
    pub fn realized_vol(&self) -> f64 {
        if self.samples.len() < self.min_samples {
            return 0.0;
        }
        let log_returns: Vec<f64> = self
            .samples
            .iter()
            .zip(self.samples.iter().skip(1))
            .map(|(a, b)| (b.price / a.price).ln())
            .collect();
        if log_returns.len() < 2 {
            return 0.0;
        }
        let mean = log_returns.iter().sum::<f64>() / log_returns.len() as f64;
        let variance = log_returns
            .iter()
            .map(|r| (r - mean).powi(2))
            .sum::<f64>()
            / (log_returns.len() - 1) as f64;
        let std_dev = variance.sqrt();
        let seconds_per_year = 365.0 * 24.0 * 3600.0;
        std_dev * (seconds_per_year / self.sample_interval.as_secs_f64()).sqrt()
    }

    pub fn multiplier(&self) -> f64 {
        if self.samples.len() < self.min_samples {
            return 1.0;
        }
        let v = self.realized_vol();
        self.map_vol_to_multiplier(v)
    }

    fn map_vol_to_multiplier(&self, v: f64) -> f64 {
        if v < 0.05 {
            self.mult_min
        } else if v < 0.15 {
            lerp(v, 0.05, 0.15, self.mult_min, 1.0)
        } else if v < 0.30 {
            lerp(v, 0.15, 0.30, 1.0, 1.5)
        } else {
            let v_clamped = v.min(0.5);
            lerp(v_clamped, 0.30, 0.5, 1.5, self.mult_max)
        }
    }

    pub fn state(&self) -> VolRegime {
        if self.samples.len() < self.min_samples {
            return VolRegime::Normal;
        }
        let v = self.realized_vol();
        if v < 0.05 {
            VolRegime::Low
        } else if v < 0.15 {
            VolRegime::Normal
        } else if v < 0.30 {
            VolRegime::High
        } else {
            VolRegime::Extreme
        }
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }
}

fn lerp(x: f64, x0: f64, x1: f64, y0: f64, y1: f64) -> f64 {
    y0 + (y1 - y0) * (x - x0) / (x1 - x0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insufficient_samples_defaults_to_one() {
        let tracker = VolatilityTracker::new(5, 1800, 10, 0.5, 3.0);
        assert_eq!(tracker.multiplier(), 1.0);
    }

    #[test]
    fn constant_price_collapses_vol_to_mult_min() {
        let mut tracker = VolatilityTracker::new(0, 1800, 3, 0.5, 3.0);
        let t0 = Instant::now();
        for i in 0..10 {
            tracker.update_at(0.50, t0 + Duration::from_secs(i * 5));
        }
        assert!(tracker.realized_vol() < 1e-9);
        assert_eq!(tracker.multiplier(), 0.5);
    }

    #[test]
    fn multiplier_bounded_by_configured_range() {
        let mut tracker = VolatilityTracker::new(0, 1800, 3, 0.5, 3.0);
        let t0 = Instant::now();
        let prices = [0.5, 0.9, 0.2, 0.95, 0.1, 0.99];
        for (i, p) in prices.iter().enumerate() {
            tracker.update_at(*p, t0 + Duration::from_secs(i as u64 * 5));
        }
        let m = tracker.multiplier();
        assert!(m >= 0.5 && m <= 3.0);
    }
}
