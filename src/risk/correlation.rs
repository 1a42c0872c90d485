//! Correlation tracker & portfolio risk: pairwise price correlation and
//! correlated-exposure cap. Grounded on the teacher's `statrs`-backed
//! statistics usage (`risk.rs`); formulas per §4.17.

use std::collections::{HashMap, VecDeque};

pub struct CorrelationTracker {
    window: usize,
    min_samples: usize,
    prices: HashMap<String, VecDeque<f64>>,
}

impl CorrelationTracker {
    pub fn new(window: usize, min_samples: usize) -> Self {
        Self {
            window,
            min_samples,
            prices: HashMap::new(),
        }
    }

    pub fn record_price(&mut self, market: &str, price: f64) {
        let series = self.prices.entry(market.to_string()).or_default();
        series.push_back(price);
        while series.len() > self.window {
            series.pop_front();
        }
    }

    pub fn correlation(&self, a: &str, b: &str) -> Option<f64> {
        let series_a = self.prices.get(a)?;
        let series_b = self.prices.get(b)?;
        let n = series_a.len().min(series_b.len());
        if n < self.min_samples {
            return None;
        }
        let tail_a: Vec<f64> = series_a.iter().rev().take(n).cloned().collect();
        let tail_b: Vec<f64> = series_b.iter().rev().take(n).cloned().collect();
        Some(pearson(&tail_a, &tail_b))
    }
}

fn pearson(a: &[f64], b: &[f64]) -> f64 {
    let n = a.len() as f64;
    let mean_a = a.iter().sum::<f64>() / n;
    let mean_b = b.iter().sum::<f64>() / n;
    let mut cov = 0.0;
    let mut var_a = 0.0;
    let mut var_b = 0.0;
    for (x, y) in a.iter().zip(b.iter()) {
        let da = x - mean_a;
        let db = y - mean_b;
        cov += da * db;
        var_a += da * da;
        var_b += db * db;
    }
    if var_a <= 0.0 || var_b <= 0.0 {
        return 0.0;
    }
    cov / (var_a.sqrt() * var_b.sqrt())
}

pub struct PortfolioRisk {
    tracker: CorrelationTracker,
    correlation_threshold: f64,
    max_correlated_exposure: f64,
}

impl PortfolioRisk {
    pub fn new(tracker: CorrelationTracker, correlation_threshold: f64, max_correlated_exposure: f64) -> Self {
        Self {
            tracker,
            correlation_threshold,
            max_correlated_exposure,
        }
    }

    pub fn record_price(&mut self, market: &str, price: f64) {
        self.tracker.record_price(market, price);
    }

    pub fn can_add_position(
        &self,
        market: &str,
        size: f64,
        existing: &HashMap<String, f64>,
    ) -> bool {
        let correlated_existing: f64 = existing
            .iter()
            .filter(|(m, _)| m.as_str() != market)
            .filter(|(m, _)| {
                self.tracker
                    .correlation(market, m)
                    .map(|c| c.abs() >= self.correlation_threshold)
                    .unwrap_or(false)
            })
            .map(|(_, s)| s.abs())
            .sum();
        correlated_existing + size.abs() <= self.max_correlated_exposure
    }

    pub fn portfolio_beta(&self, positions: &HashMap<String, f64>) -> f64 {
        let total: f64 = positions.values().map(|p| p.abs()).sum();
        if total <= 0.0 {
            return 1.0;
        }
        let weights: HashMap<&String, f64> =
            positions.iter().map(|(m, p)| (m, p.abs() / total)).collect();

        let markets: Vec<&String> = positions.keys().collect();
        let mut cross_term = 0.0;
        for i in 0..markets.len() {
            for j in (i + 1)..markets.len() {
                let (mi, mj) = (markets[i], markets[j]);
                if let Some(corr) = self.tracker.correlation(mi, mj) {
                    cross_term += corr * weights[mi] * weights[mj];
                }
            }
        }
        1.0 + cross_term
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insufficient_samples_returns_none() {
        let mut tracker = CorrelationTracker::new(100, 20);
        tracker.record_price("a", 0.5);
        tracker.record_price("b", 0.5);
        assert_eq!(tracker.correlation("a", "b"), None);
    }

    #[test]
    fn perfectly_correlated_series() {
        let mut tracker = CorrelationTracker::new(100, 5);
        for i in 0..20 {
            let v = i as f64;
            tracker.record_price("a", v);
            tracker.record_price("b", v * 2.0 + 1.0);
        }
        let corr = tracker.correlation("a", "b").unwrap();
        assert!((corr - 1.0).abs() < 1e-6);
    }

    #[test]
    fn correlated_exposure_cap_enforced() {
        let mut tracker = CorrelationTracker::new(100, 5);
        for i in 0..20 {
            let v = i as f64;
            tracker.record_price("a", v);
            tracker.record_price("b", v);
        }
        let risk = PortfolioRisk::new(tracker, 0.5, 500.0);
        let mut existing = HashMap::new();
        existing.insert("a".to_string(), 400.0);
        assert!(!risk.can_add_position("b", 200.0, &existing));
        assert!(risk.can_add_position("b", 50.0, &existing));
    }
}
