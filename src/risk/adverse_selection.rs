//! Post-fill toxicity detector: widen/reduce/skip recommendations.
//! Grounded on the original bot's adverse-selection detector; thresholds
//! per §4.14.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use crate::models::Side;

struct RecordedFill {
    fill_id: u64,
    at: Instant,
    price: f64,
    side: Side,
    price_after: Option<f64>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ToxicityResponse {
    pub spread_mult: f64,
    pub size_mult: f64,
    pub skip_buy: bool,
    pub skip_sell: bool,
}

pub struct AdverseSelectionDetector {
    adverse_threshold: f64,
    toxic_threshold: f64,
    highly_toxic_threshold: f64,
    lookback: Duration,
    fills: VecDeque<RecordedFill>,
    next_id: u64,
}

impl AdverseSelectionDetector {
    pub fn new(
        adverse_threshold: f64,
        toxic_threshold: f64,
        highly_toxic_threshold: f64,
        lookback_secs: u64,
    ) -> Self {
        Self {
            adverse_threshold,
            toxic_threshold,
            highly_toxic_threshold,
            lookback: Duration::from_secs(lookback_secs),
            fills: VecDeque::new(),
            next_id: 1,
        }
    }

    pub fn record_fill(&mut self, price: f64, side: Side) -> u64 {
        self.record_fill_at(price, side, Instant::now())
    }

    fn record_fill_at(&mut self, price: f64, side: Side, at: Instant) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.fills.push_back(RecordedFill {
            fill_id: id,
            at,
            price,
            side,
            price_after: None,
        });
        id
    }

    pub fn record_price_after(&mut self, fill_id: u64, price_after: f64) {
        if let Some(fill) = self.fills.iter_mut().find(|f| f.fill_id == fill_id) {
            fill.price_after = Some(price_after);
        }
    }

    fn prune(&mut self, now: Instant) {
        while let Some(front) = self.fills.front() {
            if now.duration_since(front.at) > self.lookback {
                self.fills.pop_front();
            } else {
                break;
            }
        }
    }

    fn is_adverse(&self, fill: &RecordedFill) -> Option<bool> {
        let after = fill.price_after?;
        let move_amount = after - fill.price;
        let adverse = match fill.side {
            Side::Buy => move_amount < -self.adverse_threshold,
            Side::Sell => move_amount > self.adverse_threshold,
        };
        Some(adverse)
    }

    pub fn toxicity(&self) -> f64 {
        self.toxicity_for(None)
    }

    pub fn toxicity_for(&self, side: Option<Side>) -> f64 {
        let with_outcome: Vec<&RecordedFill> = self
            .fills
            .iter()
            .filter(|f| side.map(|s| s == f.side).unwrap_or(true))
            .filter(|f| f.price_after.is_some())
            .collect();
        if with_outcome.is_empty() {
            return 0.0;
        }
        let adverse_count = with_outcome
            .iter()
            .filter(|f| self.is_adverse(f).unwrap_or(false))
            .count();
        adverse_count as f64 / with_outcome.len() as f64
    }

    pub fn response(&mut self) -> ToxicityResponse {
        self.prune(Instant::now());
        let overall = self.toxicity();
        let buy_tox = self.toxicity_for(Some(Side::Buy));
        let sell_tox = self.toxicity_for(Some(Side::Sell));

        let mut response = ToxicityResponse {
            spread_mult: 1.0,
            size_mult: 1.0,
            skip_buy: false,
            skip_sell: false,
        };

        if overall >= self.toxic_threshold {
            response.spread_mult = (1.0 + (overall - self.toxic_threshold)).min(2.0);
            response.size_mult = (1.0 - (overall - self.toxic_threshold) * 0.5).max(0.3);
        }

        if buy_tox > self.highly_toxic_threshold && sell_tox < self.toxic_threshold {
            response.skip_buy = true;
        }
        if sell_tox > self.highly_toxic_threshold && buy_tox < self.toxic_threshold {
            response.skip_sell = true;
        }

        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn low_toxicity_no_change() {
        let mut detector = AdverseSelectionDetector::new(0.005, 0.4, 0.6, 300);
        let id = detector.record_fill(0.50, Side::Buy);
        detector.record_price_after(id, 0.501);
        let response = detector.response();
        assert_eq!(response.spread_mult, 1.0);
        assert_eq!(response.size_mult, 1.0);
    }

    #[test]
    fn high_toxicity_widens_and_shrinks() {
        let mut detector = AdverseSelectionDetector::new(0.005, 0.4, 0.6, 300);
        for _ in 0..5 {
            let id = detector.record_fill(0.50, Side::Buy);
            detector.record_price_after(id, 0.48);
        }
        let response = detector.response();
        assert!(response.spread_mult > 1.0);
        assert!(response.size_mult < 1.0);
    }
}
