//! YES/NO parity detector: sell-both / buy-both / skew signals.
//! Grounded on the original bot's parity scanner and `models::ArbitrageSignal`;
//! classification thresholds per §4.11.

use std::collections::HashMap;

use crate::models::{ArbitrageSignal, ArbitrageType, Pair};
use crate::money::Price;

pub struct ArbitrageDetector {
    pairs: Vec<Pair>,
    fee_rate: f64,
    min_profit_bps: f64,
    skew_threshold_bps: f64,
    last_signal: HashMap<String, ArbitrageSignal>,
}

impl ArbitrageDetector {
    pub fn new(fee_rate: f64, min_profit_bps: f64, skew_threshold_bps: f64) -> Self {
        Self {
            pairs: Vec::new(),
            fee_rate,
            min_profit_bps,
            skew_threshold_bps,
            last_signal: HashMap::new(),
        }
    }

    pub fn register_pair(&mut self, pair: Pair) {
        self.pairs.push(pair);
    }

    pub fn classify(&self, yes_price: f64, no_price: f64) -> ArbitrageSignal {
        let sum = yes_price + no_price;
        let deviation = sum - 1.0;
        let deviation_bps = deviation.abs() * 10_000.0;
        let fee_cost_bps = 2.0 * self.fee_rate * 10_000.0;
        let net_bps = deviation_bps - fee_cost_bps;

        if deviation > 0.0 && net_bps >= self.min_profit_bps {
            ArbitrageSignal {
                kind: ArbitrageType::SellBoth,
                yes_price,
                no_price,
                sum,
                profit_bps: net_bps,
                confidence: (net_bps / 100.0).min(1.0),
                action_description: "sell YES and NO: combined price exceeds 1.00 after fees"
                    .to_string(),
            }
        } else if deviation < 0.0 && net_bps >= self.min_profit_bps {
            ArbitrageSignal {
                kind: ArbitrageType::BuyBoth,
                yes_price,
                no_price,
                sum,
                profit_bps: net_bps,
                confidence: (net_bps / 100.0).min(1.0),
                action_description: "buy YES and NO: combined price undercuts 1.00 after fees"
                    .to_string(),
            }
        } else if deviation_bps >= self.skew_threshold_bps {
            ArbitrageSignal {
                kind: ArbitrageType::Skew,
                yes_price,
                no_price,
                sum,
                profit_bps: deviation_bps,
                confidence: 0.5,
                action_description: "persistent parity skew below the profitable threshold"
                    .to_string(),
            }
        } else {
            ArbitrageSignal {
                kind: ArbitrageType::None,
                yes_price,
                no_price,
                sum,
                profit_bps: 0.0,
                confidence: 0.0,
                action_description: "no actionable mispricing".to_string(),
            }
        }
    }

    /// Iterates pairs, caches each pair's last signal by condition_id, and
    /// returns actionable signals (non-NONE, profit_bps > 10) sorted by
    /// profit descending.
    pub fn scan_all(
        &mut self,
        price_getter: impl Fn(&str) -> Option<f64>,
    ) -> Vec<ArbitrageSignal> {
        let mut actionable = Vec::new();
        for pair in self.pairs.clone() {
            let (Some(yes), Some(no)) = (
                price_getter(&pair.yes_asset_id),
                price_getter(&pair.no_asset_id),
            ) else {
                continue;
            };
            let signal = self.classify(yes, no);
            self.last_signal.insert(pair.condition_id.clone(), signal.clone());
            if signal.is_actionable() {
                actionable.push(signal);
            }
        }
        actionable.sort_by(|a, b| b.profit_bps.partial_cmp(&a.profit_bps).unwrap());
        actionable
    }

    /// Asymmetric quote shift if a cached SKEW signal touches `asset_id`.
    pub fn get_quote_adjustment(
        &self,
        asset_id: &str,
        base_bid: Price,
        base_ask: Price,
    ) -> (Price, Price) {
        let pair = self
            .pairs
            .iter()
            .find(|p| p.yes_asset_id == asset_id || p.no_asset_id == asset_id);
        let Some(pair) = pair else {
            return (base_bid, base_ask);
        };
        let Some(signal) = self.last_signal.get(&pair.condition_id) else {
            return (base_bid, base_ask);
        };
        if signal.kind != ArbitrageType::Skew {
            return (base_bid, base_ask);
        }

        let small = rust_decimal_macros::dec!(0.005);
        let large = rust_decimal_macros::dec!(0.010);
        let relieving_direction_up = signal.sum > 1.0;

        if relieving_direction_up {
            (base_bid - large, base_ask - small)
        } else {
            (base_bid + small, base_ask + large)
        }
    }

    pub fn cached_signal(&self, condition_id: &str) -> Option<&ArbitrageSignal> {
        self.last_signal.get(condition_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skew_boundary_case() {
        let detector = ArbitrageDetector::new(0.001, 20.0, 10.0);
        let signal = detector.classify(0.502, 0.501);
        assert_eq!(signal.kind, ArbitrageType::Skew);
    }

    #[test]
    fn sell_both_boundary_case() {
        let detector = ArbitrageDetector::new(0.001, 20.0, 10.0);
        let signal = detector.classify(0.505, 0.500);
        assert_eq!(signal.kind, ArbitrageType::SellBoth);
        assert!((signal.profit_bps - 30.0).abs() < 1e-6);
        assert!((signal.confidence - 0.3).abs() < 1e-6);
    }

    #[test]
    fn none_case() {
        let detector = ArbitrageDetector::new(0.001, 20.0, 10.0);
        let signal = detector.classify(0.55, 0.45);
        assert_eq!(signal.kind, ArbitrageType::None);
    }
}
