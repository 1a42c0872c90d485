//! Market scorer: ranks candidate markets by a weighted sum of component
//! scores so the pool can pick which ones to quote. Grounded on the
//! original bot's market scorer; formulas per §4.13.

use rust_decimal::prelude::ToPrimitive;

use crate::models::{Market, OrderBook};

const VOLUME_FLOOR: f64 = 1_000.0;
const SPREAD_PEAK_TICKS_LO: f64 = 3.0;
const SPREAD_PEAK_TICKS_HI: f64 = 6.0;
const SPREAD_TIGHT_MIN_TICKS: f64 = 1.0;
const SPREAD_WIDE_MAX_TICKS: f64 = 20.0;
const DEPTH_MIN_NOTIONAL: f64 = 50.0;
const DEPTH_MAX_NOTIONAL: f64 = 500.0;
const TIMING_PLATEAU_HOURS: f64 = 24.0 * 7.0;
const PRICE_MIN: f64 = 0.05;
const PRICE_MAX: f64 = 0.95;

#[derive(Debug, Clone)]
pub struct ScoredMarket {
    pub condition_id: String,
    pub total: f64,
    pub volume_score: f64,
    pub spread_score: f64,
    pub depth_score: f64,
    pub timing_score: f64,
    pub price_score: f64,
    pub rejected: bool,
    pub reason: Option<String>,
}

pub struct MarketScorer {
    pub weight_volume: f64,
    pub weight_spread: f64,
    pub weight_depth: f64,
    pub weight_timing: f64,
    pub weight_price: f64,
    pub min_hours_to_resolution: f64,
    pub tick: f64,
}

impl MarketScorer {
    pub fn new(
        weight_volume: f64,
        weight_spread: f64,
        weight_depth: f64,
        weight_timing: f64,
        weight_price: f64,
        min_hours_to_resolution: f64,
        tick: f64,
    ) -> Self {
        Self {
            weight_volume,
            weight_spread,
            weight_depth,
            weight_timing,
            weight_price,
            min_hours_to_resolution,
            tick,
        }
    }

    fn reject(&self, condition_id: &str, reason: &str) -> ScoredMarket {
        ScoredMarket {
            condition_id: condition_id.to_string(),
            total: 0.0,
            volume_score: 0.0,
            spread_score: 0.0,
            depth_score: 0.0,
            timing_score: 0.0,
            price_score: 0.0,
            rejected: true,
            reason: Some(reason.to_string()),
        }
    }

    fn volume_score(&self, volume_24h: f64) -> f64 {
        const REFERENCE_VOLUME: f64 = 100_000.0;
        if volume_24h < VOLUME_FLOOR {
            0.0
        } else {
            (100.0 * (volume_24h / VOLUME_FLOOR).ln() / (REFERENCE_VOLUME / VOLUME_FLOOR).ln()).clamp(0.0, 100.0)
        }
    }

    fn spread_score(&self, spread_ticks: f64) -> Option<f64> {
        if !(SPREAD_TIGHT_MIN_TICKS..=SPREAD_WIDE_MAX_TICKS).contains(&spread_ticks) {
            return None;
        }
        let score = if spread_ticks < SPREAD_PEAK_TICKS_LO {
            let span = SPREAD_PEAK_TICKS_LO - SPREAD_TIGHT_MIN_TICKS;
            100.0 * (spread_ticks - SPREAD_TIGHT_MIN_TICKS) / span
        } else if spread_ticks <= SPREAD_PEAK_TICKS_HI {
            100.0
        } else {
            let span = SPREAD_WIDE_MAX_TICKS - SPREAD_PEAK_TICKS_HI;
            100.0 * (1.0 - (spread_ticks - SPREAD_PEAK_TICKS_HI) / span)
        };
        Some(score.clamp(0.0, 100.0))
    }

    fn depth_score(&self, min_side_notional: f64) -> f64 {
        if min_side_notional <= DEPTH_MIN_NOTIONAL {
            0.0
        } else if min_side_notional >= DEPTH_MAX_NOTIONAL {
            100.0
        } else {
            50.0 + 50.0 * (min_side_notional - DEPTH_MIN_NOTIONAL) / (DEPTH_MAX_NOTIONAL - DEPTH_MIN_NOTIONAL)
        }
    }

    fn timing_score(&self, hours_to_resolution: f64) -> f64 {
        if hours_to_resolution >= TIMING_PLATEAU_HOURS {
            100.0
        } else {
            (100.0 * hours_to_resolution / TIMING_PLATEAU_HOURS).clamp(0.0, 100.0)
        }
    }

    fn price_score(&self, mid: f64) -> f64 {
        let distance_from_center = (mid - 0.5).abs();
        (100.0 * (1.0 - distance_from_center / 0.45)).clamp(0.0, 100.0)
    }

    pub fn score(&self, market: &Market, book: Option<&OrderBook>, hours_to_resolution: Option<f64>) -> ScoredMarket {
        let Some(book) = book else {
            return self.reject(&market.condition_id, "no book");
        };
        if market.volume_24h < VOLUME_FLOOR {
            return self.reject(&market.condition_id, "volume below floor");
        }

        let (Some(bid), Some(ask)) = (book.best_bid(), book.best_ask()) else {
            return self.reject(&market.condition_id, "no book");
        };
        let bid_f = bid.to_f64().unwrap_or(0.0);
        let ask_f = ask.to_f64().unwrap_or(0.0);
        let mid = (bid_f + ask_f) / 2.0;
        if !(PRICE_MIN..=PRICE_MAX).contains(&mid) {
            return self.reject(&market.condition_id, "price outside acceptable range");
        }

        let spread_ticks = (ask_f - bid_f) / self.tick;
        let Some(spread_score) = self.spread_score(spread_ticks) else {
            return self.reject(&market.condition_id, "spread outside acceptable band");
        };

        let bid_notional: f64 = book
            .bids
            .iter()
            .map(|l| (l.price * l.size).to_f64().unwrap_or(0.0))
            .sum();
        let ask_notional: f64 = book
            .asks
            .iter()
            .map(|l| (l.price * l.size).to_f64().unwrap_or(0.0))
            .sum();
        let min_side_notional = bid_notional.min(ask_notional);
        if min_side_notional <= DEPTH_MIN_NOTIONAL {
            return self.reject(&market.condition_id, "insufficient depth");
        }

        let hours = hours_to_resolution.unwrap_or(f64::MAX);
        if hours < self.min_hours_to_resolution {
            return self.reject(&market.condition_id, "too close to resolution");
        }

        let volume_score = self.volume_score(market.volume_24h);
        let depth_score = self.depth_score(min_side_notional);
        let timing_score = self.timing_score(hours);
        let price_score = self.price_score(mid);

        let weight_sum =
            self.weight_volume + self.weight_spread + self.weight_depth + self.weight_timing + self.weight_price;
        let total = if weight_sum > 0.0 {
            (volume_score * self.weight_volume
                + spread_score * self.weight_spread
                + depth_score * self.weight_depth
                + timing_score * self.weight_timing
                + price_score * self.weight_price)
                / weight_sum
        } else {
            0.0
        };

        ScoredMarket {
            condition_id: market.condition_id.clone(),
            total,
            volume_score,
            spread_score,
            depth_score,
            timing_score,
            price_score,
            rejected: false,
            reason: None,
        }
    }

    pub fn rank(&self, entries: Vec<ScoredMarket>) -> Vec<ScoredMarket> {
        let mut entries = entries;
        entries.sort_by(|a, b| {
            a.rejected
                .cmp(&b.rejected)
                .then(b.total.partial_cmp(&a.total).unwrap())
        });
        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Outcome, PriceLevel};
    use rust_decimal_macros::dec;

    fn market(condition_id: &str, volume_24h: f64) -> Market {
        Market {
            condition_id: condition_id.to_string(),
            question: "q".into(),
            slug: "s".into(),
            outcomes: vec![Outcome {
                name: "Yes".into(),
                asset_id: "a".into(),
            }],
            active: true,
            closed: false,
            volume_24h,
            liquidity: 0.0,
            end_date: None,
            description: None,
        }
    }

    fn book_with(bid: rust_decimal::Decimal, ask: rust_decimal::Decimal, size: rust_decimal::Decimal) -> OrderBook {
        OrderBook {
            asset_id: "a".into(),
            bids: vec![PriceLevel { price: bid, size }],
            asks: vec![PriceLevel { price: ask, size }],
            timestamp: None,
        }
    }

    #[test]
    fn low_volume_market_rejected() {
        let scorer = MarketScorer::new(0.3, 0.35, 0.15, 0.1, 0.1, 12.0, 0.01);
        let m = market("c1", 100.0);
        let book = book_with(dec!(0.48), dec!(0.52), dec!(1000));
        let result = scorer.score(&m, Some(&book), Some(100.0));
        assert!(result.rejected);
        assert_eq!(result.reason.as_deref(), Some("volume below floor"));
    }

    #[test]
    fn tight_book_with_depth_scores_well() {
        let scorer = MarketScorer::new(0.3, 0.35, 0.15, 0.1, 0.1, 12.0, 0.01);
        let m = market("c1", 50_000.0);
        let book = book_with(dec!(0.48), dec!(0.52), dec!(2000));
        let result = scorer.score(&m, Some(&book), Some(200.0));
        assert!(!result.rejected);
        assert!(result.total > 50.0);
    }

    #[test]
    fn resolution_too_soon_is_rejected() {
        let scorer = MarketScorer::new(0.3, 0.35, 0.15, 0.1, 0.1, 12.0, 0.01);
        let m = market("c1", 50_000.0);
        let book = book_with(dec!(0.48), dec!(0.52), dec!(2000));
        let result = scorer.score(&m, Some(&book), Some(2.0));
        assert!(result.rejected);
        assert_eq!(result.reason.as_deref(), Some("too close to resolution"));
    }
}
