//! Depth/imbalance/wall analysis and competitive-quote suggestions.
//! Grounded on the original bot's book analyzer; numeric rules per §4.8.

use rust_decimal::prelude::ToPrimitive;

use crate::models::OrderBook;
use crate::money::{round_to_tick, Price};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImbalanceSignal {
    BidHeavy,
    AskHeavy,
    Balanced,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DepthClass {
    Thin,
    Normal,
    Thick,
}

#[derive(Debug, Clone)]
pub struct BookAnalysis {
    pub bid_depth: f64,
    pub ask_depth: f64,
    pub imbalance_ratio: f64,
    pub signal: ImbalanceSignal,
    pub price_adjustment: f64,
    pub bid_wall: bool,
    pub ask_wall: bool,
    pub depth_class: DepthClass,
    pub suggested_bid: Option<Price>,
    pub suggested_ask: Option<Price>,
}

pub struct BookAnalyzer {
    pub depth_cents: f64,
    pub imbalance_t: f64,
    pub adjustment_cap: f64,
    pub wall_threshold: f64,
    pub tick: Price,
    pub thin_threshold: f64,
    pub thick_threshold: f64,
}

impl BookAnalyzer {
    pub fn analyze(&self, book: &OrderBook) -> BookAnalysis {
        let best_bid = book.best_bid();
        let best_ask = book.best_ask();

        let depth_band = Price::try_from(self.depth_cents / 100.0).unwrap_or_default();

        let bid_depth = depth_within(&book.bids, best_bid, depth_band, true);
        let ask_depth = depth_within(&book.asks, best_ask, depth_band, false);

        let total = bid_depth + ask_depth;
        let imbalance_ratio = if total > 0.0 { bid_depth / total } else { 0.5 };
        let signal = if imbalance_ratio > 0.5 + self.imbalance_t {
            ImbalanceSignal::BidHeavy
        } else if imbalance_ratio < 0.5 - self.imbalance_t {
            ImbalanceSignal::AskHeavy
        } else {
            ImbalanceSignal::Balanced
        };

        let raw_adj = (imbalance_ratio - 0.5) * 0.05;
        let rounded_adj = (raw_adj * 1000.0).round() / 1000.0;
        let price_adjustment = rounded_adj.clamp(-self.adjustment_cap, self.adjustment_cap);

        let bid_wall = has_wall(&book.bids, bid_depth, self.wall_threshold);
        let ask_wall = has_wall(&book.asks, ask_depth, self.wall_threshold);

        let depth_class = classify_depth(bid_depth.min(ask_depth), self.thin_threshold, self.thick_threshold);

        let suggested_bid = suggest_quote(best_bid, bid_wall, self.tick, true);
        let suggested_ask = suggest_quote(best_ask, ask_wall, self.tick, false);

        BookAnalysis {
            bid_depth,
            ask_depth,
            imbalance_ratio,
            signal,
            price_adjustment,
            bid_wall,
            ask_wall,
            depth_class,
            suggested_bid,
            suggested_ask,
        }
    }
}

fn depth_within(
    levels: &[crate::models::PriceLevel],
    best: Option<Price>,
    band: Price,
    is_bid_side: bool,
) -> f64 {
    let Some(best) = best else { return 0.0 };
    levels
        .iter()
        .filter(|l| {
            if is_bid_side {
                best - l.price <= band
            } else {
                l.price - best <= band
            }
        })
        .map(|l| (l.price * l.size).to_f64().unwrap_or(0.0))
        .sum()
}

fn has_wall(levels: &[crate::models::PriceLevel], side_depth: f64, wall_threshold: f64) -> bool {
    if side_depth <= 0.0 {
        return false;
    }
    levels.iter().any(|l| {
        let notional: f64 = (l.price * l.size).to_f64().unwrap_or(0.0);
        notional / side_depth > wall_threshold
    })
}

fn classify_depth(min_depth: f64, thin_threshold: f64, thick_threshold: f64) -> DepthClass {
    if min_depth < thin_threshold {
        DepthClass::Thin
    } else if min_depth >= thick_threshold {
        DepthClass::Thick
    } else {
        DepthClass::Normal
    }
}

fn suggest_quote(best: Option<Price>, wall_present: bool, tick: Price, is_bid: bool) -> Option<Price> {
    let best = best?;
    let step = if is_bid { tick } else { -tick };
    let raw = if wall_present { best - step } else { best + step };
    Some(round_to_tick(raw, tick))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PriceLevel;
    use rust_decimal_macros::dec;

    fn book() -> OrderBook {
        OrderBook {
            asset_id: "tok".into(),
            bids: vec![
                PriceLevel { price: dec!(0.50), size: dec!(100) },
                PriceLevel { price: dec!(0.49), size: dec!(10) },
            ],
            asks: vec![
                PriceLevel { price: dec!(0.52), size: dec!(20) },
                PriceLevel { price: dec!(0.53), size: dec!(20) },
            ],
            timestamp: None,
        }
    }

    #[test]
    fn bid_heavy_book_detected() {
        let analyzer = BookAnalyzer {
            depth_cents: 3.0,
            imbalance_t: 0.10,
            adjustment_cap: 0.02,
            wall_threshold: 0.30,
            tick: dec!(0.01),
            thin_threshold: 50.0,
            thick_threshold: 500.0,
        };
        let analysis = analyzer.analyze(&book());
        assert_eq!(analysis.signal, ImbalanceSignal::BidHeavy);
        assert!(analysis.bid_wall);
    }

    #[test]
    fn competitive_quote_steps_behind_wall() {
        let analyzer = BookAnalyzer {
            depth_cents: 3.0,
            imbalance_t: 0.10,
            adjustment_cap: 0.02,
            wall_threshold: 0.30,
            tick: dec!(0.01),
            thin_threshold: 50.0,
            thick_threshold: 500.0,
        };
        let analysis = analyzer.analyze(&book());
        // Wall on the bid side -> step behind rather than improve.
        assert_eq!(analysis.suggested_bid, Some(dec!(0.49)));
    }
}
