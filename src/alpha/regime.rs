//! Liquidity regime detector: classifies the market's current liquidity
//! state from a rolling window of spread/depth/volume snapshots and
//! recommends a spread/size adjustment. Grounded on
//! `original_source/src/alpha/regime.py`'s `RegimeDetector`; this is the
//! GLOSSARY's "Regime (liquidity)" term, otherwise orphaned by spec.md.

use std::collections::VecDeque;

use rust_decimal::prelude::ToPrimitive;

use crate::money::{Price, Size};

const HIGH_LIQUIDITY_SCORE: f64 = 0.7;
const LOW_LIQUIDITY_SCORE: f64 = 0.3;
const CRISIS_SCORE: f64 = 0.1;

const SPREAD_WEIGHT: f64 = 0.3;
const DEPTH_WEIGHT: f64 = 0.4;
const VOLUME_WEIGHT: f64 = 0.3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiquidityRegime {
    High,
    Normal,
    Low,
    Crisis,
}

#[derive(Debug, Clone, Copy)]
struct Snapshot {
    score: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct RegimeTransition {
    pub from: LiquidityRegime,
    pub to: LiquidityRegime,
}

#[derive(Debug, Clone, Copy)]
pub struct StrategyAdjustment {
    pub regime: LiquidityRegime,
    pub spread_mult: f64,
    pub size_mult: f64,
    pub should_pause: bool,
}

pub struct RegimeDetector {
    window_size: usize,
    snapshots: VecDeque<Snapshot>,
    regime_history: VecDeque<LiquidityRegime>,
}

impl RegimeDetector {
    pub fn new(window_size: usize) -> Self {
        Self {
            window_size,
            snapshots: VecDeque::new(),
            regime_history: VecDeque::new(),
        }
    }

    pub fn record_snapshot(&mut self, spread: Price, bid_depth: Size, ask_depth: Size, volume: Size) {
        let score = Self::calculate_score(spread, bid_depth, ask_depth, volume);
        self.snapshots.push_back(Snapshot { score });
        while self.snapshots.len() > self.window_size {
            self.snapshots.pop_front();
        }

        let regime = Self::classify(score);
        self.regime_history.push_back(regime);
        while self.regime_history.len() > 100 {
            self.regime_history.pop_front();
        }
    }

    pub fn regime(&self) -> LiquidityRegime {
        if self.snapshots.is_empty() {
            return LiquidityRegime::Normal;
        }
        let recent: Vec<f64> = self.snapshots.iter().rev().take(10).map(|s| s.score).collect();
        let avg = recent.iter().sum::<f64>() / recent.len() as f64;
        Self::classify(avg)
    }

    /// Most-common-in-last-5 vs most-common-in-prior-5: a cheap proxy for
    /// "did the regime just change" without a full majority vote.
    pub fn detect_transition(&self) -> Option<RegimeTransition> {
        if self.regime_history.len() < 10 {
            return None;
        }
        let hist: Vec<LiquidityRegime> = self.regime_history.iter().copied().collect();
        let n = hist.len();
        let recent = most_common(&hist[n - 5..]);
        let previous = most_common(&hist[n - 10..n - 5]);
        if recent != previous {
            Some(RegimeTransition {
                from: previous,
                to: recent,
            })
        } else {
            None
        }
    }

    pub fn strategy_adjustment(&self) -> StrategyAdjustment {
        let regime = self.regime();
        if self.detect_transition().is_some() {
            return StrategyAdjustment {
                regime,
                spread_mult: 1.5,
                size_mult: 0.3,
                should_pause: true,
            };
        }
        match regime {
            LiquidityRegime::High => StrategyAdjustment {
                regime,
                spread_mult: 0.8,
                size_mult: 1.5,
                should_pause: false,
            },
            LiquidityRegime::Low => StrategyAdjustment {
                regime,
                spread_mult: 1.5,
                size_mult: 0.5,
                should_pause: false,
            },
            LiquidityRegime::Crisis => StrategyAdjustment {
                regime,
                spread_mult: 2.0,
                size_mult: 0.2,
                should_pause: true,
            },
            LiquidityRegime::Normal => StrategyAdjustment {
                regime,
                spread_mult: 1.0,
                size_mult: 1.0,
                should_pause: false,
            },
        }
    }

    fn calculate_score(spread: Price, bid_depth: Size, ask_depth: Size, volume: Size) -> f64 {
        let spread_f = spread.to_f64().unwrap_or(0.0);
        let spread_score = (1.0 - spread_f / 0.10).max(0.0);

        let depth_f = (bid_depth + ask_depth).to_f64().unwrap_or(0.0);
        let depth_score = (depth_f / 2000.0).min(1.0);

        let volume_f = volume.to_f64().unwrap_or(0.0);
        let volume_score = (volume_f / 5000.0).min(1.0);

        SPREAD_WEIGHT * spread_score + DEPTH_WEIGHT * depth_score + VOLUME_WEIGHT * volume_score
    }

    fn classify(score: f64) -> LiquidityRegime {
        if score >= HIGH_LIQUIDITY_SCORE {
            LiquidityRegime::High
        } else if score >= LOW_LIQUIDITY_SCORE {
            LiquidityRegime::Normal
        } else if score >= CRISIS_SCORE {
            LiquidityRegime::Low
        } else {
            LiquidityRegime::Crisis
        }
    }
}

fn most_common(regimes: &[LiquidityRegime]) -> LiquidityRegime {
    let variants = [
        LiquidityRegime::High,
        LiquidityRegime::Normal,
        LiquidityRegime::Low,
        LiquidityRegime::Crisis,
    ];
    variants
        .into_iter()
        .max_by_key(|v| regimes.iter().filter(|r| *r == v).count())
        .unwrap_or(LiquidityRegime::Normal)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn tight_deep_book_is_high_liquidity() {
        let mut detector = RegimeDetector::new(50);
        for _ in 0..10 {
            detector.record_snapshot(dec!(0.01), dec!(600), dec!(600), dec!(6000));
        }
        assert_eq!(detector.regime(), LiquidityRegime::High);
    }

    #[test]
    fn wide_thin_book_is_crisis() {
        let mut detector = RegimeDetector::new(50);
        for _ in 0..10 {
            detector.record_snapshot(dec!(0.20), dec!(0), dec!(0), dec!(0));
        }
        assert_eq!(detector.regime(), LiquidityRegime::Crisis);
    }

    #[test]
    fn transition_forces_pause() {
        let mut detector = RegimeDetector::new(50);
        for _ in 0..5 {
            detector.record_snapshot(dec!(0.01), dec!(600), dec!(600), dec!(6000));
        }
        for _ in 0..5 {
            detector.record_snapshot(dec!(0.20), dec!(0), dec!(0), dec!(0));
        }
        let adj = detector.strategy_adjustment();
        assert!(adj.should_pause);
    }
}
