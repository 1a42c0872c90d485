//! Confidence x drawdown-penalty position limit with EMA smoothing.
//! Grounded on the original bot's dynamic-limit manager; formulas per §4.15.

use std::collections::VecDeque;

use crate::alpha::volatility::VolRegime;

#[derive(Debug, Clone, Copy)]
pub struct MarketConditions {
    pub vol_regime: VolRegime,
    pub fill_rate: f64,
    pub confidence: f64,
}

#[derive(Debug, Clone)]
pub struct LimitSnapshot {
    pub limit: f64,
    pub reasons: Vec<String>,
}

pub struct DynamicLimitManager {
    base_limit: f64,
    max_daily_loss: f64,
    min_pct: f64,
    max_pct: f64,
    smoothing: f64,
    last_emitted: Option<f64>,
    history: VecDeque<LimitSnapshot>,
}

impl DynamicLimitManager {
    pub fn new(base_limit: f64, max_daily_loss: f64, min_pct: f64, max_pct: f64, smoothing: f64) -> Self {
        Self {
            base_limit,
            max_daily_loss,
            min_pct,
            max_pct,
            smoothing,
            last_emitted: None,
            history: VecDeque::with_capacity(100),
        }
    }

    fn confidence_mult(&self, c: MarketConditions) -> f64 {
        let mut mult = 1.0;
        mult *= match c.vol_regime {
            VolRegime::Low => 1.2,
            VolRegime::High => 0.7,
            VolRegime::Extreme => 0.5,
            VolRegime::Normal => 1.0,
        };
        if c.fill_rate > 0.7 {
            mult *= 1.1;
        } else if c.fill_rate < 0.3 {
            mult *= 0.8;
        }
        mult *= 0.5 + c.confidence;
        mult.clamp(0.5, 2.0)
    }

    fn drawdown_penalty(&self, daily_pnl: f64) -> f64 {
        if daily_pnl >= 0.0 {
            0.0
        } else {
            (daily_pnl.abs() / self.max_daily_loss * 0.5).min(0.5)
        }
    }

    pub fn compute_limit(&mut self, daily_pnl: f64, conditions: MarketConditions) -> f64 {
        let mut reasons = Vec::new();
        let confidence_mult = self.confidence_mult(conditions);
        reasons.push(format!("confidence_mult={confidence_mult:.3}"));
        let drawdown_penalty = self.drawdown_penalty(daily_pnl);
        if drawdown_penalty > 0.0 {
            reasons.push(format!("drawdown_penalty={drawdown_penalty:.3}"));
        }

        let raw = self.base_limit * confidence_mult * (1.0 - drawdown_penalty);
        let min_limit = self.base_limit * self.min_pct;
        let max_limit = self.base_limit * self.max_pct;
        let clamped = raw.clamp(min_limit, max_limit);

        let smoothed = match self.last_emitted {
            Some(prev) => prev + self.smoothing * (clamped - prev),
            None => clamped,
        };
        let rounded = (smoothed * 100.0).round() / 100.0;
        self.last_emitted = Some(rounded);

        if self.history.len() >= 100 {
            self.history.pop_front();
        }
        self.history.push_back(LimitSnapshot {
            limit: rounded,
            reasons,
        });

        rounded
    }

    pub fn history(&self) -> &VecDeque<LimitSnapshot> {
        &self.history
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_identical_conditions_converge_to_fixed_point() {
        let mut manager = DynamicLimitManager::new(100.0, 500.0, 0.20, 2.0, 0.3);
        let conditions = MarketConditions {
            vol_regime: VolRegime::Normal,
            fill_rate: 0.5,
            confidence: 0.5,
        };
        let mut last = manager.compute_limit(0.0, conditions);
        for _ in 0..20 {
            let next = manager.compute_limit(0.0, conditions);
            last = next;
        }
        let converged = manager.compute_limit(0.0, conditions);
        assert!((converged - last).abs() < 0.01);
    }

    #[test]
    fn drawdown_reduces_limit() {
        let mut manager = DynamicLimitManager::new(100.0, 500.0, 0.20, 2.0, 1.0);
        let conditions = MarketConditions {
            vol_regime: VolRegime::Normal,
            fill_rate: 0.5,
            confidence: 0.5,
        };
        let healthy = manager.compute_limit(0.0, conditions);
        let mut manager2 = DynamicLimitManager::new(100.0, 500.0, 0.20, 2.0, 1.0);
        let drawdown = manager2.compute_limit(-400.0, conditions);
        assert!(drawdown < healthy);
    }
}
