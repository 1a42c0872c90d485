//! Fractional Kelly sizer. Grounded on the teacher's `KellyCalculator`
//! (`risk.rs`) — same `VecDeque` win-history idiom — narrowed to the
//! `(p, b)` formula and history-derived sizing this spec calls for.

use std::collections::VecDeque;

#[derive(Debug, Clone, Copy)]
pub struct KellyResult {
    pub raw_fraction: f64,
    pub applied_fraction: f64,
    pub position_size: u64,
}

pub struct KellySizer {
    fraction: f64,
    max_position_pct: f64,
    min_trades: usize,
    win_history: VecDeque<(bool, f64)>,
}

impl KellySizer {
    pub fn new(fraction: f64, max_position_pct: f64, min_trades: usize) -> Self {
        Self {
            fraction,
            max_position_pct,
            min_trades,
            win_history: VecDeque::with_capacity(1000),
        }
    }

    pub fn record_trade(&mut self, won: bool, pnl_abs: f64) {
        if self.win_history.len() >= 1000 {
            self.win_history.pop_front();
        }
        self.win_history.push_back((won, pnl_abs));
    }

    /// `f* = (p*b - (1-p)) / b`, clamped at 0 below.
    pub fn kelly_fraction(&self, p: f64, b: f64) -> f64 {
        if b <= 0.0 {
            return 0.0;
        }
        ((p * b - (1.0 - p)) / b).max(0.0)
    }

    pub fn size_position(&self, p: f64, b: f64, bankroll: f64, price: f64) -> KellyResult {
        let raw_fraction = self.kelly_fraction(p, b);
        let applied_fraction = (raw_fraction * self.fraction).min(self.max_position_pct);
        let position_size = if price > 0.0 {
            ((bankroll * applied_fraction) / price).floor() as u64
        } else {
            0
        };
        KellyResult {
            raw_fraction,
            applied_fraction,
            position_size,
        }
    }

    /// Requires `min_trades`; computes win rate and avg-win/avg-loss ratio
    /// from history and delegates to the (p, b) formula.
    pub fn size_from_history(&self, bankroll: f64, price: f64) -> Option<KellyResult> {
        if self.win_history.len() < self.min_trades {
            return None;
        }
        let wins: Vec<f64> = self
            .win_history
            .iter()
            .filter(|(won, _)| *won)
            .map(|(_, pnl)| *pnl)
            .collect();
        let losses: Vec<f64> = self
            .win_history
            .iter()
            .filter(|(won, _)| !*won)
            .map(|(_, pnl)| *pnl)
            .collect();
        if wins.is_empty() || losses.is_empty() {
            return None;
        }
        let win_rate = wins.len() as f64 / self.win_history.len() as f64;
        let avg_win = wins.iter().sum::<f64>() / wins.len() as f64;
        let avg_loss = losses.iter().sum::<f64>() / losses.len() as f64;
        let b = avg_win / avg_loss;
        Some(self.size_position(win_rate, b, bankroll, price))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn even_odds_yields_zero_fraction() {
        let sizer = KellySizer::new(0.25, 0.10, 20);
        let result = sizer.size_position(0.5, 1.0, 1000.0, 0.5);
        assert_eq!(result.raw_fraction, 0.0);
        assert_eq!(result.position_size, 0);
    }

    #[test]
    fn full_fraction_no_cap_matches_spec_example() {
        let sizer = KellySizer::new(1.0, 1.0, 20);
        let result = sizer.size_position(0.6, 1.0, 1000.0, 0.5);
        assert!((result.raw_fraction - 0.2).abs() < 1e-9);
    }

    #[test]
    fn history_sizing_clamped_to_max_position_pct() {
        let mut sizer = KellySizer::new(0.25, 0.10, 20);
        for _ in 0..12 {
            sizer.record_trade(true, 12.0);
        }
        for _ in 0..8 {
            sizer.record_trade(false, 10.0);
        }
        let result = sizer.size_from_history(1000.0, 0.5).unwrap();
        assert!((result.raw_fraction - 0.2667).abs() < 0.01);
        assert!(result.applied_fraction <= 0.10);
    }
}
