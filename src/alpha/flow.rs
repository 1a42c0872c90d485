//! Trade-flow imbalance with time decay and aggressive-taker weighting.
//! Grounded on the original bot's flow analyzer; a decaying-weight ring
//! per asset in the style of the teacher's `DrawdownMonitor` rolling state
//! (`risk.rs`).

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use crate::models::Side;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowSignal {
    StronglyBullish,
    Bullish,
    Neutral,
    Bearish,
    StronglyBearish,
}

#[derive(Debug, Clone)]
pub struct FlowState {
    pub signal: FlowSignal,
    pub imbalance: f64,
    pub recommended_skew: f64,
    pub event_count: usize,
}

struct FlowEvent {
    at: Instant,
    price: f64,
    size: f64,
    side: Side,
    is_aggressive: bool,
}

pub struct FlowAnalyzer {
    window: Duration,
    half_life_secs: f64,
    events: VecDeque<FlowEvent>,
}

impl FlowAnalyzer {
    pub fn new(window_secs: u64, half_life_secs: f64) -> Self {
        Self {
            window: Duration::from_secs(window_secs),
            half_life_secs,
            events: VecDeque::new(),
        }
    }

    pub fn record_trade(&mut self, price: f64, size: f64, side: Side, is_aggressive: bool) {
        self.record_trade_at(price, size, side, is_aggressive, Instant::now());
    }

    fn record_trade_at(&mut self, price: f64, size: f64, side: Side, is_aggressive: bool, at: Instant) {
        self.events.push_back(FlowEvent {
            at,
            price,
            size,
            side,
            is_aggressive,
        });
    }

    fn prune(&mut self, now: Instant) {
        while let Some(front) = self.events.front() {
            if now.duration_since(front.at) > self.window {
                self.events.pop_front();
            } else {
                break;
            }
        }
    }

    pub fn get_state(&mut self) -> FlowState {
        self.get_state_at(Instant::now())
    }

    fn get_state_at(&mut self, now: Instant) -> FlowState {
        self.prune(now);

        if self.events.len() < 5 {
            return FlowState {
                signal: FlowSignal::Neutral,
                imbalance: 0.0,
                recommended_skew: 0.0,
                event_count: self.events.len(),
            };
        }

        let mut buy_volume = 0.0;
        let mut sell_volume = 0.0;
        for event in &self.events {
            let age = now.duration_since(event.at).as_secs_f64();
            let mut weight = 0.5f64.powf(age / self.half_life_secs);
            if event.is_aggressive {
                weight *= 2.0;
            }
            let weighted = event.size * weight;
            match event.side {
                Side::Buy => buy_volume += weighted,
                Side::Sell => sell_volume += weighted,
            }
        }

        let total = buy_volume + sell_volume;
        let imbalance = if total > 0.0 {
            (buy_volume - sell_volume) / total
        } else {
            0.0
        };

        let signal = if imbalance > 0.30 {
            FlowSignal::StronglyBullish
        } else if imbalance > 0.15 {
            FlowSignal::Bullish
        } else if imbalance < -0.30 {
            FlowSignal::StronglyBearish
        } else if imbalance < -0.15 {
            FlowSignal::Bearish
        } else {
            FlowSignal::Neutral
        };

        let recommended_skew = (imbalance * 0.01).clamp(-0.01, 0.01);

        FlowState {
            signal,
            imbalance,
            recommended_skew,
            event_count: self.events.len(),
        }
    }

    pub fn should_widen_spread(&mut self) -> bool {
        self.should_widen_spread_at(Instant::now())
    }

    fn should_widen_spread_at(&mut self, now: Instant) -> bool {
        self.prune(now);
        if self.events.len() <= 10 {
            return false;
        }
        let aggressive = self.events.iter().filter(|e| e.is_aggressive).count();
        aggressive as f64 / self.events.len() as f64 > 0.5
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fewer_than_five_events_is_neutral() {
        let mut flow = FlowAnalyzer::new(60, 30.0);
        let t0 = Instant::now();
        flow.record_trade_at(0.5, 1.0, Side::Buy, false, t0);
        let state = flow.get_state_at(t0);
        assert_eq!(state.signal, FlowSignal::Neutral);
    }

    #[test]
    fn bullish_skew_from_buy_heavy_flow() {
        let mut flow = FlowAnalyzer::new(60, 30.0);
        let t0 = Instant::now();
        for _ in 0..8 {
            flow.record_trade_at(0.5, 10.0, Side::Buy, false, t0);
        }
        for _ in 0..2 {
            flow.record_trade_at(0.5, 10.0, Side::Sell, false, t0);
        }
        let state = flow.get_state_at(t0);
        assert_eq!(state.signal, FlowSignal::StronglyBullish);
        assert!(state.recommended_skew > 0.0);
    }

    #[test]
    fn widen_spread_on_aggressive_heavy_flow() {
        let mut flow = FlowAnalyzer::new(60, 30.0);
        let t0 = Instant::now();
        for _ in 0..11 {
            flow.record_trade_at(0.5, 1.0, Side::Buy, true, t0);
        }
        assert!(flow.should_widen_spread_at(t0));
    }
}
