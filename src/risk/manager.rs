//! Risk manager aggregator: kill switch, error-rate governor, daily P&L,
//! exposure checks. Wires together the dynamic-limit manager, the
//! adverse-selection detector, the Kelly sizer, and portfolio risk behind
//! a single `check()` cascade. Grounded on the original bot's `RiskManager`
//! orchestration; cascade per §4.18.

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use tracing::warn;

use crate::models::{RiskEvent, RiskStatus};
use crate::risk::adverse_selection::AdverseSelectionDetector;
use crate::risk::correlation::PortfolioRisk;
use crate::risk::dynamic_limits::DynamicLimitManager;
use crate::risk::kelly::KellySizer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    Enforce,
    DataGather,
}

pub struct CheckOutcome {
    pub status: RiskStatus,
    pub reason: String,
}

pub struct RiskManager {
    mode: ExecutionMode,
    killed: bool,
    kill_reason: Option<String>,
    start_time: Instant,
    error_ring: VecDeque<Instant>,
    cooldown_until: Option<Instant>,
    daily_pnl: f64,
    trade_count: u64,
    events: Vec<RiskEvent>,
    max_errors_per_minute: u32,
    error_cooldown: Duration,
    max_daily_loss: f64,
    max_total_exposure: f64,
    base_position_limit: f64,
    vol_multiplier: f64,
    positions: HashMap<String, f64>,
    entry_prices: HashMap<String, f64>,
    unrealized_pnl: f64,

    pub dynamic_limits: DynamicLimitManager,
    pub adverse_selection: AdverseSelectionDetector,
    pub kelly: KellySizer,
    pub portfolio: PortfolioRisk,
}

impl RiskManager {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        mode: ExecutionMode,
        max_errors_per_minute: u32,
        error_cooldown_secs: f64,
        max_daily_loss: f64,
        max_total_exposure: f64,
        base_position_limit: f64,
        dynamic_limits: DynamicLimitManager,
        adverse_selection: AdverseSelectionDetector,
        kelly: KellySizer,
        portfolio: PortfolioRisk,
    ) -> Self {
        Self {
            mode,
            killed: false,
            kill_reason: None,
            start_time: Instant::now(),
            error_ring: VecDeque::with_capacity(100),
            cooldown_until: None,
            daily_pnl: 0.0,
            trade_count: 0,
            events: Vec::new(),
            max_errors_per_minute,
            error_cooldown: Duration::from_secs_f64(error_cooldown_secs),
            max_daily_loss,
            max_total_exposure,
            base_position_limit,
            vol_multiplier: 1.0,
            positions: HashMap::new(),
            entry_prices: HashMap::new(),
            unrealized_pnl: 0.0,
            dynamic_limits,
            adverse_selection,
            kelly,
            portfolio,
        }
    }

    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    pub fn record_error(&mut self) {
        if self.error_ring.len() >= 100 {
            self.error_ring.pop_front();
        }
        self.error_ring.push_back(Instant::now());
    }

    fn errors_last_minute(&self, now: Instant) -> usize {
        self.error_ring
            .iter()
            .filter(|t| now.duration_since(**t) <= Duration::from_secs(60))
            .count()
    }

    fn limit_mult(m: f64) -> f64 {
        if m <= 1.0 {
            1.0
        } else if m >= 2.0 {
            0.5
        } else {
            1.0 - (m - 1.0) * 0.5
        }
    }

    pub fn set_volatility_multiplier(&mut self, m: f64) {
        self.vol_multiplier = m;
    }

    pub fn vol_adjusted_position_limit(&self) -> f64 {
        self.base_position_limit * Self::limit_mult(self.vol_multiplier)
    }

    pub fn update_position(&mut self, asset_id: &str, position: f64) {
        self.positions.insert(asset_id.to_string(), position);
    }

    pub fn update_unrealized_pnl(&mut self, asset_id: &str, position: f64, mid: f64, entry: Option<f64>) {
        let entry_price = *self
            .entry_prices
            .entry(asset_id.to_string())
            .or_insert_with(|| entry.unwrap_or(mid));
        self.unrealized_pnl = position * (mid - entry_price);
    }

    pub fn record_trade(&mut self, realized_pnl: Option<f64>, fee: f64) {
        self.trade_count += 1;
        if let Some(pnl) = realized_pnl {
            self.daily_pnl += pnl - fee;
        }
    }

    pub fn reset_kill_switch(&mut self) {
        self.killed = false;
        self.kill_reason = None;
    }

    fn push_event(&mut self, status: RiskStatus, reason: &str, enforced: bool) {
        self.events.push(RiskEvent {
            timestamp: chrono::Utc::now(),
            status,
            reason: reason.to_string(),
            details: String::new(),
            enforced,
        });
    }

    pub fn events(&self) -> &[RiskEvent] {
        &self.events
    }

    fn evaluate(&mut self, asset_ids: Option<&[String]>) -> CheckOutcome {
        let now = Instant::now();

        if self.killed {
            let reason = self.kill_reason.clone().unwrap_or_else(|| "killed".to_string());
            return CheckOutcome {
                status: RiskStatus::Stop,
                reason,
            };
        }

        if let Some(until) = self.cooldown_until {
            if now < until {
                return CheckOutcome {
                    status: RiskStatus::Stop,
                    reason: "error cooldown active".to_string(),
                };
            }
            self.cooldown_until = None;
        }

        if self.errors_last_minute(now) as u32 >= self.max_errors_per_minute {
            self.cooldown_until = Some(now + self.error_cooldown);
            return CheckOutcome {
                status: RiskStatus::Stop,
                reason: "error rate exceeded".to_string(),
            };
        }

        if self.daily_pnl <= -self.max_daily_loss {
            return CheckOutcome {
                status: RiskStatus::Stop,
                reason: "daily loss limit breached".to_string(),
            };
        }

        if self.daily_pnl < -0.8 * self.max_daily_loss {
            return CheckOutcome {
                status: RiskStatus::Warn,
                reason: "approaching daily loss limit".to_string(),
            };
        }

        let limit = self.vol_adjusted_position_limit();
        let relevant: Vec<&String> = match asset_ids {
            Some(ids) => ids.iter().collect(),
            None => self.positions.keys().collect(),
        };
        for asset_id in &relevant {
            if let Some(position) = self.positions.get(asset_id.as_str()) {
                if position.abs() > limit {
                    return CheckOutcome {
                        status: RiskStatus::Warn,
                        reason: format!("position limit exceeded on {asset_id}"),
                    };
                }
            }
        }

        let total_exposure: f64 = self.positions.values().map(|p| p.abs()).sum();
        if total_exposure > self.max_total_exposure {
            return CheckOutcome {
                status: RiskStatus::Warn,
                reason: "total exposure limit exceeded".to_string(),
            };
        }

        CheckOutcome {
            status: RiskStatus::Ok,
            reason: String::new(),
        }
    }

    pub fn check(&mut self, asset_ids: Option<&[String]>) -> CheckOutcome {
        let outcome = self.evaluate(asset_ids);

        if outcome.status == RiskStatus::Stop && self.daily_pnl <= -self.max_daily_loss && !self.killed {
            match self.mode {
                ExecutionMode::Enforce => {
                    self.killed = true;
                    self.kill_reason = Some(outcome.reason.clone());
                }
                ExecutionMode::DataGather => {
                    self.push_event(RiskStatus::Stop, &outcome.reason, false);
                    warn!(reason = %outcome.reason, "risk stop observed in data-gather mode");
                    return CheckOutcome {
                        status: RiskStatus::Ok,
                        reason: String::new(),
                    };
                }
            }
        }

        match self.mode {
            ExecutionMode::Enforce => outcome,
            ExecutionMode::DataGather => {
                if outcome.status != RiskStatus::Ok {
                    self.push_event(outcome.status, &outcome.reason, false);
                    CheckOutcome {
                        status: RiskStatus::Ok,
                        reason: String::new(),
                    }
                } else {
                    outcome
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::risk::correlation::CorrelationTracker;

    fn build(mode: ExecutionMode) -> RiskManager {
        RiskManager::new(
            mode,
            10,
            60.0,
            500.0,
            1000.0,
            100.0,
            DynamicLimitManager::new(100.0, 500.0, 0.2, 2.0, 0.3),
            AdverseSelectionDetector::new(0.005, 0.4, 0.6, 300),
            KellySizer::new(0.25, 0.10, 20),
            PortfolioRisk::new(CorrelationTracker::new(100, 20), 0.5, 500.0),
        )
    }

    #[test]
    fn daily_loss_breach_kills_in_enforce_mode() {
        let mut manager = build(ExecutionMode::Enforce);
        manager.record_trade(Some(-600.0), 0.0);
        let outcome = manager.check(None);
        assert_eq!(outcome.status, RiskStatus::Stop);
        assert!(manager.killed);
    }

    #[test]
    fn data_gather_mode_never_returns_non_ok_but_logs_event() {
        let mut manager = build(ExecutionMode::DataGather);
        manager.record_trade(Some(-600.0), 0.0);
        let outcome = manager.check(None);
        assert_eq!(outcome.status, RiskStatus::Ok);
        assert_eq!(manager.events().len(), 1);
        assert!(!manager.events()[0].enforced);
        assert!(!manager.killed);
    }

    #[test]
    fn vol_adjusted_limit_decreases_linearly() {
        let mut manager = build(ExecutionMode::Enforce);
        manager.set_volatility_multiplier(1.5);
        assert!((manager.vol_adjusted_position_limit() - 75.0).abs() < 1e-9);
        manager.set_volatility_multiplier(2.5);
        assert!((manager.vol_adjusted_position_limit() - 50.0).abs() < 1e-9);
    }

    #[test]
    fn exposure_warn_does_not_kill() {
        let mut manager = build(ExecutionMode::Enforce);
        manager.update_position("a", 1100.0);
        let outcome = manager.check(None);
        assert_eq!(outcome.status, RiskStatus::Warn);
        assert!(!manager.killed);
    }
}
