//! Per-asset inventory skew: quote-side bias and size throttling as a
//! position approaches its limit. Grounded on the original bot's inventory
//! manager; formulas per §4.9.

use crate::money::{Price, Size};
use rust_decimal::prelude::{Signed, ToPrimitive};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InventoryClass {
    Neutral,
    Long,
    Short,
    MaxLong,
    MaxShort,
}

#[derive(Debug, Clone, Copy)]
pub struct SkewResult {
    pub rho: f64,
    pub bid_skew: f64,
    pub ask_skew: f64,
    pub bid_size_mult: f64,
    pub ask_size_mult: f64,
    pub class: InventoryClass,
}

pub struct InventoryManager {
    limit: Size,
    skew_max: f64,
    size_reduction_start: f64,
    min_size_mult: f64,
    position: Size,
    vwap_entry: Option<Price>,
}

impl InventoryManager {
    pub fn new(limit: Size, skew_max: f64, size_reduction_start: f64, min_size_mult: f64) -> Self {
        Self {
            limit,
            skew_max,
            size_reduction_start,
            min_size_mult,
            position: Size::ZERO,
            vwap_entry: None,
        }
    }

    pub fn position(&self) -> Size {
        self.position
    }

    pub fn record_fill(&mut self, side_is_buy: bool, size: Size, price: Price) {
        let signed = if side_is_buy { size } else { -size };
        let new_position = self.position + signed;
        if signed.signum() == self.position.signum() || self.position.is_zero() {
            let old_abs = self.position.abs();
            let add_abs = signed.abs();
            let total_abs = old_abs + add_abs;
            if total_abs > Size::ZERO {
                let old_vwap = self.vwap_entry.unwrap_or(price);
                self.vwap_entry = Some((old_vwap * old_abs + price * add_abs) / total_abs);
            }
        } else if new_position.signum() != self.position.signum() && !new_position.is_zero() {
            self.vwap_entry = Some(price);
        } else if new_position.is_zero() {
            self.vwap_entry = None;
        }
        self.position = new_position;
    }

    pub fn unrealized_pnl(&self, mid: Price) -> Price {
        match self.vwap_entry {
            Some(entry) => (mid - entry) * self.position,
            None => Price::ZERO,
        }
    }

    fn rho(&self) -> f64 {
        if self.limit.is_zero() {
            return 0.0;
        }
        let ratio = (self.position / self.limit).to_f64().unwrap_or(0.0);
        ratio.clamp(-1.0, 1.0)
    }

    fn classify(&self, rho: f64) -> InventoryClass {
        if rho >= 0.9 {
            InventoryClass::MaxLong
        } else if rho <= -0.9 {
            InventoryClass::MaxShort
        } else if rho >= 0.3 {
            InventoryClass::Long
        } else if rho <= -0.3 {
            InventoryClass::Short
        } else {
            InventoryClass::Neutral
        }
    }

    fn size_mult(&self, rho_for_side: f64) -> f64 {
        if rho_for_side <= self.size_reduction_start {
            1.0
        } else {
            let span = 1.0 - self.size_reduction_start;
            let t = ((rho_for_side - self.size_reduction_start) / span).min(1.0);
            1.0 - t * (1.0 - self.min_size_mult)
        }
    }

    pub fn skew(&self) -> SkewResult {
        let rho = self.rho();
        // Only the building side's skew moves; the other side stays at 0
        // (§4.9: long -> bid down, ask unchanged; short -> ask up, bid unchanged).
        let bid_skew = if rho > 0.0 { -rho * self.skew_max } else { 0.0 };
        let ask_skew = if rho < 0.0 { -rho * self.skew_max } else { 0.0 };

        let bid_size_mult = self.size_mult(rho);
        let ask_size_mult = self.size_mult(-rho);

        SkewResult {
            rho,
            bid_skew,
            ask_skew,
            bid_size_mult,
            ask_size_mult,
            class: self.classify(rho),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn neutral_position_has_no_skew() {
        let manager = InventoryManager::new(dec!(100), 0.02, 0.5, 0.2);
        let skew = manager.skew();
        assert_eq!(skew.class, InventoryClass::Neutral);
        assert_eq!(skew.bid_size_mult, 1.0);
        assert_eq!(skew.ask_size_mult, 1.0);
    }

    #[test]
    fn long_position_reduces_building_side() {
        let mut manager = InventoryManager::new(dec!(100), 0.02, 0.5, 0.2);
        manager.record_fill(true, dec!(90), dec!(0.50));
        let skew = manager.skew();
        assert_eq!(skew.class, InventoryClass::MaxLong);
        assert!(skew.bid_size_mult < 1.0);
        assert_eq!(skew.ask_size_mult, 1.0);
        assert!(skew.bid_skew < 0.0);
        assert_eq!(skew.ask_skew, 0.0);
    }

    #[test]
    fn short_position_reduces_ask_side_only() {
        let mut manager = InventoryManager::new(dec!(100), 0.02, 0.5, 0.2);
        manager.record_fill(false, dec!(90), dec!(0.50));
        let skew = manager.skew();
        assert_eq!(skew.class, InventoryClass::MaxShort);
        assert!(skew.ask_skew > 0.0);
        assert_eq!(skew.bid_skew, 0.0);
    }

    #[test]
    fn vwap_tracks_weighted_entry() {
        let mut manager = InventoryManager::new(dec!(100), 0.02, 0.5, 0.2);
        manager.record_fill(true, dec!(10), dec!(0.40));
        manager.record_fill(true, dec!(10), dec!(0.60));
        let pnl = manager.unrealized_pnl(dec!(0.50));
        assert_eq!(pnl, Price::ZERO);
    }
}
