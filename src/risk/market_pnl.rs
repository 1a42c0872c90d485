//! FIFO realized-P&L ledger, one per market. Authoritative over the
//! inventory manager's VWAP-based unrealized figure for *realized* P&L —
//! see DESIGN.md for the resolution of this overlap.

use std::collections::VecDeque;

use crate::money::{Price, Size};
use crate::models::Side;

struct Lot {
    size: Size,
    price: Price,
}

pub struct MarketPnlTracker {
    long_lots: VecDeque<Lot>,
    short_lots: VecDeque<Lot>,
    realized: Price,
    fee_paid: Price,
}

impl Default for MarketPnlTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl MarketPnlTracker {
    pub fn new() -> Self {
        Self {
            long_lots: VecDeque::new(),
            short_lots: VecDeque::new(),
            realized: Price::ZERO,
            fee_paid: Price::ZERO,
        }
    }

    pub fn realized_pnl(&self) -> Price {
        self.realized
    }

    pub fn fee_paid(&self) -> Price {
        self.fee_paid
    }

    /// Record a fill, matching against the opposite inventory stack FIFO
    /// before opening a new lot on the same-side stack.
    pub fn record_fill(&mut self, side: Side, mut size: Size, price: Price, fee: Price) {
        self.fee_paid += fee;
        let (matching, opening) = match side {
            Side::Buy => (&mut self.short_lots, &mut self.long_lots),
            Side::Sell => (&mut self.long_lots, &mut self.short_lots),
        };

        while size > Size::ZERO {
            let Some(front) = matching.front_mut() else {
                break;
            };
            let matched = front.size.min(size);
            let pnl_per_unit = match side {
                Side::Buy => front.price - price,
                Side::Sell => price - front.price,
            };
            self.realized += pnl_per_unit * matched;
            front.size -= matched;
            size -= matched;
            if front.size.is_zero() {
                matching.pop_front();
            }
        }

        if size > Size::ZERO {
            opening.push_back(Lot { size, price });
        }
    }

    pub fn open_long(&self) -> Size {
        self.long_lots.iter().map(|l| l.size).sum()
    }

    pub fn open_short(&self) -> Size {
        self.short_lots.iter().map(|l| l.size).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn round_trip_realizes_profit() {
        let mut tracker = MarketPnlTracker::new();
        tracker.record_fill(Side::Buy, dec!(10), dec!(0.40), Price::ZERO);
        tracker.record_fill(Side::Sell, dec!(10), dec!(0.55), Price::ZERO);
        assert_eq!(tracker.realized_pnl(), dec!(1.50));
        assert_eq!(tracker.open_long(), Size::ZERO);
    }

    #[test]
    fn partial_fill_leaves_remaining_lot() {
        let mut tracker = MarketPnlTracker::new();
        tracker.record_fill(Side::Buy, dec!(10), dec!(0.40), Price::ZERO);
        tracker.record_fill(Side::Sell, dec!(4), dec!(0.50), Price::ZERO);
        assert_eq!(tracker.realized_pnl(), dec!(0.40));
        assert_eq!(tracker.open_long(), dec!(6));
    }

    #[test]
    fn fees_tracked_separately_from_realized_pnl() {
        let mut tracker = MarketPnlTracker::new();
        tracker.record_fill(Side::Buy, dec!(10), dec!(0.40), dec!(0.02));
        assert_eq!(tracker.fee_paid(), dec!(0.02));
        assert_eq!(tracker.realized_pnl(), Price::ZERO);
    }
}
