//! Fixed-point money type.
//! Prices and sizes never touch binary floating point on an accounting path;
//! `Decimal` carries exact base-10 arithmetic and rounds half-away-from-zero
//! by default, matching the source bot's `decimal.Decimal` usage.

use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;

pub type Price = Decimal;
pub type Size = Decimal;

/// Default exchange tick size: the minimum price increment.
pub const TICK: Decimal = dec!(0.01);

/// Round a price to the configured tick, half-away-from-zero.
pub fn round_to_tick(price: Decimal, tick: Decimal) -> Decimal {
    if tick.is_zero() {
        return price;
    }
    let units = (price / tick).round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
    units * tick
}

/// Round a decimal to 2 places half-away-from-zero (money display scale).
pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

pub fn clamp(value: Decimal, lo: Decimal, hi: Decimal) -> Decimal {
    if value < lo {
        lo
    } else if value > hi {
        hi
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounds_to_tick() {
        assert_eq!(round_to_tick(dec!(0.4837), TICK), dec!(0.48));
        assert_eq!(round_to_tick(dec!(0.4851), TICK), dec!(0.49));
    }

    #[test]
    fn clamp_bounds() {
        assert_eq!(clamp(dec!(1.5), dec!(0.0), dec!(1.0)), dec!(1.0));
        assert_eq!(clamp(dec!(-0.5), dec!(0.0), dec!(1.0)), dec!(0.0));
        assert_eq!(clamp(dec!(0.5), dec!(0.0), dec!(1.0)), dec!(0.5));
    }
}
