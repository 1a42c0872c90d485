//! Core data model: order books, markets, orders, trades, signals.
//! Grounded on the source bot's dataclasses (`models.py`, `markets.py`)
//! and expressed with `serde`/`chrono` the way the teacher crate does.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::money::{Price, Size};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "BUY",
            Side::Sell => "SELL",
        }
    }

    pub fn opposite(&self) -> Side {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderStatus {
    Live,
    Matched,
    Cancelled,
    Expired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TimeInForce {
    Gtc,
    Gtd,
    Fok,
    Fak,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceLevel {
    pub price: Price,
    pub size: Size,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderBook {
    pub asset_id: String,
    /// Sorted descending by price.
    pub bids: Vec<PriceLevel>,
    /// Sorted ascending by price.
    pub asks: Vec<PriceLevel>,
    pub timestamp: Option<DateTime<Utc>>,
}

impl OrderBook {
    pub fn best_bid(&self) -> Option<Price> {
        self.bids.first().map(|l| l.price)
    }

    pub fn best_ask(&self) -> Option<Price> {
        self.asks.first().map(|l| l.price)
    }

    pub fn spread(&self) -> Option<Price> {
        Some(self.best_ask()? - self.best_bid()?)
    }

    pub fn mid(&self) -> Option<Price> {
        let bid = self.best_bid()?;
        let ask = self.best_ask()?;
        Some((bid + ask) / rust_decimal_macros::dec!(2))
    }

    pub fn sort(&mut self) {
        self.bids
            .sort_by(|a, b| b.price.partial_cmp(&a.price).unwrap());
        self.asks
            .sort_by(|a, b| a.price.partial_cmp(&b.price).unwrap());
    }

    /// Invariant check used by tests and by the data store after every apply.
    pub fn is_consistent(&self) -> bool {
        if let (Some(b), Some(a)) = (self.best_bid(), self.best_ask()) {
            if b >= a {
                return false;
            }
        }
        self.bids.windows(2).all(|w| w[0].price >= w[1].price)
            && self.asks.windows(2).all(|w| w[0].price <= w[1].price)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Outcome {
    pub name: String,
    pub asset_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Market {
    pub condition_id: String,
    pub question: String,
    pub slug: String,
    pub outcomes: Vec<Outcome>,
    pub active: bool,
    pub closed: bool,
    pub volume_24h: f64,
    pub liquidity: f64,
    pub end_date: Option<DateTime<Utc>>,
    pub description: Option<String>,
}

impl Market {
    /// The two complementary outcome assets of a binary market, if present.
    pub fn yes_no_pair(&self) -> Option<Pair> {
        let yes = self
            .outcomes
            .iter()
            .find(|o| o.name.eq_ignore_ascii_case("yes"))?;
        let no = self
            .outcomes
            .iter()
            .find(|o| o.name.eq_ignore_ascii_case("no"))?;
        Some(Pair {
            condition_id: self.condition_id.clone(),
            yes_asset_id: yes.asset_id.clone(),
            no_asset_id: no.asset_id.clone(),
            market_slug: self.slug.clone(),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    pub asset_id: String,
    pub side: Side,
    pub price: Price,
    pub size: Size,
    pub filled: Size,
    pub status: OrderStatus,
    pub time_in_force: TimeInForce,
    pub is_simulated: bool,
    pub created_at: DateTime<Utc>,
    pub expiration: Option<DateTime<Utc>>,
}

impl Order {
    pub fn new_live(
        asset_id: impl Into<String>,
        side: Side,
        price: Price,
        size: Size,
        is_simulated: bool,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            asset_id: asset_id.into(),
            side,
            price,
            size,
            filled: Size::ZERO,
            status: OrderStatus::Live,
            time_in_force: TimeInForce::Gtc,
            is_simulated,
            created_at: Utc::now(),
            expiration: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn is_valid(&self) -> bool {
        let size_ok = self.filled >= Size::ZERO && self.filled <= self.size;
        let matched_ok = self.status != OrderStatus::Matched || self.filled == self.size;
        let cancelled_ok = self.status != OrderStatus::Cancelled || self.filled < self.size;
        let price_ok = self.price > Price::ZERO && self.price < Price::ONE;
        size_ok && matched_ok && cancelled_ok && price_ok
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trade {
    pub id: String,
    pub order_id: String,
    pub asset_id: String,
    pub side: Side,
    pub price: Price,
    pub size: Size,
    pub fee: Price,
    pub timestamp: DateTime<Utc>,
    pub is_simulated: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pair {
    pub condition_id: String,
    pub yes_asset_id: String,
    pub no_asset_id: String,
    pub market_slug: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ArbitrageType {
    None,
    SellBoth,
    BuyBoth,
    Skew,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArbitrageSignal {
    #[serde(rename = "type")]
    pub kind: ArbitrageType,
    pub yes_price: f64,
    pub no_price: f64,
    pub sum: f64,
    pub profit_bps: f64,
    pub confidence: f64,
    pub action_description: String,
}

impl ArbitrageSignal {
    pub fn is_actionable(&self) -> bool {
        self.kind != ArbitrageType::None && self.profit_bps > 10.0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FillRecord {
    pub fill_id: u64,
    pub timestamp: DateTime<Utc>,
    pub price: f64,
    pub side: Side,
    pub size: f64,
    pub price_after: Option<f64>,
    pub seconds_to_price_after: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskStatus {
    Ok,
    Warn,
    Stop,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskEvent {
    pub timestamp: DateTime<Utc>,
    pub status: RiskStatus,
    pub reason: String,
    pub details: String,
    pub enforced: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn book_mid_and_spread() {
        let book = OrderBook {
            asset_id: "tok".into(),
            bids: vec![PriceLevel {
                price: dec!(0.48),
                size: dec!(10),
            }],
            asks: vec![PriceLevel {
                price: dec!(0.52),
                size: dec!(10),
            }],
            timestamp: None,
        };
        assert_eq!(book.mid(), Some(dec!(0.50)));
        assert_eq!(book.spread(), Some(dec!(0.04)));
        assert!(book.is_consistent());
    }

    #[test]
    fn inconsistent_book_detected() {
        let book = OrderBook {
            asset_id: "tok".into(),
            bids: vec![PriceLevel {
                price: dec!(0.55),
                size: dec!(1),
            }],
            asks: vec![PriceLevel {
                price: dec!(0.50),
                size: dec!(1),
            }],
            timestamp: None,
        };
        assert!(!book.is_consistent());
    }

    #[test]
    fn order_validity_invariants() {
        let mut order = Order::new_live("tok", Side::Buy, dec!(0.5), dec!(10), true);
        assert!(order.is_valid());
        order.status = OrderStatus::Matched;
        order.filled = dec!(10);
        assert!(order.is_valid());
        order.filled = dec!(5);
        assert!(!order.is_valid());
    }

    #[test]
    fn yes_no_pair_resolution() {
        let market = Market {
            condition_id: "c1".into(),
            question: "q".into(),
            slug: "s".into(),
            outcomes: vec![
                Outcome {
                    name: "Yes".into(),
                    asset_id: "y1".into(),
                },
                Outcome {
                    name: "No".into(),
                    asset_id: "n1".into(),
                },
            ],
            active: true,
            closed: false,
            volume_24h: 0.0,
            liquidity: 0.0,
            end_date: None,
            description: None,
        };
        let pair = market.yes_no_pair().unwrap();
        assert_eq!(pair.yes_asset_id, "y1");
        assert_eq!(pair.no_asset_id, "n1");
    }
}
