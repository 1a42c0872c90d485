//! Deterministic in-memory order matching used in dry-run mode.
//! Grounded on the original bot's simulated order book and the data-model
//! invariants from `models.rs` (filled/status/price bounds).

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use uuid::Uuid;

use crate::error::{CoreError, CoreResult};
use crate::exec::OrderExecutor;
use crate::models::{Order, OrderStatus, Side, Trade};
use crate::money::{round_money, Price, Size};

struct SimState {
    orders: HashMap<String, Order>,
    trades: Vec<Trade>,
    position: HashMap<String, Size>,
}

/// Owns its own orders/trades/positions exclusively; the quoter never
/// mutates them directly (§3 ownership, §5 simulator-state policy).
pub struct OrderSimulator {
    fee_rate: f64,
    state: RwLock<SimState>,
}

impl OrderSimulator {
    pub fn new(fee_rate: f64) -> Self {
        Self {
            fee_rate,
            state: RwLock::new(SimState {
                orders: HashMap::new(),
                trades: Vec::new(),
                position: HashMap::new(),
            }),
        }
    }

    pub fn position(&self, asset_id: &str) -> Size {
        self.state
            .read()
            .position
            .get(asset_id)
            .copied()
            .unwrap_or(Size::ZERO)
    }

    /// Walks LIVE orders for `asset_id` and fills any that cross the touch.
    /// BUY fills if `price >= current_ask`; SELL fills if `price <= current_bid`.
    pub fn check_fills(
        &self,
        asset_id: &str,
        current_bid: Option<Price>,
        current_ask: Option<Price>,
    ) -> Vec<Trade> {
        let mut fills = Vec::new();
        let mut state = self.state.write();

        let to_fill: Vec<String> = state
            .orders
            .values()
            .filter(|o| {
                o.asset_id == asset_id
                    && o.status == OrderStatus::Live
                    && match o.side {
                        Side::Buy => current_ask.map(|a| o.price >= a).unwrap_or(false),
                        Side::Sell => current_bid.map(|b| o.price <= b).unwrap_or(false),
                    }
            })
            .map(|o| o.id.clone())
            .collect();

        for id in to_fill {
            let order = state.orders.get_mut(&id).expect("order exists");
            order.filled = order.size;
            order.status = OrderStatus::Matched;
            let fee = round_money(order.price * order.size * rust_decimal::Decimal::try_from(self.fee_rate).unwrap());
            let trade = Trade {
                id: Uuid::new_v4().to_string(),
                order_id: order.id.clone(),
                asset_id: order.asset_id.clone(),
                side: order.side,
                price: order.price,
                size: order.size,
                fee,
                timestamp: Utc::now(),
                is_simulated: true,
            };

            let delta = match order.side {
                Side::Buy => order.size,
                Side::Sell => -order.size,
            };
            *state.position.entry(asset_id.to_string()).or_insert(Size::ZERO) += delta;

            state.trades.push(trade.clone());
            fills.push(trade);
        }

        fills
    }
}

#[async_trait]
impl OrderExecutor for OrderSimulator {
    async fn place_order(
        &self,
        asset_id: &str,
        side: Side,
        price: Price,
        size: Size,
    ) -> CoreResult<Order> {
        if price <= Price::ZERO || price >= Price::ONE {
            return Err(CoreError::Validation(format!(
                "price {price} out of (0,1)"
            )));
        }
        if size <= Size::ZERO {
            return Err(CoreError::Validation("size must be positive".to_string()));
        }
        let order = Order::new_live(asset_id, side, price, size, true);
        self.state
            .write()
            .orders
            .insert(order.id.clone(), order.clone());
        Ok(order)
    }

    async fn cancel_order(&self, order_id: &str) -> CoreResult<()> {
        let mut state = self.state.write();
        let order = state
            .orders
            .get_mut(order_id)
            .ok_or_else(|| CoreError::Validation(format!("unknown order {order_id}")))?;
        if order.status != OrderStatus::Live {
            return Err(CoreError::Validation("order not live".to_string()));
        }
        order.status = OrderStatus::Cancelled;
        Ok(())
    }

    async fn open_orders(&self, asset_id: Option<&str>) -> CoreResult<Vec<Order>> {
        Ok(self
            .state
            .read()
            .orders
            .values()
            .filter(|o| o.status == OrderStatus::Live)
            .filter(|o| asset_id.map(|a| a == o.asset_id).unwrap_or(true))
            .cloned()
            .collect())
    }

    async fn trade_history(&self, asset_id: Option<&str>) -> CoreResult<Vec<Trade>> {
        Ok(self
            .state
            .read()
            .trades
            .iter()
            .filter(|t| asset_id.map(|a| a == t.asset_id).unwrap_or(true))
            .cloned()
            .collect())
    }

    fn is_simulated(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn buy_fills_when_price_crosses_ask() {
        let sim = OrderSimulator::new(0.001);
        sim.place_order("tok", Side::Buy, dec!(0.55), dec!(10))
            .await
            .unwrap();
        let fills = sim.check_fills("tok", Some(dec!(0.48)), Some(dec!(0.52)));
        assert_eq!(fills.len(), 1);
        assert_eq!(sim.position("tok"), dec!(10));
    }

    #[tokio::test]
    async fn place_cancel_place_round_trip() {
        let sim = OrderSimulator::new(0.001);
        let o1 = sim.place_order("tok", Side::Buy, dec!(0.5), dec!(5)).await.unwrap();
        sim.cancel_order(&o1.id).await.unwrap();
        let o2 = sim.place_order("tok", Side::Buy, dec!(0.5), dec!(5)).await.unwrap();
        assert_eq!(o1.side, o2.side);
        assert_eq!(o1.price, o2.price);
        assert_eq!(o1.size, o2.size);
        assert_ne!(o1.id, o2.id);
    }

    #[tokio::test]
    async fn invalid_price_rejected() {
        let sim = OrderSimulator::new(0.001);
        let result = sim.place_order("tok", Side::Buy, dec!(1.5), dec!(5)).await;
        assert!(result.is_err());
    }
}
