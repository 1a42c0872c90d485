//! Order-subsystem boundary: one interface, two implementations chosen at
//! construction (simulator vs live adapter). No conditional in the quoter
//! (§9 Design Notes — feature gating of DRY_RUN).

pub mod live;
pub mod rate_limit;
pub mod simulator;

use async_trait::async_trait;

use crate::error::CoreResult;
use crate::models::{Order, Side, Trade};
use crate::money::{Price, Size};

#[async_trait]
pub trait OrderExecutor: Send + Sync {
    async fn place_order(&self, asset_id: &str, side: Side, price: Price, size: Size)
        -> CoreResult<Order>;
    async fn cancel_order(&self, order_id: &str) -> CoreResult<()>;
    async fn open_orders(&self, asset_id: Option<&str>) -> CoreResult<Vec<Order>>;
    async fn trade_history(&self, asset_id: Option<&str>) -> CoreResult<Vec<Trade>>;
    fn is_simulated(&self) -> bool;
}

pub use live::LiveOrderAdapter;
pub use simulator::OrderSimulator;
