//! In-memory book state keyed by asset; sequence/freshness tracking.
//! Grounded on the teacher's `PolymarketMarketWsCache` book cache
//! (`ws_raw_ref.rs.bak`), generalized from a single-purpose WS cache into
//! the store the feed facade and quoter read through.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::models::{OrderBook, PriceLevel};
use crate::money::{Price, Size};

#[derive(Debug, Clone)]
struct AssetState {
    book: Arc<OrderBook>,
    last_trade_price: Option<Price>,
    last_trade_size: Option<Size>,
    last_trade_side: Option<crate::models::Side>,
    last_mutation: DateTime<Utc>,
    expected_seq: Option<u64>,
    gap_count: u64,
}

impl AssetState {
    fn new(asset_id: &str) -> Self {
        Self {
            book: Arc::new(OrderBook {
                asset_id: asset_id.to_string(),
                bids: Vec::new(),
                asks: Vec::new(),
                timestamp: None,
            }),
            last_trade_price: None,
            last_trade_size: None,
            last_trade_side: None,
            last_mutation: Utc::now(),
            expected_seq: None,
            gap_count: 0,
        }
    }
}

/// Per-asset book state plus the store-wide heartbeat. Writes come from
/// exactly one worker (the feed worker); reads are lock-free snapshots via
/// `Arc<OrderBook>`.
pub struct MarketDataStore {
    assets: RwLock<HashMap<String, AssetState>>,
    last_any_message: RwLock<DateTime<Utc>>,
    stale_threshold_secs: f64,
}

impl MarketDataStore {
    pub fn new(stale_threshold_secs: f64) -> Self {
        Self {
            assets: RwLock::new(HashMap::new()),
            last_any_message: RwLock::new(Utc::now()),
            stale_threshold_secs,
        }
    }

    pub fn register(&self, asset_id: &str) {
        self.assets
            .write()
            .entry(asset_id.to_string())
            .or_insert_with(|| AssetState::new(asset_id));
    }

    pub fn unregister(&self, asset_id: &str) {
        self.assets.write().remove(asset_id);
    }

    fn touch(&self, asset_id: &str, now: DateTime<Utc>) {
        *self.last_any_message.write() = now;
        if let Some(state) = self.assets.write().get_mut(asset_id) {
            state.last_mutation = now;
        }
    }

    pub fn apply_book(
        &self,
        asset_id: &str,
        mut bids: Vec<PriceLevel>,
        mut asks: Vec<PriceLevel>,
        ts: Option<DateTime<Utc>>,
    ) {
        bids.sort_by(|a, b| b.price.cmp(&a.price));
        asks.sort_by(|a, b| a.price.cmp(&b.price));
        let now = Utc::now();
        {
            let mut assets = self.assets.write();
            let state = assets
                .entry(asset_id.to_string())
                .or_insert_with(|| AssetState::new(asset_id));
            state.book = Arc::new(OrderBook {
                asset_id: asset_id.to_string(),
                bids,
                asks,
                timestamp: ts,
            });
            state.last_mutation = now;
        }
        *self.last_any_message.write() = now;
    }

    pub fn apply_price(&self, asset_id: &str, price: Price) {
        let now = Utc::now();
        {
            let mut assets = self.assets.write();
            let state = assets
                .entry(asset_id.to_string())
                .or_insert_with(|| AssetState::new(asset_id));
            state.last_trade_price = Some(price);
        }
        self.touch(asset_id, now);
    }

    pub fn apply_trade(
        &self,
        asset_id: &str,
        price: Price,
        size: Option<Size>,
        side: Option<crate::models::Side>,
    ) {
        let now = Utc::now();
        {
            let mut assets = self.assets.write();
            let state = assets
                .entry(asset_id.to_string())
                .or_insert_with(|| AssetState::new(asset_id));
            state.last_trade_price = Some(price);
            state.last_trade_size = size;
            state.last_trade_side = side;
        }
        self.touch(asset_id, now);
    }

    /// Returns false iff `seq != last+1` and a predecessor exists; always
    /// accepts a sequence with no recorded predecessor.
    pub fn check_sequence(&self, asset_id: &str, seq: Option<u64>) -> bool {
        let Some(seq) = seq else { return true };
        let mut assets = self.assets.write();
        let state = assets
            .entry(asset_id.to_string())
            .or_insert_with(|| AssetState::new(asset_id));
        let ok = match state.expected_seq {
            None => true,
            Some(expected) => seq == expected,
        };
        if !ok {
            state.gap_count += 1;
        }
        state.expected_seq = Some(seq + 1);
        ok
    }

    pub fn clear_gaps(&self, asset_id: &str) {
        if let Some(state) = self.assets.write().get_mut(asset_id) {
            state.gap_count = 0;
        }
    }

    pub fn order_book(&self, asset_id: &str) -> Option<Arc<OrderBook>> {
        self.assets.read().get(asset_id).map(|s| s.book.clone())
    }

    pub fn mid(&self, asset_id: &str) -> Option<Price> {
        self.order_book(asset_id)?.mid()
    }

    pub fn best_bid(&self, asset_id: &str) -> Option<Price> {
        self.order_book(asset_id)?.best_bid()
    }

    pub fn best_ask(&self, asset_id: &str) -> Option<Price> {
        self.order_book(asset_id)?.best_ask()
    }

    pub fn spread(&self, asset_id: &str) -> Option<Price> {
        self.order_book(asset_id)?.spread()
    }

    pub fn seconds_since_mutation(&self, asset_id: &str) -> Option<f64> {
        let assets = self.assets.read();
        let state = assets.get(asset_id)?;
        Some((Utc::now() - state.last_mutation).num_milliseconds() as f64 / 1000.0)
    }

    pub fn seconds_since_any_message(&self) -> f64 {
        (Utc::now() - *self.last_any_message.read()).num_milliseconds() as f64 / 1000.0
    }

    pub fn is_fresh(&self, asset_id: &str) -> bool {
        self.seconds_since_mutation(asset_id)
            .map(|age| age < self.stale_threshold_secs)
            .unwrap_or(false)
    }

    pub fn has_gaps(&self) -> bool {
        self.assets.read().values().any(|s| s.gap_count > 0)
    }

    pub fn gap_count(&self, asset_id: &str) -> u64 {
        self.assets.read().get(asset_id).map(|s| s.gap_count).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn level(p: Price, s: Size) -> PriceLevel {
        PriceLevel { price: p, size: s }
    }

    #[test]
    fn apply_book_sorts_and_derives() {
        let store = MarketDataStore::new(10.0);
        store.register("tok");
        store.apply_book(
            "tok",
            vec![level(dec!(0.47), dec!(5)), level(dec!(0.48), dec!(5))],
            vec![level(dec!(0.53), dec!(5)), level(dec!(0.52), dec!(5))],
            None,
        );
        assert_eq!(store.best_bid("tok"), Some(dec!(0.48)));
        assert_eq!(store.best_ask("tok"), Some(dec!(0.52)));
        assert!(store.is_fresh("tok"));
    }

    #[test]
    fn sequence_gap_detection() {
        let store = MarketDataStore::new(10.0);
        assert!(store.check_sequence("tok", Some(1)));
        assert!(store.check_sequence("tok", Some(2)));
        assert!(!store.check_sequence("tok", Some(5)));
        assert!(store.has_gaps());
        store.clear_gaps("tok");
        assert!(!store.has_gaps());
    }

    #[test]
    fn sequence_without_predecessor_accepted() {
        let store = MarketDataStore::new(10.0);
        assert!(store.check_sequence("tok", None));
    }
}
