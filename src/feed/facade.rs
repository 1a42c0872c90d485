//! Market-feed facade: orchestrates the WS connection and REST poller with
//! automatic failover, exposing a minimal synchronous-looking read API plus
//! coarse health. Grounded on the teacher's `PolymarketMarketWsCache::spawn`
//! composition pattern in the removed `ws_raw_ref` prototype, generalized
//! into a facade that owns both transports instead of caching WS-only.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tokio::sync::{mpsc, watch};
use tokio::time::interval;
use tracing::{info, warn};

use crate::exec::rate_limit::RateLimiter;
use crate::feed::rest::RestPoller;
use crate::feed::store::MarketDataStore;
use crate::feed::ws::{WsConnection, WsState};
use crate::models::{PriceLevel, Side};
use crate::money::Price;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataSource {
    WebSocket,
    Rest,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
enum WireFrame {
    Book {
        asset_id: String,
        bids: Vec<WireLevel>,
        asks: Vec<WireLevel>,
        #[serde(default)]
        sequence: Option<u64>,
    },
    PriceChange {
        asset_id: String,
        price: String,
    },
    LastTradePrice {
        asset_id: String,
        price: String,
        #[serde(default)]
        size: Option<String>,
        #[serde(default)]
        side: Option<String>,
    },
    TickSizeChange {
        asset_id: String,
        #[allow(dead_code)]
        new_tick_size: String,
    },
}

#[derive(Debug, Deserialize)]
struct WireLevel {
    price: String,
    size: String,
}

pub struct MarketFeed {
    store: Arc<MarketDataStore>,
    ws: Arc<WsConnection>,
    rest: Arc<RestPoller>,
    rest_shutdown: watch::Sender<bool>,
    rest_running: AtomicBool,
    source: std::sync::RwLock<DataSource>,
    ws_healthy_since: std::sync::RwLock<Option<std::time::Instant>>,
    subscribed: std::sync::RwLock<Vec<String>>,
    recovery_delay_secs: f64,
    heartbeat_timeout_secs: f64,
    rest_poll_interval_secs: f64,
    frame_drop_count: Arc<std::sync::atomic::AtomicU64>,
}

impl MarketFeed {
    pub fn new(
        stale_threshold_secs: f64,
        heartbeat_timeout_secs: f64,
        ws_base_delay: f64,
        ws_max_delay: f64,
        ws_max_attempts: u32,
        recovery_delay_secs: f64,
        rest_poll_interval_secs: f64,
        market_data_rate_per_sec: f64,
        channel_capacity: usize,
    ) -> Arc<Self> {
        let store = Arc::new(MarketDataStore::new(stale_threshold_secs));
        let (frame_tx, mut frame_rx) = mpsc::channel::<String>(channel_capacity);
        let frame_drop_count = Arc::new(std::sync::atomic::AtomicU64::new(0));

        let drop_count = frame_drop_count.clone();
        let ws = WsConnection::spawn(ws_base_delay, ws_max_delay, ws_max_attempts, move |frame| {
            if frame_tx.try_send(frame.to_string()).is_err() {
                drop_count.fetch_add(1, Ordering::Relaxed);
            }
        });

        let rate_limiter = Arc::new(RateLimiter::new(market_data_rate_per_sec));
        let rest = Arc::new(RestPoller::new(rate_limiter));
        let (rest_shutdown, _) = watch::channel(false);

        let feed = Arc::new(Self {
            store: store.clone(),
            ws,
            rest,
            rest_shutdown,
            rest_running: AtomicBool::new(false),
            source: std::sync::RwLock::new(DataSource::WebSocket),
            ws_healthy_since: std::sync::RwLock::new(None),
            subscribed: std::sync::RwLock::new(Vec::new()),
            recovery_delay_secs,
            heartbeat_timeout_secs,
            rest_poll_interval_secs,
            frame_drop_count,
        });

        let worker_feed = feed.clone();
        let worker_store = store;
        tokio::spawn(async move {
            while let Some(frame) = frame_rx.recv().await {
                worker_feed.process_frame(&worker_store, &frame);
            }
        });

        let monitor_feed = feed.clone();
        tokio::spawn(async move {
            monitor_feed.health_monitor().await;
        });

        feed
    }

    pub fn store(&self) -> Arc<MarketDataStore> {
        self.store.clone()
    }

    pub fn subscribe(&self, asset_ids: &[String]) {
        self.subscribed.write().unwrap().extend(asset_ids.iter().cloned());
        for id in asset_ids {
            self.store.register(id);
        }
        self.ws.subscribe(asset_ids);
    }

    fn process_frame(&self, store: &MarketDataStore, text: &str) {
        let value: serde_json::Value = match serde_json::from_str(text) {
            Ok(v) => v,
            Err(_) => return,
        };
        let frames: Vec<serde_json::Value> = match value {
            serde_json::Value::Array(items) => items,
            other => vec![other],
        };
        for item in frames {
            match serde_json::from_value::<WireFrame>(item) {
                Ok(frame) => self.apply_frame(store, frame),
                Err(_) => continue,
            }
        }
    }

    fn apply_frame(&self, store: &MarketDataStore, frame: WireFrame) {
        match frame {
            WireFrame::Book {
                asset_id,
                bids,
                asks,
                sequence,
            } => {
                if !store.check_sequence(&asset_id, sequence) {
                    warn!(asset_id, "sequence gap detected");
                }
                let bids = parse_levels(&bids);
                let asks = parse_levels(&asks);
                store.apply_book(&asset_id, bids, asks, None);
            }
            WireFrame::PriceChange { asset_id, price } => {
                if let Ok(p) = price.parse::<Price>() {
                    store.apply_price(&asset_id, p);
                }
            }
            WireFrame::LastTradePrice {
                asset_id,
                price,
                size,
                side,
            } => {
                if let Ok(p) = price.parse::<Price>() {
                    let size = size.and_then(|s| s.parse().ok());
                    let side = side.and_then(|s| match s.to_uppercase().as_str() {
                        "BUY" => Some(Side::Buy),
                        "SELL" => Some(Side::Sell),
                        _ => None,
                    });
                    store.apply_trade(&asset_id, p, size, side);
                }
            }
            WireFrame::TickSizeChange { asset_id, .. } => {
                store.register(&asset_id);
            }
        }
    }

    async fn health_monitor(self: Arc<Self>) {
        let mut ticker = interval(Duration::from_secs(5));
        loop {
            ticker.tick().await;
            let ws_connected = self.ws.state() == WsState::Connected;
            let assets = self.subscribed.read().unwrap().clone();
            let all_fresh = assets.iter().all(|a| self.store.is_fresh(a));

            if ws_connected && all_fresh {
                let mut since = self.ws_healthy_since.write().unwrap();
                if since.is_none() {
                    *since = Some(std::time::Instant::now());
                }
                let healthy_for = since.unwrap().elapsed().as_secs_f64();
                drop(since);
                if healthy_for >= self.recovery_delay_secs && self.rest_running.load(Ordering::Relaxed)
                {
                    self.stop_rest();
                    *self.source.write().unwrap() = DataSource::WebSocket;
                    info!("ws recovered, rest stopped");
                }
            } else {
                *self.ws_healthy_since.write().unwrap() = None;
                if !self.rest_running.load(Ordering::Relaxed) {
                    self.start_rest(assets);
                    *self.source.write().unwrap() = DataSource::Rest;
                    info!("ws unhealthy, rest started");
                }
            }
        }
    }

    fn start_rest(&self, assets: Vec<String>) {
        if self
            .rest_running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return;
        }
        for asset_id in assets {
            let rest = self.rest.clone();
            let store = self.store.clone();
            let rx = self.rest_shutdown.subscribe();
            let interval_secs = self.rest_poll_interval_secs;
            tokio::spawn(rest.run(store, asset_id, interval_secs, rx));
        }
    }

    fn stop_rest(&self) {
        let _ = self.rest_shutdown.send(true);
        self.rest_running.store(false, Ordering::SeqCst);
    }

    pub fn mid(&self, asset_id: &str) -> Option<Price> {
        self.store.mid(asset_id)
    }

    pub fn best_bid(&self, asset_id: &str) -> Option<Price> {
        self.store.best_bid(asset_id)
    }

    pub fn best_ask(&self, asset_id: &str) -> Option<Price> {
        self.store.best_ask(asset_id)
    }

    pub fn data_source(&self) -> DataSource {
        *self.source.read().unwrap()
    }

    pub fn is_healthy(&self) -> bool {
        if self.store.seconds_since_any_message() >= self.heartbeat_timeout_secs {
            return false;
        }
        let assets = self.subscribed.read().unwrap();
        if !assets.iter().all(|a| self.store.is_fresh(a)) {
            return false;
        }
        if self.data_source() == DataSource::WebSocket && self.store.has_gaps() {
            return false;
        }
        true
    }

    pub fn frame_drop_count(&self) -> u64 {
        self.frame_drop_count.load(Ordering::Relaxed)
    }

    pub async fn stop(&self) {
        self.ws.disconnect();
        self.stop_rest();
    }
}

fn parse_levels(levels: &[WireLevel]) -> Vec<PriceLevel> {
    levels
        .iter()
        .filter_map(|l| {
            let price: Price = l.price.parse().ok()?;
            let size: Price = l.size.parse().ok()?;
            Some(PriceLevel { price, size })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn book_frame_parses() {
        let raw = r#"{"event_type":"book","asset_id":"tok","bids":[{"price":"0.48","size":"10"}],"asks":[{"price":"0.52","size":"10"}]}"#;
        let frame: WireFrame = serde_json::from_str(raw).unwrap();
        match frame {
            WireFrame::Book { asset_id, bids, asks, .. } => {
                assert_eq!(asset_id, "tok");
                assert_eq!(bids.len(), 1);
                assert_eq!(asks.len(), 1);
            }
            _ => panic!("expected book frame"),
        }
    }

    #[test]
    fn unknown_event_type_is_ignored() {
        let raw = r#"{"event_type":"mystery","asset_id":"tok"}"#;
        let result: Result<WireFrame, _> = serde_json::from_str(raw);
        assert!(result.is_err());
    }
}
