//! Live trade-tape poll feeding the flow analyzer in LIVE mode. Grounded on
//! the original bot's trade-tape polling loop and the teacher's
//! `execute_with_retry` REST idiom reused from `feed::rest`.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Client;
use serde::Deserialize;
use tokio::time::sleep;
use tracing::warn;

use crate::exec::rate_limit::RateLimiter;
use crate::models::Side;
use crate::money::{Price, Size};

const DATA_API_BASE: &str = "https://data-api.polymarket.com";

#[derive(Debug, Deserialize)]
struct RawTrade {
    id: String,
    price: String,
    size: String,
    side: String,
}

pub type TradeCallback = Arc<dyn Fn(Price, Size, Side, bool) + Send + Sync>;

pub struct TradesPoller {
    client: Client,
    limiter: Arc<RateLimiter>,
    last_seen: std::sync::Mutex<std::collections::HashMap<String, String>>,
}

impl TradesPoller {
    pub fn new(limiter: Arc<RateLimiter>) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .expect("failed to build trades poller http client"),
            limiter,
            last_seen: std::sync::Mutex::new(std::collections::HashMap::new()),
        }
    }

    async fn poll_once(&self, asset_id: &str, callback: &TradeCallback) -> Result<()> {
        self.limiter.wait().await;
        let resp = self
            .client
            .get(format!("{DATA_API_BASE}/trades"))
            .query(&[("market", asset_id)])
            .send()
            .await
            .context("trades poll request failed")?
            .error_for_status()
            .context("trades poll status")?;
        let trades: Vec<RawTrade> = resp.json().await.context("trades poll parse")?;

        let last_seen_id = self
            .last_seen
            .lock()
            .unwrap()
            .get(asset_id)
            .cloned();
        let boundary = trades
            .iter()
            .position(|t| Some(&t.id) == last_seen_id.as_ref())
            .map(|i| i + 1)
            .unwrap_or(trades.len());

        // All trades returned by the per-asset endpoint are taker-completed.
        for trade in trades[..boundary].iter().rev() {
            let price: Price = match trade.price.parse() {
                Ok(p) => p,
                Err(_) => continue,
            };
            let size: Size = match trade.size.parse() {
                Ok(s) => s,
                Err(_) => continue,
            };
            let side = if trade.side.eq_ignore_ascii_case("BUY") {
                Side::Buy
            } else {
                Side::Sell
            };
            callback(price, size, side, true);
        }

        if let Some(first) = trades.first() {
            self.last_seen
                .lock()
                .unwrap()
                .insert(asset_id.to_string(), first.id.clone());
        }
        Ok(())
    }

    pub async fn run(
        self: Arc<Self>,
        asset_id: String,
        poll_interval_secs: f64,
        callback: TradeCallback,
        mut shutdown: tokio::sync::watch::Receiver<bool>,
    ) {
        loop {
            tokio::select! {
                _ = sleep(Duration::from_secs_f64(poll_interval_secs)) => {
                    if let Err(e) = self.poll_once(&asset_id, &callback).await {
                        warn!(asset_id, error = %e, "trades poll failed");
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        return;
                    }
                }
            }
        }
    }
}
