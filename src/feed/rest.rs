//! REST book-snapshot poller: fixed-interval fallback source when the WS
//! connection is down. Grounded on the teacher's `PolymarketScraper`
//! (`execute_with_retry`, exponential backoff, 429 handling) in the removed
//! `rest_raw_ref` prototype, narrowed to the single book-snapshot endpoint
//! the feed facade needs.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::exec::rate_limit::RateLimiter;
use crate::feed::store::MarketDataStore;
use crate::models::PriceLevel;
use crate::money::Price;

const CLOB_API_BASE: &str = "https://clob.polymarket.com";
const MAX_RETRIES: u32 = 3;
const INITIAL_BACKOFF_MS: u64 = 100;

#[derive(Debug, Deserialize)]
struct RestLevel {
    price: String,
    size: String,
}

#[derive(Debug, Deserialize)]
struct RestBookResponse {
    bids: Vec<RestLevel>,
    asks: Vec<RestLevel>,
}

pub struct RestPoller {
    client: Client,
    limiter: Arc<RateLimiter>,
}

impl RestPoller {
    pub fn new(limiter: Arc<RateLimiter>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .expect("failed to build reqwest client");
        Self { client, limiter }
    }

    /// Fetch one book snapshot and apply it to the store; clears the gap
    /// counter on success because a snapshot is authoritative.
    pub async fn poll_once(&self, store: &MarketDataStore, asset_id: &str) -> Result<()> {
        self.limiter.wait().await;
        let url = format!("{CLOB_API_BASE}/book?token_id={asset_id}");
        let resp = self.execute_with_retry(&url).await?;
        let body: RestBookResponse = resp.json().await.context("parse book snapshot")?;

        let bids = parse_levels(&body.bids);
        let asks = parse_levels(&body.asks);
        store.apply_book(asset_id, bids, asks, None);
        store.clear_gaps(asset_id);
        Ok(())
    }

    /// Runs the fixed-interval loop for one asset until `shutdown` resolves.
    pub async fn run(
        self: Arc<Self>,
        store: Arc<MarketDataStore>,
        asset_id: String,
        interval_secs: f64,
        mut shutdown: tokio::sync::watch::Receiver<bool>,
    ) {
        loop {
            tokio::select! {
                _ = sleep(Duration::from_secs_f64(interval_secs)) => {
                    if let Err(e) = self.poll_once(&store, &asset_id).await {
                        warn!(asset_id, error = %e, "rest poll failed, retrying next tick");
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

    async fn execute_with_retry(&self, url: &str) -> Result<reqwest::Response> {
        let mut backoff_ms = INITIAL_BACKOFF_MS;
        for attempt in 0..=MAX_RETRIES {
            let resp = self.client.get(url).send().await;
            match resp {
                Ok(r) if r.status().is_success() => return Ok(r),
                Ok(r) if r.status() == StatusCode::TOO_MANY_REQUESTS => {
                    debug!(attempt, "rest poll rate limited, backing off");
                }
                Ok(r) => {
                    if attempt == MAX_RETRIES {
                        anyhow::bail!("rest poll failed with status {}", r.status());
                    }
                }
                Err(e) => {
                    if attempt == MAX_RETRIES {
                        return Err(e).context("rest poll request failed");
                    }
                }
            }
            sleep(Duration::from_millis(backoff_ms)).await;
            backoff_ms *= 2;
        }
        anyhow::bail!("rest poll exhausted retries")
    }
}

fn parse_levels(levels: &[RestLevel]) -> Vec<PriceLevel> {
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
    fn parses_string_levels() {
        let raw = vec![
            RestLevel {
                price: "0.48".to_string(),
                size: "10".to_string(),
            },
            RestLevel {
                price: "0.47".to_string(),
                size: "5".to_string(),
            },
        ];
        let levels = parse_levels(&raw);
        assert_eq!(levels.len(), 2);
        assert_eq!(levels[0].price.to_string(), "0.48");
    }
}
