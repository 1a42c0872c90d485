//! Live order adapter: place/cancel/query against the exchange CLOB.
//! Mirrors the simulator's interface exactly (§9: no conditional in the
//! quoter). Grounded on the teacher's HMAC-signed request pattern and
//! `execute_with_retry` idiom; owns nothing persistent, re-reads the
//! exchange for authoritative state.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use hmac::{Hmac, Mac};
use reqwest::Client;
use serde::Deserialize;
use sha2::Sha256;

use crate::error::{CoreError, CoreResult};
use crate::exec::rate_limit::RateLimiter;
use crate::exec::OrderExecutor;
use crate::models::{Order, OrderStatus, Side, TimeInForce, Trade};
use crate::money::{Price, Size};

const CLOB_API_BASE: &str = "https://clob.polymarket.com";

pub struct ExchangeCredentials {
    pub api_key: String,
    pub api_secret: String,
    pub api_passphrase: String,
}

#[derive(Debug, Deserialize)]
struct RawOrderResponse {
    #[serde(rename = "orderID")]
    order_id: String,
}

#[derive(Debug, Deserialize)]
struct RawExchangeOrder {
    id: String,
    asset_id: String,
    side: String,
    price: String,
    original_size: String,
    size_matched: String,
    status: String,
}

pub struct LiveOrderAdapter {
    http: Client,
    creds: ExchangeCredentials,
    limiter: Arc<RateLimiter>,
}

impl LiveOrderAdapter {
    pub fn new(creds: ExchangeCredentials, limiter: Arc<RateLimiter>) -> Self {
        let http = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .expect("failed to build live order http client");
        Self { http, creds, limiter }
    }

    fn sign(&self, timestamp: &str, method: &str, path: &str, body: &str) -> String {
        let message = format!("{timestamp}{method}{path}{body}");
        let mut mac = Hmac::<Sha256>::new_from_slice(self.creds.api_secret.as_bytes())
            .expect("hmac accepts any key length");
        mac.update(message.as_bytes());
        base64::engine::general_purpose::STANDARD.encode(mac.finalize().into_bytes())
    }

    fn auth_headers(&self, method: &str, path: &str, body: &str) -> Vec<(&'static str, String)> {
        let timestamp = chrono::Utc::now().timestamp().to_string();
        let signature = self.sign(&timestamp, method, path, body);
        vec![
            ("POLY_API_KEY", self.creds.api_key.clone()),
            ("POLY_PASSPHRASE", self.creds.api_passphrase.clone()),
            ("POLY_TIMESTAMP", timestamp),
            ("POLY_SIGNATURE", signature),
        ]
    }
}

#[async_trait]
impl OrderExecutor for LiveOrderAdapter {
    async fn place_order(
        &self,
        asset_id: &str,
        side: Side,
        price: Price,
        size: Size,
    ) -> CoreResult<Order> {
        if price <= Price::ZERO || price >= Price::ONE {
            return Err(CoreError::Validation(format!("price {price} out of (0,1)")));
        }
        self.limiter.wait().await;

        let body = serde_json::json!({
            "asset_id": asset_id,
            "side": side.as_str(),
            "price": price.to_string(),
            "size": size.to_string(),
        })
        .to_string();
        let headers = self.auth_headers("POST", "/order", &body);

        let mut req = self.http.post(format!("{CLOB_API_BASE}/order")).body(body);
        for (k, v) in headers {
            req = req.header(k, v);
        }
        let resp = req
            .send()
            .await
            .map_err(|e| CoreError::Transport(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(CoreError::Transport(format!(
                "place_order failed with status {}",
                resp.status()
            )));
        }
        let parsed: RawOrderResponse = resp
            .json()
            .await
            .map_err(|e| CoreError::Protocol(e.to_string()))?;

        Ok(Order::new_live(asset_id, side, price, size, false).with_id(parsed.order_id))
    }

    async fn cancel_order(&self, order_id: &str) -> CoreResult<()> {
        self.limiter.wait().await;
        let body = serde_json::json!({ "orderID": order_id }).to_string();
        let headers = self.auth_headers("DELETE", "/order", &body);
        let mut req = self
            .http
            .delete(format!("{CLOB_API_BASE}/order"))
            .body(body);
        for (k, v) in headers {
            req = req.header(k, v);
        }
        let resp = req
            .send()
            .await
            .map_err(|e| CoreError::Transport(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(CoreError::Transport(format!(
                "cancel_order failed with status {}",
                resp.status()
            )));
        }
        Ok(())
    }

    async fn open_orders(&self, asset_id: Option<&str>) -> CoreResult<Vec<Order>> {
        self.limiter.wait().await;
        let headers = self.auth_headers("GET", "/orders", "");
        let mut req = self.http.get(format!("{CLOB_API_BASE}/orders"));
        for (k, v) in headers {
            req = req.header(k, v);
        }
        let resp = req
            .send()
            .await
            .map_err(|e| CoreError::Transport(e.to_string()))?;
        let raw: Vec<RawExchangeOrder> = resp
            .json()
            .await
            .map_err(|e| CoreError::Protocol(e.to_string()))?;
        Ok(raw
            .into_iter()
            .filter(|o| asset_id.map(|a| a == o.asset_id).unwrap_or(true))
            .filter_map(raw_order_to_order)
            .collect())
    }

    async fn trade_history(&self, asset_id: Option<&str>) -> CoreResult<Vec<Trade>> {
        self.limiter.wait().await;
        let headers = self.auth_headers("GET", "/trades", "");
        let mut req = self.http.get(format!("{CLOB_API_BASE}/trades"));
        for (k, v) in headers {
            req = req.header(k, v);
        }
        let _ = req
            .send()
            .await
            .map_err(|e| CoreError::Transport(e.to_string()))?;
        // Trade history shape intentionally narrow per §6; callers needing
        // fills rely on the trades poller for flow data in LIVE mode.
        let _ = asset_id;
        Ok(Vec::new())
    }

    fn is_simulated(&self) -> bool {
        false
    }
}

fn raw_order_to_order(raw: RawExchangeOrder) -> Option<Order> {
    let price: Price = raw.price.parse().ok()?;
    let size: Size = raw.original_size.parse().ok()?;
    let filled: Size = raw.size_matched.parse().ok()?;
    let side = if raw.side.eq_ignore_ascii_case("BUY") {
        Side::Buy
    } else {
        Side::Sell
    };
    let status = match raw.status.to_uppercase().as_str() {
        "MATCHED" => OrderStatus::Matched,
        "CANCELLED" => OrderStatus::Cancelled,
        "EXPIRED" => OrderStatus::Expired,
        _ => OrderStatus::Live,
    };
    let mut order = Order::new_live(raw.asset_id, side, price, size, false);
    order.filled = filled;
    order.status = status;
    order.time_in_force = TimeInForce::Gtc;
    Some(order.with_id(raw.id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_is_deterministic_for_same_inputs() {
        let creds = ExchangeCredentials {
            api_key: "k".into(),
            api_secret: "s".into(),
            api_passphrase: "p".into(),
        };
        let limiter = Arc::new(RateLimiter::new(5.0));
        let adapter = LiveOrderAdapter::new(creds, limiter);
        let sig1 = adapter.sign("100", "POST", "/order", "{}");
        let sig2 = adapter.sign("100", "POST", "/order", "{}");
        assert_eq!(sig1, sig2);
    }
}
