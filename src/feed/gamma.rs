//! Market discovery against the Gamma markets directory API.
//! Adapted from the teacher's `GammaMarketLookup` (the removed `gamma_raw_ref`
//! prototype) — same `de_string_vec`/`de_string_f64_opt` custom deserializers
//! for fields that arrive as either a JSON array/number or a JSON-encoded
//! string, matching the behavior of the original bot's `markets.py::_parse_market`.

use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::models::{Market, Outcome};

const GAMMA_API_BASE: &str = "https://gamma-api.polymarket.com";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GammaMarket {
    pub slug: String,
    #[serde(rename = "conditionId")]
    pub condition_id: String,
    #[serde(default)]
    pub question: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(rename = "endDateIso", default)]
    pub end_date_iso: Option<String>,
    #[serde(default, deserialize_with = "de_string_f64_opt")]
    pub volume: Option<f64>,
    #[serde(default, deserialize_with = "de_string_f64_opt")]
    pub liquidity: Option<f64>,
    #[serde(default)]
    pub active: Option<bool>,
    #[serde(default)]
    pub closed: Option<bool>,
    #[serde(deserialize_with = "de_string_vec")]
    pub outcomes: Vec<String>,
    #[serde(rename = "clobTokenIds", deserialize_with = "de_string_vec")]
    pub clob_token_ids: Vec<String>,
}

fn de_string_vec<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let v = Value::deserialize(deserializer)?;
    match v {
        Value::Array(arr) => Ok(arr
            .into_iter()
            .filter_map(|x| match x {
                Value::String(s) => Some(s),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .collect()),
        Value::String(s) => {
            serde_json::from_str::<Vec<String>>(&s).map_err(serde::de::Error::custom)
        }
        _ => Ok(Vec::new()),
    }
}

fn de_string_f64_opt<'de, D>(deserializer: D) -> std::result::Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let v = Value::deserialize(deserializer)?;
    match v {
        Value::Null => Ok(None),
        Value::Number(n) => Ok(n.as_f64()),
        Value::String(s) if s.is_empty() => Ok(None),
        Value::String(s) => s.parse::<f64>().map(Some).map_err(serde::de::Error::custom),
        _ => Ok(None),
    }
}

impl GammaMarket {
    pub fn into_market(self) -> Market {
        let outcomes = self
            .outcomes
            .into_iter()
            .zip(self.clob_token_ids)
            .map(|(name, asset_id)| Outcome { name, asset_id })
            .collect();
        let end_date = self
            .end_date_iso
            .as_deref()
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc));
        Market {
            condition_id: self.condition_id,
            question: self.question.unwrap_or_default(),
            slug: self.slug,
            outcomes,
            active: self.active.unwrap_or(false),
            closed: self.closed.unwrap_or(false),
            volume_24h: self.volume.unwrap_or(0.0),
            liquidity: self.liquidity.unwrap_or(0.0),
            end_date,
            description: self.description,
        }
    }
}

pub struct GammaClient {
    http: Client,
}

impl GammaClient {
    pub fn new() -> Self {
        let http = Client::builder()
            .timeout(Duration::from_secs(8))
            .user_agent("quotebot/0.1")
            .build()
            .expect("failed to build gamma http client");
        Self { http }
    }

    pub async fn fetch_active_markets(&self, limit: usize) -> Result<Vec<Market>> {
        let resp = self
            .http
            .get(format!("{GAMMA_API_BASE}/markets"))
            .query(&[("active", "true"), ("limit", &limit.to_string())])
            .send()
            .await
            .context("gamma markets request failed")?
            .error_for_status()
            .context("gamma markets status")?;
        let markets: Vec<GammaMarket> = resp.json().await.context("gamma markets json parse")?;
        Ok(markets.into_iter().map(GammaMarket::into_market).collect())
    }

    pub async fn fetch_market_by_slug(&self, slug: &str) -> Result<Option<Market>> {
        let resp = self
            .http
            .get(format!("{GAMMA_API_BASE}/markets"))
            .query(&[("slug", slug), ("limit", "1")])
            .send()
            .await
            .context("gamma market-by-slug request failed")?
            .error_for_status()
            .context("gamma market-by-slug status")?;
        let markets: Vec<GammaMarket> = resp.json().await.context("gamma market-by-slug parse")?;
        Ok(markets.into_iter().next().map(GammaMarket::into_market))
    }
}

impl Default for GammaClient {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcomes_as_json_string_parse() {
        let raw = r#"{
            "slug": "will-it-rain",
            "conditionId": "0xabc",
            "outcomes": "[\"Yes\",\"No\"]",
            "clobTokenIds": "[\"y1\",\"n1\"]"
        }"#;
        let gm: GammaMarket = serde_json::from_str(raw).unwrap();
        assert_eq!(gm.outcomes, vec!["Yes", "No"]);
        let market = gm.into_market();
        let pair = market.yes_no_pair().unwrap();
        assert_eq!(pair.yes_asset_id, "y1");
    }

    #[test]
    fn volume_as_string_parses() {
        let raw = r#"{
            "slug": "s",
            "conditionId": "c",
            "volume": "1234.5",
            "outcomes": ["Yes", "No"],
            "clobTokenIds": ["y", "n"]
        }"#;
        let gm: GammaMarket = serde_json::from_str(raw).unwrap();
        assert_eq!(gm.volume, Some(1234.5));
    }
}
