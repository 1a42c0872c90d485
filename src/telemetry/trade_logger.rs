//! Append-only JSON-per-line trade/quote/event sink. Grounded on the
//! teacher's file-backed logging idiom, adapted from line-buffered writes
//! to `tokio::fs` append mode; record shapes per §4.23.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

use crate::error::{CoreError, CoreResult};
use crate::models::{Side, Trade};

#[derive(Debug, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum LogRecord {
    Trade {
        timestamp: DateTime<Utc>,
        asset_id: String,
        side: Side,
        price: String,
        size: String,
        fee: String,
        is_simulated: bool,
    },
    Quote {
        timestamp: DateTime<Utc>,
        asset_id: String,
        bid: String,
        ask: String,
        bid_size: String,
        ask_size: String,
    },
    Event {
        timestamp: DateTime<Utc>,
        event_type: String,
        detail: String,
    },
}

pub struct TradeLogger {
    path: PathBuf,
    file: Mutex<std::fs::File>,
}

impl TradeLogger {
    pub fn open(path: impl Into<PathBuf>) -> CoreResult<Self> {
        let path = path.into();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| CoreError::Transport(format!("opening trade log {path:?}: {e}")))?;
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    fn write_record(&self, record: &LogRecord) -> CoreResult<()> {
        let line = serde_json::to_string(record)
            .map_err(|e| CoreError::Protocol(format!("serializing trade log record: {e}")))?;
        let mut file = self.file.lock();
        writeln!(file, "{line}").map_err(|e| CoreError::Transport(format!("writing trade log: {e}")))
    }

    pub fn log_trade(&self, trade: &Trade) -> CoreResult<()> {
        self.write_record(&LogRecord::Trade {
            timestamp: trade.timestamp,
            asset_id: trade.asset_id.clone(),
            side: trade.side,
            price: trade.price.to_string(),
            size: trade.size.to_string(),
            fee: trade.fee.to_string(),
            is_simulated: trade.is_simulated,
        })
    }

    #[allow(clippy::too_many_arguments)]
    pub fn log_quote(
        &self,
        asset_id: &str,
        bid: crate::money::Price,
        ask: crate::money::Price,
        bid_size: crate::money::Size,
        ask_size: crate::money::Size,
    ) -> CoreResult<()> {
        self.write_record(&LogRecord::Quote {
            timestamp: Utc::now(),
            asset_id: asset_id.to_string(),
            bid: bid.to_string(),
            ask: ask.to_string(),
            bid_size: bid_size.to_string(),
            ask_size: ask_size.to_string(),
        })
    }

    pub fn log_event(&self, event_type: &str, detail: impl Into<String>) -> CoreResult<()> {
        self.write_record(&LogRecord::Event {
            timestamp: Utc::now(),
            event_type: event_type.to_string(),
            detail: detail.into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::io::Read;

    #[test]
    fn trade_records_are_appended_as_json_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trades.jsonl");
        let logger = TradeLogger::open(&path).unwrap();

        let trade = Trade {
            id: "t1".into(),
            order_id: "o1".into(),
            asset_id: "tok".into(),
            side: Side::Buy,
            price: dec!(0.50),
            size: dec!(10),
            fee: dec!(0.005),
            timestamp: Utc::now(),
            is_simulated: true,
        };
        logger.log_trade(&trade).unwrap();
        logger.log_event("startup", "reconciliation complete").unwrap();

        let mut contents = String::new();
        std::fs::File::open(&path)
            .unwrap()
            .read_to_string(&mut contents)
            .unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("\"price\":\"0.50\""));
        assert!(lines[1].contains("\"kind\":\"event\""));
    }
}
