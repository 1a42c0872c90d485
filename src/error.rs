//! Error taxonomy for the order/risk/feed boundary.
//! Mission: every functional failure a caller branches on gets a named variant;
//! everything else flows through anyhow at the task boundary.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum CoreError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("balance error: {0}")]
    Balance(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("sequence gap on {asset_id}: expected {expected}, got {got}")]
    SequenceGap {
        asset_id: String,
        expected: u64,
        got: u64,
    },

    #[error("stale data on {asset_id}: {age_secs:.1}s since last mutation")]
    StaleData { asset_id: String, age_secs: f64 },

    #[error("risk stop: {reason}")]
    RiskStop { reason: String },

    #[error("kill switch engaged: {reason}")]
    KillSwitch { reason: String },
}

pub type CoreResult<T> = Result<T, CoreError>;
