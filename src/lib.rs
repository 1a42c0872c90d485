//! quotebot-core: adaptive market-maker for binary prediction markets.
//!
//! Exposes the feed, alpha, risk, execution, strategy, and telemetry
//! modules for use by the `quotebot` binary and integration tests.

pub mod alpha;
pub mod config;
pub mod error;
pub mod exec;
pub mod feed;
pub mod models;
pub mod money;
pub mod risk;
pub mod strategy;
pub mod telemetry;

pub use config::Config;
pub use error::{CoreError, CoreResult};
