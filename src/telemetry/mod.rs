pub mod trade_logger;

pub use trade_logger::TradeLogger;
