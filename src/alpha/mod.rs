pub mod arbitrage;
pub mod book_analyzer;
pub mod events;
pub mod flow;
pub mod parity;
pub mod regime;
pub mod volatility;

pub use arbitrage::ArbitrageDetector;
pub use book_analyzer::BookAnalyzer;
pub use events::EventTracker;
pub use flow::FlowAnalyzer;
pub use regime::RegimeDetector;
pub use volatility::VolatilityTracker;
