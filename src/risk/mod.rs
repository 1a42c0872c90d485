pub mod adverse_selection;
pub mod correlation;
pub mod dynamic_limits;
pub mod inventory;
pub mod kelly;
pub mod manager;
pub mod market_pnl;

pub use adverse_selection::AdverseSelectionDetector;
pub use correlation::{CorrelationTracker, PortfolioRisk};
pub use dynamic_limits::DynamicLimitManager;
pub use inventory::InventoryManager;
pub use kelly::KellySizer;
pub use manager::{ExecutionMode, RiskManager};
pub use market_pnl::MarketPnlTracker;
