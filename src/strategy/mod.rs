pub mod pool;
pub mod quoter;
pub mod scorer;
pub mod timing;

pub use pool::MarketPool;
pub use quoter::{Quoter, QuoterConfig};
pub use scorer::MarketScorer;
pub use timing::AdaptiveTimer;
