pub mod direction;
pub mod indicator;
pub mod market;
pub mod proposal;
pub mod timeframe;

pub use direction::*;
pub use indicator::*;
pub use market::MarketSnapshot;
pub use proposal::{MarketRegime, TradeProposal};
pub use timeframe::Timeframe;
