pub mod replay;

pub use replay::ReplaySource;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{MarketSnapshot, Timeframe};

/// Supplies already-computed market snapshots. Shared by every symbol task
/// in a cycle, so implementations take `&self`.
#[async_trait]
pub trait SignalSource: Send + Sync {
    async fn fetch_market(&self, symbol: &str, timeframe: Timeframe) -> Result<MarketSnapshot>;

    /// Moves to the next cycle's data. `false` once there is nothing left.
    async fn advance(&self) -> Result<bool> {
        Ok(true)
    }
}
