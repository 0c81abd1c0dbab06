use serde::{Deserialize, Serialize};

use crate::models::{IndicatorReadings, Timeframe};

/// Already-computed market view for one symbol on one timeframe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub symbol: String,
    pub timeframe: Timeframe,
    pub price: f64,
    pub atr: f64,
    /// Nearest swing low; the stop for a long.
    pub support: f64,
    /// Nearest swing high; the stop for a short.
    pub resistance: f64,
    #[serde(default)]
    pub readings: IndicatorReadings,
}
