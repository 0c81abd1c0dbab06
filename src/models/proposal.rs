use serde::{Deserialize, Serialize};

use crate::core::divergence::DivergenceFlag;
use crate::core::mtf::MultiTimeframeValidation;
use crate::models::{Direction, IndicatorReadings, Timeframe};

/// Market conditions that can raise the confidence bar.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MarketRegime {
    /// ADX on the base timeframe.
    pub trend_strength: Option<f64>,
    /// RSI on the base timeframe.
    pub oscillator: Option<f64>,
}

impl MarketRegime {
    pub fn from_readings(readings: &IndicatorReadings) -> Self {
        Self {
            trend_strength: readings.adx.map(|a| a.adx).filter(|v| v.is_finite()),
            oscillator: readings.rsi.filter(|v| v.is_finite()),
        }
    }
}

/// A scored, levelled trade idea for one symbol. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeProposal {
    pub symbol: String,
    pub direction: Direction,
    pub timeframe: Timeframe,
    pub entry: f64,
    pub stop_loss: f64,
    pub take_profit_1: f64,
    pub take_profit_2: f64,
    pub risk_reward: f64,
    /// Point-count confidence before any weighting.
    pub raw_confidence: f64,
    /// Blended, divergence-penalised confidence the gates judge.
    pub weighted_confidence: f64,
    pub divergences: Vec<DivergenceFlag>,
    pub multi_tf_validation: MultiTimeframeValidation,
    #[serde(default)]
    pub regime: MarketRegime,
}

impl TradeProposal {
    /// Stop distance as a percentage of entry.
    pub fn stop_distance_pct(&self) -> f64 {
        if self.entry <= 0.0 {
            return 0.0;
        }
        (self.entry - self.stop_loss).abs() / self.entry * 100.0
    }
}
