use serde::{Deserialize, Serialize};

use crate::config::ThresholdConfig;
use crate::models::MarketRegime;

/// Confidence bar for the current regime, with the conditions that raised it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceThreshold {
    pub base: f64,
    pub value: f64,
    pub adjustments: Vec<String>,
}

impl ConfidenceThreshold {
    /// Each condition only ever adds to `base`. Raised values are capped at
    /// 100, but a base already above 100 is kept as is.
    pub fn compute(base: f64, regime: &MarketRegime, heat: f64, cfg: &ThresholdConfig) -> Self {
        let mut value = base;
        let mut adjustments = Vec::new();

        if let Some(adx) = regime.trend_strength {
            if adx < cfg.low_trend_adx {
                value += cfg.low_trend_bump.max(0.0);
                adjustments.push(format!("weak trend (ADX {:.1})", adx));
            }
        }

        if let Some(rsi) = regime.oscillator {
            if rsi >= cfg.rsi_overbought || rsi <= cfg.rsi_oversold {
                value += cfg.extreme_oscillator_bump.max(0.0);
                adjustments.push(format!("extreme RSI {:.1}", rsi));
            }
        }

        if heat >= cfg.elevated_heat {
            value += cfg.elevated_heat_bump.max(0.0);
            adjustments.push(format!("portfolio heat {:.1}%", heat * 100.0));
        }

        Self {
            base,
            value: value.min(100.0).max(base),
            adjustments,
        }
    }

    pub fn passes(&self, confidence: f64) -> bool {
        confidence >= self.value
    }
}
