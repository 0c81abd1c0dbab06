use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::config::WeightTable;
use crate::error::{CoreError, CoreResult};
use crate::models::{Direction, IndicatorSignal, Timeframe, Trend};

/// Directional read of one higher timeframe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeframeSnapshot {
    pub timeframe: Timeframe,
    pub direction: Trend,
    #[serde(default)]
    pub signals: Vec<IndicatorSignal>,
}

impl TimeframeSnapshot {
    pub fn new(timeframe: Timeframe, direction: Trend) -> Self {
        Self {
            timeframe,
            direction,
            signals: Vec::new(),
        }
    }

    /// Direction from the weighted net bias of `signals`; anything inside
    /// the dead band reads neutral.
    pub fn from_signals(
        timeframe: Timeframe,
        signals: Vec<IndicatorSignal>,
        weights: &WeightTable,
        dead_band: f64,
    ) -> Self {
        let present: Vec<_> = signals.iter().map(|s| s.indicator_id).collect();
        let w = weights.renormalized(&present);
        let bias: f64 = signals
            .iter()
            .map(|s| w.get(&s.indicator_id).copied().unwrap_or(0.0) * s.signed_strength())
            .sum();

        let direction = if bias > dead_band {
            Trend::Bullish
        } else if bias < -dead_band {
            Trend::Bearish
        } else {
            Trend::Neutral
        };

        Self {
            timeframe,
            direction,
            signals,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultiTimeframeValidation {
    /// `score >= required`. Neutral credit counts, so this can hold while
    /// `confirmations < required`.
    pub approved: bool,
    /// Higher timeframes whose direction matched outright.
    pub confirmations: usize,
    /// Neutral higher timeframes, each worth the neutral credit.
    pub partial_confirmations: usize,
    /// Outright confirmations plus neutral credit.
    #[serde(default)]
    pub score: f64,
    pub required: usize,
    pub strength: f64,
    pub aligned_timeframes: BTreeSet<Timeframe>,
    pub reasoning: Vec<String>,
}

pub struct MultiTimeframeValidator {
    neutral_credit: f64,
}

impl MultiTimeframeValidator {
    pub fn new(neutral_credit: f64) -> Self {
        Self {
            neutral_credit: neutral_credit.clamp(0.0, 1.0),
        }
    }

    pub fn validate(
        &self,
        base_direction: Direction,
        snapshots: &[TimeframeSnapshot],
        required_confirmations: usize,
    ) -> CoreResult<MultiTimeframeValidation> {
        if snapshots.len() < required_confirmations {
            return Err(CoreError::InsufficientTimeframeData {
                available: snapshots.len(),
                required: required_confirmations,
            });
        }

        let wanted = base_direction.as_trend();
        let mut confirmations = 0;
        let mut partial_confirmations = 0;
        let mut aligned_timeframes = BTreeSet::new();
        let mut reasoning = Vec::with_capacity(snapshots.len());

        for snap in snapshots {
            if snap.direction == wanted {
                confirmations += 1;
                aligned_timeframes.insert(snap.timeframe);
                reasoning.push(format!("{} confirms {}", snap.timeframe, base_direction));
            } else if snap.direction == Trend::Neutral {
                partial_confirmations += 1;
                reasoning.push(format!("{} neutral, partial credit", snap.timeframe));
            } else {
                reasoning.push(format!("{} does not confirm ({})", snap.timeframe, snap.direction));
            }
        }

        let score = confirmations as f64 + self.neutral_credit * partial_confirmations as f64;
        let strength = if snapshots.is_empty() {
            0.0
        } else {
            score / snapshots.len() as f64 * 100.0
        };

        Ok(MultiTimeframeValidation {
            approved: score + 1e-9 >= required_confirmations as f64,
            confirmations,
            partial_confirmations,
            score,
            required: required_confirmations,
            strength,
            aligned_timeframes,
            reasoning,
        })
    }
}
