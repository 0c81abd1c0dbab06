use serde::{Deserialize, Serialize};

use crate::config::{ScoringConfig, WeightTable};
use crate::models::{Direction, IndicatorId, IndicatorSignal};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightedConfidenceScore {
    /// Weighted score mapped onto the trade direction, 0-100.
    pub raw_score: f64,
    /// Raw score blended with the baseline point count, 0-100.
    pub blended_score: f64,
    /// Direction-signed weighted bias in [-1, 1] before mapping.
    pub net_bias: f64,
    pub contributing_indicators: Vec<IndicatorId>,
}

/// Point-count tally for both sides, and the side it selects if any.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaselineScore {
    pub direction: Option<Direction>,
    pub long_points: u32,
    pub short_points: u32,
    pub score: f64,
}

/// Points an indicator earns for agreeing with a side.
pub fn baseline_points(id: IndicatorId) -> u32 {
    match id {
        IndicatorId::Sbst => 3,
        IndicatorId::HalfTrend | IndicatorId::SwiftAlgo | IndicatorId::Smc => 2,
        IndicatorId::Psar
        | IndicatorId::Chandelier
        | IndicatorId::Nrtr
        | IndicatorId::Rsi
        | IndicatorId::Macd
        | IndicatorId::Adx => 1,
    }
}

/// Simple point-count heuristic. A side wins when it collects enough points
/// while the other side stays quiet.
pub fn baseline(signals: &[IndicatorSignal], cfg: &ScoringConfig) -> BaselineScore {
    let mut long_points = 0;
    let mut short_points = 0;
    for s in signals.iter().filter(|s| s.strength > 0.0) {
        match s.direction.to_direction() {
            Some(Direction::Long) => long_points += baseline_points(s.indicator_id),
            Some(Direction::Short) => short_points += baseline_points(s.indicator_id),
            None => {}
        }
    }

    let direction = if long_points >= cfg.min_side_points && short_points < cfg.max_opposing_points {
        Some(Direction::Long)
    } else if short_points >= cfg.min_side_points && long_points < cfg.max_opposing_points {
        Some(Direction::Short)
    } else {
        None
    };

    let score = match direction {
        Some(Direction::Long) => (long_points as f64 * 10.0).min(cfg.baseline_cap),
        Some(Direction::Short) => (short_points as f64 * 10.0).min(cfg.baseline_cap),
        None => 0.0,
    };

    BaselineScore {
        direction,
        long_points,
        short_points,
        score,
    }
}

/// Combines normalized signals into one 0-100 confidence score.
pub struct ConfidenceAggregator<'a> {
    weights: &'a WeightTable,
    blend_baseline_ratio: f64,
}

impl<'a> ConfidenceAggregator<'a> {
    pub fn new(weights: &'a WeightTable, blend_baseline_ratio: f64) -> Self {
        Self {
            weights,
            blend_baseline_ratio: blend_baseline_ratio.clamp(0.0, 1.0),
        }
    }

    pub fn aggregate(
        &self,
        signals: &[IndicatorSignal],
        direction: Direction,
        baseline_score: f64,
    ) -> WeightedConfidenceScore {
        let baseline_score = if baseline_score.is_finite() {
            baseline_score.clamp(0.0, 100.0)
        } else {
            0.0
        };

        let present: Vec<IndicatorId> = signals.iter().map(|s| s.indicator_id).collect();
        let weights = self.weights.renormalized(&present);

        if weights.is_empty() {
            return WeightedConfidenceScore {
                raw_score: 0.0,
                blended_score: baseline_score,
                net_bias: 0.0,
                contributing_indicators: Vec::new(),
            };
        }

        // A duplicated indicator shares its weight between its readings.
        let net_bias: f64 = signals
            .iter()
            .map(|s| {
                let copies = present.iter().filter(|&&id| id == s.indicator_id).count() as f64;
                weights[&s.indicator_id] / copies * s.signed_strength()
            })
            .sum::<f64>()
            .clamp(-1.0, 1.0);

        let raw_score = (net_bias * direction.sign()).max(0.0) * 100.0;
        let ratio = self.blend_baseline_ratio;
        let blended = ratio * baseline_score + (1.0 - ratio) * raw_score;

        WeightedConfidenceScore {
            raw_score: raw_score.clamp(0.0, 100.0),
            blended_score: blended.clamp(0.0, 100.0),
            net_bias,
            contributing_indicators: weights.keys().copied().collect(),
        }
    }
}
