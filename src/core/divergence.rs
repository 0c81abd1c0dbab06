use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::ScoringConfig;
use crate::models::{IndicatorId, IndicatorSignal, Trend};

const MIN_PENALTY_FACTOR: f64 = 0.01;
const REVERSAL_QUORUM: usize = 2;
const REVERSAL_WATCHERS: [IndicatorId; 3] =
    [IndicatorId::HalfTrend, IndicatorId::Psar, IndicatorId::Nrtr];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DivergenceKind {
    PriceMomentum,
    Structure,
    MultiReversal,
}

impl fmt::Display for DivergenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DivergenceKind::PriceMomentum => write!(f, "price/momentum divergence"),
            DivergenceKind::Structure => write!(f, "structure divergence"),
            DivergenceKind::MultiReversal => write!(f, "multi-reversal"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    High,
    Medium,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DivergenceFlag {
    pub kind: DivergenceKind,
    pub severity: Severity,
    pub indicators_involved: Vec<IndicatorId>,
    /// Multiplier in (0, 1] applied to confidence.
    pub penalty_factor: f64,
    pub description: String,
}

pub struct DivergenceDetector {
    price_momentum_penalty: f64,
    structure_penalty: f64,
    multi_reversal_penalty: f64,
}

impl DivergenceDetector {
    pub fn from_config(cfg: &ScoringConfig) -> Self {
        Self {
            price_momentum_penalty: sanitize(cfg.price_momentum_penalty),
            structure_penalty: sanitize(cfg.structure_penalty),
            multi_reversal_penalty: sanitize(cfg.multi_reversal_penalty),
        }
    }

    pub fn detect(&self, signals: &[IndicatorSignal]) -> Vec<DivergenceFlag> {
        let mut flags = Vec::new();
        flags.extend(self.price_vs_momentum(signals));
        flags.extend(self.structure(signals));
        flags.extend(self.multi_reversal(signals));
        flags
    }

    // Trend says one thing, every directional momentum oscillator the other.
    fn price_vs_momentum(&self, signals: &[IndicatorSignal]) -> Option<DivergenceFlag> {
        let price = find(signals, IndicatorId::Sbst).or_else(|| find(signals, IndicatorId::HalfTrend))?;
        if !price.direction.is_directional() {
            return None;
        }

        let momentum: Vec<&IndicatorSignal> = signals
            .iter()
            .filter(|s| s.indicator_id.is_momentum_oscillator() && s.direction.is_directional())
            .collect();
        if momentum.is_empty() || !momentum.iter().all(|m| m.direction.opposes(price.direction)) {
            return None;
        }

        let mut involved = vec![price.indicator_id];
        involved.extend(momentum.iter().map(|m| m.indicator_id));
        Some(DivergenceFlag {
            kind: DivergenceKind::PriceMomentum,
            severity: Severity::High,
            description: format!(
                "{} trend {} but momentum not confirming",
                price.indicator_id, price.direction
            ),
            indicators_involved: involved,
            penalty_factor: self.price_momentum_penalty,
        })
    }

    fn structure(&self, signals: &[IndicatorSignal]) -> Option<DivergenceFlag> {
        let sbst = find(signals, IndicatorId::Sbst)?;
        let smc = find(signals, IndicatorId::Smc)?;
        if !trends_disagree(sbst.direction, smc.direction) {
            return None;
        }
        Some(DivergenceFlag {
            kind: DivergenceKind::Structure,
            severity: Severity::Medium,
            description: format!(
                "SBST {} and SMC {} disagree on trend direction",
                sbst.direction, smc.direction
            ),
            indicators_involved: vec![IndicatorId::Sbst, IndicatorId::Smc],
            penalty_factor: self.structure_penalty,
        })
    }

    fn multi_reversal(&self, signals: &[IndicatorSignal]) -> Option<DivergenceFlag> {
        let reversing: Vec<IndicatorId> = REVERSAL_WATCHERS
            .iter()
            .filter(|&&id| find(signals, id).map(|s| s.reversal).unwrap_or(false))
            .copied()
            .collect();
        if reversing.len() < REVERSAL_QUORUM {
            return None;
        }
        Some(DivergenceFlag {
            kind: DivergenceKind::MultiReversal,
            severity: Severity::High,
            description: format!("{} indicators signaling reversal", reversing.len()),
            indicators_involved: reversing,
            penalty_factor: self.multi_reversal_penalty,
        })
    }
}

fn find(signals: &[IndicatorSignal], id: IndicatorId) -> Option<&IndicatorSignal> {
    signals.iter().find(|s| s.indicator_id == id)
}

fn sanitize(factor: f64) -> f64 {
    if factor.is_finite() {
        factor.clamp(MIN_PENALTY_FACTOR, 1.0)
    } else {
        1.0
    }
}

/// Product of all penalty factors, never below `floor`.
pub fn composite_penalty(flags: &[DivergenceFlag], floor: f64) -> f64 {
    let floor = floor.clamp(0.0, 1.0);
    flags
        .iter()
        .map(|f| f.penalty_factor)
        .product::<f64>()
        .max(floor)
}

pub fn apply_penalty(score: f64, flags: &[DivergenceFlag], floor: f64) -> f64 {
    (score * composite_penalty(flags, floor)).clamp(0.0, 100.0)
}

/// Differing readings where at least one side has a direction.
pub fn trends_disagree(trend: Trend, other: Trend) -> bool {
    trend != other && (trend.is_directional() || other.is_directional())
}
