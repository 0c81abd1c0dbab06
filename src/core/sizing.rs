use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::{RiskProfile, SizingConfig, ThrottleConfig};
use crate::core::heat::{max_position_for_heat, Throttle};
use crate::core::kelly::usable_kelly;
use crate::error::{CoreError, CoreResult};
use crate::models::Direction;
use crate::trading::portfolio::PortfolioState;

const CONSERVATIVE_SHARE: f64 = 0.7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SizingMethod {
    FixedFraction,
    Kelly,
    ConfidenceScaled,
    HeatCap,
    /// Throttling zeroed the size regardless of the candidates.
    Blocked,
}

impl fmt::Display for SizingMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SizingMethod::FixedFraction => write!(f, "fixed_fraction"),
            SizingMethod::Kelly => write!(f, "kelly"),
            SizingMethod::ConfidenceScaled => write!(f, "confidence_scaled"),
            SizingMethod::HeatCap => write!(f, "heat_cap"),
            SizingMethod::Blocked => write!(f, "blocked"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SizingCandidates {
    pub fixed_fraction: f64,
    pub kelly: f64,
    pub confidence_scaled: f64,
    pub heat_cap: f64,
}

impl SizingCandidates {
    /// The binding candidate. Ties go to the earlier method.
    fn binding(&self) -> (SizingMethod, f64) {
        [
            (SizingMethod::FixedFraction, self.fixed_fraction),
            (SizingMethod::Kelly, self.kelly),
            (SizingMethod::ConfidenceScaled, self.confidence_scaled),
            (SizingMethod::HeatCap, self.heat_cap),
        ]
        .into_iter()
        .fold((SizingMethod::FixedFraction, f64::INFINITY), |best, c| {
            if c.1 < best.1 {
                c
            } else {
                best
            }
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionSizingResult {
    pub recommended_size: f64,
    pub risk_dollars: f64,
    pub risk_per_unit: f64,
    pub kelly_fraction: f64,
    pub method_used: SizingMethod,
    pub candidates: SizingCandidates,
    pub throttle: Throttle,
    pub conservative_size: f64,
    pub aggressive_size: f64,
}

impl PositionSizingResult {
    /// Same sizing with the recommendation scaled down by `factor`.
    pub fn scaled(mut self, factor: f64) -> Self {
        let factor = factor.clamp(0.0, 1.0);
        self.recommended_size *= factor;
        self.risk_dollars = self.recommended_size * self.risk_per_unit;
        self
    }
}

pub struct PositionSizer<'a> {
    sizing: &'a SizingConfig,
    throttle: &'a ThrottleConfig,
    confidence_bar: Option<f64>,
}

impl<'a> PositionSizer<'a> {
    pub fn new(sizing: &'a SizingConfig, throttle: &'a ThrottleConfig) -> Self {
        Self {
            sizing,
            throttle,
            confidence_bar: None,
        }
    }

    /// Ramps the confidence-scaled candidate from `bar` instead of the
    /// profile's static threshold. Used with the regime-adjusted bar.
    pub fn with_confidence_bar(mut self, bar: f64) -> Self {
        self.confidence_bar = Some(bar);
        self
    }

    /// Smallest of the fixed-fraction, Kelly, confidence-scaled and heat-cap
    /// sizes, then throttled by heat and drawdown bands.
    pub fn size(
        &self,
        direction: Direction,
        entry: f64,
        stop_loss: f64,
        confidence: f64,
        profile: &RiskProfile,
        state: &PortfolioState,
    ) -> CoreResult<PositionSizingResult> {
        if !entry.is_finite() || !direction.stop_on_loss_side(entry, stop_loss) {
            return Err(CoreError::InvalidStopLoss {
                direction,
                entry,
                stop_loss,
            });
        }

        let risk_per_unit = (entry - stop_loss).abs();
        let balance = state.balance().max(0.0);
        let kelly_fraction = usable_kelly(profile, self.sizing);

        let bar = self.confidence_bar.unwrap_or(profile.confidence_threshold);
        let fixed_fraction = balance * profile.max_risk_per_trade.max(0.0) / risk_per_unit;
        let candidates = SizingCandidates {
            fixed_fraction,
            kelly: balance * kelly_fraction / risk_per_unit,
            confidence_scaled: fixed_fraction
                * confidence_factor(confidence, bar, self.sizing.confidence_floor),
            heat_cap: max_position_for_heat(state, profile, risk_per_unit),
        };

        let throttle = Throttle::evaluate(state, profile, self.throttle);
        let (method_used, smallest) = if throttle.is_blocked() {
            (SizingMethod::Blocked, 0.0)
        } else {
            let (method, size) = candidates.binding();
            (method, size * throttle.size_multiplier)
        };
        let recommended_size = smallest.max(0.0);

        Ok(PositionSizingResult {
            recommended_size,
            risk_dollars: recommended_size * risk_per_unit,
            risk_per_unit,
            kelly_fraction,
            method_used,
            conservative_size: fixed_fraction * CONSERVATIVE_SHARE,
            aggressive_size: fixed_fraction,
            candidates,
            throttle,
        })
    }
}

/// Linear ramp from `floor` at the threshold up to 1.0 at confidence 100.
pub fn confidence_factor(confidence: f64, threshold: f64, floor: f64) -> f64 {
    let floor = floor.clamp(0.0, 1.0);
    if !confidence.is_finite() || confidence <= threshold {
        return floor;
    }
    if confidence >= 100.0 || threshold >= 100.0 {
        return 1.0;
    }
    let t = (confidence - threshold) / (100.0 - threshold);
    (floor + (1.0 - floor) * t).clamp(floor, 1.0)
}
