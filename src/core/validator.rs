use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::{Config, RiskProfile, RiskScoreConfig, SizingConfig, ThresholdConfig, ThrottleConfig};
use crate::core::heat::heat;
use crate::core::sizing::{PositionSizer, PositionSizingResult};
use crate::core::threshold::ConfidenceThreshold;
use crate::error::CoreError;
use crate::models::TradeProposal;
use crate::trading::portfolio::PortfolioState;

const CONFIDENCE_POINTS: f64 = 30.0;
const RISK_POINTS: f64 = 40.0;
const HEAT_POINTS: f64 = 30.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectKind {
    LowConfidence,
    TimeframeMismatch,
    InvalidStopLoss,
    /// Heat or drawdown ceiling reached. Expected and frequent.
    PortfolioLimitExceeded,
    NoEdge,
    LowRiskScore,
    DuplicatePosition,
    MaxOpenPositions,
    DailyLossLimit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskTier {
    Full,
    Normal,
    Reduced,
    Reject,
}

impl fmt::Display for RiskTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskTier::Full => write!(f, "full"),
            RiskTier::Normal => write!(f, "normal"),
            RiskTier::Reduced => write!(f, "reduced"),
            RiskTier::Reject => write!(f, "reject"),
        }
    }
}

impl RiskTier {
    pub fn from_score(score: u32, cfg: &RiskScoreConfig) -> Self {
        if score >= cfg.full_tier {
            RiskTier::Full
        } else if score >= cfg.normal_tier {
            RiskTier::Normal
        } else if score >= cfg.reduced_tier {
            RiskTier::Reduced
        } else {
            RiskTier::Reject
        }
    }

    pub fn size_multiplier(&self, cfg: &RiskScoreConfig) -> f64 {
        match self {
            RiskTier::Full => cfg.full_multiplier,
            RiskTier::Normal => cfg.normal_multiplier,
            RiskTier::Reduced => cfg.reduced_multiplier,
            RiskTier::Reject => 0.0,
        }
    }
}

/// Composite 0-100 score: confidence (0-30), per-trade risk (0-40) and
/// portfolio heat (0-30). Each part is monotone in its input.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskScore {
    pub confidence_component: f64,
    pub risk_component: f64,
    pub heat_component: f64,
    pub total: u32,
}

impl RiskScore {
    pub fn compute(confidence: f64, stop_distance_pct: f64, heat: f64, max_heat: f64, cfg: &RiskScoreConfig) -> Self {
        let confidence_component = finite_or_zero((confidence - 50.0) / 50.0 * CONFIDENCE_POINTS)
            .clamp(0.0, CONFIDENCE_POINTS);
        let risk_component = finite_or_zero(RISK_POINTS - stop_distance_pct * cfg.points_per_stop_pct)
            .clamp(0.0, RISK_POINTS);
        let heat_component = if max_heat > 0.0 {
            finite_or_zero((1.0 - heat / max_heat) * HEAT_POINTS).clamp(0.0, HEAT_POINTS)
        } else {
            0.0
        };

        let total = (confidence_component + risk_component + heat_component)
            .floor()
            .clamp(0.0, 100.0) as u32;

        Self {
            confidence_component,
            risk_component,
            heat_component,
            total,
        }
    }
}

fn finite_or_zero(x: f64) -> f64 {
    if x.is_finite() {
        x
    } else {
        0.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeValidationResult {
    pub approved: bool,
    pub risk_score: u32,
    pub tier: RiskTier,
    pub threshold: f64,
    /// Every failing check, in gate order. Empty only when approved.
    pub reasons: Vec<String>,
    pub reject_kinds: Vec<RejectKind>,
    /// Always present when approved, already scaled by the tier.
    pub sizing: Option<PositionSizingResult>,
}

impl TradeValidationResult {
    pub fn rejected_for(&self, kind: RejectKind) -> bool {
        self.reject_kinds.contains(&kind)
    }

    pub(crate) fn reject(&mut self, kind: RejectKind, reason: String) {
        self.approved = false;
        self.reject_kinds.push(kind);
        self.reasons.push(reason);
        if let Some(s) = self.sizing.as_mut() {
            s.recommended_size = 0.0;
            s.risk_dollars = 0.0;
        }
    }
}

/// Runs every gate against one proposal. Pure: it reads the portfolio but
/// never writes it.
pub struct TradeValidator<'a> {
    sizing: &'a SizingConfig,
    throttle: &'a ThrottleConfig,
    threshold: &'a ThresholdConfig,
    risk_score: &'a RiskScoreConfig,
}

impl<'a> TradeValidator<'a> {
    pub fn new(cfg: &'a Config) -> Self {
        Self {
            sizing: &cfg.sizing,
            throttle: &cfg.throttle,
            threshold: &cfg.threshold,
            risk_score: &cfg.risk_score,
        }
    }

    pub fn validate_trade(
        &self,
        proposal: &TradeProposal,
        profile: &RiskProfile,
        state: &PortfolioState,
    ) -> TradeValidationResult {
        let mut reasons = Vec::new();
        let mut reject_kinds = Vec::new();
        let current_heat = heat(state);

        // 1. confidence
        let threshold = ConfidenceThreshold::compute(
            profile.confidence_threshold,
            &proposal.regime,
            current_heat,
            self.threshold,
        );
        if !threshold.passes(proposal.weighted_confidence) {
            let mut reason = format!(
                "Confidence {:.1} below threshold {:.1}",
                proposal.weighted_confidence, threshold.value
            );
            if !threshold.adjustments.is_empty() {
                reason.push_str(&format!(" (raised for {})", threshold.adjustments.join(", ")));
            }
            reasons.push(reason);
            reject_kinds.push(RejectKind::LowConfidence);
        }

        // 2. higher timeframes
        let mtf = &proposal.multi_tf_validation;
        if !mtf.approved {
            reasons.push(format!(
                "Multi-timeframe not aligned: score {:.1} of {} required ({} outright, {} neutral, strength {:.1})",
                mtf.score, mtf.required, mtf.confirmations, mtf.partial_confirmations, mtf.strength
            ));
            reject_kinds.push(RejectKind::TimeframeMismatch);
        }

        // 3. book limits
        let open = state.open_positions().len();
        if open >= profile.max_open_positions {
            reasons.push(format!(
                "Max open positions reached ({}/{})",
                open, profile.max_open_positions
            ));
            reject_kinds.push(RejectKind::MaxOpenPositions);
        }
        if state.daily_pnl() < 0.0 && state.daily_loss() >= profile.max_daily_loss {
            reasons.push(format!(
                "Daily loss limit hit: ${:.2} ({:.2}% >= {:.2}%)",
                -state.daily_pnl(),
                state.daily_loss() * 100.0,
                profile.max_daily_loss * 100.0
            ));
            reject_kinds.push(RejectKind::DailyLossLimit);
        }

        // 4. sizing
        let sizer = PositionSizer::new(self.sizing, self.throttle).with_confidence_bar(threshold.value);
        let sizing = match sizer.size(
            proposal.direction,
            proposal.entry,
            proposal.stop_loss,
            proposal.weighted_confidence,
            profile,
            state,
        ) {
            Ok(s) => {
                if let Some(block) = s.throttle.block_reason(profile) {
                    reasons.push(block);
                    reject_kinds.push(RejectKind::PortfolioLimitExceeded);
                } else if s.candidates.heat_cap <= 0.0 {
                    reasons.push(format!(
                        "No heat budget left ({:.2}% of {:.2}%)",
                        current_heat * 100.0,
                        profile.max_portfolio_heat * 100.0
                    ));
                    reject_kinds.push(RejectKind::PortfolioLimitExceeded);
                } else if s.recommended_size <= 0.0 {
                    reasons.push(format!(
                        "No edge: Kelly fraction {:.4} sizes to zero",
                        s.kelly_fraction
                    ));
                    reject_kinds.push(RejectKind::NoEdge);
                }
                Some(s)
            }
            Err(e @ CoreError::InvalidStopLoss { .. }) => {
                reasons.push(e.to_string());
                reject_kinds.push(RejectKind::InvalidStopLoss);
                None
            }
            Err(e) => {
                reasons.push(e.to_string());
                None
            }
        };

        // 5. composite score
        let score = RiskScore::compute(
            proposal.weighted_confidence,
            proposal.stop_distance_pct(),
            current_heat,
            profile.max_portfolio_heat,
            self.risk_score,
        );
        let tier = RiskTier::from_score(score.total, self.risk_score);
        if tier == RiskTier::Reject {
            reasons.push(format!(
                "Risk score {} below minimum {}",
                score.total, self.risk_score.reduced_tier
            ));
            reject_kinds.push(RejectKind::LowRiskScore);
        }

        let approved = reasons.is_empty();
        let sizing = sizing.map(|s| {
            if approved {
                s.scaled(tier.size_multiplier(self.risk_score))
            } else {
                s.scaled(0.0)
            }
        });

        TradeValidationResult {
            approved,
            risk_score: score.total,
            tier,
            threshold: threshold.value,
            reasons,
            reject_kinds,
            sizing,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Direction, MarketRegime, Timeframe, Trend};
    use crate::test_helpers::{mtf_verdict, position, proposal, ts};

    fn validate(p: &TradeProposal, state: &PortfolioState) -> TradeValidationResult {
        let cfg = Config::default();
        TradeValidator::new(&cfg).validate_trade(p, &cfg.risk, state)
    }

    #[test]
    fn clean_proposal_is_approved_and_sized() {
        // confidence 90 -> 24, stop 1% -> 30, no heat -> 30
        let p = proposal("BTC/USDT", Direction::Long, 100.0, 99.0, 90.0);
        let r = validate(&p, &PortfolioState::new(10_000.0));
        assert!(r.approved, "{:?}", r.reasons);
        assert_eq!(r.risk_score, 84);
        assert_eq!(r.tier, RiskTier::Full);
        let sizing = r.sizing.unwrap();
        assert!(sizing.recommended_size > 0.0);
        assert!((sizing.risk_dollars - sizing.recommended_size).abs() < 1e-9);
    }

    #[test]
    fn low_confidence_rejects_regardless_of_score() {
        let p = proposal("BTC/USDT", Direction::Long, 100.0, 99.9, 74.9);
        let r = validate(&p, &PortfolioState::new(10_000.0));
        assert!(!r.approved);
        assert!(r.rejected_for(RejectKind::LowConfidence));
        assert!(r.reasons[0].contains("Confidence"));
        assert_eq!(r.sizing.unwrap().recommended_size, 0.0);
    }

    #[test]
    fn all_failing_reasons_are_reported() {
        let mut p = proposal("ETH/USDT", Direction::Short, 100.0, 99.0, 40.0);
        p.multi_tf_validation = mtf_verdict(false);
        let r = validate(&p, &PortfolioState::new(10_000.0));
        assert!(!r.approved);
        assert!(r.rejected_for(RejectKind::LowConfidence));
        assert!(r.rejected_for(RejectKind::TimeframeMismatch));
        assert!(r.rejected_for(RejectKind::InvalidStopLoss));
        assert!(r.sizing.is_none());
        assert!(r.reasons.len() >= 3);
    }

    #[test]
    fn regime_raises_the_bar() {
        let mut p = proposal("BTC/USDT", Direction::Long, 100.0, 99.0, 78.0);
        p.regime = MarketRegime {
            trend_strength: Some(12.0),
            oscillator: None,
        };
        let r = validate(&p, &PortfolioState::new(10_000.0));
        assert_eq!(r.threshold, 80.0);
        assert!(r.rejected_for(RejectKind::LowConfidence));
    }

    #[test]
    fn full_heat_is_a_portfolio_limit_rejection() {
        let mut state = PortfolioState::new(10_000.0);
        state.open(position("SOL/USDT", 300.0, 2.0));
        let p = proposal("BTC/USDT", Direction::Long, 100.0, 99.0, 95.0);
        let r = validate(&p, &state);
        assert!(!r.approved);
        assert!(r.rejected_for(RejectKind::PortfolioLimitExceeded));
    }

    #[test]
    fn hard_drawdown_blocks_with_reason() {
        let state = PortfolioState::with_peak(7_500.0, 10_000.0);
        let p = proposal("BTC/USDT", Direction::Long, 100.0, 99.0, 95.0);
        let r = validate(&p, &state);
        assert!(r.rejected_for(RejectKind::PortfolioLimitExceeded));
        assert!(r.reasons.iter().any(|s| s.contains("Drawdown")));
    }

    #[test]
    fn tighter_drawdown_ceiling_rejects_inside_heavy_band() {
        let cfg = Config::default();
        let profile = RiskProfile {
            max_drawdown: 0.08,
            ..RiskProfile::default()
        };
        let state = PortfolioState::with_peak(8_800.0, 10_000.0);
        let p = proposal("BTC/USDT", Direction::Long, 100.0, 99.0, 95.0);
        let r = TradeValidator::new(&cfg).validate_trade(&p, &profile, &state);
        assert!(!r.approved);
        assert!(r.rejected_for(RejectKind::PortfolioLimitExceeded));
        assert_eq!(r.sizing.unwrap().recommended_size, 0.0);
    }

    #[test]
    fn open_position_limit_rejects() {
        let mut state = PortfolioState::new(10_000.0);
        for symbol in ["A", "B", "C"] {
            state.open(position(symbol, 1.0, 0.1));
        }
        let p = proposal("BTC/USDT", Direction::Long, 100.0, 99.0, 90.0);
        let r = validate(&p, &state);
        assert!(!r.approved);
        assert_eq!(r.reject_kinds, vec![RejectKind::MaxOpenPositions]);
    }

    #[test]
    fn daily_loss_limit_rejects_until_tomorrow() {
        let mut state = PortfolioState::new(10_000.0);
        state.open(crate::trading::portfolio::OpenPosition::new(
            "SOL/USDT",
            Direction::Long,
            100.0,
            90.0,
            50.0,
            ts(),
        ));
        // -500 on a 10k day = 5%
        state.close("SOL/USDT", 90.0, ts());
        let p = proposal("BTC/USDT", Direction::Long, 100.0, 99.0, 90.0);
        let r = validate(&p, &state);
        assert!(r.rejected_for(RejectKind::DailyLossLimit), "{:?}", r.reasons);

        state.roll_day((ts() + chrono::Duration::days(1)).date_naive());
        let r = validate(&p, &state);
        assert!(!r.rejected_for(RejectKind::DailyLossLimit));
    }

    #[test]
    fn mid_score_scales_size_down() {
        // confidence 80 -> 18, stop 1.5% -> 25, no heat -> 30 = 73
        let p = proposal("BTC/USDT", Direction::Long, 100.0, 98.5, 80.0);
        let cfg = Config::default();
        let state = PortfolioState::new(10_000.0);
        let r = TradeValidator::new(&cfg).validate_trade(&p, &cfg.risk, &state);
        assert!(r.approved, "{:?}", r.reasons);
        assert_eq!(r.tier, RiskTier::Normal);

        let unscaled = PositionSizer::new(&cfg.sizing, &cfg.throttle)
            .size(Direction::Long, 100.0, 98.5, 80.0, &cfg.risk, &state)
            .unwrap();
        let sizing = r.sizing.unwrap();
        assert!((sizing.recommended_size - unscaled.recommended_size * 0.75).abs() < 1e-9);
    }

    #[test]
    fn wide_stop_fails_on_score_alone() {
        // confidence 80 -> 18, stop 3% -> 10, no heat -> 30 = 58
        let p = proposal("BTC/USDT", Direction::Long, 100.0, 97.0, 80.0);
        let r = validate(&p, &PortfolioState::new(10_000.0));
        assert_eq!(r.tier, RiskTier::Reject);
        assert_eq!(r.reject_kinds, vec![RejectKind::LowRiskScore]);
    }

    #[test]
    fn score_components_are_monotone() {
        let cfg = RiskScoreConfig::default();
        let lo = RiskScore::compute(70.0, 1.0, 0.0, 0.06, &cfg);
        let hi = RiskScore::compute(90.0, 1.0, 0.0, 0.06, &cfg);
        assert!(hi.total >= lo.total);
        let tight = RiskScore::compute(80.0, 0.5, 0.0, 0.06, &cfg);
        let wide = RiskScore::compute(80.0, 2.0, 0.0, 0.06, &cfg);
        assert!(tight.total >= wide.total);
        let cool = RiskScore::compute(80.0, 1.0, 0.01, 0.06, &cfg);
        let hot = RiskScore::compute(80.0, 1.0, 0.05, 0.06, &cfg);
        assert!(cool.total >= hot.total);
        assert!(hot.total <= 100);
    }

    #[test]
    fn validation_is_idempotent() {
        let p = proposal("BTC/USDT", Direction::Long, 100.0, 99.0, 88.0);
        let state = PortfolioState::new(10_000.0);
        let a = serde_json::to_string(&validate(&p, &state)).unwrap();
        let b = serde_json::to_string(&validate(&p, &state)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn neutral_higher_timeframes_follow_policy() {
        let mut p = proposal("BTC/USDT", Direction::Long, 100.0, 99.0, 90.0);
        p.timeframe = Timeframe::M5;
        let validator = crate::core::mtf::MultiTimeframeValidator::new(0.5);
        let snaps = vec![
            crate::core::mtf::TimeframeSnapshot::new(Timeframe::M15, Trend::Bullish),
            crate::core::mtf::TimeframeSnapshot::new(Timeframe::H1, Trend::Neutral),
            crate::core::mtf::TimeframeSnapshot::new(Timeframe::H4, Trend::Neutral),
        ];
        p.multi_tf_validation = validator.validate(Direction::Long, &snaps, 2).unwrap();
        let r = validate(&p, &PortfolioState::new(10_000.0));
        assert!(r.approved, "{:?}", r.reasons);
    }
}
