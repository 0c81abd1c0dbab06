use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{Config, InsufficientDataPolicy, MtfPolicy, ScoringConfig, WeightTable};
use crate::core::adapter::{normalize, SignalAdapter};
use crate::core::aggregator::{baseline, BaselineScore, ConfidenceAggregator};
use crate::core::divergence::{apply_penalty, DivergenceDetector, DivergenceFlag};
use crate::core::mtf::{MultiTimeframeValidation, MultiTimeframeValidator, TimeframeSnapshot};
use crate::error::{CoreError, CoreResult};
use crate::models::{Direction, MarketRegime, MarketSnapshot, TradeProposal};

/// Outcome of scoring one symbol for one cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Evaluation {
    Proposal(TradeProposal),
    /// Neither side collected enough agreement.
    Wait {
        symbol: String,
        long_points: u32,
        short_points: u32,
    },
}

/// Signal-to-proposal pipeline: adapt, pick a side, score, penalise,
/// check higher timeframes, then lay out levels.
#[derive(Debug, Clone)]
pub struct SignalEvaluator {
    weights: WeightTable,
    scoring: ScoringConfig,
    mtf: MtfPolicy,
}

impl SignalEvaluator {
    pub fn new(cfg: &Config) -> Self {
        Self {
            weights: cfg.weights.clone(),
            scoring: cfg.scoring.clone(),
            mtf: cfg.mtf.clone(),
        }
    }

    pub fn evaluate(&self, base: &MarketSnapshot, higher: &[MarketSnapshot]) -> CoreResult<Evaluation> {
        let adapter = SignalAdapter::new(self.scoring.min_indicators);
        let signals = adapter.adapt(&base.symbol, base.timeframe, &base.readings)?;

        let tally = baseline(&signals, &self.scoring);
        let direction = match tally.direction {
            Some(d) => d,
            None => {
                debug!(
                    "{} WAIT: long={} short={} points",
                    base.symbol, tally.long_points, tally.short_points
                );
                return Ok(Evaluation::Wait {
                    symbol: base.symbol.clone(),
                    long_points: tally.long_points,
                    short_points: tally.short_points,
                });
            }
        };

        let (entry, stop_loss) = self.levels(base, direction)?;

        let score = ConfidenceAggregator::new(&self.weights, self.scoring.blend_baseline_ratio)
            .aggregate(&signals, direction, tally.score);
        let divergences = DivergenceDetector::from_config(&self.scoring).detect(&signals);
        let mut confidence = apply_penalty(score.blended_score, &divergences, self.scoring.divergence_floor);

        let snapshots: Vec<TimeframeSnapshot> = higher
            .iter()
            .map(|m| {
                TimeframeSnapshot::from_signals(
                    m.timeframe,
                    normalize(&m.readings, m.timeframe),
                    &self.weights,
                    self.mtf.dead_band,
                )
            })
            .collect();
        let (multi_tf_validation, mtf_penalty) = self.check_timeframes(direction, &snapshots)?;
        confidence = (confidence * mtf_penalty).clamp(0.0, 100.0);

        debug!(
            "{} {} baseline={:.1} raw={:.1} blended={:.1} divergences={} mtf={:.1}/{} final={:.1}",
            base.symbol,
            direction,
            tally.score,
            score.raw_score,
            score.blended_score,
            divergences.len(),
            multi_tf_validation.score,
            multi_tf_validation.required,
            confidence
        );

        Ok(Evaluation::Proposal(self.build_proposal(
            base,
            direction,
            entry,
            stop_loss,
            &tally,
            confidence,
            divergences,
            multi_tf_validation,
        )))
    }

    fn levels(&self, base: &MarketSnapshot, direction: Direction) -> CoreResult<(f64, f64)> {
        let entry = base.price;
        let stop_loss = match direction {
            Direction::Long => base.support,
            Direction::Short => base.resistance,
        };
        if !entry.is_finite() || !direction.stop_on_loss_side(entry, stop_loss) {
            return Err(CoreError::InvalidStopLoss {
                direction,
                entry,
                stop_loss,
            });
        }
        Ok((entry, stop_loss))
    }

    /// Verdict plus the confidence multiplier the insufficient-data policy
    /// imposes (1.0 when enough higher timeframes were available).
    fn check_timeframes(
        &self,
        direction: Direction,
        snapshots: &[TimeframeSnapshot],
    ) -> CoreResult<(MultiTimeframeValidation, f64)> {
        let validator = MultiTimeframeValidator::new(self.mtf.neutral_credit);
        match validator.validate(direction, snapshots, self.mtf.required_confirmations) {
            Ok(v) => Ok((v, 1.0)),
            Err(CoreError::InsufficientTimeframeData { available, required }) => {
                match self.mtf.on_insufficient {
                    InsufficientDataPolicy::ReducedConfidence { penalty } if available > 0 => {
                        let mut v = validator.validate(direction, snapshots, available)?;
                        v.reasoning.push(format!(
                            "only {} of {} higher timeframes available, confidence x{:.2}",
                            available, required, penalty
                        ));
                        Ok((v, penalty.clamp(0.0, 1.0)))
                    }
                    _ => Ok((unconfirmed(available, required), 1.0)),
                }
            }
            Err(e) => Err(e),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn build_proposal(
        &self,
        base: &MarketSnapshot,
        direction: Direction,
        entry: f64,
        stop_loss: f64,
        tally: &BaselineScore,
        confidence: f64,
        divergences: Vec<DivergenceFlag>,
        multi_tf_validation: MultiTimeframeValidation,
    ) -> TradeProposal {
        let risk = (entry - stop_loss).abs();
        // Without a usable ATR, targets fall back to multiples of the stop distance.
        let unit = if base.atr.is_finite() && base.atr > 0.0 { base.atr } else { risk };
        let sign = direction.sign();
        let take_profit_1 = entry + sign * unit * self.scoring.tp1_atr_multiple;
        let take_profit_2 = entry + sign * unit * self.scoring.tp2_atr_multiple;
        let risk_reward = if risk > 0.0 {
            (take_profit_1 - entry).abs() / risk
        } else {
            0.0
        };

        TradeProposal {
            symbol: base.symbol.clone(),
            direction,
            timeframe: base.timeframe,
            entry,
            stop_loss,
            take_profit_1,
            take_profit_2,
            risk_reward,
            raw_confidence: tally.score,
            weighted_confidence: confidence,
            divergences,
            multi_tf_validation,
            regime: MarketRegime::from_readings(&base.readings),
        }
    }
}

fn unconfirmed(available: usize, required: usize) -> MultiTimeframeValidation {
    MultiTimeframeValidation {
        approved: false,
        confirmations: 0,
        partial_confirmations: 0,
        score: 0.0,
        required,
        strength: 0.0,
        aligned_timeframes: Default::default(),
        reasoning: vec![format!(
            "only {} of {} higher timeframes available",
            available, required
        )],
    }
}
