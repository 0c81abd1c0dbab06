use serde::{Deserialize, Serialize};

use crate::config::{RiskProfile, SizingConfig};

const MIN_SAMPLE_SIZE: usize = 20;
/// Closed trades the estimate looks back over.
pub const ROLLING_WINDOW: usize = 100;

/// Raw Kelly bet `(p * b - q) / b`. No edge means no bet, never a negative one.
pub fn raw_kelly(win_rate: f64, payoff_ratio: f64) -> f64 {
    if payoff_ratio.is_nan() || payoff_ratio <= 0.0 || !win_rate.is_finite() {
        return 0.0;
    }
    let p = win_rate.clamp(0.0, 1.0);
    let q = 1.0 - p;
    ((p * payoff_ratio - q) / payoff_ratio).max(0.0)
}

/// Fraction of balance the sizing engine may risk on Kelly grounds: the raw
/// bet capped, then cut down by the safety multiplier.
pub fn usable_kelly(profile: &RiskProfile, cfg: &SizingConfig) -> f64 {
    raw_kelly(profile.win_rate, profile.avg_win_loss_ratio).min(cfg.max_raw_kelly) * cfg.kelly_safety
}

/// Anything that closed with a realised PnL.
pub trait HasPnl {
    fn pnl(&self) -> f64;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KellyEstimate {
    pub win_rate: f64,
    pub payoff_ratio: f64,
    pub full_kelly: f64,
    pub sample_size: usize,
    pub using_default: bool,
}

impl KellyEstimate {
    /// Win rate and payoff ratio over the most recent trades. Too little
    /// history leaves the estimate flagged as default and unusable.
    pub fn from_history<T: HasPnl>(history: &[T]) -> Self {
        let start = history.len().saturating_sub(ROLLING_WINDOW);
        let trades = &history[start..];

        if trades.len() < MIN_SAMPLE_SIZE {
            return Self {
                win_rate: 0.0,
                payoff_ratio: 0.0,
                full_kelly: 0.0,
                sample_size: trades.len(),
                using_default: true,
            };
        }

        let wins: Vec<f64> = trades.iter().map(|t| t.pnl()).filter(|p| *p > 0.0).collect();
        let losses: Vec<f64> = trades.iter().map(|t| t.pnl()).filter(|p| *p <= 0.0).collect();

        let p = wins.len() as f64 / trades.len() as f64;
        let avg_win = if wins.is_empty() {
            0.0
        } else {
            wins.iter().sum::<f64>() / wins.len() as f64
        };
        let avg_loss = if losses.is_empty() {
            1.0
        } else {
            (losses.iter().sum::<f64>() / losses.len() as f64).abs()
        };
        let b = if avg_loss > 0.0 { avg_win / avg_loss } else { 0.0 };

        Self {
            win_rate: round_to(p, 4),
            payoff_ratio: round_to(b, 4),
            full_kelly: round_to(raw_kelly(p, b), 6),
            sample_size: trades.len(),
            using_default: false,
        }
    }

    /// `profile` with win rate and payoff replaced by this estimate, or
    /// unchanged when the estimate rests on too few trades.
    pub fn apply_to(&self, profile: &RiskProfile) -> RiskProfile {
        let mut updated = profile.clone();
        if !self.using_default && self.payoff_ratio > 0.0 {
            updated.win_rate = self.win_rate;
            updated.avg_win_loss_ratio = self.payoff_ratio;
        }
        updated
    }
}

fn round_to(x: f64, places: i32) -> f64 {
    let scale = 10f64.powi(places);
    (x * scale).round() / scale
}
