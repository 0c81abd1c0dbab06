use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::{RiskProfile, ThrottleConfig};
use crate::trading::portfolio::PortfolioState;

/// Fraction of balance at risk across every open position.
pub fn heat(state: &PortfolioState) -> f64 {
    let at_risk: f64 = state.open_positions().iter().map(|p| p.risk_dollars()).sum();
    if state.balance() <= 0.0 {
        return if at_risk > 0.0 { 1.0 } else { 0.0 };
    }
    at_risk / state.balance()
}

/// Fractional decline from the peak balance; zero at or above the peak.
pub fn drawdown(state: &PortfolioState) -> f64 {
    let peak = state.peak_balance();
    if peak <= 0.0 || state.balance() >= peak {
        return 0.0;
    }
    (peak - state.balance()) / peak
}

/// Largest size whose stop-out risk still fits in the remaining heat budget.
/// An exhausted budget yields zero, which blocks new trades without erroring.
pub fn max_position_for_heat(state: &PortfolioState, profile: &RiskProfile, per_unit_risk: f64) -> f64 {
    let available = profile.max_portfolio_heat - heat(state);
    if available <= 0.0 || per_unit_risk <= 0.0 || state.balance() <= 0.0 {
        return 0.0;
    }
    state.balance() * available / per_unit_risk
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeatBand {
    Cool,
    Elevated,
    Hot,
    Blocked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DrawdownBand {
    Normal,
    Light,
    Heavy,
    ManualReview,
    HardStop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PortfolioStatus {
    Healthy,
    Reduced,
    Stopped,
    Emergency,
}

impl fmt::Display for PortfolioStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PortfolioStatus::Healthy => write!(f, "Healthy"),
            PortfolioStatus::Reduced => write!(f, "Reduced"),
            PortfolioStatus::Stopped => write!(f, "Stopped"),
            PortfolioStatus::Emergency => write!(f, "Emergency"),
        }
    }
}

/// Combined verdict of both throttling axes. The more restrictive one wins.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Throttle {
    pub heat: f64,
    pub drawdown: f64,
    pub heat_band: HeatBand,
    pub drawdown_band: DrawdownBand,
    pub size_multiplier: f64,
}

impl Throttle {
    pub fn evaluate(state: &PortfolioState, profile: &RiskProfile, cfg: &ThrottleConfig) -> Self {
        let h = heat(state);
        let dd = drawdown(state);

        let (heat_band, heat_mult) = if h < cfg.heat_elevated {
            (HeatBand::Cool, 1.0)
        } else if h < cfg.heat_reduce {
            (HeatBand::Elevated, 1.0)
        } else if h < profile.max_portfolio_heat {
            (HeatBand::Hot, cfg.heat_reduce_factor)
        } else {
            (HeatBand::Blocked, 0.0)
        };

        // The profile ceiling overrides every softer band beneath it.
        let (drawdown_band, dd_mult) = if dd > profile.max_drawdown {
            (DrawdownBand::HardStop, 0.0)
        } else if dd > cfg.drawdown_review {
            (DrawdownBand::ManualReview, 0.0)
        } else if dd >= cfg.drawdown_heavy {
            (DrawdownBand::Heavy, cfg.drawdown_heavy_factor)
        } else if dd >= cfg.drawdown_light {
            (DrawdownBand::Light, cfg.drawdown_light_factor)
        } else {
            (DrawdownBand::Normal, 1.0)
        };

        Self {
            heat: h,
            drawdown: dd,
            heat_band,
            drawdown_band,
            size_multiplier: heat_mult.min(dd_mult).clamp(0.0, 1.0),
        }
    }

    pub fn is_blocked(&self) -> bool {
        self.size_multiplier <= 0.0
    }

    pub fn status(&self) -> PortfolioStatus {
        if self.drawdown_band == DrawdownBand::HardStop {
            PortfolioStatus::Emergency
        } else if self.is_blocked() {
            PortfolioStatus::Stopped
        } else if self.size_multiplier < 1.0 {
            PortfolioStatus::Reduced
        } else {
            PortfolioStatus::Healthy
        }
    }

    /// Why new trades are blocked, if they are.
    pub fn block_reason(&self, profile: &RiskProfile) -> Option<String> {
        match (self.heat_band, self.drawdown_band) {
            (_, DrawdownBand::HardStop) => Some(format!(
                "Drawdown {:.1}% beyond hard limit {:.1}%",
                self.drawdown * 100.0,
                profile.max_drawdown * 100.0
            )),
            (_, DrawdownBand::ManualReview) => Some(format!(
                "Drawdown {:.1}% requires manual review",
                self.drawdown * 100.0
            )),
            (HeatBand::Blocked, _) => Some(format!(
                "Portfolio heat {:.1}% >= max {:.1}%",
                self.heat * 100.0,
                profile.max_portfolio_heat * 100.0
            )),
            _ => None,
        }
    }
}
