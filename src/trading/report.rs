use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::{RiskProfile, SizingConfig, ThrottleConfig};
use crate::core::heat::{PortfolioStatus, Throttle};
use crate::core::kelly::usable_kelly;
use crate::trading::portfolio::PortfolioState;

/// Point-in-time portfolio risk summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskReport {
    pub balance: f64,
    pub peak_balance: f64,
    pub drawdown: f64,
    pub heat: f64,
    pub open_positions: usize,
    /// Heat budget still unused, as a fraction of balance.
    pub heat_available: f64,
    pub trades_closed: usize,
    /// Realised PnL for the current UTC day.
    pub daily_pnl: f64,
    pub kelly_fraction: f64,
    pub size_multiplier: f64,
    pub status: PortfolioStatus,
}

impl RiskReport {
    pub fn from_state(
        state: &PortfolioState,
        profile: &RiskProfile,
        sizing: &SizingConfig,
        throttle: &ThrottleConfig,
    ) -> Self {
        let t = Throttle::evaluate(state, profile, throttle);
        Self {
            balance: state.balance(),
            peak_balance: state.peak_balance(),
            drawdown: t.drawdown,
            heat: t.heat,
            open_positions: state.open_positions().len(),
            heat_available: (profile.max_portfolio_heat - t.heat).max(0.0),
            trades_closed: state.total_closed(),
            daily_pnl: state.daily_pnl(),
            kelly_fraction: usable_kelly(profile, sizing),
            size_multiplier: t.size_multiplier,
            status: t.status(),
        }
    }

    pub fn log_summary(&self) {
        info!("{}", "=".repeat(60));
        info!("  RISK REPORT  [{}]", self.status);
        info!("  Balance:     ${:.2} (peak ${:.2})", self.balance, self.peak_balance);
        info!("  Drawdown:    {:.2}%", self.drawdown * 100.0);
        info!(
            "  Heat:        {:.2}% ({:.2}% available)",
            self.heat * 100.0,
            self.heat_available * 100.0
        );
        info!("  Positions:   {} open / {} closed", self.open_positions, self.trades_closed);
        info!("  Daily PnL:   ${:+.2}", self.daily_pnl);
        info!("  Kelly:       {:.2}%", self.kelly_fraction * 100.0);
        info!("  Size mult:   {:.2}x", self.size_multiplier);
        info!("{}", "=".repeat(60));
    }
}
