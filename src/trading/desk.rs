use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};

use crate::config::{Config, RiskProfile};
use crate::core::kelly::KellyEstimate;
use crate::core::validator::{RejectKind, TradeValidationResult, TradeValidator};
use crate::models::TradeProposal;
use crate::trading::portfolio::{ClosedTrade, OpenPosition, PortfolioState};
use crate::trading::report::RiskReport;

pub type PortfolioBook = Arc<Mutex<PortfolioState>>;

/// What happened to one submitted proposal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    pub symbol: String,
    pub result: TradeValidationResult,
    /// The position booked, when approved.
    pub position: Option<OpenPosition>,
}

/// Owns the portfolio and every write to it. Cloning shares the same book.
#[derive(Clone)]
pub struct RiskDesk {
    book: PortfolioBook,
    profile: Arc<RwLock<RiskProfile>>,
    cfg: Arc<Config>,
}

impl RiskDesk {
    /// Starts a fresh book at the profile's account balance.
    pub fn new(cfg: &Config) -> Self {
        Self::with_state(cfg, PortfolioState::new(cfg.risk.account_balance))
    }

    pub fn with_state(cfg: &Config, state: PortfolioState) -> Self {
        Self {
            book: Arc::new(Mutex::new(state)),
            profile: Arc::new(RwLock::new(cfg.risk.clone())),
            cfg: Arc::new(cfg.clone()),
        }
    }

    pub async fn profile(&self) -> RiskProfile {
        self.profile.read().await.clone()
    }

    /// Replaces the risk profile. The account balance in the new profile does
    /// not touch the book.
    pub async fn update_profile(&self, profile: RiskProfile) {
        info!(
            "Risk profile updated: risk/trade {:.2}% heat {:.2}% dd {:.2}% threshold {:.1} WR {:.2} b {:.2}",
            profile.max_risk_per_trade * 100.0,
            profile.max_portfolio_heat * 100.0,
            profile.max_drawdown * 100.0,
            profile.confidence_threshold,
            profile.win_rate,
            profile.avg_win_loss_ratio
        );
        *self.profile.write().await = profile;
    }

    /// Validates and, if approved, books the position under one lock so no
    /// other submission can slip past the same heat budget.
    pub async fn submit(&self, proposal: &TradeProposal) -> Submission {
        let profile = self.profile.read().await.clone();
        let mut state = self.book.lock().await;
        state.roll_day(Utc::now().date_naive());

        let mut result = TradeValidator::new(&self.cfg).validate_trade(proposal, &profile, &state);
        if result.approved && state.has_position(&proposal.symbol) {
            result.reject(
                RejectKind::DuplicatePosition,
                format!("{} already has an open position", proposal.symbol),
            );
        }

        let position = match (&result.sizing, result.approved) {
            (Some(sizing), true) => {
                let pos = OpenPosition::new(
                    &proposal.symbol,
                    proposal.direction,
                    proposal.entry,
                    proposal.stop_loss,
                    sizing.recommended_size,
                    Utc::now(),
                )
                .with_target(proposal.take_profit_1);
                state.open(pos.clone());
                Some(pos)
            }
            _ => None,
        };
        drop(state);

        match &position {
            Some(pos) => {
                info!("{}", "=".repeat(60));
                info!(
                    "APPROVED {} {} @ {:.4} | SL {:.4} | TP1 {:.4} | TP2 {:.4}",
                    proposal.direction,
                    proposal.symbol,
                    proposal.entry,
                    proposal.stop_loss,
                    proposal.take_profit_1,
                    proposal.take_profit_2
                );
                info!(
                    "  confidence {:.1} (threshold {:.1}) | risk score {} ({}) | size {:.6} | risk ${:.2}",
                    proposal.weighted_confidence,
                    result.threshold,
                    result.risk_score,
                    result.tier,
                    pos.size,
                    pos.risk_amount
                );
                info!("{}", "=".repeat(60));
            }
            None => {
                warn!(
                    "REJECTED {} {}: {}",
                    proposal.direction,
                    proposal.symbol,
                    result.reasons.join("; ")
                );
            }
        }

        Submission {
            symbol: proposal.symbol.clone(),
            result,
            position,
        }
    }

    pub async fn close_position(&self, symbol: &str, exit_price: f64) -> Option<ClosedTrade> {
        let closed = self.book.lock().await.close(symbol, exit_price, Utc::now());
        match &closed {
            Some(t) => info!(
                "CLOSED {} {} @ {:.4} | PnL ${:+.2} ({:+.2}%)",
                t.direction, t.symbol, t.exit, t.pnl, t.pnl_pct
            ),
            None => warn!("No open position for {}", symbol),
        }
        closed
    }

    /// Closes the open position on `symbol` if `price` has crossed its stop
    /// or first target, releasing its heat.
    pub async fn mark_to_market(&self, symbol: &str, price: f64) -> Option<ClosedTrade> {
        let mut state = self.book.lock().await;
        let reason = state.position(symbol)?.exit_trigger(price)?;
        let closed = state.close_with(symbol, price, Utc::now(), reason);
        drop(state);

        if let Some(t) = &closed {
            info!(
                "EXIT {} {} on {} @ {:.4} | PnL ${:+.2} ({:+.2}%)",
                t.direction, t.symbol, t.reason, t.exit, t.pnl, t.pnl_pct
            );
        }
        closed
    }

    pub async fn risk_report(&self) -> RiskReport {
        let profile = self.profile.read().await.clone();
        let state = self.book.lock().await;
        RiskReport::from_state(&state, &profile, &self.cfg.sizing, &self.cfg.throttle)
    }

    /// Estimate from the closed-trade history. Feeding it back into the
    /// profile is up to the caller.
    pub async fn kelly_estimate(&self) -> KellyEstimate {
        KellyEstimate::from_history(self.book.lock().await.closed_trades())
    }

    pub async fn snapshot(&self) -> PortfolioState {
        self.book.lock().await.clone()
    }
}
