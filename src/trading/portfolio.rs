use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::core::kelly::{HasPnl, ROLLING_WINDOW};
use crate::models::Direction;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    #[default]
    Manual,
    StopLoss,
    TakeProfit,
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitReason::Manual => write!(f, "manual"),
            ExitReason::StopLoss => write!(f, "stop loss"),
            ExitReason::TakeProfit => write!(f, "take profit"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenPosition {
    pub symbol: String,
    pub direction: Direction,
    pub entry: f64,
    pub stop_loss: f64,
    #[serde(default)]
    pub take_profit: Option<f64>,
    pub size: f64,
    pub risk_amount: f64,
    pub opened_at: DateTime<Utc>,
}

impl OpenPosition {
    pub fn new(
        symbol: &str,
        direction: Direction,
        entry: f64,
        stop_loss: f64,
        size: f64,
        opened_at: DateTime<Utc>,
    ) -> Self {
        let size = size.max(0.0);
        Self {
            symbol: symbol.to_string(),
            direction,
            entry,
            stop_loss,
            take_profit: None,
            size,
            risk_amount: size * (entry - stop_loss).abs(),
            opened_at,
        }
    }

    pub fn with_target(mut self, take_profit: f64) -> Self {
        self.take_profit = take_profit.is_finite().then_some(take_profit);
        self
    }

    pub fn per_unit_risk(&self) -> f64 {
        (self.entry - self.stop_loss).abs()
    }

    /// Dollars lost if the stop is hit.
    pub fn risk_dollars(&self) -> f64 {
        self.size * self.per_unit_risk()
    }

    pub fn pnl_at(&self, price: f64) -> f64 {
        (price - self.entry) * self.size * self.direction.sign()
    }

    /// Stop or target crossed at `price`. The stop wins if both are.
    pub fn exit_trigger(&self, price: f64) -> Option<ExitReason> {
        if !price.is_finite() {
            return None;
        }
        let sign = self.direction.sign();
        if (price - self.stop_loss) * sign <= 0.0 {
            return Some(ExitReason::StopLoss);
        }
        match self.take_profit {
            Some(tp) if (price - tp) * sign >= 0.0 => Some(ExitReason::TakeProfit),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClosedTrade {
    pub symbol: String,
    pub direction: Direction,
    pub entry: f64,
    pub exit: f64,
    pub size: f64,
    pub pnl: f64,
    pub pnl_pct: f64,
    #[serde(default)]
    pub reason: ExitReason,
    pub opened_at: DateTime<Utc>,
    pub closed_at: DateTime<Utc>,
}

impl HasPnl for ClosedTrade {
    fn pnl(&self) -> f64 {
        self.pnl
    }
}

/// Balance, peak and open exposure shared by every symbol. Heat and drawdown
/// are always computed from this on demand.
///
/// `peak_balance >= balance` holds at all times: the peak only ever rises.
/// Only the latest `ROLLING_WINDOW` closed trades are retained.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioState {
    balance: f64,
    peak_balance: f64,
    open_positions: Vec<OpenPosition>,
    closed_trades: Vec<ClosedTrade>,
    #[serde(default)]
    total_closed: usize,
    #[serde(default)]
    trading_day: Option<NaiveDate>,
    #[serde(default)]
    day_open_balance: f64,
    #[serde(default)]
    daily_pnl: f64,
}

impl PortfolioState {
    pub fn new(balance: f64) -> Self {
        Self::with_peak(balance, balance)
    }

    /// State with a balance below a previously reached peak. A `peak_balance`
    /// under `balance` is lifted to `balance`.
    pub fn with_peak(balance: f64, peak_balance: f64) -> Self {
        Self {
            balance,
            peak_balance: peak_balance.max(balance),
            open_positions: Vec::new(),
            closed_trades: Vec::new(),
            total_closed: 0,
            trading_day: None,
            day_open_balance: balance,
            daily_pnl: 0.0,
        }
    }

    pub fn balance(&self) -> f64 {
        self.balance
    }

    pub fn peak_balance(&self) -> f64 {
        self.peak_balance
    }

    pub fn open_positions(&self) -> &[OpenPosition] {
        &self.open_positions
    }

    pub fn position(&self, symbol: &str) -> Option<&OpenPosition> {
        self.open_positions.iter().find(|p| p.symbol == symbol)
    }

    pub fn closed_trades(&self) -> &[ClosedTrade] {
        &self.closed_trades
    }

    /// Every trade ever closed, including those rolled out of the history.
    pub fn total_closed(&self) -> usize {
        self.total_closed
    }

    pub fn has_position(&self, symbol: &str) -> bool {
        self.position(symbol).is_some()
    }

    pub fn open(&mut self, position: OpenPosition) {
        self.open_positions.push(position);
    }

    /// Starts a new UTC trading day if `day` differs from the current one.
    pub fn roll_day(&mut self, day: NaiveDate) {
        if self.trading_day != Some(day) {
            self.trading_day = Some(day);
            self.day_open_balance = self.balance;
            self.daily_pnl = 0.0;
        }
    }

    /// Realised PnL since the current trading day opened.
    pub fn daily_pnl(&self) -> f64 {
        self.daily_pnl
    }

    /// Today's realised loss as a fraction of the day's opening balance.
    pub fn daily_loss(&self) -> f64 {
        if self.daily_pnl >= 0.0 {
            return 0.0;
        }
        if self.day_open_balance <= 0.0 {
            return 1.0;
        }
        -self.daily_pnl / self.day_open_balance
    }

    /// Realises PnL on the first open position for `symbol`.
    pub fn close(&mut self, symbol: &str, exit_price: f64, at: DateTime<Utc>) -> Option<ClosedTrade> {
        self.close_with(symbol, exit_price, at, ExitReason::Manual)
    }

    pub fn close_with(
        &mut self,
        symbol: &str,
        exit_price: f64,
        at: DateTime<Utc>,
        reason: ExitReason,
    ) -> Option<ClosedTrade> {
        let idx = self.open_positions.iter().position(|p| p.symbol == symbol)?;
        let pos = self.open_positions.remove(idx);

        let pnl = pos.pnl_at(exit_price);
        let notional = pos.entry * pos.size;
        let pnl_pct = if notional > 0.0 { pnl / notional * 100.0 } else { 0.0 };
        self.roll_day(at.date_naive());
        self.apply_pnl(pnl);
        if pnl.is_finite() {
            self.daily_pnl += pnl;
        }

        let trade = ClosedTrade {
            symbol: pos.symbol,
            direction: pos.direction,
            entry: pos.entry,
            exit: exit_price,
            size: pos.size,
            pnl,
            pnl_pct,
            reason,
            opened_at: pos.opened_at,
            closed_at: at,
        };
        self.closed_trades.push(trade.clone());
        if self.closed_trades.len() > ROLLING_WINDOW {
            let excess = self.closed_trades.len() - ROLLING_WINDOW;
            self.closed_trades.drain(..excess);
        }
        self.total_closed += 1;
        Some(trade)
    }

    /// Books a realised gain or loss, lifting the peak on new highs.
    pub fn apply_pnl(&mut self, pnl: f64) {
        if !pnl.is_finite() {
            return;
        }
        self.balance += pnl;
        if self.balance > self.peak_balance {
            self.peak_balance = self.balance;
        }
    }
}
