use thiserror::Error;

use crate::models::{Direction, Timeframe};

pub type CoreResult<T> = Result<T, CoreError>;

/// Failures scoped to one symbol's evaluation cycle. None of them touch
/// portfolio state.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoreError {
    #[error("{symbol} {timeframe}: only {present} indicator(s) present, need {required}")]
    MissingData {
        symbol: String,
        timeframe: Timeframe,
        present: usize,
        required: usize,
    },

    #[error("only {available} higher-timeframe snapshot(s) available, need {required}")]
    InsufficientTimeframeData { available: usize, required: usize },

    #[error("stop loss {stop_loss} is not on the losing side of entry {entry} for a {direction}")]
    InvalidStopLoss {
        direction: Direction,
        entry: f64,
        stop_loss: f64,
    },
}
