use chrono::{DateTime, Utc};
use std::collections::BTreeSet;

use crate::core::mtf::MultiTimeframeValidation;
use crate::models::{
    AdxReading, Direction, IndicatorId, IndicatorReadings, IndicatorSignal, MacdReading,
    MarketRegime, SmcReading, SwiftAlgoReading, Timeframe, TradeProposal, Trend, TrendReading,
};
use crate::trading::portfolio::OpenPosition;

/// Fixed clock for anything that stamps a time.
pub fn ts() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2024-01-15T12:00:00Z")
        .unwrap()
        .with_timezone(&Utc)
}

/// Base-timeframe (5m) signal.
pub fn sig(id: IndicatorId, direction: Trend, strength: f64) -> IndicatorSignal {
    IndicatorSignal::new(id, direction, strength, Timeframe::M5)
}

pub fn sig_on(id: IndicatorId, direction: Trend, strength: f64, tf: Timeframe) -> IndicatorSignal {
    IndicatorSignal::new(id, direction, strength, tf)
}

fn trend(t: Trend, fired: bool) -> Option<TrendReading> {
    Some(TrendReading {
        trend: t,
        signal_fired: fired,
        reversal: false,
    })
}

/// Every indicator present and leaning long.
pub fn bullish_readings() -> IndicatorReadings {
    IndicatorReadings {
        sbst: trend(Trend::Bullish, true),
        halftrend: trend(Trend::Bullish, false),
        psar: trend(Trend::Bullish, false),
        swift_algo: Some(SwiftAlgoReading {
            trend: Trend::Bullish,
            strong: true,
        }),
        chandelier: trend(Trend::Bullish, false),
        nrtr: trend(Trend::Bullish, false),
        smc: Some(SmcReading {
            bias: Trend::Bullish,
            setup: true,
        }),
        rsi: Some(58.0),
        macd: Some(MacdReading {
            histogram: 0.8,
            previous: 0.5,
        }),
        adx: Some(AdxReading {
            adx: 32.0,
            plus_di: 28.0,
            minus_di: 14.0,
        }),
    }
}

/// Long position with a per-unit stop distance of `per_unit_risk`.
pub fn position(symbol: &str, size: f64, per_unit_risk: f64) -> OpenPosition {
    OpenPosition::new(symbol, Direction::Long, 100.0, 100.0 - per_unit_risk, size, ts())
}

pub fn mtf_verdict(approved: bool) -> MultiTimeframeValidation {
    let aligned: BTreeSet<Timeframe> = if approved {
        [Timeframe::M15, Timeframe::H1].into_iter().collect()
    } else {
        BTreeSet::new()
    };
    MultiTimeframeValidation {
        approved,
        confirmations: aligned.len(),
        partial_confirmations: 0,
        score: aligned.len() as f64,
        required: 2,
        strength: aligned.len() as f64 / 3.0 * 100.0,
        aligned_timeframes: aligned,
        reasoning: Vec::new(),
    }
}

/// Proposal with approved higher timeframes and targets at 1.5R / 3R.
pub fn proposal(symbol: &str, direction: Direction, entry: f64, stop_loss: f64, confidence: f64) -> TradeProposal {
    let risk = (entry - stop_loss).abs();
    let sign = direction.sign();
    TradeProposal {
        symbol: symbol.to_string(),
        direction,
        timeframe: Timeframe::M5,
        entry,
        stop_loss,
        take_profit_1: entry + sign * risk * 1.5,
        take_profit_2: entry + sign * risk * 3.0,
        risk_reward: 1.5,
        raw_confidence: confidence,
        weighted_confidence: confidence,
        divergences: Vec::new(),
        multi_tf_validation: mtf_verdict(true),
        regime: MarketRegime::default(),
    }
}
