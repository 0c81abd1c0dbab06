#![allow(dead_code)]

use confluence_risk::core::mtf::{MultiTimeframeValidation, MultiTimeframeValidator, TimeframeSnapshot};
use confluence_risk::models::{
    AdxReading, Direction, IndicatorReadings, MacdReading, MarketRegime, MarketSnapshot,
    SmcReading, SwiftAlgoReading, Timeframe, TradeProposal, Trend, TrendReading,
};

fn trend(t: Trend, fired: bool) -> Option<TrendReading> {
    Some(TrendReading {
        trend: t,
        signal_fired: fired,
        reversal: false,
    })
}

/// Every indicator present, all pointing `t` (RSI stays in its neutral band).
pub fn readings(t: Trend) -> IndicatorReadings {
    let di = match t {
        Trend::Bearish => (14.0, 28.0),
        _ => (28.0, 14.0),
    };
    IndicatorReadings {
        sbst: trend(t, true),
        halftrend: trend(t, false),
        psar: trend(t, false),
        swift_algo: Some(SwiftAlgoReading { trend: t, strong: true }),
        chandelier: trend(t, false),
        nrtr: trend(t, false),
        smc: Some(SmcReading { bias: t, setup: true }),
        rsi: Some(52.0),
        macd: Some(MacdReading {
            histogram: 0.8 * t.sign(),
            previous: 0.5 * t.sign(),
        }),
        adx: Some(AdxReading {
            adx: 32.0,
            plus_di: di.0,
            minus_di: di.1,
        }),
    }
}

/// Snapshot at price 100 with a 1-point ATR and stops one point away.
pub fn market(symbol: &str, tf: Timeframe, readings: IndicatorReadings) -> MarketSnapshot {
    MarketSnapshot {
        symbol: symbol.to_string(),
        timeframe: tf,
        price: 100.0,
        atr: 1.0,
        support: 99.0,
        resistance: 101.0,
        readings,
    }
}

/// Base 5m snapshot plus the full confirmation ladder, all reading `t`.
pub fn aligned_markets(symbol: &str, t: Trend) -> Vec<MarketSnapshot> {
    let mut out = vec![market(symbol, Timeframe::M5, readings(t))];
    out.extend(
        Timeframe::M5
            .confirmation_ladder()
            .into_iter()
            .map(|tf| market(symbol, tf, readings(t))),
    );
    out
}

pub fn approved_mtf(direction: Direction) -> MultiTimeframeValidation {
    let snaps: Vec<TimeframeSnapshot> = Timeframe::M5
        .confirmation_ladder()
        .into_iter()
        .map(|tf| TimeframeSnapshot::new(tf, direction.as_trend()))
        .collect();
    MultiTimeframeValidator::new(0.5)
        .validate(direction, &snaps, 2)
        .unwrap()
}

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
        multi_tf_validation: approved_mtf(direction),
        regime: MarketRegime::default(),
    }
}
