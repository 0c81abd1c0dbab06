use crate::error::{CoreError, CoreResult};
use crate::models::{
    AdxReading, IndicatorId, IndicatorReadings, IndicatorSignal, MacdReading, SmcReading,
    SwiftAlgoReading, Timeframe, TrendReading, Trend,
};

const FRESH_SIGNAL_STRENGTH: f64 = 1.0;
const STANDING_TREND_STRENGTH: f64 = 0.6;
const RSI_OVERBOUGHT: f64 = 70.0;
const RSI_OVERSOLD: f64 = 30.0;
const ADX_TREND_FLOOR: f64 = 20.0;
const ADX_TREND_SPAN: f64 = 30.0;

/// Turns raw indicator outputs into uniform directional signals.
pub struct SignalAdapter {
    pub min_indicators: usize,
}

impl SignalAdapter {
    pub fn new(min_indicators: usize) -> Self {
        Self { min_indicators }
    }

    /// One signal per indicator that has a value on the current candle.
    /// Missing indicators are left out rather than read as neutral.
    pub fn adapt(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        readings: &IndicatorReadings,
    ) -> CoreResult<Vec<IndicatorSignal>> {
        let signals = normalize(readings, timeframe);
        if signals.len() < self.min_indicators {
            return Err(CoreError::MissingData {
                symbol: symbol.to_string(),
                timeframe,
                present: signals.len(),
                required: self.min_indicators,
            });
        }
        Ok(signals)
    }
}

/// Normalizes whatever is present, with no minimum. Used for higher-timeframe
/// snapshots where a sparse reading is still worth a direction.
pub fn normalize(readings: &IndicatorReadings, timeframe: Timeframe) -> Vec<IndicatorSignal> {
    let trend_followers = [
        (IndicatorId::Sbst, readings.sbst),
        (IndicatorId::HalfTrend, readings.halftrend),
        (IndicatorId::Psar, readings.psar),
        (IndicatorId::Chandelier, readings.chandelier),
        (IndicatorId::Nrtr, readings.nrtr),
    ];

    let mut signals: Vec<IndicatorSignal> = trend_followers
        .into_iter()
        .filter_map(|(id, r)| r.map(|r| from_trend(id, r, timeframe)))
        .collect();

    signals.extend(readings.swift_algo.map(|r| from_swift(r, timeframe)));
    signals.extend(readings.smc.map(|r| from_smc(r, timeframe)));
    signals.extend(readings.rsi.and_then(|v| from_rsi(v, timeframe)));
    signals.extend(readings.macd.and_then(|r| from_macd(r, timeframe)));
    signals.extend(readings.adx.and_then(|r| from_adx(r, timeframe)));

    signals.sort_by_key(|s| s.indicator_id);
    signals
}

fn from_trend(id: IndicatorId, r: TrendReading, tf: Timeframe) -> IndicatorSignal {
    let strength = if r.signal_fired {
        FRESH_SIGNAL_STRENGTH
    } else {
        STANDING_TREND_STRENGTH
    };
    IndicatorSignal::new(id, r.trend, strength, tf).with_reversal(r.reversal)
}

fn from_swift(r: SwiftAlgoReading, tf: Timeframe) -> IndicatorSignal {
    let strength = if r.strong { 1.0 } else { 0.5 };
    IndicatorSignal::new(IndicatorId::SwiftAlgo, r.trend, strength, tf)
}

fn from_smc(r: SmcReading, tf: Timeframe) -> IndicatorSignal {
    let strength = if r.setup { 1.0 } else { 0.5 };
    IndicatorSignal::new(IndicatorId::Smc, r.bias, strength, tf)
}

// Overbought reads bearish, oversold bullish. The band between is neutral.
fn from_rsi(value: f64, tf: Timeframe) -> Option<IndicatorSignal> {
    if !value.is_finite() {
        return None;
    }
    let direction = if value >= RSI_OVERBOUGHT {
        Trend::Bearish
    } else if value <= RSI_OVERSOLD {
        Trend::Bullish
    } else {
        Trend::Neutral
    };
    let strength = (value - 50.0).abs() / 50.0;
    Some(IndicatorSignal::new(IndicatorId::Rsi, direction, strength, tf))
}

fn from_macd(r: MacdReading, tf: Timeframe) -> Option<IndicatorSignal> {
    if !r.histogram.is_finite() || !r.previous.is_finite() {
        return None;
    }
    let direction = if r.histogram > 0.0 {
        Trend::Bullish
    } else if r.histogram < 0.0 {
        Trend::Bearish
    } else {
        Trend::Neutral
    };
    let expanding = r.histogram.abs() > r.previous.abs();
    let strength = if expanding { 1.0 } else { 0.5 };
    Some(IndicatorSignal::new(IndicatorId::Macd, direction, strength, tf))
}

fn from_adx(r: AdxReading, tf: Timeframe) -> Option<IndicatorSignal> {
    if !r.adx.is_finite() {
        return None;
    }
    let direction = if r.adx < ADX_TREND_FLOOR {
        Trend::Neutral
    } else if r.plus_di > r.minus_di {
        Trend::Bullish
    } else if r.minus_di > r.plus_di {
        Trend::Bearish
    } else {
        Trend::Neutral
    };
    let strength = ((r.adx - ADX_TREND_FLOOR) / ADX_TREND_SPAN).clamp(0.0, 1.0);
    Some(IndicatorSignal::new(IndicatorId::Adx, direction, strength, tf))
}
