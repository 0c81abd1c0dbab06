use serde::{Deserialize, Serialize};
use std::fmt;

use crate::models::{Timeframe, Trend};

/// Every indicator the scoring pipeline knows how to weigh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndicatorId {
    Sbst,
    HalfTrend,
    Psar,
    SwiftAlgo,
    Chandelier,
    Nrtr,
    Smc,
    Rsi,
    Macd,
    Adx,
}

impl IndicatorId {
    pub const ALL: [IndicatorId; 10] = [
        IndicatorId::Sbst,
        IndicatorId::HalfTrend,
        IndicatorId::Psar,
        IndicatorId::SwiftAlgo,
        IndicatorId::Chandelier,
        IndicatorId::Nrtr,
        IndicatorId::Smc,
        IndicatorId::Rsi,
        IndicatorId::Macd,
        IndicatorId::Adx,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            IndicatorId::Sbst => "sbst",
            IndicatorId::HalfTrend => "halftrend",
            IndicatorId::Psar => "psar",
            IndicatorId::SwiftAlgo => "swift_algo",
            IndicatorId::Chandelier => "chandelier",
            IndicatorId::Nrtr => "nrtr",
            IndicatorId::Smc => "smc",
            IndicatorId::Rsi => "rsi",
            IndicatorId::Macd => "macd",
            IndicatorId::Adx => "adx",
        }
    }

    pub fn is_momentum_oscillator(&self) -> bool {
        matches!(self, IndicatorId::Rsi | IndicatorId::Macd)
    }
}

impl fmt::Display for IndicatorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One indicator's verdict for the current candle, normalized to a
/// direction and a strength in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSignal {
    pub indicator_id: IndicatorId,
    pub direction: Trend,
    pub strength: f64,
    pub timeframe: Timeframe,
    /// Set by trend followers that flipped on this candle.
    #[serde(default)]
    pub reversal: bool,
}

impl IndicatorSignal {
    pub fn new(indicator_id: IndicatorId, direction: Trend, strength: f64, timeframe: Timeframe) -> Self {
        let strength = if strength.is_finite() {
            strength.clamp(0.0, 1.0)
        } else {
            0.0
        };
        Self {
            indicator_id,
            direction,
            strength,
            timeframe,
            reversal: false,
        }
    }

    pub fn with_reversal(mut self, reversal: bool) -> Self {
        self.reversal = reversal;
        self
    }

    /// Direction-signed strength in [-1, 1].
    pub fn signed_strength(&self) -> f64 {
        self.direction.sign() * self.strength
    }
}

// --- Raw indicator outputs, as computed by the indicator collaborator ---

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrendReading {
    pub trend: Trend,
    /// A fresh buy/sell signal printed on this candle.
    #[serde(default)]
    pub signal_fired: bool,
    /// The indicator flipped trend on this candle.
    #[serde(default)]
    pub reversal: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SwiftAlgoReading {
    pub trend: Trend,
    #[serde(default)]
    pub strong: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SmcReading {
    pub bias: Trend,
    #[serde(default)]
    pub setup: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MacdReading {
    pub histogram: f64,
    pub previous: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AdxReading {
    pub adx: f64,
    pub plus_di: f64,
    pub minus_di: f64,
}

/// Raw outputs for one symbol on one timeframe. `None` means the indicator
/// has no value for the current candle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndicatorReadings {
    pub sbst: Option<TrendReading>,
    pub halftrend: Option<TrendReading>,
    pub psar: Option<TrendReading>,
    pub swift_algo: Option<SwiftAlgoReading>,
    pub chandelier: Option<TrendReading>,
    pub nrtr: Option<TrendReading>,
    pub smc: Option<SmcReading>,
    pub rsi: Option<f64>,
    pub macd: Option<MacdReading>,
    pub adx: Option<AdxReading>,
}

impl IndicatorReadings {
    pub fn present_count(&self) -> usize {
        [
            self.sbst.is_some(),
            self.halftrend.is_some(),
            self.psar.is_some(),
            self.swift_algo.is_some(),
            self.chandelier.is_some(),
            self.nrtr.is_some(),
            self.smc.is_some(),
            self.rsi.is_some(),
            self.macd.is_some(),
            self.adx.is_some(),
        ]
        .iter()
        .filter(|p| **p)
        .count()
    }
}
