use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Candle interval, ordered from shortest to longest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Timeframe {
    #[serde(rename = "1m", alias = "1M")]
    M1,
    #[serde(rename = "5m", alias = "5M")]
    M5,
    #[serde(rename = "15m", alias = "15M")]
    M15,
    #[serde(rename = "1h", alias = "1H", alias = "60m")]
    H1,
    #[serde(rename = "4h", alias = "4H", alias = "240m")]
    H4,
    #[serde(rename = "1d", alias = "1D", alias = "24h")]
    D1,
}

const LABELS: [(Timeframe, &str); 6] = [
    (Timeframe::M1, "1m"),
    (Timeframe::M5, "5m"),
    (Timeframe::M15, "15m"),
    (Timeframe::H1, "1h"),
    (Timeframe::H4, "4h"),
    (Timeframe::D1, "1d"),
];

impl Timeframe {
    pub fn as_str(&self) -> &'static str {
        LABELS
            .iter()
            .find(|(tf, _)| tf == self)
            .map(|(_, label)| *label)
            .unwrap_or("?")
    }

    /// The higher timeframes consulted to confirm a signal on `self`.
    pub fn confirmation_ladder(&self) -> Vec<Timeframe> {
        match self {
            Timeframe::M1 => vec![Timeframe::M5, Timeframe::M15, Timeframe::H1],
            Timeframe::M5 => vec![Timeframe::M15, Timeframe::H1, Timeframe::H4],
            Timeframe::M15 => vec![Timeframe::H1, Timeframe::H4, Timeframe::D1],
            Timeframe::H1 => vec![Timeframe::H4, Timeframe::D1],
            Timeframe::H4 => vec![Timeframe::D1],
            Timeframe::D1 => Vec::new(),
        }
    }
}

impl FromStr for Timeframe {
    type Err = String;

    /// Case-insensitive; accepts the canonical labels only.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        LABELS
            .iter()
            .find(|(_, label)| *label == wanted)
            .map(|(tf, _)| *tf)
            .ok_or_else(|| format!("unknown timeframe '{}'", s))
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
