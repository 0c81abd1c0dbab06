use crate::models::{IndicatorId, Timeframe};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Account-level risk settings. Replaced only by an explicit call between
/// cycles, never mutated implicitly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskProfile {
    pub account_balance: f64,
    pub max_risk_per_trade: f64,
    pub max_portfolio_heat: f64,
    pub max_drawdown: f64,
    /// Realised loss for the current UTC day, as a fraction of the balance
    /// the day opened with, that stops new entries until the next day.
    pub max_daily_loss: f64,
    pub max_open_positions: usize,
    pub confidence_threshold: f64,
    pub win_rate: f64,
    pub avg_win_loss_ratio: f64,
}

impl Default for RiskProfile {
    fn default() -> Self {
        Self {
            account_balance: 10_000.0,
            max_risk_per_trade: 0.02,
            max_portfolio_heat: 0.06,
            max_drawdown: 0.20,
            max_daily_loss: 0.05,
            max_open_positions: 3,
            confidence_threshold: 75.0,
            win_rate: 0.55,
            avg_win_loss_ratio: 1.5,
        }
    }
}

/// Indicator weights. Loaded once at startup and read-only afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightTable {
    weights: BTreeMap<IndicatorId, f64>,
}

impl Default for WeightTable {
    fn default() -> Self {
        let weights = [
            (IndicatorId::Sbst, 0.20),
            (IndicatorId::HalfTrend, 0.12),
            (IndicatorId::Psar, 0.10),
            (IndicatorId::SwiftAlgo, 0.15),
            (IndicatorId::Chandelier, 0.08),
            (IndicatorId::Nrtr, 0.10),
            (IndicatorId::Smc, 0.12),
            (IndicatorId::Rsi, 0.05),
            (IndicatorId::Macd, 0.05),
            (IndicatorId::Adx, 0.03),
        ]
        .into_iter()
        .collect();
        Self { weights }
    }
}

impl WeightTable {
    pub fn from_weights(weights: impl IntoIterator<Item = (IndicatorId, f64)>) -> Self {
        let weights = weights
            .into_iter()
            .map(|(id, w)| (id, sanitize_weight(w)))
            .collect();
        Self { weights }
    }

    pub fn with_weight(mut self, id: IndicatorId, weight: f64) -> Self {
        self.weights.insert(id, sanitize_weight(weight));
        self
    }

    pub fn weight(&self, id: IndicatorId) -> f64 {
        self.weights.get(&id).copied().unwrap_or(0.0)
    }

    /// Weights restricted to `present` and rescaled to sum to 1.0. When every
    /// present indicator carries zero weight they share the budget equally.
    pub fn renormalized(&self, present: &[IndicatorId]) -> BTreeMap<IndicatorId, f64> {
        let mut out: BTreeMap<IndicatorId, f64> =
            present.iter().map(|&id| (id, self.weight(id))).collect();
        if out.is_empty() {
            return out;
        }

        let total: f64 = out.values().sum();
        if total > 0.0 {
            for w in out.values_mut() {
                *w /= total;
            }
        } else {
            let equal = 1.0 / out.len() as f64;
            for w in out.values_mut() {
                *w = equal;
            }
        }
        out
    }
}

fn sanitize_weight(w: f64) -> f64 {
    if w.is_finite() {
        w.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// Fewer present indicators than this aborts the cycle for the symbol.
    pub min_indicators: usize,
    /// Share of the blended score taken from the baseline point count; the
    /// remainder comes from the weighted score.
    pub blend_baseline_ratio: f64,
    /// Cumulative divergence penalty never scales a score below this factor.
    pub divergence_floor: f64,
    pub price_momentum_penalty: f64,
    pub structure_penalty: f64,
    pub multi_reversal_penalty: f64,
    pub min_side_points: u32,
    pub max_opposing_points: u32,
    pub baseline_cap: f64,
    pub tp1_atr_multiple: f64,
    pub tp2_atr_multiple: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            min_indicators: 3,
            blend_baseline_ratio: 0.6,
            divergence_floor: 0.5,
            price_momentum_penalty: 0.85,
            structure_penalty: 0.90,
            multi_reversal_penalty: 0.80,
            min_side_points: 6,
            max_opposing_points: 3,
            baseline_cap: 95.0,
            tp1_atr_multiple: 1.5,
            tp2_atr_multiple: 3.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "mode")]
pub enum InsufficientDataPolicy {
    Reject,
    /// Judge on the snapshots that exist, all of which must confirm, and
    /// scale confidence by `penalty`.
    ReducedConfidence { penalty: f64 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MtfPolicy {
    pub required_confirmations: usize,
    /// Credit a neutral higher-timeframe reading earns toward confirmation.
    pub neutral_credit: f64,
    /// Net weighted bias inside +/- this band reads as neutral.
    pub dead_band: f64,
    pub on_insufficient: InsufficientDataPolicy,
}

impl Default for MtfPolicy {
    fn default() -> Self {
        Self {
            required_confirmations: 2,
            neutral_credit: 0.5,
            dead_band: 0.15,
            on_insufficient: InsufficientDataPolicy::ReducedConfidence { penalty: 0.8 },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SizingConfig {
    /// Fraction of the raw Kelly bet actually used.
    pub kelly_safety: f64,
    pub max_raw_kelly: f64,
    /// Confidence-scaled sizing starts at this fraction of the fixed-fraction
    /// size when confidence sits exactly at the threshold.
    pub confidence_floor: f64,
}

impl Default for SizingConfig {
    fn default() -> Self {
        Self {
            kelly_safety: 0.25,
            max_raw_kelly: 0.25,
            confidence_floor: 0.5,
        }
    }
}

/// Heat and drawdown throttling bands, as fractions of balance. The blocking
/// ceilings come from `RiskProfile::max_portfolio_heat` and
/// `RiskProfile::max_drawdown`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThrottleConfig {
    pub heat_elevated: f64,
    pub heat_reduce: f64,
    pub heat_reduce_factor: f64,
    pub drawdown_light: f64,
    pub drawdown_light_factor: f64,
    pub drawdown_heavy: f64,
    pub drawdown_heavy_factor: f64,
    /// Drawdown above this (up to the hard ceiling) stops trading until a
    /// manual review.
    pub drawdown_review: f64,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            heat_elevated: 0.03,
            heat_reduce: 0.05,
            heat_reduce_factor: 0.5,
            drawdown_light: 0.05,
            drawdown_light_factor: 0.7,
            drawdown_heavy: 0.10,
            drawdown_heavy_factor: 0.3,
            drawdown_review: 0.15,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdConfig {
    pub low_trend_adx: f64,
    pub low_trend_bump: f64,
    pub rsi_overbought: f64,
    pub rsi_oversold: f64,
    pub extreme_oscillator_bump: f64,
    /// Portfolio heat at or above this raises the bar.
    pub elevated_heat: f64,
    pub elevated_heat_bump: f64,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            low_trend_adx: 20.0,
            low_trend_bump: 5.0,
            rsi_overbought: 75.0,
            rsi_oversold: 25.0,
            extreme_oscillator_bump: 5.0,
            elevated_heat: 0.03,
            elevated_heat_bump: 5.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskScoreConfig {
    pub full_tier: u32,
    pub normal_tier: u32,
    pub reduced_tier: u32,
    pub full_multiplier: f64,
    pub normal_multiplier: f64,
    pub reduced_multiplier: f64,
    /// Risk points lost per percent of stop distance.
    pub points_per_stop_pct: f64,
}

impl Default for RiskScoreConfig {
    fn default() -> Self {
        Self {
            full_tier: 80,
            normal_tier: 70,
            reduced_tier: 60,
            full_multiplier: 1.0,
            normal_multiplier: 0.75,
            reduced_multiplier: 0.5,
            points_per_stop_pct: 10.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    pub symbols: Vec<String>,
    pub base_timeframe: Timeframe,
    pub scan_interval: u64,
    pub replay_file: Option<String>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            symbols: vec!["BTC/USDT".to_string(), "ETH/USDT".to_string()],
            base_timeframe: Timeframe::M5,
            scan_interval: 60,
            replay_file: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub risk: RiskProfile,
    pub weights: WeightTable,
    pub scoring: ScoringConfig,
    pub mtf: MtfPolicy,
    pub sizing: SizingConfig,
    pub throttle: ThrottleConfig,
    pub threshold: ThresholdConfig,
    pub risk_score: RiskScoreConfig,
    pub scheduler: SchedulerConfig,
    pub log_level: String,
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let env = |key: &str| std::env::var(key).ok();
        let num = |key: &str, default: f64| -> f64 {
            env(key).and_then(|s| s.parse().ok()).unwrap_or(default)
        };

        let d = RiskProfile::default();
        let risk = RiskProfile {
            account_balance: num("ACCOUNT_BALANCE", d.account_balance),
            max_risk_per_trade: num("MAX_RISK_PER_TRADE", d.max_risk_per_trade),
            max_portfolio_heat: num("MAX_PORTFOLIO_HEAT", d.max_portfolio_heat),
            max_drawdown: num("MAX_DRAWDOWN", d.max_drawdown),
            max_daily_loss: num("MAX_DAILY_LOSS", d.max_daily_loss),
            max_open_positions: env("MAX_OPEN_POSITIONS")
                .and_then(|s| s.parse().ok())
                .unwrap_or(d.max_open_positions),
            confidence_threshold: num("CONFIDENCE_THRESHOLD", d.confidence_threshold),
            win_rate: num("WIN_RATE", d.win_rate),
            avg_win_loss_ratio: num("AVG_WIN_LOSS_RATIO", d.avg_win_loss_ratio),
        };

        let mut scoring = ScoringConfig::default();
        scoring.blend_baseline_ratio =
            num("BLEND_BASELINE_RATIO", scoring.blend_baseline_ratio).clamp(0.0, 1.0);
        scoring.divergence_floor = num("DIVERGENCE_FLOOR", scoring.divergence_floor).clamp(0.0, 1.0);

        let mut mtf = MtfPolicy::default();
        mtf.required_confirmations = env("REQUIRED_CONFIRMATIONS")
            .and_then(|s| s.parse().ok())
            .unwrap_or(mtf.required_confirmations);
        mtf.neutral_credit = num("NEUTRAL_CREDIT", mtf.neutral_credit).clamp(0.0, 1.0);

        let mut sizing = SizingConfig::default();
        sizing.kelly_safety = num("KELLY_SAFETY", sizing.kelly_safety).clamp(0.0, 1.0);

        let mut scheduler = SchedulerConfig::default();
        if let Some(symbols) = env("SYMBOLS") {
            let parsed: Vec<String> = symbols
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
            if !parsed.is_empty() {
                scheduler.symbols = parsed;
            }
        }
        if let Some(tf) = env("BASE_TIMEFRAME").and_then(|s| s.parse::<Timeframe>().ok()) {
            scheduler.base_timeframe = tf;
        }
        scheduler.scan_interval = env("SCAN_INTERVAL")
            .and_then(|s| s.parse().ok())
            .unwrap_or(scheduler.scan_interval);
        scheduler.replay_file = env("REPLAY_FILE");

        Config {
            risk,
            weights: WeightTable::default(),
            scoring,
            mtf,
            sizing,
            throttle: ThrottleConfig::default(),
            threshold: ThresholdConfig::default(),
            risk_score: RiskScoreConfig::default(),
            scheduler,
            log_level: env("LOG_LEVEL").unwrap_or_else(|| "INFO".to_string()),
        }
    }
}
