mod common;

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use confluence_risk::config::{Config, RiskProfile, SizingConfig, ThrottleConfig};
use confluence_risk::core::heat::{drawdown, heat, DrawdownBand, PortfolioStatus, Throttle};
use confluence_risk::core::kelly::{raw_kelly, usable_kelly};
use confluence_risk::core::mtf::{MultiTimeframeValidator, TimeframeSnapshot};
use confluence_risk::core::sizing::PositionSizer;
use confluence_risk::core::validator::RejectKind;
use confluence_risk::error::CoreError;
use confluence_risk::feed::replay::ReplayFrame;
use confluence_risk::feed::{ReplaySource, SignalSource};
use confluence_risk::models::{Direction, IndicatorReadings, MarketSnapshot, Timeframe, Trend};
use confluence_risk::scheduler::{Scheduler, SymbolOutcome};
use confluence_risk::strategies::{Evaluation, SignalEvaluator};
use confluence_risk::trading::{ExitReason, OpenPosition, PortfolioState, RiskDesk};

use common::{aligned_markets, market, proposal, readings};

/// Serves the same snapshots every cycle and never runs dry.
struct MockSource {
    data: HashMap<(String, Timeframe), MarketSnapshot>,
}

impl MockSource {
    fn new(markets: Vec<MarketSnapshot>) -> Self {
        let data = markets
            .into_iter()
            .map(|m| ((m.symbol.clone(), m.timeframe), m))
            .collect();
        Self { data }
    }
}

#[async_trait]
impl SignalSource for MockSource {
    async fn fetch_market(&self, symbol: &str, timeframe: Timeframe) -> Result<MarketSnapshot> {
        self.data
            .get(&(symbol.to_string(), timeframe))
            .cloned()
            .with_context(|| format!("no {} {}", symbol, timeframe))
    }
}

fn test_config(symbols: &[&str]) -> Config {
    let mut cfg = Config::default();
    cfg.scheduler.symbols = symbols.iter().map(|s| s.to_string()).collect();
    cfg
}

#[tokio::test]
async fn full_pipeline_from_readings_to_booked_position() {
    let cfg = test_config(&["BTC/USDT"]);
    let markets = aligned_markets("BTC/USDT", Trend::Bearish);

    let evaluation = SignalEvaluator::new(&cfg)
        .evaluate(&markets[0], &markets[1..])
        .unwrap();
    let p = match evaluation {
        Evaluation::Proposal(p) => p,
        other => panic!("expected a proposal, got {:?}", other),
    };
    assert_eq!(p.direction, Direction::Short);
    assert_eq!(p.stop_loss, 101.0);
    assert!(p.take_profit_1 < p.entry && p.take_profit_2 < p.take_profit_1);
    assert!(p.multi_tf_validation.approved);

    let desk = RiskDesk::new(&cfg);
    let sub = desk.submit(&p).await;
    assert!(sub.result.approved, "{:?}", sub.result.reasons);
    let sizing = sub.result.sizing.as_ref().unwrap();
    assert!(sizing.recommended_size > 0.0);
    assert!((sizing.risk_dollars - sizing.recommended_size * 1.0).abs() < 1e-9);

    let report = desk.risk_report().await;
    assert_eq!(report.open_positions, 1);
    assert!(report.heat > 0.0 && report.heat < cfg.risk.max_portfolio_heat);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_submissions_never_breach_heat_ceiling() {
    let cfg = Config::default();
    let desk = RiskDesk::new(&cfg);

    let mut handles = Vec::new();
    for i in 0..40 {
        let desk = desk.clone();
        handles.push(tokio::spawn(async move {
            let p = proposal(&format!("SYM{}/USDT", i), Direction::Long, 100.0, 99.0, 95.0);
            desk.submit(&p).await
        }));
    }

    let mut approved = 0;
    let mut rejected = 0;
    for h in handles {
        let sub = h.await.unwrap();
        if sub.result.approved {
            approved += 1;
        } else {
            assert!(!sub.result.reasons.is_empty());
            rejected += 1;
        }
    }

    let state = desk.snapshot().await;
    assert!(approved >= 1);
    assert!(rejected >= 1);
    assert_eq!(state.open_positions().len(), approved);
    assert!(
        heat(&state) <= cfg.risk.max_portfolio_heat + 1e-9,
        "heat {} breached ceiling",
        heat(&state)
    );
}

#[test]
fn kelly_reference_profile() {
    let raw = raw_kelly(0.55, 1.5);
    assert!((raw - 0.183_333).abs() < 1e-5);
    let usable = usable_kelly(&RiskProfile::default(), &SizingConfig::default());
    assert!((usable - 0.0458).abs() < 1e-4);
}

#[test]
fn fifteen_percent_drawdown_is_thirty_percent_size() {
    let state = PortfolioState::with_peak(8_500.0, 10_000.0);
    assert_eq!(drawdown(&state), 0.15);
    let t = Throttle::evaluate(&state, &RiskProfile::default(), &ThrottleConfig::default());
    assert_eq!(t.drawdown_band, DrawdownBand::Heavy);
    assert!((t.size_multiplier - 0.3).abs() < 1e-12);
}

#[test]
fn small_book_heat_is_healthy() {
    let mut state = PortfolioState::new(10_000.0);
    let now = chrono::Utc::now();
    for (i, (size, per_unit)) in [(500.0, 0.003), (300.0, 0.002), (200.0, 0.004)].iter().enumerate() {
        state.open(OpenPosition::new(
            &format!("P{}", i),
            Direction::Long,
            1.0,
            1.0 - per_unit,
            *size,
            now,
        ));
    }
    assert!((heat(&state) - 0.00029).abs() < 1e-9);
    let t = Throttle::evaluate(&state, &RiskProfile::default(), &ThrottleConfig::default());
    assert_eq!(t.status(), PortfolioStatus::Healthy);
}

#[test]
fn two_of_three_higher_timeframes_approve() {
    let snaps = vec![
        TimeframeSnapshot::new(Timeframe::M15, Trend::Bullish),
        TimeframeSnapshot::new(Timeframe::H1, Trend::Bullish),
        TimeframeSnapshot::new(Timeframe::H4, Trend::Bearish),
    ];
    let v = MultiTimeframeValidator::new(0.5)
        .validate(Direction::Long, &snaps, 2)
        .unwrap();
    assert!(v.approved);
    assert_eq!(v.confirmations, 2);
    assert!((v.strength - 66.666_666).abs() < 1e-3);
}

#[test]
fn every_inverted_stop_is_rejected() {
    let cfg = Config::default();
    let sizer = PositionSizer::new(&cfg.sizing, &cfg.throttle);
    let state = PortfolioState::new(10_000.0);
    for entry in [0.5, 100.0, 42_000.0] {
        for offset in [0.0, 0.01, 5.0] {
            let long = sizer.size(Direction::Long, entry, entry + offset, 90.0, &cfg.risk, &state);
            assert!(matches!(long, Err(CoreError::InvalidStopLoss { .. })));
            let short = sizer.size(Direction::Short, entry, entry - offset, 90.0, &cfg.risk, &state);
            assert!(matches!(short, Err(CoreError::InvalidStopLoss { .. })));
        }
    }
}

#[tokio::test]
async fn confidence_gate_is_non_negotiable() {
    let desk = RiskDesk::new(&Config::default());
    // tight stop and an empty book would score well on everything else
    let sub = desk
        .submit(&proposal("BTC/USDT", Direction::Long, 100.0, 99.95, 74.0))
        .await;
    assert!(!sub.result.approved);
    assert!(sub.result.rejected_for(RejectKind::LowConfidence));
    assert!(sub.result.risk_score >= 80);
}

#[tokio::test]
async fn closed_history_feeds_kelly_estimate() {
    let desk = RiskDesk::new(&Config::default());
    for i in 0..24 {
        let sub = desk
            .submit(&proposal("BTC/USDT", Direction::Long, 100.0, 99.0, 90.0))
            .await;
        assert!(sub.result.approved, "trade {}: {:?}", i, sub.result.reasons);
        let exit = if i % 3 == 2 { 99.0 } else { 102.0 };
        desk.close_position("BTC/USDT", exit).await.unwrap();
    }

    let est = desk.kelly_estimate().await;
    assert!(!est.using_default);
    assert_eq!(est.sample_size, 24);
    assert!((est.win_rate - 0.6667).abs() < 1e-3);
    assert!(est.payoff_ratio > 1.5);

    let updated = est.apply_to(&desk.profile().await);
    desk.update_profile(updated).await;
    assert!((desk.profile().await.win_rate - 0.6667).abs() < 1e-3);
}

/// Bullish except for the two heaviest trend followers, which is not enough
/// for either side.
fn split_readings() -> IndicatorReadings {
    let mut split = readings(Trend::Bullish);
    let bearish = readings(Trend::Bearish);
    split.sbst = bearish.sbst;
    split.halftrend = bearish.halftrend;
    split
}

fn replay_frames() -> Vec<ReplayFrame> {
    let mut snapshots = aligned_markets("BTC/USDT", Trend::Bullish);
    snapshots.push(market("ETH/USDT", Timeframe::M5, split_readings()));
    vec![
        ReplayFrame {
            snapshots: snapshots.clone(),
        },
        ReplayFrame { snapshots },
    ]
}

#[tokio::test]
async fn scheduler_plays_replay_to_the_end() {
    let cfg = test_config(&["BTC/USDT", "ETH/USDT", "SOL/USDT"]);
    let source = Arc::new(ReplaySource::new(replay_frames()));
    let (tx, mut rx) = mpsc::channel(8);
    let scheduler = Scheduler::new(&cfg, source, RiskDesk::new(&cfg))
        .with_interval(Duration::from_millis(1))
        .with_outcomes(tx);

    let cycles = scheduler.run(CancellationToken::new()).await.unwrap();
    assert_eq!(cycles, 2);

    let first = rx.recv().await.unwrap();
    let symbols: Vec<&str> = first.outcomes.iter().map(|o| o.symbol()).collect();
    assert_eq!(symbols, vec!["BTC/USDT", "ETH/USDT", "SOL/USDT"]);
    assert_eq!(first.approved().count(), 1);
    assert!(matches!(first.outcomes[1], SymbolOutcome::Wait { .. }));
    assert!(matches!(first.outcomes[2], SymbolOutcome::Failed { .. }));

    let second = rx.recv().await.unwrap();
    match &second.outcomes[0] {
        SymbolOutcome::Submitted(s) => {
            assert!(s.result.rejected_for(RejectKind::DuplicatePosition));
        }
        other => panic!("expected a submission, got {:?}", other),
    }
    assert_eq!(second.risk.open_positions, 1);
}

#[tokio::test]
async fn scheduler_stops_at_cycle_boundary_when_cancelled() {
    let cfg = test_config(&["BTC/USDT"]);
    let source = Arc::new(MockSource::new(aligned_markets("BTC/USDT", Trend::Bullish)));
    let (tx, mut rx) = mpsc::channel(64);
    let scheduler = Scheduler::new(&cfg, source, RiskDesk::new(&cfg))
        .with_interval(Duration::from_millis(5))
        .with_outcomes(tx);

    let cancel = CancellationToken::new();
    let token = cancel.clone();
    let handle = tokio::spawn(async move { scheduler.run(token).await });

    let first = rx.recv().await.unwrap();
    assert_eq!(first.cycle, 1);
    cancel.cancel();

    let cycles = handle.await.unwrap().unwrap();
    assert!(cycles >= 1);
}

#[tokio::test]
async fn replayed_stop_out_releases_heat() {
    let cfg = test_config(&["BTC/USDT"]);
    let mut through_stop = market("BTC/USDT", Timeframe::M5, split_readings());
    through_stop.price = 98.5;
    let frames = vec![
        ReplayFrame {
            snapshots: aligned_markets("BTC/USDT", Trend::Bullish),
        },
        ReplayFrame {
            snapshots: vec![through_stop],
        },
    ];
    let desk = RiskDesk::new(&cfg);
    let (tx, mut rx) = mpsc::channel(8);
    let scheduler = Scheduler::new(&cfg, Arc::new(ReplaySource::new(frames)), desk.clone())
        .with_interval(Duration::from_millis(1))
        .with_outcomes(tx);

    assert_eq!(scheduler.run(CancellationToken::new()).await.unwrap(), 2);

    let first = rx.recv().await.unwrap();
    assert_eq!(first.approved().count(), 1);
    assert!(first.exits.is_empty());
    assert!(first.risk.heat > 0.0);

    let second = rx.recv().await.unwrap();
    assert!(matches!(second.outcomes[0], SymbolOutcome::Wait { .. }));
    assert_eq!(second.exits.len(), 1);
    assert_eq!(second.exits[0].reason, ExitReason::StopLoss);
    assert!(second.exits[0].pnl < 0.0);
    assert_eq!(second.risk.open_positions, 0);
    assert_eq!(second.risk.heat, 0.0);
    assert_eq!(second.risk.trades_closed, 1);
    assert!(second.risk.daily_pnl < 0.0);

    let state = desk.snapshot().await;
    assert!(state.balance() < cfg.risk.account_balance);
}

#[tokio::test]
async fn open_position_cap_holds_across_symbols() {
    let desk = RiskDesk::new(&Config::default());
    for (i, symbol) in ["A/USDT", "B/USDT", "C/USDT", "D/USDT"].iter().enumerate() {
        let sub = desk
            .submit(&proposal(symbol, Direction::Long, 100.0, 99.9, 95.0))
            .await;
        if i < 3 {
            assert!(sub.result.approved, "{}: {:?}", symbol, sub.result.reasons);
        } else {
            assert!(sub.result.rejected_for(RejectKind::MaxOpenPositions));
        }
    }
    assert_eq!(desk.snapshot().await.open_positions().len(), 3);
}
