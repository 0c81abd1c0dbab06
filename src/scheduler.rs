use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::feed::SignalSource;
use crate::models::{MarketSnapshot, Timeframe};
use crate::strategies::evaluator::{Evaluation, SignalEvaluator};
use crate::trading::desk::{RiskDesk, Submission};
use crate::trading::portfolio::ClosedTrade;
use crate::trading::report::RiskReport;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SymbolOutcome {
    Submitted(Submission),
    Wait { symbol: String },
    Failed { symbol: String, error: String },
}

impl SymbolOutcome {
    pub fn symbol(&self) -> &str {
        match self {
            SymbolOutcome::Submitted(s) => &s.symbol,
            SymbolOutcome::Wait { symbol } | SymbolOutcome::Failed { symbol, .. } => symbol,
        }
    }
}

/// Everything one cycle produced, for notification and persistence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleReport {
    pub cycle: u64,
    /// Sorted by symbol.
    pub outcomes: Vec<SymbolOutcome>,
    /// Positions closed on stop or target this cycle, sorted by symbol.
    pub exits: Vec<ClosedTrade>,
    pub risk: RiskReport,
}

impl CycleReport {
    pub fn approved(&self) -> impl Iterator<Item = &Submission> {
        self.outcomes.iter().filter_map(|o| match o {
            SymbolOutcome::Submitted(s) if s.result.approved => Some(s),
            _ => None,
        })
    }
}

/// Runs evaluation cycles on a timer until cancelled or the feed runs dry.
/// Cancellation is only observed between cycles.
pub struct Scheduler {
    source: Arc<dyn SignalSource>,
    desk: RiskDesk,
    evaluator: SignalEvaluator,
    symbols: Vec<String>,
    base_timeframe: Timeframe,
    interval: Duration,
    outcomes: Option<mpsc::Sender<CycleReport>>,
}

impl Scheduler {
    pub fn new(cfg: &Config, source: Arc<dyn SignalSource>, desk: RiskDesk) -> Self {
        Self {
            source,
            desk,
            evaluator: SignalEvaluator::new(cfg),
            symbols: cfg.scheduler.symbols.clone(),
            base_timeframe: cfg.scheduler.base_timeframe,
            interval: Duration::from_secs(cfg.scheduler.scan_interval.max(1)),
            outcomes: None,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Publishes every finished cycle on `tx`.
    pub fn with_outcomes(mut self, tx: mpsc::Sender<CycleReport>) -> Self {
        self.outcomes = Some(tx);
        self
    }

    pub fn desk(&self) -> &RiskDesk {
        &self.desk
    }

    /// Returns the number of cycles completed.
    pub async fn run(&self, cancel: CancellationToken) -> Result<u64> {
        info!("{}", "=".repeat(60));
        info!("Scheduler starting");
        info!("Symbols: {}", self.symbols.join(", "));
        let ladder: Vec<String> = self
            .base_timeframe
            .confirmation_ladder()
            .iter()
            .map(|tf| tf.to_string())
            .collect();
        info!(
            "Base {} confirmed on {} every {}s",
            self.base_timeframe,
            ladder.join("+"),
            self.interval.as_secs()
        );
        info!("{}", "=".repeat(60));

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        let mut cycles = 0u64;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Cancellation requested, stopping after {} cycle(s)", cycles);
                    break;
                }
                _ = ticker.tick() => {}
            }

            cycles += 1;
            let report = self.run_cycle(cycles).await;
            if let Some(tx) = &self.outcomes {
                if tx.send(report).await.is_err() {
                    debug!("Cycle report receiver dropped");
                }
            }

            if !self.source.advance().await? {
                info!("Feed exhausted after {} cycle(s)", cycles);
                break;
            }
        }

        Ok(cycles)
    }

    /// Evaluates every symbol concurrently; each submission to the desk is
    /// its own atomic transaction.
    pub async fn run_cycle(&self, cycle: u64) -> CycleReport {
        let mut tasks = JoinSet::new();
        for symbol in &self.symbols {
            let symbol = symbol.clone();
            let source = Arc::clone(&self.source);
            let desk = self.desk.clone();
            let evaluator = self.evaluator.clone();
            let base_tf = self.base_timeframe;
            tasks.spawn(async move { evaluate_symbol(symbol, source, desk, evaluator, base_tf).await });
        }

        let mut outcomes = Vec::with_capacity(self.symbols.len());
        let mut exits = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((outcome, exit)) => {
                    outcomes.push(outcome);
                    exits.extend(exit);
                }
                Err(e) => error!("Symbol task failed: {}", e),
            }
        }
        outcomes.sort_by(|a, b| a.symbol().cmp(b.symbol()));
        exits.sort_by(|a, b| a.symbol.cmp(&b.symbol));

        let report = CycleReport {
            cycle,
            outcomes,
            exits,
            risk: self.desk.risk_report().await,
        };
        info!(
            "Cycle {}: {} symbol(s), {} approved, {} exited | {} heat {:.2}% dd {:.2}%",
            cycle,
            report.outcomes.len(),
            report.approved().count(),
            report.exits.len(),
            report.risk.status,
            report.risk.heat * 100.0,
            report.risk.drawdown * 100.0
        );
        report
    }
}

async fn evaluate_symbol(
    symbol: String,
    source: Arc<dyn SignalSource>,
    desk: RiskDesk,
    evaluator: SignalEvaluator,
    base_tf: Timeframe,
) -> (SymbolOutcome, Option<ClosedTrade>) {
    let base = match source.fetch_market(&symbol, base_tf).await {
        Ok(m) => m,
        Err(e) => {
            warn!("{}: no base data: {:#}", symbol, e);
            let failed = SymbolOutcome::Failed {
                symbol,
                error: format!("{:#}", e),
            };
            return (failed, None);
        }
    };

    // Settle any open position on this price before looking for a new entry.
    let exit = desk.mark_to_market(&symbol, base.price).await;

    let mut higher: Vec<MarketSnapshot> = Vec::new();
    for tf in base_tf.confirmation_ladder() {
        match source.fetch_market(&symbol, tf).await {
            Ok(m) => higher.push(m),
            Err(e) => debug!("{} {}: {:#}", symbol, tf, e),
        }
    }

    let outcome = match evaluator.evaluate(&base, &higher) {
        Ok(Evaluation::Proposal(p)) => SymbolOutcome::Submitted(desk.submit(&p).await),
        Ok(Evaluation::Wait { .. }) => SymbolOutcome::Wait { symbol },
        Err(e) => {
            warn!("{}: {}", symbol, e);
            SymbolOutcome::Failed {
                symbol,
                error: e.to_string(),
            }
        }
    };
    (outcome, exit)
}
