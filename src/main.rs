use anyhow::{bail, Result};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use confluence_risk::config::Config;
use confluence_risk::feed::ReplaySource;
use confluence_risk::scheduler::{CycleReport, Scheduler};
use confluence_risk::trading::RiskDesk;

#[tokio::main]
async fn main() -> Result<()> {
    let cfg = Config::from_env();

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&cfg.log_level));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_timer(fmt::time::UtcTime::rfc_3339())
        .init();

    let Some(path) = cfg.scheduler.replay_file.clone() else {
        bail!("REPLAY_FILE is not set; nothing to evaluate");
    };
    let source = ReplaySource::from_file(&path)?;
    info!("Loaded {} replay frame(s) from {}", source.frame_count(), path);

    let desk = RiskDesk::new(&cfg);
    desk.risk_report().await.log_summary();

    let (tx, rx) = mpsc::channel(32);
    let notifier = tokio::spawn(log_cycles(rx));

    let cancel = CancellationToken::new();
    let on_ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Ctrl+C received, finishing current cycle");
            on_ctrl_c.cancel();
        }
    });

    let scheduler = Scheduler::new(&cfg, Arc::new(source), desk.clone()).with_outcomes(tx);
    let cycles = scheduler.run(cancel).await?;
    drop(scheduler);
    notifier.await?;

    info!("Shutting down after {} cycle(s)", cycles);
    desk.risk_report().await.log_summary();
    Ok(())
}

async fn log_cycles(mut rx: mpsc::Receiver<CycleReport>) {
    while let Some(report) = rx.recv().await {
        for sub in report.approved() {
            if let Some(sizing) = &sub.result.sizing {
                info!(
                    "  cycle {} {}: {} units via {} (kelly {:.2}%)",
                    report.cycle,
                    sub.symbol,
                    sizing.recommended_size,
                    sizing.method_used,
                    sizing.kelly_fraction * 100.0
                );
            }
        }
        if report.risk.size_multiplier < 1.0 {
            warn!(
                "Portfolio {}: new size scaled to {:.0}%",
                report.risk.status,
                report.risk.size_multiplier * 100.0
            );
        }
    }
}
