//! Drains the lead distribution backlog on a fixed interval.
//!
//! Each tick offers every queued lead to distribution once and logs the
//! remaining fallback queue. Configuration comes from the `HOMNI_*`
//! environment variables (a `.env` file is loaded when present).

use std::time::Duration;

use clap::Parser;
use lead_engine::{DistributionService, EngineConfig, LeadEngine};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "queue-worker")]
#[command(about = "Distribute queued leads to matching companies")]
struct Args {
    /// Process the queue once and exit
    #[arg(long)]
    once: bool,

    /// Seconds between queue runs
    #[arg(long, default_value_t = 300)]
    interval_secs: u64,

    /// Warn when the oldest queued lead is at least this many hours old
    #[arg(long, default_value_t = 24)]
    stale_after_hours: i64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    if args.interval_secs == 0 {
        return Err("--interval-secs must be greater than zero".into());
    }

    let config = EngineConfig::from_env()?;
    info!(database_url = %config.database_url, "Starting queue worker");

    let engine = LeadEngine::connect(config).await?;
    let distribution = engine.distribution();

    if args.once {
        run_once(&distribution, args.stale_after_hours).await;
        return Ok(());
    }

    let mut ticker = tokio::time::interval(Duration::from_secs(args.interval_secs));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => run_once(&distribution, args.stale_after_hours).await,
            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down queue worker");
                break;
            }
        }
    }

    Ok(())
}

async fn run_once(distribution: &DistributionService, stale_after_hours: i64) {
    match distribution.process_queued_leads().await {
        Ok(summary) => info!(
            processed = summary.processed,
            successful = summary.successful,
            failed = summary.failed,
            "Queue run finished"
        ),
        Err(e) => error!(error = %e, "Queue run failed"),
    }

    match distribution.fetch_fallback_queue().await {
        Ok(stats) if stats.queue_depth > 0 && stats.oldest_lead_age_hours >= stale_after_hours => {
            warn!(
                queue_depth = stats.queue_depth,
                oldest_lead_age_hours = stats.oldest_lead_age_hours,
                by_category = ?stats.by_category,
                "Leads waiting too long for a company"
            );
        }
        Ok(stats) => info!(
            queue_depth = stats.queue_depth,
            oldest_lead_age_hours = stats.oldest_lead_age_hours,
            "Fallback queue"
        ),
        Err(e) => error!(error = %e, "Could not read fallback queue"),
    }
}
