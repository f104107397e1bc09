//! smsguard
//!
//! Scores batches of SMS messages for fraud and spam risk by running
//! external scoring engines as subprocesses and combining their scores.

use anyhow::{bail, Result};
use clap::Parser;
use smsguard_engine::Orchestrator;
use smsguard_providers::ScoringConfig;
use smsguard_telemetry::{describe_metrics, MetricsCollector};
use std::path::Path;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

mod batch;
mod cli;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Score {
            config,
            input,
            output,
            max_processes,
            max_messages,
            breakdown,
            verbose,
        } => {
            init_tracing(verbose);

            let mut scoring = ScoringConfig::from_file(&config)?;
            batch::apply_overrides(&mut scoring, max_processes, max_messages, breakdown)?;
            info!("Configuration loaded from {}", config.display());

            score(&scoring, &input, output.as_deref()).await?;
        }

        Commands::CheckConfig { config } => {
            init_tracing(false);

            let scoring = ScoringConfig::from_file(&config)?;
            println!("Configuration {} is valid", config.display());
            println!(
                "  Limits: {} processes, {} messages",
                scoring.max_concurrent_processes, scoring.max_concurrent_messages
            );
            for spec in &scoring.providers {
                println!(
                    "  {:<16} {:<16} {}",
                    spec.id,
                    spec.role.as_str(),
                    spec.program.display()
                );
            }
        }
    }

    Ok(())
}

async fn score(config: &ScoringConfig, input: &Path, output: Option<&Path>) -> Result<()> {
    describe_metrics();
    let metrics = MetricsCollector::new();
    let orchestrator = Orchestrator::from_config(config, Some(metrics.clone()))?;
    info!("Providers: {}", orchestrator.providers().len());

    let records = batch::read_inputs(input)?;

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        warn!("Shutdown signal received, cancelling batch...");
        trigger.cancel();
    });

    let report = match orchestrator.score_batch(&records, &cancel).await {
        Ok(report) => report,
        Err(e) if e.is_cancelled() => {
            let snapshot = metrics.snapshot();
            bail!(
                "Batch cancelled; {} provider processes terminated",
                snapshot.processes_killed
            );
        }
        Err(e) => return Err(e.into()),
    };

    batch::write_report(&report, output)?;

    let snapshot = metrics.snapshot();
    info!(
        "Scored {} messages, {} failed; {} provider calls averaging {:.1} ms",
        snapshot.messages_scored,
        snapshot.messages_failed,
        snapshot.provider_calls,
        snapshot.avg_provider_latency_us() as f64 / 1000.0
    );
    if !report.is_complete() {
        warn!("{} messages could not be scored", report.failures.len());
    }

    Ok(())
}

/// Listen for shutdown signals (SIGTERM, SIGINT)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Initialize tracing/logging on stderr so reports on stdout stay clean
fn init_tracing(verbose: bool) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = if verbose {
        EnvFilter::new("smsguard=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("smsguard=info"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
