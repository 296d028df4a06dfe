//! `run` command implementation.

use anyhow::{Context, Result};
use std::time::Duration;
use tracing::{info, warn};

use super::{load_config, redact_webhook};
use crate::cli::RunArgs;
use crate::error::CliError;
use crate::pipeline::{Relay, RelaySettings};
use rate_limiter::CancellationToken;

/// Execute the `run` command
pub async fn run_relay(args: &RunArgs) -> Result<()> {
    let config = load_config(&args.config)?;

    info!(
        sources = config.sources.len(),
        webhook = config.webhook.url.as_deref().map(redact_webhook).unwrap_or_default(),
        poll_interval_secs = config.ingestion.poll_interval_secs,
        ledger = %config.ledger.path.display(),
        "Configuration loaded"
    );

    if args.metrics_port != 0 {
        observability::init_metrics(args.metrics_port)?;
    }

    if args.dry_run {
        info!("Dry run mode - units are logged, nothing is posted");
    }

    let relay = Relay::new(RelaySettings {
        config,
        dry_run: args.dry_run,
        once: args.once,
    });

    let shutdown = CancellationToken::new();
    let abort = CancellationToken::new();
    let signals = tokio::spawn(watch_signals(
        shutdown.clone(),
        abort.clone(),
        Duration::from_secs(args.grace_secs),
    ));

    let result = relay.run(shutdown.clone(), abort.clone()).await;
    signals.abort();

    let stats = result.context("Relay failed")?;
    stats.print_summary();

    info!("Relay finished");
    Ok(())
}

/// First signal: stop fetching and starting records. Grace period elapsed
/// or second signal: cancel limiter and backoff waits too.
async fn watch_signals(shutdown: CancellationToken, abort: CancellationToken, grace: Duration) {
    if let Err(e) = shutdown_signal().await {
        warn!(error = %e, "Signal handling unavailable, stop the process to exit");
        return;
    }
    warn!(grace_secs = grace.as_secs(), "Shutdown requested, finishing records in flight");
    shutdown.cancel();

    tokio::select! {
        _ = tokio::time::sleep(grace) => warn!("Grace period elapsed, aborting"),
        second = shutdown_signal() => {
            if second.is_ok() {
                warn!("Second signal, aborting");
            }
        }
    }
    abort.cancel();
}

/// Wait for Ctrl+C or SIGTERM
async fn shutdown_signal() -> Result<(), CliError> {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .map_err(|e| CliError::shutdown(format!("Ctrl+C handler: {e}")))
    };

    #[cfg(unix)]
    let terminate = async {
        let mut signal =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .map_err(|e| CliError::shutdown(format!("SIGTERM handler: {e}")))?;
        signal.recv().await;
        Ok::<(), CliError>(())
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<Result<(), CliError>>();

    tokio::select! {
        result = ctrl_c => result,
        result = terminate => result,
    }
}
