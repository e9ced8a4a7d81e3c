mod cli;
mod config;
mod primes;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};

use stupid_fanout::AbortController;

use crate::cli::{CliArgs, Command, PrimesArgs};
use crate::config::CliConfig;
use crate::primes::{PrimeReport, PrimesJob};

#[tokio::main]
async fn main() -> Result<()> {
    stupid_fanout::config::load_dotenv();

    let args = CliArgs::parse();

    // Initialize tracing
    let default_level = if args.verbose { "info" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_target(false)
        .init();

    let config = CliConfig::load(args.config.as_deref())
        .context("failed to load configuration")?;

    match args.command {
        Command::Primes(primes_args) => run_primes(primes_args, &config).await,
    }
}

async fn run_primes(args: PrimesArgs, config: &CliConfig) -> Result<()> {
    let count = args.count.unwrap_or(config.count);
    let max_value = args.max_value.unwrap_or(config.max_value);
    let values = primes::generate_values(count, max_value, args.seed);

    let job = PrimesJob {
        values,
        pool: config.resolve_pool(args.concurrency),
        cancel_after: args.cancel_after,
        transfer: args.transfer,
    };

    // Ctrl-C / SIGTERM aborts the run; it stops at the next result.
    let controller = AbortController::new();
    let signal_controller = controller.clone();
    let signal_handle = tokio::spawn(async move {
        shutdown_signal().await;
        warn!("shutdown signal received, cancelling");
        signal_controller.abort();
    });

    info!(count, max_value, transfer = args.transfer, "starting prime test");
    let result = primes::run(job, controller).await;
    signal_handle.abort();

    let report = result?;
    print_report(&report, args.json)
}

fn print_report(report: &PrimeReport, json: bool) -> Result<()> {
    if json {
        let out = serde_json::to_string_pretty(report).context("failed to serialize report")?;
        println!("{out}");
        return Ok(());
    }

    for prime in &report.primes {
        println!("{prime}");
    }
    eprintln!(
        "{} prime(s) among {} tested value(s) on {} worker(s) [{:?}, {} untested]",
        report.primes.len(),
        report.tested,
        report.workers,
        report.state,
        report.untested,
    );
    Ok(())
}

/// Wait for SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {},
                    _ = sigterm.recv() => {},
                }
            }
            Err(e) => {
                warn!(error = %e, "failed to register SIGTERM handler");
                wait_or_pend(ctrl_c).await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        wait_or_pend(ctrl_c).await;
    }
}

/// A listener that failed to install never fires.
async fn wait_or_pend(ctrl_c: impl std::future::Future<Output = std::io::Result<()>>) {
    if let Err(e) = ctrl_c.await {
        warn!(error = %e, "failed to listen for ctrl_c");
        std::future::pending::<()>().await;
    }
}
