/*
newsradar - single-binary main.rs
This binary starts the Rocket HTTP server and runs the background refresh worker inside the same process.
*/

use anyhow::Result;
use clap::Parser;
use common::Config;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Notify;
use tokio::time::Duration;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use newsradar::clock::SystemClock;
use newsradar::ingestion::HttpFetcher;
use newsradar::server::{self, AppState};
use newsradar::worker::run_worker;

#[derive(Parser, Debug)]
#[command(name = "newsradar", about = "Newsradar feed aggregation server + refresh worker")]
struct Args {
    /// Path to config.toml
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Disable background worker (run server only)
    #[arg(long)]
    no_worker: bool,

    /// Run worker only (do not bind HTTP server)
    #[arg(long)]
    worker_only: bool,

    /// Override log level (info, debug, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let filter = EnvFilter::try_new(&args.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();

    // Resolve config paths
    let default_path = PathBuf::from("config.default.toml");

    let override_path = if let Some(p) = args.config {
        if !p.exists() {
            error!(path = ?p, "specified config file not found");
            return Err(anyhow::anyhow!("Config file not found: {}", p.display()));
        }
        Some(p)
    } else {
        let p = PathBuf::from("config.toml");
        if p.exists() { Some(p) } else { None }
    };

    let config = match Config::load_with_defaults(
        if default_path.exists() { Some(default_path.as_path()) } else { None },
        override_path.as_deref(),
    )
    .await
    {
        Ok(cfg) => cfg,
        Err(e) => {
            error!(%e, "failed to load configuration");
            return Err(e);
        }
    };
    info!(default = ?default_path, override = ?override_path, feeds = config.feeds.len(), "configuration loaded");

    let fetcher = match HttpFetcher::new(&config.politeness()) {
        Ok(f) => Arc::new(f),
        Err(e) => {
            error!(%e, "failed to build HTTP fetcher");
            return Err(e);
        }
    };
    let state = AppState::new(Arc::new(config), fetcher, Arc::new(SystemClock));
    let scheduler = state.config.scheduler();

    // One worker task; notify_one leaves a permit even if it is mid-refresh
    let shutdown_notify = Arc::new(Notify::new());

    if args.worker_only {
        info!("Starting in worker-only mode");
        let worker = run_worker(
            state.aggregator.clone(),
            state.trends.clone(),
            scheduler.countries.clone(),
            scheduler.refresh_interval(),
            shutdown_notify.clone(),
        );

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("ctrl-c received, notifying worker to shutdown");
                shutdown_notify.notify_one();
            }
            res = worker => {
                if let Err(e) = res {
                    error!(%e, "worker encountered an error");
                }
            }
        }
        info!("worker-only run finished");
        return Ok(());
    }

    let mut worker_handle = None;
    if !args.no_worker {
        info!("Spawning background worker task");
        let worker = run_worker(
            state.aggregator.clone(),
            state.trends.clone(),
            scheduler.countries.clone(),
            scheduler.refresh_interval(),
            shutdown_notify.clone(),
        );
        worker_handle = Some(tokio::spawn(async move {
            if let Err(e) = worker.await {
                error!(%e, "background worker failed");
                Err(e)
            } else {
                Ok(())
            }
        }));
    } else {
        info!("Background worker disabled via CLI (--no-worker)");
    }

    info!("Launching Rocket HTTP server");
    if let Err(e) = server::launch_rocket(state).await {
        error!(%e, "Rocket server failed");
    }

    info!("HTTP server stopped; notifying worker to shutdown");
    shutdown_notify.notify_one();

    if let Some(handle) = worker_handle {
        match tokio::time::timeout(Duration::from_secs(20), handle).await {
            Ok(join_res) => match join_res {
                Ok(Ok(_)) => info!("worker exited cleanly"),
                Ok(Err(e)) => error!(%e, "worker task returned an error"),
                Err(join_err) => error!(%join_err, "worker task panicked"),
            },
            Err(_) => {
                info!("Timed out waiting for worker to exit; continuing shutdown");
            }
        }
    }

    info!("Shutdown complete");
    Ok(())
}
