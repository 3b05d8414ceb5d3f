#![forbid(unsafe_code)]

//! **gophermart-server** – composition root for the loyalty-points service.
//!
//! Wires [`gm_store::Store`] (Postgres-backed ledger), [`gm_auth`]
//! (credential primitives), [`gm_api`] (HTTP surface), and
//! [`gm_accrual::ReconciliationLoop`] (outbound polling against the external
//! accrual system) into a single running process, and carries the process
//! through startup, serving, and graceful shutdown.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use gm_accrual::{AccrualConfig, ReconciliationLoop};
use gm_api::AppState;
use gm_auth::{Hasher, TokenCodec};
use gm_store::Store;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// In-flight requests get this long to finish once shutdown starts before
/// the server future is dropped out from under them.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[derive(Parser)]
#[command(name = "gophermart")]
#[command(about = "Loyalty-points accounting service")]
#[command(version)]
struct Cli {
    /// Address the HTTP server binds to.
    #[arg(short = 'a', long, env = "RUN_ADDRESS", default_value = "localhost:8080")]
    run_address: String,

    /// Postgres connection string for the ledger store.
    #[arg(short = 'd', long, env = "DATABASE_URI")]
    database_uri: String,

    /// Base URL of the external accrual system. When unset, the
    /// reconciliation loop does not run.
    #[arg(short = 'r', long, env = "ACCRUAL_SYSTEM_ADDRESS", default_value = "")]
    accrual_system_address: String,

    /// Number of reconciliation workers per polling round.
    #[arg(short = 'w', long, env = "ACCRUAL_SYSTEM_PROCESS_WORKERS", default_value_t = AccrualConfig::DEFAULT_WORKERS)]
    accrual_system_process_workers: usize,

    /// Secret signing bearer tokens. Generate a random one per deployment;
    /// there is no safe production default.
    #[arg(long, env = "TOKEN_SECRET")]
    token_secret: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    init_logging();
    info!(version = env!("CARGO_PKG_VERSION"), "starting gophermart-server");

    let store = Arc::new(
        Store::connect(&cli.database_uri)
            .await
            .context("failed to connect to the ledger database")?,
    );
    store.ping().await.context("ledger database did not respond to ping")?;
    info!("ledger database ready");

    let token_secret = cli.token_secret.unwrap_or_else(|| {
        warn!("TOKEN_SECRET not set; generating a process-local secret (tokens will not survive a restart)");
        uuid::Uuid::new_v4().to_string()
    });

    let state = Arc::new(AppState {
        store: store.clone(),
        hasher: Arc::new(Hasher::default()),
        tokens: Arc::new(TokenCodec::new(&token_secret)),
    });

    let cancel = CancellationToken::new();

    let reconciliation_handle = if cli.accrual_system_address.is_empty() {
        info!("ACCRUAL_SYSTEM_ADDRESS not set; reconciliation loop disabled");
        None
    } else {
        let config = AccrualConfig {
            base_url: cli.accrual_system_address.clone(),
            workers: cli.accrual_system_process_workers,
            poll_interval: AccrualConfig::DEFAULT_POLL_INTERVAL,
        };
        let reconciliation = Arc::new(
            ReconciliationLoop::new(config, store.clone())
                .context("failed to build the accrual reconciliation loop")?,
        );
        let loop_cancel = cancel.clone();
        Some(tokio::spawn(async move { reconciliation.run(loop_cancel).await }))
    };

    let app = gm_api::build_router(state);
    let listener = tokio::net::TcpListener::bind(&cli.run_address)
        .await
        .with_context(|| format!("failed to bind {}", cli.run_address))?;
    info!(address = %cli.run_address, "HTTP server listening");

    let server = axum::serve(listener, app).with_graceful_shutdown(shutdown_signal());

    // Once `shutdown_signal` resolves, `server` stops accepting new
    // connections and waits for in-flight ones to finish on its own; this
    // outer race just bounds how long we wait for that drain to the spec's
    // 5-second grace period before abandoning the server future.
    let grace = async {
        shutdown_signal().await;
        info!("shutdown signal received; in-flight requests get {:?} to finish", SHUTDOWN_GRACE);
        tokio::time::sleep(SHUTDOWN_GRACE).await;
    };

    tokio::select! {
        result = server => {
            if let Err(e) = result {
                error!(error = %e, "HTTP server error");
            }
        }
        _ = grace => {
            warn!("shutdown grace period elapsed; closing remaining connections");
        }
    }

    cancel.cancel();
    if let Some(handle) = reconciliation_handle {
        let _ = tokio::time::timeout(SHUTDOWN_GRACE, handle).await;
    }

    info!("gophermart-server stopped");
    Ok(())
}

fn init_logging() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
