#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! **gm-accrual** – The accrual reconciliation loop.
//!
//! Every order in a non-terminal state is eventually re-queried against the
//! external accrual service and its outcome applied, subject to a shared
//! rate-limit budget (spec §4.4). This crate owns no persistent state of its
//! own: it reads and writes exclusively through [`gm_store::Store`].

use std::sync::Arc;
use std::time::Duration;

use gm_store::Store;
use gm_types::LedgerError;
use tokio::sync::{mpsc, Mutex};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// The back-off deadline shared across a polling round's worker pool.
pub mod backoff;
/// The outbound HTTP client to the external accrual service.
pub mod client;
/// A single worker's per-order processing step.
pub mod worker;

pub use backoff::SharedBackoff;
pub use client::{AccrualClient, PollOutcome};

/// Size of the bounded job channel each polling round dispatches order
/// numbers onto.
const DISPATCH_CHANNEL_CAPACITY: usize = 256;

/// Tunables for the reconciliation loop.
#[derive(Debug, Clone)]
pub struct AccrualConfig {
    /// Base URL of the external accrual service.
    pub base_url: String,
    /// Number of workers drawing from the job channel each round.
    pub workers: usize,
    /// How often a new polling round is attempted.
    pub poll_interval: Duration,
}

impl AccrualConfig {
    /// Default worker count (spec §6: `ACCRUAL_SYSTEM_PROCESS_WORKERS`).
    pub const DEFAULT_WORKERS: usize = 10;
    /// Default round interval (spec §4.4).
    pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);
}

/// Drives the polling-round scheduler and worker pool against one ledger
/// [`Store`].
pub struct ReconciliationLoop {
    store: Arc<Store>,
    client: Arc<AccrualClient>,
    backoff: Arc<SharedBackoff>,
    config: AccrualConfig,
}

impl ReconciliationLoop {
    /// Builds a loop against `store`, talking to the accrual service at
    /// `config.base_url`.
    pub fn new(config: AccrualConfig, store: Arc<Store>) -> reqwest::Result<Self> {
        let client = AccrualClient::new(config.base_url.clone())?;
        Ok(ReconciliationLoop {
            store,
            client: Arc::new(client),
            backoff: Arc::new(SharedBackoff::new()),
            config,
        })
    }

    /// Runs the scheduler for the process lifetime, or until `cancel` fires.
    ///
    /// The timer coalesces: a tick that arrives while a round is still
    /// draining is skipped rather than queued, so at most one round is ever
    /// in flight.
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) {
        let mut interval = tokio::time::interval(self.config.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(workers = self.config.workers, interval = ?self.config.poll_interval, "reconciliation loop started");

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.run_round(&cancel).await;
                }
                _ = cancel.cancelled() => {
                    info!("reconciliation loop cancelled");
                    return;
                }
            }
        }
    }

    /// Executes exactly one polling round: fetch, dispatch, drain.
    async fn run_round(&self, cancel: &CancellationToken) {
        let orders = match self.store.list_unprocessed_orders().await {
            Ok(orders) => orders,
            Err(LedgerError::NoOrdersToPoll) => return,
            Err(e) => {
                error!(error = %e, "failed to list unprocessed orders");
                return;
            }
        };

        let (tx, rx) = mpsc::channel(DISPATCH_CHANNEL_CAPACITY);
        let rx = Arc::new(Mutex::new(rx));

        let handles: Vec<_> = (0..self.config.workers)
            .map(|id| {
                tokio::spawn(worker::run(
                    id,
                    rx.clone(),
                    self.client.clone(),
                    self.store.clone(),
                    self.backoff.clone(),
                    cancel.clone(),
                ))
            })
            .collect();

        for order in orders {
            if cancel.is_cancelled() || tx.send(order.number).await.is_err() {
                break;
            }
        }
        drop(tx);

        for handle in handles {
            if let Err(e) = handle.await {
                error!(error = %e, "reconciliation worker task panicked");
            }
        }
    }
}
