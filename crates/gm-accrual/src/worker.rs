//! A single worker's processing step for one order number.

use std::sync::Arc;

use gm_store::Store;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::backoff::SharedBackoff;
use crate::client::{AccrualClient, PollOutcome};

/// Consumes order numbers from `rx` until the channel closes, applying the
/// shared back-off deadline before every request and writing outcomes back
/// through `store`.
pub async fn run(
    worker_id: usize,
    rx: Arc<tokio::sync::Mutex<tokio::sync::mpsc::Receiver<String>>>,
    client: Arc<AccrualClient>,
    store: Arc<Store>,
    backoff: Arc<SharedBackoff>,
    cancel: CancellationToken,
) {
    loop {
        if cancel.is_cancelled() {
            return;
        }

        let order_number = {
            let mut rx = rx.lock().await;
            match rx.recv().await {
                Some(number) => number,
                None => return,
            }
        };

        backoff.wait_if_needed(&cancel).await;
        if cancel.is_cancelled() {
            return;
        }

        match client.poll(&order_number).await {
            PollOutcome::Update { status, accrual } => {
                if let Err(e) = store.update_order(&order_number, status, accrual).await {
                    error!(worker_id, order = order_number, error = %e, "failed to persist accrual update");
                } else {
                    info!(worker_id, order = order_number, ?status, "order updated from accrual service");
                }
            }
            PollOutcome::Unknown => {
                info!(worker_id, order = order_number, "order not yet known to accrual service");
            }
            PollOutcome::RateLimited(retry_after) => {
                backoff.advance(retry_after);
            }
            PollOutcome::Transient => {
                // Already logged inside `AccrualClient::poll`; the order
                // stays non-terminal and is retried on a future round.
            }
        }
    }
}
