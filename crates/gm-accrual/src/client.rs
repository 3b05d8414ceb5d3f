//! The outbound HTTP client to the external accrual service.

use std::time::Duration;

use gm_types::{Money, OrderStatus};
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{error, warn};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Status vocabulary reported by the accrual service. `Registered` has no
/// counterpart in the local [`OrderStatus`] enum and is translated to
/// `Processing` on ingest (spec §4.4, §9 open question).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
enum AccrualStatus {
    Registered,
    Processing,
    Invalid,
    Processed,
}

impl From<AccrualStatus> for OrderStatus {
    fn from(value: AccrualStatus) -> Self {
        match value {
            AccrualStatus::Registered | AccrualStatus::Processing => OrderStatus::Processing,
            AccrualStatus::Invalid => OrderStatus::Invalid,
            AccrualStatus::Processed => OrderStatus::Processed,
        }
    }
}

#[derive(Debug, Deserialize)]
struct AccrualResponseBody {
    #[allow(dead_code)]
    order: String,
    status: AccrualStatus,
    accrual: Option<Decimal>,
}

/// The result of polling one order, already translated into what the
/// reconciliation worker should do next.
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    /// `200` — apply this status/accrual pair to the order.
    Update {
        /// New local status.
        status: OrderStatus,
        /// Present only when `status == Processed`.
        accrual: Option<Money>,
    },
    /// `204` — order not yet known to the accrual service. Not an error.
    Unknown,
    /// `429` — back off for at least this long. Not an error; the order is
    /// left untouched.
    RateLimited(Duration),
    /// `5xx`, network failure, or a malformed body. Logged by the caller;
    /// the order remains in its current non-terminal state and will be
    /// retried on a future round.
    Transient,
}

/// Thin wrapper over a `reqwest::Client` pointed at one accrual service base
/// URL, with the 5-second per-request timeout the spec mandates.
#[derive(Debug, Clone)]
pub struct AccrualClient {
    http: reqwest::Client,
    base_url: String,
}

impl AccrualClient {
    /// Builds a client against `base_url` (no trailing slash expected).
    pub fn new(base_url: String) -> reqwest::Result<Self> {
        let http = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(AccrualClient { http, base_url })
    }

    /// Polls the outcome for `order_number`. Never returns an error: every
    /// failure mode the spec lists (network, 5xx, decode) collapses to
    /// [`PollOutcome::Transient`] after being logged, so the caller only
    /// ever has to act on the outcome.
    pub async fn poll(&self, order_number: &str) -> PollOutcome {
        let url = format!("{}/api/orders/{}", self.base_url, order_number);
        let response = match self.http.get(&url).send().await {
            Ok(r) => r,
            Err(e) => {
                error!(order = order_number, error = %e, "accrual request failed");
                return PollOutcome::Transient;
            }
        };

        match response.status().as_u16() {
            200 => match response.json::<AccrualResponseBody>().await {
                Ok(body) => {
                    let status: OrderStatus = body.status.into();
                    let accrual = if status == OrderStatus::Processed {
                        Some(Money::new(body.accrual.unwrap_or(Decimal::ZERO)))
                    } else {
                        None
                    };
                    PollOutcome::Update { status, accrual }
                }
                Err(e) => {
                    error!(order = order_number, error = %e, "failed to decode accrual response");
                    PollOutcome::Transient
                }
            },
            204 => PollOutcome::Unknown,
            429 => {
                let retry_after = response
                    .headers()
                    .get("Retry-After")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|s| s.parse::<u64>().ok())
                    .unwrap_or(1);
                warn!(order = order_number, retry_after, "accrual service rate-limited us");
                PollOutcome::RateLimited(Duration::from_secs(retry_after))
            }
            status if (500..600).contains(&status) => {
                error!(order = order_number, status, "accrual service returned a server error");
                PollOutcome::Transient
            }
            other => {
                warn!(order = order_number, status = other, "unexpected accrual service response");
                PollOutcome::Transient
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registered_translates_to_processing() {
        assert_eq!(OrderStatus::from(AccrualStatus::Registered), OrderStatus::Processing);
    }

    #[test]
    fn processed_translates_unchanged() {
        assert_eq!(OrderStatus::from(AccrualStatus::Processed), OrderStatus::Processed);
    }
}
