//! Persisted and derived domain entities: users, orders, withdrawals, balance.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::money::Money;

/// A registered user. Created once on register, never mutated or deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// Store-assigned, stable numeric identifier.
    pub id: i64,
    /// Unique, non-empty login.
    pub login: String,
}

/// Lifecycle status of an [`Order`].
///
/// Progression is monotone: `New -> Processing -> (Processed | Invalid)`.
/// `Processed` and `Invalid` are terminal and are never revisited by the
/// reconciliation loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "order_status", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderStatus {
    /// Uploaded, not yet claimed by a reconciliation worker.
    New,
    /// Claimed by the accrual service; outcome pending.
    Processing,
    /// Terminal: the accrual service rejected the order.
    Invalid,
    /// Terminal: the accrual service computed a final `accrual` amount.
    Processed,
}

impl OrderStatus {
    /// `true` for `New`/`Processing` — the set the reconciliation loop polls.
    pub fn is_non_terminal(&self) -> bool {
        matches!(self, OrderStatus::New | OrderStatus::Processing)
    }
}

/// An uploaded order number and its reconciliation state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    /// Luhn-valid, globally unique decimal digit string.
    pub number: String,
    /// Id of the user who uploaded the order.
    #[serde(skip)]
    pub user_id: i64,
    /// Current lifecycle status.
    pub status: OrderStatus,
    /// Present only once `status == Processed`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accrual: Option<Money>,
    /// Upload timestamp, RFC 3339 on the wire.
    pub uploaded_at: DateTime<Utc>,
}

/// A completed debit against a user's balance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Withdrawal {
    /// Luhn-valid order number the withdrawal was made against. Need not
    /// exist in the orders table — it is the *intended* target only.
    pub order: String,
    /// Positive amount debited.
    pub sum: Money,
    /// When the debit transaction committed, RFC 3339 on the wire.
    pub processed_at: DateTime<Utc>,
}

/// Derived (never stored) balance projection for a user.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Balance {
    /// Sum of `accrual` across `Processed` orders minus sum of withdrawals.
    pub current: Money,
    /// Sum of all withdrawals ever made by the user.
    pub withdrawn: Money,
}
