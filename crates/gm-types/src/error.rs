//! Closed error taxonomy for ledger operations.
//!
//! Every [`crate::model`] persistence operation returns one of these kinds so
//! the HTTP layer's error-to-status mapping (see `gm-api::handlers`) is
//! exhaustive and compile-checked: adding a new database failure mode means
//! adding a variant here, which forces every `match` on it to be revisited.

use thiserror::Error;

/// Errors surfaced by [`gm_store`](../gm_store/index.html) ledger operations.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// `create_user` found an existing row with the same login.
    #[error("login already registered")]
    LoginConflict,

    /// `get_user_by_login` (or a password check against it) found no match.
    #[error("user not found")]
    UserNotFound,

    /// `create_order` found an existing row with the same number, owned by
    /// a *different* user than the caller.
    #[error("order already registered by another user")]
    OrderConflict,

    /// `get_order_by_number` / `update_order` found no matching row.
    #[error("order not found")]
    OrderNotFound,

    /// `list_orders_by_user` found no rows for the user.
    #[error("no orders found")]
    NoOrdersFound,

    /// `list_unprocessed_orders` found no `NEW`/`PROCESSING` rows.
    #[error("no orders to poll")]
    NoOrdersToPoll,

    /// `create_withdrawal`'s debit-transaction check failed: `current < sum`.
    #[error("insufficient balance")]
    InsufficientFunds,

    /// `list_withdrawals_by_user` found no rows for the user.
    #[error("no withdrawals found")]
    NoWithdrawalsFound,

    /// Any failure of the underlying database driver not covered above.
    #[error("storage backend error: {0}")]
    Backend(#[from] sqlx::Error),
}

/// Errors surfaced by bearer-token verification (`gm_auth::token`).
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum TokenError {
    /// The token's `exp` claim is in the past.
    #[error("token expired")]
    Expired,
    /// HMAC signature verification failed.
    #[error("bad token signature")]
    BadSignature,
    /// Token is not well-formed JWT, or its header advertises an algorithm
    /// other than HS256 (algorithm-confusion guard).
    #[error("malformed token")]
    Malformed,
}
