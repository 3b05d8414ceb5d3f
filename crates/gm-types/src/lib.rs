#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! **gm-types** – Shared domain types for the loyalty-points ledger.
//!
//! Dependency-light and sitting at the bottom of the crate graph: every
//! other crate in this workspace depends on it. It intentionally makes no
//! assumptions about HTTP, password hashing, or connection pooling, but does
//! speak `sqlx`'s row-mapping types directly since the whole service targets
//! a single Postgres backend.

/// Luhn checksum validation for order numbers.
pub mod luhn;

/// Fixed-point, scale-2 monetary amounts.
pub mod money;

/// Persisted and derived domain entities.
pub mod model;

/// Closed error taxonomies for ledger and credential operations.
pub mod error;

pub use error::{LedgerError, TokenError};
pub use model::{Balance, Order, OrderStatus, User, Withdrawal};
pub use money::Money;
