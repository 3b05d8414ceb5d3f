#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! **gm-store** – The authoritative ledger store.
//!
//! Backed by Postgres via `sqlx`. Persists users, orders, and withdrawals;
//! derives balances from them; and enforces the debit invariant
//! (`current >= 0`) inside a single serialized transaction per user. This is
//! the only component in the service that mutates persisted state — the
//! reconciliation loop and the HTTP handlers both read and write through it,
//! never around it.

use std::time::Duration;

use gm_types::{Balance, LedgerError, Money, Order, OrderStatus, User, Withdrawal};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use tracing::{debug, info};

/// Crate-local result alias.
pub type Result<T> = std::result::Result<T, LedgerError>;

const POSTGRES_UNIQUE_VIOLATION: &str = "23505";

/// Connection pool plus the ledger operations layered over it.
#[derive(Debug, Clone)]
pub struct Store {
    pool: PgPool,
}

impl Store {
    /// Connects to `database_url`, applying embedded migrations.
    ///
    /// # Errors
    /// Returns [`LedgerError::Backend`] if the connection cannot be
    /// established or a migration fails.
    pub async fn connect(database_url: &str) -> Result<Self> {
        info!("connecting to ledger database");
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await.map_err(|e| {
            LedgerError::Backend(sqlx::Error::Migrate(Box::new(e)))
        })?;

        Ok(Store { pool })
    }

    /// Wraps an already-open pool (used by tests against an ephemeral DB).
    pub fn from_pool(pool: PgPool) -> Self {
        Store { pool }
    }

    /// Pings the database with a 3-second timeout, per the startup contract.
    pub async fn ping(&self) -> Result<()> {
        tokio::time::timeout(Duration::from_secs(3), sqlx::query("SELECT 1").execute(&self.pool))
            .await
            .map_err(|_| LedgerError::Backend(sqlx::Error::PoolTimedOut))??;
        Ok(())
    }

    //─────────────────────────────
    //  Users
    //─────────────────────────────

    /// Creates a user, conflicting with [`LedgerError::LoginConflict`] if
    /// `login` is already registered.
    pub async fn create_user(&self, login: &str, password_hash: &str) -> Result<i64> {
        let result = sqlx::query_scalar::<_, i64>(
            "INSERT INTO users (login, password_hash) VALUES ($1, $2) RETURNING id",
        )
        .bind(login)
        .bind(password_hash)
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(id) => Ok(id),
            Err(sqlx::Error::Database(db_err)) if db_err.code().as_deref() == Some(POSTGRES_UNIQUE_VIOLATION) => {
                Err(LedgerError::LoginConflict)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Fetches a user (and its password hash) by login.
    pub async fn get_user_by_login(&self, login: &str) -> Result<(User, String)> {
        let row = sqlx::query("SELECT id, login, password_hash FROM users WHERE login = $1")
            .bind(login)
            .fetch_optional(&self.pool)
            .await?;

        let row = row.ok_or(LedgerError::UserNotFound)?;
        Ok((
            User {
                id: row.try_get("id")?,
                login: row.try_get("login")?,
            },
            row.try_get("password_hash")?,
        ))
    }

    //─────────────────────────────
    //  Orders
    //─────────────────────────────

    /// Creates an order in status `NEW`, owned by `user_id`.
    ///
    /// Conflicts with [`LedgerError::OrderConflict`] if `number` already
    /// exists; callers distinguish "already mine" from "owned by someone
    /// else" by calling [`Store::get_order_by_number`] first, per the
    /// upload handler's contract.
    pub async fn create_order(&self, user_id: i64, number: &str) -> Result<()> {
        let result = sqlx::query(
            "INSERT INTO orders (user_id, number, status) VALUES ($1, $2, 'NEW')",
        )
        .bind(user_id)
        .bind(number)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db_err)) if db_err.code().as_deref() == Some(POSTGRES_UNIQUE_VIOLATION) => {
                Err(LedgerError::OrderConflict)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Fetches an order by its number.
    pub async fn get_order_by_number(&self, number: &str) -> Result<Order> {
        let row = sqlx::query(
            "SELECT user_id, number, status, accrual, uploaded_at FROM orders WHERE number = $1",
        )
        .bind(number)
        .fetch_optional(&self.pool)
        .await?;

        let row = row.ok_or(LedgerError::OrderNotFound)?;
        order_from_row(&row)
    }

    /// Lists a user's orders, oldest first.
    pub async fn list_orders_by_user(&self, user_id: i64) -> Result<Vec<Order>> {
        let rows = sqlx::query(
            "SELECT user_id, number, status, accrual, uploaded_at FROM orders \
             WHERE user_id = $1 ORDER BY uploaded_at ASC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        if rows.is_empty() {
            return Err(LedgerError::NoOrdersFound);
        }
        rows.iter().map(order_from_row).collect()
    }

    /// Lists every order still in a non-terminal status, for the
    /// reconciliation loop to claim. Unordered.
    pub async fn list_unprocessed_orders(&self) -> Result<Vec<Order>> {
        let rows = sqlx::query(
            "SELECT user_id, number, status, accrual, uploaded_at FROM orders \
             WHERE status IN ('NEW', 'PROCESSING')",
        )
        .fetch_all(&self.pool)
        .await?;

        if rows.is_empty() {
            return Err(LedgerError::NoOrdersToPoll);
        }
        rows.iter().map(order_from_row).collect()
    }

    /// Applies a status/accrual update from the reconciliation loop.
    ///
    /// Idempotent: replaying the same `(status, accrual)` pair for an order
    /// that has already been updated is a no-op from the caller's
    /// perspective. Only the reconciliation loop calls this.
    pub async fn update_order(
        &self,
        number: &str,
        status: OrderStatus,
        accrual: Option<Money>,
    ) -> Result<()> {
        let accrual_decimal = accrual.map(|m| m.as_decimal());
        let result = sqlx::query("UPDATE orders SET status = $1, accrual = $2 WHERE number = $3")
            .bind(status)
            .bind(accrual_decimal)
            .bind(number)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(LedgerError::OrderNotFound);
        }
        debug!(order = number, ?status, "order updated by reconciliation loop");
        Ok(())
    }

    //─────────────────────────────
    //  Balance & withdrawals
    //─────────────────────────────

    /// Computes a user's current balance and lifetime withdrawn total.
    pub async fn get_balance(&self, user_id: i64) -> Result<Balance> {
        let (current, withdrawn) = balance_within(&self.pool, user_id).await?;
        Ok(Balance {
            current: Money::new(current),
            withdrawn: Money::new(withdrawn),
        })
    }

    /// The debit-transaction protocol (spec §4.3): within a single
    /// transaction, lock the user's row, recompute `current`, and either
    /// reject with [`LedgerError::InsufficientFunds`] or insert the
    /// withdrawal and commit.
    ///
    /// The `SELECT ... FOR UPDATE` on the user row serializes concurrent
    /// debit transactions for the same user: two withdrawals racing for the
    /// same balance cannot both observe the pre-debit `current` and both
    /// succeed when only one fits.
    pub async fn create_withdrawal(&self, user_id: i64, order_number: &str, sum: Money) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("SELECT id FROM users WHERE id = $1 FOR UPDATE")
            .bind(user_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(LedgerError::UserNotFound)?;

        let (current, _withdrawn) = balance_within(&mut *tx, user_id).await?;

        if current - sum.as_decimal() < rust_decimal::Decimal::ZERO {
            tx.rollback().await?;
            return Err(LedgerError::InsufficientFunds);
        }

        sqlx::query(
            "INSERT INTO withdrawals (user_id, order_number, sum) VALUES ($1, $2, $3)",
        )
        .bind(user_id)
        .bind(order_number)
        .bind(sum.as_decimal())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Lists a user's withdrawals, oldest first.
    pub async fn list_withdrawals_by_user(&self, user_id: i64) -> Result<Vec<Withdrawal>> {
        let rows = sqlx::query(
            "SELECT order_number, sum, processed_at FROM withdrawals \
             WHERE user_id = $1 ORDER BY processed_at ASC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        if rows.is_empty() {
            return Err(LedgerError::NoWithdrawalsFound);
        }

        rows.iter()
            .map(|row| {
                Ok(Withdrawal {
                    order: row.try_get("order_number")?,
                    sum: Money::new(row.try_get("sum")?),
                    processed_at: row.try_get("processed_at")?,
                })
            })
            .collect()
    }
}

fn order_from_row(row: &sqlx::postgres::PgRow) -> Result<Order> {
    let accrual: Option<rust_decimal::Decimal> = row.try_get("accrual")?;
    Ok(Order {
        user_id: row.try_get("user_id")?,
        number: row.try_get("number")?,
        status: row.try_get("status")?,
        accrual: accrual.map(Money::new),
        uploaded_at: row.try_get("uploaded_at")?,
    })
}

/// Sums `PROCESSED` accruals and withdrawals for `user_id` within whatever
/// executor `exec` is (pool or an open transaction), so the same query logic
/// backs both the read-only `get_balance` path and the locked debit path.
async fn balance_within<'e, E>(exec: E, user_id: i64) -> Result<(rust_decimal::Decimal, rust_decimal::Decimal)>
where
    E: sqlx::Executor<'e, Database = sqlx::Postgres>,
{
    let row = sqlx::query(
        "SELECT \
            COALESCE((SELECT SUM(accrual) FROM orders WHERE user_id = $1 AND status = 'PROCESSED'), 0) AS accrued, \
            COALESCE((SELECT SUM(sum) FROM withdrawals WHERE user_id = $1), 0) AS withdrawn",
    )
    .bind(user_id)
    .fetch_one(exec)
    .await?;

    Ok((row.try_get("accrued")?, row.try_get("withdrawn")?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unique_violation_code_matches_postgres() {
        assert_eq!(POSTGRES_UNIQUE_VIOLATION, "23505");
    }
}

/// Exercises the debit-transaction protocol (spec §4.3) against a live
/// Postgres instance: balance math, the `InsufficientFunds` rejection, and
/// the `FOR UPDATE` lock that serializes concurrent debits.
///
/// Gated on `TEST_DATABASE_URL` rather than run unconditionally, since these
/// tests need a real server to lock real rows against — a pattern the
/// in-memory suites elsewhere in this workspace (e.g.
/// `toka-store-sqlite`'s `SqliteBackend::in_memory`) don't need but a
/// Postgres-only store does.
#[cfg(test)]
mod debit_transaction_tests {
    use super::*;
    use rust_decimal::Decimal;
    use uuid::Uuid;

    async fn live_store() -> Option<Store> {
        let url = std::env::var("TEST_DATABASE_URL").ok()?;
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(&url)
            .await
            .expect("failed to connect to TEST_DATABASE_URL");
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .expect("failed to run migrations against TEST_DATABASE_URL");
        Some(Store::from_pool(pool))
    }

    macro_rules! require_store {
        () => {
            match live_store().await {
                Some(store) => store,
                None => {
                    eprintln!(
                        "skipping {}: set TEST_DATABASE_URL to run gm-store's live-Postgres suite",
                        module_path!()
                    );
                    return;
                }
            }
        };
    }

    async fn seed_user(store: &Store) -> i64 {
        let login = format!("debit-test-{}", Uuid::new_v4());
        store.create_user(&login, "unused-hash").await.unwrap()
    }

    /// Credits `user_id` with a `PROCESSED` order worth `amount`, the same
    /// way the reconciliation loop would via `update_order`.
    async fn credit(store: &Store, user_id: i64, amount: Decimal) {
        let number = format!("{}", Uuid::new_v4().as_u128() % 10u128.pow(15));
        store.create_order(user_id, &number).await.unwrap();
        store
            .update_order(&number, OrderStatus::Processed, Some(Money::new(amount)))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn withdrawal_of_exactly_current_succeeds_and_zeroes_balance() {
        let store = require_store!();
        let user_id = seed_user(&store).await;
        credit(&store, user_id, Decimal::new(5000, 2)).await; // 50.00

        let order = format!("{}", Uuid::new_v4().as_u128() % 10u128.pow(15));
        store
            .create_withdrawal(user_id, &order, Money::new(Decimal::new(5000, 2)))
            .await
            .unwrap();

        let balance = store.get_balance(user_id).await.unwrap();
        assert_eq!(balance.current.as_decimal(), Decimal::ZERO);
        assert_eq!(balance.withdrawn.as_decimal(), Decimal::new(5000, 2));
    }

    #[tokio::test]
    async fn withdrawal_exceeding_current_is_rejected_and_balance_unchanged() {
        let store = require_store!();
        let user_id = seed_user(&store).await;
        credit(&store, user_id, Decimal::new(1000, 2)).await; // 10.00

        let order = format!("{}", Uuid::new_v4().as_u128() % 10u128.pow(15));
        let result = store
            .create_withdrawal(user_id, &order, Money::new(Decimal::new(1001, 2)))
            .await;

        assert!(matches!(result, Err(LedgerError::InsufficientFunds)));

        let balance = store.get_balance(user_id).await.unwrap();
        assert_eq!(balance.current.as_decimal(), Decimal::new(1000, 2));
        assert_eq!(balance.withdrawn.as_decimal(), Decimal::ZERO);
    }

    /// Spec §8 invariant #1: random interleavings of withdrawal attempts
    /// must never let a user's `current` go negative. Ten withdrawals of
    /// 15.00 race against a 100.00 balance — only six can fit (90.00); the
    /// `SELECT ... FOR UPDATE` lock in `create_withdrawal` must serialize
    /// them so exactly six succeed, never seven, and `current` never dips
    /// below zero regardless of scheduling order.
    #[tokio::test]
    async fn concurrent_debits_never_oversubscribe_the_balance() {
        let store = require_store!();
        let user_id = seed_user(&store).await;
        credit(&store, user_id, Decimal::new(10000, 2)).await; // 100.00

        let store = std::sync::Arc::new(store);
        let attempts = 10;
        let per_withdrawal = Decimal::new(1500, 2); // 15.00

        let mut handles = Vec::with_capacity(attempts);
        for _ in 0..attempts {
            let store = store.clone();
            let order = format!("{}", Uuid::new_v4().as_u128() % 10u128.pow(15));
            handles.push(tokio::spawn(async move {
                store
                    .create_withdrawal(user_id, &order, Money::new(per_withdrawal))
                    .await
            }));
        }

        let mut succeeded = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                succeeded += 1;
            }
        }

        assert_eq!(succeeded, 6, "exactly six 15.00 withdrawals fit in a 100.00 balance");

        let balance = store.get_balance(user_id).await.unwrap();
        assert!(balance.current.as_decimal() >= Decimal::ZERO);
        assert_eq!(balance.current.as_decimal(), Decimal::new(10000, 2) - per_withdrawal * Decimal::from(succeeded));
    }
}
