//! Assembles the axum [`Router`] and its ambient middleware stack.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

/// Requests larger than this are rejected with `413 Payload Too Large`
/// before a handler ever runs.
const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Builds the full application router over a shared [`AppState`].
pub fn build(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/user/register", post(handlers::register))
        .route("/api/user/login", post(handlers::login))
        .route("/api/user/orders", post(handlers::upload_order).get(handlers::list_orders))
        .route("/api/user/balance", get(handlers::get_balance))
        .route("/api/user/balance/withdraw", post(handlers::withdraw))
        .route("/api/user/withdrawals", get(handlers::list_withdrawals))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive())
                .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
                .layer(tower_http::timeout::TimeoutLayer::new(Duration::from_secs(30))),
        )
        .with_state(state)
}
