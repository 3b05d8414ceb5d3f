//! Request handlers: decode, invoke the ledger, map errors, respond.

use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use gm_types::{luhn, Money, Order, Withdrawal};
use serde::Deserialize;

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CredentialsRequest {
    login: String,
    password: String,
}

fn validate_credentials(req: &CredentialsRequest) -> Result<(), ApiError> {
    if req.login.is_empty() || req.password.is_empty() {
        return Err(ApiError::bad_request("login and password are required"));
    }
    Ok(())
}

/// `POST /api/user/register`
pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CredentialsRequest>,
) -> Result<Response, ApiError> {
    validate_credentials(&req)?;

    let password_hash = state.hasher.hash(&req.password);
    let user_id = state.store.create_user(&req.login, &password_hash).await?;
    let token = state.tokens.issue(user_id);

    Ok(bearer_response(&token))
}

/// `POST /api/user/login`
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CredentialsRequest>,
) -> Result<Response, ApiError> {
    validate_credentials(&req)?;

    let (user, password_hash) = match state.store.get_user_by_login(&req.login).await {
        Ok(found) => found,
        Err(gm_types::LedgerError::UserNotFound) => {
            return Err(ApiError::new(StatusCode::UNAUTHORIZED, "invalid login or password"))
        }
        Err(e) => return Err(e.into()),
    };

    if !state.hasher.verify(&req.password, &password_hash) {
        return Err(ApiError::new(StatusCode::UNAUTHORIZED, "invalid login or password"));
    }

    let token = state.tokens.issue(user.id);
    Ok(bearer_response(&token))
}

fn bearer_response(token: &str) -> Response {
    let mut response = StatusCode::OK.into_response();
    let value = format!("Bearer {token}")
        .parse()
        .expect("token is header-safe ASCII");
    response.headers_mut().insert(header::AUTHORIZATION, value);
    response
}

/// `POST /api/user/orders` — body is `text/plain`, the order number itself.
pub async fn upload_order(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    body: String,
) -> Result<StatusCode, ApiError> {
    let number = body.trim();
    if number.is_empty() {
        return Err(ApiError::bad_request("order number is required"));
    }
    if !luhn::is_valid(number) {
        return Err(ApiError::invalid_order_number());
    }

    match state.store.get_order_by_number(number).await {
        Ok(existing) if existing.user_id == user_id => Ok(StatusCode::OK),
        Ok(_other_owner) => Err(ApiError::new(StatusCode::CONFLICT, "order already registered by another user")),
        Err(gm_types::LedgerError::OrderNotFound) => {
            state.store.create_order(user_id, number).await?;
            Ok(StatusCode::ACCEPTED)
        }
        Err(e) => Err(e.into()),
    }
}

/// `GET /api/user/orders`
pub async fn list_orders(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Vec<Order>>, ApiError> {
    let orders = state.store.list_orders_by_user(user_id).await?;
    Ok(Json(orders))
}

/// `GET /api/user/balance`
pub async fn get_balance(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<gm_types::Balance>, ApiError> {
    let balance = state.store.get_balance(user_id).await?;
    Ok(Json(balance))
}

#[derive(Debug, Deserialize)]
pub struct WithdrawRequest {
    order: String,
    sum: Money,
}

/// `POST /api/user/balance/withdraw`
pub async fn withdraw(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    Json(req): Json<WithdrawRequest>,
) -> Result<StatusCode, ApiError> {
    if !luhn::is_valid(&req.order) {
        return Err(ApiError::invalid_order_number());
    }

    state.store.create_withdrawal(user_id, &req.order, req.sum).await?;
    Ok(StatusCode::OK)
}

/// `GET /api/user/withdrawals`
pub async fn list_withdrawals(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Vec<Withdrawal>>, ApiError> {
    let withdrawals = state.store.list_withdrawals_by_user(user_id).await?;
    Ok(Json(withdrawals))
}
