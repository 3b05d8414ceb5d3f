#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! **gm-api** – The HTTP surface of the loyalty-points service.
//!
//! Wires [`state::AppState`] (store, password hasher, token codec) to the
//! route table in [`router::build`], with [`auth::AuthUser`] guarding the
//! endpoints that require a bearer token and [`error::ApiError`] turning
//! every ledger failure into the status code spec §7 names.

mod auth;
mod error;
mod handlers;
mod router;
mod state;

pub use error::ApiError;
pub use router::build as build_router;
pub use state::AppState;
