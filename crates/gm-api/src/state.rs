//! Shared application state handed to every handler via axum's `State`.

use std::sync::Arc;

use gm_auth::{Hasher, TokenCodec};
use gm_store::Store;

/// Everything a handler needs: the ledger, and the credential codecs.
#[derive(Clone)]
pub struct AppState {
    /// The authoritative ledger.
    pub store: Arc<Store>,
    /// Password hasher used by register/login.
    pub hasher: Arc<Hasher>,
    /// Bearer-token issuer/verifier shared by login/register and the auth
    /// middleware.
    pub tokens: Arc<TokenCodec>,
}
