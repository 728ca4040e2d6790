//! HTTP API for the claims service.
//!
//! Exposes an axum [`Router`] backed by any [`claims_core::ClaimStore`].
//! TLS and transport concerns are the caller's responsibility.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/` | `{"did": ...}`, the identity invocations must be addressed to |
//! | `POST` | `/` | Body: CAR archive holding one signed `assert/*` invocation |
//! | `GET`  | `/claims/{cid}` | Optional `?walk=parts,includes,children`; CAR stream of claims |

pub mod assert;
pub mod error;
pub mod read;

use std::sync::Arc;

use axum::{Router, routing::get};
use claims_core::{ClaimStore, auth::Authorize};

pub use error::ApiError;

// ─── Application state ────────────────────────────────────────────────────────

/// Shared state threaded through all handlers.
pub struct AppState<S> {
  pub store:       Arc<S>,
  pub authorizer:  Arc<dyn Authorize>,
  /// DID of the service; published at `GET /`.
  pub service_did: Arc<str>,
}

impl<S> Clone for AppState<S> {
  fn clone(&self) -> Self {
    Self {
      store:       self.store.clone(),
      authorizer:  self.authorizer.clone(),
      service_did: self.service_did.clone(),
    }
  }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the API router for `state`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(state: AppState<S>) -> Router<()>
where
  S: ClaimStore + 'static,
{
  Router::new()
    .route("/", get(read::identity::<S>).post(assert::handler::<S>))
    .route("/claims/{cid}", get(read::claims::<S>))
    .with_state(state)
}

#[cfg(test)]
mod tests;
