//! The write path: `POST /` with a signed `assert/*` invocation.
//!
//! The body is decoded and verified, dispatched on its capability, checked
//! against the authorization policy and only then stored.

use axum::{Json, extract::State};
use bytes::Bytes;
use chrono::Utc;
use claims_core::{ArchivedClaim, Claim, ClaimKind, ClaimStore, Error};
use serde_json::json;
use tracing::info;

use crate::{AppState, error::ApiError};

/// `POST /`
pub async fn handler<S>(
  State(state): State<AppState<S>>,
  body: Bytes,
) -> Result<Json<serde_json::Value>, ApiError>
where
  S: ClaimStore,
{
  let (claim, invocation) = ArchivedClaim::open(body.to_vec())?;
  let kind = operation(claim.claim())?;

  state.authorizer.authorize(&invocation, Utc::now().timestamp())?;

  let claim_id = claim.claim_id;
  let content = claim.claim().content();
  state.store.put(claim).await.map_err(ApiError::store)?;
  info!(%kind, %claim_id, %content, issuer = %invocation.issuer, "accepted assertion");

  Ok(Json(json!({ "ok": {} })))
}

/// The operation an invocation asks for. Only the known claim kinds can be
/// asserted.
fn operation(claim: &Claim) -> Result<ClaimKind, Error> {
  match claim {
    Claim::Location(_) => Ok(ClaimKind::Location),
    Claim::Partition(_) => Ok(ClaimKind::Partition),
    Claim::Inclusion(_) => Ok(ClaimKind::Inclusion),
    Claim::Relation(_) => Ok(ClaimKind::Relation),
    Claim::Equals(_) => Ok(ClaimKind::Equals),
    Claim::Unknown(u) => Err(Error::Validation(format!("unsupported capability {:?}", u.can))),
  }
}
