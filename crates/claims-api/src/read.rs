//! The read path: claims about a CID, optionally following links.
//!
//! The response is a CAR stream (no roots) whose blocks are claim archives.
//! Claims are streamed as the walk discovers them; when the client goes away
//! the walk stops, cancelling any in-flight store lookup.

use std::{
  collections::{HashSet, VecDeque},
  sync::Arc,
};

use axum::{
  Json,
  body::Body,
  extract::{Path, Query, State},
  http::header,
  response::{IntoResponse, Response},
};
use bytes::Bytes;
use cid::Cid;
use claims_core::{ArchivedClaim, ClaimSource, ClaimStore, Walk, archive::Multihash, stream};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::debug;

use crate::{AppState, error::ApiError};

pub const CAR_CONTENT_TYPE: &str = "application/vnd.ipld.car";

// ─── Identity ─────────────────────────────────────────────────────────────────

/// `GET /`
pub async fn identity<S>(State(state): State<AppState<S>>) -> Json<serde_json::Value> {
  Json(json!({ "did": state.service_did.as_ref() }))
}

// ─── Claims ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ReadParams {
  /// Comma-separated [`Walk`] directives.
  pub walk: Option<String>,
}

fn parse_walk(walk: Option<&str>) -> Result<Vec<Walk>, ApiError> {
  let Some(walk) = walk else { return Ok(Vec::new()) };
  walk
    .split(',')
    .map(str::trim)
    .filter(|s| !s.is_empty())
    .map(|s| s.parse().map_err(|_| ApiError::BadRequest(format!("unknown walk {s:?}"))))
    .collect()
}

/// `GET /claims/{cid}[?walk=parts,includes,children]`
pub async fn claims<S>(
  State(state): State<AppState<S>>,
  Path(cid): Path<String>,
  Query(params): Query<ReadParams>,
) -> Result<Response, ApiError>
where
  S: ClaimStore + 'static,
{
  let root = Cid::try_from(cid.as_str())
    .map_err(|e| ApiError::BadRequest(format!("invalid CID {cid:?}: {e}")))?;
  let walks = parse_walk(params.walk.as_deref())?;

  // The first lookup happens before the response starts so its failure can
  // still set the status code.
  let first = state.store.get(root).await.map_err(ApiError::store)?;
  let header = stream::header()?;

  let (tx, rx) = mpsc::channel(16);
  tokio::spawn(walk(state.store.clone(), root, first, walks, header, tx));

  Ok(
    (
      [(header::CONTENT_TYPE, CAR_CONTENT_TYPE)],
      Body::from_stream(ReceiverStream::new(rx)),
    )
      .into_response(),
  )
}

type Sender = mpsc::Sender<Result<Bytes, ApiError>>;

/// Breadth-first over `walks` links from `root`, sending each claim once.
async fn walk<S: ClaimSource>(
  store: Arc<S>,
  root: Cid,
  first: Vec<ArchivedClaim>,
  walks: Vec<Walk>,
  header: Vec<u8>,
  tx: Sender,
) {
  if tx.send(Ok(header.into())).await.is_err() {
    return;
  }

  let mut visited: HashSet<Multihash> = HashSet::from([*root.hash()]);
  let mut sent: HashSet<Cid> = HashSet::new();
  let mut queue: VecDeque<Cid> = VecDeque::new();

  let mut batch = first;
  loop {
    for claim in batch {
      if !sent.insert(claim.claim_id) {
        continue;
      }
      for w in &walks {
        for link in claim.claim().links(*w) {
          if visited.insert(*link.hash()) {
            queue.push_back(link);
          }
        }
      }
      if tx.send(Ok(stream::frame(&claim).into())).await.is_err() {
        return;
      }
    }

    let Some(next) = queue.pop_front() else { break };
    debug!(%root, %next, "walking");
    batch = tokio::select! {
      _ = tx.closed() => return,
      result = store.get(next) => match result {
        Ok(claims) => claims,
        Err(e) => {
          let _ = tx.send(Err(ApiError::store(e))).await;
          return;
        }
      },
    };
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn walk_directives() {
    assert_eq!(parse_walk(None).unwrap(), vec![]);
    assert_eq!(
      parse_walk(Some("parts, children")).unwrap(),
      vec![Walk::Parts, Walk::Children]
    );
    assert!(parse_walk(Some("parts,siblings")).is_err());
  }
}
