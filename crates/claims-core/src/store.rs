//! The claim store traits and their composition.
//!
//! [`ClaimSource`] is the read side shared by persisted stores and the
//! derived-claim resolver; [`ClaimStore`] adds writes. Higher layers depend on
//! these abstractions, not on any concrete backend.

use std::{collections::HashMap, future::Future, sync::Arc};

use cid::Cid;
use thiserror::Error;

use crate::archive::{ArchivedClaim, Multihash};

// ─── Traits ──────────────────────────────────────────────────────────────────

/// Anything that can answer "what claims exist about this content?".
///
/// Lookups are keyed by the multihash of `content`, so CIDv0 and CIDv1
/// spellings of the same bytes return the same claims. An unknown subject is
/// an empty vector, never an error.
pub trait ClaimSource: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  fn get(
    &self,
    content: Cid,
  ) -> impl Future<Output = Result<Vec<ArchivedClaim>, Self::Error>> + Send + '_;
}

/// A claim source that also accepts writes.
pub trait ClaimStore: ClaimSource {
  /// Persist `claim`. Writing the same `claim_id` twice is a no-op.
  fn put(
    &self,
    claim: ArchivedClaim,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;
}

impl<T: ClaimSource> ClaimSource for Arc<T> {
  type Error = T::Error;

  async fn get(&self, content: Cid) -> Result<Vec<ArchivedClaim>, Self::Error> {
    (**self).get(content).await
  }
}

impl<T: ClaimStore> ClaimStore for Arc<T> {
  async fn put(&self, claim: ArchivedClaim) -> Result<(), Self::Error> {
    (**self).put(claim).await
  }
}

// ─── Tiered ──────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum TieredError<P, D> {
  #[error("persisted store: {0}")]
  Persisted(#[source] P),
  #[error("derived claims: {0}")]
  Derived(#[source] D),
}

/// Persisted claims first, then claims derived on the fly.
///
/// Writes only ever reach the persisted store.
#[derive(Debug, Clone)]
pub struct TieredStore<P, D> {
  persisted: P,
  derived:   Option<D>,
}

impl<P, D> TieredStore<P, D> {
  pub fn new(persisted: P, derived: Option<D>) -> Self { Self { persisted, derived } }
}

impl<P: ClaimSource, D: ClaimSource> ClaimSource for TieredStore<P, D> {
  type Error = TieredError<P::Error, D::Error>;

  async fn get(&self, content: Cid) -> Result<Vec<ArchivedClaim>, Self::Error> {
    let mut claims = self.persisted.get(content).await.map_err(TieredError::Persisted)?;
    if let Some(derived) = &self.derived {
      claims.extend(derived.get(content).await.map_err(TieredError::Derived)?);
    }
    Ok(claims)
  }
}

impl<P: ClaimStore, D: ClaimSource> ClaimStore for TieredStore<P, D> {
  async fn put(&self, claim: ArchivedClaim) -> Result<(), Self::Error> {
    self.persisted.put(claim).await.map_err(TieredError::Persisted)
  }
}

// ─── In-memory ───────────────────────────────────────────────────────────────

/// A volatile store keyed by subject multihash. Claims are returned in
/// insertion order.
#[derive(Debug, Default)]
pub struct MemoryStore {
  claims: std::sync::Mutex<HashMap<Multihash, Vec<ArchivedClaim>>>,
}

impl MemoryStore {
  pub fn new() -> Self { Self::default() }

  pub fn len(&self) -> usize {
    self.lock().values().map(Vec::len).sum()
  }

  pub fn is_empty(&self) -> bool { self.len() == 0 }

  fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<Multihash, Vec<ArchivedClaim>>> {
    self.claims.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
  }
}

impl ClaimSource for MemoryStore {
  type Error = std::convert::Infallible;

  async fn get(&self, content: Cid) -> Result<Vec<ArchivedClaim>, Self::Error> {
    Ok(self.lock().get(content.hash()).cloned().unwrap_or_default())
  }
}

impl ClaimStore for MemoryStore {
  async fn put(&self, claim: ArchivedClaim) -> Result<(), Self::Error> {
    let mut claims = self.lock();
    let entry = claims.entry(claim.subject_digest).or_default();
    if !entry.iter().any(|c| c.claim_id == claim.claim_id) {
      entry.push(claim);
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use multihash_codetable::{Code, MultihashDigest};

  use super::*;
  use crate::{
    archive::ClaimBuilder,
    claim::{Claim, EqualsClaim},
    signer::Ed25519Signer,
  };

  fn raw(seed: &[u8]) -> Cid { Cid::new_v1(0x55, Code::Sha2_256.digest(seed)) }

  fn equals(content: Cid, equals: Cid) -> ArchivedClaim {
    ClaimBuilder::new(Ed25519Signer::generate())
      .build(Claim::Equals(EqualsClaim { content, equals }), None, vec![])
      .unwrap()
  }

  #[tokio::test]
  async fn lookup_ignores_cid_version_and_codec() {
    let store = MemoryStore::new();
    let subject = raw(b"subject");
    store.put(equals(subject, raw(b"other"))).await.unwrap();

    let v0 = Cid::new_v0(*subject.hash()).unwrap();
    assert_eq!(store.get(v0).await.unwrap().len(), 1);
    assert!(store.get(raw(b"nothing")).await.unwrap().is_empty());
  }

  #[tokio::test]
  async fn put_is_idempotent() {
    let store = MemoryStore::new();
    let claim = equals(raw(b"a"), raw(b"b"));
    store.put(claim.clone()).await.unwrap();
    store.put(claim).await.unwrap();
    assert_eq!(store.len(), 1);
  }

  #[tokio::test]
  async fn tiered_concatenates_and_writes_persisted_only() {
    let persisted = Arc::new(MemoryStore::new());
    let derived = Arc::new(MemoryStore::new());
    let subject = raw(b"subject");
    let stored = equals(subject, raw(b"stored"));
    let synthesized = equals(subject, raw(b"derived"));
    derived.put(synthesized.clone()).await.unwrap();

    let tiered = TieredStore::new(persisted.clone(), Some(derived.clone()));
    tiered.put(stored.clone()).await.unwrap();
    assert_eq!(persisted.len(), 1);
    assert_eq!(derived.len(), 1);

    let claims = tiered.get(subject).await.unwrap();
    assert_eq!(claims, vec![stored, synthesized]);
  }

  #[tokio::test]
  async fn tiered_without_derived_source() {
    let tiered: TieredStore<MemoryStore, MemoryStore> =
      TieredStore::new(MemoryStore::new(), None);
    assert!(tiered.get(raw(b"x")).await.unwrap().is_empty());
  }
}
