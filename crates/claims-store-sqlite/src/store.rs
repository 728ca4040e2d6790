//! [`SqliteStore`], the SQLite implementation of [`ClaimStore`].

use std::path::Path;

use chrono::Utc;
use cid::Cid;
use claims_core::{ArchivedClaim, ClaimSource, ClaimStore};
use tracing::warn;

use crate::{
  Result,
  encode::{encode_digest, encode_dt, encode_expiration},
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A claim store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Number of stored claims, expired ones included.
  pub async fn count(&self) -> Result<u64> {
    let n: i64 = self
      .conn
      .call(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM claims", [], |r| r.get(0))?))
      .await?;
    Ok(u64::try_from(n).unwrap_or_default())
  }
}

// ─── ClaimStore impl ─────────────────────────────────────────────────────────

impl ClaimSource for SqliteStore {
  type Error = crate::Error;

  /// Unexpired claims about `content`, newest first.
  async fn get(&self, content: Cid) -> Result<Vec<ArchivedClaim>> {
    let digest = encode_digest(content.hash());
    let now = Utc::now().timestamp();

    let rows: Vec<(String, Vec<u8>)> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT claim_id, bytes FROM claims
           WHERE subject_digest = ?1 AND (expiration IS NULL OR expiration > ?2)
           ORDER BY rowid DESC",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![digest, now], |r| Ok((r.get(0)?, r.get(1)?)))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    Ok(
      rows
        .into_iter()
        .filter_map(|(claim_id, bytes)| match ArchivedClaim::decode(bytes) {
          Ok(claim) => Some(claim),
          Err(e) => {
            warn!(%claim_id, error = %e, "dropping stored claim that no longer decodes");
            None
          }
        })
        .collect(),
    )
  }
}

impl ClaimStore for SqliteStore {
  async fn put(&self, claim: ArchivedClaim) -> Result<()> {
    let claim_id = claim.claim_id.to_string();
    let digest = encode_digest(&claim.subject_digest);
    let can = claim.value.can().to_owned();
    let expiration = encode_expiration(claim.expiration);
    let recorded_at = encode_dt(Utc::now());
    let bytes = claim.bytes;

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT OR IGNORE INTO claims
             (claim_id, subject_digest, can, expiration, bytes, recorded_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
          rusqlite::params![claim_id, digest, can, expiration, bytes, recorded_at],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}
