//! Column encodings.
//!
//! Digests are stored as lowercase hex of the full multihash (code, length
//! and digest), so lookups ignore the CID version and codec.

use chrono::{DateTime, Utc};
use claims_core::archive::Multihash;

pub fn encode_digest(digest: &Multihash) -> String { hex::encode(digest.to_bytes()) }

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

/// Expirations beyond the range of SQLite integers are treated as never.
pub fn encode_expiration(expiration: Option<u64>) -> Option<i64> {
  expiration.and_then(|exp| i64::try_from(exp).ok())
}
