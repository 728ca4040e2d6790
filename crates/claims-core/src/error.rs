//! Error types for `claims-core`.
//!
//! The variants double as the service-wide taxonomy: higher crates wrap this
//! type and the API layer maps each variant to a transport status.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// Malformed or missing named parameters. Raised before any I/O.
  #[error("validation error: {0}")]
  Validation(String),

  /// The invocation failed the authorization policy.
  #[error("unauthorized: {0}")]
  Authorization(String),

  /// The position index could not be queried after all retries.
  #[error("position index query failed after {attempts} attempts: {source}")]
  Resolution {
    attempts: u32,
    #[source]
    source:   Box<dyn std::error::Error + Send + Sync>,
  },

  /// A claim could not be encoded into an archive.
  #[error("archive error: {0}")]
  Archive(String),

  /// An archived claim failed to decode or verify.
  #[error("decode error: {0}")]
  Decode(String),

  /// Input ended in the middle of a frame.
  #[error("unexpected end of data")]
  Truncated,

  #[error("invalid CID: {0}")]
  Cid(#[from] cid::Error),
}

impl Error {
  /// `true` for failures that are safe to retry as a whole request.
  pub fn is_transient(&self) -> bool { matches!(self, Self::Resolution { .. }) }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
