//! Position index records and the trait for querying them.

use std::future::Future;

use claims_core::archive::Multihash;
use serde::{Deserialize, Serialize};

/// A record as the position index returns it. `carpath` is
/// `region/bucket/key`, where the key may itself contain `/`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawPosition {
  pub carpath: String,
  pub offset:  u64,
  pub length:  u64,
}

/// One physical location candidate for a block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Position {
  pub region: String,
  pub bucket: String,
  pub key:    String,
  pub offset: u64,
  pub length: u64,
}

impl RawPosition {
  /// Split `carpath` into its parts. `None` if any of the three is missing.
  pub fn normalize(&self) -> Option<Position> {
    let mut segments = self.carpath.splitn(3, '/');
    let region = segments.next().filter(|s| !s.is_empty())?;
    let bucket = segments.next().filter(|s| !s.is_empty())?;
    let key = segments.next().filter(|s| !s.is_empty())?;
    Some(Position {
      region: region.to_owned(),
      bucket: bucket.to_owned(),
      key:    key.to_owned(),
      offset: self.offset,
      length: self.length,
    })
  }
}

/// Query interface of the external position index.
pub trait PositionIndex: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Up to `limit` records for the block with multihash `digest`.
  fn find(
    &self,
    digest: Multihash,
    limit: usize,
  ) -> impl Future<Output = Result<Vec<RawPosition>, Self::Error>> + Send + '_;
}
