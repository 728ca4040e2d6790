//! Claims derived on demand from the position index.
//!
//! For a block the index knows about, the fetcher signs a location claim for
//! the chosen archive byte range and, when the archive's CID can be recovered
//! from its key, a relation claim pointing at a one-entry index of the block
//! within that archive. Derived claims are never stored; they are rebuilt on
//! every lookup with a short expiration.

use std::time::Duration;

use chrono::Utc;
use claims_core::{
  ArchivedClaim, ClaimBuilder, ClaimSource, Result, Signer,
  claim::{Claim, LocationClaim, Range, RelationClaim, RelationPart, RelationPartInclusion},
};
use cid::Cid;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::{
  framing::frame_offset,
  multihash_index::MultihashIndexSorted,
  part::part_cid,
  policy::{self, LocationPolicy, LocationRule},
  position::{Position, PositionIndex},
  retry::RetryPolicy,
};

// ─── Configuration ───────────────────────────────────────────────────────────

/// The `[position_index]` configuration section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
  /// Base URL of the position index service.
  pub endpoint:     String,
  /// Maximum number of records to request per block.
  pub limit:        usize,
  /// Lifetime of derived claims.
  pub ttl_secs:     u64,
  pub url_template: String,
  pub retry:        RetryPolicy,
  /// Location preference, earliest first.
  pub rules:        Vec<LocationRule>,
}

impl Default for IndexConfig {
  fn default() -> Self {
    Self {
      endpoint:     String::new(),
      limit:        10,
      ttl_secs:     3_600,
      url_template: policy::DEFAULT_URL_TEMPLATE.to_owned(),
      retry:        RetryPolicy::default(),
      rules:        policy::default_rules(),
    }
  }
}

impl IndexConfig {
  pub fn location_policy(&self) -> LocationPolicy {
    LocationPolicy::new(self.rules.clone(), self.url_template.clone())
  }
}

// ─── Fetcher ─────────────────────────────────────────────────────────────────

pub struct BlockIndexClaimFetcher<I, S> {
  index:   I,
  builder: ClaimBuilder<S>,
  policy:  LocationPolicy,
  retry:   RetryPolicy,
  limit:   usize,
  ttl:     Duration,
}

impl<I: PositionIndex, S: Signer> BlockIndexClaimFetcher<I, S> {
  /// Derived claims are signed by `signer` and addressed to it.
  pub fn new(index: I, signer: S, config: &IndexConfig) -> Self {
    Self {
      index,
      builder: ClaimBuilder::new(signer),
      policy: config.location_policy(),
      retry: config.retry.clone(),
      limit: config.limit,
      ttl: Duration::from_secs(config.ttl_secs),
    }
  }

  /// `now + ttl`, rounded up to whole seconds.
  fn expiration(&self) -> u64 {
    let now_ms = u64::try_from(Utc::now().timestamp_millis()).unwrap_or_default();
    let ttl_ms = u64::try_from(self.ttl.as_millis()).unwrap_or(u64::MAX);
    now_ms.saturating_add(ttl_ms).div_ceil(1_000)
  }

  async fn candidates(&self, content: &Cid) -> Result<Vec<Position>> {
    let digest = *content.hash();
    let records = self.retry.run(|| self.index.find(digest, self.limit)).await?;
    Ok(
      records
        .into_iter()
        .filter_map(|raw| {
          let position = raw.normalize();
          if position.is_none() {
            warn!(carpath = %raw.carpath, "dropping malformed position record");
          }
          position
        })
        .collect(),
    )
  }

  fn location_claim(
    &self,
    content: Cid,
    position: &Position,
    expiration: u64,
  ) -> Result<ArchivedClaim> {
    let claim = Claim::Location(LocationClaim {
      content,
      location: vec![self.policy.url(position)?],
      range: Some(Range { offset: position.offset, length: Some(position.length) }),
    });
    self.builder.build(claim, Some(expiration), vec![])
  }

  /// `None` when the archive CID cannot be recovered from the key or the
  /// recorded offset leaves no room for a frame.
  fn relation_claim(
    &self,
    content: Cid,
    position: &Position,
    expiration: u64,
  ) -> Option<Result<ArchivedClaim>> {
    let Some(part) = part_cid(&position.key) else {
      debug!(key = %position.key, "no archive CID in key, skipping relation claim");
      return None;
    };
    let cid_len = content.to_bytes().len();
    let Some(offset) = frame_offset(position.offset, position.length, cid_len) else {
      warn!(
        %content,
        offset = position.offset,
        length = position.length,
        "offset is smaller than the block frame, skipping relation claim"
      );
      return None;
    };

    let mut index = MultihashIndexSorted::new();
    index.insert(content.hash(), offset);
    let index = index.to_block();

    let claim = Claim::Relation(RelationClaim {
      content,
      children: vec![],
      parts: vec![RelationPart {
        content:  part,
        includes: Some(RelationPartInclusion { content: index.cid, parts: None }),
      }],
    });
    Some(self.builder.build(claim, Some(expiration), vec![index]))
  }
}

impl<I: PositionIndex, S: Signer> ClaimSource for BlockIndexClaimFetcher<I, S> {
  type Error = claims_core::Error;

  async fn get(&self, content: Cid) -> Result<Vec<ArchivedClaim>> {
    let candidates = self.candidates(&content).await?;
    let Some(position) = self.policy.select(&candidates) else {
      return Ok(Vec::new());
    };
    let expiration = self.expiration();

    let derived = [
      Some(self.location_claim(content, position, expiration)),
      self.relation_claim(content, position, expiration),
    ];

    let mut claims = Vec::with_capacity(2);
    for result in derived.into_iter().flatten() {
      match result {
        Ok(claim) => claims.push(claim),
        Err(e) => warn!(%content, error = %e, "dropping derived claim"),
      }
    }
    Ok(claims)
  }
}
