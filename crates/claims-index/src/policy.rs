//! Choosing one location among the candidates the position index returns.
//!
//! Storage has moved between buckets over time and older buckets are less
//! reliable, so candidates are ranked by an ordered rule table. The table is
//! data: deployments can reorder or extend it from configuration.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::position::Position;

pub const DEFAULT_URL_TEMPLATE: &str = "https://{bucket}.s3.amazonaws.com/{key}";

/// Matches candidates in `bucket` whose key starts with `key_prefix`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationRule {
  pub bucket:     String,
  #[serde(default)]
  pub key_prefix: Option<String>,
}

impl LocationRule {
  pub fn new(bucket: impl Into<String>, key_prefix: Option<&str>) -> Self {
    Self { bucket: bucket.into(), key_prefix: key_prefix.map(str::to_owned) }
  }

  pub fn matches(&self, position: &Position) -> bool {
    position.bucket == self.bucket
      && self
        .key_prefix
        .as_deref()
        .is_none_or(|prefix| position.key.starts_with(prefix))
  }
}

/// The current bucket first, then the two legacy generations for blocks
/// stored in raw form.
pub fn default_rules() -> Vec<LocationRule> {
  vec![
    LocationRule::new("carpark-prod-0", None),
    LocationRule::new("dotstorage-prod-1", Some("raw")),
    LocationRule::new("dotstorage-prod-0", Some("raw")),
  ]
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocationPolicy {
  rules:        Vec<LocationRule>,
  url_template: String,
}

impl Default for LocationPolicy {
  fn default() -> Self { Self::new(default_rules(), DEFAULT_URL_TEMPLATE) }
}

impl LocationPolicy {
  pub fn new(rules: Vec<LocationRule>, url_template: impl Into<String>) -> Self {
    Self { rules, url_template: url_template.into() }
  }

  /// The first candidate matched by the earliest rule, or else the first
  /// candidate. `None` only when there are no candidates.
  pub fn select<'a>(&self, candidates: &'a [Position]) -> Option<&'a Position> {
    for (rank, rule) in self.rules.iter().enumerate() {
      if let Some(found) = candidates.iter().find(|p| rule.matches(p)) {
        debug!(rank, bucket = %found.bucket, key = %found.key, "selected location");
        return Some(found);
      }
    }
    let fallback = candidates.first()?;
    debug!(bucket = %fallback.bucket, key = %fallback.key, "no rule matched, using first candidate");
    Some(fallback)
  }

  /// Public URL of `position`'s archive.
  pub fn url(&self, position: &Position) -> claims_core::Result<String> {
    let url = self
      .url_template
      .replace("{region}", &position.region)
      .replace("{bucket}", &position.bucket)
      .replace("{key}", &position.key);
    url::Url::parse(&url)
      .map(String::from)
      .map_err(|e| claims_core::Error::Validation(format!("invalid location url {url:?}: {e}")))
  }
}
