//! Capability names and the `{can, with, nb}` envelope a claim travels in.

use ciborium::Value;
use strum::{EnumIter, EnumString, IntoStaticStr};

use crate::{Error, Result, claim::Claim, dagcbor};

/// The recognized claim kinds. The serialised form is the `can` string, which
/// is part of the wire contract.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, IntoStaticStr, EnumIter,
)]
pub enum ClaimKind {
  #[strum(serialize = "assert/location")]
  Location,
  #[strum(serialize = "assert/partition")]
  Partition,
  #[strum(serialize = "assert/inclusion")]
  Inclusion,
  #[strum(serialize = "assert/relation")]
  Relation,
  #[strum(serialize = "assert/equals")]
  Equals,
}

impl ClaimKind {
  pub fn can(self) -> &'static str { self.into() }

  /// Parse a `can` string; unrecognized names yield `None`.
  pub fn parse(can: &str) -> Option<Self> { can.parse().ok() }
}

impl std::fmt::Display for ClaimKind {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.can())
  }
}

/// A single capability: the resource it is exercised `with` and the typed
/// claim carried as named parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Capability {
  pub with: String,
  pub nb:   Claim,
}

impl Capability {
  pub fn can(&self) -> &str { self.nb.can() }

  pub fn to_value(&self) -> Value {
    dagcbor::map([
      ("can", dagcbor::text(self.can())),
      ("with", dagcbor::text(self.with.clone())),
      ("nb", self.nb.to_nb()),
    ])
  }

  pub fn from_value(value: &Value) -> Result<Self> {
    let can = dagcbor::get(value, "can")
      .and_then(dagcbor::as_text)
      .ok_or_else(|| Error::Validation("capability is missing `can`".into()))?;
    let with = dagcbor::get(value, "with")
      .and_then(dagcbor::as_text)
      .ok_or_else(|| Error::Validation("capability is missing `with`".into()))?;
    let nb = dagcbor::get(value, "nb")
      .ok_or_else(|| Error::Validation(format!("{can} is missing `nb`")))?;

    Ok(Self { with: with.to_owned(), nb: Claim::from_nb(can, nb)? })
  }
}

#[cfg(test)]
mod tests {
  use strum::IntoEnumIterator as _;

  use super::*;

  #[test]
  fn can_strings_round_trip() {
    for kind in ClaimKind::iter() {
      assert_eq!(ClaimKind::parse(kind.can()), Some(kind));
    }
    assert_eq!(ClaimKind::Equals.to_string(), "assert/equals");
  }

  #[test]
  fn unknown_can_is_none() {
    assert_eq!(ClaimKind::parse("assert/index"), None);
    assert_eq!(ClaimKind::parse("location"), None);
  }
}
