//! Claim types: typed statements about a subject CID.
//!
//! Each variant corresponds to one [`ClaimKind`] and validates its named
//! parameters (`nb`) on decode. Unrecognized kinds are kept as
//! [`UnknownClaim`] so future claim types pass through untouched.

use ciborium::Value;
use cid::Cid;
use serde_json::json;
use strum::EnumString;

use crate::{Error, Result, capability::ClaimKind, dagcbor};

// ─── Location ────────────────────────────────────────────────────────────────

/// A byte range within the resource named by a location.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Range {
  pub offset: u64,
  pub length: Option<u64>,
}

/// The subject can be retrieved from any of `location`, at `range` if given.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocationClaim {
  pub content:  Cid,
  /// Absolute URLs, serialised as strings.
  pub location: Vec<String>,
  pub range:    Option<Range>,
}

// ─── Partition ───────────────────────────────────────────────────────────────

/// The subject's DAG can be rebuilt from the blocks in `parts`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionClaim {
  pub content: Cid,
  /// Digest of the full block list, if known.
  pub blocks:  Option<Cid>,
  pub parts:   Vec<Cid>,
}

// ─── Inclusion ───────────────────────────────────────────────────────────────

/// The subject includes the content identified by `includes`, typically an
/// index over the subject's blocks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InclusionClaim {
  pub content:  Cid,
  pub includes: Cid,
  pub proof:    Option<Cid>,
}

// ─── Relation ────────────────────────────────────────────────────────────────

/// An index covering (part of) a [`RelationPart`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationPartInclusion {
  pub content: Cid,
  /// Archives the index itself can be found in.
  pub parts:   Option<Vec<Cid>>,
}

/// An archive containing the subject, optionally with an index into it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationPart {
  pub content:  Cid,
  pub includes: Option<RelationPartInclusion>,
}

/// The subject links to `children` and its blocks live in `parts`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationClaim {
  pub content:  Cid,
  pub children: Vec<Cid>,
  pub parts:    Vec<RelationPart>,
}

// ─── Equals ──────────────────────────────────────────────────────────────────

/// The subject and `equals` name the same bytes under different addressing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EqualsClaim {
  pub content: Cid,
  pub equals:  Cid,
}

// ─── Unknown ─────────────────────────────────────────────────────────────────

/// A claim of a kind this crate does not know. `nb` is preserved verbatim.
#[derive(Debug, Clone, PartialEq)]
pub struct UnknownClaim {
  pub can:     String,
  pub content: Cid,
  pub nb:      Value,
}

// ─── Claim ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum Claim {
  Location(LocationClaim),
  Partition(PartitionClaim),
  Inclusion(InclusionClaim),
  Relation(RelationClaim),
  Equals(EqualsClaim),
  Unknown(UnknownClaim),
}

/// Which links a read-path traversal follows from a claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum Walk {
  Parts,
  Includes,
  Children,
}

impl Claim {
  /// `None` for [`Claim::Unknown`].
  pub fn kind(&self) -> Option<ClaimKind> {
    match self {
      Self::Location(_) => Some(ClaimKind::Location),
      Self::Partition(_) => Some(ClaimKind::Partition),
      Self::Inclusion(_) => Some(ClaimKind::Inclusion),
      Self::Relation(_) => Some(ClaimKind::Relation),
      Self::Equals(_) => Some(ClaimKind::Equals),
      Self::Unknown(_) => None,
    }
  }

  pub fn can(&self) -> &str {
    match self {
      Self::Unknown(u) => &u.can,
      other => other.kind().map(ClaimKind::can).unwrap_or_default(),
    }
  }

  /// The subject of the claim.
  pub fn content(&self) -> Cid {
    match self {
      Self::Location(c) => c.content,
      Self::Partition(c) => c.content,
      Self::Inclusion(c) => c.content,
      Self::Relation(c) => c.content,
      Self::Equals(c) => c.content,
      Self::Unknown(c) => c.content,
    }
  }

  /// Links to follow for `walk`.
  pub fn links(&self, walk: Walk) -> Vec<Cid> {
    match (self, walk) {
      (Self::Partition(c), Walk::Parts) => c.parts.clone(),
      (Self::Relation(c), Walk::Parts) => {
        c.parts.iter().map(|p| p.content).collect()
      }
      (Self::Inclusion(c), Walk::Includes) => vec![c.includes],
      (Self::Relation(c), Walk::Includes) => c
        .parts
        .iter()
        .filter_map(|p| p.includes.as_ref())
        .flat_map(|inc| {
          std::iter::once(inc.content).chain(inc.parts.iter().flatten().copied())
        })
        .collect(),
      (Self::Relation(c), Walk::Children) => c.children.clone(),
      _ => Vec::new(),
    }
  }

  // ── Wire form ───────────────────────────────────────────────────────────

  /// The canonical named-parameter map.
  pub fn to_nb(&self) -> Value {
    match self {
      Self::Location(c) => {
        let mut entries = vec![
          ("content", dagcbor::link(&c.content)),
          (
            "location",
            Value::Array(c.location.iter().cloned().map(Value::Text).collect()),
          ),
        ];
        if let Some(range) = c.range {
          let mut r = vec![("offset", dagcbor::uint(range.offset))];
          if let Some(length) = range.length {
            r.push(("length", dagcbor::uint(length)));
          }
          entries.push(("range", dagcbor::map(r)));
        }
        dagcbor::map(entries)
      }
      Self::Partition(c) => {
        let mut entries = vec![
          ("content", dagcbor::link(&c.content)),
          ("parts", links(&c.parts)),
        ];
        if let Some(blocks) = &c.blocks {
          entries.push(("blocks", dagcbor::link(blocks)));
        }
        dagcbor::map(entries)
      }
      Self::Inclusion(c) => {
        let mut entries = vec![
          ("content", dagcbor::link(&c.content)),
          ("includes", dagcbor::link(&c.includes)),
        ];
        if let Some(proof) = &c.proof {
          entries.push(("proof", dagcbor::link(proof)));
        }
        dagcbor::map(entries)
      }
      Self::Relation(c) => dagcbor::map([
        ("content", dagcbor::link(&c.content)),
        ("children", links(&c.children)),
        (
          "parts",
          Value::Array(c.parts.iter().map(relation_part_to_value).collect()),
        ),
      ]),
      Self::Equals(c) => dagcbor::map([
        ("content", dagcbor::link(&c.content)),
        ("equals", dagcbor::link(&c.equals)),
      ]),
      Self::Unknown(c) => c.nb.clone(),
    }
  }

  /// Validate `nb` against the schema for `can`.
  pub fn from_nb(can: &str, nb: &Value) -> Result<Self> {
    if !matches!(nb, Value::Map(_)) {
      return Err(Error::Validation(format!("{can}: `nb` must be a map")));
    }
    let content = required_link(can, nb, "content")?;

    let Some(kind) = ClaimKind::parse(can) else {
      return Ok(Self::Unknown(UnknownClaim {
        can: can.to_owned(),
        content,
        nb: nb.clone(),
      }));
    };

    Ok(match kind {
      ClaimKind::Location => Self::Location(LocationClaim {
        content,
        location: location_list(can, nb)?,
        range: dagcbor::get(nb, "range")
          .filter(|v| !matches!(v, Value::Null))
          .map(|v| parse_range(can, v))
          .transpose()?,
      }),
      ClaimKind::Partition => Self::Partition(PartitionClaim {
        content,
        blocks: optional_link(can, nb, "blocks")?,
        parts: link_list(can, nb, "parts")?,
      }),
      ClaimKind::Inclusion => Self::Inclusion(InclusionClaim {
        content,
        includes: required_link(can, nb, "includes")?,
        proof: optional_link(can, nb, "proof")?,
      }),
      ClaimKind::Relation => Self::Relation(RelationClaim {
        content,
        children: link_list(can, nb, "children")?,
        parts: dagcbor::get(nb, "parts")
          .and_then(dagcbor::as_array)
          .ok_or_else(|| invalid(can, "parts", "an array"))?
          .iter()
          .map(|p| parse_relation_part(can, p))
          .collect::<Result<_>>()?,
      }),
      ClaimKind::Equals => Self::Equals(EqualsClaim {
        content,
        equals: required_link(can, nb, "equals")?,
      }),
    })
  }

  /// A JSON rendering with CIDs as strings, for display.
  pub fn to_json(&self) -> serde_json::Value {
    match self {
      Self::Location(c) => json!({
        "type": self.can(),
        "content": c.content.to_string(),
        "location": c.location,
        "range": c.range.map(|r| json!({ "offset": r.offset, "length": r.length })),
      }),
      Self::Partition(c) => json!({
        "type": self.can(),
        "content": c.content.to_string(),
        "blocks": c.blocks.map(|b| b.to_string()),
        "parts": strings(&c.parts),
      }),
      Self::Inclusion(c) => json!({
        "type": self.can(),
        "content": c.content.to_string(),
        "includes": c.includes.to_string(),
        "proof": c.proof.map(|p| p.to_string()),
      }),
      Self::Relation(c) => json!({
        "type": self.can(),
        "content": c.content.to_string(),
        "children": strings(&c.children),
        "parts": c.parts.iter().map(|p| json!({
          "content": p.content.to_string(),
          "includes": p.includes.as_ref().map(|inc| json!({
            "content": inc.content.to_string(),
            "parts": inc.parts.as_deref().map(strings),
          })),
        })).collect::<Vec<_>>(),
      }),
      Self::Equals(c) => json!({
        "type": self.can(),
        "content": c.content.to_string(),
        "equals": c.equals.to_string(),
      }),
      Self::Unknown(c) => json!({
        "type": c.can,
        "content": c.content.to_string(),
      }),
    }
  }
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

fn links(cids: &[Cid]) -> Value { Value::Array(cids.iter().map(dagcbor::link).collect()) }

fn strings(cids: &[Cid]) -> Vec<String> { cids.iter().map(Cid::to_string).collect() }

fn relation_part_to_value(part: &RelationPart) -> Value {
  let mut entries = vec![("content", dagcbor::link(&part.content))];
  if let Some(inc) = &part.includes {
    let mut inc_entries = vec![("content", dagcbor::link(&inc.content))];
    if let Some(parts) = &inc.parts {
      inc_entries.push(("parts", links(parts)));
    }
    entries.push(("includes", dagcbor::map(inc_entries)));
  }
  dagcbor::map(entries)
}

fn invalid(can: &str, field: &str, expected: &str) -> Error {
  Error::Validation(format!("{can}: `{field}` must be {expected}"))
}

fn required_link(can: &str, nb: &Value, field: &str) -> Result<Cid> {
  dagcbor::get(nb, field)
    .and_then(dagcbor::as_link)
    .ok_or_else(|| invalid(can, field, "a link"))
}

fn optional_link(can: &str, nb: &Value, field: &str) -> Result<Option<Cid>> {
  match dagcbor::get(nb, field) {
    None | Some(Value::Null) => Ok(None),
    Some(v) => dagcbor::as_link(v)
      .map(Some)
      .ok_or_else(|| invalid(can, field, "a link")),
  }
}

fn link_list(can: &str, nb: &Value, field: &str) -> Result<Vec<Cid>> {
  dagcbor::get(nb, field)
    .and_then(dagcbor::as_array)
    .ok_or_else(|| invalid(can, field, "an array of links"))?
    .iter()
    .map(|v| dagcbor::as_link(v).ok_or_else(|| invalid(can, field, "an array of links")))
    .collect()
}

fn location_list(can: &str, nb: &Value) -> Result<Vec<String>> {
  let items = dagcbor::get(nb, "location")
    .and_then(dagcbor::as_array)
    .filter(|items| !items.is_empty())
    .ok_or_else(|| invalid(can, "location", "a non-empty array of URLs"))?;

  items
    .iter()
    .map(|v| {
      let s = dagcbor::as_text(v)
        .ok_or_else(|| invalid(can, "location", "a non-empty array of URLs"))?;
      url::Url::parse(s)
        .map_err(|e| Error::Validation(format!("{can}: invalid location {s:?}: {e}")))?;
      Ok::<_, Error>(s.to_owned())
    })
    .collect()
}

fn parse_range(can: &str, value: &Value) -> Result<Range> {
  let offset = dagcbor::get(value, "offset")
    .and_then(dagcbor::as_u64)
    .ok_or_else(|| invalid(can, "range.offset", "an unsigned integer"))?;
  let length = match dagcbor::get(value, "length") {
    None | Some(Value::Null) => None,
    Some(v) => Some(
      dagcbor::as_u64(v)
        .ok_or_else(|| invalid(can, "range.length", "an unsigned integer"))?,
    ),
  };
  Ok(Range { offset, length })
}

fn parse_relation_part(can: &str, value: &Value) -> Result<RelationPart> {
  let content = required_link(can, value, "content")?;
  let includes = match dagcbor::get(value, "includes") {
    None | Some(Value::Null) => None,
    Some(inc) => Some(RelationPartInclusion {
      content: required_link(can, inc, "content")?,
      parts:   match dagcbor::get(inc, "parts") {
        None | Some(Value::Null) => None,
        Some(_) => Some(link_list(can, inc, "parts")?),
      },
    }),
  };
  Ok(RelationPart { content, includes })
}

#[cfg(test)]
mod tests {
  use multihash_codetable::{Code, MultihashDigest};

  use super::*;

  fn cid(seed: &[u8]) -> Cid { Cid::new_v1(0x55, Code::Sha2_256.digest(seed)) }

  fn reparse(claim: &Claim) -> Result<Claim> {
    let bytes = dagcbor::encode(&claim.to_nb())?;
    Claim::from_nb(claim.can(), &dagcbor::decode(&bytes)?)
  }

  #[test]
  fn relation_claim_survives_encoding() {
    let claim = Claim::Relation(RelationClaim {
      content:  cid(b"root"),
      children: vec![cid(b"child")],
      parts:    vec![RelationPart {
        content:  cid(b"part"),
        includes: Some(RelationPartInclusion {
          content: cid(b"index"),
          parts:   Some(vec![cid(b"index-part")]),
        }),
      }],
    });
    assert_eq!(reparse(&claim).unwrap(), claim);
  }

  #[test]
  fn location_without_length() {
    let claim = Claim::Location(LocationClaim {
      content:  cid(b"x"),
      location: vec!["https://example.com/x.car".into()],
      range:    Some(Range { offset: 12, length: None }),
    });
    assert_eq!(reparse(&claim).unwrap(), claim);
  }

  #[test]
  fn equals_without_equals_is_rejected() {
    let nb = dagcbor::map([("content", dagcbor::link(&cid(b"x")))]);
    let err = Claim::from_nb("assert/equals", &nb).unwrap_err();
    assert!(matches!(err, Error::Validation(msg) if msg.contains("equals")));
  }

  #[test]
  fn equals_with_text_instead_of_link_is_rejected() {
    let nb = dagcbor::map([
      ("content", dagcbor::link(&cid(b"x"))),
      ("equals", dagcbor::text(cid(b"y").to_string())),
    ]);
    assert!(matches!(
      Claim::from_nb("assert/equals", &nb),
      Err(Error::Validation(_))
    ));
  }

  #[test]
  fn location_must_be_urls() {
    let nb = dagcbor::map([
      ("content", dagcbor::link(&cid(b"x"))),
      ("location", Value::Array(vec![dagcbor::text("not a url")])),
    ]);
    assert!(matches!(
      Claim::from_nb("assert/location", &nb),
      Err(Error::Validation(_))
    ));

    let empty = dagcbor::map([
      ("content", dagcbor::link(&cid(b"x"))),
      ("location", Value::Array(vec![])),
    ]);
    assert!(Claim::from_nb("assert/location", &empty).is_err());
  }

  #[test]
  fn unknown_kind_is_preserved() {
    let nb = dagcbor::map([
      ("content", dagcbor::link(&cid(b"x"))),
      ("index", dagcbor::link(&cid(b"idx"))),
    ]);
    let claim = Claim::from_nb("assert/index", &nb).unwrap();
    assert_eq!(claim.kind(), None);
    assert_eq!(claim.can(), "assert/index");
    assert_eq!(claim.content(), cid(b"x"));
    assert_eq!(claim.to_nb(), nb);
  }

  #[test]
  fn walk_links() {
    let claim = Claim::Relation(RelationClaim {
      content:  cid(b"root"),
      children: vec![cid(b"child")],
      parts:    vec![RelationPart {
        content:  cid(b"part"),
        includes: Some(RelationPartInclusion { content: cid(b"index"), parts: None }),
      }],
    });
    assert_eq!(claim.links(Walk::Children), vec![cid(b"child")]);
    assert_eq!(claim.links(Walk::Parts), vec![cid(b"part")]);
    assert_eq!(claim.links(Walk::Includes), vec![cid(b"index")]);
    assert_eq!("includes".parse::<Walk>().unwrap(), Walk::Includes);
  }
}
