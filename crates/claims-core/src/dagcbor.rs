//! The canonical DAG-CBOR subset used for invocations, CAR headers and claim
//! parameters.
//!
//! Values are plain [`ciborium::Value`] trees. Encoding sorts map keys
//! length-first then bytewise, and links are CBOR tag 42 over the CID bytes
//! with a leading zero byte. Floats are never produced.

use ciborium::value::{Integer, Value};
use cid::Cid;

use crate::{Error, Result};

/// Multicodec code for DAG-CBOR blocks.
pub const DAG_CBOR: u64 = 0x71;

const CID_TAG: u64 = 42;

// ─── Encode / decode ─────────────────────────────────────────────────────────

/// Encode `value` canonically.
pub fn encode(value: &Value) -> Result<Vec<u8>> {
  let mut buf = Vec::new();
  ciborium::into_writer(&canonicalize(value.clone()), &mut buf)
    .map_err(|e| Error::Archive(format!("cbor encode: {e}")))?;
  Ok(buf)
}

/// Decode exactly one value from `bytes`; trailing data is rejected.
pub fn decode(bytes: &[u8]) -> Result<Value> {
  let mut rest = bytes;
  let value: Value = ciborium::from_reader(&mut rest)
    .map_err(|e| Error::Decode(format!("cbor decode: {e}")))?;
  if !rest.is_empty() {
    return Err(Error::Decode(format!(
      "{} trailing bytes after cbor value",
      rest.len()
    )));
  }
  Ok(value)
}

fn canonicalize(value: Value) -> Value {
  match value {
    Value::Map(entries) => {
      let mut entries: Vec<(Value, Value)> = entries
        .into_iter()
        .map(|(k, v)| (k, canonicalize(v)))
        .collect();
      entries.sort_by(|(a, _), (b, _)| key_order(a, b));
      Value::Map(entries)
    }
    Value::Array(items) => {
      Value::Array(items.into_iter().map(canonicalize).collect())
    }
    Value::Tag(tag, inner) => Value::Tag(tag, Box::new(canonicalize(*inner))),
    other => other,
  }
}

fn key_order(a: &Value, b: &Value) -> std::cmp::Ordering {
  match (a, b) {
    (Value::Text(a), Value::Text(b)) => {
      a.len().cmp(&b.len()).then_with(|| a.as_bytes().cmp(b.as_bytes()))
    }
    _ => std::cmp::Ordering::Equal,
  }
}

// ─── Builders ────────────────────────────────────────────────────────────────

pub fn link(cid: &Cid) -> Value {
  let mut bytes = vec![0u8];
  bytes.extend(cid.to_bytes());
  Value::Tag(CID_TAG, Box::new(Value::Bytes(bytes)))
}

pub fn text(s: impl Into<String>) -> Value { Value::Text(s.into()) }

pub fn uint(n: u64) -> Value { Value::Integer(Integer::from(n)) }

/// Build a map from string keys. Order does not matter; [`encode`] sorts.
pub fn map<'a>(entries: impl IntoIterator<Item = (&'a str, Value)>) -> Value {
  Value::Map(entries.into_iter().map(|(k, v)| (text(k), v)).collect())
}

// ─── Accessors ───────────────────────────────────────────────────────────────

/// Look up `key` in a map value. Returns `None` for non-maps.
pub fn get<'a>(value: &'a Value, key: &str) -> Option<&'a Value> {
  match value {
    Value::Map(entries) => entries
      .iter()
      .find(|(k, _)| matches!(k, Value::Text(t) if t == key))
      .map(|(_, v)| v),
    _ => None,
  }
}

pub fn as_link(value: &Value) -> Option<Cid> {
  match value {
    Value::Tag(CID_TAG, inner) => match inner.as_ref() {
      Value::Bytes(bytes) if bytes.first() == Some(&0) => {
        Cid::try_from(&bytes[1..]).ok()
      }
      _ => None,
    },
    _ => None,
  }
}

pub fn as_u64(value: &Value) -> Option<u64> {
  match value {
    Value::Integer(i) => u64::try_from(*i).ok(),
    _ => None,
  }
}

pub fn as_text(value: &Value) -> Option<&str> {
  match value {
    Value::Text(s) => Some(s),
    _ => None,
  }
}

pub fn as_array(value: &Value) -> Option<&[Value]> {
  match value {
    Value::Array(items) => Some(items),
    _ => None,
  }
}

#[cfg(test)]
mod tests {
  use multihash_codetable::{Code, MultihashDigest};

  use super::*;

  #[test]
  fn map_keys_are_sorted_length_first() {
    let value = map([("version", uint(1)), ("roots", Value::Array(vec![]))]);
    let bytes = encode(&value).unwrap();
    // a2 (map of 2), 65 "roots", 80 (empty array), 67 "version", 01
    assert_eq!(bytes[0], 0xa2);
    assert_eq!(&bytes[1..7], b"\x65roots");
    assert_eq!(&bytes[8..16], b"\x67version");
  }

  #[test]
  fn links_survive_encoding() {
    let cid = Cid::new_v1(0x55, Code::Sha2_256.digest(b"hello"));
    let bytes = encode(&map([("content", link(&cid))])).unwrap();
    let decoded = decode(&bytes).unwrap();
    let content = get(&decoded, "content").and_then(as_link);
    assert_eq!(content, Some(cid));
  }

  #[test]
  fn trailing_bytes_are_rejected() {
    let mut bytes = encode(&uint(7)).unwrap();
    bytes.push(0x00);
    assert!(matches!(decode(&bytes), Err(Error::Decode(_))));
  }
}
