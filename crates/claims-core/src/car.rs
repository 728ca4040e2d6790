//! CARv1 archives: a DAG-CBOR header followed by length-prefixed blocks.
//!
//! ```text
//! varint(len(header)) ‖ header ‖ ( varint(len(cid) + len(data)) ‖ cid ‖ data )*
//! ```

use std::io::Cursor;

use cid::Cid;
use multihash_codetable::{Code, MultihashDigest};

use crate::{Error, Result, dagcbor};

/// Multicodec code for CAR archives.
pub const CAR: u64 = 0x0202;

// ─── Varint ──────────────────────────────────────────────────────────────────

/// Number of bytes the unsigned LEB128 encoding of `n` occupies.
pub fn varint_len(n: u64) -> usize {
  let bits = 64 - (n | 1).leading_zeros() as usize;
  bits.div_ceil(7)
}

pub fn write_varint(mut n: u64, out: &mut Vec<u8>) {
  while n >= 0x80 {
    out.push((n as u8 & 0x7f) | 0x80);
    n >>= 7;
  }
  out.push(n as u8);
}

/// Read a varint from the front of `bytes`, returning `(value, consumed)`.
///
/// Returns [`Error::Truncated`] if `bytes` ends inside the varint.
pub fn read_varint(bytes: &[u8]) -> Result<(u64, usize)> {
  let mut value = 0u64;
  for (i, byte) in bytes.iter().enumerate() {
    // The tenth byte may only carry the top bit of a u64.
    if i >= 10 || (i == 9 && *byte > 1) {
      return Err(Error::Decode("varint overflow".into()));
    }
    value |= u64::from(byte & 0x7f) << (7 * i);
    if byte & 0x80 == 0 {
      return Ok((value, i + 1));
    }
  }
  Err(Error::Truncated)
}

// ─── Blocks ──────────────────────────────────────────────────────────────────

/// A content-addressed block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
  pub cid:  Cid,
  pub data: Vec<u8>,
}

impl Block {
  /// Hash `data` with sha2-256 and address it under `codec`.
  pub fn new(codec: u64, data: Vec<u8>) -> Self {
    let cid = Cid::new_v1(codec, Code::Sha2_256.digest(&data));
    Self { cid, data }
  }

  /// Check that the CID's multihash matches the data.
  pub fn verify(&self) -> Result<()> {
    let expected = self.cid.hash();
    let code = Code::try_from(expected.code()).map_err(|_| {
      Error::Decode(format!("unsupported hash code 0x{:x}", expected.code()))
    })?;
    if code.digest(&self.data) != *expected {
      return Err(Error::Decode(format!("block {} does not match its data", self.cid)));
    }
    Ok(())
  }
}

// ─── Writer ──────────────────────────────────────────────────────────────────

pub fn encode_header(roots: &[Cid]) -> Result<Vec<u8>> {
  let header = dagcbor::map([
    ("roots", ciborium::Value::Array(roots.iter().map(dagcbor::link).collect())),
    ("version", dagcbor::uint(1)),
  ]);
  let header = dagcbor::encode(&header)?;
  let mut out = Vec::with_capacity(header.len() + 2);
  write_varint(header.len() as u64, &mut out);
  out.extend(header);
  Ok(out)
}

/// Frame one block as it appears in the data section.
pub fn encode_block(block: &Block) -> Vec<u8> {
  let cid = block.cid.to_bytes();
  let mut out = Vec::with_capacity(cid.len() + block.data.len() + 4);
  write_varint((cid.len() + block.data.len()) as u64, &mut out);
  out.extend(cid);
  out.extend_from_slice(&block.data);
  out
}

/// Encode a complete archive.
pub fn encode<'a>(
  roots: &[Cid],
  blocks: impl IntoIterator<Item = &'a Block>,
) -> Result<Vec<u8>> {
  let mut out = encode_header(roots)?;
  for block in blocks {
    out.extend(encode_block(block));
  }
  Ok(out)
}

// ─── Reader ──────────────────────────────────────────────────────────────────

/// Incremental reader over an in-memory archive.
///
/// Blocks are yielded as they are framed; hashes are not checked here (see
/// [`Block::verify`]).
pub struct CarReader<'a> {
  roots: Vec<Cid>,
  rest:  &'a [u8],
}

impl<'a> CarReader<'a> {
  pub fn new(bytes: &'a [u8]) -> Result<Self> {
    let (len, used) = read_varint(bytes)?;
    let rest = &bytes[used..];
    let len = usize::try_from(len).map_err(|_| Error::Decode("header too large".into()))?;
    if rest.len() < len {
      return Err(Error::Truncated);
    }
    let header = dagcbor::decode(&rest[..len])?;

    let version = dagcbor::get(&header, "version").and_then(dagcbor::as_u64);
    if version != Some(1) {
      return Err(Error::Decode(format!("unsupported CAR version {version:?}")));
    }
    let roots = dagcbor::get(&header, "roots")
      .and_then(dagcbor::as_array)
      .ok_or_else(|| Error::Decode("CAR header has no roots".into()))?
      .iter()
      .map(|v| dagcbor::as_link(v).ok_or_else(|| Error::Decode("CAR root is not a link".into())))
      .collect::<Result<Vec<_>>>()?;

    Ok(Self { roots, rest: &rest[len..] })
  }

  pub fn roots(&self) -> &[Cid] { &self.roots }

  /// Read the next block, or `None` at a clean end of data.
  pub fn next_block(&mut self) -> Result<Option<Block>> {
    if self.rest.is_empty() {
      return Ok(None);
    }
    let (len, used) = read_varint(self.rest)?;
    let len = usize::try_from(len).map_err(|_| Error::Decode("block too large".into()))?;
    let end = used.checked_add(len).ok_or(Error::Truncated)?;
    let frame = self.rest.get(used..end).ok_or(Error::Truncated)?;

    let mut cursor = Cursor::new(frame);
    let cid = Cid::read_bytes(&mut cursor)?;
    let data = frame[cursor.position() as usize..].to_vec();

    self.rest = &self.rest[end..];
    Ok(Some(Block { cid, data }))
  }
}

impl Iterator for CarReader<'_> {
  type Item = Result<Block>;

  fn next(&mut self) -> Option<Self::Item> { self.next_block().transpose() }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn varint_lengths() {
    assert_eq!(varint_len(0), 1);
    assert_eq!(varint_len(127), 1);
    assert_eq!(varint_len(128), 2);
    assert_eq!(varint_len(16_383), 2);
    assert_eq!(varint_len(16_384), 3);

    for n in [0u64, 1, 127, 128, 300, 16_384, u64::MAX] {
      let mut buf = Vec::new();
      write_varint(n, &mut buf);
      assert_eq!(buf.len(), varint_len(n));
      assert_eq!(read_varint(&buf).unwrap(), (n, buf.len()));
    }
  }

  #[test]
  fn truncated_varint() {
    assert!(matches!(read_varint(&[0x80, 0x80]), Err(Error::Truncated)));
  }

  #[test]
  fn overlong_varint_is_rejected() {
    let mut bytes = vec![0xffu8; 9];
    bytes.push(0x02);
    assert!(matches!(read_varint(&bytes), Err(Error::Decode(_))));

    bytes[9] = 0x01;
    assert_eq!(read_varint(&bytes).unwrap(), (u64::MAX, 10));
  }

  #[test]
  fn huge_frame_length_is_truncated() {
    let mut bytes = encode_header(&[]).unwrap();
    bytes.extend([0xff; 9]);
    bytes.push(0x01);
    let mut reader = CarReader::new(&bytes).unwrap();
    assert!(matches!(reader.next_block(), Err(Error::Truncated)));
  }

  #[test]
  fn archive_with_two_blocks() {
    let a = Block::new(0x55, b"alpha".to_vec());
    let b = Block::new(0x55, b"beta".to_vec());
    let bytes = encode(&[a.cid], [&a, &b]).unwrap();

    let mut reader = CarReader::new(&bytes).unwrap();
    assert_eq!(reader.roots(), &[a.cid]);
    let blocks: Vec<Block> = reader.by_ref().collect::<Result<_>>().unwrap();
    assert_eq!(blocks, vec![a, b]);
    for block in &blocks {
      block.verify().unwrap();
    }
  }

  #[test]
  fn frame_offset_matches_varint_arithmetic() {
    // The data of a block sits varint_len(cid + data) + cid bytes after the
    // start of its frame.
    let block = Block::new(0x55, vec![7u8; 200]);
    let frame = encode_block(&block);
    let cid_len = block.cid.to_bytes().len();
    let prefix = varint_len((cid_len + block.data.len()) as u64) + cid_len;
    assert_eq!(&frame[prefix..], block.data.as_slice());
  }

  #[test]
  fn tampered_block_fails_verification() {
    let mut block = Block::new(0x55, b"alpha".to_vec());
    block.data = b"omega".to_vec();
    assert!(matches!(block.verify(), Err(Error::Decode(_))));
  }

  #[test]
  fn cut_inside_a_block_is_truncated() {
    let a = Block::new(0x55, b"alpha".to_vec());
    let bytes = encode(&[], [&a]).unwrap();
    let mut reader = CarReader::new(&bytes[..bytes.len() - 2]).unwrap();
    assert!(matches!(reader.next_block(), Err(Error::Truncated)));
  }
}
