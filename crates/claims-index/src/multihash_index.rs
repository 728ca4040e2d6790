//! `MultihashIndexSorted`, the CARv2 index format mapping block multihashes to
//! frame offsets within an archive.
//!
//! ```text
//! varint(0x0401)
//! i32 code count
//!   u64 hash code
//!   i32 width count
//!     u32 width            (digest length + 8)
//!     i64 byte length
//!     ( digest ‖ u64 offset )*   sorted by digest
//! ```
//!
//! Integers are little-endian. Codes and widths are written in ascending order.

use std::collections::BTreeMap;

use claims_core::{
  Error, Result,
  archive::Multihash,
  car::{Block, read_varint, write_varint},
};

/// Multicodec code for this index format.
pub const MULTIHASH_INDEX_SORTED: u64 = 0x0401;

const OFFSET_LEN: usize = 8;

/// Digest → offset, grouped by hash code then digest width.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MultihashIndexSorted {
  codes: BTreeMap<u64, BTreeMap<u32, BTreeMap<Vec<u8>, u64>>>,
}

impl MultihashIndexSorted {
  pub fn new() -> Self { Self::default() }

  pub fn insert(&mut self, digest: &Multihash, offset: u64) {
    let width = (digest.digest().len() + OFFSET_LEN) as u32;
    self
      .codes
      .entry(digest.code())
      .or_default()
      .entry(width)
      .or_default()
      .insert(digest.digest().to_vec(), offset);
  }

  pub fn get(&self, digest: &Multihash) -> Option<u64> {
    let width = (digest.digest().len() + OFFSET_LEN) as u32;
    self.codes.get(&digest.code())?.get(&width)?.get(digest.digest()).copied()
  }

  pub fn len(&self) -> usize {
    self.codes.values().flat_map(BTreeMap::values).map(BTreeMap::len).sum()
  }

  pub fn is_empty(&self) -> bool { self.len() == 0 }

  pub fn encode(&self) -> Vec<u8> {
    let mut out = Vec::new();
    write_varint(MULTIHASH_INDEX_SORTED, &mut out);
    out.extend((self.codes.len() as i32).to_le_bytes());
    for (code, widths) in &self.codes {
      out.extend(code.to_le_bytes());
      out.extend((widths.len() as i32).to_le_bytes());
      for (width, entries) in widths {
        out.extend(width.to_le_bytes());
        out.extend(((entries.len() * *width as usize) as i64).to_le_bytes());
        for (digest, offset) in entries {
          out.extend_from_slice(digest);
          out.extend(offset.to_le_bytes());
        }
      }
    }
    out
  }

  /// The encoded index as a block addressed under its own codec.
  pub fn to_block(&self) -> Block { Block::new(MULTIHASH_INDEX_SORTED, self.encode()) }

  pub fn decode(bytes: &[u8]) -> Result<Self> {
    let (codec, used) = read_varint(bytes)?;
    if codec != MULTIHASH_INDEX_SORTED {
      return Err(Error::Decode(format!("not a sorted multihash index: codec 0x{codec:x}")));
    }
    let mut reader = Reader { rest: &bytes[used..] };
    let mut index = Self::new();

    for _ in 0..reader.count()? {
      let code = u64::from_le_bytes(reader.array()?);
      let widths = index.codes.entry(code).or_default();
      for _ in 0..reader.count()? {
        let width = u32::from_le_bytes(reader.array()?);
        let len = i64::from_le_bytes(reader.array()?);
        let len = usize::try_from(len)
          .map_err(|_| Error::Decode(format!("negative index length {len}")))?;
        let digest_len = (width as usize)
          .checked_sub(OFFSET_LEN)
          .filter(|&n| n > 0 && len % width as usize == 0)
          .ok_or_else(|| Error::Decode(format!("bad index width {width} for {len} bytes")))?;

        let entries = widths.entry(width).or_default();
        for entry in reader.take(len)?.chunks_exact(width as usize) {
          let (digest, offset) = entry.split_at(digest_len);
          let offset = u64::from_le_bytes(offset.try_into().map_err(|_| Error::Truncated)?);
          entries.insert(digest.to_vec(), offset);
        }
      }
    }

    if !reader.rest.is_empty() {
      return Err(Error::Decode("trailing bytes after index".into()));
    }
    Ok(index)
  }
}

struct Reader<'a> {
  rest: &'a [u8],
}

impl<'a> Reader<'a> {
  fn take(&mut self, n: usize) -> Result<&'a [u8]> {
    if self.rest.len() < n {
      return Err(Error::Truncated);
    }
    let (head, tail) = self.rest.split_at(n);
    self.rest = tail;
    Ok(head)
  }

  fn array<const N: usize>(&mut self) -> Result<[u8; N]> {
    self.take(N)?.try_into().map_err(|_| Error::Truncated)
  }

  fn count(&mut self) -> Result<usize> {
    let n = i32::from_le_bytes(self.array()?);
    usize::try_from(n).map_err(|_| Error::Decode(format!("negative count {n}")))
  }
}
