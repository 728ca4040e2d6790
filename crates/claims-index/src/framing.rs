//! Offsets within CARv1 data sections.
//!
//! A block is framed as `varint(cid_len + data_len) ‖ cid ‖ data`. The
//! position index records where `data` starts; archive indexes record where
//! the frame starts.

use claims_core::car::varint_len;

/// The frame offset for a block whose data starts at `data_offset`.
///
/// `None` if the recorded offset is too small to have a frame in front of it.
pub fn frame_offset(data_offset: u64, data_len: u64, cid_len: usize) -> Option<u64> {
  let cid_len = cid_len as u64;
  let overhead = varint_len(cid_len.checked_add(data_len)?) as u64 + cid_len;
  data_offset.checked_sub(overhead)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn one_byte_length_prefix() {
    assert_eq!(frame_offset(100, 50, 36), Some(100 - (1 + 36)));
  }

  #[test]
  fn two_byte_length_prefix() {
    assert_eq!(frame_offset(100, 128, 36), Some(100 - (2 + 36)));
    assert_eq!(frame_offset(100, 200, 36), Some(62));
  }

  #[test]
  fn underflow_is_none() {
    assert_eq!(frame_offset(10, 50, 36), None);
    assert_eq!(frame_offset(37, 50, 36), Some(0));
  }
}
