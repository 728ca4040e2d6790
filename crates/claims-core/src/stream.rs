//! The read-path response: a root-less CAR whose blocks are claim archives.
//!
//! Each block is keyed by `CIDv1(car, sha2-256(archive))`. The stream is
//! produced incrementally, so the encoder exposes the header and per-claim
//! frames separately.

use tracing::warn;

use crate::{
  Error, Result,
  archive::ArchivedClaim,
  car::{self, Block, CarReader},
};

/// The header that opens every response.
pub fn header() -> Result<Vec<u8>> { car::encode_header(&[]) }

/// One claim as a framed response block.
pub fn frame(claim: &ArchivedClaim) -> Vec<u8> {
  car::encode_block(&Block::new(car::CAR, claim.bytes.clone()))
}

/// Encode a complete response.
pub fn encode<'a>(claims: impl IntoIterator<Item = &'a ArchivedClaim>) -> Result<Vec<u8>> {
  let mut out = header()?;
  for claim in claims {
    out.extend(frame(claim));
  }
  Ok(out)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
  /// Nothing decoded yet.
  Empty,
  /// `n` claims produced.
  Reading(usize),
  Done,
}

/// Decode a response.
///
/// Input that ends before the first frame is an empty answer. Any other
/// framing problem is an error. Blocks that do not hash to their CID or whose
/// archive does not verify are skipped.
pub fn decode(bytes: &[u8]) -> Result<Vec<ArchivedClaim>> {
  let mut claims = Vec::new();
  let mut state = State::Empty;

  let mut reader = match CarReader::new(bytes) {
    Ok(reader) => reader,
    Err(Error::Truncated) => return Ok(claims),
    Err(e) => return Err(e),
  };

  while state != State::Done {
    let block = match (reader.next_block(), state) {
      (Ok(Some(block)), _) => block,
      (Ok(None), _) => {
        state = State::Done;
        continue;
      }
      (Err(Error::Truncated), State::Empty) => {
        state = State::Done;
        continue;
      }
      (Err(Error::Truncated), _) => {
        return Err(Error::Decode("response stream is truncated".into()));
      }
      (Err(e), _) => return Err(e),
    };

    if let Err(e) = block.verify() {
      warn!(block = %block.cid, error = %e, "dropping response block");
      continue;
    }
    match ArchivedClaim::decode(block.data) {
      Ok(claim) => {
        claims.push(claim);
        state = match state {
          State::Reading(n) => State::Reading(n + 1),
          _ => State::Reading(1),
        };
      }
      Err(e) => warn!(block = %block.cid, error = %e, "dropping unverifiable claim"),
    }
  }

  Ok(claims)
}
