//! Recovering the CID of the archive a block lives in from its storage key.
//!
//! Current keys name the archive by its CAR CID (`<cid>/<cid>.car`). Legacy
//! keys end in the archive's multihash in unprefixed base32
//! (`raw/<root>/<uploader>/<MULTIHASH>.car`).

use claims_core::{archive::Multihash, car::CAR};
use cid::Cid;
use multibase::Base;

/// The CAR CID named by `key`, if its filename encodes one.
pub fn part_cid(key: &str) -> Option<Cid> {
  let filename = key.rsplit('/').next()?;
  let stem = filename.split('.').next()?;
  if stem.is_empty() {
    return None;
  }

  if let Ok(cid) = Cid::try_from(stem) {
    return cid.into_v1().ok().filter(|cid| cid.codec() == CAR);
  }

  let bytes = Base::Base32Lower.decode(stem.to_ascii_lowercase()).ok()?;
  let digest = Multihash::from_bytes(&bytes).ok()?;
  Some(Cid::new_v1(CAR, digest))
}

#[cfg(test)]
mod tests {
  use multihash_codetable::{Code, MultihashDigest};

  use super::*;

  fn car_cid() -> Cid { Cid::new_v1(CAR, Code::Sha2_256.digest(b"archive")) }

  #[test]
  fn current_key() {
    let cid = car_cid();
    assert_eq!(part_cid(&format!("{cid}/{cid}.car")), Some(cid));
  }

  #[test]
  fn legacy_base32_multihash_key() {
    let cid = car_cid();
    let encoded = Base::Base32Lower.encode(cid.hash().to_bytes()).to_ascii_uppercase();
    let key = format!("raw/bafyroot/315318734258473269/{encoded}.car");
    assert_eq!(part_cid(&key), Some(cid));
  }

  #[test]
  fn cid_with_another_codec_is_not_a_part() {
    let raw = Cid::new_v1(0x55, Code::Sha2_256.digest(b"block"));
    assert_eq!(part_cid(&format!("raw/{raw}.car")), None);
  }

  #[test]
  fn garbage_keys() {
    assert_eq!(part_cid("raw/a/b/not-a-hash.car"), None);
    assert_eq!(part_cid("raw/a/b/.car"), None);
    assert_eq!(part_cid(""), None);
  }
}
