//! Signed, archived claims.
//!
//! [`ClaimBuilder`] turns a [`Claim`] into an [`ArchivedClaim`]: a signed
//! invocation packed into a CAR archive whose single root is the invocation
//! block. [`ArchivedClaim::decode`] goes the other way and re-derives every
//! field from the archive bytes.

use cid::Cid;

use crate::{
  Error, Result,
  capability::Capability,
  car::Block,
  claim::Claim,
  invocation::Invocation,
  signer::Signer,
};

pub type Multihash = cid::multihash::Multihash<64>;

/// A claim in its transferable form.
#[derive(Debug, Clone, PartialEq)]
pub struct ArchivedClaim {
  /// CID of the signed invocation block, the archive's root.
  pub claim_id:       Cid,
  /// The CARv1 archive.
  pub bytes:          Vec<u8>,
  /// Multihash of the claim's subject; the lookup key in claim stores.
  pub subject_digest: Multihash,
  pub expiration:     Option<u64>,
  pub value:          Capability,
}

impl ArchivedClaim {
  fn from_parts(claim_id: Cid, bytes: Vec<u8>, invocation: Invocation) -> Self {
    Self {
      claim_id,
      bytes,
      subject_digest: *invocation.capability.nb.content().hash(),
      expiration: invocation.expiration,
      value: invocation.capability,
    }
  }

  /// Decode and verify an archive.
  pub fn decode(bytes: Vec<u8>) -> Result<Self> { Self::open(bytes).map(|(claim, _)| claim) }

  /// Decode an archive, also returning the invocation it carries so callers
  /// can inspect the issuer and audience.
  pub fn open(bytes: Vec<u8>) -> Result<(Self, Invocation)> {
    let (root, invocation) = Invocation::open_archive(&bytes)?;
    let claim = Self::from_parts(root, bytes, invocation.clone());
    Ok((claim, invocation))
  }

  pub fn claim(&self) -> &Claim { &self.value.nb }

  pub fn is_expired(&self, now: i64) -> bool {
    self
      .expiration
      .is_some_and(|exp| i64::try_from(exp).is_ok_and(|exp| exp <= now))
  }
}

// ─── Builder ─────────────────────────────────────────────────────────────────

/// Signs claims on behalf of one identity.
///
/// Claims are self-issued: the issuer and the capability's `with` are the
/// signer's DID. The audience defaults to the signer too.
#[derive(Debug, Clone)]
pub struct ClaimBuilder<S> {
  signer:   S,
  audience: Option<String>,
}

impl<S: Signer> ClaimBuilder<S> {
  pub fn new(signer: S) -> Self { Self { signer, audience: None } }

  pub fn with_audience(mut self, audience: impl Into<String>) -> Self {
    self.audience = Some(audience.into());
    self
  }

  /// Sign `claim` and archive it together with `attachments`.
  pub fn build(
    &self,
    claim: Claim,
    expiration: Option<u64>,
    attachments: Vec<Block>,
  ) -> Result<ArchivedClaim> {
    let did = self.signer.did();
    let audience = self.audience.as_deref().unwrap_or(did);
    let capability = Capability { with: did.to_owned(), nb: claim };

    let mut invocation =
      Invocation::sign(&self.signer, audience, capability, expiration).map_err(archive_error)?;
    for block in attachments {
      invocation.attach(block);
    }

    let root = invocation.to_block().map_err(archive_error)?;
    let bytes = invocation.archive().map_err(archive_error)?;
    Ok(ArchivedClaim::from_parts(root.cid, bytes, invocation))
  }
}

fn archive_error(e: Error) -> Error {
  match e {
    Error::Archive(_) => e,
    other => Error::Archive(other.to_string()),
  }
}
