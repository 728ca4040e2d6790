//! Signing identities.
//!
//! The rest of the crate only sees the narrow [`Signer`] trait. The bundled
//! implementation is Ed25519 addressed as a `did:key`.

use base64::{Engine as _, engine::general_purpose::STANDARD as B64};
use ed25519_dalek::{Signature, SigningKey, Verifier as _, VerifyingKey};
use rand_core::OsRng;

use crate::{Error, Result};

/// Multicodec prefix for an Ed25519 public key (`0xed` as a varint).
const ED25519_PUB: [u8; 2] = [0xed, 0x01];
const DID_KEY_PREFIX: &str = "did:key:z";

/// An identity that can sign invocation payloads.
pub trait Signer: Send + Sync {
  /// The DID this signer attests as.
  fn did(&self) -> &str;

  fn sign(&self, payload: &[u8]) -> Vec<u8>;
}

// ─── Ed25519 ─────────────────────────────────────────────────────────────────

/// An Ed25519 keypair with a cached `did:key` identifier.
#[derive(Clone)]
pub struct Ed25519Signer {
  key: SigningKey,
  did: String,
}

impl Ed25519Signer {
  pub fn generate() -> Self { Self::from_key(SigningKey::generate(&mut OsRng)) }

  pub fn from_seed(seed: &[u8; 32]) -> Self {
    Self::from_key(SigningKey::from_bytes(seed))
  }

  /// Parse a base64-encoded 32-byte seed, as stored in configuration.
  pub fn from_base64(encoded: &str) -> Result<Self> {
    let bytes = B64
      .decode(encoded.trim())
      .map_err(|e| Error::Validation(format!("signing key is not base64: {e}")))?;
    let seed: [u8; 32] = bytes.try_into().map_err(|b: Vec<u8>| {
      Error::Validation(format!("signing key must be 32 bytes, got {}", b.len()))
    })?;
    Ok(Self::from_seed(&seed))
  }

  pub fn to_base64(&self) -> String { B64.encode(self.key.to_bytes()) }

  fn from_key(key: SigningKey) -> Self {
    let did = did_key(&key.verifying_key());
    Self { key, did }
  }
}

impl std::fmt::Debug for Ed25519Signer {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Ed25519Signer").field("did", &self.did).finish_non_exhaustive()
  }
}

impl Signer for Ed25519Signer {
  fn did(&self) -> &str { &self.did }

  fn sign(&self, payload: &[u8]) -> Vec<u8> {
    use ed25519_dalek::Signer as _;
    self.key.sign(payload).to_bytes().to_vec()
  }
}

impl<S: Signer + ?Sized> Signer for std::sync::Arc<S> {
  fn did(&self) -> &str { (**self).did() }

  fn sign(&self, payload: &[u8]) -> Vec<u8> { (**self).sign(payload) }
}

// ─── did:key ─────────────────────────────────────────────────────────────────

pub fn did_key(key: &VerifyingKey) -> String {
  let mut bytes = ED25519_PUB.to_vec();
  bytes.extend_from_slice(key.as_bytes());
  format!("{DID_KEY_PREFIX}{}", bs58::encode(bytes).into_string())
}

fn parse_did_key(did: &str) -> Result<VerifyingKey> {
  let encoded = did
    .strip_prefix(DID_KEY_PREFIX)
    .ok_or_else(|| Error::Decode(format!("unsupported issuer {did:?}")))?;
  let bytes = bs58::decode(encoded)
    .into_vec()
    .map_err(|e| Error::Decode(format!("malformed did:key: {e}")))?;
  let key = bytes
    .strip_prefix(&ED25519_PUB)
    .ok_or_else(|| Error::Decode(format!("{did} is not an ed25519 key")))?;
  let key: [u8; 32] = key
    .try_into()
    .map_err(|_| Error::Decode(format!("{did} has the wrong key length")))?;
  VerifyingKey::from_bytes(&key).map_err(|e| Error::Decode(format!("{did}: {e}")))
}

/// Verify `signature` over `payload` by the key behind `did`.
pub fn verify(did: &str, payload: &[u8], signature: &[u8]) -> Result<()> {
  let key = parse_did_key(did)?;
  let signature = Signature::from_slice(signature)
    .map_err(|e| Error::Decode(format!("malformed signature: {e}")))?;
  key
    .verify(payload, &signature)
    .map_err(|_| Error::Decode(format!("signature does not verify for {did}")))
}
