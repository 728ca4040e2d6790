//! Authorization of incoming assertions.

use std::collections::HashSet;

use crate::{Error, Result, invocation::Invocation};

/// Decides whether an invocation may be acted on. Runs after decoding and
/// validation and before anything is written.
pub trait Authorize: Send + Sync {
  fn authorize(&self, invocation: &Invocation, now: i64) -> Result<()>;
}

/// The default policy: invocations must be addressed to the service, must not
/// have expired, and must come from a trusted issuer or be self-issued.
#[derive(Debug, Clone)]
pub struct IssuerPolicy {
  service:           String,
  trusted:           HashSet<String>,
  allow_self_issued: bool,
}

impl IssuerPolicy {
  pub fn new(service: impl Into<String>) -> Self {
    Self { service: service.into(), trusted: HashSet::new(), allow_self_issued: true }
  }

  pub fn trust(mut self, issuers: impl IntoIterator<Item = String>) -> Self {
    self.trusted.extend(issuers);
    self
  }

  pub fn allow_self_issued(mut self, allow: bool) -> Self {
    self.allow_self_issued = allow;
    self
  }
}

impl Authorize for IssuerPolicy {
  fn authorize(&self, invocation: &Invocation, now: i64) -> Result<()> {
    if invocation.audience != self.service {
      return Err(Error::Authorization(format!(
        "invocation is addressed to {}, not {}",
        invocation.audience, self.service
      )));
    }
    if invocation.is_expired(now) {
      return Err(Error::Authorization("invocation has expired".into()));
    }

    let issuer = &invocation.issuer;
    let self_issued = self.allow_self_issued && *issuer == invocation.capability.with;
    if self_issued || self.trusted.contains(issuer) || *issuer == self.service {
      Ok(())
    } else {
      Err(Error::Authorization(format!(
        "{issuer} may not assert claims with {}",
        invocation.capability.with
      )))
    }
  }
}

impl<A: Authorize + ?Sized> Authorize for std::sync::Arc<A> {
  fn authorize(&self, invocation: &Invocation, now: i64) -> Result<()> {
    (**self).authorize(invocation, now)
  }
}

#[cfg(test)]
mod tests {
  use cid::Cid;
  use multihash_codetable::{Code, MultihashDigest};

  use super::*;
  use crate::{
    capability::Capability,
    claim::{Claim, EqualsClaim},
    signer::{Ed25519Signer, Signer},
  };

  const SERVICE: &str = "did:web:claims.example";

  fn invocation(signer: &Ed25519Signer, with: &str, audience: &str, exp: Option<u64>) -> Invocation {
    let cid = |s: &[u8]| Cid::new_v1(0x55, Code::Sha2_256.digest(s));
    let capability = Capability {
      with: with.to_owned(),
      nb:   Claim::Equals(EqualsClaim { content: cid(b"a"), equals: cid(b"b") }),
    };
    Invocation::sign(signer, audience, capability, exp).unwrap()
  }

  #[test]
  fn self_issued_claims_are_accepted() {
    let signer = Ed25519Signer::generate();
    let policy = IssuerPolicy::new(SERVICE);
    policy.authorize(&invocation(&signer, signer.did(), SERVICE, None), 0).unwrap();
  }

  #[test]
  fn wrong_audience_is_rejected() {
    let signer = Ed25519Signer::generate();
    let policy = IssuerPolicy::new(SERVICE);
    let err = policy
      .authorize(&invocation(&signer, signer.did(), "did:web:elsewhere", None), 0)
      .unwrap_err();
    assert!(matches!(err, Error::Authorization(_)));
  }

  #[test]
  fn expired_invocations_are_rejected() {
    let signer = Ed25519Signer::generate();
    let policy = IssuerPolicy::new(SERVICE);
    let inv = invocation(&signer, signer.did(), SERVICE, Some(100));
    policy.authorize(&inv, 99).unwrap();
    assert!(policy.authorize(&inv, 100).is_err());
  }

  #[test]
  fn claims_on_behalf_of_others_need_trust() {
    let signer = Ed25519Signer::generate();
    let inv = invocation(&signer, "did:key:zSomeoneElse", SERVICE, None);

    assert!(IssuerPolicy::new(SERVICE).authorize(&inv, 0).is_err());
    IssuerPolicy::new(SERVICE)
      .trust([signer.did().to_owned()])
      .authorize(&inv, 0)
      .unwrap();
  }

  #[test]
  fn self_issued_can_be_disabled() {
    let signer = Ed25519Signer::generate();
    let policy = IssuerPolicy::new(SERVICE).allow_self_issued(false);
    assert!(policy.authorize(&invocation(&signer, signer.did(), SERVICE, None), 0).is_err());
  }
}
