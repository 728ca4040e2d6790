//! Signed capability invocations and their CAR archives.
//!
//! An invocation is a DAG-CBOR map
//!
//! ```text
//! { v, iss, aud, att: [{can, with, nb}], exp, fct: [], prf: [], s }
//! ```
//!
//! where `s` is the issuer's signature over the canonical encoding of the same
//! map without `s`. The archive holds the invocation block as its only root,
//! followed by any attached blocks.

use ciborium::Value;
use cid::Cid;

use crate::{
  Error, Result,
  capability::Capability,
  car::{self, Block, CarReader},
  dagcbor,
  signer::{self, Signer},
};

pub const VERSION: &str = "0.9.1";

#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
  pub issuer:      String,
  pub audience:    String,
  pub capability:  Capability,
  /// Unix seconds after which the invocation is no longer valid.
  pub expiration:  Option<u64>,
  pub signature:   Vec<u8>,
  /// Extra blocks shipped in the same archive, e.g. an index referenced from
  /// the capability's parameters.
  pub attachments: Vec<Block>,
}

impl Invocation {
  /// Sign `capability` as issued by `signer` to `audience`.
  pub fn sign<S: Signer + ?Sized>(
    signer: &S,
    audience: impl Into<String>,
    capability: Capability,
    expiration: Option<u64>,
  ) -> Result<Self> {
    let mut invocation = Self {
      issuer: signer.did().to_owned(),
      audience: audience.into(),
      capability,
      expiration,
      signature: Vec::new(),
      attachments: Vec::new(),
    };
    let payload = dagcbor::encode(&invocation.unsigned_value())?;
    invocation.signature = signer.sign(&payload);
    Ok(invocation)
  }

  pub fn attach(&mut self, block: Block) { self.attachments.push(block); }

  pub fn is_expired(&self, now: i64) -> bool {
    self
      .expiration
      .is_some_and(|exp| i64::try_from(exp).is_ok_and(|exp| exp <= now))
  }

  // ── Encoding ────────────────────────────────────────────────────────────

  fn unsigned_fields(&self) -> Vec<(&'static str, Value)> {
    vec![
      ("v", dagcbor::text(VERSION)),
      ("iss", dagcbor::text(self.issuer.clone())),
      ("aud", dagcbor::text(self.audience.clone())),
      ("att", Value::Array(vec![self.capability.to_value()])),
      ("exp", self.expiration.map_or(Value::Null, dagcbor::uint)),
      ("fct", Value::Array(vec![])),
      ("prf", Value::Array(vec![])),
    ]
  }

  fn unsigned_value(&self) -> Value { dagcbor::map(self.unsigned_fields()) }

  /// The signed invocation as a DAG-CBOR block.
  pub fn to_block(&self) -> Result<Block> {
    let mut fields = self.unsigned_fields();
    fields.push(("s", Value::Bytes(self.signature.clone())));
    let data = dagcbor::encode(&dagcbor::map(fields))?;
    Ok(Block::new(dagcbor::DAG_CBOR, data))
  }

  /// The content identifier of the signed invocation block.
  pub fn cid(&self) -> Result<Cid> { Ok(self.to_block()?.cid) }

  /// Encode the invocation and its attachments as a CARv1 archive.
  pub fn archive(&self) -> Result<Vec<u8>> {
    let root = self.to_block()?;
    car::encode(&[root.cid], std::iter::once(&root).chain(&self.attachments))
  }

  // ── Decoding ────────────────────────────────────────────────────────────

  /// Parse an invocation block and verify its signature.
  pub fn from_block(block: &Block) -> Result<Self> {
    let value = dagcbor::decode(&block.data)?;
    let Value::Map(entries) = &value else {
      return Err(Error::Decode("invocation is not a map".into()));
    };

    let text_field = |key: &str| {
      dagcbor::get(&value, key)
        .and_then(dagcbor::as_text)
        .map(str::to_owned)
        .ok_or_else(|| Error::Decode(format!("invocation is missing `{key}`")))
    };
    text_field("v")?;
    let issuer = text_field("iss")?;
    let audience = text_field("aud")?;

    let capability = match dagcbor::get(&value, "att").and_then(dagcbor::as_array) {
      Some([cap]) => Capability::from_value(cap)?,
      Some(caps) => {
        return Err(Error::Decode(format!(
          "expected exactly one capability, found {}",
          caps.len()
        )));
      }
      None => return Err(Error::Decode("invocation is missing `att`".into())),
    };

    let expiration = match dagcbor::get(&value, "exp") {
      None | Some(Value::Null) => None,
      Some(v) => Some(
        dagcbor::as_u64(v)
          .ok_or_else(|| Error::Decode("`exp` must be an unsigned integer".into()))?,
      ),
    };

    let signature = match dagcbor::get(&value, "s") {
      Some(Value::Bytes(s)) => s.clone(),
      _ => return Err(Error::Decode("invocation is not signed".into())),
    };

    let unsigned = Value::Map(
      entries
        .iter()
        .filter(|(k, _)| !matches!(k, Value::Text(t) if t == "s"))
        .cloned()
        .collect(),
    );
    signer::verify(&issuer, &dagcbor::encode(&unsigned)?, &signature)?;

    Ok(Self {
      issuer,
      audience,
      capability,
      expiration,
      signature,
      attachments: Vec::new(),
    })
  }

  /// Decode an archive, checking every block hash, the single root, and the
  /// invocation signature.
  pub fn from_archive(bytes: &[u8]) -> Result<Self> {
    Self::open_archive(bytes).map(|(_, invocation)| invocation)
  }

  /// Like [`Invocation::from_archive`], also returning the root CID as
  /// recorded in the archive.
  pub fn open_archive(bytes: &[u8]) -> Result<(Cid, Self)> {
    let truncated = |e: Error| match e {
      Error::Truncated => Error::Decode("archive is truncated".into()),
      other => other,
    };

    let mut reader = CarReader::new(bytes).map_err(truncated)?;
    let root = match reader.roots() {
      [root] => *root,
      roots => {
        return Err(Error::Decode(format!(
          "expected one root, found {}",
          roots.len()
        )));
      }
    };

    let mut invocation_block = None;
    let mut attachments = Vec::new();
    for block in reader.by_ref() {
      let block = block.map_err(truncated)?;
      block.verify()?;
      if block.cid == root && invocation_block.is_none() {
        invocation_block = Some(block);
      } else {
        attachments.push(block);
      }
    }

    let block = invocation_block
      .ok_or_else(|| Error::Decode(format!("archive does not contain its root {root}")))?;
    let mut invocation = Self::from_block(&block)?;
    invocation.attachments = attachments;
    Ok((root, invocation))
  }
}
