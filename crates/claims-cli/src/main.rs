//! `claims`: command-line client for the content claims service.
//!
//! # Usage
//!
//! ```
//! claims --url http://localhost:3000 read bafy... --walk parts,children
//! claims show claim.car
//! claims --key $SEED assert equals bafy... bafk...
//! claims --key $SEED assert location bafy... https://example.com/x.car --offset 0 --length 128
//! ```

mod client;

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use cid::Cid;
use clap::{Parser, Subcommand};
use claims_core::{
  ArchivedClaim, Capability, Ed25519Signer, Signer,
  claim::{Claim, EqualsClaim, LocationClaim, Range},
  invocation::Invocation,
};
use client::ApiClient;
use serde::Deserialize;
use serde_json::json;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

// ─── CLI args ─────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "claims", about = "Read and assert content claims")]
struct Args {
  /// Path to a TOML config file (url, key).
  #[arg(short, long, value_name = "FILE")]
  config: Option<PathBuf>,

  /// Base URL of the claims service (default: http://localhost:3000).
  #[arg(long, env = "CLAIMS_URL")]
  url: Option<String>,

  /// Base64 Ed25519 seed used to sign assertions.
  #[arg(long, env = "CLAIMS_KEY", hide_env_values = true)]
  key: Option<String>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Fetch claims about a CID and print them as JSON lines.
  Read {
    cid:  String,
    /// Comma-separated links to follow: parts, includes, children.
    #[arg(long)]
    walk: Option<String>,
  },
  /// Decode a claim archive from disk.
  Show { file: PathBuf },
  /// Sign a claim and submit it to the service.
  Assert {
    #[command(subcommand)]
    claim: AssertCommand,
  },
}

#[derive(Subcommand, Debug)]
enum AssertCommand {
  /// `content` is the same data as `equals` under another CID.
  Equals { content: String, equals: String },
  /// `content` can be fetched from `url`.
  Location {
    content: String,
    url:     String,
    #[arg(long)]
    offset:  Option<u64>,
    #[arg(long, requires = "offset")]
    length:  Option<u64>,
  },
}

// ─── Config file ──────────────────────────────────────────────────────────────

/// Shape of the optional TOML config file.
#[derive(Deserialize, Default)]
struct ConfigFile {
  #[serde(default)]
  url: String,
  #[serde(default)]
  key: String,
}

// ─── Entry point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_writer(std::io::stderr)
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::WARN.into())
        .from_env_lossy(),
    )
    .init();

  let args = Args::parse();

  let file_cfg: ConfigFile = if let Some(path) = &args.config {
    let raw = std::fs::read_to_string(path)
      .with_context(|| format!("reading config file {}", path.display()))?;
    toml::from_str(&raw).context("parsing config file")?
  } else {
    ConfigFile::default()
  };

  // CLI flags override config file, which overrides defaults.
  let url = args
    .url
    .or_else(|| (!file_cfg.url.is_empty()).then(|| file_cfg.url.clone()))
    .unwrap_or_else(|| "http://localhost:3000".to_string());
  let key = args.key.or_else(|| (!file_cfg.key.is_empty()).then(|| file_cfg.key.clone()));

  match args.command {
    Command::Read { cid, walk } => {
      let client = ApiClient::new(url)?;
      let claims = client.read(parse_cid(&cid)?, walk.as_deref()).await?;
      tracing::debug!(count = claims.len(), "received claims");
      for claim in &claims {
        println!("{}", render(claim));
      }
    }
    Command::Show { file } => {
      let bytes =
        std::fs::read(&file).with_context(|| format!("reading {}", file.display()))?;
      let claim = ArchivedClaim::decode(bytes).context("decoding claim archive")?;
      println!("{}", render(&claim));
    }
    Command::Assert { claim } => {
      let Some(key) = key else { bail!("assert needs a signing key (--key or CLAIMS_KEY)") };
      let signer = Ed25519Signer::from_base64(&key).context("invalid signing key")?;
      let claim = build_claim(claim)?;

      let client = ApiClient::new(url)?;
      let audience = client.service_did().await?;
      let capability = Capability { with: signer.did().to_owned(), nb: claim };
      let invocation = Invocation::sign(&signer, audience, capability, None)?;
      let cid = invocation.cid()?;

      client.assert(invocation.archive()?).await?;
      println!("{cid}");
    }
  }

  Ok(())
}

// ─── Helpers ──────────────────────────────────────────────────────────────────

fn parse_cid(s: &str) -> Result<Cid> {
  Cid::try_from(s).with_context(|| format!("invalid CID {s:?}"))
}

fn build_claim(command: AssertCommand) -> Result<Claim> {
  Ok(match command {
    AssertCommand::Equals { content, equals } => Claim::Equals(EqualsClaim {
      content: parse_cid(&content)?,
      equals:  parse_cid(&equals)?,
    }),
    AssertCommand::Location { content, url, offset, length } => {
      Claim::Location(LocationClaim {
        content:  parse_cid(&content)?,
        location: vec![url],
        range:    offset.map(|offset| Range { offset, length }),
      })
    }
  })
}

/// One JSON line per claim.
fn render(claim: &ArchivedClaim) -> serde_json::Value {
  json!({
    "id": claim.claim_id.to_string(),
    "with": claim.value.with,
    "expiration": claim.expiration,
    "claim": claim.claim().to_json(),
  })
}

#[cfg(test)]
mod tests {
  use claims_core::ClaimBuilder;

  use super::*;

  const CID: &str = "bafkreigh2akiscaildcqabsyg3dfr6chu3fgpregiymsck7e7aqa4s52zy";

  #[test]
  fn location_range_needs_an_offset() {
    let claim = build_claim(AssertCommand::Location {
      content: CID.into(),
      url:     "https://example.com/a.car".into(),
      offset:  None,
      length:  None,
    })
    .unwrap();
    let Claim::Location(location) = claim else { panic!("expected location claim") };
    assert_eq!(location.range, None);
    assert_eq!(location.location, vec!["https://example.com/a.car".to_string()]);

    assert!(Args::try_parse_from(["claims", "assert", "location", CID, "u", "--length", "4"]).is_err());
  }

  #[test]
  fn bad_cid_is_reported() {
    let err = build_claim(AssertCommand::Equals { content: "nope".into(), equals: CID.into() })
      .unwrap_err();
    assert!(err.to_string().contains("nope"));
  }

  #[test]
  fn render_shows_string_cids() {
    let claim = build_claim(AssertCommand::Equals { content: CID.into(), equals: CID.into() })
      .unwrap();
    let archived = ClaimBuilder::new(Ed25519Signer::generate()).build(claim, None, vec![]).unwrap();
    let line = render(&archived);
    assert_eq!(line["id"], archived.claim_id.to_string());
    assert_eq!(line["claim"]["content"], CID);
    assert!(line["expiration"].is_null());
  }
}
