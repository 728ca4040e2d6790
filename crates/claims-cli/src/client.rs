//! Async HTTP client for the claims service.

use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use cid::Cid;
use claims_core::{ArchivedClaim, stream};
use reqwest::{Client, Response};
use serde::Deserialize;

#[derive(Deserialize)]
struct Identity {
  did: String,
}

#[derive(Deserialize)]
struct Failure {
  name:  String,
  error: String,
}

/// Async HTTP client for the claims API.
#[derive(Clone)]
pub struct ApiClient {
  client:   Client,
  base_url: String,
}

impl ApiClient {
  pub fn new(base_url: impl Into<String>) -> Result<Self> {
    let client = Client::builder()
      .timeout(Duration::from_secs(30))
      .build()
      .context("failed to build HTTP client")?;
    Ok(Self { client, base_url: base_url.into() })
  }

  fn url(&self, path: &str) -> String {
    format!("{}{}", self.base_url.trim_end_matches('/'), path)
  }

  /// `GET /`
  pub async fn service_did(&self) -> Result<String> {
    let resp = self.client.get(self.url("/")).send().await.context("GET / failed")?;
    let resp = check("GET /", resp).await?;
    let identity: Identity = resp.json().await.context("deserialising service identity")?;
    Ok(identity.did)
  }

  /// `POST /`
  pub async fn assert(&self, archive: Vec<u8>) -> Result<()> {
    let resp = self
      .client
      .post(self.url("/"))
      .body(archive)
      .send()
      .await
      .context("POST / failed")?;
    check("POST /", resp).await?;
    Ok(())
  }

  /// `GET /claims/<cid>[?walk=...]`
  pub async fn read(&self, content: Cid, walk: Option<&str>) -> Result<Vec<ArchivedClaim>> {
    let mut req = self.client.get(self.url(&format!("/claims/{content}")));
    if let Some(walk) = walk {
      req = req.query(&[("walk", walk)]);
    }
    let resp = req.send().await.context("GET /claims failed")?;
    let body = check("GET /claims", resp).await?.bytes().await.context("reading claims")?;
    stream::decode(&body).context("decoding claims stream")
  }
}

/// Turn a non-success response into an error carrying the server's message.
async fn check(what: &str, resp: Response) -> Result<Response> {
  let status = resp.status();
  if status.is_success() {
    return Ok(resp);
  }
  match resp.json::<Failure>().await {
    Ok(f) => Err(anyhow!("{what} → {status}: {}: {}", f.name, f.error)),
    Err(_) => Err(anyhow!("{what} → {status}")),
  }
}
