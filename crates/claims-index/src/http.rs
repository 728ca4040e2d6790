//! HTTP client for the position index service.

use std::time::Duration;

use claims_core::archive::Multihash;
use reqwest::{Client, StatusCode};
use url::Url;

use crate::{
  Error, Result,
  position::{PositionIndex, RawPosition},
};

/// Queries `GET {endpoint}/{base58btc(multihash)}?limit=N`, which answers with
/// a JSON array of [`RawPosition`]s. A 404 means the block is not indexed.
///
/// Cheap to clone; the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Debug, Clone)]
pub struct HttpPositionIndex {
  client:   Client,
  endpoint: Url,
}

impl HttpPositionIndex {
  pub fn new(endpoint: &str) -> Result<Self> {
    let endpoint = Url::parse(endpoint.trim_end_matches('/'))
      .map_err(|e| Error::Endpoint(endpoint.to_owned(), e))?;
    let client = Client::builder().timeout(Duration::from_secs(30)).build()?;
    Ok(Self { client, endpoint })
  }

  fn url(&self, digest: &Multihash) -> String {
    format!(
      "{}/{}",
      self.endpoint.as_str().trim_end_matches('/'),
      bs58::encode(digest.to_bytes()).into_string()
    )
  }
}

impl PositionIndex for HttpPositionIndex {
  type Error = Error;

  async fn find(&self, digest: Multihash, limit: usize) -> Result<Vec<RawPosition>> {
    let resp = self
      .client
      .get(self.url(&digest))
      .query(&[("limit", limit)])
      .send()
      .await?;

    match resp.status() {
      StatusCode::NOT_FOUND => Ok(Vec::new()),
      status if status.is_success() => Ok(resp.json().await?),
      status => Err(Error::Status(status)),
    }
  }
}
