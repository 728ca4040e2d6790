use thiserror::Error;

/// Failures talking to the position index service.
#[derive(Debug, Error)]
pub enum Error {
  #[error("position index request failed: {0}")]
  Http(#[from] reqwest::Error),

  #[error("position index returned {0}")]
  Status(reqwest::StatusCode),

  #[error("invalid position index endpoint {0:?}: {1}")]
  Endpoint(String, url::ParseError),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
