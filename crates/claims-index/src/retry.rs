//! Exponential backoff with random jitter.

use std::{future::Future, time::Duration};

use rand::Rng as _;
use serde::Deserialize;
use tracing::warn;

/// How often and how patiently to retry a failed position index query.
///
/// The delay before retry `n` (from 0) is
/// `min(min_delay * factor^n, max_delay)`, scaled by a random factor in
/// `[1, 2)`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
  pub max_retries:  u32,
  pub min_delay_ms: u64,
  pub max_delay_ms: u64,
  pub factor:       f64,
}

impl Default for RetryPolicy {
  fn default() -> Self {
    Self { max_retries: 5, min_delay_ms: 100, max_delay_ms: 5_000, factor: 2.0 }
  }
}

impl RetryPolicy {
  /// The delay before retry `attempt` without jitter.
  pub fn base_delay(&self, attempt: u32) -> Duration {
    let exp = i32::try_from(attempt).unwrap_or(i32::MAX);
    let millis = (self.min_delay_ms as f64 * self.factor.powi(exp))
      .min(self.max_delay_ms as f64);
    Duration::from_millis(millis as u64)
  }

  pub fn delay(&self, attempt: u32) -> Duration {
    let jitter = rand::thread_rng().gen_range(1.0..2.0);
    self.base_delay(attempt).mul_f64(jitter)
  }

  /// Run `op` until it succeeds or the retries are used up.
  ///
  /// Every failure is logged. Once exhausted, the last error is returned as
  /// [`claims_core::Error::Resolution`].
  pub async fn run<T, E, F, Fut>(&self, mut op: F) -> claims_core::Result<T>
  where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::error::Error + Send + Sync + 'static,
  {
    let mut attempt = 0;
    loop {
      match op().await {
        Ok(value) => return Ok(value),
        Err(error) => {
          attempt += 1;
          warn!(attempt, max_retries = self.max_retries, %error, "position index query failed");
          if attempt > self.max_retries {
            return Err(claims_core::Error::Resolution {
              attempts: attempt,
              source:   Box::new(error),
            });
          }
          tokio::time::sleep(self.delay(attempt - 1)).await;
        }
      }
    }
  }
}
