//! Claims derived from the block position index.
//!
//! [`BlockIndexClaimFetcher`] is a [`claims_core::ClaimSource`] that asks an
//! external position index where a block is stored and answers with freshly
//! signed location and relation claims.

pub mod error;
pub mod fetcher;
pub mod framing;
pub mod http;
pub mod multihash_index;
pub mod part;
pub mod policy;
pub mod position;
pub mod retry;

pub use error::{Error, Result};
pub use fetcher::{BlockIndexClaimFetcher, IndexConfig};
pub use http::HttpPositionIndex;
pub use position::{PositionIndex, RawPosition};
pub use retry::RetryPolicy;
