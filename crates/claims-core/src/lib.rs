//! Core types for the content claims service.
//!
//! Claims, their signed and archived form, the minimal DAG-CBOR and CAR
//! primitives they need, and the store traits the other crates implement.
//! This crate does no network or database I/O.

pub mod archive;
pub mod auth;
pub mod capability;
pub mod car;
pub mod claim;
pub mod dagcbor;
pub mod error;
pub mod invocation;
pub mod signer;
pub mod store;
pub mod stream;

pub use archive::{ArchivedClaim, ClaimBuilder};
pub use capability::{Capability, ClaimKind};
pub use claim::{Claim, Walk};
pub use error::{Error, Result};
pub use signer::{Ed25519Signer, Signer};
pub use store::{ClaimSource, ClaimStore};
