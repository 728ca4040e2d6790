//! SQL schema for the claim store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;

-- Claims are immutable once written. Rows are never updated.
CREATE TABLE IF NOT EXISTS claims (
    claim_id       TEXT PRIMARY KEY,  -- CID of the signed invocation
    subject_digest TEXT NOT NULL,     -- hex multihash of the claim subject
    can            TEXT NOT NULL,
    expiration     INTEGER,           -- unix seconds or NULL
    bytes          BLOB NOT NULL,     -- the CAR archive
    recorded_at    TEXT NOT NULL      -- RFC 3339 UTC; server-assigned
);

CREATE INDEX IF NOT EXISTS claims_subject_idx ON claims(subject_digest);

PRAGMA user_version = 1;
";
