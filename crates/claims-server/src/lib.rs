//! Wiring for the claims server binary: configuration, stores and router.

use std::{path::PathBuf, sync::Arc};

use anyhow::Context as _;
use axum::Router;
use claims_api::AppState;
use claims_core::{Ed25519Signer, Signer, auth::IssuerPolicy, store::TieredStore};
use claims_index::{BlockIndexClaimFetcher, HttpPositionIndex, IndexConfig};
use claims_store_sqlite::SqliteStore;
use serde::Deserialize;
use tower_http::trace::TraceLayer;

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` and
/// `CLAIMS_*` environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
  pub host:              String,
  pub port:              u16,
  pub store_path:        PathBuf,
  /// Base64 32-byte Ed25519 seed; the service identity.
  pub signing_key:       String,
  #[serde(default)]
  pub trusted_issuers:   Vec<String>,
  #[serde(default = "default_allow_self_issued")]
  pub allow_self_issued: bool,
  /// Enables claims derived from the position index.
  #[serde(default)]
  pub position_index:    Option<IndexConfig>,
}

fn default_allow_self_issued() -> bool { true }

/// Read `path` (optional) layered with the environment.
pub fn load_config(path: PathBuf) -> anyhow::Result<ServerConfig> {
  let settings = config::Config::builder()
    .add_source(config::File::from(path).required(false))
    .add_source(
      config::Environment::with_prefix("CLAIMS")
        .prefix_separator("_")
        .separator("__")
        .list_separator(",")
        .with_list_parse_key("trusted_issuers")
        .try_parsing(true),
    )
    .build()
    .context("failed to read config file")?;

  settings.try_deserialize().context("failed to deserialise ServerConfig")
}

// ─── Application ──────────────────────────────────────────────────────────────

pub type Fetcher = BlockIndexClaimFetcher<HttpPositionIndex, Arc<Ed25519Signer>>;
pub type Store = TieredStore<SqliteStore, Fetcher>;

/// Assemble handler state around an opened persisted store.
pub fn build_state(config: &ServerConfig, store: SqliteStore) -> anyhow::Result<AppState<Store>> {
  let signer = Arc::new(
    Ed25519Signer::from_base64(&config.signing_key).context("invalid signing_key")?,
  );

  let derived = config
    .position_index
    .as_ref()
    .map(|index| -> anyhow::Result<Fetcher> {
      let client = HttpPositionIndex::new(&index.endpoint)
        .context("invalid position_index.endpoint")?;
      tracing::info!(endpoint = %index.endpoint, "deriving claims from position index");
      Ok(BlockIndexClaimFetcher::new(client, signer.clone(), index))
    })
    .transpose()?;

  let policy = IssuerPolicy::new(signer.did())
    .trust(config.trusted_issuers.iter().cloned())
    .allow_self_issued(config.allow_self_issued);

  Ok(AppState {
    store:       Arc::new(TieredStore::new(store, derived)),
    authorizer:  Arc::new(policy),
    service_did: signer.did().into(),
  })
}

/// The API router with request tracing.
pub fn app(state: AppState<Store>) -> Router {
  claims_api::api_router(state).layer(TraceLayer::new_for_http())
}
