//! Router tests driven through `tower::ServiceExt::oneshot`.

use std::sync::{
  Arc,
  atomic::{AtomicUsize, Ordering},
};

use axum::{
  body::Body,
  http::{Request, StatusCode, header},
  response::Response,
};
use cid::Cid;
use claims_core::{
  ArchivedClaim, Capability, ClaimBuilder, ClaimSource, ClaimStore, Ed25519Signer, Signer,
  auth::IssuerPolicy,
  claim::{Claim, EqualsClaim, RelationClaim},
  invocation::Invocation,
  store::{MemoryStore, TieredStore},
  stream,
};
use multihash_codetable::{Code, MultihashDigest};
use tower::ServiceExt as _;

use crate::{AppState, api_router};

// ─── Fixtures ────────────────────────────────────────────────────────────────

/// Counts writes on the way to an in-memory store.
#[derive(Default)]
struct CountingStore {
  inner: MemoryStore,
  puts:  AtomicUsize,
}

impl ClaimSource for CountingStore {
  type Error = std::convert::Infallible;

  async fn get(&self, content: Cid) -> Result<Vec<ArchivedClaim>, Self::Error> {
    self.inner.get(content).await
  }
}

impl ClaimStore for CountingStore {
  async fn put(&self, claim: ArchivedClaim) -> Result<(), Self::Error> {
    self.puts.fetch_add(1, Ordering::SeqCst);
    self.inner.put(claim).await
  }
}

/// A derived source whose position index is down.
struct Unreachable;

impl ClaimSource for Unreachable {
  type Error = claims_core::Error;

  async fn get(&self, _: Cid) -> Result<Vec<ArchivedClaim>, Self::Error> {
    Err(claims_core::Error::Resolution { attempts: 3, source: "connection refused".into() })
  }
}

type Store = TieredStore<Arc<CountingStore>, Unreachable>;

struct Harness {
  state:   AppState<Store>,
  persist: Arc<CountingStore>,
  service: Ed25519Signer,
}

fn harness(derived: Option<Unreachable>) -> Harness {
  let service = Ed25519Signer::generate();
  let persist = Arc::new(CountingStore::default());
  let state = AppState {
    store:       Arc::new(TieredStore::new(persist.clone(), derived)),
    authorizer:  Arc::new(IssuerPolicy::new(service.did())),
    service_did: service.did().into(),
  };
  Harness { state, persist, service }
}

fn raw(seed: &[u8]) -> Cid { Cid::new_v1(0x55, Code::Sha2_256.digest(seed)) }

fn equals_archive(signer: &Ed25519Signer, audience: &str, content: Cid, equals: Cid) -> Vec<u8> {
  let capability = Capability {
    with: signer.did().to_owned(),
    nb:   Claim::Equals(EqualsClaim { content, equals }),
  };
  Invocation::sign(signer, audience, capability, None).unwrap().archive().unwrap()
}

async fn send(state: &AppState<Store>, req: Request<Body>) -> Response {
  api_router(state.clone()).oneshot(req).await.unwrap()
}

async fn post(state: &AppState<Store>, body: Vec<u8>) -> Response {
  let req = Request::builder().method("POST").uri("/").body(Body::from(body)).unwrap();
  send(state, req).await
}

async fn get(state: &AppState<Store>, uri: &str) -> Response {
  send(state, Request::builder().uri(uri).body(Body::empty()).unwrap()).await
}

async fn body_bytes(resp: Response) -> Vec<u8> {
  axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap().to_vec()
}

async fn body_json(resp: Response) -> serde_json::Value {
  serde_json::from_slice(&body_bytes(resp).await).unwrap()
}

// ─── Identity ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn root_publishes_service_did() {
  let h = harness(None);
  let resp = get(&h.state, "/").await;
  assert_eq!(resp.status(), StatusCode::OK);
  assert_eq!(body_json(resp).await["did"], h.service.did());
}

// ─── Write path ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn assert_equals_then_read_it_back() {
  let h = harness(None);
  let client = Ed25519Signer::generate();
  let archive = equals_archive(&client, h.service.did(), raw(b"a"), raw(b"b"));

  let resp = post(&h.state, archive).await;
  assert_eq!(resp.status(), StatusCode::OK);
  assert_eq!(body_json(resp).await, serde_json::json!({ "ok": {} }));
  assert_eq!(h.persist.puts.load(Ordering::SeqCst), 1);

  let resp = get(&h.state, &format!("/claims/{}", raw(b"a"))).await;
  assert_eq!(resp.status(), StatusCode::OK);
  assert_eq!(resp.headers()[header::CONTENT_TYPE], "application/vnd.ipld.car");
  let claims = stream::decode(&body_bytes(resp).await).unwrap();
  assert_eq!(claims.len(), 1);
  let Claim::Equals(eq) = claims[0].claim() else { panic!("expected equals claim") };
  assert_eq!(eq.equals, raw(b"b"));
}

#[tokio::test]
async fn unauthorized_assertion_is_not_stored() {
  let h = harness(None);
  let client = Ed25519Signer::generate();
  let archive = equals_archive(&client, "did:web:someone-else", raw(b"a"), raw(b"b"));

  let resp = post(&h.state, archive).await;
  assert_eq!(resp.status(), StatusCode::FORBIDDEN);
  assert_eq!(body_json(resp).await["name"], "AuthorizationError");
  assert_eq!(h.persist.puts.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn garbage_body_is_a_decode_error() {
  let h = harness(None);
  let resp = post(&h.state, b"definitely not a car".to_vec()).await;
  assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
  assert_eq!(body_json(resp).await["name"], "DecodeError");
}

#[tokio::test]
async fn oversized_frame_length_is_a_decode_error() {
  let h = harness(None);
  let mut body = claims_core::car::encode_header(&[raw(b"a")]).unwrap();
  body.extend([0xff; 9]);
  body.push(0x01);

  let resp = post(&h.state, body).await;
  assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
  assert_eq!(body_json(resp).await["name"], "DecodeError");
  assert_eq!(h.persist.puts.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn unknown_capability_is_rejected() {
  let h = harness(None);
  let client = Ed25519Signer::generate();
  let nb = claims_core::dagcbor::map([("content", claims_core::dagcbor::link(&raw(b"a")))]);
  let capability = Capability {
    with: client.did().to_owned(),
    nb:   Claim::from_nb("assert/index", &nb).unwrap(),
  };
  let archive = Invocation::sign(&client, h.service.did(), capability, None)
    .unwrap()
    .archive()
    .unwrap();

  let resp = post(&h.state, archive).await;
  assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
  assert_eq!(body_json(resp).await["name"], "ValidationError");
  assert_eq!(h.persist.puts.load(Ordering::SeqCst), 0);
}

// ─── Read path ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn unknown_subject_is_an_empty_stream() {
  let h = harness(None);
  let resp = get(&h.state, &format!("/claims/{}", raw(b"nothing"))).await;
  assert_eq!(resp.status(), StatusCode::OK);
  assert!(stream::decode(&body_bytes(resp).await).unwrap().is_empty());
}

#[tokio::test]
async fn invalid_cid_is_bad_request() {
  let h = harness(None);
  let resp = get(&h.state, "/claims/not-a-cid").await;
  assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

  let resp = get(&h.state, &format!("/claims/{}?walk=sideways", raw(b"a"))).await;
  assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn walk_follows_children_once() {
  let h = harness(None);
  let builder = ClaimBuilder::new(Ed25519Signer::generate());
  let (root, child) = (raw(b"root"), raw(b"child"));

  let relation = |children: Vec<Cid>| {
    Claim::Relation(RelationClaim { content: root, children, parts: vec![] })
  };
  let store = h.persist.clone();
  store.put(builder.build(relation(vec![child]), None, vec![]).unwrap()).await.unwrap();
  store.put(builder.build(relation(vec![child, root]), None, vec![]).unwrap()).await.unwrap();
  let child_claim = Claim::Equals(EqualsClaim { content: child, equals: raw(b"same") });
  store.put(builder.build(child_claim, None, vec![]).unwrap()).await.unwrap();

  let resp = get(&h.state, &format!("/claims/{root}")).await;
  assert_eq!(stream::decode(&body_bytes(resp).await).unwrap().len(), 2);

  let resp = get(&h.state, &format!("/claims/{root}?walk=children")).await;
  let claims = stream::decode(&body_bytes(resp).await).unwrap();
  assert_eq!(claims.len(), 3);
  assert_eq!(claims[2].claim().content(), child);
}

#[tokio::test]
async fn resolution_failure_is_service_unavailable() {
  let h = harness(Some(Unreachable));
  let resp = get(&h.state, &format!("/claims/{}", raw(b"a"))).await;
  assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
  assert_eq!(body_json(resp).await["name"], "ResolutionError");
}
