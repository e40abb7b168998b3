#![allow(dead_code)]

use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use async_trait::async_trait;
use axum::body::Body;
use http_body_util::BodyExt;
use hyper::{Request, Response, StatusCode, header};
use tokio::sync::Mutex;
use tower::ServiceExt;
use verge::{
    adapters::{EdgeHandler, InMemoryCacheStore, InMemoryKvStore, build_router},
    config::EdgeConfig,
    ports::http_client::{HttpClient, HttpClientError, HttpClientResult},
    utils::BackgroundTasks,
};

#[derive(Clone)]
struct StubResponse {
    status: u16,
    content_type: String,
    body: String,
}

/// Programmable stand-in for both origins, keyed by request path. Unknown
/// paths return 404; `set_unreachable` simulates a total origin outage.
#[derive(Default)]
pub struct FakeOrigin {
    routes: Mutex<HashMap<String, StubResponse>>,
    unreachable: AtomicBool,
    hits: Mutex<Vec<String>>,
}

impl FakeOrigin {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub async fn stub(&self, path: &str, status: u16, content_type: &str, body: &str) {
        self.routes.lock().await.insert(
            path.to_string(),
            StubResponse {
                status,
                content_type: content_type.to_string(),
                body: body.to_string(),
            },
        );
    }

    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    pub async fn hits(&self) -> Vec<String> {
        self.hits.lock().await.clone()
    }
}

#[async_trait]
impl HttpClient for FakeOrigin {
    async fn send_request(&self, req: Request<Body>) -> HttpClientResult<Response<Body>> {
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(HttpClientError::ConnectionError(
                "origin unreachable".to_string(),
            ));
        }

        let path = req.uri().path().to_string();
        self.hits.lock().await.push(path.clone());

        let routes = self.routes.lock().await;
        let response = match routes.get(&path) {
            Some(stub) => Response::builder()
                .status(stub.status)
                .header(header::CONTENT_TYPE, stub.content_type.clone())
                .body(Body::from(stub.body.clone())),
            None => Response::builder()
                .status(StatusCode::NOT_FOUND)
                .header(header::CONTENT_TYPE, "text/plain")
                .body(Body::from("not stubbed")),
        };
        Ok(response.expect("stub response"))
    }
}

pub struct TestStack {
    pub router: axum::Router,
    pub origin: Arc<FakeOrigin>,
    pub cache: Arc<InMemoryCacheStore>,
    pub kv: Arc<InMemoryKvStore>,
    pub background: BackgroundTasks,
    pub config: Arc<EdgeConfig>,
}

/// Wire the production router against in-memory stores and the fake origin.
pub fn test_stack() -> TestStack {
    let config = Arc::new(EdgeConfig::default());
    let origin = FakeOrigin::new();
    let cache = Arc::new(InMemoryCacheStore::new());
    let kv = Arc::new(InMemoryKvStore::new());
    let background = BackgroundTasks::new();

    let handler = Arc::new(EdgeHandler::new(
        config.clone(),
        origin.clone(),
        cache.clone(),
        kv.clone(),
        background.clone(),
    ));

    TestStack {
        router: build_router(handler),
        origin,
        cache,
        kv,
        background,
        config,
    }
}

/// One GET through the full router; returns the response with body intact.
pub async fn get(router: &axum::Router, path: &str) -> Response<Body> {
    router
        .clone()
        .oneshot(
            Request::builder()
                .uri(path)
                .body(Body::empty())
                .expect("request build"),
        )
        .await
        .expect("router call")
}

pub async fn body_string(response: Response<Body>) -> String {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body collect")
        .to_bytes();
    String::from_utf8_lossy(&bytes).into_owned()
}

pub const SECURITY_HEADERS: &[&str] = &[
    "strict-transport-security",
    "x-content-type-options",
    "content-security-policy",
    "x-xss-protection",
    "referrer-policy",
    "permissions-policy",
];

pub fn assert_security_headers(response: &Response<Body>) {
    for name in SECURITY_HEADERS {
        assert!(
            response.headers().contains_key(*name),
            "missing security header {name}"
        );
    }
}

/// Minimal SPA shell the fake frontend serves for page routes.
pub const SHELL: &str = concat!(
    "<html><head><title>App</title>",
    "<meta name=\"description\" content=\"client rendered\">",
    "<meta property=\"og:title\" content=\"client rendered\">",
    "</head><body><div id=\"root\"></div></body></html>",
);
