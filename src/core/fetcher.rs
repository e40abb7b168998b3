//! Cache-aside origin fetching with stale fallback.
//!
//! Two disciplines share one primitive:
//! * Asset paths are cache-first. A hit is served immediately; a miss fetches
//!   the origin and stores the response under a long immutable TTL.
//! * Page paths are origin-first so HTML stays fresh. A successful fetch is
//!   written back without blocking the response; a transport failure,
//!   timeout or 5xx falls back to the last cached copy for that key.
//!
//! Client errors (4xx) pass through unchanged and are never cached: they are
//! not retryable via cache, so hiding them behind a stale copy would be
//! wrong.
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body as AxumBody;
use bytes::Bytes;
use http_body_util::BodyExt;
use hyper::{Response, StatusCode, header};

use crate::{
    metrics,
    ports::{
        cache_store::{CacheStore, CachedResponse},
        http_client::HttpClient,
        http_server::HandlerError,
    },
    utils::BackgroundTasks,
};

/// Marker for the `X-Cache-Status` response header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    Hit,
    Miss,
}

impl CacheStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheStatus::Hit => "HIT",
            CacheStatus::Miss => "MISS",
        }
    }
}

/// A fully buffered page fetch, ready for hydration and response assembly.
#[derive(Debug)]
pub struct FetchedPage {
    pub status: StatusCode,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
    pub cache_status: CacheStatus,
    pub from_fallback: bool,
}

/// Headers that must not be replayed from a cache entry.
const UNCACHEABLE_HEADERS: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
    "content-length",
    "set-cookie",
];

pub struct CacheAsideFetcher {
    client: Arc<dyn HttpClient>,
    cache: Arc<dyn CacheStore>,
    background: BackgroundTasks,
    page_ttl: Duration,
    asset_ttl: Duration,
}

impl CacheAsideFetcher {
    pub fn new(
        client: Arc<dyn HttpClient>,
        cache: Arc<dyn CacheStore>,
        background: BackgroundTasks,
        page_ttl: Duration,
        asset_ttl: Duration,
    ) -> Self {
        Self {
            client,
            cache,
            background,
            page_ttl,
            asset_ttl,
        }
    }

    /// Serve an immutable asset through the cache: check first, fetch and
    /// store on miss. Content is addressed by a stable path, so entries get
    /// the long TTL and an `immutable` cache-control.
    pub async fn fetch_asset(
        &self,
        origin_url: &str,
        key: &str,
    ) -> Result<Response<AxumBody>, HandlerError> {
        match self.cache.get(key).await {
            Ok(Some(entry)) => {
                metrics::record_cache_event("asset", "hit");
                return build_response(&entry, CacheStatus::Hit);
            }
            Ok(None) => {}
            Err(e) => tracing::warn!("Cache lookup for '{}' failed: {}", key, e),
        }

        metrics::record_cache_event("asset", "miss");
        let response = self
            .client
            .get(origin_url)
            .await
            .map_err(|e| HandlerError::BadGateway(format!("asset fetch failed: {e}")))?;

        if !response.status().is_success() {
            // Pass the origin's error through untouched; nothing to cache.
            return Ok(response);
        }

        let (parts, body) = response.into_parts();
        let bytes = body
            .collect()
            .await
            .map_err(|e| HandlerError::BadGateway(format!("asset body read failed: {e}")))?
            .to_bytes();

        let mut headers = retained_headers(&parts.headers);
        headers.retain(|(name, _)| !name.eq_ignore_ascii_case("cache-control"));
        headers.push((
            "cache-control".to_string(),
            "public, max-age=31536000, immutable".to_string(),
        ));

        let entry = CachedResponse::new(parts.status.as_u16(), headers, bytes, self.asset_ttl);
        if let Err(e) = self.cache.put(key, entry.clone()).await {
            tracing::warn!("Cache write for '{}' failed: {}", key, e);
        }

        build_response(&entry, CacheStatus::Miss)
    }

    /// Fetch an HTML page, origin-first. Successful responses are written to
    /// the cache on the background tracker; failures fall back to the cached
    /// copy or surface a 503 if none exists.
    pub async fn fetch_page(&self, origin_url: &str, key: &str) -> Result<FetchedPage, HandlerError> {
        let response = match self.client.get(origin_url).await {
            Ok(response) if response.status().is_server_error() => {
                tracing::warn!(
                    "Origin returned {} for '{}', trying cache fallback",
                    response.status(),
                    key
                );
                return self.fallback(key).await;
            }
            Ok(response) => response,
            Err(e) => {
                tracing::warn!("Origin fetch for '{}' failed ({}), trying cache fallback", key, e);
                return self.fallback(key).await;
            }
        };

        let (parts, body) = response.into_parts();
        let bytes = match body.collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(e) => {
                tracing::warn!("Origin body read for '{}' failed ({}), trying cache fallback", key, e);
                return self.fallback(key).await;
            }
        };

        let headers = retained_headers(&parts.headers);

        if parts.status.is_success() {
            let entry =
                CachedResponse::new(parts.status.as_u16(), headers.clone(), bytes.clone(), self.page_ttl);
            let cache = self.cache.clone();
            let key = key.to_string();
            self.background.spawn("page-cache-write", async move {
                cache
                    .put(&key, entry)
                    .await
                    .map_err(|e| eyre::eyre!("cache write for '{key}' failed: {e}"))
            });
        }

        metrics::record_cache_event("page", "miss");
        Ok(FetchedPage {
            status: parts.status,
            headers,
            body: bytes,
            cache_status: CacheStatus::Miss,
            from_fallback: false,
        })
    }

    async fn fallback(&self, key: &str) -> Result<FetchedPage, HandlerError> {
        match self.cache.get(key).await {
            Ok(Some(entry)) => {
                metrics::record_cache_event("page", "fallback");
                tracing::info!("Serving stale cache entry for '{}'", key);
                Ok(FetchedPage {
                    status: StatusCode::from_u16(entry.status)
                        .unwrap_or(StatusCode::OK),
                    headers: entry.headers,
                    body: entry.body,
                    cache_status: CacheStatus::Hit,
                    from_fallback: true,
                })
            }
            Ok(None) => Err(HandlerError::OriginUnavailable(format!(
                "origin down and no cached copy for '{key}'"
            ))),
            Err(e) => Err(HandlerError::OriginUnavailable(format!(
                "origin down and cache lookup failed for '{key}': {e}"
            ))),
        }
    }
}

/// Copy response headers, dropping hop-by-hop and per-client fields.
fn retained_headers(headers: &hyper::HeaderMap) -> Vec<(String, String)> {
    headers
        .iter()
        .filter(|(name, _)| {
            !UNCACHEABLE_HEADERS
                .iter()
                .any(|skip| name.as_str().eq_ignore_ascii_case(skip))
        })
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_string(), v.to_string()))
        })
        .collect()
}

fn build_response(
    entry: &CachedResponse,
    cache_status: CacheStatus,
) -> Result<Response<AxumBody>, HandlerError> {
    let mut builder = Response::builder().status(
        StatusCode::from_u16(entry.status).unwrap_or(StatusCode::OK),
    );
    for (name, value) in &entry.headers {
        builder = builder.header(name, value);
    }
    builder
        .header("x-cache-status", cache_status.as_str())
        .body(AxumBody::from(entry.body.clone()))
        .map_err(|e| HandlerError::InternalError(format!("response build failed: {e}")))
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use async_trait::async_trait;
    use hyper::Request;
    use tokio::sync::Mutex;

    use super::*;
    use crate::adapters::memory_cache::InMemoryCacheStore;
    use crate::ports::http_client::{HttpClientError, HttpClientResult};

    enum Scripted {
        Respond(u16, &'static str, &'static str),
        Fail,
    }

    struct ScriptedClient {
        script: Mutex<VecDeque<Scripted>>,
    }

    impl ScriptedClient {
        fn new(script: Vec<Scripted>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into()),
            })
        }
    }

    #[async_trait]
    impl crate::ports::http_client::HttpClient for ScriptedClient {
        async fn send_request(
            &self,
            _req: Request<AxumBody>,
        ) -> HttpClientResult<Response<AxumBody>> {
            match self.script.lock().await.pop_front() {
                Some(Scripted::Respond(status, content_type, body)) => Ok(Response::builder()
                    .status(status)
                    .header(header::CONTENT_TYPE, content_type)
                    .body(AxumBody::from(body))
                    .unwrap()),
                Some(Scripted::Fail) | None => {
                    Err(HttpClientError::ConnectionError("scripted failure".to_string()))
                }
            }
        }
    }

    fn fetcher(client: Arc<ScriptedClient>, cache: Arc<InMemoryCacheStore>) -> CacheAsideFetcher {
        CacheAsideFetcher::new(
            client,
            cache,
            BackgroundTasks::new(),
            Duration::from_secs(3600),
            Duration::from_secs(31_536_000),
        )
    }

    #[tokio::test]
    async fn test_page_fallback_serves_cached_body() {
        let client = ScriptedClient::new(vec![
            Scripted::Respond(200, "text/html", "<html>fresh</html>"),
            Scripted::Fail,
        ]);
        let cache = Arc::new(InMemoryCacheStore::new());
        let fetcher = fetcher(client, cache);

        let first = fetcher.fetch_page("http://origin/", "page:/").await.unwrap();
        assert!(!first.from_fallback);
        fetcher.background.drain().await;

        let second = fetcher.fetch_page("http://origin/", "page:/").await.unwrap();
        assert!(second.from_fallback);
        assert_eq!(second.body, Bytes::from_static(b"<html>fresh</html>"));
        assert_eq!(second.cache_status, CacheStatus::Hit);
    }

    #[tokio::test]
    async fn test_page_cold_cache_failure_is_origin_unavailable() {
        let client = ScriptedClient::new(vec![Scripted::Fail]);
        let cache = Arc::new(InMemoryCacheStore::new());
        let fetcher = fetcher(client, cache);

        let err = fetcher.fetch_page("http://origin/", "page:/").await.unwrap_err();
        assert_eq!(err.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_page_5xx_triggers_fallback_path() {
        let client = ScriptedClient::new(vec![
            Scripted::Respond(200, "text/html", "old"),
            Scripted::Respond(502, "text/plain", "bad"),
        ]);
        let cache = Arc::new(InMemoryCacheStore::new());
        let fetcher = fetcher(client, cache);

        fetcher.fetch_page("http://origin/", "page:/x").await.unwrap();
        fetcher.background.drain().await;

        let fallback = fetcher.fetch_page("http://origin/", "page:/x").await.unwrap();
        assert!(fallback.from_fallback);
        assert_eq!(fallback.body, Bytes::from_static(b"old"));
    }

    #[tokio::test]
    async fn test_page_4xx_passes_through_uncached() {
        let client = ScriptedClient::new(vec![Scripted::Respond(404, "text/html", "nope")]);
        let cache = Arc::new(InMemoryCacheStore::new());
        let fetcher = fetcher(client, cache.clone());

        let page = fetcher.fetch_page("http://origin/gone", "page:/gone").await.unwrap();
        assert_eq!(page.status, StatusCode::NOT_FOUND);
        assert!(!page.from_fallback);
        fetcher.background.drain().await;
        assert!(cache.get("page:/gone").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_asset_miss_then_hit() {
        let client = ScriptedClient::new(vec![Scripted::Respond(200, "image/png", "png-bytes")]);
        let cache = Arc::new(InMemoryCacheStore::new());
        let fetcher = fetcher(client, cache);

        let miss = fetcher
            .fetch_asset("http://origin/logo.png", "asset:/logo.png")
            .await
            .unwrap();
        assert_eq!(miss.headers().get("x-cache-status").unwrap(), "MISS");
        assert!(
            miss.headers()
                .get(header::CACHE_CONTROL)
                .unwrap()
                .to_str()
                .unwrap()
                .contains("immutable")
        );

        // Script is exhausted: a second origin fetch would fail, so this must
        // come from the cache.
        let hit = fetcher
            .fetch_asset("http://origin/logo.png", "asset:/logo.png")
            .await
            .unwrap();
        assert_eq!(hit.headers().get("x-cache-status").unwrap(), "HIT");
    }
}
