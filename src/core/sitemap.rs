//! Sitemap replica read path.
//!
//! # Responsibilities
//! - Synthesize the sitemap index from the replicated meta record
//! - Serve dynamic chunks from KV, read-through to the origin on miss
//!
//! # Design Decisions
//! - The index never errors: crawlers must always get a parseable document,
//!   so a missing or unreadable meta record degrades to a minimal index
//!   listing only the static sitemap
//! - Chunks have no stale fallback; a miss with the origin down is a 502
//! - All synthesized locs are XML-escaped; chunk bytes from KV or origin are
//!   passed through untouched
use std::sync::Arc;

use axum::body::Body as AxumBody;
use chrono::{DateTime, Utc};
use http_body_util::BodyExt;
use hyper::{Response, StatusCode, header};
use serde::{Deserialize, Serialize};

use crate::{
    config::EdgeConfig,
    ports::{http_client::HttpClient, http_server::HandlerError, kv_store::KeyValueStore},
    utils::BackgroundTasks,
};

/// KV key of the single meta record.
pub const META_KEY: &str = "sitemap:meta";

/// KV key of one replicated chunk.
pub fn chunk_key(chunk: &str) -> String {
    format!("sitemap:{chunk}")
}

/// Upstream URL a chunk is fetched from on refresh or read-through.
pub fn chunk_origin_url(api_base: &str, chunk: &str) -> String {
    format!("{api_base}/api/sitemap/{chunk}")
}

/// Catalog of dynamic sitemap chunks, replicated wholesale from the origin.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct SitemapMetaRecord {
    pub blogs: Vec<String>,
    pub markets: Vec<String>,
    pub generated_at: Option<DateTime<Utc>>,
}

impl Default for SitemapMetaRecord {
    fn default() -> Self {
        Self {
            blogs: Vec::new(),
            markets: Vec::new(),
            generated_at: None,
        }
    }
}

impl SitemapMetaRecord {
    /// All chunk paths in index order: blogs first, then markets.
    pub fn chunk_paths(&self) -> impl Iterator<Item = &str> {
        self.blogs
            .iter()
            .chain(self.markets.iter())
            .map(String::as_str)
    }
}

pub struct SitemapService {
    kv: Arc<dyn KeyValueStore>,
    client: Arc<dyn HttpClient>,
    background: BackgroundTasks,
    public_base: String,
    api_base: String,
    static_sitemap: String,
    chunk_ttl: std::time::Duration,
    response_max_age_secs: u64,
}

impl SitemapService {
    pub fn new(
        kv: Arc<dyn KeyValueStore>,
        client: Arc<dyn HttpClient>,
        background: BackgroundTasks,
        config: &EdgeConfig,
    ) -> Self {
        Self {
            kv,
            client,
            background,
            public_base: config.site.public_base.clone(),
            api_base: config.origin.api_base.clone(),
            static_sitemap: config.sitemap.static_sitemap.clone(),
            chunk_ttl: config.sitemap.chunk_ttl(),
            response_max_age_secs: config.sitemap.response_max_age_secs,
        }
    }

    /// Serve `/sitemap.xml`.
    pub async fn index(&self) -> Response<AxumBody> {
        let meta = self.read_meta().await;
        let xml = self.render_index(meta.as_ref());
        self.xml_response(StatusCode::OK, xml)
    }

    /// Serve `/sitemap-dynamic/<chunk>`.
    pub async fn chunk(&self, chunk: &str) -> Result<Response<AxumBody>, HandlerError> {
        if chunk.is_empty() || chunk.contains("..") {
            return Err(HandlerError::NotFound(format!("invalid chunk path: {chunk}")));
        }

        let key = chunk_key(chunk);
        match self.kv.get(&key).await {
            Ok(Some(xml)) => return Ok(self.xml_response(StatusCode::OK, xml)),
            Ok(None) => {}
            Err(e) => tracing::warn!("KV read for '{}' failed: {}", key, e),
        }

        // Read-through: one direct origin fetch, backfilled without blocking.
        let url = chunk_origin_url(&self.api_base, chunk);
        let response = self
            .client
            .get(&url)
            .await
            .map_err(|e| HandlerError::BadGateway(format!("chunk fetch failed: {e}")))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(HandlerError::NotFound(format!("unknown sitemap chunk: {chunk}")));
        }
        if !response.status().is_success() {
            return Err(HandlerError::BadGateway(format!(
                "origin returned {} for chunk {chunk}",
                response.status()
            )));
        }

        let is_xml = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|content_type| content_type.contains("xml"));

        let bytes = response
            .into_body()
            .collect()
            .await
            .map_err(|e| HandlerError::BadGateway(format!("chunk body read failed: {e}")))?
            .to_bytes();
        let xml = String::from_utf8_lossy(&bytes).into_owned();

        if is_xml {
            let kv = self.kv.clone();
            let ttl = self.chunk_ttl;
            let value = xml.clone();
            self.background.spawn("sitemap-chunk-backfill", async move {
                kv.put(&key, value, Some(ttl))
                    .await
                    .map_err(|e| eyre::eyre!("chunk backfill for '{key}' failed: {e}"))
            });
        } else {
            tracing::warn!("Origin chunk '{}' is not XML, serving without backfill", chunk);
        }

        Ok(self.xml_response(StatusCode::OK, xml))
    }

    async fn read_meta(&self) -> Option<SitemapMetaRecord> {
        let raw = match self.kv.get(META_KEY).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!("KV read for '{}' failed: {}", META_KEY, e);
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(meta) => Some(meta),
            Err(e) => {
                tracing::warn!("Sitemap meta record is unreadable, degrading to minimal index: {}", e);
                None
            }
        }
    }

    fn render_index(&self, meta: Option<&SitemapMetaRecord>) -> String {
        let mut xml = String::with_capacity(512);
        xml.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
        xml.push_str("<sitemapindex xmlns=\"http://www.sitemaps.org/schemas/sitemap/0.9\">\n");

        push_sitemap_entry(
            &mut xml,
            &format!("{}{}", self.public_base, self.static_sitemap),
        );
        if let Some(meta) = meta {
            for chunk in meta.chunk_paths() {
                push_sitemap_entry(
                    &mut xml,
                    &format!("{}/sitemap-dynamic/{}", self.public_base, chunk),
                );
            }
        }

        xml.push_str("</sitemapindex>\n");
        xml
    }

    fn xml_response(&self, status: StatusCode, xml: String) -> Response<AxumBody> {
        let cache_control = format!("public, max-age={}", self.response_max_age_secs);
        Response::builder()
            .status(status)
            .header(header::CONTENT_TYPE, "application/xml")
            .header(header::CACHE_CONTROL, cache_control)
            .body(AxumBody::from(xml))
            .unwrap_or_else(|_| Response::new(AxumBody::empty()))
    }
}

fn push_sitemap_entry(xml: &mut String, loc: &str) {
    xml.push_str("  <sitemap><loc>");
    xml.push_str(&xml_escape(loc));
    xml.push_str("</loc></sitemap>\n");
}

/// Escape the five XML-reserved characters.
pub fn xml_escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use hyper::Request;

    use super::*;
    use crate::{
        adapters::memory_kv::InMemoryKvStore,
        ports::http_client::{HttpClientError, HttpClientResult},
    };

    struct UnreachableClient;

    #[async_trait]
    impl HttpClient for UnreachableClient {
        async fn send_request(
            &self,
            _req: Request<AxumBody>,
        ) -> HttpClientResult<Response<AxumBody>> {
            Err(HttpClientError::ConnectionError("unreachable".to_string()))
        }
    }

    fn service() -> SitemapService {
        SitemapService::new(
            Arc::new(InMemoryKvStore::new()),
            Arc::new(UnreachableClient),
            BackgroundTasks::new(),
            &EdgeConfig::default(),
        )
    }

    #[test]
    fn test_minimal_index_is_wellformed() {
        let xml = service().render_index(None);
        assert!(xml.starts_with("<?xml version=\"1.0\""));
        assert!(xml.contains("<sitemapindex"));
        assert!(xml.ends_with("</sitemapindex>\n"));
        assert_eq!(xml.matches("<sitemap>").count(), 1);
        assert!(xml.contains("/sitemap-static.xml"));
    }

    #[test]
    fn test_index_lists_all_chunks() {
        let meta = SitemapMetaRecord {
            blogs: vec!["blog-0.xml".to_string(), "blog-1.xml".to_string()],
            markets: vec!["market-0.xml".to_string()],
            generated_at: None,
        };
        let xml = service().render_index(Some(&meta));
        assert_eq!(xml.matches("<sitemap>").count(), 4);
        assert!(xml.contains("/sitemap-dynamic/blog-1.xml"));
        assert!(xml.contains("/sitemap-dynamic/market-0.xml"));
    }

    #[test]
    fn test_locs_are_escaped() {
        let meta = SitemapMetaRecord {
            blogs: vec!["blog.xml?page=1&size=2".to_string()],
            markets: vec![],
            generated_at: None,
        };
        let xml = service().render_index(Some(&meta));
        assert!(xml.contains("page=1&amp;size=2"));
        assert!(!xml.contains("page=1&size=2"));
    }

    #[test]
    fn test_meta_record_wire_format() {
        let meta: SitemapMetaRecord =
            serde_json::from_str(r#"{"blogs":["a.xml"],"markets":[]}"#).unwrap();
        assert_eq!(meta.blogs, vec!["a.xml"]);
        assert!(meta.generated_at.is_none());
        assert_eq!(meta.chunk_paths().count(), 1);
    }
}
