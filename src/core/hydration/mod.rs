//! Per-route SEO hydration.
//!
//! Rewrites document metadata and embeds machine-readable entity snapshots
//! for crawlers, without touching visible page structure. Hydration is an
//! enhancement: every fetch or parse failure here logs, increments a metric
//! and falls through to the unmodified document. The shared cache always
//! stores the pre-hydration document; hydration happens on a per-request
//! copy.
pub mod rewriter;
pub mod state;

use std::sync::Arc;

use http_body_util::BodyExt;
use hyper::header;
use serde_json::Value;

use crate::{config::EdgeConfig, metrics, ports::http_client::HttpClient};

use self::rewriter::HtmlRewriter;

/// Fixed metadata for the known static pages.
const STATIC_PAGE_META: &[(&str, &str, &str)] = &[
    ("about", "About Us", "Who we are and how we cover markets and ideas."),
    ("vision", "Our Vision", "The long view behind our reporting and data."),
    ("contact", "Contact", "How to reach the editorial and data teams."),
];

const HOMEPAGE_DESCRIPTION: &str =
    "Live market quotes, company data and long-form commentary, updated around the clock.";

pub struct HydrationEngine {
    client: Arc<dyn HttpClient>,
    api_base: String,
    frontend_base: String,
    site_name: String,
    public_base: String,
    parent_org_url: String,
}

impl HydrationEngine {
    pub fn new(client: Arc<dyn HttpClient>, config: &EdgeConfig) -> Self {
        Self {
            client,
            api_base: config.origin.api_base.clone(),
            frontend_base: config.origin.frontend_base.clone(),
            site_name: config.site.name.clone(),
            public_base: config.site.public_base.clone(),
            parent_org_url: config.site.parent_org_url.clone(),
        }
    }

    /// Homepage: fixed metadata plus the organization JSON-LD block.
    pub fn hydrate_home(&self, html: String) -> String {
        let title = format!("{} - Market Data & Insights", self.site_name);
        HtmlRewriter::new()
            .set_title(&title)
            .set_meta_name("description", HOMEPAGE_DESCRIPTION)
            .set_meta_property("og:title", &title)
            .append_to_head(state::organization_jsonld(
                &self.site_name,
                &self.public_base,
                &self.parent_org_url,
            ))
            .rewrite(&html)
    }

    /// Known static pages: fixed metadata from the table; unknown names pass
    /// through untouched.
    pub fn hydrate_static_page(&self, page: &str, html: String) -> String {
        let Some((_, title, description)) = STATIC_PAGE_META
            .iter()
            .find(|(name, _, _)| *name == page)
        else {
            return html;
        };

        let title = format!("{} | {}", title, self.site_name);
        HtmlRewriter::new()
            .set_title(&title)
            .set_meta_name("description", *description)
            .set_meta_property("og:title", &title)
            .rewrite(&html)
    }

    /// Pre-rendered article document from the frontend asset store, keyed by
    /// slug. `None` when absent so the caller can fall back to API hydration.
    pub async fn fetch_materialized(&self, slug: &str) -> Option<String> {
        let url = format!(
            "{}/materialized/{}.html",
            self.frontend_base,
            urlencoding::encode(slug)
        );
        let response = match self.client.get(&url).await {
            Ok(response) if response.status().is_success() => response,
            Ok(response) => {
                tracing::debug!("No materialized document for '{}' ({})", slug, response.status());
                return None;
            }
            Err(e) => {
                tracing::debug!("Materialized lookup for '{}' failed: {}", slug, e);
                return None;
            }
        };

        let bytes = response.into_body().collect().await.ok()?.to_bytes();
        let html = String::from_utf8_lossy(&bytes).into_owned();

        // Relative links inside the pre-rendered document resolve against
        // the asset store, not the edge host.
        Some(
            HtmlRewriter::new()
                .set_base_href(format!("{}/", self.frontend_base))
                .rewrite(&html),
        )
    }

    /// Article metadata and preloaded state from the origin API, by id.
    pub async fn hydrate_article(&self, id: &str, html: String) -> String {
        let url = format!("{}/api/posts/{}", self.api_base, urlencoding::encode(id));
        let Some(entity) = self.fetch_json("article", &url).await else {
            return html;
        };

        let Some(entity_title) = entity["title"].as_str() else {
            metrics::record_hydration_failure("article");
            tracing::warn!("Article {} has no title field, skipping hydration", id);
            return html;
        };
        let description = entity["summary"]
            .as_str()
            .or_else(|| entity["description"].as_str());

        let title = format!("{} | {}", entity_title, self.site_name);
        let mut rewriter = HtmlRewriter::new()
            .set_title(&title)
            .set_meta_property("og:title", &title)
            .append_to_head(state::preloaded_state_script(&entity));
        if let Some(description) = description {
            rewriter = rewriter.set_meta_name("description", description);
        }
        rewriter.rewrite(&html)
    }

    /// Market page: widget snapshot by ticker; quote fields drive the title.
    pub async fn hydrate_market(&self, ticker: &str, html: String) -> String {
        let url = format!(
            "{}/api/market/widget/{}",
            self.api_base,
            urlencoding::encode(ticker)
        );
        let Some(widget) = self.fetch_json("market", &url).await else {
            return html;
        };

        let quote = &widget["quoteData"];
        let (Some(name), Some(symbol)) = (quote["name"].as_str(), quote["ticker"].as_str()) else {
            tracing::debug!("Widget for '{}' has no quote data, skipping hydration", ticker);
            return html;
        };

        let title = format!("{} ({}) - Live Quote | {}", name, symbol, self.site_name);
        HtmlRewriter::new()
            .set_title(&title)
            .set_meta_property("og:title", &title)
            .append_to_head(state::preloaded_state_script(&widget))
            .rewrite(&html)
    }

    async fn fetch_json(&self, kind: &'static str, url: &str) -> Option<Value> {
        let response = match self.client.get(url).await {
            Ok(response) if response.status().is_success() => response,
            Ok(response) => {
                metrics::record_hydration_failure(kind);
                tracing::debug!("Hydration fetch {} returned {}", url, response.status());
                return None;
            }
            Err(e) => {
                metrics::record_hydration_failure(kind);
                tracing::debug!("Hydration fetch {} failed: {}", url, e);
                return None;
            }
        };

        let is_json = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|content_type| content_type.contains("json"));
        if !is_json {
            metrics::record_hydration_failure(kind);
            tracing::debug!("Hydration fetch {} is not JSON", url);
            return None;
        }

        let bytes = match response.into_body().collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(e) => {
                metrics::record_hydration_failure(kind);
                tracing::debug!("Hydration body read {} failed: {}", url, e);
                return None;
            }
        };

        match serde_json::from_slice(&bytes) {
            Ok(value) => Some(value),
            Err(e) => {
                // Malformed JSON is the same as a failed fetch: skip.
                metrics::record_hydration_failure(kind);
                tracing::debug!("Hydration payload {} is not valid JSON: {}", url, e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use axum::body::Body as AxumBody;
    use hyper::{Request, Response};

    use super::*;
    use crate::ports::http_client::{HttpClientError, HttpClientResult};

    const SHELL: &str = concat!(
        "<html><head><title>App</title>",
        "<meta name=\"description\" content=\"spa\">",
        "<meta property=\"og:title\" content=\"spa\">",
        "</head><body></body></html>",
    );

    struct SingleResponse {
        status: u16,
        content_type: &'static str,
        body: String,
    }

    #[async_trait]
    impl HttpClient for SingleResponse {
        async fn send_request(
            &self,
            _req: Request<AxumBody>,
        ) -> HttpClientResult<Response<AxumBody>> {
            Ok(Response::builder()
                .status(self.status)
                .header(header::CONTENT_TYPE, self.content_type)
                .body(AxumBody::from(self.body.clone()))
                .unwrap())
        }
    }

    struct Unreachable;

    #[async_trait]
    impl HttpClient for Unreachable {
        async fn send_request(
            &self,
            _req: Request<AxumBody>,
        ) -> HttpClientResult<Response<AxumBody>> {
            Err(HttpClientError::ConnectionError("down".to_string()))
        }
    }

    fn engine(client: impl HttpClient) -> HydrationEngine {
        HydrationEngine::new(Arc::new(client), &EdgeConfig::default())
    }

    #[test]
    fn test_homepage_rewrites_and_appends_jsonld() {
        let out = engine(Unreachable).hydrate_home(SHELL.to_string());
        assert!(out.contains("<title>Example Markets - Market Data &amp; Insights</title>"));
        assert!(out.contains("application/ld+json"));
        assert!(out.find("ld+json").unwrap() < out.find("</head>").unwrap());
    }

    #[test]
    fn test_static_page_uses_table() {
        let out = engine(Unreachable).hydrate_static_page("about", SHELL.to_string());
        assert!(out.contains("<title>About Us | Example Markets</title>"));

        let untouched = engine(Unreachable).hydrate_static_page("mystery", SHELL.to_string());
        assert_eq!(untouched, SHELL);
    }

    #[tokio::test]
    async fn test_market_hydration_builds_quote_title() {
        let widget = r#"{"quoteData":{"name":"Dow Jones","ticker":"^DJI","price":42000.5}}"#;
        let out = engine(SingleResponse {
            status: 200,
            content_type: "application/json",
            body: widget.to_string(),
        })
        .hydrate_market("^DJI", SHELL.to_string())
        .await;

        assert!(out.contains("Dow Jones (^DJI) - Live Quote | Example Markets"));
        assert!(out.contains("window.__PRELOADED_STATE__"));
        assert!(out.contains("42000.5"));
    }

    #[tokio::test]
    async fn test_market_without_quote_falls_through() {
        let out = engine(SingleResponse {
            status: 200,
            content_type: "application/json",
            body: r#"{"chart":{}}"#.to_string(),
        })
        .hydrate_market("^DJI", SHELL.to_string())
        .await;
        assert_eq!(out, SHELL);
    }

    #[tokio::test]
    async fn test_article_hydration_injects_entity() {
        let entity = r#"{"title":"Fed Holds Rates","summary":"No change this cycle.","id":12345}"#;
        let out = engine(SingleResponse {
            status: 200,
            content_type: "application/json",
            body: entity.to_string(),
        })
        .hydrate_article("12345", SHELL.to_string())
        .await;

        assert!(out.contains("<title>Fed Holds Rates | Example Markets</title>"));
        assert!(out.contains("content=\"No change this cycle.\""));
        assert!(out.contains("window.__PRELOADED_STATE__"));
    }

    #[tokio::test]
    async fn test_fetch_failure_returns_document_unchanged() {
        let out = engine(Unreachable)
            .hydrate_article("1", SHELL.to_string())
            .await;
        assert_eq!(out, SHELL);
    }

    #[tokio::test]
    async fn test_malformed_json_returns_document_unchanged() {
        let out = engine(SingleResponse {
            status: 200,
            content_type: "application/json",
            body: "{not json".to_string(),
        })
        .hydrate_market("AAPL", SHELL.to_string())
        .await;
        assert_eq!(out, SHELL);
    }

    #[tokio::test]
    async fn test_materialized_document_gets_base_href() {
        let out = engine(SingleResponse {
            status: 200,
            content_type: "text/html",
            body: "<html><head></head><body>prerendered</body></html>".to_string(),
        })
        .fetch_materialized("fed-rate-decision")
        .await
        .unwrap();

        assert!(out.contains("<base href=\"https://static.example.com/\">"));
        assert!(out.contains("prerendered"));
    }

    #[tokio::test]
    async fn test_materialized_miss_is_none() {
        let miss = engine(SingleResponse {
            status: 404,
            content_type: "text/html",
            body: String::new(),
        })
        .fetch_materialized("nope")
        .await;
        assert!(miss.is_none());
    }
}
