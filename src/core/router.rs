//! Request path classification.
//!
//! # Responsibilities
//! - Map `(method, path)` to a [`RouteClass`] in fixed precedence order
//! - Capture path parameters (chunk name, page name, slug + id, ticker)
//!
//! # Design Decisions
//! - Pure function, no I/O, table-testable against path fixtures
//! - Precedence matters: an API path must never classify as a page route,
//!   and `/sitemap.xml` wins over the generic `.xml` asset extension
//! - Non-GET/HEAD traffic only ever proxies (`ApiProxy`) or passes through
//!   (`Fallback`); page handlers are read-only
use http::Method;
use once_cell::sync::Lazy;
use regex::Regex;

/// Extensions served through the asset cache path.
const ASSET_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "gif", "webp", "css", "js", "json", "ico", "xml", "txt",
];

/// Pages with fixed hydration metadata.
const STATIC_PAGES: &[&str] = &["about", "vision", "contact"];

/// At least one category segment, then slug, then a numeric id.
static ARTICLE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^/(?:[A-Za-z0-9_-]+/)+(?P<slug>[^/]+)/(?P<id>\d+)/?$")
        .expect("article route pattern")
});

static MARKET_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^/market/(?P<ticker>[^/]+)/?$").expect("market route pattern"));

/// Which handler a request dispatches to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteClass {
    SitemapIndex,
    SitemapChunk { chunk: String },
    ApiProxy,
    StaticAsset,
    Homepage,
    StaticPage { page: &'static str },
    ArticlePage { slug: String, id: String },
    MarketPage { ticker: String },
    Fallback,
}

impl RouteClass {
    /// Stable label used for metrics and request spans.
    pub fn label(&self) -> &'static str {
        match self {
            RouteClass::SitemapIndex => "sitemap_index",
            RouteClass::SitemapChunk { .. } => "sitemap_chunk",
            RouteClass::ApiProxy => "api_proxy",
            RouteClass::StaticAsset => "static_asset",
            RouteClass::Homepage => "homepage",
            RouteClass::StaticPage { .. } => "static_page",
            RouteClass::ArticlePage { .. } => "article_page",
            RouteClass::MarketPage { .. } => "market_page",
            RouteClass::Fallback => "fallback",
        }
    }
}

/// Classify a request path. Evaluated top to bottom; the first match wins.
pub fn classify(method: &Method, path: &str) -> RouteClass {
    // Writes never hit page or sitemap handlers. API traffic keeps proxying;
    // everything else passes through to the frontend origin unmodified.
    if method != Method::GET && method != Method::HEAD {
        if is_api_path(path) {
            return RouteClass::ApiProxy;
        }
        return RouteClass::Fallback;
    }

    if path == "/sitemap.xml" {
        return RouteClass::SitemapIndex;
    }

    if let Some(chunk) = path.strip_prefix("/sitemap-dynamic/") {
        if !chunk.is_empty() {
            return RouteClass::SitemapChunk {
                chunk: chunk.to_string(),
            };
        }
        return RouteClass::Fallback;
    }

    if is_api_path(path) {
        return RouteClass::ApiProxy;
    }

    if has_asset_extension(path) {
        return RouteClass::StaticAsset;
    }

    if path == "/" {
        return RouteClass::Homepage;
    }

    let trimmed = path.strip_suffix('/').unwrap_or(path);
    if let Some(page) = STATIC_PAGES
        .iter()
        .copied()
        .find(|page| trimmed.strip_prefix('/') == Some(*page))
    {
        return RouteClass::StaticPage { page };
    }

    if let Some(captures) = ARTICLE_PATTERN.captures(path) {
        return RouteClass::ArticlePage {
            slug: captures["slug"].to_string(),
            id: captures["id"].to_string(),
        };
    }

    if let Some(captures) = MARKET_PATTERN.captures(path) {
        let raw = &captures["ticker"];
        let ticker = urlencoding::decode(raw)
            .map(|t| t.into_owned())
            .unwrap_or_else(|_| raw.to_string());
        return RouteClass::MarketPage { ticker };
    }

    RouteClass::Fallback
}

fn is_api_path(path: &str) -> bool {
    path == "/api" || path.starts_with("/api/")
}

fn has_asset_extension(path: &str) -> bool {
    let file = path.rsplit('/').next().unwrap_or(path);
    match file.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => {
            let ext = ext.to_ascii_lowercase();
            ASSET_EXTENSIONS.iter().any(|known| *known == ext)
        }
        _ => false,
    }
}
