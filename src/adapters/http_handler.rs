use std::sync::Arc;

use axum::{
    Router,
    body::Body as AxumBody,
    http::{Method, StatusCode, header},
    middleware as axum_middleware,
    response::IntoResponse,
};
use bytes::Bytes;
use hyper::{Request, Response, header::HeaderValue};

use crate::{
    adapters::middleware,
    config::EdgeConfig,
    core::{
        CacheAsideFetcher, HydrationEngine, SitemapService,
        fetcher::FetchedPage,
        router::{RouteClass, classify},
    },
    metrics,
    ports::{
        cache_store::CacheStore,
        http_client::HttpClient,
        http_server::{HandlerError, HttpHandler},
        kv_store::KeyValueStore,
    },
    utils::BackgroundTasks,
};

/// HTTP handler for the Verge edge router. One instance serves every request;
/// all mutable state lives behind the injected cache and KV ports.
pub struct EdgeHandler {
    config: Arc<EdgeConfig>,
    client: Arc<dyn HttpClient>,
    fetcher: CacheAsideFetcher,
    sitemap: SitemapService,
    hydration: HydrationEngine,
}

impl EdgeHandler {
    pub fn new(
        config: Arc<EdgeConfig>,
        client: Arc<dyn HttpClient>,
        cache: Arc<dyn CacheStore>,
        kv: Arc<dyn KeyValueStore>,
        background: BackgroundTasks,
    ) -> Self {
        let fetcher = CacheAsideFetcher::new(
            client.clone(),
            cache,
            background.clone(),
            config.cache.page_ttl(),
            config.cache.asset_ttl(),
        );
        let sitemap = SitemapService::new(kv, client.clone(), background, &config);
        let hydration = HydrationEngine::new(client.clone(), &config);

        Self {
            config,
            client,
            fetcher,
            sitemap,
            hydration,
        }
    }

    /// Classify and dispatch one request.
    pub async fn handle(&self, req: Request<AxumBody>) -> Result<Response<AxumBody>, HandlerError> {
        let method = req.method().clone();
        let path = req.uri().path().to_string();
        let route = classify(&method, &path);
        let route_label = route.label();

        let _timer = metrics::RequestTimer::new(route_label, method.as_str());
        tracing::debug!("Classified {} {} as {}", method, path, route_label);

        let result = self.dispatch(route, req).await;

        let status = match &result {
            Ok(response) => response.status().as_u16(),
            Err(e) => e.status().as_u16(),
        };
        metrics::increment_request_total(route_label, method.as_str(), status);

        result
    }

    async fn dispatch(
        &self,
        route: RouteClass,
        req: Request<AxumBody>,
    ) -> Result<Response<AxumBody>, HandlerError> {
        let method = req.method().clone();
        let path = req.uri().path().to_string();

        match route {
            RouteClass::SitemapIndex => Ok(self.sitemap.index().await),
            RouteClass::SitemapChunk { chunk } => self.sitemap.chunk(&chunk).await,
            RouteClass::ApiProxy => self.proxy_api(req).await,
            RouteClass::StaticAsset => {
                let url = format!(
                    "{}{}",
                    self.config.origin.frontend_base,
                    path_and_query(&req)
                );
                self.fetcher.fetch_asset(&url, &asset_key(&path)).await
            }
            RouteClass::Homepage => {
                let mut page = self.fetch_shell(&path).await?;
                if is_hydratable(&page) {
                    let html = String::from_utf8_lossy(&page.body).into_owned();
                    page.body = Bytes::from(self.hydration.hydrate_home(html));
                }
                build_page_response(page)
            }
            RouteClass::StaticPage { page: name } => {
                let mut page = self.fetch_shell(&path).await?;
                if is_hydratable(&page) {
                    let html = String::from_utf8_lossy(&page.body).into_owned();
                    page.body = Bytes::from(self.hydration.hydrate_static_page(name, html));
                }
                build_page_response(page)
            }
            RouteClass::ArticlePage { slug, id } => {
                if let Some(html) = self.hydration.fetch_materialized(&slug).await {
                    return Response::builder()
                        .status(StatusCode::OK)
                        .header(header::CONTENT_TYPE, "text/html; charset=utf-8")
                        .header("x-seo-source", "materialized")
                        .body(AxumBody::from(html))
                        .map_err(|e| {
                            HandlerError::InternalError(format!("response build failed: {e}"))
                        });
                }

                let mut page = self.fetch_shell(&path).await?;
                if is_hydratable(&page) {
                    let html = String::from_utf8_lossy(&page.body).into_owned();
                    page.body = Bytes::from(self.hydration.hydrate_article(&id, html).await);
                }
                build_page_response(page)
            }
            RouteClass::MarketPage { ticker } => {
                let mut page = self.fetch_shell(&path).await?;
                if is_hydratable(&page) {
                    let html = String::from_utf8_lossy(&page.body).into_owned();
                    page.body = Bytes::from(self.hydration.hydrate_market(&ticker, html).await);
                }
                build_page_response(page)
            }
            RouteClass::Fallback => {
                if method == Method::GET || method == Method::HEAD {
                    // Cached or fetched HTML, served unmodified
                    let page = self.fetch_shell(&path).await?;
                    build_page_response(page)
                } else {
                    self.passthrough_frontend(req).await
                }
            }
        }
    }

    /// Fetch the HTML document for a page route through the cache-aside path.
    async fn fetch_shell(&self, path: &str) -> Result<FetchedPage, HandlerError> {
        let url = format!("{}{}", self.config.origin.frontend_base, path);
        self.fetcher.fetch_page(&url, &page_key(path)).await
    }

    /// Proxy API traffic to the backend origin. Image sub-paths are content
    /// addressed and go through the asset cache instead.
    async fn proxy_api(
        &self,
        mut req: Request<AxumBody>,
    ) -> Result<Response<AxumBody>, HandlerError> {
        let path = req.uri().path().to_string();

        if req.method() == Method::GET && path.starts_with("/api/images/") {
            let url = format!("{}{}", self.config.origin.api_base, path_and_query(&req));
            return self.fetcher.fetch_asset(&url, &asset_key(&path)).await;
        }

        let target = format!("{}{}", self.config.origin.api_base, path_and_query(&req));
        let original_host = req.headers().get(header::HOST).cloned();

        *req.uri_mut() = target
            .parse()
            .map_err(|e| HandlerError::InternalError(format!("Failed to parse origin URI: {e}")))?;

        let headers = req.headers_mut();
        if let Some(host) = original_host {
            headers.insert("X-Forwarded-Host", host);
        }
        headers.insert("X-Forwarded-Proto", HeaderValue::from_static("http"));

        match self.client.send_request(req).await {
            Ok(response) => Ok(response),
            Err(e) => {
                tracing::error!("API origin request failed: {}", e);
                Err(HandlerError::BadGateway(format!("API origin request failed: {e}")))
            }
        }
    }

    /// Forward non-GET traffic for unclassified paths to the frontend origin
    /// without touching the cache.
    async fn passthrough_frontend(
        &self,
        mut req: Request<AxumBody>,
    ) -> Result<Response<AxumBody>, HandlerError> {
        let target = format!(
            "{}{}",
            self.config.origin.frontend_base,
            path_and_query(&req)
        );
        *req.uri_mut() = target
            .parse()
            .map_err(|e| HandlerError::InternalError(format!("Failed to parse origin URI: {e}")))?;

        match self.client.send_request(req).await {
            Ok(response) => Ok(response),
            Err(e) => Err(HandlerError::BadGateway(format!(
                "frontend origin request failed: {e}"
            ))),
        }
    }
}

impl HttpHandler for EdgeHandler {
    async fn handle_request(
        &self,
        req: Request<AxumBody>,
    ) -> Result<Response<AxumBody>, HandlerError> {
        self.handle(req).await
    }
}

/// Pages are keyed by bare path: query variants collapse to one entry.
fn page_key(path: &str) -> String {
    format!("page:{path}")
}

/// Assets are keyed by full path; content is addressed by stable identifier.
fn asset_key(path: &str) -> String {
    format!("asset:{path}")
}

fn path_and_query(req: &Request<AxumBody>) -> String {
    req.uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| req.uri().path().to_string())
}

/// Hydration only touches successful HTML documents; anything else is served
/// as fetched.
fn is_hydratable(page: &FetchedPage) -> bool {
    if !page.status.is_success() {
        return false;
    }
    page.headers
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case("content-type"))
        .map(|(_, value)| value.contains("html"))
        .unwrap_or(true)
}

fn build_page_response(page: FetchedPage) -> Result<Response<AxumBody>, HandlerError> {
    let mut builder = Response::builder().status(page.status);
    for (name, value) in &page.headers {
        builder = builder.header(name, value);
    }
    builder = builder.header("x-cache-status", page.cache_status.as_str());
    if page.from_fallback {
        builder = builder.header("x-fallback-source", "cache");
    }

    builder
        .body(AxumBody::from(page.body))
        .map_err(|e| HandlerError::InternalError(format!("response build failed: {e}")))
}

/// Assemble the axum router: every path funnels into the edge handler, and
/// the security header layer wraps all of it, error responses included.
pub fn build_router(handler: Arc<EdgeHandler>) -> Router {
    Router::new()
        .fallback(move |req: Request<AxumBody>| {
            let handler = handler.clone();
            async move {
                match handler.handle(req).await {
                    Ok(response) => response,
                    Err(e) => e.into_response(),
                }
            }
        })
        .layer(axum_middleware::from_fn(middleware::request_id_middleware))
        .layer(axum_middleware::from_fn(
            middleware::request_timing_middleware,
        ))
        .layer(axum_middleware::from_fn(
            middleware::security_headers_middleware,
        ))
}
