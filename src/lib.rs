//! Verge - a resilient edge router for a content and market-data site.
//!
//! Verge sits between clients and two origins: a static frontend bundle and
//! a dynamic backend API. It implements a **hexagonal architecture**: pure
//! routing, caching and rewriting logic lives in `core`, external effects
//! hide behind the traits in `ports`, and `adapters` supplies the concrete
//! HTTP client, stores and axum wiring.
//!
//! # Features
//! - Path classification dispatching to sitemap, proxy, asset and page flows
//! - Cache-aside fetching with stale fallback when the origin is down
//! - A key-value replica of a sharded sitemap index, servable during origin
//!   outages and repopulated by a rate-limited scheduled refresher
//! - Per-route streaming HTML rewriting that injects crawler metadata and a
//!   preloaded state payload
//! - Fixed security headers on every response, error paths included
//! - Structured tracing via `tracing` and exporter-agnostic metrics
//!
//! # Quick Example
//! ```no_run
//! use std::sync::Arc;
//!
//! use verge::{
//!     adapters::{EdgeHandler, HttpClientAdapter, InMemoryCacheStore, InMemoryKvStore, build_router},
//!     config::EdgeConfig,
//!     utils::BackgroundTasks,
//! };
//!
//! # #[tokio::main] async fn main() -> eyre::Result<()> {
//! let config = Arc::new(EdgeConfig::default());
//! let client = Arc::new(HttpClientAdapter::new(config.origin.fetch_timeout())?);
//! let handler = Arc::new(EdgeHandler::new(
//!     config,
//!     client,
//!     Arc::new(InMemoryCacheStore::new()),
//!     Arc::new(InMemoryKvStore::new()),
//!     BackgroundTasks::new(),
//! ));
//! let app = build_router(handler);
//! # let _ = app; Ok(()) }
//! ```
//!
//! # Error Handling
//! All fallible APIs return `eyre::Result<T>` or a domain specific error type
//! from `ports`. Request-path failures degrade before they surface: pages
//! fall back to the cache, the sitemap index degrades to a minimal valid
//! document, and hydration failures return the unmodified page.
//!
//! # Concurrency & Data Structures
//! Request handling shares no in-process mutable state beyond the injected
//! stores; the in-memory adapters use `scc::HashMap` and all writes are
//! idempotent full-value replacements. Fire-and-forget cache writes run on a
//! task tracker drained at shutdown.
//!
//! # License
//! Licensed under Apache-2.0.
pub mod config;
pub mod metrics;
pub mod ports;
pub mod tracing_setup;
pub mod utils;

// These modules are implementation details and should not be directly used by users
pub mod adapters;
pub mod core;

// Re-export the specific types needed by the binary crate
pub use crate::{
    adapters::{EdgeHandler, HttpClientAdapter, InMemoryCacheStore, InMemoryKvStore, build_router},
    core::{CacheAsideFetcher, HydrationEngine, SitemapRefresher, SitemapService},
    ports::http_client::HttpClient,
    utils::BackgroundTasks,
};
