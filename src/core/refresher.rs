//! Scheduled sitemap replica refresh.
//!
//! Each cycle pulls the meta record from the origin, replaces the KV copy
//! wholesale, then refreshes a bounded batch of chunk entries. The batch
//! starts at a rotating in-process cursor so large catalogs are covered
//! across cycles instead of the same prefix being rewritten forever.
//! Per-chunk origin fetches are paced by a rate limiter; one bad chunk never
//! aborts the batch. If the meta fetch itself fails the cycle aborts and the
//! existing KV state stays authoritative.
use std::{
    num::NonZeroU32,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use eyre::{Result, WrapErr};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use http_body_util::BodyExt;
use hyper::header;

use crate::{
    config::EdgeConfig,
    core::sitemap::{META_KEY, SitemapMetaRecord, chunk_key, chunk_origin_url},
    metrics,
    ports::{http_client::HttpClient, kv_store::KeyValueStore},
};

/// Outcome of one refresh cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleStats {
    pub candidates: usize,
    pub refreshed: usize,
    pub failed: usize,
}

pub struct SitemapRefresher {
    kv: Arc<dyn KeyValueStore>,
    client: Arc<dyn HttpClient>,
    api_base: String,
    meta_ttl: Duration,
    chunk_ttl: Duration,
    batch_size: usize,
    cursor: AtomicUsize,
    pacer: DefaultDirectRateLimiter,
}

impl SitemapRefresher {
    pub fn new(
        kv: Arc<dyn KeyValueStore>,
        client: Arc<dyn HttpClient>,
        config: &EdgeConfig,
    ) -> Self {
        let rps = NonZeroU32::new(config.refresh.origin_rps).unwrap_or(NonZeroU32::MIN);
        Self {
            kv,
            client,
            api_base: config.origin.api_base.clone(),
            meta_ttl: config.refresh.meta_ttl(),
            chunk_ttl: config.sitemap.chunk_ttl(),
            batch_size: config.refresh.batch_size,
            cursor: AtomicUsize::new(0),
            pacer: RateLimiter::direct(Quota::per_second(rps)),
        }
    }

    /// Run one refresh cycle. Directly invocable so the schedule stays out of
    /// the logic under test.
    pub async fn run_cycle(&self) -> Result<CycleStats> {
        let meta = self
            .fetch_meta()
            .await
            .wrap_err("sitemap meta refresh failed, keeping existing replica")?;

        let encoded = serde_json::to_string(&meta).wrap_err("sitemap meta encode failed")?;
        self.kv
            .put(META_KEY, encoded, Some(self.meta_ttl))
            .await
            .map_err(|e| eyre::eyre!("sitemap meta write failed: {e}"))?;

        let candidates: Vec<&str> = meta.chunk_paths().collect();
        let start = self.cursor.fetch_add(self.batch_size, Ordering::Relaxed);
        let batch = select_batch(&candidates, start, self.batch_size);

        let mut refreshed = 0usize;
        let mut failed = 0usize;
        for chunk in &batch {
            self.pacer.until_ready().await;
            match self.refresh_chunk(chunk).await {
                Ok(()) => refreshed += 1,
                Err(e) => {
                    failed += 1;
                    tracing::warn!("Chunk '{}' refresh failed, skipping: {:#}", chunk, e);
                }
            }
        }

        Ok(CycleStats {
            candidates: candidates.len(),
            refreshed,
            failed,
        })
    }

    async fn fetch_meta(&self) -> Result<SitemapMetaRecord> {
        let url = format!("{}/api/sitemap/meta", self.api_base);
        let response = self
            .client
            .get(&url)
            .await
            .wrap_err_with(|| format!("meta fetch from {url} failed"))?;

        if !response.status().is_success() {
            eyre::bail!("meta fetch returned {}", response.status());
        }

        let bytes = response
            .into_body()
            .collect()
            .await
            .wrap_err("meta body read failed")?
            .to_bytes();
        serde_json::from_slice(&bytes).wrap_err("meta record is not valid JSON")
    }

    async fn refresh_chunk(&self, chunk: &str) -> Result<()> {
        let url = chunk_origin_url(&self.api_base, chunk);
        let response = self.client.get(&url).await.wrap_err("chunk fetch failed")?;

        if !response.status().is_success() {
            eyre::bail!("chunk fetch returned {}", response.status());
        }

        let is_xml = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|content_type| content_type.contains("xml"));
        if !is_xml {
            eyre::bail!("chunk content-type is not XML");
        }

        let bytes = response
            .into_body()
            .collect()
            .await
            .wrap_err("chunk body read failed")?
            .to_bytes();
        let xml = String::from_utf8_lossy(&bytes).into_owned();

        self.kv
            .put(&chunk_key(chunk), xml, Some(self.chunk_ttl))
            .await
            .map_err(|e| eyre::eyre!("chunk write failed: {e}"))
    }
}

/// Pick `size` entries starting at `start`, wrapping around the catalog.
fn select_batch<'a>(candidates: &[&'a str], start: usize, size: usize) -> Vec<&'a str> {
    if candidates.is_empty() || size == 0 {
        return Vec::new();
    }

    let len = candidates.len();
    (0..size.min(len))
        .map(|offset| candidates[(start + offset) % len])
        .collect()
}

/// Drive refresh cycles on a fixed cadence until the task is aborted. The
/// first tick fires immediately to warm the replica at startup.
pub fn spawn_refresh_loop(
    refresher: Arc<SitemapRefresher>,
    interval: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        tracing::info!(
            "Sitemap refresher running every {}",
            humantime::format_duration(interval)
        );
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            match refresher.run_cycle().await {
                Ok(stats) => {
                    metrics::record_refresh_cycle("ok", stats.refreshed, stats.failed);
                    tracing::info!(
                        "Refresh cycle done: {}/{} chunks refreshed ({} failed)",
                        stats.refreshed,
                        stats.candidates,
                        stats.failed
                    );
                }
                Err(e) => {
                    metrics::record_refresh_cycle("error", 0, 0);
                    tracing::error!("Refresh cycle aborted: {:#}", e);
                }
            }
        }
    })
}
