//! Lightweight metrics helpers for Verge.
//!
//! This module exposes a small set of convenience functions and RAII timers
//! wrapping the `metrics` crate macros. It intentionally avoids embedding a
//! concrete exporter (the application can initialize any compatible recorder
//! externally) while still documenting and describing Verge-specific metric
//! names.
//!
//! Provided metrics (labels vary by family):
//! * `verge_requests_total` (counter)
//! * `verge_request_duration_seconds` (histogram)
//! * `verge_cache_events_total` (counter, labels: family, outcome)
//! * `verge_refresh_cycles_total` (counter, labels: outcome)
//! * `verge_refresh_chunks_total` (counter, labels: outcome)
//! * `verge_hydration_failures_total` (counter, labels: kind)
//!
//! The timer struct leverages `Drop` to record durations safely even when
//! early returns or errors occur.
use std::time::Instant;

use metrics::{Unit, counter, describe_counter, describe_histogram, histogram};
use once_cell::sync::Lazy;

pub const VERGE_REQUESTS_TOTAL: &str = "verge_requests_total";
pub const VERGE_REQUEST_DURATION_SECONDS: &str = "verge_request_duration_seconds";
pub const VERGE_CACHE_EVENTS_TOTAL: &str = "verge_cache_events_total";
pub const VERGE_REFRESH_CYCLES_TOTAL: &str = "verge_refresh_cycles_total";
pub const VERGE_REFRESH_CHUNKS_TOTAL: &str = "verge_refresh_chunks_total";
pub const VERGE_HYDRATION_FAILURES_TOTAL: &str = "verge_hydration_failures_total";

static DESCRIPTIONS: Lazy<()> = Lazy::new(|| {
    describe_counter!(
        VERGE_REQUESTS_TOTAL,
        Unit::Count,
        "Total number of HTTP requests processed by the edge router."
    );
    describe_histogram!(
        VERGE_REQUEST_DURATION_SECONDS,
        Unit::Seconds,
        "Latency of HTTP requests processed by the edge router."
    );
    describe_counter!(
        VERGE_CACHE_EVENTS_TOTAL,
        Unit::Count,
        "Cache interactions by family (page/asset) and outcome (hit/miss/fallback)."
    );
    describe_counter!(
        VERGE_REFRESH_CYCLES_TOTAL,
        Unit::Count,
        "Completed sitemap refresh cycles by outcome."
    );
    describe_counter!(
        VERGE_REFRESH_CHUNKS_TOTAL,
        Unit::Count,
        "Sitemap chunks written or skipped during refresh cycles."
    );
    describe_counter!(
        VERGE_HYDRATION_FAILURES_TOTAL,
        Unit::Count,
        "Hydration fetches that failed and fell through to the unmodified document."
    );
});

/// Increment the total request counter for an inbound request.
pub fn increment_request_total(route: &str, method: &str, status: u16) {
    counter!(
        VERGE_REQUESTS_TOTAL,
        "route" => route.to_string(),
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// Record a completed request's duration.
pub fn record_request_duration(route: &str, method: &str, duration: std::time::Duration) {
    histogram!(
        VERGE_REQUEST_DURATION_SECONDS,
        "route" => route.to_string(),
        "method" => method.to_string()
    )
    .record(duration.as_secs_f64());
}

/// Count one cache interaction; outcome is hit, miss or fallback.
pub fn record_cache_event(family: &'static str, outcome: &'static str) {
    counter!(
        VERGE_CACHE_EVENTS_TOTAL,
        "family" => family,
        "outcome" => outcome
    )
    .increment(1);
}

/// Count a refresh cycle and the chunk work it performed.
pub fn record_refresh_cycle(outcome: &'static str, refreshed: usize, failed: usize) {
    counter!(VERGE_REFRESH_CYCLES_TOTAL, "outcome" => outcome).increment(1);
    if refreshed > 0 {
        counter!(VERGE_REFRESH_CHUNKS_TOTAL, "outcome" => "refreshed").increment(refreshed as u64);
    }
    if failed > 0 {
        counter!(VERGE_REFRESH_CHUNKS_TOTAL, "outcome" => "failed").increment(failed as u64);
    }
}

/// Count one hydration fetch that fell through.
pub fn record_hydration_failure(kind: &'static str) {
    counter!(VERGE_HYDRATION_FAILURES_TOTAL, "kind" => kind).increment(1);
}

/// RAII helper measuring inbound request duration.
pub struct RequestTimer {
    start: Instant,
    route: String,
    method: String,
}

impl RequestTimer {
    pub fn new(route: &str, method: &str) -> Self {
        Self {
            start: Instant::now(),
            route: route.to_string(),
            method: method.to_string(),
        }
    }
}

impl Drop for RequestTimer {
    fn drop(&mut self) {
        record_request_duration(&self.route, &self.method, self.start.elapsed());
    }
}

/// Initialize metric descriptions (idempotent).
pub fn init_metrics() -> eyre::Result<()> {
    Lazy::force(&DESCRIPTIONS);
    tracing::info!("Verge metrics descriptions registered");
    Ok(())
}
