use std::net::SocketAddr;

use eyre::{Result, bail};
use url::Url;

use crate::config::models::EdgeConfig;

/// Validate a loaded configuration before the server starts.
pub fn validate_config(config: &EdgeConfig) -> Result<()> {
    if config.listen_addr.parse::<SocketAddr>().is_err() {
        bail!("listen_addr is not a valid socket address: {}", config.listen_addr);
    }

    validate_base_url("origin.api_base", &config.origin.api_base)?;
    validate_base_url("origin.frontend_base", &config.origin.frontend_base)?;
    validate_base_url("site.public_base", &config.site.public_base)?;
    validate_base_url("site.parent_org_url", &config.site.parent_org_url)?;

    if config.origin.fetch_timeout_secs == 0 {
        bail!("origin.fetch_timeout_secs must be at least 1");
    }
    if config.refresh.batch_size == 0 {
        bail!("refresh.batch_size must be at least 1");
    }
    if config.refresh.origin_rps == 0 {
        bail!("refresh.origin_rps must be at least 1");
    }
    if config.refresh.interval_secs == 0 {
        bail!("refresh.interval_secs must be at least 1");
    }
    if config.refresh.meta_ttl_secs <= config.refresh.interval_secs {
        tracing::warn!(
            "refresh.meta_ttl_secs ({}) does not exceed refresh.interval_secs ({}); \
             a single missed cycle will expire the sitemap meta record",
            config.refresh.meta_ttl_secs,
            config.refresh.interval_secs
        );
    }

    Ok(())
}

fn validate_base_url(field: &str, value: &str) -> Result<()> {
    let url = Url::parse(value).map_err(|e| eyre::eyre!("{field} is not a valid URL: {e}"))?;
    if url.scheme() != "http" && url.scheme() != "https" {
        bail!("{field} must use http or https, got {}", url.scheme());
    }
    if value.ends_with('/') {
        bail!("{field} must not end with a trailing slash: {value}");
    }
    Ok(())
}
