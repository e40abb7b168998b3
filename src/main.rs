use std::{path::Path, sync::Arc};

use clap::Parser;
use color_eyre::{
    Result,
    eyre::{Context, eyre},
};
use verge::{
    adapters::{EdgeHandler, HttpClientAdapter, InMemoryCacheStore, InMemoryKvStore, build_router},
    config::{loader, validation},
    core::refresher::{SitemapRefresher, spawn_refresh_loop},
    metrics,
    ports::{cache_store::CacheStore, http_client::HttpClient, kv_store::KeyValueStore},
    tracing_setup,
    utils::{BackgroundTasks, shutdown::shutdown_signal},
};

#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    #[clap(subcommand)]
    command: Option<Commands>,

    /// Configuration file; defaults and EDGE_* env vars apply without one
    #[clap(short, long)]
    config: Option<String>,
}

#[derive(Parser, Debug)]
enum Commands {
    /// Validate configuration file
    Validate {
        #[clap(short, long)]
        config: Option<String>,
    },
    /// Write a starter configuration file
    Init {
        #[clap(short, long, default_value = "config.toml")]
        config: String,
    },
    /// Start the edge server (default)
    Serve {
        #[clap(short, long)]
        config: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let args = Args::parse();

    match args.command {
        Some(Commands::Validate { config }) => {
            return validate_config_command(config.or(args.config).as_deref()).await;
        }
        Some(Commands::Init { config }) => {
            return init_config_command(&config);
        }
        Some(Commands::Serve { config }) => serve(config.or(args.config).as_deref()).await,
        None => serve(args.config.as_deref()).await,
    }
}

async fn serve(config_path: Option<&str>) -> Result<()> {
    tracing_setup::init_tracing().map_err(|e| eyre!("Failed to initialize tracing: {}", e))?;
    metrics::init_metrics().map_err(|e| eyre!("Failed to initialize metrics: {}", e))?;

    match config_path {
        Some(path) => tracing::info!("Loading configuration from {path}"),
        None => tracing::info!("No config file given, using defaults and EDGE_* environment"),
    }

    let config = loader::load_config(config_path)
        .await
        .wrap_err("Failed to load configuration")?;
    validation::validate_config(&config).wrap_err("Configuration is invalid")?;
    let config = Arc::new(config);

    let client: Arc<dyn HttpClient> = Arc::new(
        HttpClientAdapter::new(config.origin.fetch_timeout())
            .wrap_err("Failed to create origin HTTP client")?,
    );
    let cache: Arc<dyn CacheStore> = Arc::new(InMemoryCacheStore::new());
    let kv: Arc<dyn KeyValueStore> = Arc::new(InMemoryKvStore::new());
    let background = BackgroundTasks::new();

    let refresh_handle = if config.refresh.enabled {
        let refresher = Arc::new(SitemapRefresher::new(kv.clone(), client.clone(), &config));
        Some(spawn_refresh_loop(refresher, config.refresh.interval()))
    } else {
        tracing::warn!("Sitemap refresher disabled; replica serves stale or empty data");
        None
    };

    let handler = Arc::new(EdgeHandler::new(
        config.clone(),
        client,
        cache,
        kv,
        background.clone(),
    ));
    let app = build_router(handler);

    let listener = tokio::net::TcpListener::bind(&config.listen_addr)
        .await
        .wrap_err_with(|| format!("Failed to bind {}", config.listen_addr))?;
    tracing::info!(
        "Verge edge router listening on {} (origin API {}, frontend {})",
        config.listen_addr,
        config.origin.api_base,
        config.origin.frontend_base
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .wrap_err("Server error")?;

    if let Some(handle) = refresh_handle {
        handle.abort();
    }

    // Accepted fire-and-forget writes finish before the process exits.
    tracing::info!("Draining {} background write(s)...", background.len());
    background.drain().await;
    tracing::info!("Shutdown complete");

    Ok(())
}

async fn validate_config_command(config_path: Option<&str>) -> Result<()> {
    let config = loader::load_config(config_path)
        .await
        .wrap_err("Failed to load configuration")?;
    validation::validate_config(&config).wrap_err("Configuration is invalid")?;

    println!("Configuration is valid");
    println!("  listen_addr:   {}", config.listen_addr);
    println!("  origin API:    {}", config.origin.api_base);
    println!("  frontend:      {}", config.origin.frontend_base);
    println!("  refresh every: {}s", config.refresh.interval_secs);
    Ok(())
}

fn init_config_command(config_path: &str) -> Result<()> {
    if Path::new(config_path).exists() {
        return Err(eyre!("Refusing to overwrite existing file: {config_path}"));
    }

    std::fs::write(config_path, STARTER_CONFIG)
        .wrap_err_with(|| format!("Failed to write {config_path}"))?;
    println!("Wrote starter configuration to {config_path}");
    Ok(())
}

const STARTER_CONFIG: &str = r#"# Verge edge router configuration.
# Every value shown is the default; delete what you do not change.
# Environment variables override the file: EDGE_ORIGIN__API_BASE, etc.

listen_addr = "0.0.0.0:8080"

[origin]
api_base = "https://api.example.com"
frontend_base = "https://static.example.com"
fetch_timeout_secs = 5

[cache]
page_ttl_secs = 3600
asset_ttl_secs = 31536000

[sitemap]
static_sitemap = "/sitemap-static.xml"
chunk_ttl_secs = 86400
response_max_age_secs = 3600

[refresh]
enabled = true
interval_secs = 3600
meta_ttl_secs = 4500
batch_size = 5
origin_rps = 2

[site]
name = "Example Markets"
public_base = "https://www.example.com"
parent_org_url = "https://www.example-holdings.com"
"#;
