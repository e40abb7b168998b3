use std::path::Path;

use config::{Config, Environment, File, FileFormat};
use eyre::{Context, Result};

use crate::config::models::EdgeConfig;

/// Load configuration, layering (lowest to highest precedence):
/// hardcoded defaults, an optional config file, `EDGE_`-prefixed environment
/// variables (`__` separates nesting, e.g. `EDGE_ORIGIN__API_BASE`).
pub async fn load_config(config_path: Option<&str>) -> Result<EdgeConfig> {
    load_config_sync(config_path)
}

/// Load configuration synchronously
pub fn load_config_sync(config_path: Option<&str>) -> Result<EdgeConfig> {
    let mut builder = Config::builder().add_source(
        Config::try_from(&EdgeConfig::default()).wrap_err("Failed to encode default config")?,
    );

    if let Some(config_path) = config_path {
        let path = Path::new(config_path);

        // Determine file format based on extension
        let format = match path.extension().and_then(|ext| ext.to_str()) {
            Some("yaml") | Some("yml") => FileFormat::Yaml,
            Some("json") => FileFormat::Json,
            Some("toml") => FileFormat::Toml,
            Some("ini") => FileFormat::Ini,
            _ => FileFormat::Toml,
        };

        builder = builder.add_source(File::new(
            path.to_str()
                .ok_or_else(|| eyre::eyre!("Invalid UTF-8 path: {}", path.display()))?,
            format,
        ));
    }

    let settings = builder
        .add_source(Environment::with_prefix("EDGE").separator("__"))
        .build()
        .wrap_err("Failed to build configuration")?;

    let edge_config: EdgeConfig = settings
        .try_deserialize()
        .wrap_err("Failed to deserialize configuration")?;

    Ok(edge_config)
}
