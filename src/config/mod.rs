// src/config/mod.rs
mod models;

pub use models::*;

use ::config::{Environment, File, FileFormat};
use anyhow::{Context, Result};
use std::path::Path;

/// Prefix for environment overrides, e.g. `LB__SERVER__PORT=8080`.
const ENV_PREFIX: &str = "LB";

/// Load configuration from a file (YAML or JSON), then apply environment overrides.
pub async fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let path = path.as_ref();
    let contents = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read config file {}", path.display()))?;

    let config = parse_config(&contents, format_for(path))?;
    config.validate()?;
    Ok(config)
}

fn format_for(path: &Path) -> FileFormat {
    match path.extension().and_then(|s| s.to_str()) {
        Some("yaml") | Some("yml") => FileFormat::Yaml,
        _ => FileFormat::Json,
    }
}

fn parse_config(contents: &str, format: FileFormat) -> Result<Config> {
    ::config::Config::builder()
        .add_source(File::from_str(contents, format))
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .context("Failed to assemble configuration")?
        .try_deserialize()
        .context("Failed to parse configuration")
}
