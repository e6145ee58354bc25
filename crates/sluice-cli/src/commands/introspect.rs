//! `sluice introspect`: dump table metadata as JSON.

use anyhow::{Context, Result};
use sluice_adapter_pg::{connect_pool, introspect_tables};
use sluice_core::SluiceConfig;
use std::path::Path;

pub async fn run(config_path: &Path, schemas: &[String]) -> Result<()> {
    let config = SluiceConfig::from_file(config_path)
        .with_context(|| format!("Failed to load configuration {}", config_path.display()))?;
    config.validate()?;

    let pool = connect_pool(&config.upstream)
        .await
        .context("Failed to connect to upstream database")?;
    let tables = introspect_tables(&pool, schemas).await?;
    tracing::info!(tables = tables.len(), "introspection complete");

    println!("{}", serde_json::to_string_pretty(&tables)?);
    pool.close().await;
    Ok(())
}
