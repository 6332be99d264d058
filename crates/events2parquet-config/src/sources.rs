// Configuration source loading
//
// Priority order (highest wins):
// 1. Environment variables (EVENTS2PARQUET_* prefix)
// 2. Explicit path (--config), else EVENTS2PARQUET_CONFIG path
// 3. Inline config content from EVENTS2PARQUET_CONFIG_CONTENT
// 4. Default config files (./config.toml, ./.events2parquet.toml)
// 5. Built-in defaults

use crate::env_overrides::{self, normalize_prefix, EnvSource};
use crate::RuntimeConfig;
use anyhow::{Context, Result};
use std::path::Path;

const DEFAULT_CONFIG_PATHS: &[&str] = &["./config.toml", "./.events2parquet.toml"];

pub fn load_config<E: EnvSource>(explicit: Option<&Path>, env: &E) -> Result<RuntimeConfig> {
    let mut config = match explicit {
        Some(path) => read_file(path)?,
        None => load_from_env_or_defaults(env)?.unwrap_or_default(),
    };

    env_overrides::apply_env_overrides(&mut config, env)?;
    normalize(&mut config);
    Ok(config)
}

pub fn parse_toml(content: &str) -> Result<RuntimeConfig> {
    let mut config: RuntimeConfig = toml::from_str(content).context("Failed to parse config")?;
    normalize(&mut config);
    Ok(config)
}

fn load_from_env_or_defaults<E: EnvSource>(env: &E) -> Result<Option<RuntimeConfig>> {
    if let Some(path) = env.get("CONFIG") {
        return read_file(Path::new(&path)).map(Some);
    }

    if let Some(content) = env.get("CONFIG_CONTENT") {
        let config: RuntimeConfig = toml::from_str(&content)
            .context("Failed to parse inline config from EVENTS2PARQUET_CONFIG_CONTENT")?;
        return Ok(Some(config));
    }

    for path in DEFAULT_CONFIG_PATHS {
        let path = Path::new(path);
        if path.exists() {
            return read_file(path).map(Some);
        }
    }

    Ok(None)
}

fn read_file(path: &Path) -> Result<RuntimeConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

fn normalize(config: &mut RuntimeConfig) {
    let pipeline = &mut config.pipeline;
    pipeline.source_prefix = normalize_prefix(std::mem::take(&mut pipeline.source_prefix));
    pipeline.output_prefix = normalize_prefix(std::mem::take(&mut pipeline.output_prefix));
    pipeline.bookmark_prefix = normalize_prefix(std::mem::take(&mut pipeline.bookmark_prefix));
    pipeline.staging_prefix = normalize_prefix(std::mem::take(&mut pipeline.staging_prefix));
}
