//! Configuration Loader (Figment-based)
//!
//! Loads and merges configuration from three sources, narrowest winning:
//! 1. Built-in defaults (Serialized)
//! 2. Project config (`pipeline.toml`)
//! 3. Environment variables (`PIPELINE_*` prefix)

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use std::path::{Path, PathBuf};

use tracing::debug;

use super::types::Config;
use crate::types::{PipelineError, Result};

/// Configuration loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with full resolution chain using Figment:
    /// defaults → project file → env vars
    pub fn load() -> Result<Config> {
        let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));

        let project_path = Self::project_config_path();
        if project_path.exists() {
            debug!("Loading project config from: {}", project_path.display());
            figment = figment.merge(Toml::file(&project_path));
        }

        // e.g. PIPELINE_LLM_CASCADE_STRATEGY -> llm.cascade_strategy
        figment = figment.merge(Env::prefixed("PIPELINE_").split('_').lowercase(true));

        let config: Config = figment
            .extract()
            .map_err(|e| PipelineError::Config(format!("Configuration error: {}", e)))?;

        config.validate()?;

        Ok(config)
    }

    /// Load configuration from a specific file only, ignoring project/env tiers.
    pub fn load_from_file(path: &Path) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(path))
            .extract()
            .map_err(|e| PipelineError::Config(format!("Configuration error: {}", e)))?;

        config.validate()?;

        Ok(config)
    }

    /// Path to the project config file, resolved relative to the current
    /// working directory.
    pub fn project_config_path() -> PathBuf {
        PathBuf::from("pipeline.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_default_config() {
        let config = ConfigLoader::load().unwrap();
        assert_eq!(config.version, "1.0");
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pipeline.toml");
        std::fs::write(&path, "[loader]\nbatch_size = 250\n").unwrap();

        let config = ConfigLoader::load_from_file(&path).unwrap();
        assert_eq!(config.loader.batch_size, 250);
    }

    #[test]
    fn test_env_override() {
        // SAFETY: std::env mutation is process-wide; this test does not run
        // concurrently with others that read PIPELINE_LLM_LOCAL_MODEL.
        unsafe {
            std::env::set_var("PIPELINE_LLM_LOCAL_MODEL", "test-model");
        }
        let config = ConfigLoader::load().unwrap();
        assert_eq!(config.llm.local_model, "test-model");
        unsafe {
            std::env::remove_var("PIPELINE_LLM_LOCAL_MODEL");
        }
    }
}
