//! # Engine Configuration
//!
//! Explicit configuration values threaded through the normalizer and
//! executor constructors. Nothing in the engine reads ambient state, so
//! unit tests can run with varied policies.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("cannot read config file: {0}")]
    Io(#[from] std::io::Error),

    /// Config file is not valid JSON
    #[error("cannot parse config file: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Query engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Collections non-admin users may never query or join against
    #[serde(default = "default_prohibited_collections")]
    pub prohibited_collections: Vec<String>,

    /// Collections hidden from `catalog_names` listings
    #[serde(default = "default_prohibited_collections")]
    pub system_collections: Vec<String>,

    /// Document field holding the geospatial position of a record
    #[serde(default = "default_geojson_field")]
    pub geojson_field: String,

    /// Default store-side execution deadline in milliseconds
    #[serde(default = "default_max_time_ms")]
    pub default_max_time_ms: u64,

    /// Default bookkeeping record lifetime in days
    #[serde(default = "default_expiration_days")]
    pub default_expiration_days: i64,

    /// Root directory for persisted task and result payloads
    #[serde(default = "default_queries_path")]
    pub queries_path: PathBuf,
}

fn default_prohibited_collections() -> Vec<String> {
    vec![
        "users".to_string(),
        "stats".to_string(),
        "queries".to_string(),
    ]
}

fn default_geojson_field() -> String {
    "coordinates.radec_geojson".to_string()
}

fn default_max_time_ms() -> u64 {
    300_000
}

fn default_expiration_days() -> i64 {
    30
}

fn default_queries_path() -> PathBuf {
    PathBuf::from("./queries")
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            prohibited_collections: default_prohibited_collections(),
            system_collections: default_prohibited_collections(),
            geojson_field: default_geojson_field(),
            default_max_time_ms: default_max_time_ms(),
            default_expiration_days: default_expiration_days(),
            queries_path: default_queries_path(),
        }
    }
}

impl EngineConfig {
    /// Check whether a collection is off-limits for non-admin users
    pub fn is_prohibited(&self, collection: &str) -> bool {
        self.prohibited_collections.iter().any(|c| c == collection)
    }

    /// Check whether a collection is hidden from catalog listings
    pub fn is_system(&self, collection: &str) -> bool {
        self.system_collections.iter().any(|c| c == collection)
    }
}

/// Top-level application configuration: engine plus server settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Query engine settings
    #[serde(default)]
    pub engine: EngineConfig,

    /// HTTP server settings
    #[serde(default)]
    pub server: crate::http::ServerConfig,
}

impl AppConfig {
    /// Load configuration from a JSON file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Write configuration to a JSON file
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let raw = serde_json::to_string_pretty(self)?;
        std::fs::write(path, raw)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert!(config.is_prohibited("users"));
        assert!(config.is_prohibited("queries"));
        assert!(!config.is_prohibited("sources"));
        assert_eq!(config.default_max_time_ms, 300_000);
    }

    #[test]
    fn test_system_collections_independent_of_prohibited() {
        let config = EngineConfig {
            prohibited_collections: vec!["users".to_string()],
            system_collections: vec!["internal".to_string()],
            ..Default::default()
        };
        assert!(config.is_prohibited("users"));
        assert!(!config.is_system("users"));
        assert!(config.is_system("internal"));
    }

    #[test]
    fn test_config_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("varmarshal.json");

        let config = AppConfig::default();
        config.save(&path).unwrap();

        let loaded = AppConfig::load(&path).unwrap();
        assert_eq!(
            loaded.engine.prohibited_collections,
            config.engine.prohibited_collections
        );
        assert_eq!(loaded.engine.geojson_field, "coordinates.radec_geojson");
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let parsed: AppConfig =
            serde_json::from_str(r#"{"engine": {"default_max_time_ms": 1000}}"#).unwrap();
        assert_eq!(parsed.engine.default_max_time_ms, 1000);
        assert_eq!(parsed.engine.prohibited_collections.len(), 3);
    }
}
