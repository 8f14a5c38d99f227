/// Process configuration, loaded from an optional TOML file with defaults
/// matching stock FastDFS values.
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::types::StorePathMode;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub slot_min_size: u32,
    pub trunk_file_size: u32,
    pub store_path_mode: StorePathMode,
    pub storage_reserved_mb: u64,
    pub avg_storage_reserved_mb: u64,
    pub store_paths: Vec<PathBuf>,
    pub binlog_path: PathBuf,
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            slot_min_size: 4096,
            trunk_file_size: 64 * 1024 * 1024,
            store_path_mode: StorePathMode::RoundRobin,
            storage_reserved_mb: 1024,
            avg_storage_reserved_mb: 1024,
            store_paths: vec![PathBuf::from("./data")],
            binlog_path: PathBuf::from("./data/trunk_binlog"),
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Loads from `path` if it exists; falls back to `Config::default()` if
    /// it doesn't, matching the teacher's tolerant bootstrap.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_stock_fastdfs_values() {
        let cfg = Config::default();
        assert_eq!(cfg.slot_min_size, 4096);
        assert_eq!(cfg.trunk_file_size, 64 * 1024 * 1024);
        assert!(matches!(cfg.store_path_mode, StorePathMode::RoundRobin));
    }

    #[test]
    fn load_of_missing_file_falls_back_to_defaults() {
        let cfg = Config::load("/nonexistent/config.toml").unwrap();
        assert_eq!(cfg.slot_min_size, Config::default().slot_min_size);
    }

    #[test]
    fn load_parses_a_real_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trunkd.toml");
        std::fs::write(&path, "slot_min_size = 1024\nstore_path_mode = \"load_balance\"\n").unwrap();
        let cfg = Config::load(&path).unwrap();
        assert_eq!(cfg.slot_min_size, 1024);
        assert!(matches!(cfg.store_path_mode, StorePathMode::LoadBalance));
    }
}
