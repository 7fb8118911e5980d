use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use lyra_core::{LyraError, LyraResult};

const DEFAULT_CONFIG_NAME: &str = "lyra-cache.json";
const DEFAULT_DB_NAME: &str = "lyra-cache.sqlite";

/// Cache storage configuration. The database path is explicit: callers
/// decide where the shared cache database lives, and an unusable location
/// is a configuration error at cache construction.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CacheConfig {
    pub db_path: PathBuf,
}

impl CacheConfig {
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
        }
    }

    /// Reads `lyra-cache.json` from `base_dir`, writing a default pointing
    /// at a database file inside `base_dir` when absent.
    pub fn load_or_init(base_dir: &Path) -> LyraResult<Self> {
        fs::create_dir_all(base_dir)
            .map_err(|err| LyraError::config(format!("create config dir: {err}")))?;
        let config_path = base_dir.join(DEFAULT_CONFIG_NAME);
        if config_path.exists() {
            let raw = fs::read_to_string(&config_path)
                .map_err(|err| LyraError::config(format!("read config: {err}")))?;
            let config: CacheConfig = serde_json::from_str(&raw)
                .map_err(|err| LyraError::config(err.to_string()))?;
            return Ok(config);
        }
        let default = CacheConfig::new(base_dir.join(DEFAULT_DB_NAME));
        let payload = serde_json::to_string_pretty(&default)
            .map_err(|err| LyraError::config(format!("serialize config: {err}")))?;
        fs::write(&config_path, payload)
            .map_err(|err| LyraError::config(format!("write config: {err}")))?;
        Ok(default)
    }
}

#[cfg(test)]
mod tests {
    use super::CacheConfig;

    #[test]
    fn load_or_init_writes_then_rereads_the_same_config() {
        let dir = tempfile::tempdir().expect("tempdir");
        let first = CacheConfig::load_or_init(dir.path()).expect("init");
        let second = CacheConfig::load_or_init(dir.path()).expect("reload");
        assert_eq!(first.db_path, second.db_path);
        assert!(first.db_path.starts_with(dir.path()));
    }
}
