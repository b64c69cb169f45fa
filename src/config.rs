//! Configuration loaded from `sqltrans.toml`.
//!
//! ```toml
//! default_source = "mysql"
//! default_target = "postgres"
//! fire_policy = "first"   # or "all"
//! cache_routes = true
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::engine::FirePolicy;
use crate::error::{TransError, TransResult};

pub const CONFIG_FILE: &str = "sqltrans.toml";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransConfig {
    pub default_source: Option<String>,
    pub default_target: Option<String>,
    /// Fire policy for recursive passes of translations built at runtime.
    pub fire_policy: FirePolicy,
    /// Keep composite translations between calls.
    pub cache_routes: bool,
}

impl TransConfig {
    /// Load `./sqltrans.toml`, then `<config dir>/sqltrans/config.toml`.
    /// Falls back to defaults when neither exists.
    pub fn load() -> TransResult<Self> {
        match Self::locate() {
            Some(path) => Self::from_path(&path),
            None => Ok(Self::default()),
        }
    }

    fn locate() -> Option<PathBuf> {
        let local = Path::new(CONFIG_FILE);
        if local.exists() {
            return Some(local.to_path_buf());
        }
        dirs::config_dir()
            .map(|dir| dir.join("sqltrans").join("config.toml"))
            .filter(|path| path.exists())
    }

    pub fn from_path(path: &Path) -> TransResult<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content)
            .map_err(|e| TransError::Config(format!("{}: {}", path.display(), e)))
    }

    pub fn from_toml_str(content: &str) -> TransResult<Self> {
        toml::from_str(content).map_err(|e| TransError::Config(e.to_string()))
    }
}
