//! Shell configuration, read from `~/.watchraptor/shell.toml`.
//!
//! ```toml
//! host_permissions = ["https://github.com/", "https://github.example.com/"]
//! store_path = "/var/lib/watchraptor/registry.json"
//! ```

use std::path::{Path, PathBuf};

use fs_err as fs;
use serde::Deserialize;

use crate::error::{Result, ShellError};

const DEFAULT_HOST_PERMISSION: &str = "https://github.com/";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ShellConfig {
    /// URL prefixes the watcher may be injected into.
    pub host_permissions: Vec<String>,
    /// Registry file; `None` means `~/.watchraptor/registry.json`.
    pub store_path: Option<PathBuf>,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            host_permissions: vec![DEFAULT_HOST_PERMISSION.to_string()],
            store_path: None,
        }
    }
}

impl ShellConfig {
    pub fn resolved_store_path(&self) -> Result<PathBuf> {
        match &self.store_path {
            Some(path) => Ok(path.clone()),
            None => dirs::home_dir()
                .map(|home| home.join(".watchraptor").join("registry.json"))
                .ok_or(ShellError::HomeDirNotFound),
        }
    }
}

pub fn default_shell_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".watchraptor").join("shell.toml"))
}

/// Loads the shell configuration, returning defaults if the file doesn't exist.
pub fn load_shell_config(path: &Path) -> Result<ShellConfig> {
    if !path.exists() {
        return Ok(ShellConfig::default());
    }

    let content = fs::read_to_string(path).map_err(|source| ShellError::Io {
        context: "reading shell config".to_string(),
        source,
    })?;

    toml::from_str(&content).map_err(|e| ShellError::ConfigMalformed {
        path: path.to_path_buf(),
        details: e.to_string(),
    })
}
