//! File-backed watch registry, one mapping per page.
//!
//! # File Format
//!
//! ```json
//! {
//!   "version": 1,
//!   "contexts": {
//!     "https://github.com/o/r/pull/1": {
//!       ".merge-status-list .merge-status-item::CI / build": "pending"
//!     }
//!   }
//! }
//! ```
//!
//! # Defensive Loading
//!
//! A missing, empty, corrupt or wrong-version file loads as an empty store
//! with a warning; the next save overwrites it.
//!
//! # Atomic Writes
//!
//! Saves go to a temp file in the same directory which is then renamed over
//! the store.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use fs_err as fs;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::warn;
use watchraptor_core::RegistryItems;

use crate::error::{Result, ShellError};

const STORE_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct StoreFile {
    version: u32,
    #[serde(default)]
    contexts: BTreeMap<String, RegistryItems>,
}

pub struct RegistryStore {
    contexts: BTreeMap<String, RegistryItems>,
    file_path: Option<PathBuf>,
}

impl RegistryStore {
    pub fn new_in_memory() -> Self {
        Self {
            contexts: BTreeMap::new(),
            file_path: None,
        }
    }

    pub fn new(file_path: &Path) -> Self {
        Self {
            contexts: BTreeMap::new(),
            file_path: Some(file_path.to_path_buf()),
        }
    }

    pub fn load(file_path: &Path) -> Result<Self> {
        if !file_path.exists() {
            return Ok(Self::new(file_path));
        }

        let content = fs::read_to_string(file_path).map_err(|source| ShellError::Io {
            context: "reading registry store".to_string(),
            source,
        })?;

        if content.trim().is_empty() {
            warn!(path = %file_path.display(), "Empty registry store, starting fresh");
            return Ok(Self::new(file_path));
        }

        match serde_json::from_str::<StoreFile>(&content) {
            Ok(file) if file.version == STORE_VERSION => Ok(Self {
                contexts: file.contexts,
                file_path: Some(file_path.to_path_buf()),
            }),
            Ok(file) => {
                warn!(
                    path = %file_path.display(),
                    version = file.version,
                    expected = STORE_VERSION,
                    "Unsupported registry store version, starting fresh"
                );
                Ok(Self::new(file_path))
            }
            Err(e) => {
                warn!(path = %file_path.display(), error = %e, "Corrupt registry store, starting fresh");
                Ok(Self::new(file_path))
            }
        }
    }

    pub fn is_file_backed(&self) -> bool {
        self.file_path.is_some()
    }

    pub fn save(&self) -> Result<()> {
        let file_path = self.file_path.as_ref().ok_or(ShellError::NoStorePath)?;

        let file = StoreFile {
            version: STORE_VERSION,
            contexts: self.contexts.clone(),
        };
        let content = serde_json::to_string_pretty(&file)?;

        let parent_dir = file_path.parent().ok_or_else(|| ShellError::Io {
            context: format!("{} has no parent directory", file_path.display()),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        })?;
        fs::create_dir_all(parent_dir).map_err(|source| ShellError::Io {
            context: "creating registry store directory".to_string(),
            source,
        })?;

        let mut temp_file = NamedTempFile::new_in(parent_dir).map_err(|source| ShellError::Io {
            context: "creating temp registry store".to_string(),
            source,
        })?;
        temp_file
            .write_all(content.as_bytes())
            .and_then(|_| temp_file.flush())
            .map_err(|source| ShellError::Io {
                context: "writing temp registry store".to_string(),
                source,
            })?;
        temp_file.persist(file_path).map_err(|e| ShellError::Io {
            context: "replacing registry store".to_string(),
            source: e.error,
        })?;

        Ok(())
    }

    /// Mapping for one page; empty when the page has never been written.
    pub fn items(&self, context: &str) -> RegistryItems {
        self.contexts.get(context).cloned().unwrap_or_default()
    }

    /// Replaces a page's mapping; an empty mapping drops the page.
    pub fn replace(&mut self, context: &str, items: RegistryItems) {
        if items.is_empty() {
            self.contexts.remove(context);
        } else {
            self.contexts.insert(context.to_string(), items);
        }
    }

    pub fn clear(&mut self, context: &str) -> bool {
        self.contexts.remove(context).is_some()
    }

    pub fn contexts(&self) -> impl Iterator<Item = (&str, &RegistryItems)> {
        self.contexts.iter().map(|(url, items)| (url.as_str(), items))
    }
}
