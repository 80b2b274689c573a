//! Watcher configuration.
//!
//! The defaults describe GitHub's merge-status list. Hosts can override any
//! field from a JSON file; missing fields keep their defaults.

use std::path::{Path, PathBuf};

use fs_err as fs;
use serde::{Deserialize, Serialize};

use crate::dom::Selector;
use crate::error::{Result, WatcherError};
use crate::types::ITEM_QUERY_SEPARATOR;

/// Share of an item that must be inside the viewport before its overlay shows.
pub const DEFAULT_VISIBILITY_THRESHOLD: f64 = 0.7;
pub const DEFAULT_GUTTER_PX: f64 = 20.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatcherConfig {
    /// One match per status item.
    pub item_selector: String,
    /// Label element inside an item; its text is the item's identifier.
    pub label_selector: String,
    /// Indicator element inside an item whose classes carry the status.
    pub indicator_selector: String,
    /// Human-readable status text inside an item.
    pub message_selector: String,
    /// Element whose scroll events require repositioning.
    pub scroll_container_selector: String,
    pub pending_class: String,
    pub fail_class: String,
    pub success_class: String,
    pub container_class: String,
    pub status_id_attribute: String,
    pub generation_attribute: String,
    pub visibility_threshold: f64,
    pub gutter_px: f64,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            item_selector: ".merge-status-list .merge-status-item".to_string(),
            label_selector: "strong".to_string(),
            indicator_selector: ".merge-status-icon svg".to_string(),
            message_selector: ".color-fg-muted".to_string(),
            scroll_container_selector: ".merge-status-list".to_string(),
            pending_class: "hx_dot-fill-pending-icon".to_string(),
            fail_class: "color-fg-danger".to_string(),
            success_class: "color-fg-success".to_string(),
            container_class: "watchraptor-checkbox-container".to_string(),
            status_id_attribute: "data-watchraptor-status-id".to_string(),
            generation_attribute: "data-watchraptor-generation".to_string(),
            visibility_threshold: DEFAULT_VISIBILITY_THRESHOLD,
            gutter_px: DEFAULT_GUTTER_PX,
        }
    }
}

/// Configuration with every selector parsed and every value validated.
#[derive(Debug, Clone)]
pub struct CompiledConfig {
    raw: WatcherConfig,
    pub(crate) item: Selector,
    pub(crate) label: Selector,
    pub(crate) indicator: Selector,
    pub(crate) message: Selector,
    pub(crate) scroll_container: Selector,
    pub(crate) containers: Selector,
    pub(crate) checkbox: Selector,
}

impl WatcherConfig {
    pub fn compile(&self) -> Result<CompiledConfig> {
        if self.item_selector.contains(ITEM_QUERY_SEPARATOR) {
            return Err(WatcherError::InvalidSelector {
                selector: self.item_selector.clone(),
                reason: format!("item selector must not contain {:?}", ITEM_QUERY_SEPARATOR),
            });
        }
        if !(self.visibility_threshold > 0.0 && self.visibility_threshold <= 1.0) {
            return Err(WatcherError::ConfigInvalid {
                field: "visibility_threshold",
                details: format!("{} is outside (0, 1]", self.visibility_threshold),
            });
        }
        if !self.gutter_px.is_finite() {
            return Err(WatcherError::ConfigInvalid {
                field: "gutter_px",
                details: "must be finite".to_string(),
            });
        }
        for (field, value) in [
            ("pending_class", &self.pending_class),
            ("fail_class", &self.fail_class),
            ("success_class", &self.success_class),
            ("container_class", &self.container_class),
        ] {
            if value.trim().is_empty() {
                return Err(WatcherError::ConfigInvalid {
                    field,
                    details: "must not be empty".to_string(),
                });
            }
        }

        Ok(CompiledConfig {
            item: Selector::parse(&self.item_selector)?,
            label: Selector::parse(&self.label_selector)?,
            indicator: Selector::parse(&self.indicator_selector)?,
            message: Selector::parse(&self.message_selector)?,
            scroll_container: Selector::parse(&self.scroll_container_selector)?,
            containers: Selector::has_attribute(&self.status_id_attribute)?,
            checkbox: Selector::parse("input[type=\"checkbox\"]")?,
            raw: self.clone(),
        })
    }
}

impl CompiledConfig {
    pub fn raw(&self) -> &WatcherConfig {
        &self.raw
    }

    /// Selector half of every item query this watcher writes.
    pub fn item_selector(&self) -> &str {
        self.item.as_str()
    }
}

/// Returns the path to the optional watcher configuration file.
pub fn default_watcher_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".watchraptor").join("watcher.json"))
}

/// Loads the watcher configuration, returning defaults if the file doesn't exist.
pub fn load_watcher_config(path: &Path) -> Result<WatcherConfig> {
    if !path.exists() {
        return Ok(WatcherConfig::default());
    }

    let content = fs::read_to_string(path).map_err(|source| WatcherError::Io {
        context: "reading watcher config".to_string(),
        source,
    })?;

    if content.trim().is_empty() {
        return Ok(WatcherConfig::default());
    }

    serde_json::from_str(&content).map_err(|e| WatcherError::ConfigMalformed {
        path: path.to_path_buf(),
        details: e.to_string(),
    })
}
