//! Core types shared across watcher components.

use std::fmt;

pub use watchraptor_protocol::Status;

use crate::dom::NodeId;

/// Separates the selector half of an item query from the identifier half.
pub const ITEM_QUERY_SEPARATOR: &str = "::";

/// A status item as read from the page during one cycle. Never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusItem {
    pub node: NodeId,
    pub identifier: String,
    pub status: Status,
}

/// Registry key: the item selector plus the item's identifier.
///
/// Serialized as `"<selector>::<identifier>"`. Selectors never contain the
/// separator, so the first occurrence splits the two halves and identifiers
/// may contain anything.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ItemQuery {
    selector: String,
    identifier: String,
}

impl ItemQuery {
    pub fn new(selector: impl Into<String>, identifier: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
            identifier: identifier.into(),
        }
    }

    pub fn parse(key: &str) -> Option<Self> {
        let (selector, identifier) = key.split_once(ITEM_QUERY_SEPARATOR)?;
        if selector.trim().is_empty() || identifier.is_empty() {
            return None;
        }
        Some(Self::new(selector, identifier))
    }

    pub fn selector(&self) -> &str {
        &self.selector
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn key(&self) -> String {
        format!(
            "{}{}{}",
            self.selector, ITEM_QUERY_SEPARATOR, self.identifier
        )
    }
}

impl fmt::Display for ItemQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.selector, ITEM_QUERY_SEPARATOR, self.identifier)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_round_trips_identifier_with_separator() {
        let query = ItemQuery::new(".merge-status-item", "deploy::staging");
        let parsed = ItemQuery::parse(&query.key()).unwrap();
        assert_eq!(parsed.selector(), ".merge-status-item");
        assert_eq!(parsed.identifier(), "deploy::staging");
    }

    #[test]
    fn test_parse_rejects_keys_without_identifier() {
        assert!(ItemQuery::parse("CI / build").is_none());
        assert!(ItemQuery::parse(".merge-status-item::").is_none());
        assert!(ItemQuery::parse("::CI / build").is_none());
    }

    #[test]
    fn test_display_matches_key() {
        let query = ItemQuery::new(".merge-status-list .merge-status-item", "CI / build");
        assert_eq!(query.to_string(), query.key());
        assert_eq!(
            query.key(),
            ".merge-status-list .merge-status-item::CI / build"
        );
    }
}
