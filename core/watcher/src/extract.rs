//! Reads status items out of the page. Pure functions, no state.

use tracing::debug;

use crate::config::CompiledConfig;
use crate::dom::{Dom, NodeId, Selector};
use crate::types::{Status, StatusItem};

/// Trimmed label text of an item, or `None` when the label is missing or blank.
pub fn identify_item<D: Dom + ?Sized>(
    dom: &D,
    item: NodeId,
    config: &CompiledConfig,
) -> Option<String> {
    let label = dom.query_selector(Some(item), &config.label)?;
    let text = dom.text_content(label);
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

/// Maps the indicator's class markers to a status; unrecognized markers are `Unknown`.
pub fn resolve_status<D: Dom + ?Sized>(dom: &D, item: NodeId, config: &CompiledConfig) -> Status {
    let Some(indicator) = dom.query_selector(Some(item), &config.indicator) else {
        debug!(?item, "No status indicator in item");
        return Status::Unknown;
    };

    let raw = config.raw();
    if dom.has_class(indicator, &raw.pending_class) {
        Status::Pending
    } else if dom.has_class(indicator, &raw.fail_class) {
        Status::Fail
    } else if dom.has_class(indicator, &raw.success_class) {
        Status::Success
    } else {
        Status::Unknown
    }
}

/// Human-readable status line next to the label, e.g. "Failing after 3m".
pub fn status_message<D: Dom + ?Sized>(dom: &D, item: NodeId, config: &CompiledConfig) -> String {
    dom.query_selector(Some(item), &config.message)
        .map(|node| {
            dom.text_content(node)
                .trim()
                .trim_start_matches(['—', '–', '-'])
                .trim()
                .to_string()
        })
        .unwrap_or_default()
}

/// Snapshot of every identifiable item, in document order.
///
/// Items whose label cannot be read are skipped for this cycle.
pub fn discover_items<D: Dom + ?Sized>(dom: &D, config: &CompiledConfig) -> Vec<StatusItem> {
    dom.query_selector_all(None, &config.item)
        .into_iter()
        .filter_map(|node| match identify_item(dom, node, config) {
            Some(identifier) => Some(StatusItem {
                node,
                identifier,
                status: resolve_status(dom, node, config),
            }),
            None => {
                debug!(?node, "Skipping status item without a readable label");
                None
            }
        })
        .collect()
}

/// First item under `item_selector` whose identifier equals `identifier`.
///
/// Duplicate labels are ambiguous; the first match in document order wins.
pub fn find_item<D: Dom + ?Sized>(
    dom: &D,
    item_selector: &Selector,
    identifier: &str,
    config: &CompiledConfig,
) -> Option<NodeId> {
    dom.query_selector_all(None, item_selector)
        .into_iter()
        .find(|node| identify_item(dom, *node, config).as_deref() == Some(identifier))
}
