//! Detects watched items that changed status since the last cycle.
//!
//! The registry holds the last status seen for every watched item. Each pass
//! re-reads those items from the page; a change is persisted, and a change
//! into a terminal status also raises one `ci-status-changed` notification.
//! The registry is updated before the notification goes out, so a lost
//! notification is never re-sent.

use tracing::{debug, warn};
use watchraptor_protocol::{Message, Reply};

use crate::config::CompiledConfig;
use crate::dom::{Dom, Selector};
use crate::error::Result;
use crate::extract::{find_item, resolve_status, status_message};
use crate::registry::{Messenger, WatchRegistry};
use crate::types::ItemQuery;

/// Counters for one detector pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DetectionReport {
    pub examined: usize,
    /// Watched items not on the page right now; left as they are.
    pub unresolved: usize,
    /// Registry keys that do not parse as an item query.
    pub skipped_malformed: usize,
    pub persisted: usize,
    pub notified: usize,
    /// Notifications the shell did not answer.
    pub undelivered: usize,
}

/// Runs one pass over every registry entry.
///
/// Fails only when the registry itself cannot be read, in which case nothing
/// is examined this cycle.
pub fn detect_transitions<D, M>(
    dom: &D,
    registry: &WatchRegistry<M>,
    config: &CompiledConfig,
) -> Result<DetectionReport>
where
    D: Dom + ?Sized,
    M: Messenger,
{
    let mut report = DetectionReport::default();

    for (key, last) in registry.entries()? {
        report.examined += 1;

        let Some(query) = ItemQuery::parse(&key) else {
            debug!(key = %key, "Skipping registry key that is not an item query");
            report.skipped_malformed += 1;
            continue;
        };
        let selector = match Selector::parse(query.selector()) {
            Ok(selector) => selector,
            Err(e) => {
                debug!(key = %key, error = %e, "Skipping registry key with unusable selector");
                report.skipped_malformed += 1;
                continue;
            }
        };

        let Some(node) = find_item(dom, &selector, query.identifier(), config) else {
            report.unresolved += 1;
            continue;
        };

        let current = resolve_status(dom, node, config);
        if current == last {
            continue;
        }

        if let Err(e) = registry.set(&key, current) {
            warn!(key = %key, error = %e, "Failed to persist status change");
            continue;
        }
        report.persisted += 1;
        debug!(key = %key, from = %last, to = %current, "Status changed");

        if !current.is_terminal() {
            continue;
        }

        let notification = Message::CiStatusChanged {
            document_title: dom.document_title(),
            status_message: status_message(dom, node, config),
            status: current,
        };
        match registry.messenger().send(&notification) {
            Reply::Delivered(_) => report.notified += 1,
            Reply::NoResponse => {
                warn!(key = %key, status = %current, "Notification not delivered; not retrying");
                report.undelivered += 1;
            }
        }
    }

    Ok(report)
}
