//! Desktop notifications raised for finished checks.
//!
//! There is at most one notification per tab: a newer one for the same tab
//! replaces the old one. Ids have the form `notification-<tabId>` so a click
//! can be routed back to its tab.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::{debug, info};
use watchraptor_core::Status;

use crate::TabId;

const NOTIFICATION_PREFIX: &str = "notification-";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: String,
    pub title: String,
    pub message: String,
    /// Stays on screen until the user acts on it.
    pub require_interaction: bool,
}

pub fn notification_id(tab: TabId) -> String {
    format!("{}{}", NOTIFICATION_PREFIX, tab)
}

pub fn tab_for_notification(id: &str) -> Option<TabId> {
    id.strip_prefix(NOTIFICATION_PREFIX)?.parse().ok()
}

#[derive(Debug, Default)]
pub struct NotificationCenter {
    shown: BTreeMap<TabId, Notification>,
}

impl NotificationCenter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notify(
        &mut self,
        tab: TabId,
        document_title: &str,
        status_message: &str,
        status: Status,
    ) -> &Notification {
        let notification = Notification {
            id: notification_id(tab),
            title: format!("{} {}", status.symbol(), document_title),
            message: status_message.to_string(),
            require_interaction: true,
        };
        info!(tab, title = %notification.title, "Showing notification");
        if self.shown.insert(tab, notification).is_some() {
            debug!(tab, "Replaced earlier notification for tab");
        }
        &self.shown[&tab]
    }

    /// Dismisses a clicked notification and returns the tab to activate.
    pub fn click(&mut self, id: &str) -> Option<TabId> {
        let tab = tab_for_notification(id)?;
        self.shown.remove(&tab).map(|_| tab)
    }

    pub fn get(&self, tab: TabId) -> Option<&Notification> {
        self.shown.get(&tab)
    }

    pub fn len(&self) -> usize {
        self.shown.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shown.is_empty()
    }
}
