//! Message router standing in for the extension's background worker.

use serde_json::Value;
use tracing::{debug, info, warn};
use watchraptor_core::{Message, Reply};
use watchraptor_protocol::parse_message;

use crate::config::ShellConfig;
use crate::error::Result;
use crate::injection::InjectionPolicy;
use crate::notifications::NotificationCenter;
use crate::store::RegistryStore;
use crate::TabId;

/// The tab a message came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sender {
    pub tab: TabId,
    /// Page URL; the registry is kept per URL.
    pub url: String,
}

impl Sender {
    pub fn new(tab: TabId, url: impl Into<String>) -> Self {
        Self {
            tab,
            url: url.into(),
        }
    }
}

pub struct Shell {
    store: RegistryStore,
    notifications: NotificationCenter,
    policy: InjectionPolicy,
    active_tab: Option<TabId>,
}

impl Shell {
    pub fn new(store: RegistryStore, policy: InjectionPolicy) -> Self {
        Self {
            store,
            notifications: NotificationCenter::new(),
            policy,
            active_tab: None,
        }
    }

    /// Shell with an in-memory store and default host permissions.
    pub fn in_memory() -> Self {
        Self::new(
            RegistryStore::new_in_memory(),
            InjectionPolicy::new(ShellConfig::default().host_permissions),
        )
    }

    /// Shell backed by the configured registry file.
    pub fn from_config(config: &ShellConfig) -> Result<Self> {
        let store = RegistryStore::load(&config.resolved_store_path()?)?;
        Ok(Self::new(
            store,
            InjectionPolicy::new(config.host_permissions.clone()),
        ))
    }

    /// Answers one message from a watcher.
    ///
    /// Invalid messages get no response, as an extension worker would ignore them.
    pub fn handle(&mut self, sender: &Sender, payload: Value) -> Reply {
        let message = match parse_message(payload) {
            Ok(message) => message,
            Err(info) => {
                warn!(tab = sender.tab, code = %info.code, reason = %info.message, "Rejected message");
                return Reply::NoResponse;
            }
        };
        debug!(tab = sender.tab, kind = message.kind(), "Message received");

        match message {
            Message::GetRegistryItems => match serde_json::to_value(self.store.items(&sender.url)) {
                Ok(items) => Reply::Delivered(items),
                Err(e) => {
                    warn!(error = %e, "Failed to encode registry items");
                    Reply::NoResponse
                }
            },
            Message::SetRegistryItems { items } => {
                let previous = self.store.items(&sender.url);
                self.store.replace(&sender.url, items);
                if self.store.is_file_backed() {
                    if let Err(e) = self.store.save() {
                        warn!(error = %e, url = %sender.url, "Failed to persist registry");
                        // The watcher treats this write as lost and retries it.
                        self.store.replace(&sender.url, previous);
                        return Reply::NoResponse;
                    }
                }
                Reply::ack()
            }
            Message::CiStatusChanged {
                document_title,
                status_message,
                status,
            } => {
                self.notifications
                    .notify(sender.tab, &document_title, &status_message, status);
                Reply::ack()
            }
        }
    }

    /// Focuses the notification's tab and dismisses it.
    pub fn click_notification(&mut self, id: &str) -> Option<TabId> {
        let tab = self.notifications.click(id)?;
        info!(tab, "Activating tab from notification");
        self.active_tab = Some(tab);
        Some(tab)
    }

    pub fn active_tab(&self) -> Option<TabId> {
        self.active_tab
    }

    pub fn notifications(&self) -> &NotificationCenter {
        &self.notifications
    }

    pub fn store(&self) -> &RegistryStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut RegistryStore {
        &mut self.store
    }

    pub fn policy(&self) -> &InjectionPolicy {
        &self.policy
    }
}
