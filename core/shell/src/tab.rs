//! In-process channel from a tab's watcher to the shell.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use tracing::warn;
use watchraptor_core::{Message, Messenger, Reply};

use crate::shell::{Sender, Shell};
use crate::TabId;

/// Messenger for one tab. Every message crosses as JSON, as it would between
/// an extension's content script and its worker.
pub struct TabMessenger {
    shell: Rc<RefCell<Shell>>,
    sender: Sender,
    connected: Cell<bool>,
}

impl TabMessenger {
    pub fn new(shell: Rc<RefCell<Shell>>, tab: TabId, url: impl Into<String>) -> Self {
        Self {
            shell,
            sender: Sender::new(tab, url),
            connected: Cell::new(true),
        }
    }

    pub fn sender(&self) -> &Sender {
        &self.sender
    }

    /// Simulates the shell going away, e.g. on extension reload.
    pub fn disconnect(&self) {
        self.connected.set(false);
    }

    pub fn is_connected(&self) -> bool {
        self.connected.get()
    }
}

impl Messenger for TabMessenger {
    fn send(&self, message: &Message) -> Reply {
        if !self.connected.get() {
            return Reply::NoResponse;
        }
        let payload = match serde_json::to_value(message) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(error = %e, kind = message.kind(), "Failed to encode message");
                return Reply::NoResponse;
            }
        };
        // A re-entrant send while the shell is busy has nobody to answer it.
        match self.shell.try_borrow_mut() {
            Ok(mut shell) => shell.handle(&self.sender, payload),
            Err(_) => Reply::NoResponse,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use watchraptor_core::{Status, WatchRegistry};

    #[test]
    fn test_registry_round_trips_through_shell() {
        let shell = Rc::new(RefCell::new(Shell::in_memory()));
        let tab = TabMessenger::new(shell.clone(), 1, "https://github.com/o/r/pull/1");
        let registry = WatchRegistry::new(&tab);

        registry.set("list::CI / build", Status::Pending).unwrap();

        assert_eq!(registry.get("list::CI / build").unwrap(), Some(Status::Pending));
        assert_eq!(
            shell
                .borrow()
                .store()
                .items("https://github.com/o/r/pull/1")
                .len(),
            1
        );
    }

    #[test]
    fn test_disconnected_tab_gets_no_response() {
        let shell = Rc::new(RefCell::new(Shell::in_memory()));
        let tab = TabMessenger::new(shell, 1, "https://github.com/o/r/pull/1");
        tab.disconnect();

        assert_eq!(tab.send(&Message::GetRegistryItems), Reply::NoResponse);
        assert!(!tab.is_connected());
    }
}
