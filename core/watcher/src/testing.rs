//! Test doubles for hosts and integration tests.
//!
//! Enabled for this crate's unit tests and, for other crates, via the
//! `test-helpers` feature.

use std::cell::{Cell, RefCell};

use serde_json::Value;
use watchraptor_protocol::{Message, RegistryItems, Reply};

use crate::dom::{Dom, MemoryDom, NodeId, Rect};
use crate::registry::Messenger;
use crate::types::Status;

/// In-memory shell that stores registry writes and records notifications.
#[derive(Default)]
pub struct RecordingMessenger {
    items: RefCell<RegistryItems>,
    notifications: RefCell<Vec<Message>>,
    sent: RefCell<Vec<&'static str>>,
    disconnected: Cell<bool>,
    registry_reply: RefCell<Option<Value>>,
}

impl RecordingMessenger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Writes an entry directly, as another context sharing the store would.
    pub fn seed(&self, key: &str, status: Status) {
        self.items.borrow_mut().insert(key.to_string(), status);
    }

    pub fn items(&self) -> RegistryItems {
        self.items.borrow().clone()
    }

    pub fn notifications(&self) -> Vec<Message> {
        self.notifications.borrow().clone()
    }

    pub fn sent_kinds(&self) -> Vec<&'static str> {
        self.sent.borrow().clone()
    }

    pub fn disconnect(&self) {
        self.disconnected.set(true);
    }

    pub fn reconnect(&self) {
        self.disconnected.set(false);
    }

    /// Answers registry reads with `payload` instead of the stored items.
    pub fn reply_with(&self, payload: Value) {
        *self.registry_reply.borrow_mut() = Some(payload);
    }

    pub fn reply_with_null(&self) {
        self.reply_with(Value::Null);
    }
}

impl Messenger for RecordingMessenger {
    fn send(&self, message: &Message) -> Reply {
        self.sent.borrow_mut().push(message.kind());
        if self.disconnected.get() {
            return Reply::NoResponse;
        }

        match message {
            Message::GetRegistryItems => match self.registry_reply.borrow().as_ref() {
                Some(payload) => Reply::Delivered(payload.clone()),
                None => match serde_json::to_value(&*self.items.borrow()) {
                    Ok(value) => Reply::Delivered(value),
                    Err(_) => Reply::NoResponse,
                },
            },
            Message::SetRegistryItems { items } => {
                *self.items.borrow_mut() = items.clone();
                Reply::ack()
            }
            Message::CiStatusChanged { .. } => {
                self.notifications.borrow_mut().push(message.clone());
                Reply::ack()
            }
        }
    }
}

pub const ROW_HEIGHT: f64 = 40.0;
pub const ROW_SPACING: f64 = 48.0;
pub const LIST_TOP: f64 = 120.0;
pub const LIST_LEFT: f64 = 60.0;

/// Class list GitHub puts on the indicator icon for `status`.
pub fn indicator_class(status: Status) -> &'static str {
    match status {
        Status::Pending => "octicon octicon-dot-fill hx_dot-fill-pending-icon",
        Status::Success => "octicon octicon-check color-fg-success",
        Status::Fail => "octicon octicon-x color-fg-danger",
        Status::Unknown => "octicon octicon-skip neutral-check",
    }
}

struct Check {
    item: NodeId,
    indicator: NodeId,
    message: NodeId,
}

/// A pull request page with a merge-status list, rendered into a [`MemoryDom`].
pub struct ChecksPage {
    pub dom: MemoryDom,
    pub list: NodeId,
    checks: Vec<Check>,
}

impl ChecksPage {
    pub fn new(title: &str) -> Self {
        let mut dom = MemoryDom::new();
        dom.set_title(title);
        let body = dom.body();
        let list = dom.append_element(body, "div", "merge-status-list js-updatable-content", "");
        Self {
            dom,
            list,
            checks: Vec::new(),
        }
    }

    /// Renders a check row; returns the item node.
    pub fn add_check(&mut self, label: &str, status: Status, message: &str) -> NodeId {
        let row = self.checks.len() as f64;
        let item = self
            .dom
            .append_element(self.list, "div", "merge-status-item d-flex", "");
        self.dom.set_rect(
            item,
            Rect::new(LIST_LEFT, LIST_TOP + row * ROW_SPACING, 600.0, ROW_HEIGHT),
        );
        let icon = self.dom.append_element(item, "div", "merge-status-icon", "");
        let indicator = self
            .dom
            .append_element(icon, "svg", indicator_class(status), "");
        let text = self.dom.append_element(item, "div", "text-small", "");
        self.dom.append_element(text, "strong", "", label);
        let message = self
            .dom
            .append_element(text, "span", "color-fg-muted", &format!(" — {}", message));
        self.checks.push(Check {
            item,
            indicator,
            message,
        });
        item
    }

    pub fn item(&self, index: usize) -> NodeId {
        self.checks[index].item
    }

    /// Swaps the indicator marker, as the page does when a check finishes.
    pub fn set_status(&mut self, index: usize, status: Status) {
        let indicator = self.checks[index].indicator;
        self.dom.set_class(indicator, indicator_class(status));
    }

    pub fn set_message(&mut self, index: usize, message: &str) {
        let node = self.checks[index].message;
        self.dom.set_text(node, &format!(" — {}", message));
    }

    /// Unmounts the whole list, as happens mid re-render.
    pub fn unmount_list(&mut self) {
        self.dom.detach(self.list);
    }
}
