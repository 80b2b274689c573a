//! Message types and validation shared by the page watcher and the extension shell.
//!
//! Both sides of the boundary use these types so the wire format cannot drift.
//! The shell stays the authority on validation; the watcher only constructs
//! messages and decodes replies.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Status of a single check as rendered by the host page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    #[default]
    Unknown,
    Pending,
    Success,
    Fail,
}

impl Status {
    pub fn as_str(self) -> &'static str {
        match self {
            Status::Unknown => "unknown",
            Status::Pending => "pending",
            Status::Success => "success",
            Status::Fail => "fail",
        }
    }

    /// Anything other than `pending` ends a watch cycle and is worth a notification.
    pub fn is_terminal(self) -> bool {
        !matches!(self, Status::Pending)
    }

    /// Symbol prefixed to notification titles.
    pub fn symbol(self) -> &'static str {
        match self {
            Status::Success => "✅",
            Status::Fail => "❌",
            Status::Pending => "⏳",
            Status::Unknown => "❓",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Item query → last observed status, for one page context.
pub type RegistryItems = BTreeMap<String, Status>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Message {
    /// A watched check moved into a terminal status.
    #[serde(rename_all = "camelCase")]
    CiStatusChanged {
        document_title: String,
        status_message: String,
        status: Status,
    },
    /// Fetch the full registry mapping for the sender's context.
    GetRegistryItems,
    /// Replace the full registry mapping for the sender's context.
    SetRegistryItems { items: RegistryItems },
}

impl Message {
    pub fn kind(&self) -> &'static str {
        match self {
            Message::CiStatusChanged { .. } => "ci-status-changed",
            Message::GetRegistryItems => "get-registry-items",
            Message::SetRegistryItems { .. } => "set-registry-items",
        }
    }

    pub fn validate(&self) -> Result<(), ErrorInfo> {
        match self {
            Message::SetRegistryItems { items } => {
                if items.keys().any(|key| key.trim().is_empty()) {
                    return Err(ErrorInfo::new(
                        "invalid_item_query",
                        "registry keys must be non-empty",
                    ));
                }
                Ok(())
            }
            Message::CiStatusChanged { .. } | Message::GetRegistryItems => Ok(()),
        }
    }
}

/// Outcome of a request sent across the boundary.
///
/// There is no ordering guarantee between distinct requests, and a torn-down
/// receiver shows up as `NoResponse` rather than an error payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Delivered(Value),
    NoResponse,
}

impl Reply {
    /// Acknowledgement without a payload.
    pub fn ack() -> Self {
        Reply::Delivered(Value::Null)
    }

    pub fn is_delivered(&self) -> bool {
        matches!(self, Reply::Delivered(_))
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ErrorInfo {
    pub code: String,
    pub message: String,
}

impl ErrorInfo {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

/// Parses and validates an untrusted message payload.
pub fn parse_message(value: Value) -> Result<Message, ErrorInfo> {
    let message: Message = serde_json::from_value(value).map_err(|err| {
        ErrorInfo::new(
            "invalid_message",
            format!("message payload is invalid: {}", err),
        )
    })?;
    message.validate()?;
    Ok(message)
}
