//! Watch registry backed by the extension shell.
//!
//! The shell's storage is the source of truth. Every operation fetches the
//! full mapping; every mutation writes the full mapping back. Nothing here
//! serializes concurrent writers, so two contexts toggling the same page at
//! once can lose an update.

use std::collections::btree_map;
use std::rc::Rc;
use std::sync::Arc;

use serde_json::Value;
use tracing::debug;
use watchraptor_protocol::{Message, RegistryItems, Reply};

use crate::error::{Result, WatcherError};
use crate::types::Status;

/// Request/response channel to the extension shell.
///
/// Implementations block until the shell answers or gives up; a shell that
/// has gone away answers [`Reply::NoResponse`].
pub trait Messenger {
    fn send(&self, message: &Message) -> Reply;
}

impl<M: Messenger + ?Sized> Messenger for &M {
    fn send(&self, message: &Message) -> Reply {
        (**self).send(message)
    }
}

impl<M: Messenger + ?Sized> Messenger for Box<M> {
    fn send(&self, message: &Message) -> Reply {
        (**self).send(message)
    }
}

impl<M: Messenger + ?Sized> Messenger for Rc<M> {
    fn send(&self, message: &Message) -> Reply {
        (**self).send(message)
    }
}

impl<M: Messenger + ?Sized> Messenger for Arc<M> {
    fn send(&self, message: &Message) -> Reply {
        (**self).send(message)
    }
}

pub struct WatchRegistry<M> {
    messenger: M,
}

impl<M: Messenger> WatchRegistry<M> {
    pub fn new(messenger: M) -> Self {
        Self { messenger }
    }

    pub fn messenger(&self) -> &M {
        &self.messenger
    }

    /// Fetches the full mapping for this page.
    pub fn snapshot(&self) -> Result<RegistryItems> {
        let request = Message::GetRegistryItems;
        match self.messenger.send(&request) {
            Reply::Delivered(Value::Null) => Ok(RegistryItems::new()),
            Reply::Delivered(payload) => {
                serde_json::from_value(payload).map_err(|source| WatcherError::MalformedReply {
                    request: request.kind(),
                    source,
                })
            }
            Reply::NoResponse => Err(WatcherError::NoResponse {
                request: request.kind(),
            }),
        }
    }

    fn store(&self, items: RegistryItems) -> Result<()> {
        let request = Message::SetRegistryItems { items };
        match self.messenger.send(&request) {
            Reply::Delivered(_) => Ok(()),
            Reply::NoResponse => Err(WatcherError::NoResponse {
                request: request.kind(),
            }),
        }
    }

    pub fn get(&self, key: &str) -> Result<Option<Status>> {
        Ok(self.snapshot()?.get(key).copied())
    }

    pub fn has(&self, key: &str) -> Result<bool> {
        Ok(self.snapshot()?.contains_key(key))
    }

    pub fn set(&self, key: &str, status: Status) -> Result<()> {
        let mut items = self.snapshot()?;
        items.insert(key.to_string(), status);
        debug!(key, %status, "Registry set");
        self.store(items)
    }

    pub fn delete(&self, key: &str) -> Result<()> {
        let mut items = self.snapshot()?;
        if items.remove(key).is_none() {
            debug!(key, "Registry delete of absent key");
        }
        self.store(items)
    }

    /// All entries as of this call. Calling again re-fetches.
    pub fn entries(&self) -> Result<Entries> {
        Ok(Entries {
            inner: self.snapshot()?.into_iter(),
        })
    }
}

/// Finite pass over one registry snapshot, in key order.
pub struct Entries {
    inner: btree_map::IntoIter<String, Status>,
}

impl Iterator for Entries {
    type Item = (String, Status);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingMessenger;

    #[test]
    fn test_set_then_get() {
        let shell = RecordingMessenger::new();
        let registry = WatchRegistry::new(&shell);

        registry.set("list::CI / build", Status::Pending).unwrap();

        assert_eq!(registry.get("list::CI / build").unwrap(), Some(Status::Pending));
        assert!(registry.has("list::CI / build").unwrap());
        assert!(!registry.has("list::CI / lint").unwrap());
    }

    #[test]
    fn test_mutations_write_the_full_mapping() {
        let shell = RecordingMessenger::new();
        shell.seed("list::a", Status::Pending);
        shell.seed("list::b", Status::Success);
        let registry = WatchRegistry::new(&shell);

        registry.delete("list::a").unwrap();

        assert_eq!(
            shell.sent_kinds(),
            vec!["get-registry-items", "set-registry-items"]
        );
        let items = shell.items();
        assert_eq!(items.len(), 1);
        assert_eq!(items.get("list::b"), Some(&Status::Success));
    }

    #[test]
    fn test_entries_refetch_each_call() {
        let shell = RecordingMessenger::new();
        shell.seed("list::a", Status::Pending);
        let registry = WatchRegistry::new(&shell);

        let first: Vec<_> = registry.entries().unwrap().collect();
        shell.seed("list::b", Status::Fail);
        let second: Vec<_> = registry.entries().unwrap().collect();

        assert_eq!(first.len(), 1);
        assert_eq!(
            second,
            vec![
                ("list::a".to_string(), Status::Pending),
                ("list::b".to_string(), Status::Fail),
            ]
        );
    }

    #[test]
    fn test_null_payload_is_empty_registry() {
        let shell = RecordingMessenger::new();
        shell.reply_with_null();
        let registry = WatchRegistry::new(&shell);

        assert!(registry.snapshot().unwrap().is_empty());
    }

    #[test]
    fn test_disconnected_shell_is_no_response() {
        let shell = RecordingMessenger::new();
        shell.disconnect();
        let registry = WatchRegistry::new(&shell);

        assert!(matches!(
            registry.set("list::a", Status::Pending),
            Err(WatcherError::NoResponse {
                request: "get-registry-items"
            })
        ));
    }

    #[test]
    fn test_malformed_payload_is_reported() {
        let shell = RecordingMessenger::new();
        shell.reply_with(serde_json::json!(["not", "a", "map"]));
        let registry = WatchRegistry::new(&shell);

        assert!(matches!(
            registry.snapshot(),
            Err(WatcherError::MalformedReply { .. })
        ));
    }
}
