//! # watchraptor-shell
//!
//! Reference host for the watchraptor engine: the part a browser extension's
//! background worker plays. It keeps the per-page watch registry, turns
//! status changes into desktop notifications, and decides which navigations
//! get a watcher injected.
//!
//! Everything is synchronous and single-threaded; tabs share the shell through
//! `Rc<RefCell<Shell>>`.

pub mod config;
pub mod error;
pub mod injection;
pub mod notifications;
pub mod shell;
pub mod store;
pub mod tab;

/// Browser tab identifier.
pub type TabId = u32;

pub use config::{default_shell_config_path, load_shell_config, ShellConfig};
pub use error::{Result, ShellError};
pub use injection::{is_pull_request_url, InjectionPolicy, TransitionType};
pub use notifications::{Notification, NotificationCenter};
pub use shell::{Sender, Shell};
pub use store::RegistryStore;
pub use tab::TabMessenger;
