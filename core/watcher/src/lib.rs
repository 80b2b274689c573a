//! # watchraptor-core
//!
//! Page watcher for CI status lists. Discovers check items on a pull request
//! page, mounts a watch checkbox next to each, and asks the extension shell to
//! notify the user once a watched check finishes.
//!
//! ## Design Principles
//!
//! - **Synchronous**: No async runtime dependency. Shell calls block until answered or abandoned.
//! - **Not thread-safe**: One loop per injected instance; hosts provide their own synchronization.
//! - **Host-agnostic**: The page is reached only through the [`dom::Dom`] trait and the shell
//!   only through [`registry::Messenger`].
//! - **Self-replacing**: Re-injected copies settle ownership by generation token; the newest
//!   instance wins and older ones stop for good.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use watchraptor_core::{ObservationLoop, WatcherConfig};
//!
//! let config = WatcherConfig::default().compile()?;
//! let mut watcher = ObservationLoop::new(config, shell);
//! watcher.start(&mut page);
//! // host: forward mutation, scroll and intersection callbacks
//! watcher.on_mutation(&mut page);
//! ```

pub mod arbiter;
pub mod config;
pub mod dom;
pub mod engine;
pub mod error;
pub mod extract;
pub mod overlay;
pub mod registry;
pub mod transition;
pub mod types;

#[cfg(any(test, feature = "test-helpers"))]
pub mod testing;

pub use arbiter::{arbitrate, Arbitration, GenerationToken};
pub use config::{default_watcher_config_path, load_watcher_config, CompiledConfig, WatcherConfig};
pub use dom::{Dom, MemoryDom, NodeId, Rect, ScrollOffset, Selector};
pub use engine::{CycleOutcome, LoopState, ObservationLoop, PlacementReport, VisibilityEntry};
pub use error::{Result, WatcherError};
pub use overlay::{CheckboxView, OverlayManager, OverlayTag, Placement};
pub use registry::{Messenger, WatchRegistry};
pub use transition::{detect_transitions, DetectionReport};
pub use types::*;
pub use watchraptor_protocol::{Message, RegistryItems, Reply};
