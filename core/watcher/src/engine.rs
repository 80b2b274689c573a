//! The observation loop: one per injected watcher instance.
//!
//! The host owns the page and its observers and forwards their callbacks here:
//! mutations of the status list, scrolls, intersection reports and checkbox
//! toggles. Every callback first checks the loop state; once the loop has
//! yielded to a newer instance it never touches the page again.

use std::collections::{HashMap, HashSet};

use tracing::{debug, info, warn};

use crate::arbiter::GenerationToken;
use crate::config::CompiledConfig;
use crate::dom::{Dom, NodeId};
use crate::error::Result;
use crate::extract::{discover_items, find_item, resolve_status};
use crate::overlay::{CheckboxView, OverlayManager, Placement};
use crate::registry::{Messenger, WatchRegistry};
use crate::transition::{detect_transitions, DetectionReport};
use crate::types::ItemQuery;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Running,
    /// Terminal. A newer generation owns the page.
    ShutDown,
}

/// Counters for one placement pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlacementReport {
    pub discovered: usize,
    pub created: usize,
    pub already_current: usize,
    /// Items skipped because an earlier item has the same label.
    pub duplicates: usize,
    pub pruned: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    Completed {
        /// `None` when the registry could not be read this cycle.
        detection: Option<DetectionReport>,
        placement: PlacementReport,
    },
    /// This cycle found a newer owner and the loop stopped.
    ShutDown { owner: GenerationToken },
    /// The loop had already stopped; nothing was done.
    Inactive,
}

/// One intersection-observer report for an item node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VisibilityEntry {
    pub target: NodeId,
    pub intersection_ratio: f64,
}

pub struct ObservationLoop<M> {
    state: LoopState,
    observing: bool,
    config: CompiledConfig,
    overlays: OverlayManager,
    registry: WatchRegistry<M>,
    /// Item node to status id, rebuilt by every placement pass.
    tracked: HashMap<NodeId, String>,
}

impl<M: Messenger> ObservationLoop<M> {
    /// Creates an instance with a freshly minted generation.
    pub fn new(config: CompiledConfig, messenger: M) -> Self {
        Self::with_generation(config, messenger, GenerationToken::mint())
    }

    pub fn with_generation(config: CompiledConfig, messenger: M, generation: GenerationToken) -> Self {
        Self {
            state: LoopState::Running,
            observing: false,
            config,
            overlays: OverlayManager::new(generation),
            registry: WatchRegistry::new(messenger),
            tracked: HashMap::new(),
        }
    }

    pub fn generation(&self) -> GenerationToken {
        self.overlays.generation()
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == LoopState::Running
    }

    /// Whether the host should keep delivering mutation callbacks.
    pub fn is_observing(&self) -> bool {
        self.observing
    }

    pub fn config(&self) -> &CompiledConfig {
        &self.config
    }

    pub fn overlays(&self) -> &OverlayManager {
        &self.overlays
    }

    pub fn registry(&self) -> &WatchRegistry<M> {
        &self.registry
    }

    /// Initial discovery and placement; afterwards the loop is observing.
    pub fn start<D: Dom + ?Sized>(&mut self, dom: &mut D) -> CycleOutcome {
        if !self.is_running() {
            return CycleOutcome::Inactive;
        }
        info!(generation = %self.generation(), "Watcher starting");

        if let Some(owner) = self.overlays.newer_owner(&*dom, &self.config) {
            return self.shut_down(owner);
        }

        match self.placement_pass(dom) {
            Ok(placement) => {
                self.observing = true;
                CycleOutcome::Completed {
                    detection: None,
                    placement,
                }
            }
            Err(owner) => self.shut_down(owner),
        }
    }

    pub fn on_mutation<D: Dom + ?Sized>(&mut self, dom: &mut D) -> CycleOutcome {
        if !self.is_running() {
            return CycleOutcome::Inactive;
        }

        // A newer instance will notify for this page; stop before detecting.
        if let Some(owner) = self.overlays.newer_owner(&*dom, &self.config) {
            return self.shut_down(owner);
        }

        let detection = match detect_transitions(&*dom, &self.registry, &self.config) {
            Ok(report) => {
                debug!(?report, "Detection pass");
                Some(report)
            }
            Err(e) => {
                warn!(error = %e, "Registry unreadable; skipping detection this cycle");
                None
            }
        };

        match self.placement_pass(dom) {
            Ok(placement) => CycleOutcome::Completed {
                detection,
                placement,
            },
            Err(owner) => self.shut_down(owner),
        }
    }

    /// Repositions every tracked overlay.
    pub fn on_scroll<D: Dom + ?Sized>(&mut self, dom: &mut D) {
        if !self.is_running() {
            return;
        }
        for (item, status_id) in &self.tracked {
            if let Some(container) = self.overlays.container_for(&*dom, status_id, &self.config) {
                self.overlays.position(dom, container, *item, &self.config);
            }
        }
    }

    pub fn on_visibility<D: Dom + ?Sized>(&mut self, dom: &mut D, entries: &[VisibilityEntry]) {
        if !self.is_running() {
            return;
        }
        let threshold = self.config.raw().visibility_threshold;
        for entry in entries {
            let Some(status_id) = self.tracked.get(&entry.target) else {
                continue;
            };
            if let Some(container) = self.overlays.container_for(&*dom, status_id, &self.config) {
                let visible = entry.intersection_ratio >= threshold;
                self.overlays.set_visible(dom, container, visible);
            }
        }
    }

    /// Checkbox handler: checking watches the item at its current status,
    /// unchecking stops watching it.
    pub fn toggle_watch<D: Dom + ?Sized>(
        &mut self,
        dom: &mut D,
        status_id: &str,
        checked: bool,
    ) -> Result<()> {
        if !self.is_running() {
            return Ok(());
        }

        let key = ItemQuery::new(self.config.item_selector(), status_id).key();
        let item = find_item(&*dom, &self.config.item, status_id, &self.config);

        if checked {
            let Some(item) = item else {
                debug!(status_id, "Toggled item is no longer on the page");
                return Ok(());
            };
            let status = resolve_status(&*dom, item, &self.config);
            self.registry.set(&key, status)?;
            info!(key = %key, %status, "Watching check");
        } else {
            self.registry.delete(&key)?;
            info!(key = %key, "Stopped watching check");
        }

        if let Some(item) = item {
            if let Some(container) = self.overlays.container_for(&*dom, status_id, &self.config) {
                let view = CheckboxView {
                    status: resolve_status(&*dom, item, &self.config),
                    watched: Some(checked),
                };
                self.overlays.render_checkbox(dom, container, view, &self.config);
            }
        }
        Ok(())
    }

    /// Item nodes the host should hand to its intersection observer.
    pub fn observed_targets(&self) -> Vec<NodeId> {
        let mut targets: Vec<_> = self.tracked.keys().copied().collect();
        targets.sort();
        targets
    }

    /// Element whose scroll events the host should forward to [`Self::on_scroll`].
    pub fn scroll_container<D: Dom + ?Sized>(&self, dom: &D) -> Option<NodeId> {
        dom.query_selector(None, &self.config.scroll_container)
    }

    fn placement_pass<D: Dom + ?Sized>(
        &mut self,
        dom: &mut D,
    ) -> std::result::Result<PlacementReport, GenerationToken> {
        let watched = match self.registry.snapshot() {
            Ok(items) => Some(items),
            Err(e) => {
                warn!(error = %e, "Registry unreadable; checkboxes disabled this pass");
                None
            }
        };

        let items = discover_items(&*dom, &self.config);
        let mut report = PlacementReport {
            discovered: items.len(),
            ..PlacementReport::default()
        };
        let mut present = HashSet::new();
        let mut index = HashMap::new();

        for item in items {
            if !present.insert(item.identifier.clone()) {
                debug!(identifier = %item.identifier, "Duplicate label; first item wins");
                report.duplicates += 1;
                continue;
            }

            let container =
                match self
                    .overlays
                    .ensure_overlay(dom, item.node, &item.identifier, &self.config)
                {
                    Placement::Created { container } => {
                        report.created += 1;
                        container
                    }
                    Placement::AlreadyCurrent { container } => {
                        report.already_current += 1;
                        container
                    }
                    Placement::Rejected { owner } => return Err(owner),
                };

            let key = ItemQuery::new(self.config.item_selector(), item.identifier.as_str()).key();
            let view = CheckboxView {
                status: item.status,
                watched: watched.as_ref().map(|items| items.contains_key(&key)),
            };
            self.overlays
                .render_checkbox(dom, container, view, &self.config);
            self.overlays
                .position(dom, container, item.node, &self.config);
            index.insert(item.node, item.identifier);
        }

        report.pruned = self.overlays.prune(dom, &present, &self.config);
        self.tracked = index;
        debug!(?report, "Placement pass");
        Ok(report)
    }

    fn shut_down(&mut self, owner: GenerationToken) -> CycleOutcome {
        info!(
            generation = %self.generation(),
            newer = %owner,
            "Newer watcher owns this page; shutting down"
        );
        self.state = LoopState::ShutDown;
        self.observing = false;
        self.tracked.clear();
        CycleOutcome::ShutDown { owner }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WatcherConfig;
    use crate::testing::{ChecksPage, RecordingMessenger, LIST_TOP};
    use crate::types::Status;

    const BUILD: &str = ".merge-status-list .merge-status-item::CI / build";

    fn config() -> CompiledConfig {
        WatcherConfig::default().compile().unwrap()
    }

    fn page() -> ChecksPage {
        let mut page = ChecksPage::new("Add retry budget · Pull Request #7");
        page.add_check("CI / build", Status::Pending, "Started 1m ago");
        page.add_check("CI / lint", Status::Success, "Successful in 20s");
        page
    }

    fn watcher(shell: &RecordingMessenger, micros: i64) -> ObservationLoop<&RecordingMessenger> {
        ObservationLoop::with_generation(config(), shell, GenerationToken::from_micros(micros))
    }

    fn checkbox(page: &ChecksPage, watcher: &ObservationLoop<&RecordingMessenger>, id: &str) -> NodeId {
        let container = watcher
            .overlays()
            .container_for(&page.dom, id, watcher.config())
            .unwrap();
        page.dom
            .query_selector(Some(container), &watcher.config().checkbox)
            .unwrap()
    }

    #[test]
    fn test_start_places_one_overlay_per_item() {
        let mut page = page();
        let shell = RecordingMessenger::new();
        let mut watcher = watcher(&shell, 10);

        let outcome = watcher.start(&mut page.dom);

        let CycleOutcome::Completed { placement, .. } = outcome else {
            panic!("unexpected outcome {:?}", outcome);
        };
        assert_eq!(placement.created, 2);
        assert!(watcher.is_observing());
        assert_eq!(watcher.observed_targets(), vec![page.item(0), page.item(1)]);
        assert_eq!(watcher.scroll_container(&page.dom), Some(page.list));
    }

    #[test]
    fn test_second_pass_is_write_free() {
        let mut page = page();
        let shell = RecordingMessenger::new();
        let mut watcher = watcher(&shell, 10);

        watcher.start(&mut page.dom);
        let writes = page.dom.writes();
        let outcome = watcher.on_mutation(&mut page.dom);

        let CycleOutcome::Completed { placement, .. } = outcome else {
            panic!("unexpected outcome {:?}", outcome);
        };
        assert_eq!(placement.already_current, 2);
        assert_eq!(placement.created, 0);
        assert_eq!(page.dom.writes(), writes);
    }

    #[test]
    fn test_older_instance_yields_to_newer() {
        let mut page = page();
        let shell = RecordingMessenger::new();
        let mut older = watcher(&shell, 10);
        let mut newer = watcher(&shell, 20);

        older.start(&mut page.dom);
        newer.start(&mut page.dom);
        let writes = page.dom.writes();

        assert_eq!(
            older.on_mutation(&mut page.dom),
            CycleOutcome::ShutDown {
                owner: GenerationToken::from_micros(20)
            }
        );
        assert_eq!(older.state(), LoopState::ShutDown);
        assert!(!older.is_observing());
        assert_eq!(older.on_mutation(&mut page.dom), CycleOutcome::Inactive);
        older.on_scroll(&mut page.dom);
        older.toggle_watch(&mut page.dom, "CI / build", true).unwrap();
        assert_eq!(page.dom.writes(), writes);
        assert!(shell.items().is_empty());

        let containers = newer.overlays().containers(&page.dom, newer.config());
        assert_eq!(containers.len(), 2);
        assert!(containers
            .iter()
            .all(|(_, tag)| tag.generation == GenerationToken::from_micros(20)));
    }

    #[test]
    fn test_late_older_instance_shuts_down_on_start() {
        let mut page = page();
        let shell = RecordingMessenger::new();
        let mut newer = watcher(&shell, 20);
        let mut older = watcher(&shell, 10);

        newer.start(&mut page.dom);
        let writes = page.dom.writes();
        let outcome = older.start(&mut page.dom);

        assert!(matches!(outcome, CycleOutcome::ShutDown { .. }));
        assert!(!older.is_observing());
        assert_eq!(page.dom.writes(), writes);
    }

    #[test]
    fn test_late_older_instance_writes_nothing_before_a_newer_item() {
        let mut page = page();
        let shell = RecordingMessenger::new();
        let mut newer = watcher(&shell, 20);
        let mut older = watcher(&shell, 10);
        newer.start(&mut page.dom);
        let first = newer
            .overlays()
            .container_for(&page.dom, "CI / build", newer.config())
            .unwrap();
        page.dom.remove(first);

        let writes = page.dom.writes();
        let outcome = older.start(&mut page.dom);

        assert_eq!(
            outcome,
            CycleOutcome::ShutDown {
                owner: GenerationToken::from_micros(20)
            }
        );
        assert_eq!(page.dom.writes(), writes);
        assert!(older
            .overlays()
            .container_for(&page.dom, "CI / build", older.config())
            .is_none());
    }

    #[test]
    fn test_toggle_watch_checks_and_unchecks() {
        let mut page = page();
        let shell = RecordingMessenger::new();
        let mut watcher = watcher(&shell, 10);
        watcher.start(&mut page.dom);

        watcher.toggle_watch(&mut page.dom, "CI / build", true).unwrap();
        assert_eq!(shell.items().get(BUILD), Some(&Status::Pending));
        let input = checkbox(&page, &watcher, "CI / build");
        assert!(page.dom.attribute(input, "checked").is_some());

        watcher.toggle_watch(&mut page.dom, "CI / build", false).unwrap();
        assert!(shell.items().is_empty());
        assert!(page.dom.attribute(input, "checked").is_none());
    }

    #[test]
    fn test_finished_unwatched_check_is_disabled() {
        let mut page = page();
        let shell = RecordingMessenger::new();
        let mut watcher = watcher(&shell, 10);
        watcher.start(&mut page.dom);

        let lint = checkbox(&page, &watcher, "CI / lint");
        let build = checkbox(&page, &watcher, "CI / build");
        assert!(page.dom.attribute(lint, "disabled").is_some());
        assert!(page.dom.attribute(build, "disabled").is_none());
    }

    #[test]
    fn test_unreachable_registry_disables_every_checkbox() {
        let mut page = page();
        let shell = RecordingMessenger::new();
        shell.disconnect();
        let mut watcher = watcher(&shell, 10);

        watcher.start(&mut page.dom);

        let build = checkbox(&page, &watcher, "CI / build");
        assert!(page.dom.attribute(build, "disabled").is_some());
        assert!(watcher.toggle_watch(&mut page.dom, "CI / build", true).is_err());

        shell.reconnect();
        watcher.on_mutation(&mut page.dom);
        assert!(page.dom.attribute(build, "disabled").is_none());
        watcher.toggle_watch(&mut page.dom, "CI / build", true).unwrap();
        assert_eq!(shell.items().get(BUILD), Some(&Status::Pending));
    }

    #[test]
    fn test_visibility_follows_threshold() {
        let mut page = page();
        let shell = RecordingMessenger::new();
        let mut watcher = watcher(&shell, 10);
        watcher.start(&mut page.dom);
        let container = watcher
            .overlays()
            .container_for(&page.dom, "CI / build", watcher.config())
            .unwrap();

        let target = page.item(0);
        watcher.on_visibility(
            &mut page.dom,
            &[VisibilityEntry {
                target,
                intersection_ratio: 0.9,
            }],
        );
        assert_eq!(page.dom.style(container, "visibility").as_deref(), Some("visible"));

        let target = page.item(0);
        watcher.on_visibility(
            &mut page.dom,
            &[VisibilityEntry {
                target,
                intersection_ratio: 0.5,
            }],
        );
        assert_eq!(page.dom.style(container, "visibility").as_deref(), Some("hidden"));
    }

    #[test]
    fn test_scroll_repositions_overlays() {
        let mut page = page();
        let shell = RecordingMessenger::new();
        let mut watcher = watcher(&shell, 10);
        watcher.start(&mut page.dom);
        let container = watcher
            .overlays()
            .container_for(&page.dom, "CI / build", watcher.config())
            .unwrap();

        page.dom.set_scroll_offset(0.0, 100.0);
        watcher.on_scroll(&mut page.dom);

        let expected = format!("{}px", LIST_TOP + 100.0);
        assert_eq!(page.dom.style(container, "top"), Some(expected));
    }

    #[test]
    fn test_duplicate_labels_get_one_overlay() {
        let mut page = page();
        page.add_check("CI / build", Status::Fail, "Failing after 1m");
        let shell = RecordingMessenger::new();
        let mut watcher = watcher(&shell, 10);

        let outcome = watcher.start(&mut page.dom);

        let CycleOutcome::Completed { placement, .. } = outcome else {
            panic!("unexpected outcome {:?}", outcome);
        };
        assert_eq!(placement.duplicates, 1);
        assert_eq!(placement.created, 2);
    }
}
