//! Overlay containers and the watch checkbox mounted in each.
//!
//! Containers are absolutely positioned children of `<body>`, one per status
//! item, and carry their ownership in two attributes: the status id and the
//! generation token of the instance that created them. [`OverlayTag`] is the
//! only place those attributes are read or written.
//!
//! Writes are skipped when the page already holds the value, so a pass over an
//! unchanged page leaves the document untouched.

use std::collections::HashSet;

use tracing::{debug, info};

use crate::arbiter::{arbitrate, Arbitration, GenerationToken};
use crate::config::CompiledConfig;
use crate::dom::{Dom, NodeId};
use crate::types::Status;

/// Ownership metadata of one overlay container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverlayTag {
    pub status_id: String,
    pub generation: GenerationToken,
}

impl OverlayTag {
    /// Reads the tag; an unparseable generation counts as the oldest possible.
    pub fn read<D: Dom + ?Sized>(dom: &D, node: NodeId, config: &CompiledConfig) -> Option<Self> {
        let raw = config.raw();
        let status_id = dom.attribute(node, &raw.status_id_attribute)?;
        let generation = dom
            .attribute(node, &raw.generation_attribute)
            .and_then(|value| GenerationToken::parse(&value))
            .unwrap_or(GenerationToken::OLDEST);
        Some(Self {
            status_id,
            generation,
        })
    }

    fn write<D: Dom + ?Sized>(&self, dom: &mut D, node: NodeId, config: &CompiledConfig) {
        let raw = config.raw();
        dom.set_attribute(node, &raw.status_id_attribute, &self.status_id);
        dom.set_attribute(node, &raw.generation_attribute, &self.generation.to_string());
    }
}

/// Result of [`OverlayManager::ensure_overlay`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    Created { container: NodeId },
    AlreadyCurrent { container: NodeId },
    /// A newer generation owns this item; the caller must shut down.
    Rejected { owner: GenerationToken },
}

impl Placement {
    pub fn container(&self) -> Option<NodeId> {
        match self {
            Placement::Created { container } | Placement::AlreadyCurrent { container } => {
                Some(*container)
            }
            Placement::Rejected { .. } => None,
        }
    }
}

/// What the checkbox should show for one item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckboxView {
    pub status: Status,
    /// `None` when the registry could not be read this pass.
    pub watched: Option<bool>,
}

impl CheckboxView {
    pub fn checked(&self) -> bool {
        self.watched == Some(true)
    }

    /// Finished checks cannot be newly watched, but a watch can always be removed.
    pub fn enabled(&self) -> bool {
        match self.watched {
            Some(true) => true,
            Some(false) => self.status == Status::Pending,
            None => false,
        }
    }
}

pub struct OverlayManager {
    generation: GenerationToken,
}

impl OverlayManager {
    pub fn new(generation: GenerationToken) -> Self {
        Self { generation }
    }

    pub fn generation(&self) -> GenerationToken {
        self.generation
    }

    /// Every tagged container on the page, whoever owns it.
    pub fn containers<D: Dom + ?Sized>(
        &self,
        dom: &D,
        config: &CompiledConfig,
    ) -> Vec<(NodeId, OverlayTag)> {
        dom.query_selector_all(None, &config.containers)
            .into_iter()
            .filter_map(|node| OverlayTag::read(dom, node, config).map(|tag| (node, tag)))
            .collect()
    }

    /// This generation's container for `status_id`.
    pub fn container_for<D: Dom + ?Sized>(
        &self,
        dom: &D,
        status_id: &str,
        config: &CompiledConfig,
    ) -> Option<NodeId> {
        self.containers(dom, config)
            .into_iter()
            .find(|(_, tag)| tag.status_id == status_id && tag.generation == self.generation)
            .map(|(node, _)| node)
    }

    /// Newest generation on the page that outranks this one, if any.
    pub fn newer_owner<D: Dom + ?Sized>(
        &self,
        dom: &D,
        config: &CompiledConfig,
    ) -> Option<GenerationToken> {
        self.containers(dom, config)
            .into_iter()
            .map(|(_, tag)| tag.generation)
            .filter(|generation| arbitrate(*generation, self.generation) == Arbitration::SelfShutdown)
            .max()
    }

    pub fn ensure_overlay<D: Dom + ?Sized>(
        &self,
        dom: &mut D,
        item: NodeId,
        status_id: &str,
        config: &CompiledConfig,
    ) -> Placement {
        let decisions: Vec<_> = self
            .containers(dom, config)
            .into_iter()
            .filter(|(_, tag)| tag.status_id == status_id)
            .map(|(node, tag)| (node, tag.generation, arbitrate(tag.generation, self.generation)))
            .collect();

        // Decide before touching the page: a losing instance must not write.
        if let Some(owner) = decisions
            .iter()
            .filter(|(_, _, decision)| *decision == Arbitration::SelfShutdown)
            .map(|(_, generation, _)| *generation)
            .max()
        {
            return Placement::Rejected { owner };
        }

        let mut current = None;
        for (node, generation, decision) in decisions {
            match decision {
                Arbitration::KeepExisting if current.is_none() => current = Some(node),
                Arbitration::KeepExisting => {
                    debug!(status_id, "Removing duplicate container of own generation");
                    dom.remove(node);
                }
                Arbitration::ReplaceExisting => {
                    info!(
                        status_id,
                        stale = %generation,
                        own = %self.generation,
                        "Replacing container of an older watcher"
                    );
                    dom.remove(node);
                }
                Arbitration::SelfShutdown => {}
            }
        }

        if let Some(container) = current {
            return Placement::AlreadyCurrent { container };
        }

        let container = self.create_container(dom, status_id, config);
        debug!(status_id, ?item, ?container, "Overlay created");
        Placement::Created { container }
    }

    fn create_container<D: Dom + ?Sized>(
        &self,
        dom: &mut D,
        status_id: &str,
        config: &CompiledConfig,
    ) -> NodeId {
        let container = dom.create_element("div");
        dom.set_attribute(container, "class", &config.raw().container_class);
        OverlayTag {
            status_id: status_id.to_string(),
            generation: self.generation,
        }
        .write(dom, container, config);
        dom.set_style(container, "position", "absolute");
        dom.set_style(container, "display", "inline-flex");
        dom.set_style(container, "align-items", "center");
        dom.set_style(container, "z-index", "100");
        // Hidden until the first intersection report says the item is on screen.
        dom.set_style(container, "visibility", "hidden");

        let checkbox = mount_checkbox(dom, container);
        debug!(?checkbox, "Checkbox mounted");

        let body = dom.body();
        dom.append_child(body, container);
        container
    }

    /// Brings the checkbox in `container` in line with `view`.
    pub fn render_checkbox<D: Dom + ?Sized>(
        &self,
        dom: &mut D,
        container: NodeId,
        view: CheckboxView,
        config: &CompiledConfig,
    ) {
        let checkbox = match dom.query_selector(Some(container), &config.checkbox) {
            Some(checkbox) => checkbox,
            None => mount_checkbox(dom, container),
        };

        set_flag(dom, checkbox, "checked", view.checked());
        set_flag(dom, checkbox, "disabled", !view.enabled());
        set_attribute_if_changed(dom, checkbox, "title", &format!("watchraptor: {}", view.status));
        let cursor = if view.enabled() { "pointer" } else { "not-allowed" };
        set_style_if_changed(dom, checkbox, "cursor", cursor);
    }

    /// Places `container` in the gutter left of `item`, in document coordinates.
    pub fn position<D: Dom + ?Sized>(
        &self,
        dom: &mut D,
        container: NodeId,
        item: NodeId,
        config: &CompiledConfig,
    ) {
        let rect = dom.bounding_rect(item);
        let scroll = dom.scroll_offset();
        let left = rect.x + scroll.x - config.raw().gutter_px;
        let top = rect.y + scroll.y;

        set_style_if_changed(dom, container, "left", &format!("{}px", left));
        set_style_if_changed(dom, container, "top", &format!("{}px", top));
        set_style_if_changed(dom, container, "height", &format!("{}px", rect.height));
    }

    pub fn set_visible<D: Dom + ?Sized>(&self, dom: &mut D, container: NodeId, visible: bool) {
        let value = if visible { "visible" } else { "hidden" };
        set_style_if_changed(dom, container, "visibility", value);
    }

    /// Removes own containers whose item is gone and any left by older instances.
    pub fn prune<D: Dom + ?Sized>(
        &self,
        dom: &mut D,
        present: &HashSet<String>,
        config: &CompiledConfig,
    ) -> usize {
        let mut removed = 0;
        for (node, tag) in self.containers(dom, config) {
            let stale = match arbitrate(tag.generation, self.generation) {
                Arbitration::KeepExisting => !present.contains(&tag.status_id),
                Arbitration::ReplaceExisting => true,
                Arbitration::SelfShutdown => false,
            };
            if stale {
                debug!(status_id = %tag.status_id, generation = %tag.generation, "Pruning container");
                dom.remove(node);
                removed += 1;
            }
        }
        removed
    }
}

fn mount_checkbox<D: Dom + ?Sized>(dom: &mut D, container: NodeId) -> NodeId {
    let checkbox = dom.create_element("input");
    dom.set_attribute(checkbox, "type", "checkbox");
    dom.append_child(container, checkbox);
    checkbox
}

fn set_attribute_if_changed<D: Dom + ?Sized>(dom: &mut D, node: NodeId, name: &str, value: &str) {
    if dom.attribute(node, name).as_deref() != Some(value) {
        dom.set_attribute(node, name, value);
    }
}

fn set_style_if_changed<D: Dom + ?Sized>(dom: &mut D, node: NodeId, property: &str, value: &str) {
    if dom.style(node, property).as_deref() != Some(value) {
        dom.set_style(node, property, value);
    }
}

/// Boolean attribute: present means on.
fn set_flag<D: Dom + ?Sized>(dom: &mut D, node: NodeId, name: &str, on: bool) {
    match (on, dom.attribute(node, name).is_some()) {
        (true, false) => dom.set_attribute(node, name, ""),
        (false, true) => dom.remove_attribute(node, name),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WatcherConfig;
    use crate::dom::Rect;
    use crate::testing::ChecksPage;

    fn config() -> CompiledConfig {
        WatcherConfig::default().compile().unwrap()
    }

    fn page() -> ChecksPage {
        let mut page = ChecksPage::new("Add retry budget · Pull Request #7");
        page.add_check("CI / build", Status::Pending, "Started 1m ago");
        page
    }

    #[test]
    fn test_creates_tagged_container_with_checkbox() {
        let mut page = page();
        let config = config();
        let manager = OverlayManager::new(GenerationToken::from_micros(10));
        let item = page.item(0);

        let placement = manager.ensure_overlay(&mut page.dom, item, "CI / build", &config);

        let Placement::Created { container } = placement else {
            panic!("expected a new container, got {:?}", placement);
        };
        let tag = OverlayTag::read(&page.dom, container, &config).unwrap();
        assert_eq!(tag.status_id, "CI / build");
        assert_eq!(tag.generation, GenerationToken::from_micros(10));
        assert!(page.dom.has_class(container, "watchraptor-checkbox-container"));
        assert!(page.dom.query_selector(Some(container), &config.checkbox).is_some());
        assert_eq!(page.dom.style(container, "visibility").as_deref(), Some("hidden"));
    }

    #[test]
    fn test_second_call_is_already_current() {
        let mut page = page();
        let config = config();
        let manager = OverlayManager::new(GenerationToken::from_micros(10));
        let item = page.item(0);

        let first = manager.ensure_overlay(&mut page.dom, item, "CI / build", &config);
        let writes = page.dom.writes();
        let second = manager.ensure_overlay(&mut page.dom, item, "CI / build", &config);

        assert_eq!(
            second,
            Placement::AlreadyCurrent {
                container: first.container().unwrap()
            }
        );
        assert_eq!(page.dom.writes(), writes);
        assert_eq!(manager.containers(&page.dom, &config).len(), 1);
    }

    #[test]
    fn test_newer_generation_replaces_older_container() {
        let mut page = page();
        let config = config();
        let item = page.item(0);
        let older = OverlayManager::new(GenerationToken::from_micros(10));
        let newer = OverlayManager::new(GenerationToken::from_micros(20));

        let stale = older
            .ensure_overlay(&mut page.dom, item, "CI / build", &config)
            .container()
            .unwrap();
        let placement = newer.ensure_overlay(&mut page.dom, item, "CI / build", &config);

        assert!(matches!(placement, Placement::Created { .. }));
        let containers = newer.containers(&page.dom, &config);
        assert_eq!(containers.len(), 1);
        assert_ne!(containers[0].0, stale);
        assert_eq!(containers[0].1.generation, GenerationToken::from_micros(20));
    }

    #[test]
    fn test_older_generation_is_rejected_without_writes() {
        let mut page = page();
        let config = config();
        let item = page.item(0);
        let older = OverlayManager::new(GenerationToken::from_micros(10));
        let newer = OverlayManager::new(GenerationToken::from_micros(20));

        newer.ensure_overlay(&mut page.dom, item, "CI / build", &config);
        let writes = page.dom.writes();
        let placement = older.ensure_overlay(&mut page.dom, item, "CI / build", &config);

        assert_eq!(
            placement,
            Placement::Rejected {
                owner: GenerationToken::from_micros(20)
            }
        );
        assert_eq!(page.dom.writes(), writes);
        assert_eq!(
            older.newer_owner(&page.dom, &config),
            Some(GenerationToken::from_micros(20))
        );
        assert_eq!(newer.newer_owner(&page.dom, &config), None);
    }

    #[test]
    fn test_unreadable_generation_is_replaced() {
        let mut page = page();
        let config = config();
        let item = page.item(0);
        let manager = OverlayManager::new(GenerationToken::from_micros(10));
        let container = manager
            .ensure_overlay(&mut page.dom, item, "CI / build", &config)
            .container()
            .unwrap();
        page.dom
            .set_attribute(container, "data-watchraptor-generation", "garbage");

        let placement = manager.ensure_overlay(&mut page.dom, item, "CI / build", &config);

        assert!(matches!(placement, Placement::Created { .. }));
    }

    #[test]
    fn test_positions_in_gutter_with_scroll_offset() {
        let mut page = page();
        let config = config();
        let item = page.item(0);
        page.dom.set_rect(item, Rect::new(60.0, 120.0, 600.0, 40.0));
        page.dom.set_scroll_offset(0.0, 300.0);
        let manager = OverlayManager::new(GenerationToken::from_micros(10));
        let container = manager
            .ensure_overlay(&mut page.dom, item, "CI / build", &config)
            .container()
            .unwrap();

        manager.position(&mut page.dom, container, item, &config);

        assert_eq!(page.dom.style(container, "left").as_deref(), Some("40px"));
        assert_eq!(page.dom.style(container, "top").as_deref(), Some("420px"));
        assert_eq!(page.dom.style(container, "height").as_deref(), Some("40px"));
    }

    #[test]
    fn test_checkbox_reflects_watch_state() {
        let mut page = page();
        let config = config();
        let item = page.item(0);
        let manager = OverlayManager::new(GenerationToken::from_micros(10));
        let container = manager
            .ensure_overlay(&mut page.dom, item, "CI / build", &config)
            .container()
            .unwrap();
        let checkbox = page.dom.query_selector(Some(container), &config.checkbox).unwrap();

        manager.render_checkbox(
            &mut page.dom,
            container,
            CheckboxView {
                status: Status::Pending,
                watched: Some(true),
            },
            &config,
        );
        assert!(page.dom.attribute(checkbox, "checked").is_some());
        assert!(page.dom.attribute(checkbox, "disabled").is_none());
        assert_eq!(
            page.dom.attribute(checkbox, "title").as_deref(),
            Some("watchraptor: pending")
        );

        manager.render_checkbox(
            &mut page.dom,
            container,
            CheckboxView {
                status: Status::Success,
                watched: Some(false),
            },
            &config,
        );
        assert!(page.dom.attribute(checkbox, "checked").is_none());
        assert!(page.dom.attribute(checkbox, "disabled").is_some());
        assert_eq!(
            page.dom.query_selector_all(Some(container), &config.checkbox),
            vec![checkbox]
        );
    }

    #[test]
    fn test_unreadable_registry_disables_checkbox() {
        let view = CheckboxView {
            status: Status::Pending,
            watched: None,
        };
        assert!(!view.enabled());
        assert!(!view.checked());
    }

    #[test]
    fn test_prune_removes_orphans_and_older_generations() {
        let mut page = page();
        page.add_check("CI / lint", Status::Pending, "Queued");
        let config = config();
        let older = OverlayManager::new(GenerationToken::from_micros(10));
        let own = OverlayManager::new(GenerationToken::from_micros(20));
        let build = page.item(0);
        let lint = page.item(1);

        older.ensure_overlay(&mut page.dom, lint, "CI / lint", &config);
        own.ensure_overlay(&mut page.dom, build, "CI / build", &config);
        own.ensure_overlay(&mut page.dom, lint, "CI / gone", &config);

        let present: HashSet<String> = ["CI / build".to_string()].into_iter().collect();
        let removed = own.prune(&mut page.dom, &present, &config);

        assert_eq!(removed, 2);
        let remaining = own.containers(&page.dom, &config);
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].1.status_id, "CI / build");
    }
}
