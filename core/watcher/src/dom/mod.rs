//! Page access for the watcher.
//!
//! Every component reads and writes the host page through [`Dom`]. Nodes are
//! opaque [`NodeId`] handles into whatever arena the host keeps; a query only
//! ever returns nodes attached to the document.
//!
//! [`MemoryDom`] is the arena-backed implementation used by tests and headless
//! hosts.

mod memory;
mod selector;

pub use memory::MemoryDom;
pub use selector::Selector;

pub(crate) use selector::SelectorSubject;

/// Handle to a node in the host's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

/// Viewport-relative bounding box, as reported by `getBoundingClientRect`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

/// Document scroll position.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ScrollOffset {
    pub x: f64,
    pub y: f64,
}

pub trait Dom {
    /// Element overlay containers are attached to.
    fn body(&self) -> NodeId;

    /// Attached nodes matching `selector` in document order, limited to
    /// descendants of `scope` when given.
    fn query_selector_all(&self, scope: Option<NodeId>, selector: &Selector) -> Vec<NodeId>;

    fn query_selector(&self, scope: Option<NodeId>, selector: &Selector) -> Option<NodeId> {
        self.query_selector_all(scope, selector).into_iter().next()
    }

    fn text_content(&self, node: NodeId) -> String;
    fn has_class(&self, node: NodeId, class: &str) -> bool;
    fn attribute(&self, node: NodeId, name: &str) -> Option<String>;
    fn style(&self, node: NodeId, property: &str) -> Option<String>;
    fn bounding_rect(&self, node: NodeId) -> Rect;
    fn scroll_offset(&self) -> ScrollOffset;
    fn document_title(&self) -> String;

    /// Creates a detached element.
    fn create_element(&mut self, tag: &str) -> NodeId;
    fn append_child(&mut self, parent: NodeId, child: NodeId);
    /// Detaches `node` (and its subtree) from the document.
    fn remove(&mut self, node: NodeId);
    fn set_attribute(&mut self, node: NodeId, name: &str, value: &str);
    fn remove_attribute(&mut self, node: NodeId, name: &str);
    fn set_style(&mut self, node: NodeId, property: &str, value: &str);
}
