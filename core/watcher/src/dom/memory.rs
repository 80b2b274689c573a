//! Arena-backed document used by tests and headless hosts.
//!
//! Nodes live in a `Vec` and are never freed; removal only unlinks them, so a
//! stale [`NodeId`] stays valid to inspect but no longer matches queries.
//! Host-side helpers (`append_element`, `set_class`, ...) model the page's own
//! rendering and are not counted as watcher writes; only [`Dom`] trait
//! mutations bump [`MemoryDom::writes`].

use std::collections::BTreeMap;

use super::{Dom, NodeId, Rect, ScrollOffset, Selector, SelectorSubject};

#[derive(Debug, Clone)]
struct Node {
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    tag: String,
    attrs: BTreeMap<String, String>,
    style: BTreeMap<String, String>,
    text: String,
    rect: Rect,
}

impl Node {
    fn new(tag: &str, parent: Option<NodeId>) -> Self {
        Self {
            parent,
            children: Vec::new(),
            tag: tag.to_ascii_lowercase(),
            attrs: BTreeMap::new(),
            style: BTreeMap::new(),
            text: String::new(),
            rect: Rect::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MemoryDom {
    nodes: Vec<Node>,
    root: NodeId,
    body: NodeId,
    title: String,
    scroll: ScrollOffset,
    writes: usize,
}

impl Default for MemoryDom {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDom {
    pub fn new() -> Self {
        let root = NodeId(0);
        let body = NodeId(1);
        let mut document = Node::new("#document", None);
        document.children.push(body);
        Self {
            nodes: vec![document, Node::new("body", Some(root))],
            root,
            body,
            title: String::new(),
            scroll: ScrollOffset::default(),
            writes: 0,
        }
    }

    /// Number of mutations made through the [`Dom`] trait.
    pub fn writes(&self) -> usize {
        self.writes
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes[node.0].parent
    }

    pub fn children(&self, node: NodeId) -> &[NodeId] {
        &self.nodes[node.0].children
    }

    pub fn is_connected(&self, node: NodeId) -> bool {
        let mut cursor = Some(node);
        while let Some(current) = cursor {
            if current == self.root {
                return true;
            }
            cursor = self.nodes[current.0].parent;
        }
        false
    }

    /// Host-side render: appends an element with a class list and own text.
    pub fn append_element(&mut self, parent: NodeId, tag: &str, class: &str, text: &str) -> NodeId {
        let id = self.alloc(tag);
        if !class.trim().is_empty() {
            self.nodes[id.0]
                .attrs
                .insert("class".to_string(), class.trim().to_string());
        }
        self.nodes[id.0].text = text.to_string();
        self.link(parent, id);
        id
    }

    pub fn set_text(&mut self, node: NodeId, text: &str) {
        self.nodes[node.0].text = text.to_string();
    }

    pub fn set_class(&mut self, node: NodeId, class: &str) {
        self.nodes[node.0]
            .attrs
            .insert("class".to_string(), class.to_string());
    }

    pub fn set_rect(&mut self, node: NodeId, rect: Rect) {
        self.nodes[node.0].rect = rect;
    }

    pub fn set_scroll_offset(&mut self, x: f64, y: f64) {
        self.scroll = ScrollOffset { x, y };
    }

    pub fn set_title(&mut self, title: &str) {
        self.title = title.to_string();
    }

    /// Host-side removal, e.g. the page re-rendering its status list.
    pub fn detach(&mut self, node: NodeId) {
        self.unlink(node);
    }

    /// Host-side re-insertion of a previously detached node.
    pub fn reattach(&mut self, parent: NodeId, node: NodeId) {
        self.link(parent, node);
    }

    fn alloc(&mut self, tag: &str) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node::new(tag, None));
        id
    }

    fn link(&mut self, parent: NodeId, child: NodeId) {
        self.unlink(child);
        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.push(child);
    }

    fn unlink(&mut self, node: NodeId) {
        if let Some(parent) = self.nodes[node.0].parent.take() {
            self.nodes[parent.0].children.retain(|child| *child != node);
        }
    }

    fn descendants(&self, start: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.nodes[start.0].children.iter().rev().copied().collect();
        while let Some(node) = stack.pop() {
            out.push(node);
            stack.extend(self.nodes[node.0].children.iter().rev().copied());
        }
        out
    }
}

impl SelectorSubject for MemoryDom {
    type Node = NodeId;

    fn tag(&self, node: NodeId) -> &str {
        &self.nodes[node.0].tag
    }

    fn has_class(&self, node: NodeId, class: &str) -> bool {
        self.nodes[node.0]
            .attrs
            .get("class")
            .is_some_and(|classes| classes.split_whitespace().any(|c| c == class))
    }

    fn attr(&self, node: NodeId, name: &str) -> Option<&str> {
        self.nodes[node.0].attrs.get(name).map(String::as_str)
    }

    fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes[node.0].parent
    }
}

impl Dom for MemoryDom {
    fn body(&self) -> NodeId {
        self.body
    }

    fn query_selector_all(&self, scope: Option<NodeId>, selector: &Selector) -> Vec<NodeId> {
        let start = scope.unwrap_or(self.root);
        if !self.is_connected(start) {
            return Vec::new();
        }
        self.descendants(start)
            .into_iter()
            .filter(|node| selector.matches(self, *node))
            .collect()
    }

    fn text_content(&self, node: NodeId) -> String {
        let mut text = self.nodes[node.0].text.clone();
        for descendant in self.descendants(node) {
            text.push_str(&self.nodes[descendant.0].text);
        }
        text
    }

    fn has_class(&self, node: NodeId, class: &str) -> bool {
        SelectorSubject::has_class(self, node, class)
    }

    fn attribute(&self, node: NodeId, name: &str) -> Option<String> {
        self.attr(node, name).map(str::to_string)
    }

    fn style(&self, node: NodeId, property: &str) -> Option<String> {
        self.nodes[node.0].style.get(property).cloned()
    }

    fn bounding_rect(&self, node: NodeId) -> Rect {
        self.nodes[node.0].rect
    }

    fn scroll_offset(&self) -> ScrollOffset {
        self.scroll
    }

    fn document_title(&self) -> String {
        self.title.clone()
    }

    fn create_element(&mut self, tag: &str) -> NodeId {
        self.writes += 1;
        self.alloc(tag)
    }

    fn append_child(&mut self, parent: NodeId, child: NodeId) {
        self.writes += 1;
        self.link(parent, child);
    }

    fn remove(&mut self, node: NodeId) {
        self.writes += 1;
        self.unlink(node);
    }

    fn set_attribute(&mut self, node: NodeId, name: &str, value: &str) {
        self.writes += 1;
        self.nodes[node.0]
            .attrs
            .insert(name.to_string(), value.to_string());
    }

    fn remove_attribute(&mut self, node: NodeId, name: &str) {
        self.writes += 1;
        self.nodes[node.0].attrs.remove(name);
    }

    fn set_style(&mut self, node: NodeId, property: &str, value: &str) {
        self.writes += 1;
        self.nodes[node.0]
            .style
            .insert(property.to_string(), value.to_string());
    }
}
