//! Headless document model.
//!
//! An arena of element and text nodes standing in for the browser DOM. `Document` is a cheap
//! handle (`Rc` inside); every method borrows the tree for the duration of the call only, so a
//! handle can be held across await points.

pub mod html;
pub mod visibility;

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

/// Attribute toggled by show/hide.
pub const HIDDEN_ATTR: &str = "hidden";

// ===== NodeId =====

/// Identity of a node in a [`Document`]. Stable for the lifetime of the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(usize);

impl NodeId {
    /// Wrap a raw arena index.
    pub fn from_raw(raw: usize) -> Self {
        Self(raw)
    }

    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Scroll offsets of an element.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScrollOffset {
    pub left: i32,
    pub top: i32,
}

impl ScrollOffset {
    pub fn new(left: i32, top: i32) -> Self {
        Self { left, top }
    }
}

// ===== Nodes =====

#[derive(Debug, Clone)]
pub(crate) enum NodeKind {
    Element(ElementData),
    Text(String),
}

#[derive(Debug, Clone, Default)]
pub(crate) struct ElementData {
    pub(crate) tag: String,
    pub(crate) attributes: BTreeMap<String, String>,
    pub(crate) classes: Vec<String>,
    pub(crate) styles: BTreeMap<String, String>,
}

#[derive(Debug, Clone)]
pub(crate) struct Node {
    pub(crate) kind: NodeKind,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
    pub(crate) scroll: ScrollOffset,
}

#[derive(Debug)]
pub(crate) struct Tree {
    pub(crate) nodes: Vec<Node>,
    body: NodeId,
    layout_flushes: u64,
}

impl Tree {
    fn push(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            kind,
            parent: None,
            children: Vec::new(),
            scroll: ScrollOffset::default(),
        });
        id
    }

    fn element_mut(&mut self, id: NodeId) -> Option<&mut ElementData> {
        match self.nodes.get_mut(id.0).map(|n| &mut n.kind) {
            Some(NodeKind::Element(data)) => Some(data),
            _ => None,
        }
    }

    fn element(&self, id: NodeId) -> Option<&ElementData> {
        match self.nodes.get(id.0).map(|n| &n.kind) {
            Some(NodeKind::Element(data)) => Some(data),
            _ => None,
        }
    }

    fn detach(&mut self, id: NodeId) {
        let Some(parent) = self.nodes.get(id.0).and_then(|n| n.parent) else {
            return;
        };
        if let Some(node) = self.nodes.get_mut(parent.0) {
            node.children.retain(|child| *child != id);
        }
        self.nodes[id.0].parent = None;
    }

    fn is_ancestor(&self, candidate: NodeId, of: NodeId) -> bool {
        let mut cursor = Some(of);
        while let Some(id) = cursor {
            if id == candidate {
                return true;
            }
            cursor = self.nodes.get(id.0).and_then(|n| n.parent);
        }
        false
    }
}

// ===== Document =====

/// Handle to a headless document. Clones share the same tree.
#[derive(Clone)]
pub struct Document {
    tree: Rc<RefCell<Tree>>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tree = self.tree.borrow();
        f.debug_struct("Document")
            .field("nodes", &tree.nodes.len())
            .field("layout_flushes", &tree.layout_flushes)
            .finish()
    }
}

impl Document {
    /// Create a document with an empty `<body>`.
    pub fn new() -> Self {
        let mut tree = Tree {
            nodes: Vec::new(),
            body: NodeId(0),
            layout_flushes: 0,
        };
        tree.body = tree.push(NodeKind::Element(ElementData {
            tag: "body".to_string(),
            ..ElementData::default()
        }));
        Self {
            tree: Rc::new(RefCell::new(tree)),
        }
    }

    pub fn body(&self) -> NodeId {
        self.tree.borrow().body
    }

    pub fn create_element(&self, tag: &str) -> NodeId {
        self.tree.borrow_mut().push(NodeKind::Element(ElementData {
            tag: tag.to_string(),
            ..ElementData::default()
        }))
    }

    /// Create an element with the given classes.
    pub fn element(&self, tag: &str, classes: &[&str]) -> NodeId {
        let id = self.create_element(tag);
        for class in classes {
            self.add_class(id, class);
        }
        id
    }

    pub fn create_text(&self, text: &str) -> NodeId {
        self.tree.borrow_mut().push(NodeKind::Text(text.to_string()))
    }

    /// Create an element containing a single text node.
    pub fn text_element(&self, tag: &str, text: &str) -> NodeId {
        let id = self.create_element(tag);
        let text = self.create_text(text);
        self.append_child(id, text);
        id
    }

    // ===== Structure =====

    /// Append `child` to `parent`, detaching it from its current parent first.
    ///
    /// Appending a node into its own subtree is ignored.
    pub fn append_child(&self, parent: NodeId, child: NodeId) {
        let mut tree = self.tree.borrow_mut();
        if tree.is_ancestor(child, parent) {
            tracing::warn!(%parent, %child, "refusing to append a node into its own subtree");
            return;
        }
        tree.detach(child);
        tree.nodes[parent.0].children.push(child);
        tree.nodes[child.0].parent = Some(parent);
    }

    /// Put `replacement` where `old` is, detaching `old`.
    ///
    /// Does nothing when `old` has no parent.
    pub fn replace(&self, old: NodeId, replacement: NodeId) {
        if old == replacement {
            return;
        }
        let mut tree = self.tree.borrow_mut();
        let Some(parent) = tree.nodes[old.0].parent else {
            return;
        };
        if tree.is_ancestor(replacement, parent) {
            tracing::warn!(%old, %replacement, "refusing to replace with an ancestor");
            return;
        }
        tree.detach(replacement);
        let position = tree.nodes[parent.0]
            .children
            .iter()
            .position(|child| *child == old);
        if let Some(position) = position {
            tree.nodes[parent.0].children[position] = replacement;
            tree.nodes[replacement.0].parent = Some(parent);
            tree.nodes[old.0].parent = None;
        }
    }

    /// Detach a node from its parent. The node and its subtree stay in the arena.
    pub fn detach(&self, id: NodeId) {
        self.tree.borrow_mut().detach(id);
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.tree.borrow().nodes.get(id.0).and_then(|n| n.parent)
    }

    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        self.tree
            .borrow()
            .nodes
            .get(id.0)
            .map(|n| n.children.clone())
            .unwrap_or_default()
    }

    /// True when the node is reachable from `<body>`.
    pub fn is_connected(&self, id: NodeId) -> bool {
        let tree = self.tree.borrow();
        let body = tree.body;
        tree.is_ancestor(body, id)
    }

    /// Depth-first search below (and including) `root`.
    pub fn find(&self, root: NodeId, predicate: impl Fn(&Document, NodeId) -> bool) -> Option<NodeId> {
        self.find_dyn(root, &predicate)
    }

    fn find_dyn(&self, root: NodeId, predicate: &dyn Fn(&Document, NodeId) -> bool) -> Option<NodeId> {
        if predicate(self, root) {
            return Some(root);
        }
        self.children(root)
            .into_iter()
            .find_map(|child| self.find_dyn(child, predicate))
    }

    /// First element below `root` carrying `class`.
    pub fn find_by_class(&self, root: NodeId, class: &str) -> Option<NodeId> {
        self.find(root, |doc, id| doc.has_class(id, class))
    }

    // ===== Elements =====

    pub fn tag(&self, id: NodeId) -> Option<String> {
        self.tree.borrow().element(id).map(|e| e.tag.clone())
    }

    pub fn set_attribute(&self, id: NodeId, name: &str, value: &str) {
        if let Some(element) = self.tree.borrow_mut().element_mut(id) {
            element
                .attributes
                .insert(name.to_string(), value.to_string());
        }
    }

    pub fn attribute(&self, id: NodeId, name: &str) -> Option<String> {
        self.tree
            .borrow()
            .element(id)
            .and_then(|e| e.attributes.get(name).cloned())
    }

    pub fn remove_attribute(&self, id: NodeId, name: &str) {
        if let Some(element) = self.tree.borrow_mut().element_mut(id) {
            element.attributes.remove(name);
        }
    }

    pub fn add_class(&self, id: NodeId, class: &str) {
        if let Some(element) = self.tree.borrow_mut().element_mut(id) {
            if !element.classes.iter().any(|c| c == class) {
                element.classes.push(class.to_string());
            }
        }
    }

    pub fn remove_class(&self, id: NodeId, class: &str) {
        if let Some(element) = self.tree.borrow_mut().element_mut(id) {
            element.classes.retain(|c| c != class);
        }
    }

    pub fn has_class(&self, id: NodeId, class: &str) -> bool {
        self.tree
            .borrow()
            .element(id)
            .is_some_and(|e| e.classes.iter().any(|c| c == class))
    }

    pub fn set_style(&self, id: NodeId, property: &str, value: &str) {
        if let Some(element) = self.tree.borrow_mut().element_mut(id) {
            element
                .styles
                .insert(property.to_string(), value.to_string());
        }
    }

    pub fn style(&self, id: NodeId, property: &str) -> Option<String> {
        self.tree
            .borrow()
            .element(id)
            .and_then(|e| e.styles.get(property).cloned())
    }

    pub fn clear_style(&self, id: NodeId, property: &str) {
        if let Some(element) = self.tree.borrow_mut().element_mut(id) {
            element.styles.remove(property);
        }
    }

    pub fn set_hidden(&self, id: NodeId, hidden: bool) {
        if hidden {
            self.set_attribute(id, HIDDEN_ATTR, "");
        } else {
            self.remove_attribute(id, HIDDEN_ATTR);
        }
    }

    pub fn is_hidden(&self, id: NodeId) -> bool {
        self.attribute(id, HIDDEN_ATTR).is_some()
    }

    /// Concatenated text of the subtree.
    pub fn text_content(&self, id: NodeId) -> String {
        let tree = self.tree.borrow();
        let mut out = String::new();
        collect_text(&tree, id, &mut out);
        out
    }

    // ===== Scroll & layout =====

    pub fn scroll(&self, id: NodeId) -> ScrollOffset {
        self.tree
            .borrow()
            .nodes
            .get(id.0)
            .map(|n| n.scroll)
            .unwrap_or_default()
    }

    pub fn set_scroll(&self, id: NodeId, offset: ScrollOffset) {
        if let Some(node) = self.tree.borrow_mut().nodes.get_mut(id.0) {
            node.scroll = offset;
        }
    }

    /// Force a synchronous layout pass. Headless: only counted.
    pub fn force_layout(&self) {
        self.tree.borrow_mut().layout_flushes += 1;
    }

    pub fn layout_flushes(&self) -> u64 {
        self.tree.borrow().layout_flushes
    }

    /// Serialize the subtree rooted at `id`.
    pub fn to_html(&self, id: NodeId) -> String {
        html::serialize(&self.tree.borrow(), id)
    }
}

fn collect_text(tree: &Tree, id: NodeId, out: &mut String) {
    let Some(node) = tree.nodes.get(id.0) else {
        return;
    };
    match &node.kind {
        NodeKind::Text(text) => out.push_str(text),
        NodeKind::Element(_) => {
            for child in &node.children {
                collect_text(tree, *child, out);
            }
        }
    }
}

#[cfg(test)]
#[path = "dom_tests.rs"]
mod tests;
