//! Arena tree of element and text nodes.
//!
//! Nodes live in a flat `Vec` and refer to each other by [`NodeId`]. The
//! parent link is a back-index, never owning, so the tree is a strict
//! hierarchy with one extra back-edge per node. Detached nodes (allocated but
//! not yet attached, or popped from their parent) simply stay in the arena;
//! serialization only ever sees what is reachable from the root.

use hashlink::LinkedHashMap;

use crate::error::{Error, Result};

/// Attribute map of an element node.
///
/// Insertion-ordered so that serialization is deterministic; the source
/// attribute order is not otherwise meaningful.
pub type Attrs = LinkedHashMap<String, String>;

/// Index of a node within its [`Tree`].
///
/// Ids are only meaningful for the tree that allocated them. They are stable
/// for the lifetime of the tree: nodes are never deallocated, only detached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(u32);

impl NodeId {
    fn index(self) -> usize {
        self.0 as usize
    }
}

/// The two node variants.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    /// An element with a fully qualified tag (e.g. `w:p`) and attributes.
    Element { tag: String, attrs: Attrs },

    /// A text run. May be empty.
    Text(String),
}

/// A single node: kind plus tree wiring and an optional label.
///
/// The label (`name`) is an opaque marker that consumers may attach to a
/// node; the report engine uses it as a stable identity for conditional
/// anchors. It is not serialized.
#[derive(Debug, Clone)]
pub struct Node {
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
    pub(crate) name: Option<String>,
    pub(crate) kind: NodeKind,
}

impl Node {
    fn new(kind: NodeKind) -> Self {
        Node {
            parent: None,
            children: Vec::new(),
            name: None,
            kind,
        }
    }

    /// The node's kind.
    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    /// The node's parent, if attached.
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// The node's children, in document order.
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }
}

/// An XML tree: arena plus a distinguished root.
///
/// The root is always the first allocated node and cannot be detached.
#[derive(Debug, Clone)]
pub struct Tree {
    nodes: Vec<Node>,
}

impl Tree {
    /// Create a tree whose root is a node of the given kind.
    pub fn new(root: NodeKind) -> Self {
        Tree {
            nodes: vec![Node::new(root)],
        }
    }

    /// The root node id.
    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// Allocate a detached node.
    pub fn alloc(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node::new(kind));
        id
    }

    /// Allocate a detached element node with no attributes.
    pub fn new_element(&mut self, tag: impl Into<String>) -> NodeId {
        self.alloc(NodeKind::Element {
            tag: tag.into(),
            attrs: Attrs::new(),
        })
    }

    /// Allocate a detached element node with the given attributes.
    pub fn new_element_with(&mut self, tag: impl Into<String>, attrs: &[(&str, &str)]) -> NodeId {
        let attrs = attrs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        self.alloc(NodeKind::Element {
            tag: tag.into(),
            attrs,
        })
    }

    /// Allocate a detached text node.
    pub fn new_text(&mut self, text: impl Into<String>) -> NodeId {
        self.alloc(NodeKind::Text(text.into()))
    }

    /// Borrow a node.
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.index()]
    }

    /// The node's kind.
    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.node(id).kind
    }

    /// Whether the node is an element.
    pub fn is_element(&self, id: NodeId) -> bool {
        matches!(self.kind(id), NodeKind::Element { .. })
    }

    /// Whether the node is a text node.
    pub fn is_text(&self, id: NodeId) -> bool {
        matches!(self.kind(id), NodeKind::Text(_))
    }

    /// The element tag, or `None` for text nodes.
    pub fn tag(&self, id: NodeId) -> Option<&str> {
        match self.kind(id) {
            NodeKind::Element { tag, .. } => Some(tag),
            NodeKind::Text(_) => None,
        }
    }

    /// The text content, or `None` for element nodes.
    pub fn text(&self, id: NodeId) -> Option<&str> {
        match self.kind(id) {
            NodeKind::Text(text) => Some(text),
            NodeKind::Element { .. } => None,
        }
    }

    /// Replace the content of a text node. No-op on elements.
    pub fn set_text(&mut self, id: NodeId, text: impl Into<String>) {
        if let NodeKind::Text(t) = &mut self.node_mut(id).kind {
            *t = text.into();
        }
    }

    /// Append to the content of a text node. No-op on elements.
    pub fn push_text(&mut self, id: NodeId, more: &str) {
        if let NodeKind::Text(t) = &mut self.node_mut(id).kind {
            t.push_str(more);
        }
    }

    /// Look up an attribute on an element node.
    pub fn attr(&self, id: NodeId, key: &str) -> Option<&str> {
        match self.kind(id) {
            NodeKind::Element { attrs, .. } => attrs.get(key).map(String::as_str),
            NodeKind::Text(_) => None,
        }
    }

    /// Set an attribute on an element node. No-op on text nodes.
    pub fn set_attr(&mut self, id: NodeId, key: impl Into<String>, value: impl Into<String>) {
        if let NodeKind::Element { attrs, .. } = &mut self.node_mut(id).kind {
            attrs.insert(key.into(), value.into());
        }
    }

    /// The node's label.
    pub fn name(&self, id: NodeId) -> Option<&str> {
        self.node(id).name.as_deref()
    }

    /// Attach a label to the node.
    pub fn set_name(&mut self, id: NodeId, name: impl Into<String>) {
        self.node_mut(id).name = Some(name.into());
    }

    /// The node's parent, if attached.
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).parent
    }

    /// The node's children, in document order.
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.node(id).children
    }

    /// First child, if any.
    pub fn first_child(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).children.first().copied()
    }

    /// The sibling immediately after this node, if any.
    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.parent(id)?;
        let siblings = self.children(parent);
        let idx = siblings.iter().position(|&s| s == id)?;
        siblings.get(idx + 1).copied()
    }

    /// Append `child` as the last child of `parent`.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        self.node_mut(child).parent = Some(parent);
        self.node_mut(parent).children.push(child);
    }

    /// Detach and return the last child of `parent`.
    ///
    /// The detached node keeps its own children and its parent
    /// back-reference: a cursor left on the node can still climb out of the
    /// tree it was removed from, it just is no longer reachable from above.
    pub fn pop_child(&mut self, parent: NodeId) -> Option<NodeId> {
        self.node_mut(parent).children.pop()
    }

    /// Insert `node` as the sibling immediately after `anchor`.
    pub fn insert_after(&mut self, anchor: NodeId, node: NodeId) -> Result<()> {
        let parent = self
            .parent(anchor)
            .ok_or_else(|| Error::structure("cannot insert a sibling of a detached node"))?;
        let idx = self
            .children(parent)
            .iter()
            .position(|&s| s == anchor)
            .ok_or_else(|| Error::structure("node not found in its parent's children"))?;
        self.node_mut(node).parent = Some(parent);
        self.node_mut(parent).children.insert(idx + 1, node);
        Ok(())
    }

    /// Copy a node's kind (tag + attributes, or text) from another tree into
    /// this one, without children, parent, or label.
    pub fn import_shallow(&mut self, other: &Tree, id: NodeId) -> NodeId {
        self.alloc(other.kind(id).clone())
    }

    /// Deep-copy a subtree within this tree. The copy is detached.
    pub fn clone_subtree(&mut self, id: NodeId) -> NodeId {
        let copy = self.alloc(self.kind(id).clone());
        let children: Vec<NodeId> = self.children(id).to_vec();
        for child in children {
            let child_copy = self.clone_subtree(child);
            self.append_child(copy, child_copy);
        }
        copy
    }
}
