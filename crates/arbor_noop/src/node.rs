//! Shared tree nodes of the in-memory host

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use arbor_core::Props;
use serde_json::json;

/// What a node is
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Container,
    Element(String),
    Text,
}

struct NodeData {
    id: u32,
    kind: NodeKind,
    props: RefCell<Props>,
    text: RefCell<String>,
    children: RefCell<Vec<NoopNode>>,
    parent: RefCell<Weak<NodeData>>,
}

/// Cheap shared handle to a host node
#[derive(Clone)]
pub struct NoopNode(Rc<NodeData>);

/// Element instance handle
pub type NoopInstance = NoopNode;
/// Text instance handle
pub type NoopText = NoopNode;
/// Root container handle
pub type NoopContainer = NoopNode;

impl NoopNode {
    pub(crate) fn new(id: u32, kind: NodeKind) -> Self {
        Self(Rc::new(NodeData {
            id,
            kind,
            props: RefCell::new(Props::new()),
            text: RefCell::new(String::new()),
            children: RefCell::new(Vec::new()),
            parent: RefCell::new(Weak::new()),
        }))
    }

    /// Stable id, unique per host
    pub fn id(&self) -> u32 {
        self.0.id
    }

    /// Node kind
    pub fn kind(&self) -> &NodeKind {
        &self.0.kind
    }

    /// Tag of an element node
    pub fn tag(&self) -> Option<&str> {
        match &self.0.kind {
            NodeKind::Element(tag) => Some(tag),
            _ => None,
        }
    }

    /// Attributes of an element node
    pub fn props(&self) -> Props {
        self.0.props.borrow().clone()
    }

    /// Own text of a text node
    pub fn text(&self) -> String {
        self.0.text.borrow().clone()
    }

    /// Attached children in order
    pub fn children(&self) -> Vec<NoopNode> {
        self.0.children.borrow().clone()
    }

    /// Ids of the attached children
    pub fn child_ids(&self) -> Vec<u32> {
        self.0.children.borrow().iter().map(NoopNode::id).collect()
    }

    /// Node this one is attached to
    pub fn parent(&self) -> Option<NoopNode> {
        self.0.parent.borrow().upgrade().map(NoopNode)
    }

    /// Same node
    pub fn ptr_eq(&self, other: &NoopNode) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Concatenated text of the subtree
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    fn collect_text(&self, out: &mut String) {
        if self.0.kind == NodeKind::Text {
            out.push_str(&self.0.text.borrow());
        }
        for child in self.0.children.borrow().iter() {
            child.collect_text(out);
        }
    }

    /// Snapshot of the subtree. A container snapshots as the array of its
    /// children.
    pub fn to_json(&self) -> serde_json::Value {
        let children: Vec<serde_json::Value> = self.0.children.borrow().iter().map(NoopNode::to_json).collect();
        match &self.0.kind {
            NodeKind::Container => serde_json::Value::Array(children),
            NodeKind::Text => json!({ "text": self.text() }),
            NodeKind::Element(tag) => {
                let props = serde_json::to_value(&*self.0.props.borrow()).unwrap_or(serde_json::Value::Null);
                json!({ "type": tag, "props": props, "children": children })
            }
        }
    }

    pub(crate) fn set_props(&self, props: &Props) {
        *self.0.props.borrow_mut() = props
            .attributes()
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();
    }

    pub(crate) fn set_text(&self, text: &str) {
        *self.0.text.borrow_mut() = text.to_string();
    }

    pub(crate) fn position_of(&self, child: &NoopNode) -> Option<usize> {
        self.0.children.borrow().iter().position(|c| c.ptr_eq(child))
    }

    pub(crate) fn push_child(&self, child: &NoopNode) {
        self.0.children.borrow_mut().push(child.clone());
        *child.0.parent.borrow_mut() = Rc::downgrade(&self.0);
    }

    pub(crate) fn insert_child(&self, index: usize, child: &NoopNode) {
        self.0.children.borrow_mut().insert(index, child.clone());
        *child.0.parent.borrow_mut() = Rc::downgrade(&self.0);
    }

    /// Detach `child` if it is attached here. Returns whether it was.
    pub(crate) fn detach_child(&self, child: &NoopNode) -> bool {
        let Some(index) = self.position_of(child) else {
            return false;
        };
        self.0.children.borrow_mut().remove(index);
        *child.0.parent.borrow_mut() = Weak::new();
        true
    }
}

impl fmt::Debug for NoopNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0.kind {
            NodeKind::Container => write!(f, "#{} container", self.0.id),
            NodeKind::Element(tag) => write!(f, "#{} <{}>", self.0.id, tag),
            NodeKind::Text => write!(f, "#{} {:?}", self.0.id, self.0.text.borrow()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot() {
        let container = NoopNode::new(1, NodeKind::Container);
        let div = NoopNode::new(2, NodeKind::Element("div".to_string()));
        let mut props = Props::from_children("ignored".into());
        props.insert("id", "main");
        div.set_props(&props);
        let text = NoopNode::new(3, NodeKind::Text);
        text.set_text("hello");

        div.push_child(&text);
        container.push_child(&div);

        assert_eq!(
            container.to_json(),
            json!([{ "type": "div", "props": { "id": "main" }, "children": [{ "text": "hello" }] }])
        );
        assert_eq!(container.text_content(), "hello");
        assert_eq!(text.parent().map(|p| p.id()), Some(2));
    }

    #[test]
    fn test_detach_clears_parent() {
        let parent = NoopNode::new(1, NodeKind::Container);
        let child = NoopNode::new(2, NodeKind::Text);
        parent.push_child(&child);

        assert!(parent.detach_child(&child));
        assert!(child.parent().is_none());
        assert!(!parent.detach_child(&child));
    }
}
