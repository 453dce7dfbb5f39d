//! # arbor_noop - In-Memory Host
//!
//! A [`HostConfig`] that builds a plain tree of shared nodes instead of
//! talking to a real rendering target. Every mutation is appended to an
//! operation log, microtasks wait in a FIFO queue until flushed, and any
//! subtree can be snapshotted as JSON.
//!
//! ```ignore
//! let host = Rc::new(NoopHost::new());
//! let scheduler = Rc::new(LocalScheduler::default());
//! let root = create_root(host.create_container(), host.clone(), scheduler.clone());
//! root.render(arbor_core::host("p").child("hi"));
//! run_until_idle(&host, &scheduler);
//! assert_eq!(root.container().text_content(), "hi");
//! ```

pub mod node;

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;

use arbor_core::{HostConfig, HostError, HostNode, HostParent, HostResult, MicroTask, Props, UpdatePayload};
use arbor_scheduler::LocalScheduler;
use serde::Serialize;

pub use node::{NodeKind, NoopContainer, NoopInstance, NoopNode, NoopText};

/// One recorded host mutation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum HostOp {
    CreateInstance { id: u32, tag: String },
    CreateText { id: u32, text: String },
    AppendInitial { parent: u32, child: u32 },
    Append { parent: u32, child: u32 },
    Insert { parent: u32, child: u32, before: u32 },
    Remove { parent: u32, child: u32 },
    UpdateText { id: u32, text: String },
    /// Attribute names whose value changed, in name order
    UpdateProps { id: u32, changed: Vec<String> },
}

impl HostOp {
    /// Whether this operation changed an attached tree
    pub fn is_mutation(&self) -> bool {
        !matches!(self, Self::CreateInstance { .. } | Self::CreateText { .. } | Self::AppendInitial { .. })
    }
}

/// In-memory host adapter
#[derive(Default)]
pub struct NoopHost {
    next_id: Cell<u32>,
    microtasks: RefCell<VecDeque<MicroTask>>,
    ops: RefCell<Vec<HostOp>>,
    /// Run microtasks as soon as they are scheduled
    inline_microtasks: bool,
}

impl NoopHost {
    /// Create a host with an empty log
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a host that runs each microtask the moment it is scheduled
    pub fn with_inline_microtasks() -> Self {
        Self {
            inline_microtasks: true,
            ..Self::default()
        }
    }

    fn next_id(&self) -> u32 {
        let id = self.next_id.get() + 1;
        self.next_id.set(id);
        id
    }

    /// Create a detached container
    pub fn create_container(&self) -> NoopContainer {
        NoopNode::new(self.next_id(), NodeKind::Container)
    }

    /// Drain the operation log
    pub fn take_ops(&self) -> Vec<HostOp> {
        std::mem::take(&mut *self.ops.borrow_mut())
    }

    /// Operations that touched attached trees since the last drain
    pub fn take_mutations(&self) -> Vec<HostOp> {
        self.take_ops().into_iter().filter(HostOp::is_mutation).collect()
    }

    /// Number of queued microtasks
    pub fn pending_microtasks(&self) -> usize {
        self.microtasks.borrow().len()
    }

    /// Run queued microtasks in FIFO order, including ones queued while
    /// flushing. Returns how many ran.
    pub fn flush_microtasks(&self) -> usize {
        let mut ran = 0;
        loop {
            let Some(task) = self.microtasks.borrow_mut().pop_front() else {
                break;
            };
            task();
            ran += 1;
        }
        ran
    }

    fn record(&self, op: HostOp) {
        log::trace!("{:?}", op);
        self.ops.borrow_mut().push(op);
    }

    fn attach(&self, parent: &NoopNode, child: &NoopNode, before: Option<&NoopNode>) -> HostResult<()> {
        if let Some(owner) = child.parent() {
            if !owner.ptr_eq(parent) {
                return Err(HostError::AlreadyMounted(format!(
                    "{:?} belongs to {:?}, not {:?}",
                    child, owner, parent
                )));
            }
        }
        if let Some(before) = before {
            if before.ptr_eq(child) || parent.position_of(before).is_none() {
                return Err(HostError::ReferenceNotFound(format!("{:?} in {:?}", before, parent)));
            }
        }

        parent.detach_child(child);
        match before {
            Some(before) => {
                let index = parent
                    .position_of(before)
                    .ok_or_else(|| HostError::ReferenceNotFound(format!("{:?} in {:?}", before, parent)))?;
                parent.insert_child(index, child);
            }
            None => parent.push_child(child),
        }
        Ok(())
    }
}

fn parent_node(parent: &HostParent<NoopHost>) -> &NoopNode {
    match parent {
        HostParent::Container(node) | HostParent::Element(node) => node,
    }
}

fn host_node(node: &HostNode<NoopHost>) -> &NoopNode {
    match node {
        HostNode::Element(node) | HostNode::Text(node) => node,
    }
}

fn changed_attributes(old: &Props, new: &Props) -> Vec<String> {
    let mut changed: Vec<String> = new
        .attributes()
        .filter(|(name, value)| old.get(name) != Some(*value))
        .map(|(name, _)| name.clone())
        .collect();
    changed.extend(
        old.attributes()
            .filter(|(name, _)| new.get(name).is_none())
            .map(|(name, _)| name.clone()),
    );
    changed.sort();
    changed
}

impl HostConfig for NoopHost {
    type Instance = NoopInstance;
    type TextInstance = NoopText;
    type Container = NoopContainer;

    fn create_instance(&self, tag: &str, props: &Props) -> NoopInstance {
        let node = NoopNode::new(self.next_id(), NodeKind::Element(tag.to_string()));
        node.set_props(props);
        self.record(HostOp::CreateInstance {
            id: node.id(),
            tag: tag.to_string(),
        });
        node
    }

    fn create_text_instance(&self, content: &str) -> NoopText {
        let node = NoopNode::new(self.next_id(), NodeKind::Text);
        node.set_text(content);
        self.record(HostOp::CreateText {
            id: node.id(),
            text: content.to_string(),
        });
        node
    }

    fn append_initial_child(&self, parent: &NoopInstance, child: &HostNode<Self>) -> Result<(), HostError> {
        let child = host_node(child);
        self.attach(parent, child, None)?;
        self.record(HostOp::AppendInitial {
            parent: parent.id(),
            child: child.id(),
        });
        Ok(())
    }

    fn append_child_to_container(&self, parent: &HostParent<Self>, child: &HostNode<Self>) -> Result<(), HostError> {
        let (parent, child) = (parent_node(parent), host_node(child));
        self.attach(parent, child, None)?;
        self.record(HostOp::Append {
            parent: parent.id(),
            child: child.id(),
        });
        Ok(())
    }

    fn insert_child_to_container(
        &self,
        child: &HostNode<Self>,
        parent: &HostParent<Self>,
        before: &HostNode<Self>,
    ) -> Result<(), HostError> {
        let (parent, child, before) = (parent_node(parent), host_node(child), host_node(before));
        self.attach(parent, child, Some(before))?;
        self.record(HostOp::Insert {
            parent: parent.id(),
            child: child.id(),
            before: before.id(),
        });
        Ok(())
    }

    fn remove_child(&self, child: &HostNode<Self>, parent: &HostParent<Self>) -> Result<(), HostError> {
        let (parent, child) = (parent_node(parent), host_node(child));
        if !parent.detach_child(child) {
            return Err(HostError::ChildNotFound(format!("{:?} in {:?}", child, parent)));
        }
        self.record(HostOp::Remove {
            parent: parent.id(),
            child: child.id(),
        });
        Ok(())
    }

    fn commit_update(&self, node: &HostNode<Self>, payload: &UpdatePayload) -> Result<(), HostError> {
        match (node, payload) {
            (HostNode::Text(text), UpdatePayload::Text(content)) => {
                text.set_text(content);
                self.record(HostOp::UpdateText {
                    id: text.id(),
                    text: content.clone(),
                });
                Ok(())
            }
            (HostNode::Element(instance), UpdatePayload::Props { old, new }) => {
                instance.set_props(new);
                self.record(HostOp::UpdateProps {
                    id: instance.id(),
                    changed: changed_attributes(old, new),
                });
                Ok(())
            }
            (node, payload) => Err(HostError::Unsupported(format!("{:?} on {:?}", payload, node))),
        }
    }

    fn schedule_micro_task(&self, task: MicroTask) {
        if self.inline_microtasks {
            task();
            return;
        }
        self.microtasks.borrow_mut().push_back(task);
    }
}

/// Alternate between microtasks and scheduler tasks until both are empty.
/// Returns the number of scheduler slices run.
pub fn run_until_idle(host: &NoopHost, scheduler: &LocalScheduler) -> usize {
    let mut slices = 0;
    loop {
        host.flush_microtasks();
        if !scheduler.flush_next() {
            if host.pending_microtasks() == 0 {
                return slices;
            }
            continue;
        }
        slices += 1;
    }
}
