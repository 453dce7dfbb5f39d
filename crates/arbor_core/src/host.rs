//! Host adapter contract
//!
//! A host adapter turns abstract node descriptions into real objects of one
//! rendering target. The reconciler is generic over [`HostConfig`] and only
//! ever touches host objects through these methods.
//!
//! Mutations return `Result<(), HostError>`; the reconciler treats a rejected
//! mutation as a structural bug, logs it and carries on with the commit.

use std::any::Any;
use std::fmt;
use std::rc::Rc;

use crate::element::Props;
use crate::error::HostError;

/// Deferred callback queued on the host's microtask queue
pub type MicroTask = Box<dyn FnOnce()>;

/// A host-side node: either an element instance or a text instance
pub enum HostNode<H: HostConfig> {
    /// Element instance
    Element(H::Instance),
    /// Text instance
    Text(H::TextInstance),
}

impl<H: HostConfig> Clone for HostNode<H> {
    fn clone(&self) -> Self {
        match self {
            Self::Element(instance) => Self::Element(instance.clone()),
            Self::Text(text) => Self::Text(text.clone()),
        }
    }
}

impl<H: HostConfig> fmt::Debug for HostNode<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Element(instance) => f.debug_tuple("Element").field(instance).finish(),
            Self::Text(text) => f.debug_tuple("Text").field(text).finish(),
        }
    }
}

/// Something host nodes can be inserted into
pub enum HostParent<H: HostConfig> {
    /// The root container
    Container(H::Container),
    /// An element instance
    Element(H::Instance),
}

impl<H: HostConfig> Clone for HostParent<H> {
    fn clone(&self) -> Self {
        match self {
            Self::Container(container) => Self::Container(container.clone()),
            Self::Element(instance) => Self::Element(instance.clone()),
        }
    }
}

impl<H: HostConfig> fmt::Debug for HostParent<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Container(container) => f.debug_tuple("Container").field(container).finish(),
            Self::Element(instance) => f.debug_tuple("Element").field(instance).finish(),
        }
    }
}

/// What changed on a host node
#[derive(Debug, Clone, PartialEq)]
pub enum UpdatePayload {
    /// New text content
    Text(String),
    /// New props for an element instance
    Props {
        /// Props at the previous commit
        old: Props,
        /// Props to apply
        new: Props,
    },
}

/// Rendering target adapter
pub trait HostConfig: Sized + 'static {
    /// Element instance handle
    type Instance: Clone + fmt::Debug + 'static;
    /// Text instance handle
    type TextInstance: Clone + fmt::Debug + 'static;
    /// Root mount point
    type Container: Clone + fmt::Debug + 'static;

    /// Create an element instance
    fn create_instance(&self, tag: &str, props: &Props) -> Self::Instance;

    /// Create a text instance
    fn create_text_instance(&self, content: &str) -> Self::TextInstance;

    /// Append a child to an instance that is not yet attached to the tree
    fn append_initial_child(
        &self,
        parent: &Self::Instance,
        child: &HostNode<Self>,
    ) -> Result<(), HostError>;

    /// Append a child at the end of a parent
    fn append_child_to_container(
        &self,
        parent: &HostParent<Self>,
        child: &HostNode<Self>,
    ) -> Result<(), HostError>;

    /// Insert a child before a sibling
    fn insert_child_to_container(
        &self,
        child: &HostNode<Self>,
        parent: &HostParent<Self>,
        before: &HostNode<Self>,
    ) -> Result<(), HostError>;

    /// Remove a child from a parent
    fn remove_child(&self, child: &HostNode<Self>, parent: &HostParent<Self>) -> Result<(), HostError>;

    /// Apply a prop or text change
    fn commit_update(&self, node: &HostNode<Self>, payload: &UpdatePayload) -> Result<(), HostError>;

    /// Queue a microtask
    fn schedule_micro_task(&self, task: MicroTask);

    /// Value handed to refs attached to an element instance
    fn public_instance(&self, instance: &Self::Instance) -> Rc<dyn Any> {
        Rc::new(instance.clone())
    }
}
