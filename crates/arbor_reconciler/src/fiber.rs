//! Fibers and the fiber arena
//!
//! Both trees (current and work-in-progress) live in one generational arena.
//! Tree links and the `alternate` pairing are [`FiberId`]s, so cloning and
//! reuse are index bookkeeping. A stale id (its slot was freed and reused)
//! is detected by generation mismatch.

use std::fmt;
use std::ops::{Index, IndexMut};

use arbor_core::{Element, ElementType, HostConfig, HostNode, Props, RefHandle, UpdatePayload, Value};

use crate::flags::Flags;
use crate::hooks::{EffectRef, Hook};
use crate::update_queue::{SharedQueue, StateSlot};

/// Prop holding a text fiber's content
pub(crate) const TEXT_CONTENT: &str = "content";

/// Key for fiber arena access with generation tracking
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct FiberId {
    index: u32,
    generation: u32,
}

impl FiberId {
    const fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    /// Slot index
    pub const fn index(&self) -> u32 {
        self.index
    }

    /// Slot generation
    pub const fn generation(&self) -> u32 {
        self.generation
    }
}

impl fmt::Debug for FiberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FiberId({}v{})", self.index, self.generation)
    }
}

/// Kind of work a fiber represents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkTag {
    FunctionComponent,
    HostRoot,
    HostComponent,
    HostText,
    Fragment,
}

impl WorkTag {
    /// Tags that own a host node
    pub fn is_host(self) -> bool {
        matches!(self, Self::HostComponent | Self::HostText)
    }
}

/// Host-side object owned by a fiber
pub(crate) enum StateNode<H: HostConfig> {
    None,
    /// The HostRoot fiber; the container lives on the root
    Root,
    Host(HostNode<H>),
}

impl<H: HostConfig> StateNode<H> {
    pub(crate) fn host_node(&self) -> Option<&HostNode<H>> {
        match self {
            Self::Host(node) => Some(node),
            _ => None,
        }
    }
}

impl<H: HostConfig> Clone for StateNode<H> {
    fn clone(&self) -> Self {
        match self {
            Self::None => Self::None,
            Self::Root => Self::Root,
            Self::Host(node) => Self::Host(node.clone()),
        }
    }
}

/// Per-tag memoized state
#[derive(Clone, Default)]
pub(crate) enum FiberState {
    #[default]
    Empty,
    /// HostRoot: the rendered element tree and its rebase bookkeeping
    Root(StateSlot),
    /// FunctionComponent: the hook chain in call order
    Hooks(Vec<Hook>),
}

/// Unit of work and persistent tree node
pub struct Fiber<H: HostConfig> {
    pub(crate) tag: WorkTag,
    pub(crate) key: Option<String>,
    pub(crate) element_type: Option<ElementType>,
    pub(crate) pending_props: Props,
    pub(crate) memoized_props: Option<Props>,
    pub(crate) memoized_state: FiberState,
    pub(crate) state_node: StateNode<H>,
    /// HostRoot update queue
    pub(crate) update_queue: Option<SharedQueue>,
    /// Effect list of a function component, in hook order
    pub(crate) effects: Vec<EffectRef>,
    pub(crate) update_payload: Option<UpdatePayload>,
    pub(crate) ref_handle: Option<RefHandle>,

    pub(crate) return_fiber: Option<FiberId>,
    pub(crate) child: Option<FiberId>,
    pub(crate) sibling: Option<FiberId>,
    pub(crate) index: usize,

    pub(crate) flags: Flags,
    pub(crate) subtree_flags: Flags,
    pub(crate) deletions: Vec<FiberId>,
    pub(crate) alternate: Option<FiberId>,
}

impl<H: HostConfig> Fiber<H> {
    /// Create a detached fiber
    pub(crate) fn new(tag: WorkTag, pending_props: Props, key: Option<String>) -> Self {
        Self {
            tag,
            key,
            element_type: None,
            pending_props,
            memoized_props: None,
            memoized_state: FiberState::Empty,
            state_node: StateNode::None,
            update_queue: None,
            effects: Vec::new(),
            update_payload: None,
            ref_handle: None,
            return_fiber: None,
            child: None,
            sibling: None,
            index: 0,
            flags: Flags::NO_FLAGS,
            subtree_flags: Flags::NO_FLAGS,
            deletions: Vec::new(),
            alternate: None,
        }
    }

    /// Root fiber of a tree
    pub(crate) fn host_root(queue: SharedQueue) -> Self {
        let mut fiber = Self::new(WorkTag::HostRoot, Props::new(), None);
        fiber.state_node = StateNode::Root;
        fiber.update_queue = Some(queue);
        fiber.memoized_state = FiberState::Root(StateSlot::new(Value::Null));
        fiber
    }

    /// Fiber for an element descriptor
    pub(crate) fn from_element(element: &Element) -> Self {
        let tag = match &element.element_type {
            ElementType::Host(_) => WorkTag::HostComponent,
            ElementType::Component(_) => WorkTag::FunctionComponent,
            ElementType::Fragment => WorkTag::Fragment,
        };
        let mut fiber = Self::new(tag, element.props.clone(), element.key.clone());
        fiber.element_type = Some(element.element_type.clone());
        fiber.ref_handle = element.ref_handle.clone();
        fiber
    }

    /// Fiber for a text node
    pub(crate) fn from_text(content: String) -> Self {
        Self::new(WorkTag::HostText, text_props(content), None)
    }

    /// Fiber grouping a list of children
    pub(crate) fn from_fragment(children: Value, key: Option<String>) -> Self {
        let mut fiber = Self::new(WorkTag::Fragment, Props::from_children(children), key);
        fiber.element_type = Some(ElementType::Fragment);
        fiber
    }

    /// Work tag
    pub fn tag(&self) -> WorkTag {
        self.tag
    }

    /// Key among siblings
    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    /// Tag name of a host component, or the component name
    pub fn type_name(&self) -> &str {
        match (&self.element_type, self.tag) {
            (Some(element_type), _) => element_type.name(),
            (None, WorkTag::HostRoot) => "#root",
            (None, WorkTag::HostText) => "#text",
            (None, _) => "#unknown",
        }
    }

    /// Content of a text fiber
    pub(crate) fn text_content(props: &Props) -> &str {
        props.get(TEXT_CONTENT).and_then(Value::as_str).unwrap_or("")
    }

    /// Host node owned by this fiber
    pub(crate) fn host_node(&self) -> Option<&HostNode<H>> {
        self.state_node.host_node()
    }
}

/// Props of a text fiber
pub(crate) fn text_props(content: String) -> Props {
    let mut props = Props::new();
    props.insert(TEXT_CONTENT, content);
    props
}

struct Slot<T> {
    value: Option<T>,
    generation: u32,
}

/// Generational storage for both fiber trees
pub struct FiberArena<H: HostConfig> {
    slots: Vec<Slot<Fiber<H>>>,
    free_list: Vec<u32>,
    len: usize,
    /// Fibers allocated since the last commit
    uncommitted: Vec<FiberId>,
}

impl<H: HostConfig> FiberArena<H> {
    /// Create an empty arena
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free_list: Vec::new(),
            len: 0,
            uncommitted: Vec::new(),
        }
    }

    /// Insert a fiber and get its id
    pub(crate) fn insert(&mut self, fiber: Fiber<H>) -> FiberId {
        self.len += 1;

        let id = if let Some(index) = self.free_list.pop() {
            let slot = &mut self.slots[index as usize];
            slot.value = Some(fiber);
            FiberId::new(index, slot.generation)
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(Slot {
                value: Some(fiber),
                generation: 0,
            });
            FiberId::new(index, 0)
        };
        self.uncommitted.push(id);
        id
    }

    /// Remove a fiber
    pub(crate) fn remove(&mut self, id: FiberId) -> Option<Fiber<H>> {
        let slot = self.slots.get_mut(id.index as usize)?;

        if slot.generation != id.generation || slot.value.is_none() {
            return None;
        }

        slot.generation = slot.generation.wrapping_add(1);
        self.free_list.push(id.index);
        self.len -= 1;

        slot.value.take()
    }

    /// Get a fiber
    pub fn get(&self, id: FiberId) -> Option<&Fiber<H>> {
        let slot = self.slots.get(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.value.as_ref()
    }

    /// Get a fiber mutably
    pub(crate) fn get_mut(&mut self, id: FiberId) -> Option<&mut Fiber<H>> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.value.as_mut()
    }

    /// Check if an id is live
    pub fn contains(&self, id: FiberId) -> bool {
        self.get(id).is_some()
    }

    /// Number of live fibers
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Mark every allocated fiber as committed
    pub(crate) fn checkpoint(&mut self) {
        self.uncommitted.clear();
    }

    /// Free fibers allocated since the last commit and unlink them from
    /// their alternates. Returns how many were freed.
    pub(crate) fn discard_uncommitted(&mut self) -> usize {
        let ids = std::mem::take(&mut self.uncommitted);
        let mut freed = 0;
        for id in ids {
            let Some(fiber) = self.remove(id) else {
                continue;
            };
            freed += 1;
            if let Some(other) = fiber.alternate.and_then(|alt| self.get_mut(alt)) {
                if other.alternate == Some(id) {
                    other.alternate = None;
                }
            }
        }
        freed
    }

    /// Live alternate of a fiber
    pub(crate) fn alternate_of(&self, id: FiberId) -> Option<FiberId> {
        self[id].alternate.filter(|alt| self.contains(*alt))
    }

    /// Ids of a fiber's children in sibling order
    pub fn children(&self, id: FiberId) -> Vec<FiberId> {
        let mut children = Vec::new();
        let mut next = self[id].child;
        while let Some(child) = next {
            children.push(child);
            next = self[child].sibling;
        }
        children
    }
}

impl<H: HostConfig> Default for FiberArena<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H: HostConfig> Index<FiberId> for FiberArena<H> {
    type Output = Fiber<H>;

    fn index(&self, id: FiberId) -> &Fiber<H> {
        self.get(id).expect("stale fiber id")
    }
}

impl<H: HostConfig> IndexMut<FiberId> for FiberArena<H> {
    fn index_mut(&mut self, id: FiberId) -> &mut Fiber<H> {
        self.get_mut(id).expect("stale fiber id")
    }
}

/// Get or refresh the work-in-progress counterpart of `current`
pub(crate) fn create_work_in_progress<H: HostConfig>(
    arena: &mut FiberArena<H>,
    current: FiberId,
    pending_props: Props,
) -> FiberId {
    let wip = match arena.alternate_of(current) {
        Some(wip) => {
            let fiber = &mut arena[wip];
            fiber.pending_props = pending_props;
            fiber.flags = Flags::NO_FLAGS;
            fiber.subtree_flags = Flags::NO_FLAGS;
            fiber.deletions.clear();
            fiber.update_payload = None;
            wip
        }
        None => {
            let source = &arena[current];
            let mut fiber = Fiber::new(source.tag, pending_props, source.key.clone());
            fiber.state_node = source.state_node.clone();
            fiber.alternate = Some(current);
            let wip = arena.insert(fiber);
            arena[current].alternate = Some(wip);
            wip
        }
    };

    let source = &arena[current];
    let element_type = source.element_type.clone();
    let update_queue = source.update_queue.clone();
    let child = source.child;
    let memoized_props = source.memoized_props.clone();
    let memoized_state = source.memoized_state.clone();
    let effects = source.effects.clone();
    let ref_handle = source.ref_handle.clone();

    let fiber = &mut arena[wip];
    fiber.element_type = element_type;
    fiber.update_queue = update_queue;
    fiber.child = child;
    fiber.memoized_props = memoized_props;
    fiber.memoized_state = memoized_state;
    fiber.effects = effects;
    fiber.ref_handle = ref_handle;
    wip
}
