//! Update queues and the base-queue rebase
//!
//! Updates are enqueued on a shared pending list and consumed by the begin
//! phase of the fiber that owns the queue. Consumption filters by the lanes
//! being rendered:
//! - an update outside the render lanes is skipped and carried forward on the
//!   base queue; the first skip freezes `base_state`
//! - an included update is applied; once anything was skipped it is also
//!   carried forward at `NO_LANE`
//!
//! Replaying `base_state` through `base_queue` always lands on the same state
//! as processing every update in one pass.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use arbor_core::{Action, Value};

use crate::lanes::{Lane, Lanes};

/// One state transition
#[derive(Clone)]
pub struct Update {
    /// Transition to apply
    pub action: Action,
    /// Priority the update was issued at
    pub lane: Lane,
}

impl Update {
    /// Create an update
    pub fn new(action: Action, lane: Lane) -> Self {
        Self { action, lane }
    }
}

impl fmt::Debug for Update {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Update")
            .field("action", &self.action)
            .field("lane", &self.lane)
            .finish()
    }
}

/// Pending updates of one state cell
#[derive(Debug, Default)]
pub struct UpdateQueue {
    pending: Vec<Update>,
    detached: bool,
}

impl UpdateQueue {
    /// Append an update
    pub fn enqueue(&mut self, update: Update) {
        self.pending.push(update);
    }

    /// Remove and return every pending update, oldest first
    pub fn take_pending(&mut self) -> Vec<Update> {
        std::mem::take(&mut self.pending)
    }

    /// Check for pending updates
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Mark the owning component as unmounted
    pub fn detach(&mut self) {
        self.detached = true;
        self.pending.clear();
    }

    /// Whether the owning component was unmounted
    pub fn is_detached(&self) -> bool {
        self.detached
    }
}

/// Queue shared between a state cell and its dispatch function
pub type SharedQueue = Rc<RefCell<UpdateQueue>>;

/// Create an empty shared queue
pub fn new_shared_queue() -> SharedQueue {
    Rc::new(RefCell::new(UpdateQueue::default()))
}

/// State of one cell (a state hook or the root element)
#[derive(Debug, Clone)]
pub struct StateSlot {
    /// State shown by the last processed pass
    pub memoized_state: Value,
    /// Restart point for replaying `base_queue`
    pub base_state: Value,
    /// Updates carried forward to a later pass
    pub base_queue: Vec<Update>,
}

impl StateSlot {
    /// Slot holding a settled value
    pub fn new(state: Value) -> Self {
        Self {
            memoized_state: state.clone(),
            base_state: state,
            base_queue: Vec::new(),
        }
    }

    /// Consume pending updates against this committed slot and return the
    /// slot for the work-in-progress render.
    ///
    /// Pending updates move onto the committed slot's base queue first, so a
    /// discarded render can replay them later.
    pub(crate) fn rebase(&mut self, queue: &SharedQueue, render_lanes: Lanes) -> StateSlot {
        let pending = queue.borrow_mut().take_pending();
        self.base_queue.extend(pending);
        if self.base_queue.is_empty() {
            return self.clone();
        }
        process_update_queue(&self.base_state, &self.base_queue, render_lanes)
    }
}

/// Process `updates` from `base_state`, applying only updates in `render_lanes`
pub fn process_update_queue(base_state: &Value, updates: &[Update], render_lanes: Lanes) -> StateSlot {
    let mut state = base_state.clone();
    let mut new_base_state: Option<Value> = None;
    let mut new_base_queue: Vec<Update> = Vec::new();

    for update in updates {
        if !render_lanes.includes(update.lane) {
            if new_base_queue.is_empty() {
                new_base_state = Some(state.clone());
            }
            new_base_queue.push(update.clone());
            continue;
        }

        if !new_base_queue.is_empty() {
            new_base_queue.push(Update::new(update.action.clone(), Lanes::NO_LANE));
        }
        state = update.action.apply(&state);
    }

    let base_state = new_base_state.unwrap_or_else(|| state.clone());
    StateSlot {
        memoized_state: state,
        base_state,
        base_queue: new_base_queue,
    }
}
