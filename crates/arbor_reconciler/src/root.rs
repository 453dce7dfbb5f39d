//! Fiber root and update scheduling
//!
//! A [`FiberRoot`] owns both fiber trees of one container together with the
//! lane bookkeeping that decides when and at which priority the tree is
//! rendered again. Sync work is flushed from the host's microtask queue,
//! everything else runs as a cancellable scheduler task.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use arbor_core::{Action, HostConfig, Value};
use arbor_scheduler::{CallbackStatus, CallbackToken, PriorityLevel, Scheduler};

use crate::config::RootConfig;
use crate::error::ReconcilerError;
use crate::fiber::{Fiber, FiberArena, FiberId};
use crate::hooks::EffectRef;
use crate::lanes::{request_update_lane, Lane, Lanes};
use crate::update_queue::{new_shared_queue, SharedQueue, Update};

/// Where dispatch functions send their updates
pub(crate) trait UpdateSink {
    /// Lane for an update issued right now
    fn request_update_lane(&self) -> Lane;

    /// Record `lane` as pending and make sure work is scheduled for it
    fn schedule_update_on_root(&self, lane: Lane);
}

/// Progress of the render pass in flight
#[derive(Debug, Default)]
pub(crate) struct RenderSession {
    /// Work-in-progress HostRoot of this pass
    pub(crate) root: Option<FiberId>,
    /// Next unit of work
    pub(crate) work_in_progress: Option<FiberId>,
    /// Failed attempts at the current lane
    pub(crate) failures: u32,
}

impl RenderSession {
    pub(crate) fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Both fiber trees and the pass over them
pub(crate) struct FiberTree<H: HostConfig> {
    pub(crate) arena: FiberArena<H>,
    /// Committed HostRoot fiber
    pub(crate) current: FiberId,
    /// Completed HostRoot waiting for commit
    pub(crate) finished_work: Option<FiberId>,
    pub(crate) session: RenderSession,
}

/// Effect lists waiting for the passive flush
#[derive(Default)]
pub(crate) struct PendingPassiveEffects {
    /// Effect lists of deleted components
    pub(crate) unmount: Vec<Vec<EffectRef>>,
    /// Effect lists of components that mounted or updated effects
    pub(crate) update: Vec<Vec<EffectRef>>,
}

impl PendingPassiveEffects {
    pub(crate) fn is_empty(&self) -> bool {
        self.unmount.is_empty() && self.update.is_empty()
    }
}

type SyncCallback = Box<dyn FnOnce()>;

/// Root state of one mounted tree
pub(crate) struct FiberRoot<H: HostConfig> {
    pub(crate) container: H::Container,
    pub(crate) host: Rc<H>,
    pub(crate) scheduler: Rc<dyn Scheduler>,
    pub(crate) config: RootConfig,

    pub(crate) tree: RefCell<FiberTree<H>>,
    /// Update queue of the HostRoot fiber
    pub(crate) root_queue: SharedQueue,

    pub(crate) pending_lanes: Cell<Lanes>,
    /// Lane of `finished_work`
    pub(crate) finished_lane: Cell<Lane>,
    /// Lane of the render pass in flight
    pub(crate) wip_render_lane: Cell<Lane>,
    /// Lanes scheduled while a render pass was in flight
    pub(crate) interleaved_lanes: Cell<Lanes>,

    /// Scheduler task currently responsible for this root
    pub(crate) callback_node: Cell<Option<CallbackToken>>,
    /// Lane that task (or the sync queue entry) renders
    pub(crate) callback_priority: Cell<Lane>,

    pub(crate) sync_queue: RefCell<Vec<SyncCallback>>,
    pub(crate) is_flushing_sync_queue: Cell<bool>,

    pub(crate) pending_passive_effects: RefCell<PendingPassiveEffects>,
    pub(crate) root_has_passive_effects: Cell<bool>,

    pub(crate) errors: RefCell<Vec<ReconcilerError>>,
    pub(crate) self_ref: Weak<FiberRoot<H>>,
    pub(crate) sink: Weak<dyn UpdateSink>,
}

impl<H: HostConfig> FiberRoot<H> {
    fn new(container: H::Container, host: Rc<H>, scheduler: Rc<dyn Scheduler>, config: RootConfig) -> Rc<Self> {
        Rc::new_cyclic(|weak: &Weak<FiberRoot<H>>| {
            let root_queue = new_shared_queue();
            let mut arena = FiberArena::new();
            let current = arena.insert(Fiber::host_root(root_queue.clone()));
            arena.checkpoint();

            let sink: Weak<dyn UpdateSink> = weak.clone();
            Self {
                container,
                host,
                scheduler,
                config,
                tree: RefCell::new(FiberTree {
                    arena,
                    current,
                    finished_work: None,
                    session: RenderSession::default(),
                }),
                root_queue,
                pending_lanes: Cell::new(Lanes::NO_LANES),
                finished_lane: Cell::new(Lanes::NO_LANE),
                wip_render_lane: Cell::new(Lanes::NO_LANE),
                interleaved_lanes: Cell::new(Lanes::NO_LANES),
                callback_node: Cell::new(None),
                callback_priority: Cell::new(Lanes::NO_LANE),
                sync_queue: RefCell::new(Vec::new()),
                is_flushing_sync_queue: Cell::new(false),
                pending_passive_effects: RefCell::new(PendingPassiveEffects::default()),
                root_has_passive_effects: Cell::new(false),
                errors: RefCell::new(Vec::new()),
                self_ref: weak.clone(),
                sink,
            }
        })
    }

    /// Enqueue a new element tree for the container
    pub(crate) fn update_container(&self, element: Value) {
        self.root_queue
            .borrow_mut()
            .enqueue(Update::new(Action::Replace(element), Lanes::SYNC));
        self.schedule_update_on_root(Lanes::SYNC);
    }

    /// Make sure exactly one unit of scheduled work exists for the most
    /// urgent pending lane
    pub(crate) fn ensure_root_is_scheduled(&self) {
        let update_lane = self.pending_lanes.get().highest_priority();
        let existing = self.callback_node.get();

        if update_lane.is_empty() {
            if let Some(token) = existing {
                self.scheduler.cancel_callback(token);
            }
            self.clear_callback();
            return;
        }

        if update_lane == self.callback_priority.get() {
            return;
        }

        if let Some(token) = existing {
            self.scheduler.cancel_callback(token);
        }
        self.callback_node.set(None);
        // Set before handing work off: a host may run the microtask inline
        self.callback_priority.set(update_lane);

        if update_lane == Lanes::SYNC {
            log::debug!("Scheduling sync render in a microtask");
            let weak = self.self_ref.clone();
            self.sync_queue.borrow_mut().push(Box::new(move || {
                if let Some(root) = weak.upgrade() {
                    root.perform_sync_work_on_root();
                }
            }));
            let weak = self.self_ref.clone();
            self.host.schedule_micro_task(Box::new(move || {
                if let Some(root) = weak.upgrade() {
                    root.flush_sync_callbacks();
                }
            }));
        } else {
            let priority = update_lane.to_scheduler_priority();
            log::debug!("Scheduling concurrent render of {:?} at {:?}", update_lane, priority);

            let weak = self.self_ref.clone();
            let own_token: Rc<Cell<Option<CallbackToken>>> = Rc::new(Cell::new(None));
            let task_token = own_token.clone();
            let token = self.scheduler.schedule_callback(
                priority,
                Box::new(move |did_timeout| match weak.upgrade() {
                    Some(root) => root.perform_concurrent_work_on_root(task_token.get(), did_timeout),
                    None => CallbackStatus::Complete,
                }),
            );
            own_token.set(Some(token));
            self.callback_node.set(Some(token));
        }
    }

    /// Forget the scheduled task without cancelling it
    pub(crate) fn clear_callback(&self) {
        self.callback_node.set(None);
        self.callback_priority.set(Lanes::NO_LANE);
    }

    /// Run every queued sync callback, including ones queued while flushing
    pub(crate) fn flush_sync_callbacks(&self) {
        if self.is_flushing_sync_queue.replace(true) {
            return;
        }
        loop {
            let batch = std::mem::take(&mut *self.sync_queue.borrow_mut());
            if batch.is_empty() {
                break;
            }
            for callback in batch {
                callback();
            }
        }
        self.is_flushing_sync_queue.set(false);
    }

    /// Schedule the passive flush as a normal-priority task
    pub(crate) fn schedule_passive_flush(&self) {
        let weak = self.self_ref.clone();
        self.scheduler.schedule_callback(
            PriorityLevel::Normal,
            Box::new(move |_| {
                if let Some(root) = weak.upgrade() {
                    root.flush_passive_effects();
                }
                CallbackStatus::Complete
            }),
        );
    }

    pub(crate) fn record_error(&self, error: ReconcilerError) {
        self.errors.borrow_mut().push(error);
    }
}

impl<H: HostConfig> UpdateSink for FiberRoot<H> {
    fn request_update_lane(&self) -> Lane {
        request_update_lane(self.scheduler.as_ref())
    }

    fn schedule_update_on_root(&self, lane: Lane) {
        self.pending_lanes.set(self.pending_lanes.get() | lane);
        if !self.wip_render_lane.get().is_empty() {
            self.interleaved_lanes.set(self.interleaved_lanes.get() | lane);
        }
        self.ensure_root_is_scheduled();
    }
}

/// Handle to a mounted tree
///
/// Dropping the handle stops all further work: scheduled tasks, queued
/// microtasks and dispatch functions only hold weak references to the root.
pub struct Root<H: HostConfig> {
    inner: Rc<FiberRoot<H>>,
}

impl<H: HostConfig> Root<H> {
    /// Render `element` into the container at sync priority
    pub fn render(&self, element: impl Into<Value>) {
        self.inner.update_container(element.into());
    }

    /// Remove everything rendered into the container
    pub fn unmount(&self) {
        self.inner.update_container(Value::Null);
    }

    /// Run queued sync work now instead of waiting for the microtask
    pub fn flush_sync_work(&self) {
        self.inner.flush_sync_callbacks();
    }

    /// Run pending passive effects now. Returns whether any ran.
    pub fn flush_passive_effects(&self) -> bool {
        self.inner.flush_passive_effects()
    }

    /// Errors of abandoned render passes, oldest first
    pub fn take_errors(&self) -> Vec<ReconcilerError> {
        std::mem::take(&mut *self.inner.errors.borrow_mut())
    }

    /// Lanes with outstanding work
    pub fn pending_lanes(&self) -> Lanes {
        self.inner.pending_lanes.get()
    }

    /// Whether passive effects are waiting for their flush
    pub fn has_pending_passive_effects(&self) -> bool {
        self.inner.root_has_passive_effects.get()
    }

    /// Number of live fibers across both trees
    pub fn fiber_count(&self) -> usize {
        match self.inner.tree.try_borrow() {
            Ok(tree) => tree.arena.len(),
            Err(_) => 0,
        }
    }

    /// Mount point
    pub fn container(&self) -> &H::Container {
        &self.inner.container
    }

    /// Host adapter
    pub fn host(&self) -> &Rc<H> {
        &self.inner.host
    }

    /// Settings
    pub fn config(&self) -> &RootConfig {
        &self.inner.config
    }
}

/// Create a root rendering into `container` with the default configuration
pub fn create_root<H: HostConfig>(container: H::Container, host: Rc<H>, scheduler: Rc<dyn Scheduler>) -> Root<H> {
    create_root_with_config(container, host, scheduler, RootConfig::default())
}

/// Create a root with explicit settings
pub fn create_root_with_config<H: HostConfig>(
    container: H::Container,
    host: Rc<H>,
    scheduler: Rc<dyn Scheduler>,
    config: RootConfig,
) -> Root<H> {
    log::debug!("Creating root for {:?}", container);
    Root {
        inner: FiberRoot::new(container, host, scheduler, config),
    }
}
