//! Shared fixture for reconciler integration tests

#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;

use arbor_core::{Dispatch, Value};
use arbor_noop::{run_until_idle, HostOp, NoopHost};
use arbor_reconciler::{create_root_with_config, Root, RootConfig};
use arbor_scheduler::{LocalScheduler, PriorityLevel, YieldPolicy};

/// A root mounted on an in-memory host
pub struct Harness {
    pub host: Rc<NoopHost>,
    pub scheduler: Rc<LocalScheduler>,
    pub root: Root<NoopHost>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(YieldPolicy::Never, RootConfig::default())
    }

    pub fn with_policy(policy: YieldPolicy) -> Self {
        Self::with_config(policy, RootConfig::default())
    }

    pub fn with_config(policy: YieldPolicy, config: RootConfig) -> Self {
        Self::with_host(NoopHost::new(), policy, config)
    }

    /// Host that runs microtasks as soon as they are scheduled
    pub fn with_inline_microtasks(policy: YieldPolicy) -> Self {
        Self::with_host(NoopHost::with_inline_microtasks(), policy, RootConfig::default())
    }

    fn with_host(host: NoopHost, policy: YieldPolicy, config: RootConfig) -> Self {
        let host = Rc::new(host);
        let scheduler = Rc::new(LocalScheduler::new(policy));
        let root = create_root_with_config(host.create_container(), host.clone(), scheduler.clone(), config);
        Self { host, scheduler, root }
    }

    /// Render and run everything that follows
    pub fn render(&self, element: impl Into<Value>) {
        self.root.render(element);
        self.run();
    }

    /// Run microtasks and scheduler tasks until idle
    pub fn run(&self) -> usize {
        run_until_idle(&self.host, &self.scheduler)
    }

    /// Run `f` as if inside a discrete input event
    pub fn sync<R>(&self, f: impl FnOnce() -> R) -> R {
        self.scheduler.run_with_priority(PriorityLevel::Immediate, f)
    }

    pub fn json(&self) -> serde_json::Value {
        self.root.container().to_json()
    }

    pub fn text(&self) -> String {
        self.root.container().text_content()
    }

    /// Drain mutations of the attached tree
    pub fn mutations(&self) -> Vec<HostOp> {
        self.host.take_mutations()
    }
}

/// Slot a component stores its state setter in
#[derive(Clone, Default)]
pub struct Setter(Rc<RefCell<Option<Dispatch>>>);

impl Setter {
    pub fn store(&self, dispatch: &Dispatch) {
        *self.0.borrow_mut() = Some(dispatch.clone());
    }

    pub fn get(&self) -> Dispatch {
        self.0.borrow().clone().expect("component has not rendered")
    }
}

/// Shared event log
#[derive(Clone, Default)]
pub struct Log(Rc<RefCell<Vec<String>>>);

impl Log {
    pub fn push(&self, entry: impl Into<String>) {
        self.0.borrow_mut().push(entry.into());
    }

    pub fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.0.borrow_mut())
    }

    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }
}
