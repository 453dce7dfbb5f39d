//! Hook engine
//!
//! A component's hooks are a `Vec<Hook>` indexed by call position. On mount
//! each call appends a new hook; on update each call consumes the hook at the
//! same position of the committed chain and writes its successor into the new
//! chain. Calling more or fewer hooks, or a different kind of hook at some
//! position, aborts the render.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use arbor_core::{Component, Destroy, Dispatch, EffectCreate, Hooks, Props, Value};

use crate::error::{catch_render_panic, ReconcilerError, ReconcilerResult};
use crate::flags::{Flags, HookFlags};
use crate::lanes::Lanes;
use crate::root::UpdateSink;
use crate::update_queue::{new_shared_queue, SharedQueue, StateSlot, Update};

/// Passive effect record
pub(crate) struct Effect {
    pub(crate) tag: HookFlags,
    pub(crate) create: EffectCreate,
    pub(crate) destroy: Option<Destroy>,
    pub(crate) deps: Option<Vec<Value>>,
}

impl fmt::Debug for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Effect")
            .field("tag", &self.tag)
            .field("has_destroy", &self.destroy.is_some())
            .field("deps", &self.deps)
            .finish()
    }
}

pub(crate) type EffectRef = Rc<RefCell<Effect>>;

/// One entry of a component's hook chain
#[derive(Clone)]
pub(crate) enum Hook {
    State {
        slot: StateSlot,
        queue: SharedQueue,
        dispatch: Dispatch,
    },
    Effect(EffectRef),
}

impl Hook {
    fn kind(&self) -> &'static str {
        match self {
            Self::State { .. } => "use_state",
            Self::Effect(_) => "use_effect",
        }
    }
}

/// Output of rendering one function component
pub(crate) struct RenderedComponent {
    pub(crate) children: Value,
    pub(crate) hooks: Vec<Hook>,
    pub(crate) effects: Vec<EffectRef>,
    pub(crate) flags: Flags,
}

/// Dependency lists are equal when both exist, have the same length and
/// every element compares equal
///
/// Uses `Value` equality: arrays and objects compare by content, so a
/// rebuilt but equal collection does not re-run the effect. Elements and
/// callbacks compare by identity.
pub(crate) fn are_hook_inputs_equal(next: &Option<Vec<Value>>, prev: &Option<Vec<Value>>) -> bool {
    match (next, prev) {
        (Some(next), Some(prev)) => next.len() == prev.len() && next.iter().zip(prev).all(|(a, b)| a == b),
        _ => false,
    }
}

/// Hook dispatcher for one component render
struct HookRenderer<'a> {
    component: &'a str,
    current: Option<&'a mut Vec<Hook>>,
    hooks: Vec<Hook>,
    effects: Vec<EffectRef>,
    render_lanes: Lanes,
    flags: Flags,
    sink: &'a Weak<dyn UpdateSink>,
    violation: Option<ReconcilerError>,
}

impl<'a> HookRenderer<'a> {
    fn cursor(&self) -> usize {
        self.hooks.len()
    }

    fn kind_mismatch(&self, expected: &'static str, found: &'static str) -> ReconcilerError {
        ReconcilerError::HookKindMismatch {
            component: self.component.to_string(),
            index: self.cursor(),
            expected,
            found,
        }
    }

    fn too_many_hooks(&self, expected: usize) -> ReconcilerError {
        ReconcilerError::HookCountMismatch {
            component: self.component.to_string(),
            expected,
            found: self.cursor() + 1,
        }
    }

    fn create_dispatch(&self, queue: &SharedQueue) -> Dispatch {
        let queue = queue.clone();
        let sink = self.sink.clone();
        let component = self.component.to_string();
        Dispatch::new(move |action| {
            if queue.borrow().is_detached() {
                log::debug!("Ignoring state update on unmounted component '{}'", component);
                return;
            }
            let Some(sink) = sink.upgrade() else {
                log::debug!("Ignoring state update on '{}': root was dropped", component);
                return;
            };
            let lane = sink.request_update_lane();
            queue.borrow_mut().enqueue(Update::new(action, lane));
            sink.schedule_update_on_root(lane);
        })
    }

    fn push_effect(&mut self, tag: HookFlags, create: EffectCreate, destroy: Option<Destroy>, deps: Option<Vec<Value>>) {
        let effect = Rc::new(RefCell::new(Effect {
            tag,
            create,
            destroy,
            deps,
        }));
        self.effects.push(effect.clone());
        self.hooks.push(Hook::Effect(effect));
    }
}

impl Hooks for HookRenderer<'_> {
    fn use_state_with(&mut self, init: Box<dyn FnOnce() -> Value + '_>) -> (Value, Dispatch) {
        if self.violation.is_some() {
            return (Value::Null, Dispatch::noop());
        }
        let index = self.cursor();

        let Some(current) = self.current.as_deref_mut() else {
            let initial = init();
            let queue = new_shared_queue();
            let dispatch = self.create_dispatch(&queue);
            self.hooks.push(Hook::State {
                slot: StateSlot::new(initial.clone()),
                queue,
                dispatch: dispatch.clone(),
            });
            return (initial, dispatch);
        };

        let expected = current.len();
        match current.get_mut(index) {
            Some(Hook::State { slot, queue, dispatch }) => {
                let next = slot.rebase(queue, self.render_lanes);
                let state = next.memoized_state.clone();
                let hook = Hook::State {
                    slot: next,
                    queue: queue.clone(),
                    dispatch: dispatch.clone(),
                };
                let dispatch = dispatch.clone();
                self.hooks.push(hook);
                (state, dispatch)
            }
            Some(other) => {
                let previous = other.kind();
                self.violation = Some(self.kind_mismatch(previous, "use_state"));
                (Value::Null, Dispatch::noop())
            }
            None => {
                self.violation = Some(self.too_many_hooks(expected));
                (Value::Null, Dispatch::noop())
            }
        }
    }

    fn use_effect(&mut self, create: EffectCreate, deps: Option<Vec<Value>>) {
        if self.violation.is_some() {
            return;
        }
        let index = self.cursor();

        let Some(current) = self.current.as_deref() else {
            self.flags.insert(Flags::PASSIVE_EFFECT);
            self.push_effect(HookFlags::PASSIVE | HookFlags::HAS_EFFECT, create, None, deps);
            return;
        };

        let expected = current.len();
        let previous = match current.get(index) {
            Some(Hook::Effect(effect)) => effect.clone(),
            Some(other) => {
                let previous = other.kind();
                self.violation = Some(self.kind_mismatch(previous, "use_effect"));
                return;
            }
            None => {
                self.violation = Some(self.too_many_hooks(expected));
                return;
            }
        };

        let (destroy, unchanged) = {
            let previous = previous.borrow();
            (previous.destroy.clone(), are_hook_inputs_equal(&deps, &previous.deps))
        };
        if unchanged {
            self.push_effect(HookFlags::PASSIVE, create, destroy, deps);
        } else {
            self.flags.insert(Flags::PASSIVE_EFFECT);
            self.push_effect(HookFlags::PASSIVE | HookFlags::HAS_EFFECT, create, destroy, deps);
        }
    }
}

/// Render a function component against its committed hook chain.
///
/// `current` is the committed chain when the component is being updated and
/// `None` on mount. Pending state updates are moved onto the committed chain
/// as they are consumed, so a failed or discarded render loses nothing.
pub(crate) fn render_with_hooks(
    component: &Component,
    props: &Props,
    current: Option<&mut Vec<Hook>>,
    render_lanes: Lanes,
    sink: &Weak<dyn UpdateSink>,
) -> ReconcilerResult<RenderedComponent> {
    let expected = current.as_ref().map(|hooks| hooks.len());
    let mut renderer = HookRenderer {
        component: component.name(),
        current,
        hooks: Vec::new(),
        effects: Vec::new(),
        render_lanes,
        flags: Flags::NO_FLAGS,
        sink,
        violation: None,
    };

    let children = catch_render_panic(component.name(), || component.render(props, &mut renderer))?;

    if let Some(violation) = renderer.violation.take() {
        return Err(violation);
    }
    if let Some(expected) = expected {
        if renderer.cursor() != expected {
            return Err(ReconcilerError::HookCountMismatch {
                component: component.name().to_string(),
                expected,
                found: renderer.cursor(),
            });
        }
    }

    Ok(RenderedComponent {
        children,
        hooks: renderer.hooks,
        effects: renderer.effects,
        flags: renderer.flags,
    })
}
