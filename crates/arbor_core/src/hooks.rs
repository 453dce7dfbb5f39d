//! Hook dispatcher contract
//!
//! Function components receive a `&mut dyn Hooks` while they render. Hook
//! identity is the call position: a component must call the same hooks in the
//! same order on every render.

use std::fmt;
use std::rc::Rc;

use crate::value::Value;

/// Cleanup returned by an effect
pub type Destroy = Rc<dyn Fn()>;

/// Effect body, run after commit
pub type EffectCreate = Rc<dyn Fn() -> Option<Destroy>>;

/// State transition carried by an update
#[derive(Clone)]
pub enum Action {
    /// Replace the state
    Replace(Value),
    /// Compute the next state from the previous one
    Reduce(Rc<dyn Fn(&Value) -> Value>),
}

impl Action {
    /// Apply to a state
    pub fn apply(&self, state: &Value) -> Value {
        match self {
            Self::Replace(value) => value.clone(),
            Self::Reduce(f) => f(state),
        }
    }
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Replace(value) => f.debug_tuple("Replace").field(value).finish(),
            Self::Reduce(_) => write!(f, "Reduce(..)"),
        }
    }
}

/// State setter returned by `use_state`
#[derive(Clone)]
pub struct Dispatch(Rc<dyn Fn(Action)>);

impl Dispatch {
    /// Wrap a dispatch function
    pub fn new(f: impl Fn(Action) + 'static) -> Self {
        Self(Rc::new(f))
    }

    /// Dispatch that drops every action
    pub fn noop() -> Self {
        Self::new(|_| {})
    }

    /// Enqueue an action
    pub fn dispatch(&self, action: Action) {
        (self.0)(action)
    }

    /// Replace the state
    pub fn set(&self, value: impl Into<Value>) {
        self.dispatch(Action::Replace(value.into()))
    }

    /// Update the state from its previous value
    pub fn update(&self, f: impl Fn(&Value) -> Value + 'static) {
        self.dispatch(Action::Reduce(Rc::new(f)))
    }
}

impl fmt::Debug for Dispatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Dispatch({:p})", Rc::as_ptr(&self.0) as *const ())
    }
}

/// Hooks available to a rendering component
pub trait Hooks {
    /// State hook with a lazily computed initial value
    fn use_state_with(&mut self, init: Box<dyn FnOnce() -> Value + '_>) -> (Value, Dispatch);

    /// Passive effect hook.
    ///
    /// `deps = None` re-runs after every render, `Some(vec![])` runs once.
    fn use_effect(&mut self, create: EffectCreate, deps: Option<Vec<Value>>);

    /// State hook
    fn use_state(&mut self, initial: Value) -> (Value, Dispatch) {
        self.use_state_with(Box::new(move || initial))
    }
}

impl<'a> dyn Hooks + 'a {
    /// State hook taking anything convertible to a value
    pub fn state(&mut self, initial: impl Into<Value>) -> (Value, Dispatch) {
        self.use_state(initial.into())
    }

    /// Effect without cleanup
    pub fn effect(&mut self, deps: Option<Vec<Value>>, f: impl Fn() + 'static) {
        self.use_effect(
            Rc::new(move || {
                f();
                None
            }),
            deps,
        )
    }

    /// Effect returning a cleanup
    pub fn effect_with_cleanup<C>(&mut self, deps: Option<Vec<Value>>, f: impl Fn() -> C + 'static)
    where
        C: Fn() + 'static,
    {
        self.use_effect(
            Rc::new(move || {
                let cleanup: Destroy = Rc::new(f());
                Some(cleanup)
            }),
            deps,
        )
    }
}
