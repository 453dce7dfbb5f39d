//! Element descriptors
//!
//! An [`Element`] is an immutable description of what should exist at one
//! position of the tree: a type, an optional key, props and an optional ref.
//! The engine never mutates a descriptor; it builds fibers from them.
//!
//! Construction helpers follow the usual factory shape: zero children leave
//! `children` unset, a single child is stored as-is and several children are
//! stored as an array.

use serde::Serialize;
use std::any::Any;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use crate::hooks::Hooks;
use crate::value::Value;

/// Prop name holding an element's children
pub const CHILDREN: &str = "children";

/// Signature of a function component
pub type RenderFn = dyn Fn(&Props, &mut dyn Hooks) -> Value;

/// Handle to a function component.
///
/// Two handles are the same component type only when they share the same
/// render function allocation.
#[derive(Clone)]
pub struct Component {
    name: Rc<str>,
    render: Rc<RenderFn>,
}

impl Component {
    /// Create a named component from a render function
    pub fn new(
        name: impl Into<String>,
        render: impl Fn(&Props, &mut dyn Hooks) -> Value + 'static,
    ) -> Self {
        Self {
            name: Rc::from(name.into()),
            render: Rc::new(render),
        }
    }

    /// Display name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Invoke the render function
    pub fn render(&self, props: &Props, hooks: &mut dyn Hooks) -> Value {
        (self.render)(props, hooks)
    }

    fn addr(&self) -> *const () {
        Rc::as_ptr(&self.render) as *const ()
    }
}

impl PartialEq for Component {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.addr(), other.addr())
    }
}

impl fmt::Debug for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Component({})", self.name)
    }
}

/// What kind of node a descriptor produces
#[derive(Debug, Clone, PartialEq)]
pub enum ElementType {
    /// Host element identified by tag name
    Host(String),
    /// Function component
    Component(Component),
    /// Transparent grouping of children
    Fragment,
}

impl ElementType {
    /// Name used in diagnostics and snapshots
    pub fn name(&self) -> &str {
        match self {
            Self::Host(tag) => tag,
            Self::Component(c) => c.name(),
            Self::Fragment => "#fragment",
        }
    }
}

/// Prop map of an element
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Props(BTreeMap<String, Value>);

impl Props {
    /// Create empty props
    pub fn new() -> Self {
        Self::default()
    }

    /// Props holding only children
    pub fn from_children(children: Value) -> Self {
        let mut props = Self::new();
        props.insert(CHILDREN, children);
        props
    }

    /// Get a prop
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    /// Set a prop, returning the previous value
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(name.into(), value.into())
    }

    /// Remove a prop
    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.0.remove(name)
    }

    /// Children prop
    pub fn children(&self) -> Option<&Value> {
        self.0.get(CHILDREN)
    }

    /// Iterate props in name order
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Iterate every prop except `children`
    pub fn attributes(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter().filter(|(name, _)| name.as_str() != CHILDREN)
    }

    /// Compare all props except `children`
    pub fn same_attributes(&self, other: &Props) -> bool {
        self.attributes().eq(other.attributes())
    }

    /// Number of props
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Props {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// Shared slot receiving a host instance once the owning element is mounted
#[derive(Clone, Default)]
pub struct RefHandle(Rc<RefCell<Option<Rc<dyn Any>>>>);

impl RefHandle {
    /// Create an empty ref
    pub fn new() -> Self {
        Self::default()
    }

    /// Store an instance in the slot
    pub fn attach(&self, instance: Rc<dyn Any>) {
        *self.0.borrow_mut() = Some(instance);
    }

    /// Clear the slot
    pub fn detach(&self) {
        self.0.borrow_mut().take();
    }

    /// Check if an instance is attached
    pub fn is_attached(&self) -> bool {
        self.0.borrow().is_some()
    }

    /// Get the attached instance as a concrete type
    pub fn get<T: Clone + 'static>(&self) -> Option<T> {
        self.0.borrow().as_ref()?.downcast_ref::<T>().cloned()
    }

    /// Check whether two handles share the same slot
    pub fn ptr_eq(&self, other: &RefHandle) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for RefHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefHandle")
            .field("attached", &self.is_attached())
            .finish()
    }
}

/// Immutable node descriptor
#[derive(Debug, Clone)]
pub struct Element {
    /// Node type
    pub element_type: ElementType,
    /// Identity among siblings
    pub key: Option<String>,
    /// Props including `children`
    pub props: Props,
    /// Ref receiving the host instance
    pub ref_handle: Option<RefHandle>,
}

impl Element {
    /// Create an element with the given type and props
    pub fn new(element_type: ElementType, props: Props) -> Self {
        Self {
            element_type,
            key: None,
            props,
            ref_handle: None,
        }
    }

    /// Type name used in diagnostics
    pub fn type_name(&self) -> &str {
        self.element_type.name()
    }

    /// Children prop
    pub fn children(&self) -> Option<&Value> {
        self.props.children()
    }

    /// Check if this is a fragment without a key
    pub fn is_unkeyed_fragment(&self) -> bool {
        self.element_type == ElementType::Fragment && self.key.is_none()
    }
}

/// Build an element from a type, props and a child list
pub fn create_element(element_type: ElementType, mut props: Props, children: Vec<Value>) -> Element {
    let mut children = children;
    match children.len() {
        0 => {}
        1 => {
            props.insert(CHILDREN, children.remove(0));
        }
        _ => {
            props.insert(CHILDREN, Value::Array(children));
        }
    }
    Element::new(element_type, props)
}

/// Incremental element builder
#[derive(Debug, Clone)]
pub struct ElementBuilder {
    element_type: ElementType,
    key: Option<String>,
    props: Props,
    ref_handle: Option<RefHandle>,
    children: Vec<Value>,
}

impl ElementBuilder {
    /// Start building an element of the given type
    pub fn new(element_type: ElementType) -> Self {
        Self {
            element_type,
            key: None,
            props: Props::new(),
            ref_handle: None,
            children: Vec::new(),
        }
    }

    /// Set the key
    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Set a prop
    pub fn prop(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.props.insert(name, value);
        self
    }

    /// Append a child
    pub fn child(mut self, child: impl Into<Value>) -> Self {
        self.children.push(child.into());
        self
    }

    /// Append several children
    pub fn children<I, V>(mut self, children: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.children.extend(children.into_iter().map(Into::into));
        self
    }

    /// Attach a ref
    pub fn ref_handle(mut self, handle: &RefHandle) -> Self {
        self.ref_handle = Some(handle.clone());
        self
    }

    /// Finish the element
    pub fn build(self) -> Element {
        let mut element = create_element(self.element_type, self.props, self.children);
        element.key = self.key;
        element.ref_handle = self.ref_handle;
        element
    }
}

impl From<ElementBuilder> for Value {
    fn from(builder: ElementBuilder) -> Self {
        Value::from(builder.build())
    }
}

/// Start a host element
pub fn host(tag: impl Into<String>) -> ElementBuilder {
    ElementBuilder::new(ElementType::Host(tag.into()))
}

/// Start a component element
pub fn component(component: &Component) -> ElementBuilder {
    ElementBuilder::new(ElementType::Component(component.clone()))
}

/// Build an unkeyed fragment around the given children
pub fn fragment<I, V>(children: I) -> Element
where
    I: IntoIterator<Item = V>,
    V: Into<Value>,
{
    let children: Vec<Value> = children.into_iter().map(Into::into).collect();
    Element::new(ElementType::Fragment, Props::from_children(Value::Array(children)))
}
