//! # arbor_core - Descriptor and Adapter Contracts
//!
//! Shared vocabulary between the reconciler, host adapters and components:
//! - **Values**: dynamic props, state and children ([`Value`])
//! - **Elements**: immutable node descriptors and their builders
//! - **Hooks**: the dispatcher contract components render against
//! - **Host**: the adapter trait a rendering target implements

pub mod element;
pub mod error;
pub mod hooks;
pub mod host;
pub mod value;

pub use element::*;
pub use error::*;
pub use hooks::*;
pub use host::*;
pub use value::*;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::element::{
        component, create_element, fragment, host, Component, Element, ElementBuilder, ElementType, Props,
        RefHandle,
    };
    pub use crate::hooks::{Action, Dispatch, Hooks};
    pub use crate::host::{HostConfig, HostNode, HostParent, UpdatePayload};
    pub use crate::value::{Callback, Value};
}
