//! Render errors

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use thiserror::Error;

use crate::fiber::{FiberId, WorkTag};

/// Errors that abort a render pass
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ReconcilerError {
    /// A component called a different number of hooks than on its previous render
    #[error("Component `{component}` rendered {found} hooks, previous render had {expected}")]
    HookCountMismatch {
        component: String,
        expected: usize,
        found: usize,
    },

    /// A hook at some position changed kind between renders
    #[error("Component `{component}` called `{found}` at hook #{index} where `{expected}` was called before")]
    HookKindMismatch {
        component: String,
        index: usize,
        expected: &'static str,
        found: &'static str,
    },

    /// A component body panicked
    #[error("Component `{component}` panicked during render: {message}")]
    RenderPanic { component: String, message: String },

    /// A fiber is missing data its tag requires
    #[error("Fiber {fiber:?} ({tag:?}) is malformed: {reason}")]
    InvalidFiber {
        fiber: FiberId,
        tag: WorkTag,
        reason: &'static str,
    },
}

/// Result type for render operations
pub type ReconcilerResult<T> = Result<T, ReconcilerError>;

/// Message carried by a panic payload
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}

/// Run a component body, turning a panic into [`ReconcilerError::RenderPanic`]
pub(crate) fn catch_render_panic<R>(component: &str, f: impl FnOnce() -> R) -> ReconcilerResult<R> {
    panic::catch_unwind(AssertUnwindSafe(f)).map_err(|payload| {
        let message = panic_message(payload.as_ref());
        log::warn!("Panic in component '{}': {}", component, message);
        ReconcilerError::RenderPanic {
            component: component.to_string(),
            message,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catch_render_panic() {
        let result: ReconcilerResult<()> = catch_render_panic("Broken", || panic!("boom"));
        assert_eq!(
            result,
            Err(ReconcilerError::RenderPanic {
                component: "Broken".to_string(),
                message: "boom".to_string(),
            })
        );

        assert_eq!(catch_render_panic("Fine", || 7), Ok(7));
    }

    #[test]
    fn test_formatted_panic_message() {
        let result: ReconcilerResult<()> = catch_render_panic("Broken", || panic!("bad index {}", 3));
        match result {
            Err(ReconcilerError::RenderPanic { message, .. }) => assert_eq!(message, "bad index 3"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_error_display() {
        let err = ReconcilerError::HookCountMismatch {
            component: "List".to_string(),
            expected: 2,
            found: 1,
        };
        assert_eq!(err.to_string(), "Component `List` rendered 1 hooks, previous render had 2");
    }
}
