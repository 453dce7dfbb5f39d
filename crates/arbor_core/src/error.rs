//! Error types for host adapters

use thiserror::Error;

/// Host adapter rejected a mutation
#[derive(Debug, Clone, PartialEq, Error)]
pub enum HostError {
    /// The child is not attached to the given parent
    #[error("Child not found: {0}")]
    ChildNotFound(String),
    /// The insertion reference node is not attached to the given parent
    #[error("Reference node not found: {0}")]
    ReferenceNotFound(String),
    /// The node is already attached to a different parent
    #[error("Node already mounted: {0}")]
    AlreadyMounted(String),
    /// The operation does not apply to this node kind
    #[error("Unsupported host operation: {0}")]
    Unsupported(String),
}

/// Result type for host mutations
pub type HostResult<T> = Result<T, HostError>;
