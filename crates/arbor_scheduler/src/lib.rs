//! # arbor_scheduler - Cooperative Task Scheduler
//!
//! The contract the reconciler consumes for time-sliced work:
//! - Priority levels for queued callbacks
//! - Cancellable callback tokens
//! - A yield predicate checked between units of work
//!
//! [`LocalScheduler`] is a single-threaded implementation with a pluggable
//! yield policy, suitable for tests and embedding.

pub mod local;

pub use local::{LocalScheduler, YieldPolicy};

use std::fmt;
use std::time::Duration;

/// Scheduler priority levels, most urgent first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PriorityLevel {
    /// Must run now
    Immediate = 1,
    /// Direct user interaction
    UserBlocking = 2,
    /// Regular work
    Normal = 3,
    /// Can be deferred
    Low = 4,
    /// Only when nothing else is queued
    Idle = 5,
}

impl PriorityLevel {
    /// How long a task at this level may wait before it is considered overdue
    pub fn timeout(self) -> Option<Duration> {
        match self {
            Self::Immediate => Some(Duration::ZERO),
            Self::UserBlocking => Some(Duration::from_millis(250)),
            Self::Normal => Some(Duration::from_millis(5_000)),
            Self::Low => Some(Duration::from_millis(10_000)),
            Self::Idle => None,
        }
    }
}

impl Default for PriorityLevel {
    fn default() -> Self {
        Self::Normal
    }
}

/// Handle to a scheduled callback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CallbackToken(u64);

impl CallbackToken {
    /// Create a token from a raw id
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Raw id
    pub const fn id(self) -> u64 {
        self.0
    }
}

impl fmt::Display for CallbackToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What a callback wants after running one slice
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackStatus {
    /// Work finished, drop the task
    Complete,
    /// Work remains, run again under the same token
    Continue,
}

/// Scheduled work; the argument tells whether the task is overdue
pub type SchedulerCallback = Box<dyn FnMut(bool) -> CallbackStatus>;

/// Cooperative scheduler contract
pub trait Scheduler {
    /// Queue a callback at a priority
    fn schedule_callback(&self, priority: PriorityLevel, callback: SchedulerCallback) -> CallbackToken;

    /// Cancel a queued callback; unknown tokens are ignored
    fn cancel_callback(&self, token: CallbackToken);

    /// Whether the running task should hand control back
    fn should_yield(&self) -> bool;

    /// Priority of the running task, or of the enclosing `run_with_priority`
    fn current_priority_level(&self) -> PriorityLevel;
}
