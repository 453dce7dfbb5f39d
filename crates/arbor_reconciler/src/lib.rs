//! # arbor_reconciler - Fiber Reconciler
//!
//! Turns element trees produced by function components into host mutations.
//!
//! ## Architecture
//!
//! ```text
//! dispatch / render ──► lanes ──► sync queue (microtask) ──┐
//!                                 scheduler task ──────────┤
//!                                                          ▼
//!                       begin_work ◄──► complete_work   (render, interruptible)
//!                                                          │
//!                                                          ▼
//!                               commit: mutations, refs ──► passive effects
//! ```
//!
//! ## Key Invariants
//!
//! 1. **Host untouched during render** - all mutations happen in one commit
//! 2. **No lost updates** - skipped updates are replayed from `base_state`
//! 3. **Positional hooks** - a component calls the same hooks in the same order
//! 4. **Single scheduled task** - at most one render task per root

mod begin_work;
mod child_fibers;
mod commit;
mod complete_work;
pub mod config;
pub mod error;
pub mod fiber;
pub mod flags;
mod hooks;
pub mod lanes;
pub mod root;
pub mod update_queue;
mod work_loop;

pub use config::{ConfigError, RootConfig};
pub use error::{ReconcilerError, ReconcilerResult};
pub use fiber::{FiberId, WorkTag};
pub use flags::Flags;
pub use lanes::{request_update_lane, Lane, Lanes};
pub use root::{create_root, create_root_with_config, Root};
pub use update_queue::{process_update_queue, StateSlot, Update, UpdateQueue};
