//! Single-threaded scheduler
//!
//! Tasks are ordered by expiration time (enqueue time plus the priority's
//! timeout), then by insertion order. A task that returns
//! [`CallbackStatus::Continue`] keeps its slot and token.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use crate::{CallbackStatus, CallbackToken, PriorityLevel, Scheduler, SchedulerCallback};

/// Far-future expiration used for idle work
const IDLE_TIMEOUT: Duration = Duration::from_millis(1_073_741_823);

/// When `should_yield` starts returning true inside a task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum YieldPolicy {
    /// Never yield
    Never,
    /// Yield once the task has run for this long
    TimeSlice(Duration),
    /// Yield after this many `should_yield` checks within one run
    AfterChecks(u32),
}

impl Default for YieldPolicy {
    fn default() -> Self {
        Self::TimeSlice(Duration::from_millis(5))
    }
}

struct Task {
    id: u64,
    priority: PriorityLevel,
    callback: SchedulerCallback,
}

struct SchedulerState {
    queue: BTreeMap<(Instant, u64), Task>,
    next_id: u64,
    current_task: Option<u64>,
    current_cancelled: bool,
    current_priority: PriorityLevel,
    slice_started: Instant,
    checks: u32,
}

/// Deterministic, single-threaded [`Scheduler`]
pub struct LocalScheduler {
    state: RefCell<SchedulerState>,
    policy: YieldPolicy,
}

impl LocalScheduler {
    /// Create a scheduler with the given yield policy
    pub fn new(policy: YieldPolicy) -> Self {
        Self {
            state: RefCell::new(SchedulerState {
                queue: BTreeMap::new(),
                next_id: 1,
                current_task: None,
                current_cancelled: false,
                current_priority: PriorityLevel::Normal,
                slice_started: Instant::now(),
                checks: 0,
            }),
            policy,
        }
    }

    /// Yield policy in effect
    pub fn policy(&self) -> YieldPolicy {
        self.policy
    }

    /// Number of queued tasks
    pub fn pending_count(&self) -> usize {
        self.state.borrow().queue.len()
    }

    /// Check if nothing is queued
    pub fn is_idle(&self) -> bool {
        self.state.borrow().queue.is_empty()
    }

    /// Run `f` with `level` reported as the current priority
    pub fn run_with_priority<R>(&self, level: PriorityLevel, f: impl FnOnce() -> R) -> R {
        let previous = std::mem::replace(&mut self.state.borrow_mut().current_priority, level);
        let result = f();
        self.state.borrow_mut().current_priority = previous;
        result
    }

    /// Run the most urgent task for one slice. Returns false if the queue was empty.
    pub fn flush_next(&self) -> bool {
        let (key, mut task, previous_priority) = {
            let mut state = self.state.borrow_mut();
            let Some(key) = state.queue.keys().next().copied() else {
                return false;
            };
            let Some(task) = state.queue.remove(&key) else {
                return false;
            };
            state.current_task = Some(task.id);
            state.current_cancelled = false;
            state.slice_started = Instant::now();
            state.checks = 0;
            let previous = std::mem::replace(&mut state.current_priority, task.priority);
            (key, task, previous)
        };

        let did_timeout = key.0 <= Instant::now();
        log::trace!("Running task #{} (timed out: {})", task.id, did_timeout);
        let status = (task.callback)(did_timeout);

        let mut state = self.state.borrow_mut();
        state.current_priority = previous_priority;
        state.current_task = None;
        if status == CallbackStatus::Continue && !state.current_cancelled {
            state.queue.insert(key, task);
        }
        true
    }

    /// Run tasks until the queue is empty. Returns the number of slices run.
    pub fn flush_all(&self) -> usize {
        let mut slices = 0;
        while self.flush_next() {
            slices += 1;
        }
        slices
    }
}

impl Default for LocalScheduler {
    fn default() -> Self {
        Self::new(YieldPolicy::default())
    }
}

impl Scheduler for LocalScheduler {
    fn schedule_callback(&self, priority: PriorityLevel, callback: SchedulerCallback) -> CallbackToken {
        let mut state = self.state.borrow_mut();
        let id = state.next_id;
        state.next_id += 1;

        let now = Instant::now();
        let expiration = match priority.timeout() {
            Some(timeout) => now + timeout,
            None => now + IDLE_TIMEOUT,
        };
        state.queue.insert(
            (expiration, id),
            Task {
                id,
                priority,
                callback,
            },
        );
        log::trace!("Scheduled task #{} at {:?}", id, priority);
        CallbackToken::new(id)
    }

    fn cancel_callback(&self, token: CallbackToken) {
        let mut state = self.state.borrow_mut();
        if state.current_task == Some(token.id()) {
            state.current_cancelled = true;
            return;
        }
        let key = state
            .queue
            .iter()
            .find(|(_, task)| task.id == token.id())
            .map(|(key, _)| *key);
        if let Some(key) = key {
            state.queue.remove(&key);
            log::trace!("Cancelled task #{}", token.id());
        }
    }

    fn should_yield(&self) -> bool {
        let mut state = self.state.borrow_mut();
        match self.policy {
            YieldPolicy::Never => false,
            YieldPolicy::TimeSlice(slice) => state.slice_started.elapsed() >= slice,
            YieldPolicy::AfterChecks(limit) => {
                state.checks += 1;
                state.checks > limit
            }
        }
    }

    fn current_priority_level(&self) -> PriorityLevel {
        self.state.borrow().current_priority
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    fn recorder(log: &Rc<RefCell<Vec<&'static str>>>, name: &'static str) -> SchedulerCallback {
        let log = log.clone();
        Box::new(move |_| {
            log.borrow_mut().push(name);
            CallbackStatus::Complete
        })
    }

    #[test]
    fn test_runs_by_priority() {
        let scheduler = LocalScheduler::new(YieldPolicy::Never);
        let log = Rc::new(RefCell::new(Vec::new()));

        scheduler.schedule_callback(PriorityLevel::Idle, recorder(&log, "idle"));
        scheduler.schedule_callback(PriorityLevel::Normal, recorder(&log, "normal"));
        scheduler.schedule_callback(PriorityLevel::UserBlocking, recorder(&log, "blocking"));

        assert_eq!(scheduler.flush_all(), 3);
        assert_eq!(*log.borrow(), vec!["blocking", "normal", "idle"]);
    }

    #[test]
    fn test_same_priority_is_fifo() {
        let scheduler = LocalScheduler::new(YieldPolicy::Never);
        let log = Rc::new(RefCell::new(Vec::new()));

        scheduler.schedule_callback(PriorityLevel::Idle, recorder(&log, "a"));
        scheduler.schedule_callback(PriorityLevel::Idle, recorder(&log, "b"));
        scheduler.flush_all();

        assert_eq!(*log.borrow(), vec!["a", "b"]);
    }

    #[test]
    fn test_cancel_queued_task() {
        let scheduler = LocalScheduler::new(YieldPolicy::Never);
        let log = Rc::new(RefCell::new(Vec::new()));

        let token = scheduler.schedule_callback(PriorityLevel::Normal, recorder(&log, "cancelled"));
        scheduler.schedule_callback(PriorityLevel::Normal, recorder(&log, "kept"));
        scheduler.cancel_callback(token);

        scheduler.flush_all();
        assert_eq!(*log.borrow(), vec!["kept"]);
    }

    #[test]
    fn test_continuation_keeps_token() {
        let scheduler = LocalScheduler::new(YieldPolicy::Never);
        let runs = Rc::new(Cell::new(0));
        let counter = runs.clone();

        scheduler.schedule_callback(
            PriorityLevel::Normal,
            Box::new(move |_| {
                counter.set(counter.get() + 1);
                if counter.get() < 3 {
                    CallbackStatus::Continue
                } else {
                    CallbackStatus::Complete
                }
            }),
        );

        assert!(scheduler.flush_next());
        assert_eq!(scheduler.pending_count(), 1);
        scheduler.flush_all();
        assert_eq!(runs.get(), 3);
        assert!(scheduler.is_idle());
    }

    #[test]
    fn test_task_cancelled_while_running_is_not_requeued() {
        let scheduler = Rc::new(LocalScheduler::new(YieldPolicy::Never));
        let token_slot: Rc<Cell<Option<CallbackToken>>> = Rc::new(Cell::new(None));

        let inner = scheduler.clone();
        let slot = token_slot.clone();
        let token = scheduler.schedule_callback(
            PriorityLevel::Normal,
            Box::new(move |_| {
                if let Some(token) = slot.get() {
                    inner.cancel_callback(token);
                }
                CallbackStatus::Continue
            }),
        );
        token_slot.set(Some(token));

        scheduler.flush_next();
        assert!(scheduler.is_idle());
    }

    #[test]
    fn test_after_checks_policy() {
        let scheduler = LocalScheduler::new(YieldPolicy::AfterChecks(2));
        assert!(!scheduler.should_yield());
        assert!(!scheduler.should_yield());
        assert!(scheduler.should_yield());
    }

    #[test]
    fn test_checks_reset_per_slice() {
        let scheduler = Rc::new(LocalScheduler::new(YieldPolicy::AfterChecks(1)));
        let yields = Rc::new(RefCell::new(Vec::new()));

        for _ in 0..2 {
            let inner = scheduler.clone();
            let yields = yields.clone();
            scheduler.schedule_callback(
                PriorityLevel::Normal,
                Box::new(move |_| {
                    yields.borrow_mut().push(inner.should_yield());
                    yields.borrow_mut().push(inner.should_yield());
                    CallbackStatus::Complete
                }),
            );
        }
        scheduler.flush_all();

        assert_eq!(*yields.borrow(), vec![false, true, false, true]);
    }

    #[test]
    fn test_current_priority_level() {
        let scheduler = Rc::new(LocalScheduler::new(YieldPolicy::Never));
        assert_eq!(scheduler.current_priority_level(), PriorityLevel::Normal);

        let seen = Rc::new(Cell::new(None));
        let inner = scheduler.clone();
        let out = seen.clone();
        scheduler.schedule_callback(
            PriorityLevel::UserBlocking,
            Box::new(move |_| {
                out.set(Some(inner.current_priority_level()));
                CallbackStatus::Complete
            }),
        );
        scheduler.flush_all();
        assert_eq!(seen.get(), Some(PriorityLevel::UserBlocking));

        let level = scheduler.run_with_priority(PriorityLevel::Idle, || scheduler.current_priority_level());
        assert_eq!(level, PriorityLevel::Idle);
        assert_eq!(scheduler.current_priority_level(), PriorityLevel::Normal);
    }

    #[test]
    fn test_immediate_task_is_overdue() {
        let scheduler = LocalScheduler::new(YieldPolicy::Never);
        let overdue = Rc::new(Cell::new(false));
        let out = overdue.clone();
        scheduler.schedule_callback(
            PriorityLevel::Immediate,
            Box::new(move |did_timeout| {
                out.set(did_timeout);
                CallbackStatus::Complete
            }),
        );
        scheduler.flush_all();
        assert!(overdue.get());
    }
}
