//! Render passes and commit
//!
//! A pass walks the work-in-progress tree depth first: `begin_work` on the
//! way down, `complete_work` on the way up. Concurrent passes check
//! `should_yield` before each unit and resume from the saved
//! `work_in_progress` on the next scheduler slice. A completed pass is
//! committed in one go.

use arbor_core::{HostConfig, Props};
use arbor_scheduler::{CallbackStatus, CallbackToken};

use crate::begin_work::begin_work;
use crate::complete_work::complete_work;
use crate::error::{ReconcilerError, ReconcilerResult};
use crate::fiber::{create_work_in_progress, FiberId};
use crate::flags::Flags;
use crate::lanes::{Lane, Lanes};
use crate::root::{FiberRoot, FiberTree};

/// Outcome of a render pass
#[derive(Debug)]
pub(crate) enum RootExitStatus {
    /// Yielded with work left
    Incomplete,
    /// The tree is ready to commit
    Completed,
    /// Failed more often than the retry budget allows
    Errored(ReconcilerError),
}

impl<H: HostConfig> FiberRoot<H> {
    /// Entry point of the sync queue
    pub(crate) fn perform_sync_work_on_root(&self) {
        if self.callback_priority.get() == Lanes::SYNC {
            self.callback_priority.set(Lanes::NO_LANE);
        }
        self.flush_passive_effects();

        let next_lane = self.pending_lanes.get().highest_priority();
        if next_lane != Lanes::SYNC {
            self.ensure_root_is_scheduled();
            return;
        }

        let Ok(mut tree) = self.tree.try_borrow_mut() else {
            // Reached from a component body through an inline microtask. The
            // pass holding the tree reschedules once it lets go of it.
            log::debug!("Deferring sync render until the pass in flight yields");
            self.callback_priority.set(Lanes::NO_LANE);
            return;
        };
        let exit = self.render_root(&mut tree, next_lane, false);
        self.finish_render(&mut tree, next_lane, exit);
        drop(tree);

        self.ensure_root_is_scheduled();
    }

    /// Entry point of scheduler tasks
    pub(crate) fn perform_concurrent_work_on_root(
        &self,
        own_token: Option<CallbackToken>,
        did_timeout: bool,
    ) -> CallbackStatus {
        if own_token.is_none() || self.callback_node.get() != own_token {
            log::trace!("Dropping stale render task {:?}", own_token);
            return CallbackStatus::Complete;
        }

        let did_flush = self.flush_passive_effects();
        if did_flush && self.callback_node.get() != own_token {
            // The flush scheduled more urgent work that replaced this task
            return CallbackStatus::Complete;
        }

        let lane = self.pending_lanes.get().highest_priority();
        if lane.is_empty() {
            self.clear_callback();
            return CallbackStatus::Complete;
        }

        let should_time_slice = lane != Lanes::SYNC && !did_timeout;
        let Ok(mut tree) = self.tree.try_borrow_mut() else {
            log::error!("Concurrent render requested while the fiber tree is busy");
            return CallbackStatus::Complete;
        };
        let exit = self.render_root(&mut tree, lane, should_time_slice);

        if let RootExitStatus::Incomplete = exit {
            drop(tree);
            if self.callback_node.get() == own_token {
                return CallbackStatus::Continue;
            }
            // Replaced mid-slice; work deferred while the tree was held needs a new home
            self.ensure_root_is_scheduled();
            return CallbackStatus::Complete;
        }

        self.finish_render(&mut tree, lane, exit);
        drop(tree);
        self.ensure_root_is_scheduled();
        CallbackStatus::Complete
    }

    fn finish_render(&self, tree: &mut FiberTree<H>, lane: Lane, exit: RootExitStatus) {
        match exit {
            RootExitStatus::Completed => self.commit_root(tree),
            RootExitStatus::Errored(error) => self.abandon_lane(tree, lane, error),
            RootExitStatus::Incomplete => {}
        }
    }

    /// Render `lane`, resuming the pass in flight if it is for the same lane
    pub(crate) fn render_root(&self, tree: &mut FiberTree<H>, lane: Lane, should_time_slice: bool) -> RootExitStatus {
        if self.wip_render_lane.get() != lane || tree.session.work_in_progress.is_none() {
            tree.session.failures = 0;
            self.prepare_fresh_stack(tree, lane);
        }

        loop {
            let result = if should_time_slice {
                self.work_loop_concurrent(tree)
            } else {
                self.work_loop_sync(tree)
            };
            match result {
                Ok(()) => break,
                Err(error) => {
                    tree.session.failures += 1;
                    if tree.session.failures > self.config.max_render_retries {
                        return RootExitStatus::Errored(error);
                    }
                    log::warn!("Render of {:?} failed, restarting: {}", lane, error);
                    self.prepare_fresh_stack(tree, lane);
                }
            }
        }

        if tree.session.work_in_progress.is_some() {
            return RootExitStatus::Incomplete;
        }

        tree.finished_work = tree.session.root;
        self.finished_lane.set(lane);
        RootExitStatus::Completed
    }

    /// Discard the pass in flight and start a new one at the root
    fn prepare_fresh_stack(&self, tree: &mut FiberTree<H>, lane: Lane) {
        let freed = tree.arena.discard_uncommitted();
        if freed > 0 {
            log::trace!("Discarded {} fibers of an unfinished pass", freed);
        }

        tree.finished_work = None;
        let root = create_work_in_progress(&mut tree.arena, tree.current, Props::new());
        tree.session.root = Some(root);
        tree.session.work_in_progress = Some(root);
        self.wip_render_lane.set(lane);
        self.interleaved_lanes.set(Lanes::NO_LANES);
    }

    fn work_loop_sync(&self, tree: &mut FiberTree<H>) -> ReconcilerResult<()> {
        while let Some(fiber) = tree.session.work_in_progress {
            self.perform_unit_of_work(tree, fiber)?;
        }
        Ok(())
    }

    fn work_loop_concurrent(&self, tree: &mut FiberTree<H>) -> ReconcilerResult<()> {
        while let Some(fiber) = tree.session.work_in_progress {
            if self.scheduler.should_yield() {
                log::trace!("Yielding before {:?}", fiber);
                break;
            }
            self.perform_unit_of_work(tree, fiber)?;
        }
        Ok(())
    }

    fn perform_unit_of_work(&self, tree: &mut FiberTree<H>, fiber: FiberId) -> ReconcilerResult<()> {
        log::trace!("Begin {:?} <{}>", fiber, tree.arena[fiber].type_name());
        let next = begin_work(&mut tree.arena, fiber, self.wip_render_lane.get(), &self.sink)?;

        let unit = &mut tree.arena[fiber];
        unit.memoized_props = Some(unit.pending_props.clone());

        match next {
            Some(child) => tree.session.work_in_progress = Some(child),
            None => self.complete_unit_of_work(tree, fiber),
        }
        Ok(())
    }

    fn complete_unit_of_work(&self, tree: &mut FiberTree<H>, fiber: FiberId) {
        let mut node = Some(fiber);
        while let Some(completed) = node {
            complete_work(&mut tree.arena, self.host.as_ref(), completed);

            if let Some(sibling) = tree.arena[completed].sibling {
                tree.session.work_in_progress = Some(sibling);
                return;
            }
            node = tree.arena[completed].return_fiber;
            tree.session.work_in_progress = node;
        }
    }

    /// Give up on `lane` after its pass kept failing
    fn abandon_lane(&self, tree: &mut FiberTree<H>, lane: Lane, error: ReconcilerError) {
        log::error!("Abandoning render of {:?} after {} failures: {}", lane, tree.session.failures, error);

        let freed = tree.arena.discard_uncommitted();
        log::trace!("Discarded {} fibers of the abandoned pass", freed);
        tree.finished_work = None;
        tree.session.reset();
        self.wip_render_lane.set(Lanes::NO_LANE);

        let interleaved = self.interleaved_lanes.replace(Lanes::NO_LANES);
        self.pending_lanes.set(self.pending_lanes.get().without(lane) | interleaved);
        self.clear_callback();
        self.record_error(error);
    }

    /// Apply a completed pass to the host and make it the current tree
    pub(crate) fn commit_root(&self, tree: &mut FiberTree<H>) {
        let Some(finished_work) = tree.finished_work.take() else {
            return;
        };
        let lane = self.finished_lane.replace(Lanes::NO_LANE);
        if lane.is_empty() {
            log::error!("Committing finished work without a lane");
        }

        let interleaved = self.interleaved_lanes.replace(Lanes::NO_LANES);
        self.pending_lanes.set(self.pending_lanes.get().without(lane) | interleaved);
        self.wip_render_lane.set(Lanes::NO_LANE);
        tree.session.reset();
        self.clear_callback();

        let root_fiber = &tree.arena[finished_work];
        let effect_flags = root_fiber.flags | root_fiber.subtree_flags;

        if effect_flags.intersects(Flags::PASSIVE_MASK) && !self.root_has_passive_effects.replace(true) {
            self.schedule_passive_flush();
        }

        let stats = if effect_flags.intersects(Flags::MUTATION_MASK | Flags::PASSIVE_MASK) {
            self.commit_mutation_effects(&mut tree.arena, finished_work)
        } else {
            Default::default()
        };

        tree.current = finished_work;
        tree.arena.checkpoint();

        if self.config.trace_commits {
            log::debug!(
                "Committed {:?}: {} placements, {} updates, {} deletions, {} live fibers, pending {:?}",
                lane,
                stats.placements,
                stats.updates,
                stats.deletions,
                tree.arena.len(),
                self.pending_lanes.get()
            );
        }
    }
}
