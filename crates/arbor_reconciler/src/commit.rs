//! Commit phase
//!
//! The mutation walk visits the finished tree depth first, skipping any
//! subtree whose `subtree_flags` carry no work, and applies each fiber's
//! flags after its children: placement, update, child deletion, then
//! passive-effect collection and ref attachment.
//!
//! Passive effects are collected here and run later by
//! [`FiberRoot::flush_passive_effects`].

use std::mem;
use std::panic::{self, AssertUnwindSafe};

use arbor_core::{HostConfig, HostNode, HostParent};

use crate::error::panic_message;
use crate::fiber::{FiberArena, FiberId, FiberState, WorkTag};
use crate::flags::{Flags, HookFlags};
use crate::hooks::{EffectRef, Hook};
use crate::root::FiberRoot;

/// Host mutations applied by one commit
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct CommitStats {
    pub(crate) placements: usize,
    pub(crate) updates: usize,
    pub(crate) deletions: usize,
}

impl<H: HostConfig> FiberRoot<H> {
    pub(crate) fn commit_mutation_effects(&self, arena: &mut FiberArena<H>, finished_work: FiberId) -> CommitStats {
        let mut stats = CommitStats::default();
        let work_mask = Flags::MUTATION_MASK | Flags::PASSIVE_MASK;

        let mut next = Some(finished_work);
        while let Some(fiber) = next {
            // Descend while the subtree below has work
            if let Some(child) = arena[fiber].child.filter(|_| arena[fiber].subtree_flags.intersects(work_mask)) {
                next = Some(child);
                continue;
            }

            // Leaf of the work walk: apply and climb until a sibling exists
            let mut node = fiber;
            loop {
                self.commit_mutation_effects_on_fiber(arena, node, &mut stats);
                if node == finished_work {
                    return stats;
                }
                if let Some(sibling) = arena[node].sibling {
                    next = Some(sibling);
                    break;
                }
                match arena[node].return_fiber {
                    Some(parent) => node = parent,
                    None => return stats,
                }
            }
        }
        stats
    }

    fn commit_mutation_effects_on_fiber(&self, arena: &mut FiberArena<H>, fiber: FiberId, stats: &mut CommitStats) {
        let flags = arena[fiber].flags;

        if flags.contains(Flags::PLACEMENT) {
            self.commit_placement(arena, fiber);
            arena[fiber].flags.remove(Flags::PLACEMENT);
            stats.placements += 1;
        }

        if flags.contains(Flags::UPDATE) {
            self.commit_update(arena, fiber);
            arena[fiber].flags.remove(Flags::UPDATE);
            stats.updates += 1;
        }

        if flags.contains(Flags::CHILD_DELETION) {
            let deletions = mem::take(&mut arena[fiber].deletions);
            stats.deletions += deletions.len();
            for child in deletions {
                self.commit_deletion(arena, fiber, child);
            }
            arena[fiber].flags.remove(Flags::CHILD_DELETION);
        }

        if flags.contains(Flags::PASSIVE_EFFECT) {
            let effects = arena[fiber].effects.clone();
            if !effects.is_empty() {
                self.pending_passive_effects.borrow_mut().update.push(effects);
            }
            arena[fiber].flags.remove(Flags::PASSIVE_EFFECT);
        }

        if flags.contains(Flags::REF) {
            self.commit_attach_ref(arena, fiber);
            arena[fiber].flags.remove(Flags::REF);
        }
    }

    fn commit_update(&self, arena: &mut FiberArena<H>, fiber: FiberId) {
        let payload = arena[fiber].update_payload.take();
        let (Some(node), Some(payload)) = (arena[fiber].host_node(), payload) else {
            log::error!("Update flagged on {:?} without a host node or payload", fiber);
            return;
        };
        if let Err(e) = self.host.commit_update(node, &payload) {
            log::error!("Host rejected update of {:?}: {}", fiber, e);
        }
    }

    /// Nearest host ancestor of `fiber`, starting at `fiber` itself
    fn host_parent_from(&self, arena: &FiberArena<H>, fiber: FiberId) -> Option<HostParent<H>> {
        let mut next = Some(fiber);
        while let Some(id) = next {
            let candidate = &arena[id];
            match candidate.tag {
                WorkTag::HostComponent => {
                    if let Some(HostNode::Element(instance)) = candidate.host_node() {
                        return Some(HostParent::Element(instance.clone()));
                    }
                }
                WorkTag::HostRoot => return Some(HostParent::Container(self.container.clone())),
                _ => {}
            }
            next = candidate.return_fiber;
        }
        None
    }

    /// First host node after `fiber` that is already in place
    fn host_sibling_of(&self, arena: &FiberArena<H>, fiber: FiberId) -> Option<HostNode<H>> {
        let mut node = fiber;
        'siblings: loop {
            while arena[node].sibling.is_none() {
                match arena[node].return_fiber {
                    Some(parent) if !matches!(arena[parent].tag, WorkTag::HostComponent | WorkTag::HostRoot) => {
                        node = parent;
                    }
                    _ => return None,
                }
            }

            let Some(sibling) = arena[node].sibling else {
                return None;
            };
            node = sibling;

            while !arena[node].tag.is_host() {
                if arena[node].flags.contains(Flags::PLACEMENT) {
                    continue 'siblings;
                }
                match arena[node].child {
                    Some(child) => node = child,
                    None => continue 'siblings,
                }
            }

            if !arena[node].flags.contains(Flags::PLACEMENT) {
                return arena[node].host_node().cloned();
            }
        }
    }

    fn commit_placement(&self, arena: &FiberArena<H>, fiber: FiberId) {
        let parent = arena[fiber].return_fiber.and_then(|parent| self.host_parent_from(arena, parent));
        let Some(parent) = parent else {
            log::error!("No host parent for placed fiber {:?}", fiber);
            return;
        };
        let before = self.host_sibling_of(arena, fiber);
        self.insert_or_append_placement_node(arena, fiber, &parent, before.as_ref());
    }

    fn insert_or_append_placement_node(
        &self,
        arena: &FiberArena<H>,
        fiber: FiberId,
        parent: &HostParent<H>,
        before: Option<&HostNode<H>>,
    ) {
        let node = &arena[fiber];
        if node.tag.is_host() {
            let Some(host_node) = node.host_node() else {
                log::error!("Placed host fiber {:?} has no host node", fiber);
                return;
            };
            let result = match before {
                Some(before) => self.host.insert_child_to_container(host_node, parent, before),
                None => self.host.append_child_to_container(parent, host_node),
            };
            if let Err(e) = result {
                log::error!("Host rejected placement of {:?}: {}", fiber, e);
            }
            return;
        }

        let mut child = node.child;
        while let Some(id) = child {
            self.insert_or_append_placement_node(arena, id, parent, before);
            child = arena[id].sibling;
        }
    }

    /// Remove `child` and its subtree, queue its unmount effects and free
    /// its fibers
    fn commit_deletion(&self, arena: &mut FiberArena<H>, parent_fiber: FiberId, child: FiberId) {
        let mut host_roots = Vec::new();
        self.collect_deleted_subtree(arena, child, false, &mut host_roots);

        if !host_roots.is_empty() {
            match self.host_parent_from(arena, parent_fiber) {
                Some(parent) => {
                    for node in &host_roots {
                        if let Err(e) = self.host.remove_child(node, &parent) {
                            log::error!("Host rejected removal of {:?}: {}", node, e);
                        }
                    }
                }
                None => log::error!("No host parent for deleted fiber {:?}", child),
            }
        }

        release_subtree(arena, child);
    }

    fn collect_deleted_subtree(
        &self,
        arena: &FiberArena<H>,
        fiber: FiberId,
        inside_host: bool,
        host_roots: &mut Vec<HostNode<H>>,
    ) {
        let node = &arena[fiber];
        match node.tag {
            WorkTag::HostComponent | WorkTag::HostText => {
                if !inside_host {
                    if let Some(host_node) = node.host_node() {
                        host_roots.push(host_node.clone());
                    }
                }
                if let Some(handle) = &node.ref_handle {
                    handle.detach();
                }
            }
            WorkTag::FunctionComponent => {
                if !node.effects.is_empty() {
                    self.pending_passive_effects.borrow_mut().unmount.push(node.effects.clone());
                }
                if let FiberState::Hooks(hooks) = &node.memoized_state {
                    for hook in hooks {
                        if let Hook::State { queue, .. } = hook {
                            queue.borrow_mut().detach();
                        }
                    }
                }
            }
            WorkTag::HostRoot | WorkTag::Fragment => {}
        }

        let inside_host = inside_host || node.tag.is_host();
        let mut child = node.child;
        while let Some(id) = child {
            self.collect_deleted_subtree(arena, id, inside_host, host_roots);
            child = arena[id].sibling;
        }
    }

    fn commit_attach_ref(&self, arena: &FiberArena<H>, fiber: FiberId) {
        let node = &arena[fiber];
        let previous = arena
            .alternate_of(fiber)
            .and_then(|alternate| arena[alternate].ref_handle.clone());

        if let Some(previous) = previous {
            let replaced = node.ref_handle.as_ref().map_or(true, |handle| !handle.ptr_eq(&previous));
            if replaced {
                previous.detach();
            }
        }

        if let (Some(handle), Some(HostNode::Element(instance))) = (&node.ref_handle, node.host_node()) {
            handle.attach(self.host.public_instance(instance));
        }
    }

    /// Run pending passive effects: unmount destroys, then update destroys,
    /// then update creates. Returns whether anything was pending.
    pub(crate) fn flush_passive_effects(&self) -> bool {
        let pending = mem::take(&mut *self.pending_passive_effects.borrow_mut());
        self.root_has_passive_effects.set(false);
        if pending.is_empty() {
            return false;
        }
        log::debug!(
            "Flushing passive effects: {} unmounted, {} updated components",
            pending.unmount.len(),
            pending.update.len()
        );

        for effect in pending.unmount.iter().flatten() {
            let destroy = {
                let mut effect = effect.borrow_mut();
                effect.tag.remove(HookFlags::HAS_EFFECT);
                if effect.tag.contains(HookFlags::PASSIVE) {
                    effect.destroy.take()
                } else {
                    None
                }
            };
            if let Some(destroy) = destroy {
                run_effect_callback("cleanup", || destroy());
            }
        }

        let fired = HookFlags::PASSIVE | HookFlags::HAS_EFFECT;
        let fired_effects: Vec<&EffectRef> = pending
            .update
            .iter()
            .flatten()
            .filter(|effect| effect.borrow().tag.contains(fired))
            .collect();

        for effect in &fired_effects {
            let destroy = effect.borrow_mut().destroy.take();
            if let Some(destroy) = destroy {
                run_effect_callback("cleanup", || destroy());
            }
        }

        for effect in &fired_effects {
            let create = effect.borrow().create.clone();
            let destroy = run_effect_callback("effect", || create()).flatten();
            effect.borrow_mut().destroy = destroy;
        }

        self.flush_sync_callbacks();
        true
    }
}

/// Effect callbacks run outside any render; a panic is logged and dropped
fn run_effect_callback<R>(what: &str, f: impl FnOnce() -> R) -> Option<R> {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(value) => Some(value),
        Err(payload) => {
            log::error!("Passive {} panicked: {}", what, panic_message(payload.as_ref()));
            None
        }
    }
}

/// Free a deleted subtree and the alternates pointing back at it
fn release_subtree<H: HostConfig>(arena: &mut FiberArena<H>, root: FiberId) {
    let mut stack = vec![root];
    while let Some(fiber) = stack.pop() {
        let Some(removed) = arena.remove(fiber) else {
            continue;
        };
        let mut child = removed.child;
        while let Some(id) = child {
            child = arena.get(id).and_then(|c| c.sibling);
            stack.push(id);
        }
        if let Some(alternate) = removed.alternate {
            if arena.get(alternate).is_some_and(|alt| alt.alternate == Some(fiber)) {
                arena.remove(alternate);
            }
        }
    }
}
