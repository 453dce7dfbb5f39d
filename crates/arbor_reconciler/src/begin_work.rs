//! Begin phase: compute a fiber's children

use std::rc::Weak;

use arbor_core::{ElementType, HostConfig, Value};

use crate::child_fibers::reconcile_child_fibers;
use crate::error::{ReconcilerError, ReconcilerResult};
use crate::fiber::{FiberArena, FiberId, FiberState, WorkTag};
use crate::hooks::{render_with_hooks, Hook};
use crate::lanes::Lane;
use crate::root::UpdateSink;

/// Process `wip` and return its first child, if any
pub(crate) fn begin_work<H: HostConfig>(
    arena: &mut FiberArena<H>,
    wip: FiberId,
    render_lane: Lane,
    sink: &Weak<dyn UpdateSink>,
) -> ReconcilerResult<Option<FiberId>> {
    match arena[wip].tag {
        WorkTag::HostRoot => update_host_root(arena, wip, render_lane),
        WorkTag::FunctionComponent => update_function_component(arena, wip, render_lane, sink),
        WorkTag::HostComponent | WorkTag::Fragment => {
            let children = arena[wip].pending_props.children().cloned().unwrap_or_default();
            reconcile_children(arena, wip, &children);
            Ok(arena[wip].child)
        }
        WorkTag::HostText => Ok(None),
    }
}

fn invalid(arena: &FiberArena<impl HostConfig>, fiber: FiberId, reason: &'static str) -> ReconcilerError {
    ReconcilerError::InvalidFiber {
        fiber,
        tag: arena[fiber].tag,
        reason,
    }
}

fn update_host_root<H: HostConfig>(
    arena: &mut FiberArena<H>,
    wip: FiberId,
    render_lane: Lane,
) -> ReconcilerResult<Option<FiberId>> {
    let Some(queue) = arena[wip].update_queue.clone() else {
        return Err(invalid(arena, wip, "host root without an update queue"));
    };
    let Some(current) = arena.alternate_of(wip) else {
        return Err(invalid(arena, wip, "host root without a committed alternate"));
    };

    let next = match &mut arena[current].memoized_state {
        FiberState::Root(slot) => Some(slot.rebase(&queue, render_lane)),
        _ => None,
    };
    let Some(next) = next else {
        return Err(invalid(arena, current, "host root without root state"));
    };

    let children = next.memoized_state.clone();
    arena[wip].memoized_state = FiberState::Root(next);
    reconcile_children(arena, wip, &children);
    Ok(arena[wip].child)
}

fn update_function_component<H: HostConfig>(
    arena: &mut FiberArena<H>,
    wip: FiberId,
    render_lane: Lane,
    sink: &Weak<dyn UpdateSink>,
) -> ReconcilerResult<Option<FiberId>> {
    let component = match &arena[wip].element_type {
        Some(ElementType::Component(component)) => component.clone(),
        _ => return Err(invalid(arena, wip, "function component without a component type")),
    };
    let props = arena[wip].pending_props.clone();

    // The committed chain is borrowed out of the current fiber for the
    // duration of the render and put back afterwards, successful or not
    let current = arena.alternate_of(wip);
    let mut committed = current.and_then(|fiber| take_hooks(arena, fiber));
    let result = render_with_hooks(&component, &props, committed.as_mut(), render_lane, sink);
    if let (Some(fiber), Some(hooks)) = (current, committed) {
        arena[fiber].memoized_state = FiberState::Hooks(hooks);
    }
    let rendered = result?;

    let fiber = &mut arena[wip];
    fiber.memoized_state = FiberState::Hooks(rendered.hooks);
    fiber.effects = rendered.effects;
    fiber.flags |= rendered.flags;

    reconcile_children(arena, wip, &rendered.children);
    Ok(arena[wip].child)
}

fn take_hooks<H: HostConfig>(arena: &mut FiberArena<H>, fiber: FiberId) -> Option<Vec<Hook>> {
    match std::mem::take(&mut arena[fiber].memoized_state) {
        FiberState::Hooks(hooks) => Some(hooks),
        other => {
            arena[fiber].memoized_state = other;
            None
        }
    }
}

fn reconcile_children<H: HostConfig>(arena: &mut FiberArena<H>, wip: FiberId, children: &Value) {
    let first = match arena.alternate_of(wip) {
        Some(current) => {
            let current_first = arena[current].child;
            reconcile_child_fibers(arena, wip, current_first, children, true)
        }
        None => reconcile_child_fibers(arena, wip, None, children, false),
    };
    arena[wip].child = first;
}
