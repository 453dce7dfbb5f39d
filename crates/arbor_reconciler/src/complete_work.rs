//! Complete phase: build or diff host nodes and bubble flags

use arbor_core::{HostConfig, HostNode, UpdatePayload};

use crate::fiber::{Fiber, FiberArena, FiberId, StateNode, WorkTag};
use crate::flags::Flags;

/// Finish `wip` after all of its children completed
pub(crate) fn complete_work<H: HostConfig>(arena: &mut FiberArena<H>, host: &H, wip: FiberId) {
    let current = arena.alternate_of(wip);
    let has_node = arena[wip].host_node().is_some();

    match arena[wip].tag {
        WorkTag::HostComponent => match current {
            Some(current) if has_node => diff_host_component(arena, current, wip),
            _ => {
                let fiber = &arena[wip];
                let instance = host.create_instance(fiber.type_name(), &fiber.pending_props);
                append_all_children(arena, host, &instance, wip);

                let fiber = &mut arena[wip];
                fiber.state_node = StateNode::Host(HostNode::Element(instance));
                if fiber.ref_handle.is_some() {
                    fiber.flags.insert(Flags::REF);
                }
            }
        },
        WorkTag::HostText => {
            let new_text = Fiber::<H>::text_content(&arena[wip].pending_props).to_string();
            match current {
                Some(current) if has_node => {
                    let old_text = arena[current]
                        .memoized_props
                        .as_ref()
                        .map(|props| Fiber::<H>::text_content(props).to_string());
                    if old_text.as_deref() != Some(new_text.as_str()) {
                        let fiber = &mut arena[wip];
                        fiber.update_payload = Some(UpdatePayload::Text(new_text));
                        fiber.flags.insert(Flags::UPDATE);
                    }
                }
                _ => {
                    let text = host.create_text_instance(&new_text);
                    arena[wip].state_node = StateNode::Host(HostNode::Text(text));
                }
            }
        }
        WorkTag::HostRoot | WorkTag::FunctionComponent | WorkTag::Fragment => {}
    }

    bubble_properties(arena, wip);
}

fn diff_host_component<H: HostConfig>(arena: &mut FiberArena<H>, current: FiberId, wip: FiberId) {
    let old_props = arena[current].memoized_props.clone().unwrap_or_default();
    let old_ref = arena[current].ref_handle.clone();

    let fiber = &mut arena[wip];
    if !old_props.same_attributes(&fiber.pending_props) {
        fiber.update_payload = Some(UpdatePayload::Props {
            old: old_props,
            new: fiber.pending_props.clone(),
        });
        fiber.flags.insert(Flags::UPDATE);
    }

    let ref_changed = match (&old_ref, &fiber.ref_handle) {
        (Some(old), Some(new)) => !old.ptr_eq(new),
        (None, None) => false,
        _ => true,
    };
    if ref_changed {
        fiber.flags.insert(Flags::REF);
    }
}

/// Attach the top-level host nodes below `wip` to a fresh instance
fn append_all_children<H: HostConfig>(arena: &FiberArena<H>, host: &H, parent: &H::Instance, wip: FiberId) {
    let Some(mut node) = arena[wip].child else {
        return;
    };

    loop {
        let fiber = &arena[node];
        if fiber.tag.is_host() {
            if let Some(child) = fiber.host_node() {
                if let Err(e) = host.append_initial_child(parent, child) {
                    log::error!("Failed to append {} to new <{}>: {}", fiber.type_name(), arena[wip].type_name(), e);
                }
            }
        } else if let Some(child) = fiber.child {
            node = child;
            continue;
        }

        loop {
            if let Some(sibling) = arena[node].sibling {
                node = sibling;
                break;
            }
            match arena[node].return_fiber {
                Some(parent) if parent != wip => node = parent,
                _ => return,
            }
        }
    }
}

/// Fold children's flags into `subtree_flags`
fn bubble_properties<H: HostConfig>(arena: &mut FiberArena<H>, wip: FiberId) {
    let mut subtree_flags = Flags::NO_FLAGS;
    let mut next = arena[wip].child;
    while let Some(child) = next {
        let fiber = &mut arena[child];
        subtree_flags |= fiber.subtree_flags | fiber.flags;
        fiber.return_fiber = Some(wip);
        next = fiber.sibling;
    }
    arena[wip].subtree_flags |= subtree_flags;
}
