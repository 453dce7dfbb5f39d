//! Child reconciliation
//!
//! Computes the new child fibers of a work-in-progress fiber from its new
//! child descriptors and the previous first child. Reused fibers are
//! refreshed through their alternate, new ones are allocated, and previous
//! children that are not claimed are queued on the parent's deletion list.
//!
//! Arrays are diffed in a single left-to-right pass: a reused fiber whose
//! previous index is lower than the highest previous index already kept in
//! place (`last_placed_index`) has moved backwards and is flagged for
//! placement.

use std::collections::HashMap;
use std::rc::Rc;

use arbor_core::{Element, ElementType, HostConfig, Props, Value};

use crate::fiber::{create_work_in_progress, text_props, Fiber, FiberArena, FiberId, WorkTag};
use crate::flags::Flags;

/// Lookup key of a previous child
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum ChildKey {
    Key(String),
    Index(usize),
}

/// Reconcile the children of `return_fiber`.
///
/// With `should_track_effects` off (first mount of a subtree) no placement
/// or deletion flags are recorded.
pub(crate) fn reconcile_child_fibers<H: HostConfig>(
    arena: &mut FiberArena<H>,
    return_fiber: FiberId,
    current_first_child: Option<FiberId>,
    new_child: &Value,
    should_track_effects: bool,
) -> Option<FiberId> {
    ChildReconciler {
        arena,
        return_fiber,
        should_track_effects,
    }
    .reconcile(current_first_child, new_child)
}

struct ChildReconciler<'a, H: HostConfig> {
    arena: &'a mut FiberArena<H>,
    return_fiber: FiberId,
    should_track_effects: bool,
}

impl<'a, H: HostConfig> ChildReconciler<'a, H> {
    fn reconcile(&mut self, current_first_child: Option<FiberId>, new_child: &Value) -> Option<FiberId> {
        // An unkeyed top-level fragment is transparent
        let fragment_children = match new_child {
            Value::Element(element) if element.is_unkeyed_fragment() => {
                Some(element.children().cloned().unwrap_or_default())
            }
            _ => None,
        };
        let new_child = fragment_children.as_ref().unwrap_or(new_child);

        match new_child {
            Value::Array(items) => self.reconcile_children_array(current_first_child, items),
            Value::Element(element) => {
                let fiber = self.reconcile_single_element(current_first_child, element);
                Some(self.place_single_child(fiber))
            }
            other => match other.text_content() {
                Some(content) => {
                    let fiber = self.reconcile_single_text(current_first_child, content);
                    Some(self.place_single_child(fiber))
                }
                None => {
                    self.delete_remaining_children(current_first_child);
                    None
                }
            },
        }
    }

    fn delete_child(&mut self, child: FiberId) {
        if !self.should_track_effects {
            return;
        }
        let parent = &mut self.arena[self.return_fiber];
        parent.deletions.push(child);
        parent.flags.insert(Flags::CHILD_DELETION);
    }

    fn delete_remaining_children(&mut self, first: Option<FiberId>) {
        if !self.should_track_effects {
            return;
        }
        let mut next = first;
        while let Some(child) = next {
            next = self.arena[child].sibling;
            self.delete_child(child);
        }
    }

    /// Refresh the alternate of `fiber` as a single child with new props
    fn use_fiber(&mut self, fiber: FiberId, pending_props: Props) -> FiberId {
        let clone = create_work_in_progress(self.arena, fiber, pending_props);
        let clone_fiber = &mut self.arena[clone];
        clone_fiber.index = 0;
        clone_fiber.sibling = None;
        clone_fiber.return_fiber = Some(self.return_fiber);
        clone
    }

    fn insert_new(&mut self, mut fiber: Fiber<H>) -> FiberId {
        fiber.return_fiber = Some(self.return_fiber);
        self.arena.insert(fiber)
    }

    fn place_single_child(&mut self, fiber: FiberId) -> FiberId {
        if self.should_track_effects && self.arena[fiber].alternate.is_none() {
            self.arena[fiber].flags.insert(Flags::PLACEMENT);
        }
        fiber
    }

    fn reconcile_single_element(&mut self, current_first_child: Option<FiberId>, element: &Rc<Element>) -> FiberId {
        let mut current = current_first_child;
        while let Some(candidate) = current {
            let next = self.arena[candidate].sibling;
            let fiber = &self.arena[candidate];
            let same_key = fiber.key.as_deref() == element.key.as_deref();
            let same_type = fiber.element_type.as_ref() == Some(&element.element_type);

            if same_key && same_type {
                let existing = self.use_fiber(candidate, element.props.clone());
                self.arena[existing].ref_handle = element.ref_handle.clone();
                self.delete_remaining_children(next);
                return existing;
            }
            self.delete_child(candidate);
            current = next;
        }

        self.insert_new(Fiber::from_element(element))
    }

    fn reconcile_single_text(&mut self, current_first_child: Option<FiberId>, content: String) -> FiberId {
        let mut current = current_first_child;
        while let Some(candidate) = current {
            let next = self.arena[candidate].sibling;
            if self.arena[candidate].tag == WorkTag::HostText {
                let existing = self.use_fiber(candidate, text_props(content));
                self.delete_remaining_children(next);
                return existing;
            }
            self.delete_child(candidate);
            current = next;
        }

        self.insert_new(Fiber::from_text(content))
    }

    fn reconcile_children_array(&mut self, current_first_child: Option<FiberId>, items: &[Value]) -> Option<FiberId> {
        let mut last_placed_index = 0;
        let mut first_new: Option<FiberId> = None;
        let mut last_new: Option<FiberId> = None;

        let mut existing: HashMap<ChildKey, FiberId> = HashMap::new();
        let mut current = current_first_child;
        while let Some(fiber) = current {
            let key = match &self.arena[fiber].key {
                Some(key) => ChildKey::Key(key.clone()),
                None => ChildKey::Index(self.arena[fiber].index),
            };
            existing.insert(key, fiber);
            current = self.arena[fiber].sibling;
        }

        for (index, item) in items.iter().enumerate() {
            let Some(new_fiber) = self.update_from_map(&mut existing, index, item) else {
                continue;
            };
            {
                let fiber = &mut self.arena[new_fiber];
                fiber.index = index;
                fiber.return_fiber = Some(self.return_fiber);
            }
            match last_new {
                None => first_new = Some(new_fiber),
                Some(previous) => self.arena[previous].sibling = Some(new_fiber),
            }
            last_new = Some(new_fiber);

            if !self.should_track_effects {
                continue;
            }
            match self.arena[new_fiber].alternate {
                Some(current) => {
                    let old_index = self.arena[current].index;
                    if old_index < last_placed_index {
                        self.arena[new_fiber].flags.insert(Flags::PLACEMENT);
                    } else {
                        last_placed_index = old_index;
                    }
                }
                None => self.arena[new_fiber].flags.insert(Flags::PLACEMENT),
            }
        }

        let mut leftovers: Vec<FiberId> = existing.into_values().collect();
        leftovers.sort_by_key(|fiber| self.arena[*fiber].index);
        for fiber in leftovers {
            self.delete_child(fiber);
        }

        first_new
    }

    fn update_from_map(
        &mut self,
        existing: &mut HashMap<ChildKey, FiberId>,
        index: usize,
        item: &Value,
    ) -> Option<FiberId> {
        let key_to_use = match item {
            Value::Element(element) => match &element.key {
                Some(key) => ChildKey::Key(key.clone()),
                None => ChildKey::Index(index),
            },
            _ => ChildKey::Index(index),
        };
        let before = existing.get(&key_to_use).copied();

        if let Some(content) = item.text_content() {
            if let Some(before) = before.filter(|fiber| self.arena[*fiber].tag == WorkTag::HostText) {
                existing.remove(&key_to_use);
                return Some(self.use_fiber(before, text_props(content)));
            }
            return Some(self.insert_new(Fiber::from_text(content)));
        }

        match item {
            Value::Element(element) if element.element_type == ElementType::Fragment => {
                let children = element.children().cloned().unwrap_or_default();
                Some(self.update_fragment(existing, before, &key_to_use, children, element.key.clone()))
            }
            Value::Element(element) => {
                let same_type = before
                    .filter(|fiber| self.arena[*fiber].element_type.as_ref() == Some(&element.element_type));
                if let Some(before) = same_type {
                    existing.remove(&key_to_use);
                    let fiber = self.use_fiber(before, element.props.clone());
                    self.arena[fiber].ref_handle = element.ref_handle.clone();
                    return Some(fiber);
                }
                Some(self.insert_new(Fiber::from_element(element)))
            }
            Value::Array(_) => Some(self.update_fragment(existing, before, &key_to_use, item.clone(), None)),
            _ => None,
        }
    }

    fn update_fragment(
        &mut self,
        existing: &mut HashMap<ChildKey, FiberId>,
        before: Option<FiberId>,
        key_to_use: &ChildKey,
        children: Value,
        key: Option<String>,
    ) -> FiberId {
        if let Some(before) = before.filter(|fiber| self.arena[*fiber].tag == WorkTag::Fragment) {
            existing.remove(key_to_use);
            return self.use_fiber(before, Props::from_children(children));
        }
        self.insert_new(Fiber::from_fragment(children, key))
    }
}
