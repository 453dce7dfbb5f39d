//! Integration tests for mounting, updating and removing host trees

mod common;

use std::collections::HashMap;

use arbor_core::prelude::*;
use arbor_noop::{HostOp, NoopNode};
use common::Harness;
use serde_json::json;

fn list(keys: &[&str]) -> ElementBuilder {
    host("ul").children(keys.iter().map(|key| host("li").key(*key).child(*key)))
}

/// Ids of the `<li>` nodes by their text
fn item_ids(harness: &Harness) -> HashMap<String, u32> {
    let ul = &harness.root.container().children()[0];
    ul.children().iter().map(|li| (li.text_content(), li.id())).collect()
}

fn item_order(harness: &Harness) -> Vec<String> {
    let ul = &harness.root.container().children()[0];
    ul.children().iter().map(NoopNode::text_content).collect()
}

#[test]
fn test_initial_mount_attaches_once() {
    let harness = Harness::new();
    harness.root.render(host("div").prop("id", "main").child(host("span").child("hello")).child("text"));

    // Nothing reaches the host before the sync work runs
    assert_eq!(harness.json(), json!([]));
    harness.run();

    assert_eq!(
        harness.json(),
        json!([{
            "type": "div",
            "props": { "id": "main" },
            "children": [
                { "type": "span", "props": {}, "children": [{ "text": "hello" }] },
                { "text": "text" }
            ]
        }])
    );

    let mutations = harness.mutations();
    assert_eq!(mutations.len(), 1);
    assert!(matches!(mutations[0], HostOp::Append { parent, .. } if parent == harness.root.container().id()));
}

#[test]
fn test_update_touches_only_changes() {
    let harness = Harness::new();
    harness.render(host("div").prop("id", "main").child(host("span").child("hello")).child("text"));
    harness.mutations();

    harness.render(host("div").prop("id", "other").child(host("span").child("bye")).child("text"));

    let div = &harness.root.container().children()[0];
    let span_text = &div.children()[0].children()[0];
    assert_eq!(
        harness.mutations(),
        vec![
            HostOp::UpdateText {
                id: span_text.id(),
                text: "bye".to_string(),
            },
            HostOp::UpdateProps {
                id: div.id(),
                changed: vec!["id".to_string()],
            },
        ]
    );
    assert_eq!(harness.text(), "byetext");
}

#[test]
fn test_identical_render_is_silent() {
    let harness = Harness::new();
    harness.render(list(&["a", "b"]));
    harness.mutations();

    harness.render(list(&["a", "b"]));
    assert!(harness.mutations().is_empty());
}

#[test]
fn test_keyed_rotation_moves_two_nodes() {
    let harness = Harness::new();
    harness.render(list(&["a", "b", "c"]));
    let ids = item_ids(&harness);
    let ul = harness.root.container().children()[0].id();
    harness.mutations();

    harness.render(list(&["c", "a", "b"]));

    assert_eq!(item_order(&harness), vec!["c", "a", "b"]);
    assert_eq!(
        harness.mutations(),
        vec![
            HostOp::Append { parent: ul, child: ids["a"] },
            HostOp::Append { parent: ul, child: ids["b"] },
        ]
    );
    // Same host nodes, only moved
    assert_eq!(item_ids(&harness), ids);
}

#[test]
fn test_keyed_rotation_moves_one_node() {
    let harness = Harness::new();
    harness.render(list(&["a", "b", "c"]));
    let ids = item_ids(&harness);
    let ul = harness.root.container().children()[0].id();
    harness.mutations();

    harness.render(list(&["b", "c", "a"]));

    assert_eq!(item_order(&harness), vec!["b", "c", "a"]);
    assert_eq!(harness.mutations(), vec![HostOp::Append { parent: ul, child: ids["a"] }]);
}

#[test]
fn test_new_key_is_inserted_before_next_sibling() {
    let harness = Harness::new();
    harness.render(list(&["a", "b"]));
    let ids = item_ids(&harness);
    harness.mutations();

    harness.render(list(&["a", "x", "b"]));

    assert_eq!(item_order(&harness), vec!["a", "x", "b"]);
    let inserted = item_ids(&harness)["x"];
    let mutations = harness.mutations();
    assert_eq!(mutations.len(), 1);
    assert!(matches!(
        mutations[0],
        HostOp::Insert { child, before, .. } if child == inserted && before == ids["b"]
    ));
}

#[test]
fn test_removed_key_is_removed() {
    let harness = Harness::new();
    harness.render(list(&["a", "b", "c"]));
    let ids = item_ids(&harness);
    let ul = harness.root.container().children()[0].id();
    harness.mutations();

    harness.render(list(&["a", "c"]));

    assert_eq!(item_order(&harness), vec!["a", "c"]);
    assert_eq!(harness.mutations(), vec![HostOp::Remove { parent: ul, child: ids["b"] }]);
}

#[test]
fn test_type_change_replaces_node() {
    let harness = Harness::new();
    harness.render(host("div").child(host("p").child("x")));
    harness.mutations();

    harness.render(host("div").child(host("section").child("x")));

    let mutations = harness.mutations();
    assert_eq!(mutations.len(), 2);
    assert!(matches!(mutations[0], HostOp::Append { .. }));
    assert!(matches!(mutations[1], HostOp::Remove { .. }));
    assert_eq!(harness.json()[0]["children"][0]["type"], "section");
}

#[test]
fn test_deleted_component_removes_host_nodes_in_order() {
    let items = Component::new("Items", |_, _| {
        Value::from(fragment([
            host("p").child(host("b").child("1")),
            host("p").child("2"),
            host("p").child("3"),
        ]))
    });

    let harness = Harness::new();
    harness.render(host("div").child(component(&items)).child(host("footer")));
    let div = harness.root.container().children()[0].clone();
    let paragraphs: Vec<u32> = div.children().iter().take(3).map(NoopNode::id).collect();
    harness.mutations();

    harness.render(host("div").child(Value::Null).child(host("footer")));

    let removed: Vec<u32> = harness
        .mutations()
        .into_iter()
        .map(|op| match op {
            HostOp::Remove { parent, child } => {
                assert_eq!(parent, div.id());
                child
            }
            other => panic!("unexpected {:?}", other),
        })
        .collect();
    assert_eq!(removed, paragraphs);
    assert_eq!(harness.json(), json!([{ "type": "div", "props": {}, "children": [{ "type": "footer", "props": {}, "children": [] }] }]));
}

#[test]
fn test_component_children_are_placed_before_host_sibling() {
    let pair = Component::new("Pair", |_, _| Value::from(fragment(["x", "y"])));

    let harness = Harness::new();
    harness.render(host("div").child(host("footer").key("f")));
    let footer = harness.root.container().children()[0].children()[0].id();
    harness.mutations();

    harness.render(host("div").children([Value::from(component(&pair)), Value::from(host("footer").key("f"))]));

    let mutations = harness.mutations();
    assert_eq!(mutations.len(), 2);
    assert!(mutations
        .iter()
        .all(|op| matches!(op, HostOp::Insert { before, .. } if *before == footer)));

    let div = &harness.root.container().children()[0];
    assert_eq!(div.text_content(), "xy");
    assert_eq!(div.children().last().and_then(|n| n.tag().map(str::to_string)), Some("footer".to_string()));
}

#[test]
fn test_render_null_empties_container() {
    let harness = Harness::new();
    harness.render(list(&["a"]));
    harness.render(Value::Null);

    assert_eq!(harness.json(), json!([]));
    assert!(harness.root.pending_lanes().is_empty());
}

#[test]
fn test_unmount() {
    let harness = Harness::new();
    harness.render(host("p").child("hi"));
    harness.root.unmount();
    harness.run();
    assert_eq!(harness.text(), "");
}

#[test]
fn test_text_children_of_all_kinds() {
    let harness = Harness::new();
    harness.render(host("p").children([Value::from("n = "), Value::from(4), Value::from(true), Value::Null]));
    assert_eq!(harness.text(), "n = 4");
}

#[test]
fn test_ref_attaches_and_detaches() {
    let input = RefHandle::new();
    let harness = Harness::new();

    harness.render(host("form").child(host("input").ref_handle(&input)));
    let attached = input.get::<NoopNode>().expect("ref attached after commit");
    assert_eq!(attached.tag(), Some("input"));
    assert_eq!(attached.id(), harness.root.container().children()[0].children()[0].id());

    harness.render(host("form"));
    assert!(!input.is_attached());
}

#[test]
fn test_ref_moves_to_new_handle() {
    let first = RefHandle::new();
    let second = RefHandle::new();
    let harness = Harness::new();

    harness.render(host("input").ref_handle(&first));
    assert!(first.is_attached());

    harness.render(host("input").ref_handle(&second));
    assert!(!first.is_attached());
    assert!(second.is_attached());
}

#[test]
fn test_fiber_count_is_stable_across_updates() {
    let harness = Harness::new();
    harness.render(list(&["a", "b", "c"]));
    harness.render(list(&["a", "b", "c"]));
    let steady = harness.root.fiber_count();

    for _ in 0..5 {
        harness.render(list(&["c", "b", "a"]));
        harness.render(list(&["a", "b", "c"]));
    }
    assert_eq!(harness.root.fiber_count(), steady);

    harness.render(list(&["a"]));
    assert!(harness.root.fiber_count() < steady);
}
