//! Integration tests for state, effects and render failures

mod common;

use std::cell::Cell;
use std::rc::Rc;

use arbor_core::{component, host, Component, Props, Value};
use arbor_reconciler::{ReconcilerError, RootConfig};
use arbor_scheduler::YieldPolicy;
use common::{Harness, Log, Setter};

/// `<p>{count}</p>` with its setter exposed and renders counted
fn counter(setter: &Setter, renders: &Rc<Cell<usize>>) -> Component {
    let (setter, renders) = (setter.clone(), renders.clone());
    Component::new("Counter", move |_, hooks| {
        renders.set(renders.get() + 1);
        let (count, set_count) = hooks.state(0);
        setter.store(&set_count);
        host("p").child(count).into()
    })
}

fn add(n: i64) -> impl Fn(&Value) -> Value {
    move |v: &Value| Value::from(v.as_int().unwrap_or(0) + n)
}

#[test]
fn test_state_update_rerenders() {
    let (setter, renders) = (Setter::default(), Rc::new(Cell::new(0)));
    let app = counter(&setter, &renders);
    let harness = Harness::new();

    harness.render(component(&app));
    assert_eq!(harness.text(), "0");

    harness.sync(|| setter.get().set(5));
    harness.run();
    assert_eq!(harness.text(), "5");
    assert_eq!(renders.get(), 2);
}

#[test]
fn test_sync_updates_in_one_event_are_batched() {
    let (setter, renders) = (Setter::default(), Rc::new(Cell::new(0)));
    let app = counter(&setter, &renders);
    let harness = Harness::new();
    harness.render(component(&app));
    harness.mutations();

    harness.sync(|| {
        let set = setter.get();
        set.update(add(1));
        set.update(add(10));
        set.update(add(100));
    });
    harness.run();

    assert_eq!(harness.text(), "111");
    assert_eq!(renders.get(), 2);
    assert_eq!(harness.mutations().len(), 1);
}

#[test]
fn test_default_priority_update() {
    let (setter, renders) = (Setter::default(), Rc::new(Cell::new(0)));
    let app = counter(&setter, &renders);
    let harness = Harness::new();
    harness.render(component(&app));

    // Outside any event the scheduler reports normal priority
    setter.get().set(3);
    assert!(!harness.root.pending_lanes().is_empty());
    assert_eq!(harness.host.pending_microtasks(), 0);

    harness.run();
    assert_eq!(harness.text(), "3");
    assert!(harness.root.pending_lanes().is_empty());
}

#[test]
fn test_lazy_initial_state_runs_once() {
    let inits = Rc::new(Cell::new(0));
    let setter = Setter::default();
    let app = {
        let (inits, setter) = (inits.clone(), setter.clone());
        Component::new("Lazy", move |_, hooks| {
            let inits = inits.clone();
            let (value, set) = hooks.use_state_with(Box::new(move || {
                inits.set(inits.get() + 1);
                Value::from("ready")
            }));
            setter.store(&set);
            value
        })
    };
    let harness = Harness::new();

    harness.render(component(&app));
    harness.sync(|| setter.get().set("again"));
    harness.run();

    assert_eq!(harness.text(), "again");
    assert_eq!(inits.get(), 1);
}

#[test]
fn test_effects_mount_update_unmount() {
    let log = Log::default();
    let setter = Setter::default();
    let app = {
        let (log, setter) = (log.clone(), setter.clone());
        Component::new("Effects", move |_, hooks| {
            let (count, set) = hooks.state(0);
            setter.store(&set);
            let n = count.as_int().unwrap_or(0);

            let effect_log = log.clone();
            hooks.effect_with_cleanup(Some(vec![count.clone()]), move || {
                effect_log.push(format!("create {}", n));
                let cleanup_log = effect_log.clone();
                move || cleanup_log.push(format!("destroy {}", n))
            });

            let once_log = log.clone();
            hooks.effect(Some(vec![]), move || once_log.push("mounted"));
            count
        })
    };
    let harness = Harness::new();

    harness.render(component(&app));
    assert_eq!(log.take(), vec!["create 0", "mounted"]);

    harness.sync(|| setter.get().set(1));
    harness.run();
    assert_eq!(log.take(), vec!["destroy 0", "create 1"]);

    // Same deps: nothing runs
    harness.sync(|| setter.get().set(1));
    harness.run();
    assert!(log.take().is_empty());

    harness.root.unmount();
    harness.run();
    assert_eq!(log.take(), vec!["destroy 1"]);
}

#[test]
fn test_effect_without_deps_runs_every_commit() {
    let log = Log::default();
    let app = {
        let log = log.clone();
        Component::new("Always", move |props, hooks| {
            let label = props.get("label").cloned().unwrap_or_default();
            let effect_log = log.clone();
            hooks.effect(None, move || effect_log.push("effect"));
            label
        })
    };
    let harness = Harness::new();

    harness.render(component(&app).prop("label", "a"));
    harness.render(component(&app).prop("label", "b"));
    harness.render(component(&app).prop("label", "b"));
    assert_eq!(log.len(), 3);
}

#[test]
fn test_passive_effects_wait_for_flush() {
    let log = Log::default();
    let app = {
        let log = log.clone();
        Component::new("Deferred", move |_, hooks| {
            let effect_log = log.clone();
            hooks.effect(Some(vec![]), move || effect_log.push("effect"));
            Value::from("body")
        })
    };
    let harness = Harness::new();

    harness.root.render(component(&app));
    harness.host.flush_microtasks();

    // Committed but effects not yet run
    assert_eq!(harness.text(), "body");
    assert!(harness.root.has_pending_passive_effects());
    assert_eq!(log.len(), 0);

    assert!(harness.root.flush_passive_effects());
    assert_eq!(log.take(), vec!["effect"]);
    assert!(!harness.root.flush_passive_effects());
}

#[test]
fn test_unmount_destroys_run_before_update_effects() {
    let log = Log::default();
    let show = Setter::default();

    let child = {
        let log = log.clone();
        Component::new("Child", move |_, hooks| {
            let effect_log = log.clone();
            hooks.effect_with_cleanup(Some(vec![]), move || {
                effect_log.push("child create");
                let cleanup_log = effect_log.clone();
                move || cleanup_log.push("child destroy")
            });
            Value::Null
        })
    };
    let parent = {
        let (log, show, child) = (log.clone(), show.clone(), child.clone());
        Component::new("Parent", move |_, hooks| {
            let (visible, set_visible) = hooks.state(true);
            show.store(&set_visible);
            let visible = visible.as_bool().unwrap_or(false);

            let effect_log = log.clone();
            hooks.effect_with_cleanup(Some(vec![Value::from(visible)]), move || {
                effect_log.push(format!("parent create {}", visible));
                let cleanup_log = effect_log.clone();
                move || cleanup_log.push(format!("parent destroy {}", visible))
            });

            if visible {
                component(&child).into()
            } else {
                Value::Null
            }
        })
    };
    let harness = Harness::new();

    harness.render(component(&parent));
    // Children's effects run before their parent's
    assert_eq!(log.take(), vec!["child create", "parent create true"]);

    harness.sync(|| show.get().set(false));
    harness.run();
    assert_eq!(
        log.take(),
        vec!["child destroy", "parent destroy true", "parent create false"]
    );
}

#[test]
fn test_dispatch_after_unmount_is_ignored() {
    let (setter, renders) = (Setter::default(), Rc::new(Cell::new(0)));
    let app = counter(&setter, &renders);
    let harness = Harness::new();

    harness.render(component(&app));
    let stale = setter.get();
    harness.root.unmount();
    harness.run();

    harness.sync(|| stale.set(42));
    assert!(harness.root.pending_lanes().is_empty());
    assert_eq!(harness.run(), 0);
    assert_eq!(renders.get(), 1);
}

#[test]
fn test_effect_dispatch_schedules_follow_up_render() {
    let app = Component::new("Loader", |_, hooks| {
        let (status, set_status) = hooks.state("loading");
        hooks.effect(Some(vec![]), move || set_status.set("done"));
        status
    });
    let harness = Harness::new();

    harness.render(component(&app));
    assert_eq!(harness.text(), "done");
}

#[test]
fn test_extra_hook_is_reported_and_tree_kept() {
    let app = Component::new("Conditional", |props, hooks| {
        let (a, _) = hooks.state(1);
        if props.get("extra").and_then(Value::as_bool).unwrap_or(false) {
            hooks.state(2);
        }
        a
    });
    let harness = Harness::new();

    harness.render(component(&app));
    assert_eq!(harness.text(), "1");
    harness.mutations();

    harness.render(component(&app).prop("extra", true));

    assert_eq!(
        harness.root.take_errors(),
        vec![ReconcilerError::HookCountMismatch {
            component: "Conditional".to_string(),
            expected: 1,
            found: 2,
        }]
    );
    assert_eq!(harness.text(), "1");
    assert!(harness.mutations().is_empty());
    assert!(harness.root.pending_lanes().is_empty());
}

#[test]
fn test_hook_kind_change_is_reported() {
    let app = Component::new("Shifty", |props, hooks| {
        if props.get("swap").is_some() {
            hooks.effect(None, || {});
        } else {
            hooks.state(0);
        }
        Value::Null
    });
    let harness = Harness::new();

    harness.render(component(&app));
    harness.render(component(&app).prop("swap", true));

    assert_eq!(
        harness.root.take_errors(),
        vec![ReconcilerError::HookKindMismatch {
            component: "Shifty".to_string(),
            index: 0,
            expected: "use_state",
            found: "use_effect",
        }]
    );
}

/// Panics on its first `failures` renders
fn flaky(failures: usize, attempts: &Rc<Cell<usize>>) -> Component {
    let attempts = attempts.clone();
    Component::new("Flaky", move |_, _| {
        attempts.set(attempts.get() + 1);
        if attempts.get() <= failures {
            panic!("attempt {} failed", attempts.get());
        }
        Value::from("ok")
    })
}

#[test]
fn test_render_failure_is_retried() {
    let attempts = Rc::new(Cell::new(0));
    let app = flaky(1, &attempts);
    let harness = Harness::new();

    harness.render(host("div").child(component(&app)));

    assert_eq!(attempts.get(), 2);
    assert_eq!(harness.text(), "ok");
    assert!(harness.root.take_errors().is_empty());
}

#[test]
fn test_render_failure_beyond_retries_abandons_lane() {
    let attempts = Rc::new(Cell::new(0));
    let app = flaky(usize::MAX, &attempts);
    let config = RootConfig {
        max_render_retries: 2,
        ..RootConfig::default()
    };
    let harness = Harness::with_config(YieldPolicy::Never, config);

    harness.render(component(&app));

    assert_eq!(attempts.get(), 3);
    assert_eq!(harness.text(), "");
    let errors = harness.root.take_errors();
    assert_eq!(errors.len(), 1);
    assert!(matches!(
        &errors[0],
        ReconcilerError::RenderPanic { component, message } if component == "Flaky" && message == "attempt 3 failed"
    ));
    assert!(harness.root.pending_lanes().is_empty());

    // The root stays usable
    harness.render(host("p").child("recovered"));
    assert_eq!(harness.text(), "recovered");
}

#[test]
fn test_props_reach_components() {
    let greeting = Component::new("Greeting", |props: &Props, _| {
        let name = props.get("name").and_then(Value::as_str).unwrap_or("nobody");
        Value::from(format!("hello {}", name))
    });
    let harness = Harness::new();

    harness.render(component(&greeting).prop("name", "arbor"));
    assert_eq!(harness.text(), "hello arbor");

    harness.render(component(&greeting).prop("name", "again"));
    assert_eq!(harness.text(), "hello again");
}
