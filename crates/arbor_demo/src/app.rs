//! Todo list used by the demo

use std::cell::RefCell;
use std::rc::Rc;

use arbor_core::prelude::*;

/// Handle the demo uses to poke the mounted list from outside
#[derive(Clone, Default)]
pub struct Controls {
    items: Rc<RefCell<Option<Dispatch>>>,
}

impl Controls {
    fn bind(&self, dispatch: &Dispatch) {
        *self.items.borrow_mut() = Some(dispatch.clone());
    }

    fn update_items(&self, f: impl Fn(&mut Vec<Value>) + 'static) {
        let Some(dispatch) = self.items.borrow().clone() else {
            log::warn!("Todo list is not mounted");
            return;
        };
        dispatch.update(move |items| {
            let mut list = items.as_array().map(<[Value]>::to_vec).unwrap_or_default();
            f(&mut list);
            Value::from(list)
        });
    }

    /// Append an open item
    pub fn add(&self, title: &str) {
        let title = title.to_string();
        self.update_items(move |list| list.push(item(&title, false)));
    }

    /// Flip the done flag of the item with this title
    pub fn toggle(&self, title: &str) {
        let title = title.to_string();
        self.update_items(move |list| {
            for entry in list.iter_mut() {
                if entry.get("title").and_then(Value::as_str) == Some(title.as_str()) {
                    let done = entry.get("done").and_then(Value::as_bool).unwrap_or(false);
                    *entry = item(&title, !done);
                }
            }
        });
    }

    pub fn reverse(&self) {
        self.update_items(|list| list.reverse());
    }
}

fn item(title: &str, done: bool) -> Value {
    [("title", Value::from(title)), ("done", Value::from(done))]
        .into_iter()
        .collect()
}

fn todo_item() -> Component {
    Component::new("TodoItem", |props, _| {
        let title = props.get("title").cloned().unwrap_or_default();
        let done = props.get("done").and_then(Value::as_bool).unwrap_or(false);
        host("li")
            .prop("class", if done { "done" } else { "open" })
            .child(title)
            .into()
    })
}

fn summary() -> Component {
    Component::new("Summary", |props, _| {
        let open = props.get("open").and_then(Value::as_int).unwrap_or(0);
        host("footer").child(format!("{} open", open)).into()
    })
}

/// Root component of the demo
pub fn todo_app(controls: &Controls) -> Component {
    let controls = controls.clone();
    let (todo_item, summary) = (todo_item(), summary());

    Component::new("TodoApp", move |_, hooks| {
        let (items, set_items) = hooks.use_state_with(Box::new(|| {
            Value::from(vec![item("read", true), item("write", false), item("ship", false)])
        }));
        controls.bind(&set_items);

        let list = items.as_array().map(<[Value]>::to_vec).unwrap_or_default();
        let open = list
            .iter()
            .filter(|entry| entry.get("done").and_then(Value::as_bool) != Some(true))
            .count();

        let total = list.len();
        hooks.effect(Some(vec![Value::from(total)]), move || {
            log::info!("Todo list now holds {} items", total);
        });

        let rows = list.iter().map(|entry| {
            let title = entry.get("title").and_then(Value::as_str).unwrap_or_default();
            component(&todo_item)
                .key(title)
                .prop("title", title)
                .prop("done", entry.get("done").cloned().unwrap_or_default())
        });

        host("section")
            .child(host("h1").child("Todos"))
            .child(host("ul").children(rows))
            .child(component(&summary).prop("open", open))
            .into()
    })
}
