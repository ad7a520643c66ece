//! Integration tests for the data-state hook

mod common;

use std::rc::Rc;

use common::{init_tracing, Captured, Counter};
use hearth_core::{Identified, RecordOf, RecordSet, StateChange, StateKey, WithState};
use hearth_runtime::node::{component, el, text, ComponentNode};
use hearth_runtime::{Cx, DataStateSetter, Runtime};
use pretty_assertions::assert_eq;
use serde::{Deserialize, Serialize};
use serde_json::json;

const SELECTION: StateKey = StateKey::new("S");

#[derive(Clone, Debug, PartialEq, Serialize)]
struct Row {
    id: String,
    name: String,
}

impl Identified for Row {
    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
struct Selection {
    x: i32,
}

fn row(id: &str, name: &str) -> Row {
    Row {
        id: id.into(),
        name: name.into(),
    }
}

type Composed = Vec<WithState<Row, Selection>>;

struct Probe {
    renders: Counter,
    composed: Captured<Composed>,
    setter: Captured<DataStateSetter<Selection>>,
    records: Captured<Rc<RecordSet<Selection>>>,
}

impl Probe {
    fn new() -> Self {
        Self {
            renders: Counter::default(),
            composed: Captured::default(),
            setter: Captured::default(),
            records: Captured::default(),
        }
    }

    fn view(&self, rows: Vec<Row>, base: Vec<RecordOf<Selection>>) -> ComponentNode {
        let renders = self.renders.clone();
        let composed_slot = self.composed.clone();
        let setter_slot = self.setter.clone();
        let records_slot = self.records.clone();
        component("rows", move |cx: &mut Cx<'_>| {
            renders.bump();
            let (composed, setter, records) =
                cx.use_data_state(&rows, &base, SELECTION, |state: Selection, _: &Row| state);

            let items: Vec<_> = composed
                .iter()
                .map(|item| el("li").child(text(format!("{}={}", item.name, item.state().x))))
                .collect();

            composed_slot.set(composed);
            setter_slot.set(setter);
            records_slot.set(records);
            Ok(el("ul").children(items).into())
        })
    }
}

#[test]
fn test_set_upserts_and_rerenders() {
    init_tracing();

    let probe = Probe::new();
    let runtime = Runtime::new();
    let root = runtime
        .mount(probe.view(
            vec![row("a", "Foo"), row("b", "Bar")],
            vec![RecordOf::new("a", Selection { x: 1 })],
        ))
        .unwrap();
    assert_eq!(
        runtime.html(root).as_deref(),
        Some("<ul><li>Foo=1</li><li>Bar=0</li></ul>")
    );

    let setter = probe.setter.get();
    setter.merge("a", |s: &mut Selection| s.x = 2);
    assert_eq!(probe.renders.get(), 2);
    assert_eq!(
        probe.records.get().to_records(),
        vec![RecordOf::new("a", Selection { x: 2 })]
    );

    setter.set("b", StateChange::update(|_: Selection| Selection { x: 9 }));
    assert_eq!(
        probe.records.get().to_records(),
        vec![
            RecordOf::new("a", Selection { x: 2 }),
            RecordOf::new("b", Selection { x: 9 }),
        ]
    );
    assert_eq!(
        runtime.html(root).as_deref(),
        Some("<ul><li>Foo=2</li><li>Bar=9</li></ul>")
    );
}

#[test]
fn test_composite_carries_state_under_key() {
    init_tracing();

    let probe = Probe::new();
    let runtime = Runtime::new();
    runtime
        .mount(probe.view(
            vec![row("a", "Foo")],
            vec![RecordOf::new("a", Selection { x: 2 })],
        ))
        .unwrap();

    let composed = probe.composed.get();
    assert_eq!(
        serde_json::to_value(&composed[0]).unwrap(),
        json!({ "id": "a", "name": "Foo", "S": { "x": 2 } })
    );
}

#[test]
fn test_setter_is_stable_and_edits_survive_rerender() {
    init_tracing();

    let probe = Probe::new();
    let rows = vec![row("a", "Foo")];
    let runtime = Runtime::new();
    let root = runtime.mount(probe.view(rows.clone(), Vec::new())).unwrap();

    let setter = probe.setter.get();
    setter.update(&rows[0], |s: Selection| Selection { x: s.x + 5 });

    // parent re-renders with the same base
    runtime.set_root(root, probe.view(rows.clone(), Vec::new())).unwrap();
    assert!(setter.ptr_eq(&probe.setter.get()));
    assert_eq!(probe.composed.get()[0].state().x, 5);
    assert_eq!(runtime.html(root).as_deref(), Some("<ul><li>Foo=5</li></ul>"));
}

#[test]
fn test_changed_base_is_adopted() {
    init_tracing();

    let probe = Probe::new();
    let rows = vec![row("a", "Foo")];
    let base = vec![RecordOf::new("a", Selection { x: 1 })];
    let runtime = Runtime::new();
    let root = runtime.mount(probe.view(rows.clone(), base.clone())).unwrap();
    let held = probe.records.get();

    runtime.set_root(root, probe.view(rows.clone(), base)).unwrap();
    assert!(Rc::ptr_eq(&held, &probe.records.get()));

    runtime
        .set_root(
            root,
            probe.view(rows, vec![RecordOf::new("a", Selection { x: 4 })]),
        )
        .unwrap();
    assert!(!Rc::ptr_eq(&held, &probe.records.get()));
    assert_eq!(runtime.html(root).as_deref(), Some("<ul><li>Foo=4</li></ul>"));
}

#[test]
fn test_single_item_form() {
    init_tracing();

    let composed: Captured<WithState<Row, Selection>> = Captured::default();
    let view = {
        let composed = composed.clone();
        let item = row("a", "Foo");
        component("row", move |cx: &mut Cx<'_>| {
            let (one, _, _) = cx.use_data_state_one(
                &item,
                &[],
                SELECTION,
                |state: Selection, row: &Row| Selection {
                    x: state.x + row.name.len() as i32,
                },
            );
            composed.set(one);
            Ok(el("div").into())
        })
    };

    let runtime = Runtime::new();
    runtime.mount(view).unwrap();

    let one = composed.get();
    assert_eq!(one.name, "Foo");
    assert_eq!(one.state(), &Selection { x: 3 });
}
