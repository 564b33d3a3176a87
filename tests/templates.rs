use serde_json::json;
use spark_bind::{App, BindError, DirectiveType, DomId, Engine, EngineConfig, UiTree};

const TODOS: &str = r#"<ul id="list"><li data-for="todo in root.todos">{{todo.title}}</li></ul>"#;

fn todos_engine(config: EngineConfig) -> Engine {
    App::from_markup(TODOS)
        .unwrap()
        .config(config)
        .state(json!({ "todos": [{ "title": "a" }, { "title": "b" }] }))
        .mount()
        .unwrap()
}

fn items(engine: &Engine) -> Vec<DomId> {
    engine.with_tree(|doc| doc.query_tag("li"))
}

fn list_text(engine: &Engine) -> String {
    engine.with_tree(|doc| doc.text_content(doc.query_id("list").unwrap()))
}

fn push_todo(engine: &Engine, title: &str) {
    let todo = engine.store().alloc_json(&json!({ "title": title }));
    engine.root().at("todos").unwrap().push(todo);
}

#[test]
fn template_element_is_replaced_by_clones() {
    let engine = todos_engine(EngineConfig::default());
    assert_eq!(items(&engine).len(), 2);
    assert_eq!(list_text(&engine), "ab");

    let loop_vars = engine.with_tree(|doc| {
        items(&engine)
            .into_iter()
            .map(|li| doc.attribute(li, "data-loop-index"))
            .collect::<Vec<_>>()
    });
    assert_eq!(loop_vars, vec![Some("0".to_string()), Some("1".to_string())]);
}

#[test]
fn append_renders_exactly_one_clone() {
    let engine = todos_engine(EngineConfig::default());
    let before = items(&engine);

    push_todo(&engine, "c");

    let after = items(&engine);
    assert_eq!(after.len(), 3);
    assert_eq!(&after[..2], &before[..]);
    assert!(!before.contains(&after[2]));
    assert_eq!(list_text(&engine), "abc");
}

#[test]
fn other_mutators_rebuild_every_clone() {
    let engine = todos_engine(EngineConfig::default());
    let before = items(&engine);

    engine.root().at("todos").unwrap().reverse();

    let after = items(&engine);
    assert_eq!(after.len(), 2);
    assert!(after.iter().all(|li| !before.contains(li)));
    assert_eq!(list_text(&engine), "ba");

    engine.root().at("todos").unwrap().pop();
    assert_eq!(list_text(&engine), "b");
}

#[test]
fn append_rebuilds_when_fast_path_is_off() {
    let config = EngineConfig {
        fast_append: false,
        ..EngineConfig::default()
    };
    let engine = todos_engine(config);
    let before = items(&engine);

    push_todo(&engine, "c");

    let after = items(&engine);
    assert_eq!(after.len(), 3);
    assert!(after.iter().all(|li| !before.contains(li)));
}

#[test]
fn rebuild_prunes_records_of_discarded_clones() {
    let engine = todos_engine(EngineConfig::default());
    // template + one interpolation per clone
    assert_eq!(engine.registry_len(), 3);

    engine.root().at("todos").unwrap().shift();
    assert_eq!(engine.registry_len(), 2);

    engine
        .root()
        .set_json("todos", json!([{ "title": "x" }, { "title": "y" }, { "title": "z" }]));
    assert_eq!(engine.registry_len(), 4);
    assert_eq!(list_text(&engine), "xyz");
}

#[test]
fn item_writes_patch_in_place() {
    let engine = todos_engine(EngineConfig::default());
    let before = items(&engine);

    let first = engine.root().at("todos").unwrap().at(0).unwrap();
    first.set("title", "A");

    assert_eq!(items(&engine), before);
    assert_eq!(list_text(&engine), "Ab");
}

#[test]
fn clones_keep_attributes_and_suffix_ids() {
    let engine = App::from_markup(
        r#"<div><p id="row" class="row" data-for="n in root.nums"><b id="num">{{n}}</b></p></div>"#,
    )
    .unwrap()
    .state(json!({ "nums": [5, 6] }))
    .mount()
    .unwrap();

    engine.with_tree(|doc| {
        assert!(doc.query_id("row").is_none());
        let first = doc.query_id("row-0").unwrap();
        assert_eq!(doc.attribute(first, "class").as_deref(), Some("row"));
        assert_eq!(doc.attribute(first, "data-for"), None);
        assert_eq!(doc.text_content(doc.query_id("num-1").unwrap()), "6");
    });
}

#[test]
fn nested_templates_render_in_the_same_cycle() {
    let markup = r#"<div id="grid"><div data-for="row in root.rows"><span data-for="cell in row.cells">{{cell}}</span></div></div>"#;
    let engine = App::from_markup(markup)
        .unwrap()
        .state(json!({ "rows": [{ "cells": [1, 2] }, { "cells": [3] }] }))
        .mount()
        .unwrap();
    let grid_text = |engine: &Engine| engine.with_tree(|doc| doc.text_content(doc.query_id("grid").unwrap()));
    assert_eq!(grid_text(&engine), "123");

    let cells = engine
        .root()
        .at("rows")
        .unwrap()
        .at(1)
        .unwrap()
        .at("cells")
        .unwrap();
    cells.push(4);
    assert_eq!(grid_text(&engine), "1234");

    engine.root().set_json("rows", json!([{ "cells": [9] }]));
    assert_eq!(grid_text(&engine), "9");

    let fresh = App::from_markup(markup)
        .unwrap()
        .state(json!({ "rows": [{ "cells": [9] }] }))
        .mount()
        .unwrap();
    assert_eq!(engine.registry_len(), fresh.registry_len());
    assert_eq!(engine.records(DirectiveType::Template).len(), 2);
}

#[test]
fn computed_sources_rerender_when_invalidated() {
    let engine = App::from_markup(r#"<ul id="list"><li data-for="t in visible">{{t}}</li></ul>"#)
        .unwrap()
        .state(json!({ "all": ["a", "b", "c"], "some": ["a"], "show_all": false }))
        .computed("visible", |root| {
            if root.get("show_all").is_truthy() {
                root.get("all")
            } else {
                root.get("some")
            }
        })
        .mount()
        .unwrap();
    assert_eq!(list_text(&engine), "a");

    engine.root().set("show_all", true);
    assert_eq!(list_text(&engine), "abc");
    assert!(engine.computed("visible").and_then(|v| v.as_node()).is_some());

    engine.root().at("all").unwrap().push("d");
    assert_eq!(list_text(&engine), "abcd");
}

#[test]
fn non_list_source_renders_nothing() {
    let engine = App::from_markup(TODOS)
        .unwrap()
        .state(json!({ "todos": "not a list" }))
        .mount()
        .unwrap();
    assert!(items(&engine).is_empty());

    engine.root().set_json("todos", json!([{ "title": "late" }]));
    assert_eq!(list_text(&engine), "late");
    assert!(engine.diagnostics().is_empty());
}

#[test]
fn rebuilds_drop_conditions_synthesized_for_old_clones() {
    let engine = App::from_markup(
        r#"<ul id="list"><li data-for="t in root.todos"><span data-show="root.flag">{{t.title}}</span></li></ul>"#,
    )
    .unwrap()
    .state(json!({ "todos": [{ "title": "a" }, { "title": "b" }], "flag": true }))
    .mount()
    .unwrap();
    assert_eq!(engine.computed_names().len(), 2);

    let todos = engine.root().at("todos").unwrap();
    for _ in 0..3 {
        todos.reverse();
    }
    assert_eq!(engine.computed_names().len(), 2);
    assert_eq!(list_text(&engine), "ba");

    engine.root().set("flag", false);
    let hidden = engine.with_tree(|doc| {
        doc.query_tag("span")
            .into_iter()
            .all(|s| doc.style(s, "display").as_deref() == Some("none"))
    });
    assert!(hidden);
}

#[test]
fn rebuilds_remove_placeholders_of_hidden_clones() {
    let engine = App::from_markup(
        r#"<ul id="list"><li data-for="t in root.todos" data-if="t.done">{{t.title}}</li></ul>"#,
    )
    .unwrap()
    .state(json!({ "todos": [{ "title": "a", "done": false }, { "title": "b", "done": false }] }))
    .mount()
    .unwrap();
    let child_count =
        |engine: &Engine| engine.with_tree(|doc| doc.children(doc.query_id("list").unwrap()).len());
    // anchor plus one placeholder per hidden clone
    assert_eq!(child_count(&engine), 3);
    assert_eq!(list_text(&engine), "");

    let todos = engine.root().at("todos").unwrap();
    for _ in 0..3 {
        todos.reverse();
    }
    assert_eq!(child_count(&engine), 3);

    todos.at(0).unwrap().set("done", true);
    assert_eq!(child_count(&engine), 3);
    assert_eq!(list_text(&engine), "b");
}

#[test]
fn object_source_outside_a_loop_is_reported() {
    let engine = App::from_markup(r#"<ul id="list"><li data-for="cell in row.cells">{{cell}}</li></ul>"#)
        .unwrap()
        .state(json!({ "row": { "cells": [1, 2] } }))
        .mount()
        .unwrap();
    assert!(items(&engine).is_empty());
    assert_eq!(list_text(&engine), "");
    assert!(engine.records(DirectiveType::Template).is_empty());
    assert!(matches!(
        engine.diagnostics().as_slice(),
        [BindError::InvalidExpression { .. }]
    ));
}
