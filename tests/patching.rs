use std::cell::RefCell;
use std::rc::Rc;

use serde_json::json;
use spark_bind::{cloned, App, BindError, DomId, Engine, MethodCall, UiTree, Value, Verb};

fn mount(markup: &str, state: serde_json::Value) -> Engine {
    App::from_markup(markup).unwrap().state(state).mount().unwrap()
}

fn el(engine: &Engine, id: &str) -> DomId {
    engine.with_tree(|doc| doc.query_id(id).unwrap())
}

fn text(engine: &Engine, id: &str) -> String {
    engine.with_tree(|doc| doc.text_content(doc.query_id(id).unwrap()))
}

// =============================================================================
// TWO-WAY BINDINGS
// =============================================================================

#[test]
fn two_way_round_trip() {
    let engine = mount(
        r#"<input id="name" data-bind="root.user.name"><p id="out">Hi {{root.user.name}}</p>"#,
        json!({ "user": { "name": "Ann" } }),
    );
    let input = el(&engine, "name");
    assert_eq!(engine.with_tree(|doc| doc.value(input)), "Ann");
    assert_eq!(text(&engine, "out"), "Hi Ann");

    assert!(engine.input(input, "abc"));
    let user = engine.root().at("user").unwrap();
    assert_eq!(user.get("name"), Value::from("abc"));
    assert_eq!(text(&engine, "out"), "Hi abc");

    user.set("name", "xyz");
    assert_eq!(engine.with_tree(|doc| doc.value(input)), "xyz");
    assert!(engine.with_tree(|doc| doc.is_listening(input, spark_bind::EventKind::Input)));
}

#[test]
fn replacing_an_ancestor_rebinds_the_control() {
    let engine = mount(
        r#"<input id="name" data-bind="root.user.name">"#,
        json!({ "user": { "name": "Ann" } }),
    );
    let input = el(&engine, "name");

    engine.root().set_json("user", json!({ "name": "Zed" }));
    assert_eq!(engine.with_tree(|doc| doc.value(input)), "Zed");

    // Writes go to the new object
    engine.input(input, "Max");
    assert_eq!(engine.root().at("user").unwrap().get("name"), Value::from("Max"));
}

#[test]
fn checkbox_and_radio_controls() {
    let engine = mount(
        r#"<input id="done" type="checkbox" data-bind="root.done">
           <input id="s" type="radio" value="s" data-bind="root.size">
           <input id="m" type="radio" value="m" data-bind="root.size">"#,
        json!({ "done": false, "size": "m" }),
    );
    let (done, small, medium) = (el(&engine, "done"), el(&engine, "s"), el(&engine, "m"));
    assert!(!engine.with_tree(|doc| doc.checked(done)));
    assert!(engine.with_tree(|doc| !doc.checked(small) && doc.checked(medium)));

    assert!(engine.toggle(done, true));
    assert_eq!(engine.root().get("done"), Value::Bool(true));

    assert!(engine.toggle(small, true));
    assert_eq!(engine.root().get("size"), Value::from("s"));
    assert!(engine.with_tree(|doc| doc.checked(small) && !doc.checked(medium)));

    engine.root().set("size", "m");
    assert!(engine.with_tree(|doc| !doc.checked(small) && doc.checked(medium)));
}

#[test]
fn bind_handler_translates_both_ways() {
    let verbs = Rc::new(RefCell::new(Vec::new()));
    let engine = App::from_markup(r#"<input id="t" data-bind="root.temp" data-bind-handler="celsius">"#)
        .unwrap()
        .state(json!({ "temp": 20 }))
        .method(
            "celsius",
            cloned!(verbs => move |call: &mut MethodCall<'_>| {
                verbs.borrow_mut().push(call.verb);
                match call.verb {
                    Verb::SetUi => {
                        let text = format!("{} C", call.value.to_text());
                        if let Some(ui) = call.ui.as_deref_mut() {
                            ui.set_value(call.element, &text);
                        }
                        None
                    }
                    Verb::ReadUi => call
                        .value
                        .to_text()
                        .trim_end_matches(" C")
                        .parse::<f64>()
                        .ok()
                        .map(Value::Number),
                    Verb::Click => None,
                }
            }),
        )
        .mount()
        .unwrap();
    let input = el(&engine, "t");
    assert_eq!(engine.with_tree(|doc| doc.value(input)), "20 C");

    assert!(engine.input(input, "25 C"));
    assert_eq!(engine.root().get("temp"), Value::from(25));
    assert_eq!(engine.with_tree(|doc| doc.value(input)), "25 C");
    assert_eq!(*verbs.borrow(), vec![Verb::SetUi, Verb::ReadUi, Verb::SetUi]);
}

// =============================================================================
// CONDITIONALS
// =============================================================================

#[test]
fn if_reinserts_at_the_same_position() {
    let engine = mount(
        r#"<div id="box"><p id="a">A</p><p id="b" data-if="root.on">B</p><p id="c">C</p></div>"#,
        json!({ "on": true }),
    );
    let (a, b, c) = (el(&engine, "a"), el(&engine, "b"), el(&engine, "c"));
    let box_el = el(&engine, "box");
    assert_eq!(text(&engine, "box"), "ABC");

    engine.root().set("on", false);
    assert_eq!(text(&engine, "box"), "AC");
    assert!(engine.with_tree(|doc| doc.parent(b).is_none()));

    engine.root().set("on", true);
    assert_eq!(text(&engine, "box"), "ABC");
    assert_eq!(engine.with_tree(|doc| doc.children(box_el)), vec![a, b, c]);
}

#[test]
fn hide_show_and_class_if() {
    let engine = App::from_markup(
        r#"<p id="h" data-hide="root.count > 2">h</p>
           <p id="s" data-show="busy">s</p>
           <p id="k" class="base" data-class-if="warn, bold : root.count >= 3">k</p>"#,
    )
    .unwrap()
    .state(json!({ "count": 1 }))
    .computed("busy", |root| Value::Bool(root.get("count").as_f64().unwrap_or_default() > 1.0))
    .mount()
    .unwrap();
    let (h, s, k) = (el(&engine, "h"), el(&engine, "s"), el(&engine, "k"));
    engine.with_tree(|doc| {
        assert_eq!(doc.style(h, "display"), None);
        assert_eq!(doc.style(s, "display").as_deref(), Some("none"));
        assert!(!doc.has_class(k, "warn"));
    });

    engine.root().set("count", 3);
    engine.with_tree(|doc| {
        assert_eq!(doc.style(h, "display").as_deref(), Some("none"));
        assert_eq!(doc.style(s, "display"), None);
        assert!(doc.has_class(k, "warn") && doc.has_class(k, "bold") && doc.has_class(k, "base"));
    });

    engine.root().set("count", 0);
    engine.with_tree(|doc| {
        assert_eq!(doc.style(h, "display"), None);
        assert!(!doc.has_class(k, "bold"));
        assert!(doc.has_class(k, "base"));
    });
}

#[test]
fn object_relative_conditions_follow_their_item() {
    let engine = mount(
        r#"<ul><li data-for="todo in root.todos"><span data-hide="todo.done">{{todo.title}}</span></li></ul>"#,
        json!({ "todos": [{ "title": "a", "done": false }, { "title": "b", "done": true }] }),
    );
    let spans = engine.with_tree(|doc| doc.query_tag("span"));
    let hidden = |engine: &Engine| {
        engine.with_tree(|doc| {
            spans
                .iter()
                .map(|&s| doc.style(s, "display").is_some())
                .collect::<Vec<_>>()
        })
    };
    assert_eq!(hidden(&engine), vec![false, true]);

    let first = engine.root().at("todos").unwrap().at(0).unwrap();
    first.set("done", true);
    assert_eq!(hidden(&engine), vec![true, true]);
}

// =============================================================================
// ATTRIBUTE SETTERS
// =============================================================================

#[test]
fn class_src_and_href_setters() {
    let engine = mount(
        r#"<p id="p" class="base" data-class="root.theme">p</p>
           <img id="i" data-src="root.img">
           <a id="l" data-href="root.link">l</a>"#,
        json!({ "theme": "dark, wide", "img": "a.png", "link": "/home" }),
    );
    let (p, i, l) = (el(&engine, "p"), el(&engine, "i"), el(&engine, "l"));
    engine.with_tree(|doc| {
        assert!(doc.has_class(p, "dark") && doc.has_class(p, "wide") && doc.has_class(p, "base"));
        assert_eq!(doc.attribute(i, "src").as_deref(), Some("a.png"));
        assert_eq!(doc.attribute(l, "href").as_deref(), Some("/home"));
    });

    engine.root().set("theme", "light");
    engine.root().set("img", "b.png");
    engine.with_tree(|doc| {
        assert!(!doc.has_class(p, "dark") && !doc.has_class(p, "wide"));
        assert!(doc.has_class(p, "light") && doc.has_class(p, "base"));
        assert_eq!(doc.attribute(i, "src").as_deref(), Some("b.png"));
    });
}

#[test]
fn interpolation_of_objects_and_missing_values() {
    let engine = mount(
        r#"<p id="p">{{root.tags}} / {{root.missing}}!</p>"#,
        json!({ "tags": ["a", "b"] }),
    );
    assert_eq!(text(&engine, "p"), r#"["a","b"] / !"#);

    engine.root().set("missing", "here");
    assert_eq!(text(&engine, "p"), r#"["a","b"] / here!"#);
}

// =============================================================================
// DIAGNOSTICS
// =============================================================================

#[test]
fn bad_directives_are_reported_and_skipped() {
    let _ = tracing_subscriber::fmt::try_init();
    let engine = mount(
        r#"<input id="bad" data-bind="root.f()"><button id="go" data-click="nowhere()">x</button><p id="ok">{{root.n}}</p>"#,
        json!({ "n": 1 }),
    );
    assert_eq!(text(&engine, "ok"), "1");
    assert!(matches!(
        engine.diagnostics().first(),
        Some(BindError::InvalidExpression { .. })
    ));

    assert!(!engine.click(el(&engine, "go")));
    assert_eq!(
        engine.diagnostics().last(),
        Some(&BindError::UnknownMethod("nowhere".into()))
    );
    assert!(!engine.input(el(&engine, "bad"), "x"));
}

#[test]
fn clicks_inside_a_list_mutate_it() {
    let engine = App::from_markup(
        r#"<ul id="list"><li data-for="t in root.todos">{{t.title}}<button data-click="remove()">x</button></li></ul>
           <button id="add" data-click="add('new')">+</button>"#,
    )
    .unwrap()
    .state(json!({ "todos": [{ "title": "a" }, { "title": "b" }] }))
    .method("add", |call| {
        let title = call.args.first().cloned().unwrap_or_default();
        let store = call.root.store();
        let todo = store.alloc_json(&json!({ "title": title.to_text() }));
        call.root.at("todos")?.push(todo);
        None
    })
    .method("remove", |call| {
        let todos = call.root.at("todos")?;
        let index = todos.items().iter().position(|t| *t == call.bound)?;
        todos.splice(index as i64, 1, Vec::new());
        None
    })
    .mount()
    .unwrap();

    engine.click(el(&engine, "add"));
    assert_eq!(text(&engine, "list"), "axbxnewx");

    let second = engine.with_tree(|doc| doc.query_tag("button")[1]);
    assert!(engine.click(second));
    assert_eq!(text(&engine, "list"), "axnewx");
}
