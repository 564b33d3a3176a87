use std::cell::RefCell;
use std::rc::Rc;

use serde_json::json;
use spark_bind::{cloned, computed, Change, ChangeKey, Computed, ListMutator, Proxy, Store, Value};

fn store() -> Store {
    Store::from_json(
        json!({
            "user": { "name": "Ann", "age": 30 },
            "todos": [{ "title": "a", "done": false }, { "title": "b", "done": true }],
            "tags": ["x", "y"]
        }),
        "root",
    )
}

fn recorder(store: &Store) -> Rc<RefCell<Vec<Change>>> {
    let log = Rc::new(RefCell::new(Vec::new()));
    store.on_change(cloned!(log => move |change: &Change| log.borrow_mut().push(change.clone())));
    log
}

#[test]
fn nested_proxies_are_shared_across_paths() {
    let store = store();
    let via_root = store.root().at("todos").unwrap().at(1).unwrap();
    let list = store.root().at("todos").unwrap();
    let via_list = list.at(1).unwrap();
    assert!(Proxy::ptr_eq(&via_root, &via_list));
    assert_eq!(via_root.path(), "root.todos[1]");
}

#[test]
fn writes_report_path_value_key_and_target() {
    let store = store();
    let log = recorder(&store);
    let user = store.root().at("user").unwrap();

    assert!(user.set("age", 31));
    assert!(!user.set("age", 31));

    let changes = log.borrow();
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].path, "root.user.age");
    assert_eq!(changes[0].value, Value::from(31));
    assert_eq!(changes[0].key, ChangeKey::Key("age".into()));
    assert_eq!(changes[0].target, user.node());
}

#[test]
fn mutators_report_their_name() {
    let store = store();
    let log = recorder(&store);
    let tags = store.root().at("tags").unwrap();

    tags.push("z");
    tags.reverse();
    assert_eq!(tags.items(), vec![Value::from("z"), Value::from("y"), Value::from("x")]);

    let changes = log.borrow();
    assert_eq!(changes.len(), 2);
    assert_eq!(changes[0].key, ChangeKey::Mutator(ListMutator::Push));
    assert_eq!(changes[0].value, Value::from("push"));
    assert_eq!(changes[0].path, "root.tags");
    assert_eq!(changes[1].key, ChangeKey::Mutator(ListMutator::Reverse));
}

#[test]
fn dirty_is_set_once_and_recomputed_once() {
    let store = store();
    let label = Computed::new(
        "label",
        computed!(root => format!("{} ({})",
            root.at("user").map(|u| u.get("name").to_text()).unwrap_or_default(),
            root.at("user").map(|u| u.get("age").to_text()).unwrap_or_default())),
    );
    let root = store.root();
    assert_eq!(label.get(&root), Value::from("Ann (30)"));
    assert_eq!(label.evaluations(), 1);

    let user = root.at("user").unwrap();
    user.set("name", "Bob");
    user.set("age", 40);
    assert!(label.is_dirty());
    assert_eq!(label.evaluations(), 1);

    assert_eq!(label.get(&root), Value::from("Bob (40)"));
    assert_eq!(label.get(&root), Value::from("Bob (40)"));
    assert_eq!(label.evaluations(), 2);
}

#[test]
fn unrelated_writes_keep_computed_clean() {
    let store = store();
    let name = Computed::new("name", computed!(root => root.at("user")
        .map(|u| u.get("name").to_text())
        .unwrap_or_default()));
    let root = store.root();
    name.get(&root);

    root.at("user").unwrap().set("age", 99);
    root.set("other", true);
    assert!(!name.is_dirty());
}

#[test]
fn structural_mutators_invalidate_length_readers() {
    let store = store();
    let count = Computed::new("count", computed!(root => root.at("todos")
        .map(|t| t.len())
        .unwrap_or_default()));
    let root = store.root();
    assert_eq!(count.get(&root), Value::from(2));

    let todos = root.at("todos").unwrap();
    todos.push(store.alloc_json(&json!({ "title": "c", "done": false })));
    assert!(count.is_dirty());
    assert_eq!(count.get(&root), Value::from(3));

    todos.splice(0, 2, Vec::new());
    assert_eq!(count.get(&root), Value::from(1));
}

#[test]
fn replacing_a_subtree_invalidates_readers_through_it() {
    let store = store();
    let name = Computed::new("name", computed!(root => root.at("user")
        .map(|u| u.get("name").to_text())
        .unwrap_or_default()));
    let root = store.root();
    assert_eq!(name.get(&root), Value::from("Ann"));

    root.set_json("user", json!({ "name": "Zed" }));
    assert!(name.is_dirty());
    assert_eq!(name.get(&root), Value::from("Zed"));
}

#[test]
#[should_panic(expected = "depends on itself")]
fn self_reading_computed_panics() {
    let store = store();
    let slot: Rc<RefCell<Option<Computed>>> = Rc::new(RefCell::new(None));
    let me = Computed::new(
        "me",
        cloned!(slot => move |root: &Proxy| {
            match slot.borrow().as_ref() {
                Some(c) => c.get(root),
                None => Value::Null,
            }
        }),
    );
    *slot.borrow_mut() = Some(me.clone());
    me.get(&store.root());
}

#[test]
fn json_round_trip_keeps_key_order() {
    let store = store();
    let user = store.root().at("user").unwrap();
    assert_eq!(user.to_json(), json!({ "name": "Ann", "age": 30 }));
    assert_eq!(
        store.stringify(&store.root().get("tags")),
        r#"["x","y"]"#
    );
}
