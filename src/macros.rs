// ============================================================================
// spark-bind - Ergonomic Macros
// ============================================================================

/// Clone variables into a move closure.
///
/// User methods and computed getters are `'static` closures; this saves the
/// manual clone of every `Rc` they capture.
///
/// # Usage
///
/// ```rust
/// use std::cell::Cell;
/// use std::rc::Rc;
/// use spark_bind::{cloned, App, MethodCall};
///
/// let clicks = Rc::new(Cell::new(0));
/// let engine = App::from_markup(r#"<button id="b" data-click="hit()">go</button>"#)
///     .unwrap()
///     .method("hit", cloned!(clicks => move |_call: &mut MethodCall<'_>| {
///         clicks.set(clicks.get() + 1);
///         None
///     }))
///     .mount()
///     .unwrap();
///
/// let button = engine.with_tree(|doc| doc.query_id("b").unwrap());
/// engine.click(button);
/// assert_eq!(clicks.get(), 1);
/// ```
#[macro_export]
macro_rules! cloned {
    ($($n:ident),+ => $e:expr) => {
        {
            $( let $n = $n.clone(); )+
            $e
        }
    };
}

/// Build a computed getter from a path read on the root proxy.
///
/// `computed!(root => expr)` expands to `move |root: &Proxy| -> Value { expr.into() }`.
///
/// # Usage
///
/// ```rust
/// use serde_json::json;
/// use spark_bind::{computed, Computed, Store, Value};
///
/// let store = Store::from_json(json!({ "n": 2 }), "root");
/// let double = Computed::new("double", computed!(root => {
///     root.get("n").as_f64().unwrap_or_default() * 2.0
/// }));
/// assert_eq!(double.get(&store.root()), Value::from(4));
/// ```
#[macro_export]
macro_rules! computed {
    ($root:ident => $body:expr) => {
        move |$root: &$crate::Proxy| -> $crate::Value { $crate::Value::from($body) }
    };
}
