//! The `with_*` feature factories.
//!
//! Each factory returns a [`Feature`] that takes the store-in-progress and
//! produces the next one. Factories that accept a closure call it with a
//! [`StoreHandle`] over the features folded before them, so a feature can only
//! build on what already exists.

use crate::error::StoreError;
use crate::event::{into_state_map, Action, StateMap};
use crate::reducer::{to_scoped_reducer, ReduceFn, StateChange};
use crate::signal::{Computed, Subscription};
use crate::store::{
    chain_hook, EventFactory, Feature, Hook, InnerStore, Member, Method, StoreHandle,
};
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::fmt;
use std::rc::Rc;

/// Add top-level state slices, one state signal per key.
///
/// `state` must serialize to a JSON object; otherwise folding the feature
/// fails with [`StoreError::InvalidState`].
///
/// # Examples
///
/// ```
/// use sigfold::{signal_store, with_state};
/// use serde_json::json;
///
/// let store = signal_store([with_state(json!({"circles": [], "activePoint": null}))]).unwrap();
/// assert_eq!(store.get("circles").unwrap(), json!([]));
/// ```
pub fn with_state(state: impl Serialize) -> Feature {
    let slice = serde_json::to_value(state)
        .map_err(StoreError::from)
        .and_then(into_state_map);
    Feature::new("with_state", move |store| {
        let slice = slice?;
        bind_state(store, slice)
    })
}

/// Like [`with_state`], but the slices are produced when the feature is folded.
pub fn with_state_factory<S, F>(factory: F) -> Feature
where
    S: Serialize,
    F: FnOnce() -> S + 'static,
{
    Feature::new("with_state", move |store| {
        let slice = into_state_map(serde_json::to_value(factory())?)?;
        bind_state(store, slice)
    })
}

fn bind_state(mut store: InnerStore, slice: StateMap) -> Result<InnerStore, StoreError> {
    let keys: Vec<String> = slice.keys().cloned().collect();
    store.engine().extend_initial_state(slice);

    for key in keys {
        let signal = store.engine().slice_signal(&key);
        store.bind(key, Member::State(signal));
    }
    Ok(store)
}

/// Add derived values computed from the store so far.
///
/// # Examples
///
/// ```
/// use sigfold::{signal_store, with_computed, with_state};
/// use serde_json::json;
///
/// let store = signal_store([
///     with_state(json!({"items": [1, 2, 3]})),
///     with_computed(|store| {
///         let items = store.signal("items")?;
///         Ok([("count", items.map(|v| json!(v.as_array().map_or(0, Vec::len))))])
///     }),
/// ])
/// .unwrap();
/// assert_eq!(store.get("count").unwrap(), json!(3));
/// ```
pub fn with_computed<F, I, K>(factory: F) -> Feature
where
    F: FnOnce(&StoreHandle) -> Result<I, StoreError> + 'static,
    I: IntoIterator<Item = (K, Computed<Value>)>,
    K: Into<String>,
{
    Feature::new("with_computed", move |mut store| {
        let computed = factory(&store.handle())?;
        for (key, signal) in computed {
            store.bind(key.into(), Member::Computed(signal));
        }
        Ok(store)
    })
}

/// Add named methods closing over the store so far.
///
/// # Examples
///
/// ```
/// use sigfold::{method, signal_store, with_methods, with_state, StateUpdate};
/// use serde_json::{json, Value};
///
/// let store = signal_store([
///     with_state(json!({"count": 0})),
///     with_methods(|store| {
///         let store = store.clone();
///         Ok([(
///             "increment",
///             method(move |_| {
///                 store.patch(vec![StateUpdate::updater(|s| {
///                     json!({"count": s["count"].as_i64().unwrap_or(0) + 1})
///                 })])?;
///                 Ok(Value::Null)
///             }),
///         )])
///     }),
/// ])
/// .unwrap();
///
/// store.call("increment", &[]).unwrap();
/// assert_eq!(store.get("count").unwrap(), json!(1));
/// ```
pub fn with_methods<F, I, K>(factory: F) -> Feature
where
    F: FnOnce(&StoreHandle) -> Result<I, StoreError> + 'static,
    I: IntoIterator<Item = (K, Method)>,
    K: Into<String>,
{
    Feature::new("with_methods", move |mut store| {
        let methods = factory(&store.handle())?;
        for (name, method) in methods {
            store.bind(name.into(), Member::Method(method));
        }
        Ok(store)
    })
}

/// Box a closure as a [`Method`].
pub fn method(f: impl Fn(&[Value]) -> Result<Value, StoreError> + 'static) -> Method {
    Rc::new(f)
}

/// Register named event payload factories. Registration does not dispatch
/// anything; it makes the names valid for `emit` and `on`.
pub fn with_events<I, K>(events: I) -> Feature
where
    I: IntoIterator<Item = (K, EventFactory)>,
    K: Into<String>,
{
    let events: Vec<(String, EventFactory)> = events
        .into_iter()
        .map(|(name, factory)| (name.into(), factory))
        .collect();
    Feature::new("with_events", move |mut store| {
        for (name, factory) in events {
            store.register_event(name, factory);
        }
        Ok(store)
    })
}

/// Box a closure as an [`EventFactory`].
pub fn event_factory(f: impl Fn(&[Value]) -> Value + 'static) -> EventFactory {
    Rc::new(f)
}

/// Payload factory producing an empty object, for events without data.
pub fn no_payload() -> EventFactory {
    event_factory(|_| json!({}))
}

/// Payload factory passing the first argument through (`null` if absent).
pub fn first_arg() -> EventFactory {
    event_factory(|args| args.first().cloned().unwrap_or(Value::Null))
}

/// Payload factory zipping positional arguments into an object with the
/// given field names. Missing arguments become `null`.
///
/// ```
/// use sigfold::named_args;
/// use serde_json::json;
///
/// let update_radius = named_args(&["circle", "radius"]);
/// assert_eq!(
///     update_radius(&[json!({"x": 1}), json!(20)]),
///     json!({"circle": {"x": 1}, "radius": 20})
/// );
/// ```
pub fn named_args(names: &[&str]) -> EventFactory {
    let names: Vec<String> = names.iter().map(|name| name.to_string()).collect();
    event_factory(move |args| {
        let payload: Map<String, Value> = names
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), args.get(i).cloned().unwrap_or(Value::Null)))
            .collect();
        Value::Object(payload)
    })
}

/// Register a reducer scoped to the state declared by the features before it.
///
/// The reducer sees only those keys, and only those keys of its result are
/// written back. Reducers run in registration order for every action.
pub fn with_reducer<F>(reducer: F) -> Feature
where
    F: Fn(&StateMap, &Action) -> Result<StateChange, StoreError> + 'static,
{
    Feature::new("with_reducer", move |store| {
        let initial_state = store.engine().initial_state();
        store
            .engine()
            .add_reducer(to_scoped_reducer(initial_state, reducer));
        Ok(store)
    })
}

/// Register a meta-reducer around the composed reducer of the whole store.
///
/// Meta-reducers registered later wrap those registered earlier.
pub fn with_meta_reducer(meta_reducer: impl Fn(ReduceFn) -> ReduceFn + 'static) -> Feature {
    Feature::new("with_meta_reducer", move |store| {
        store.engine().add_meta_reducer(Rc::new(meta_reducer));
        Ok(store)
    })
}

type LifecycleFn = Rc<dyn Fn(&StoreHandle)>;

/// Lifecycle callbacks for [`with_hooks`].
#[derive(Clone, Default)]
pub struct StoreHooks {
    on_init: Option<LifecycleFn>,
    on_destroy: Option<LifecycleFn>,
}

impl StoreHooks {
    /// No hooks.
    pub fn new() -> Self {
        StoreHooks::default()
    }

    /// Run once after the store is built.
    pub fn on_init(mut self, hook: impl Fn(&StoreHandle) + 'static) -> Self {
        self.on_init = Some(Rc::new(hook));
        self
    }

    /// Run once when the store is destroyed.
    pub fn on_destroy(mut self, hook: impl Fn(&StoreHandle) + 'static) -> Self {
        self.on_destroy = Some(Rc::new(hook));
        self
    }
}

impl fmt::Debug for StoreHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreHooks")
            .field("on_init", &self.on_init.is_some())
            .field("on_destroy", &self.on_destroy.is_some())
            .finish()
    }
}

/// Register lifecycle hooks.
///
/// Hooks accumulate: each registration runs the hooks registered before it
/// first, then its own.
pub fn with_hooks(hooks: StoreHooks) -> Feature {
    with_hooks_factory(move |_| Ok(hooks))
}

/// Like [`with_hooks`], with hooks built from the store so far.
pub fn with_hooks_factory<F>(factory: F) -> Feature
where
    F: FnOnce(&StoreHandle) -> Result<StoreHooks, StoreError> + 'static,
{
    Feature::new("with_hooks", move |mut store| {
        let handle = store.handle();
        let hooks = factory(&handle)?;
        let bind = |hook: Option<LifecycleFn>| -> Option<Hook> {
            let handle = handle.clone();
            hook.map(|hook| Rc::new(move || hook(&handle)) as Hook)
        };

        store.hooks.on_init = chain_hook(store.hooks.on_init.take(), bind(hooks.on_init));
        store.hooks.on_destroy = chain_hook(store.hooks.on_destroy.take(), bind(hooks.on_destroy));
        Ok(store)
    })
}

/// Start side effects observing the store so far.
///
/// The returned subscriptions are owned by the store and released when it is
/// destroyed.
///
/// # Examples
///
/// ```
/// use sigfold::{first_arg, no_payload, signal_store, with_effects, with_events};
/// use serde_json::json;
///
/// let store = signal_store([
///     with_events([("ping", no_payload()), ("pong", first_arg())]),
///     with_effects(|store| {
///         let store = store.clone();
///         let reply = store.on("ping")?.subscribe({
///             let store = store.clone();
///             move |_| {
///                 let _ = store.emit("pong", &[json!("hi")]);
///             }
///         });
///         Ok(vec![reply])
///     }),
/// ])
/// .unwrap();
///
/// let pongs = store.on("pong").unwrap().receiver();
/// store.emit("ping", &[]).unwrap();
/// assert_eq!(pongs.drain()[0].payload, json!("hi"));
/// ```
pub fn with_effects<F>(factory: F) -> Feature
where
    F: FnOnce(&StoreHandle) -> Result<Vec<Subscription>, StoreError> + 'static,
{
    Feature::new("with_effects", move |mut store| {
        let subscriptions = factory(&store.handle())?;
        store.effects.extend(subscriptions);
        Ok(store)
    })
}
