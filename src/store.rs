use crate::channel::EventStream;
use crate::engine::StateEngine;
use crate::error::StoreError;
use crate::event::{Action, Event, StateMap, StateUpdate};
use crate::signal::{Computed, Subscription};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::fmt;
use std::ops::Deref;
use std::rc::Rc;

/// A named store method. Arguments and result are JSON values.
pub type Method = Rc<dyn Fn(&[Value]) -> Result<Value, StoreError>>;

/// Builds an event payload from the arguments passed to `emit`.
pub type EventFactory = Rc<dyn Fn(&[Value]) -> Value>;

/// A lifecycle callback.
pub type Hook = Rc<dyn Fn()>;

/// What a store key is bound to.
#[derive(Clone)]
pub enum Member {
    /// One top-level state slice.
    State(Computed<Value>),
    /// A value derived by `with_computed`.
    Computed(Computed<Value>),
    /// A callable declared by `with_methods`.
    Method(Method),
}

/// The kind of a [`Member`], without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberKind {
    State,
    Computed,
    Method,
}

impl Member {
    /// Which kind of member this is.
    pub fn kind(&self) -> MemberKind {
        match self {
            Member::State(_) => MemberKind::State,
            Member::Computed(_) => MemberKind::Computed,
            Member::Method(_) => MemberKind::Method,
        }
    }

    fn as_signal(&self) -> Option<&Computed<Value>> {
        match self {
            Member::State(signal) | Member::Computed(signal) => Some(signal),
            Member::Method(_) => None,
        }
    }
}

impl fmt::Debug for Member {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}(..)", self.kind())
    }
}

#[derive(Clone, Default)]
pub(crate) struct Hooks {
    pub(crate) on_init: Option<Hook>,
    pub(crate) on_destroy: Option<Hook>,
}

/// Chain `next` after `current`: the combined hook runs `current` first.
pub(crate) fn chain_hook(current: Option<Hook>, next: Option<Hook>) -> Option<Hook> {
    match (current, next) {
        (Some(current), Some(next)) => Some(Rc::new(move || {
            current();
            next();
        })),
        (current, None) => current,
        (None, next) => next,
    }
}

/// The store-in-progress that features are folded over.
///
/// One namespace holds state slices, computed values, and methods, so a key
/// bound by a later feature replaces any earlier binding of the same key
/// whatever its kind. Events live in their own registry.
pub struct InnerStore {
    engine: StateEngine,
    members: BTreeMap<String, Member>,
    events: BTreeMap<String, EventFactory>,
    pub(crate) hooks: Hooks,
    pub(crate) effects: Vec<Subscription>,
}

impl InnerStore {
    pub(crate) fn new(engine: StateEngine) -> Self {
        InnerStore {
            engine,
            members: BTreeMap::new(),
            events: BTreeMap::new(),
            hooks: Hooks::default(),
            effects: Vec::new(),
        }
    }

    /// The engine shared by every feature of this store.
    pub fn engine(&self) -> &StateEngine {
        &self.engine
    }

    /// A read/dispatch view over what has been folded so far.
    pub fn handle(&self) -> StoreHandle {
        StoreHandle {
            engine: self.engine.clone(),
            members: Rc::new(self.members.clone()),
            events: Rc::new(self.events.clone()),
        }
    }

    /// Kind of the member bound to `key`, if any.
    pub fn member_kind(&self, key: &str) -> Option<MemberKind> {
        self.members.get(key).map(Member::kind)
    }

    /// Keys currently bound to members of `kind`, in key order.
    pub fn keys_of(&self, kind: MemberKind) -> Vec<&str> {
        self.members
            .iter()
            .filter(|(_, member)| member.kind() == kind)
            .map(|(key, _)| key.as_str())
            .collect()
    }

    /// Registered event names, in name order.
    pub fn event_names(&self) -> Vec<&str> {
        self.events.keys().map(String::as_str).collect()
    }

    /// Bind `key`, excluding whatever an earlier feature bound to it.
    pub(crate) fn bind(&mut self, key: String, member: Member) {
        let kind = member.kind();
        if let Some(previous) = self.members.insert(key.clone(), member) {
            log::debug!(
                "sigfold: {}: {kind:?} `{key}` replaces earlier {:?}",
                self.engine.name(),
                previous.kind()
            );
        }
    }

    pub(crate) fn register_event(&mut self, name: String, factory: EventFactory) {
        self.events.insert(name, factory);
    }
}

impl fmt::Debug for InnerStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InnerStore")
            .field("members", &self.members)
            .field("events", &self.events.keys().collect::<Vec<_>>())
            .field("effects", &self.effects.len())
            .finish()
    }
}

/// One composable unit of a store.
///
/// A feature consumes the store-in-progress and returns the next one. Build
/// features with the `with_*` functions, group them with
/// [`signal_store_feature`], or write one with [`Feature::new`].
pub struct Feature {
    name: String,
    apply: Box<dyn FnOnce(InnerStore) -> Result<InnerStore, StoreError>>,
}

impl Feature {
    /// A feature named `name` (used in log lines) that runs `apply`.
    pub fn new(
        name: &str,
        apply: impl FnOnce(InnerStore) -> Result<InnerStore, StoreError> + 'static,
    ) -> Self {
        Feature {
            name: name.to_string(),
            apply: Box::new(apply),
        }
    }

    /// Name used in log lines.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn apply(self, store: InnerStore) -> Result<InnerStore, StoreError> {
        log::debug!(
            "sigfold: {}: folding feature `{}`",
            store.engine.name(),
            self.name
        );
        (self.apply)(store)
    }
}

impl fmt::Debug for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Feature").field("name", &self.name).finish()
    }
}

/// Group features into one, folded left to right.
pub fn signal_store_feature(features: impl IntoIterator<Item = Feature>) -> Feature {
    let features: Vec<Feature> = features.into_iter().collect();
    Feature::new("signal_store_feature", move |store| {
        features
            .into_iter()
            .try_fold(store, |store, feature| feature.apply(store))
    })
}

/// The public surface of a store: signals, methods, `emit`, `on`, and `patch`.
///
/// Feature factories receive a handle over the features folded before them;
/// the built [`SignalStore`] dereferences to a handle over all of them.
#[derive(Clone)]
pub struct StoreHandle {
    engine: StateEngine,
    members: Rc<BTreeMap<String, Member>>,
    events: Rc<BTreeMap<String, EventFactory>>,
}

impl StoreHandle {
    /// Current state snapshot.
    pub fn state(&self) -> StateMap {
        self.engine.state()
    }

    /// The engine behind this store.
    pub fn engine(&self) -> &StateEngine {
        &self.engine
    }

    /// The state or computed signal bound to `key`.
    ///
    /// # Errors
    ///
    /// [`StoreError::MissingSignal`] if `key` is unbound or bound to a method.
    pub fn signal(&self, key: &str) -> Result<Computed<Value>, StoreError> {
        self.members
            .get(key)
            .and_then(Member::as_signal)
            .cloned()
            .ok_or_else(|| StoreError::MissingSignal {
                key: key.to_string(),
            })
    }

    /// Read the signal bound to `key`.
    pub fn get(&self, key: &str) -> Result<Value, StoreError> {
        Ok(self.signal(key)?.read())
    }

    /// Read the signal bound to `key` and deserialize it.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Result<T, StoreError> {
        Ok(serde_json::from_value(self.get(key)?)?)
    }

    /// Call the method bound to `name`.
    ///
    /// # Errors
    ///
    /// [`StoreError::MissingMethod`] if `name` is not a method, or whatever
    /// the method returns.
    pub fn call(&self, name: &str, args: &[Value]) -> Result<Value, StoreError> {
        match self.members.get(name) {
            Some(Member::Method(method)) => method(args),
            _ => Err(StoreError::MissingMethod {
                name: name.to_string(),
            }),
        }
    }

    /// Kind of the member bound to `key`, if any.
    pub fn member_kind(&self, key: &str) -> Option<MemberKind> {
        self.members.get(key).map(Member::kind)
    }

    /// Every bound key, in key order.
    pub fn keys(&self) -> Vec<&str> {
        self.members.keys().map(String::as_str).collect()
    }

    /// Whether an event named `name` was registered.
    pub fn has_event(&self, name: &str) -> bool {
        self.events.contains_key(name)
    }

    /// Build the named event from `args` and dispatch it.
    ///
    /// # Errors
    ///
    /// [`StoreError::UnknownEvent`] before anything is dispatched if `name`
    /// was never registered, otherwise any dispatch error.
    pub fn emit(&self, name: &str, args: &[Value]) -> Result<(), StoreError> {
        let factory = self
            .events
            .get(name)
            .ok_or_else(|| StoreError::unknown_event(name))?;
        let event = Event::new(name, factory(args));
        self.engine.dispatch(Action::Event(event))
    }

    /// Every dispatched event of type `name`, starting from the next dispatch.
    ///
    /// # Errors
    ///
    /// [`StoreError::UnknownEvent`] if `name` was never registered.
    pub fn on(&self, name: &str) -> Result<EventStream, StoreError> {
        if !self.has_event(name) {
            return Err(StoreError::unknown_event(name));
        }
        Ok(EventStream::new(self.engine.channel(), name))
    }

    /// Dispatch `updates` as one `@@patch-state` command.
    pub fn patch(&self, updates: Vec<StateUpdate>) -> Result<(), StoreError> {
        self.engine.dispatch(Action::PatchState(updates))
    }

    /// Dispatch a raw action, bypassing the event registry.
    pub fn dispatch(&self, action: Action) -> Result<(), StoreError> {
        self.engine.dispatch(action)
    }
}

impl fmt::Debug for StoreHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreHandle")
            .field("engine", &self.engine)
            .field("members", &self.members)
            .field("events", &self.events.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// A built store.
///
/// Runs the chained `on_init` hooks once when built and the chained
/// `on_destroy` hooks once when destroyed or dropped. A destroyed store
/// accepts no further dispatches.
///
/// # Examples
///
/// ```
/// use sigfold::{no_payload, with_events, with_state, SignalStore, StateUpdate};
/// use serde_json::json;
///
/// let store = SignalStore::builder()
///     .name("counter")
///     .feature(with_state(json!({"count": 0})))
///     .feature(with_events([("reset", no_payload())]))
///     .build()
///     .unwrap();
///
/// store.patch(vec![StateUpdate::partial(json!({"count": 3}))]).unwrap();
/// assert_eq!(store.get("count").unwrap(), json!(3));
/// assert!(store.emit("missing", &[]).is_err());
/// ```
pub struct SignalStore {
    handle: StoreHandle,
    on_destroy: Option<Hook>,
    effects: RefCell<Vec<Subscription>>,
    destroyed: Cell<bool>,
}

impl SignalStore {
    /// Start building a store from features.
    pub fn builder() -> SignalStoreBuilder {
        SignalStoreBuilder::new()
    }

    /// The read/dispatch view of this store.
    pub fn handle(&self) -> &StoreHandle {
        &self.handle
    }

    /// Run the `on_destroy` hooks, release effect subscriptions, and sever
    /// the engine. Idempotent.
    pub fn destroy(&self) {
        if self.destroyed.replace(true) {
            return;
        }
        if let Some(on_destroy) = &self.on_destroy {
            on_destroy();
        }
        self.effects.borrow_mut().clear();
        self.handle.engine.destroy();
        log::debug!("sigfold: {}: store destroyed", self.handle.engine.name());
    }

    /// Whether [`destroy`](SignalStore::destroy) has run.
    pub fn is_destroyed(&self) -> bool {
        self.destroyed.get()
    }
}

impl Deref for SignalStore {
    type Target = StoreHandle;

    fn deref(&self) -> &StoreHandle {
        &self.handle
    }
}

impl Drop for SignalStore {
    fn drop(&mut self) {
        self.destroy();
    }
}

impl fmt::Debug for SignalStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignalStore")
            .field("handle", &self.handle)
            .field("effects", &self.effects.borrow().len())
            .field("destroyed", &self.destroyed.get())
            .finish()
    }
}

/// Builder for [`SignalStore`].
///
/// Features are folded in the order they are added.
pub struct SignalStoreBuilder {
    name: String,
    features: Vec<Feature>,
}

impl SignalStoreBuilder {
    fn new() -> Self {
        SignalStoreBuilder {
            name: "store".to_string(),
            features: Vec::new(),
        }
    }

    /// Label used in log lines.
    pub fn name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    /// Add one feature.
    pub fn feature(mut self, feature: Feature) -> Self {
        self.features.push(feature);
        self
    }

    /// Add features in order.
    pub fn features(mut self, features: impl IntoIterator<Item = Feature>) -> Self {
        self.features.extend(features);
        self
    }

    /// Fold every feature, bootstrap the engine with `@@init`, then run the
    /// `on_init` hooks.
    ///
    /// # Errors
    ///
    /// Returns the first error raised by a feature or by the bootstrap
    /// dispatch.
    pub fn build(self) -> Result<SignalStore, StoreError> {
        let engine = StateEngine::named(&self.name, StateMap::new());
        let inner = self
            .features
            .into_iter()
            .try_fold(InnerStore::new(engine), |store, feature| {
                feature.apply(store)
            })?;

        let engine = inner.engine().clone();
        if let Err(e) = engine.dispatch(Action::Init) {
            engine.destroy();
            return Err(e);
        }

        let store = SignalStore {
            handle: inner.handle(),
            on_destroy: inner.hooks.on_destroy,
            effects: RefCell::new(inner.effects),
            destroyed: Cell::new(false),
        };
        log::debug!(
            "sigfold: {}: store built with keys {:?}",
            self.name,
            store.keys()
        );

        if let Some(on_init) = &inner.hooks.on_init {
            on_init();
        }
        Ok(store)
    }
}

/// Build a store from `features` with default configuration.
pub fn signal_store(
    features: impl IntoIterator<Item = Feature>,
) -> Result<SignalStore, StoreError> {
    SignalStore::builder().features(features).build()
}
