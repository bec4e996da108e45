//! Standalone state containers built directly on a [`StateEngine`], without
//! feature composition.

use crate::engine::StateEngine;
use crate::error::StoreError;
use crate::event::{into_state_map, Action, Event, StateMap, StateUpdate};
use crate::reducer::{to_scoped_reducer, StateChange};
use crate::signal::Computed;
use crate::store::{SignalStore, StoreHandle};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

/// Anything backed by a state engine.
pub trait StateSource {
    fn state_engine(&self) -> &StateEngine;
}

impl StateSource for StateEngine {
    fn state_engine(&self) -> &StateEngine {
        self
    }
}

impl StateSource for StoreHandle {
    fn state_engine(&self) -> &StateEngine {
        self.engine()
    }
}

impl StateSource for SignalStore {
    fn state_engine(&self) -> &StateEngine {
        self.engine()
    }
}

/// Current state snapshot of `source`.
pub fn get_state(source: &impl StateSource) -> StateMap {
    source.state_engine().state()
}

/// Dispatch `updates` to `source` as one `@@patch-state` command.
///
/// ```
/// use sigfold::{get_state, patch_state, SignalState, StateUpdate};
/// use serde_json::json;
///
/// let state = SignalState::new(json!({"a": 0, "b": 0})).unwrap();
/// patch_state(&state, vec![
///     StateUpdate::partial(json!({"a": 1})),
///     StateUpdate::updater(|s| json!({"b": s["a"].as_i64().unwrap_or(0) + 1})),
/// ])
/// .unwrap();
/// assert_eq!(get_state(&state)["b"], 2);
/// ```
pub fn patch_state(source: &impl StateSource, updates: Vec<StateUpdate>) -> Result<(), StoreError> {
    source.state_engine().dispatch(Action::PatchState(updates))
}

fn initial_map(initial_state: impl Serialize) -> Result<StateMap, StoreError> {
    into_state_map(serde_json::to_value(initial_state)?)
}

/// A state container updated only through [`patch_state`].
///
/// Bootstrapped with `@@init` on creation; torn down when dropped.
#[derive(Debug)]
pub struct SignalState {
    engine: StateEngine,
}

impl SignalState {
    /// Create the state and bootstrap it.
    pub fn new(initial_state: impl Serialize) -> Result<Self, StoreError> {
        let engine = StateEngine::named("signal_state", initial_map(initial_state)?);
        engine.dispatch(Action::Init)?;
        Ok(SignalState { engine })
    }

    /// Current state snapshot.
    pub fn state(&self) -> StateMap {
        self.engine.state()
    }

    /// The whole state, deserialized.
    pub fn state_as<T: DeserializeOwned>(&self) -> Result<T, StoreError> {
        Ok(serde_json::from_value(Value::Object(self.state()))?)
    }

    /// A read-only cell over one top-level key (`null` if absent).
    pub fn signal(&self, key: &str) -> Computed<Value> {
        self.engine.slice_signal(key)
    }
}

impl StateSource for SignalState {
    fn state_engine(&self) -> &StateEngine {
        &self.engine
    }
}

impl Drop for SignalState {
    fn drop(&mut self) {
        self.engine.destroy();
    }
}

/// State driven by a single reducer through [`dispatch`](SignalReducer::dispatch).
///
/// # Examples
///
/// ```
/// use sigfold::{Action, Event, SignalReducer, StateChange};
/// use serde_json::json;
///
/// let counter = SignalReducer::new(
///     |state, action| {
///         if action.is("increment") {
///             let n = state["count"].as_i64().unwrap_or(0);
///             let mut next = state.clone();
///             next.insert("count".into(), json!(n + 1));
///             return Ok(StateChange::Replace(next));
///         }
///         Ok(StateChange::Unchanged)
///     },
///     json!({"count": 0}),
/// )
/// .unwrap();
///
/// counter.dispatch(Event::new("increment", json!(null))).unwrap();
/// assert_eq!(counter.state()["count"], 1);
/// ```
#[derive(Debug)]
pub struct SignalReducer {
    engine: StateEngine,
}

impl SignalReducer {
    /// Create a reducer-driven state. Nothing is dispatched until the first event.
    pub fn new<F>(reducer: F, initial_state: impl Serialize) -> Result<Self, StoreError>
    where
        F: Fn(&StateMap, &Action) -> Result<StateChange, StoreError> + 'static,
    {
        SignalReducer::with_initializer(reducer, initial_state, |state| state)
    }

    /// Like [`new`](SignalReducer::new), with the initial state passed
    /// through `initializer` first.
    pub fn with_initializer<F, I>(
        reducer: F,
        initial_state: impl Serialize,
        initializer: I,
    ) -> Result<Self, StoreError>
    where
        F: Fn(&StateMap, &Action) -> Result<StateChange, StoreError> + 'static,
        I: FnOnce(StateMap) -> StateMap,
    {
        let initial_state = initializer(initial_map(initial_state)?);
        let engine = StateEngine::named("signal_reducer", initial_state.clone());
        engine.add_reducer(to_scoped_reducer(initial_state, reducer));
        Ok(SignalReducer { engine })
    }

    /// Reduce `event` into the state.
    pub fn dispatch(&self, event: Event) -> Result<(), StoreError> {
        self.engine.dispatch(Action::Event(event))
    }

    /// Current state snapshot.
    pub fn state(&self) -> StateMap {
        self.engine.state()
    }

    /// The whole state, deserialized.
    pub fn state_as<T: DeserializeOwned>(&self) -> Result<T, StoreError> {
        Ok(serde_json::from_value(Value::Object(self.state()))?)
    }
}

impl StateSource for SignalReducer {
    fn state_engine(&self) -> &StateEngine {
        &self.engine
    }
}

impl Drop for SignalReducer {
    fn drop(&mut self) {
        self.engine.destroy();
    }
}
