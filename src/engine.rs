use crate::channel::EventChannel;
use crate::error::StoreError;
use crate::event::{Action, StateMap};
use crate::reducer::{apply_meta_reducers, merge_reducers, MetaReduceFn, ReduceFn};
use crate::signal::{Computed, Signal, Subscription};
use serde_json::Value;
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;

/// Owns the canonical state of one store and applies dispatched actions to it.
///
/// Every feature of a store shares the same engine. Cloning the engine clones
/// the handle, not the state.
///
/// The effective reducer is
/// `apply_meta_reducers(merge_reducers(patch_reducer, reducers), meta_reducers)`,
/// rebuilt lazily whenever a reducer, meta-reducer, or initial slice is added.
/// Additions only affect later dispatches.
///
/// # Examples
///
/// ```
/// use sigfold::{Action, StateEngine, StateUpdate, into_state_map};
/// use serde_json::json;
///
/// let engine = StateEngine::new(into_state_map(json!({"a": 0, "b": 0})).unwrap());
/// engine
///     .dispatch(Action::PatchState(vec![
///         StateUpdate::partial(json!({"a": 1})),
///         StateUpdate::updater(|s| json!({"b": s["a"].as_i64().unwrap_or(0) + 1})),
///     ]))
///     .unwrap();
/// assert_eq!(engine.state()["b"], 2);
/// ```
#[derive(Clone)]
pub struct StateEngine {
    inner: Rc<EngineInner>,
}

struct EngineInner {
    name: String,
    initial_state: RefCell<StateMap>,
    state: Signal<StateMap>,
    reduced: Cell<bool>,
    reducers: RefCell<Vec<ReduceFn>>,
    meta_reducers: RefCell<Vec<MetaReduceFn>>,
    composed: RefCell<Option<ReduceFn>>,
    channel: EventChannel,
    publishing: Cell<bool>,
    queued: RefCell<VecDeque<Action>>,
    destroyed: Cell<bool>,
}

impl StateEngine {
    /// Create an engine labelled `engine` in log lines.
    pub fn new(initial_state: StateMap) -> Self {
        StateEngine::named("engine", initial_state)
    }

    /// Create an engine whose log lines are labelled with `name`.
    pub fn named(name: &str, initial_state: StateMap) -> Self {
        StateEngine {
            inner: Rc::new(EngineInner {
                name: name.to_string(),
                initial_state: RefCell::new(initial_state.clone()),
                state: Signal::new(initial_state),
                reduced: Cell::new(false),
                reducers: RefCell::new(Vec::new()),
                meta_reducers: RefCell::new(Vec::new()),
                composed: RefCell::new(None),
                channel: EventChannel::new(),
                publishing: Cell::new(false),
                queued: RefCell::new(VecDeque::new()),
                destroyed: Cell::new(false),
            }),
        }
    }

    /// The label used in log lines.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// The latest reduced state, or the accumulated initial state if nothing
    /// has been dispatched yet.
    pub fn state(&self) -> StateMap {
        self.inner.state.read()
    }

    /// One top-level slice of [`state`](StateEngine::state), without cloning
    /// the rest of it.
    pub fn slice(&self, key: &str) -> Option<Value> {
        self.inner.state.with(|state| state.get(key).cloned())
    }

    /// A cached read-only cell over [`state`](StateEngine::state).
    pub fn state_signal(&self) -> Computed<StateMap> {
        self.inner.state.as_computed()
    }

    /// A cached read-only cell over one top-level slice, `null` while the
    /// key is absent.
    pub fn slice_signal(&self, key: &str) -> Computed<Value> {
        let key = key.to_string();
        self.inner
            .state
            .derive(move |state| state.get(&key).cloned().unwrap_or(Value::Null))
    }

    /// The initial state contributed so far.
    pub fn initial_state(&self) -> StateMap {
        self.inner.initial_state.borrow().clone()
    }

    /// Merge `slice` into the initial state (later keys win).
    ///
    /// Until the first dispatch the current state is the initial state, so
    /// it is extended too, without notifying state listeners.
    pub fn extend_initial_state(&self, slice: StateMap) {
        let initial = {
            let mut initial = self.inner.initial_state.borrow_mut();
            initial.extend(slice);
            initial.clone()
        };
        if !self.inner.reduced.get() {
            self.inner.state.write_quietly(initial);
        }
        self.invalidate();
    }

    /// Register a whole-state reducer, applied after those registered before it.
    pub fn add_reducer(&self, reducer: ReduceFn) {
        self.inner.reducers.borrow_mut().push(reducer);
        self.invalidate();
    }

    /// Register a meta-reducer. The last one registered wraps outermost.
    pub fn add_meta_reducer(&self, meta_reducer: MetaReduceFn) {
        self.inner.meta_reducers.borrow_mut().push(meta_reducer);
        self.invalidate();
    }

    /// Number of whole-state reducers registered.
    pub fn reducer_count(&self) -> usize {
        self.inner.reducers.borrow().len()
    }

    /// Number of meta-reducers registered.
    pub fn meta_reducer_count(&self) -> usize {
        self.inner.meta_reducers.borrow().len()
    }

    /// Apply `action` to the current state and publish the result.
    ///
    /// Synchronous: when this returns `Ok`, the new state is visible and every
    /// event subscriber has been notified. When the reducer fails, the error
    /// is returned, the published state is left untouched, and nothing is
    /// broadcast.
    ///
    /// Actions run to completion. A dispatch made by a state listener or an
    /// event subscriber while an action is being published is queued and
    /// returns `Ok` at once; the queue is applied in order after the current
    /// action has reached every listener, before the outer call returns.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Destroyed`] after [`destroy`](StateEngine::destroy),
    /// or whatever error the composed reducer produced. A failure of a queued
    /// action is reported by the outer call, after the rest of the queue has
    /// been applied.
    pub fn dispatch(&self, action: Action) -> Result<(), StoreError> {
        if self.is_destroyed() {
            return Err(StoreError::Destroyed);
        }
        if self.inner.publishing.get() {
            log::trace!(
                "sigfold: {}: queueing `{}` until the current action is published",
                self.inner.name,
                action.action_type()
            );
            self.inner.queued.borrow_mut().push_back(action);
            return Ok(());
        }

        self.inner.publishing.set(true);
        let mut outcome = self.apply(action);
        loop {
            let Some(next) = self.inner.queued.borrow_mut().pop_front() else {
                break;
            };
            let applied = self.apply(next);
            if outcome.is_ok() {
                outcome = applied;
            }
        }
        self.inner.publishing.set(false);
        outcome
    }

    fn apply(&self, action: Action) -> Result<(), StoreError> {
        if self.is_destroyed() {
            return Err(StoreError::Destroyed);
        }

        let reducer = self.composed_reducer();
        log::trace!(
            "sigfold: {}: dispatching `{}`",
            self.inner.name,
            action.action_type()
        );

        let next = reducer(Some(self.state()), &action).inspect_err(|e| {
            log::warn!(
                "sigfold: {}: `{}` rejected, state unchanged: {e}",
                self.inner.name,
                action.action_type()
            );
        })?;

        self.inner.reduced.set(true);
        self.inner.state.write(next);
        self.inner.channel.publish(&action);
        Ok(())
    }

    /// Observe every successfully applied action, in dispatch order.
    pub fn subscribe(&self, listener: impl Fn(&Action) + 'static) -> Subscription {
        self.inner.channel.subscribe(listener)
    }

    /// Observe every published state.
    ///
    /// State listeners run before the action that produced the state is
    /// broadcast to event subscribers.
    pub fn on_state_change(&self, listener: impl Fn(&StateMap) + 'static) -> Subscription {
        self.inner.state.on_change(listener)
    }

    /// Sever the dispatcher: later dispatches fail with
    /// [`StoreError::Destroyed`] and every subscriber is released.
    pub fn destroy(&self) {
        if self.inner.destroyed.replace(true) {
            return;
        }
        self.inner.channel.close();
        self.inner.state.clear_listeners();
        log::debug!("sigfold: {}: engine destroyed", self.inner.name);
    }

    /// Whether [`destroy`](StateEngine::destroy) has been called.
    pub fn is_destroyed(&self) -> bool {
        self.inner.destroyed.get()
    }

    pub(crate) fn channel(&self) -> EventChannel {
        self.inner.channel.clone()
    }

    fn invalidate(&self) {
        self.inner.composed.borrow_mut().take();
    }

    fn composed_reducer(&self) -> ReduceFn {
        if let Some(reducer) = self.inner.composed.borrow().as_ref() {
            return Rc::clone(reducer);
        }

        let merged = merge_reducers(
            patch_state_reducer(self.initial_state()),
            self.inner.reducers.borrow().clone(),
        );
        let reducer = apply_meta_reducers(merged, &self.inner.meta_reducers.borrow());
        *self.inner.composed.borrow_mut() = Some(Rc::clone(&reducer));
        reducer
    }
}

impl fmt::Debug for StateEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateEngine")
            .field("name", &self.inner.name)
            .field("state", &self.state())
            .field("reducers", &self.reducer_count())
            .field("meta_reducers", &self.meta_reducer_count())
            .field("subscribers", &self.inner.channel.listener_count())
            .field("state_listeners", &self.inner.state.listener_count())
            .field("destroyed", &self.is_destroyed())
            .finish()
    }
}

/// The base reducer: folds `@@patch-state` updaters over the state and passes
/// every other action through.
fn patch_state_reducer(initial_state: StateMap) -> ReduceFn {
    Rc::new(move |state: Option<StateMap>, action: &Action| -> Result<StateMap, StoreError> {
        let state = state.unwrap_or_else(|| initial_state.clone());
        match action {
            Action::PatchState(updates) => updates
                .iter()
                .try_fold(state, |acc, update| update.apply(acc)),
            _ => Ok(state),
        }
    })
}
