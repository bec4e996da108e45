//! Undo/redo as a meta-reducer.
//!
//! The `history` slice records which actions are committed (still applied)
//! and which are staged (undone, most recently undone first). Undo and redo
//! move one entry between the two lists and rebuild the tracked keys by
//! replaying every committed action from the bootstrap state through the
//! wrapped reducer, so the result is exactly what the state would be had the
//! undone actions never been dispatched.

use crate::error::StoreError;
use crate::event::{Action, StateMap};
use crate::feature::{no_payload, with_events, with_meta_reducer, with_state};
use crate::reducer::ReduceFn;
use crate::store::{signal_store_feature, Feature, StoreHandle};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::Rc;

/// State key holding the [`History`].
pub const HISTORY_KEY: &str = "history";

/// Event used to ask the wrapped reducer for its bootstrap state.
pub const HISTORY_INIT_TYPE: &str = "@@history/init";

/// Event restoring the state before the last committed action.
pub const UNDO: &str = "undo";
/// Event re-applying the last undone action.
pub const REDO: &str = "redo";

/// One recorded action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Journal sequence number of the recorded action.
    pub seq: u64,
    /// Type of the recorded action.
    #[serde(rename = "type")]
    pub event_type: String,
    /// Payload of a recorded event. Patch commands carry none.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
}

/// The undo log of a store with [`with_history`].
///
/// `committed.len() + staged.len()` only changes when a new action is
/// committed (which also clears `staged`); undo and redo move entries
/// between the two lists.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct History {
    pub committed: Vec<HistoryEntry>,
    pub staged: Vec<HistoryEntry>,
}

impl History {
    /// Read the history slice of a store.
    pub fn from_store(store: &StoreHandle) -> Result<Self, StoreError> {
        store.get_as(HISTORY_KEY)
    }

    /// Read the history slice of a state snapshot. A missing slice is empty.
    pub fn from_state(state: &StateMap) -> Result<Self, StoreError> {
        match state.get(HISTORY_KEY) {
            Some(value) => Ok(serde_json::from_value(value.clone())?),
            None => Ok(History::default()),
        }
    }

    /// Whether there is a committed action to undo.
    pub fn can_undo(&self) -> bool {
        !self.committed.is_empty()
    }

    /// Whether there is an undone action to redo.
    pub fn can_redo(&self) -> bool {
        !self.staged.is_empty()
    }

    /// Total recorded entries, committed and staged.
    pub fn len(&self) -> usize {
        self.committed.len() + self.staged.len()
    }

    /// Whether nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Actions referenced by history entries, keyed by sequence number.
///
/// Entries passed to the latest [`forget`](Journal::forget) move to
/// `retired` and stay readable until the next `forget`, so a commit whose
/// state is rejected further out does not strand the redo list it cleared.
#[derive(Default)]
struct Journal {
    next_seq: Cell<u64>,
    actions: RefCell<BTreeMap<u64, Action>>,
    retired: RefCell<BTreeMap<u64, Action>>,
}

impl Journal {
    fn record(&self, action: &Action) -> HistoryEntry {
        let seq = self.next_seq.get();
        self.next_seq.set(seq + 1);
        self.actions.borrow_mut().insert(seq, action.clone());
        HistoryEntry {
            seq,
            event_type: action.action_type().to_string(),
            payload: action.as_event().map(|event| event.payload.clone()),
        }
    }

    /// Drop the actions behind `entries`, which no new history references.
    fn forget(&self, entries: &[HistoryEntry]) {
        let mut actions = self.actions.borrow_mut();
        let mut retired = self.retired.borrow_mut();
        let kept: BTreeMap<u64, Action> = entries
            .iter()
            .filter_map(|entry| {
                actions
                    .remove(&entry.seq)
                    .or_else(|| retired.remove(&entry.seq))
                    .map(|action| (entry.seq, action))
            })
            .collect();
        *retired = kept;
    }

    fn len(&self) -> usize {
        self.actions.borrow().len()
    }

    fn get(&self, entry: &HistoryEntry) -> Result<Action, StoreError> {
        let live = self.actions.borrow().get(&entry.seq).cloned();
        live.or_else(|| self.retired.borrow().get(&entry.seq).cloned())
            .ok_or_else(|| {
                StoreError::reducer(format!(
                    "history entry {} (`{}`) is not in the journal",
                    entry.seq, entry.event_type
                ))
            })
    }
}

/// Add undo/redo over `tracked_keys`.
///
/// Registers the `history` slice, the `undo` and `redo` events, and a
/// meta-reducer around every reducer registered so far. Only actions that
/// change a tracked key are recorded; other actions neither enter the log
/// nor clear the redo list.
///
/// # Examples
///
/// ```
/// use sigfold::{signal_store, with_history, with_state, History, StateUpdate};
/// use serde_json::json;
///
/// let store = signal_store([
///     with_state(json!({"count": 0})),
///     with_history(["count"]),
/// ])
/// .unwrap();
///
/// store.patch(vec![StateUpdate::partial(json!({"count": 1}))]).unwrap();
/// store.emit("undo", &[]).unwrap();
/// assert_eq!(store.get("count").unwrap(), json!(0));
///
/// store.emit("redo", &[]).unwrap();
/// assert_eq!(store.get("count").unwrap(), json!(1));
/// assert_eq!(History::from_store(&store).unwrap().committed.len(), 1);
/// ```
pub fn with_history<I, K>(tracked_keys: I) -> Feature
where
    I: IntoIterator<Item = K>,
    K: Into<String>,
{
    let tracked: Rc<Vec<String>> = Rc::new(tracked_keys.into_iter().map(Into::into).collect());
    let journal = Rc::new(Journal::default());

    signal_store_feature([
        with_state(BTreeMap::from([(HISTORY_KEY, History::default())])),
        with_events([(UNDO, no_payload()), (REDO, no_payload())]),
        with_meta_reducer(move |reducer| {
            history_reducer(reducer, Rc::clone(&tracked), Rc::clone(&journal))
        }),
    ])
}

fn history_reducer(reducer: ReduceFn, tracked: Rc<Vec<String>>, journal: Rc<Journal>) -> ReduceFn {
    let bootstrap: RefCell<Option<StateMap>> = RefCell::new(None);

    Rc::new(move |state: Option<StateMap>, action: &Action| -> Result<StateMap, StoreError> {
        let Some(state) = state else {
            let mut next = reducer(None, action)?;
            next.insert(HISTORY_KEY.to_string(), history_value(&History::default())?);
            return Ok(next);
        };

        let replay = |state: StateMap, history: History| -> Result<StateMap, StoreError> {
            let initial = bootstrap_state(&reducer, &bootstrap)?;
            let replayed = history.committed.iter().try_fold(initial, |acc, entry| {
                reducer(Some(acc), &journal.get(entry)?)
            })?;

            let mut next = state;
            for key in tracked.iter() {
                let value = replayed.get(key).cloned().unwrap_or(Value::Null);
                next.insert(key.clone(), value);
            }
            next.insert(HISTORY_KEY.to_string(), history_value(&history)?);
            Ok(next)
        };

        if action.is(UNDO) {
            let mut history = History::from_state(&state)?;
            let Some(entry) = history.committed.pop() else {
                return Ok(state);
            };
            log::debug!("sigfold: undo `{}` (seq {})", entry.event_type, entry.seq);
            history.staged.insert(0, entry);
            return replay(state, history);
        }

        if action.is(REDO) {
            let mut history = History::from_state(&state)?;
            if history.staged.is_empty() {
                return Ok(state);
            }
            let entry = history.staged.remove(0);
            log::debug!("sigfold: redo `{}` (seq {})", entry.event_type, entry.seq);
            history.committed.push(entry);
            return replay(state, history);
        }

        let next = reducer(Some(state.clone()), action)?;
        let changed = tracked.iter().any(|key| state.get(key) != next.get(key));
        if !changed {
            return Ok(next);
        }

        let mut history = History::from_state(&state)?;
        history.committed.push(journal.record(action));
        journal.forget(&history.staged);
        history.staged.clear();

        let mut next = next;
        next.insert(HISTORY_KEY.to_string(), history_value(&history)?);
        Ok(next)
    })
}

/// The wrapped reducer's bootstrap state, computed once per composition.
fn bootstrap_state(
    reducer: &ReduceFn,
    cache: &RefCell<Option<StateMap>>,
) -> Result<StateMap, StoreError> {
    if let Some(state) = cache.borrow().as_ref() {
        return Ok(state.clone());
    }
    let state = reducer(None, &Action::event(HISTORY_INIT_TYPE, Value::Null))?;
    *cache.borrow_mut() = Some(state.clone());
    Ok(state)
}

fn history_value(history: &History) -> Result<Value, StoreError> {
    Ok(serde_json::to_value(history)?)
}
