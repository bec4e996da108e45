use crate::error::StoreError;
use crate::event::{Action, StateMap};
use std::fmt;
use std::rc::Rc;

/// A reducer over the whole state.
///
/// `None` asks the reducer for its bootstrap state: each reducer falls back to
/// the initial state it was built with. Reducers must be pure: replay
/// (undo/redo) relies on running them again with the same inputs.
pub type ReduceFn = Rc<dyn Fn(Option<StateMap>, &Action) -> Result<StateMap, StoreError>>;

/// Wraps a reducer to produce another reducer, for cross-cutting behavior.
pub type MetaReduceFn = Rc<dyn Fn(ReduceFn) -> ReduceFn>;

/// A pure transform from one (scoped) state to the next.
pub type Transform = Rc<dyn Fn(StateMap) -> StateMap>;

/// Box a closure as a [`Transform`].
pub fn transform(f: impl Fn(StateMap) -> StateMap + 'static) -> Transform {
    Rc::new(f)
}

/// What a feature reducer returns.
#[derive(Clone, Default)]
pub enum StateChange {
    /// Keep the input state.
    #[default]
    Unchanged,
    /// Use this state.
    Replace(StateMap),
    /// Apply one transform to the input state.
    Update(Transform),
    /// Apply transforms in order, each to the previous one's output.
    Sequence(Vec<Transform>),
}

impl StateChange {
    /// Wrap `f` as a single [`StateChange::Update`].
    pub fn update(f: impl Fn(StateMap) -> StateMap + 'static) -> Self {
        StateChange::Update(Rc::new(f))
    }

    /// Collect `transforms` into a [`StateChange::Sequence`].
    pub fn sequence(transforms: impl IntoIterator<Item = Transform>) -> Self {
        StateChange::Sequence(transforms.into_iter().collect())
    }
}

impl From<StateMap> for StateChange {
    fn from(state: StateMap) -> Self {
        StateChange::Replace(state)
    }
}

impl fmt::Debug for StateChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StateChange::Unchanged => f.write_str("Unchanged"),
            StateChange::Replace(state) => f.debug_tuple("Replace").field(state).finish(),
            StateChange::Update(_) => f.write_str("Update(..)"),
            StateChange::Sequence(fns) => write!(f, "Sequence({} transforms)", fns.len()),
        }
    }
}

/// Resolve a reducer result against the state it was computed from.
///
/// ```
/// use sigfold::{into_state_map, resolve_changes, transform, StateChange};
/// use serde_json::json;
///
/// let state = into_state_map(json!({"n": 1})).unwrap();
/// let change = StateChange::sequence([
///     transform(|mut s| {
///         s.insert("n".into(), json!(2));
///         s
///     }),
///     transform(|mut s| {
///         let n = s["n"].as_i64().unwrap_or(0);
///         s.insert("n".into(), json!(n * 10));
///         s
///     }),
/// ]);
/// assert_eq!(resolve_changes(change, state)["n"], 20);
/// ```
pub fn resolve_changes(change: StateChange, state: StateMap) -> StateMap {
    match change {
        StateChange::Unchanged => state,
        StateChange::Replace(next) => next,
        StateChange::Update(f) => f(state),
        StateChange::Sequence(fns) => fns.iter().fold(state, |acc, f| f(acc)),
    }
}

/// Lift a feature reducer to operate on the whole state.
///
/// The reducer only sees the keys present in `initial_state`, and only those
/// keys are written back; every other key of the full state passes through
/// untouched. A key missing from the reducer's result keeps its previous
/// value.
pub fn to_scoped_reducer<F>(initial_state: StateMap, reducer: F) -> ReduceFn
where
    F: Fn(&StateMap, &Action) -> Result<StateChange, StoreError> + 'static,
{
    let owned_keys: Vec<String> = initial_state.keys().cloned().collect();

    Rc::new(move |state: Option<StateMap>, action: &Action| -> Result<StateMap, StoreError> {
        let mut state = state.unwrap_or_else(|| initial_state.clone());
        let mine: StateMap = owned_keys
            .iter()
            .filter_map(|key| state.get(key).map(|value| (key.clone(), value.clone())))
            .collect();

        let change = reducer(&mine, action)?;
        let next_mine = resolve_changes(change, mine);

        for (key, value) in next_mine {
            if owned_keys.contains(&key) {
                state.insert(key, value);
            }
        }
        Ok(state)
    })
}

/// Pipe the state through each reducer in order for the same action:
/// `r2(r1(state, action), action)`.
pub fn merge_reducers(first: ReduceFn, rest: Vec<ReduceFn>) -> ReduceFn {
    if rest.is_empty() {
        return first;
    }
    Rc::new(move |state: Option<StateMap>, action: &Action| -> Result<StateMap, StoreError> {
        let initial = first(state, action)?;
        rest.iter()
            .try_fold(initial, |acc, reducer| reducer(Some(acc), action))
    })
}

/// Wrap `reducer` with each meta-reducer in registration order.
///
/// Each meta-reducer wraps the result of the previous ones, so with `[m1, m2]`
/// the effective reducer is `m2(m1(reducer))` and `m2` runs outermost.
pub fn apply_meta_reducers(reducer: ReduceFn, meta_reducers: &[MetaReduceFn]) -> ReduceFn {
    meta_reducers
        .iter()
        .fold(reducer, |acc, meta_reducer| meta_reducer(acc))
}
