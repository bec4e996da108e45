use crate::error::StoreError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::rc::Rc;

/// The canonical state of a store: a JSON object keyed by slice name.
pub type StateMap = Map<String, Value>;

/// Type of the engine bootstrap command.
pub const INIT_TYPE: &str = "@@init";

/// Type of the patch command produced by `patch_state`.
pub const PATCH_STATE_TYPE: &str = "@@patch-state";

/// A feature-defined event record.
///
/// The `payload` is untyped ([`serde_json::Value`]); the engine has no
/// opinion about event shapes. Reducers give events meaning.
///
/// # Examples
///
/// ```
/// use sigfold::Event;
/// use serde_json::json;
///
/// let event = Event::new("canvasLeftClick", json!({"x": 1, "y": 1}));
/// assert_eq!(event.event_type, "canvasLeftClick");
/// assert_eq!(event.payload["x"], 1);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[non_exhaustive]
pub struct Event {
    /// The event type identifier (e.g. `"undo"`, `"canvasLeftClick"`).
    ///
    /// Serialized as `"type"` in JSON.
    #[serde(rename = "type")]
    pub event_type: String,

    /// Value produced by the event's payload factory.
    #[serde(default)]
    pub payload: Value,
}

impl Event {
    /// Create a new event with the given type and payload.
    pub fn new(event_type: &str, payload: Value) -> Self {
        Event {
            event_type: event_type.to_string(),
            payload,
        }
    }
}

/// One step of a patch command.
///
/// Either a literal partial state or a function computing a partial state from
/// the accumulator. Both must produce a JSON object; the result is
/// shallow-merged into the accumulator.
#[derive(Clone)]
pub enum StateUpdate {
    Partial(Value),
    Updater(Rc<dyn Fn(&StateMap) -> Value>),
}

impl StateUpdate {
    /// A literal partial state, e.g. `json!({"a": 1})`.
    pub fn partial(value: Value) -> Self {
        StateUpdate::Partial(value)
    }

    /// A partial state computed from the state accumulated so far.
    ///
    /// ```
    /// use sigfold::StateUpdate;
    /// use serde_json::json;
    ///
    /// let bump = StateUpdate::updater(|s| json!({"b": s["a"].as_i64().unwrap_or(0) + 1}));
    /// # let _ = bump;
    /// ```
    pub fn updater(f: impl Fn(&StateMap) -> Value + 'static) -> Self {
        StateUpdate::Updater(Rc::new(f))
    }

    /// Shallow-merge this update into `acc`.
    pub(crate) fn apply(&self, mut acc: StateMap) -> Result<StateMap, StoreError> {
        let partial = match self {
            StateUpdate::Partial(value) => value.clone(),
            StateUpdate::Updater(f) => f(&acc),
        };
        acc.extend(into_state_map(partial)?);
        Ok(acc)
    }
}

impl fmt::Debug for StateUpdate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StateUpdate::Partial(value) => f.debug_tuple("Partial").field(value).finish(),
            StateUpdate::Updater(_) => f.write_str("Updater(..)"),
        }
    }
}

/// A message accepted by the engine's dispatcher.
#[derive(Debug, Clone)]
pub enum Action {
    /// Engine bootstrap; carries no payload.
    Init,
    /// Ordered partial-state updates applied left to right.
    PatchState(Vec<StateUpdate>),
    /// A feature-defined event.
    Event(Event),
}

impl Action {
    /// Shorthand for `Action::Event(Event::new(event_type, payload))`.
    pub fn event(event_type: &str, payload: Value) -> Self {
        Action::Event(Event::new(event_type, payload))
    }

    /// The action's type tag.
    pub fn action_type(&self) -> &str {
        match self {
            Action::Init => INIT_TYPE,
            Action::PatchState(_) => PATCH_STATE_TYPE,
            Action::Event(event) => &event.event_type,
        }
    }

    /// The feature event, if this action carries one.
    pub fn as_event(&self) -> Option<&Event> {
        match self {
            Action::Event(event) => Some(event),
            _ => None,
        }
    }

    /// True if this is a feature event of the given type.
    pub fn is(&self, event_type: &str) -> bool {
        matches!(self, Action::Event(event) if event.event_type == event_type)
    }
}

impl From<Event> for Action {
    fn from(event: Event) -> Self {
        Action::Event(event)
    }
}

/// Convert a JSON value into a [`StateMap`], rejecting anything but an object.
///
/// ```
/// use sigfold::into_state_map;
/// use serde_json::json;
///
/// let state = into_state_map(json!({"a": 1})).unwrap();
/// assert_eq!(state["a"], 1);
/// assert!(into_state_map(json!([1, 2])).is_err());
/// ```
pub fn into_state_map(value: Value) -> Result<StateMap, StoreError> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(StoreError::InvalidState {
            reason: format!("expected a JSON object, got `{other}`"),
        }),
    }
}
