use thiserror::Error;

/// Errors surfaced by stores, engines, and features.
///
/// The engine never recovers or retries on its own. Every error is returned
/// synchronously to the immediate caller, and a failed dispatch leaves the
/// published state at its last committed value.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StoreError {
    /// `emit` or `on` was called with a name no `with_events` registered.
    #[error("event `{name}` is not defined")]
    UnknownEvent { name: String },

    /// A reducer or meta-reducer rejected an action.
    #[error("reducer failed: {message}")]
    Reducer { message: String },

    /// A feature or caller asked for a state/computed signal that was never
    /// established by an earlier feature.
    #[error("signal `{key}` is not defined")]
    MissingSignal { key: String },

    /// A caller asked for a method that was never established.
    #[error("method `{name}` is not defined")]
    MissingMethod { name: String },

    /// The owning store or engine has been torn down.
    #[error("store has been destroyed")]
    Destroyed,

    /// A state value or partial update was not a JSON object.
    #[error("invalid state: {reason}")]
    InvalidState { reason: String },

    /// A typed slice failed to (de)serialize.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl StoreError {
    /// Build a [`StoreError::Reducer`] from any displayable message.
    ///
    /// ```
    /// use sigfold::StoreError;
    ///
    /// let err = StoreError::reducer("radius must be positive");
    /// assert_eq!(err.to_string(), "reducer failed: radius must be positive");
    /// ```
    pub fn reducer(message: impl std::fmt::Display) -> Self {
        StoreError::Reducer {
            message: message.to_string(),
        }
    }

    pub(crate) fn unknown_event(name: &str) -> Self {
        StoreError::UnknownEvent {
            name: name.to_string(),
        }
    }
}
