mod channel;
mod engine;
mod entities;
mod error;
mod event;
mod feature;
pub mod history;
mod reducer;
mod signal;
mod signal_state;
mod store;

pub use channel::{EventReceiver, EventStream};
pub use engine::StateEngine;
pub use entities::{add_entity, entity_list, remove_entity, with_entities, EntityConfig};
pub use error::StoreError;
pub use event::{into_state_map, Action, Event, StateMap, StateUpdate, INIT_TYPE, PATCH_STATE_TYPE};
pub use feature::{
    event_factory, first_arg, method, named_args, no_payload, with_computed, with_effects,
    with_events, with_hooks, with_hooks_factory, with_meta_reducer, with_methods, with_reducer,
    with_state, with_state_factory, StoreHooks,
};
pub use history::{with_history, History, HistoryEntry};
pub use reducer::{
    apply_meta_reducers, merge_reducers, resolve_changes, to_scoped_reducer, transform,
    MetaReduceFn, ReduceFn, StateChange, Transform,
};
pub use signal::{Computed, Signal, Subscription};
pub use signal_state::{get_state, patch_state, SignalReducer, SignalState, StateSource};
pub use store::{
    signal_store, signal_store_feature, EventFactory, Feature, Hook, InnerStore, Member,
    MemberKind, Method, SignalStore, SignalStoreBuilder, StoreHandle,
};
