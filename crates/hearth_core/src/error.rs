//! Store wiring errors

use thiserror::Error;

use crate::define::StoreTypeId;
use crate::registry::StoreInstanceId;

/// Errors raised while resolving a store for a component.
///
/// Every variant describes a structural wiring mistake in the component tree
/// (a missing provider, a stale instance id), never a transient condition.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The component is not inside any store scope
    #[error("no store scope encloses this component")]
    MissingContext,

    /// No enclosing scope provides the requested store type
    #[error("the store id could not be found within the current context for store type {type_id}")]
    NotProvided { type_id: StoreTypeId },

    /// The scope mapping points at an instance that is no longer registered
    #[error("the store {instance:?} could not be found within the collection of active stores; perhaps it has been disposed?")]
    Disposed { instance: StoreInstanceId },

    /// The registered instance does not hold the requested data/action types
    #[error("the store provided was invalid: instance {instance:?} was not created from store type {type_id}")]
    InvalidStore {
        type_id: StoreTypeId,
        instance: StoreInstanceId,
    },
}

/// Result type for store operations
pub type Result<T> = std::result::Result<T, StoreError>;
