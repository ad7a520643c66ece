//! Runtime error types

use hearth_core::StoreError;
use thiserror::Error;

use crate::runtime::RootId;

/// Errors surfaced by runtime entry points
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RuntimeError {
    /// A component could not resolve one of its stores
    #[error(transparent)]
    Store(#[from] StoreError),

    /// One flush re-rendered more components than the configured limit
    #[error("update depth exceeded: more than {limit} re-renders in a single flush")]
    UpdateDepthExceeded { limit: usize },

    /// The root was never mounted or has been unmounted
    #[error("root {0:?} is not mounted")]
    UnknownRoot(RootId),

    /// An entry point was called from inside a render or teardown
    #[error("runtime entry point called while the runtime is rendering")]
    Reentrant,
}

/// Result type for runtime operations
pub type Result<T> = std::result::Result<T, RuntimeError>;
