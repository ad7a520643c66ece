//! Hearth Core
//!
//! Shared, tree-scoped application state for component-tree UIs:
//!
//! - **Store types**: immutable descriptors declared with [`define_store`]
//! - **Stores**: live instances holding data, a fixed action set, and subscribers
//! - **Registry**: the live instances of one runtime, keyed by instance id
//! - **Scopes**: which instance of each store type a subtree sees
//! - **Data-state**: locally held per-record state merged onto external records
//!
//! The core has no scheduler. A host runtime mounts scope providers, asks the
//! [`ScopeArena`] which instance a component should use, and re-renders
//! components when their subscriptions say so.
//!
//! # Example
//!
//! ```rust
//! use hearth_core::{define_store, Registry, ScopeArena, ScopeProvider};
//!
//! #[derive(Clone, Debug, PartialEq)]
//! struct Counter {
//!     count: i32,
//! }
//!
//! let counter = define_store()
//!     .data(Counter { count: 0 })
//!     .actions(|store| -> Box<dyn Fn(i32)> {
//!         Box::new(move |by: i32| store.update(|c| Counter { count: c.count + by }))
//!     })
//!     .create();
//!
//! let mut registry = Registry::new();
//! let mut scopes = ScopeArena::new();
//! let mut provider = ScopeProvider::new();
//! let scope = provider.mount(&[counter.provide()], None, &mut registry, &mut scopes);
//!
//! let id = scopes.resolve(Some(scope), counter.id()).unwrap();
//! let store = registry.get::<Counter, Box<dyn Fn(i32)>>(id).unwrap();
//! let _sub = store.register(|c| println!("count is now {}", c.count));
//!
//! (store.actions())(5);
//! assert_eq!(store.data().count, 5);
//!
//! provider.unmount(&mut registry, &mut scopes);
//! assert!(registry.is_empty());
//! ```

pub mod data_state;
pub mod define;
pub mod error;
pub mod registry;
pub mod scope;
pub mod store;

pub use data_state::{
    compose, DataState, Identified, RecordOf, RecordSet, StateChange, StateKey, WithState,
};
pub use define::{
    define_store, ActionsStep, DataStep, InitialData, ProviderTag, StoreBuilder, StoreType,
    StoreTypeId,
};
pub use error::{Result, StoreError};
pub use registry::{AnyStore, Registry, StoreInstanceId};
pub use scope::{ScopeArena, ScopeId, ScopePhase, ScopeProvider};
pub use store::{Store, StoreHandle, Subscription};
