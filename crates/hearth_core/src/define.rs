//! Store definitions
//!
//! A store type is declared once with the builder returned by
//! [`define_store`]:
//!
//! ```rust
//! use hearth_core::define_store;
//!
//! #[derive(Clone, Debug, Default, PartialEq)]
//! struct Counter {
//!     count: i32,
//! }
//!
//! struct CounterActions {
//!     increment: Box<dyn Fn()>,
//! }
//!
//! let counter = define_store()
//!     .data(Counter::default())
//!     .actions(|store| CounterActions {
//!         increment: Box::new(move || store.update(|c| Counter { count: c.count + 1 })),
//!     })
//!     .create();
//!
//! // Provide it to a scope, optionally overriding the default data
//! let _tag = counter.provide_patched(|c| c.count = 10);
//! ```
//!
//! The builder steps only expose the next legal call: `data` must come
//! first, `actions` is optional, and `create` consumes the builder so a
//! created type can never be altered.

use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::registry::{Registry, StoreInstanceId};
use crate::store::StoreHandle;

static NEXT_STORE_TYPE_ID: AtomicU64 = AtomicU64::new(1);

/// Unique identifier of a store type
///
/// Allocated from a process-wide counter when a type is created; two store
/// types never share an id, even if their default data is identical.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StoreTypeId(u64);

impl StoreTypeId {
    pub(crate) fn next() -> Self {
        Self(NEXT_STORE_TYPE_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw numeric value
    pub fn to_raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for StoreTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Factory building an instance's action set from its mutation handle
pub type ActionsFactory<T, A> = dyn Fn(StoreHandle<T>) -> A;

struct StoreTypeInner<T, A> {
    id: StoreTypeId,
    default_data: T,
    actions: Box<ActionsFactory<T, A>>,
}

/// Immutable store type descriptor
///
/// Cheap to clone; clones share the same id.
pub struct StoreType<T, A = ()> {
    inner: Rc<StoreTypeInner<T, A>>,
}

impl<T: Clone + 'static, A: 'static> StoreType<T, A> {
    /// Unique id of this type
    pub fn id(&self) -> StoreTypeId {
        self.inner.id
    }

    /// Data every new instance starts from
    pub fn default_data(&self) -> &T {
        &self.inner.default_data
    }

    /// Starting data for a new instance, with an optional override applied
    pub fn initial_data(&self, initial: Option<&InitialData<T>>) -> T {
        match initial {
            None => self.inner.default_data.clone(),
            Some(InitialData::Value(value)) => value.clone(),
            Some(InitialData::Patch(patch)) => {
                let mut data = self.inner.default_data.clone();
                patch(&mut data);
                data
            }
        }
    }

    pub(crate) fn build_actions(&self, handle: StoreHandle<T>) -> A {
        (self.inner.actions)(handle)
    }

    /// Provider tag creating an instance with the default data
    pub fn provide(&self) -> ProviderTag {
        ProviderTag::new(self.clone(), None)
    }

    /// Provider tag creating an instance that starts from `data`
    pub fn provide_with(&self, data: T) -> ProviderTag {
        ProviderTag::new(self.clone(), Some(InitialData::Value(data)))
    }

    /// Provider tag creating an instance whose default data is patched
    ///
    /// Fields the patch does not touch keep their default values.
    pub fn provide_patched<F>(&self, patch: F) -> ProviderTag
    where
        F: Fn(&mut T) + 'static,
    {
        ProviderTag::new(self.clone(), Some(InitialData::Patch(Rc::new(patch))))
    }
}

impl<T, A> Clone for StoreType<T, A> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T, A> fmt::Debug for StoreType<T, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreType")
            .field("id", &self.inner.id)
            .finish_non_exhaustive()
    }
}

/// Per-instance override of a store type's default data
pub enum InitialData<T> {
    /// Start from this value instead of the default
    Value(T),
    /// Start from the default with these field assignments applied
    Patch(Rc<dyn Fn(&mut T)>),
}

impl<T: Clone> Clone for InitialData<T> {
    fn clone(&self) -> Self {
        match self {
            Self::Value(value) => Self::Value(value.clone()),
            Self::Patch(patch) => Self::Patch(Rc::clone(patch)),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for InitialData<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Self::Patch(_) => f.write_str("Patch(..)"),
        }
    }
}

/// Type-erased request to instantiate one store type inside a scope
///
/// Built with [`StoreType::provide`] and friends; a scope provider takes a
/// heterogeneous list of tags.
#[derive(Clone)]
pub struct ProviderTag {
    type_id: StoreTypeId,
    create: Rc<dyn Fn(&mut Registry) -> StoreInstanceId>,
}

impl ProviderTag {
    fn new<T: Clone + 'static, A: 'static>(
        store_type: StoreType<T, A>,
        initial: Option<InitialData<T>>,
    ) -> Self {
        Self {
            type_id: store_type.id(),
            create: Rc::new(move |registry| registry.create(&store_type, initial.as_ref())),
        }
    }

    /// Id of the store type this tag instantiates
    pub fn type_id(&self) -> StoreTypeId {
        self.type_id
    }

    /// Create the instance in `registry`
    pub fn instantiate(&self, registry: &mut Registry) -> StoreInstanceId {
        (self.create)(registry)
    }
}

impl fmt::Debug for ProviderTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderTag")
            .field("type_id", &self.type_id)
            .finish_non_exhaustive()
    }
}

// =========================================================================
// Builder
// =========================================================================

/// Start declaring a store type
pub fn define_store() -> StoreBuilder {
    StoreBuilder { _private: () }
}

/// First builder step: only default data can be supplied
pub struct StoreBuilder {
    _private: (),
}

impl StoreBuilder {
    /// Set the default data every instance starts from
    pub fn data<T: Clone + 'static>(self, default_data: T) -> DataStep<T> {
        DataStep { default_data }
    }
}

/// Builder step after the data has been declared
pub struct DataStep<T> {
    default_data: T,
}

impl<T: Clone + 'static> DataStep<T> {
    /// Declare the action set, built once per instance from its handle
    pub fn actions<A, F>(self, factory: F) -> ActionsStep<T, A>
    where
        F: Fn(StoreHandle<T>) -> A + 'static,
    {
        ActionsStep {
            default_data: self.default_data,
            actions: Box::new(factory),
        }
    }

    /// Finish a store type without actions
    pub fn create(self) -> StoreType<T, ()> {
        ActionsStep {
            default_data: self.default_data,
            actions: Box::new(|_| ()),
        }
        .create()
    }
}

/// Final builder step
pub struct ActionsStep<T, A> {
    default_data: T,
    actions: Box<ActionsFactory<T, A>>,
}

impl<T: Clone + 'static, A: 'static> ActionsStep<T, A> {
    /// Freeze the declaration into a store type with a fresh id
    pub fn create(self) -> StoreType<T, A> {
        StoreType {
            inner: Rc::new(StoreTypeInner {
                id: StoreTypeId::next(),
                default_data: self.default_data,
                actions: self.actions,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Debug, Default, PartialEq)]
    struct Settings {
        something: String,
        level: u8,
    }

    #[test]
    fn test_each_create_gets_a_fresh_id() {
        let a = define_store().data(Settings::default()).create();
        let b = define_store().data(Settings::default()).create();

        assert_ne!(a.id(), b.id());
        assert_eq!(a.clone().id(), a.id());
    }

    #[test]
    fn test_initial_data_value_and_patch() {
        let settings = define_store()
            .data(Settings {
                something: "more".into(),
                level: 3,
            })
            .create();

        assert_eq!(settings.initial_data(None).something, "more");

        let replaced = settings.initial_data(Some(&InitialData::Value(Settings {
            something: "blah".into(),
            level: 0,
        })));
        assert_eq!(replaced.level, 0);

        let patch: Rc<dyn Fn(&mut Settings)> = Rc::new(|s| s.something = "blah".into());
        let patched = settings.initial_data(Some(&InitialData::Patch(patch)));
        assert_eq!(
            patched,
            Settings {
                something: "blah".into(),
                level: 3,
            }
        );

        // the descriptor itself is untouched
        assert_eq!(settings.default_data().something, "more");
    }

    #[test]
    fn test_provider_tag_carries_type_id() {
        let settings = define_store().data(Settings::default()).create();
        assert_eq!(settings.provide().type_id(), settings.id());
        assert_eq!(settings.provide_patched(|s| s.level = 1).type_id(), settings.id());
    }
}
