//! Store registry
//!
//! Maps instance ids to live stores. Instance ids are versioned slotmap keys,
//! so an id kept after its store was disposed never resolves to a newer
//! instance that happens to reuse the slot.

use std::any::Any;

use slotmap::{new_key_type, SlotMap};
use tracing::debug;

use crate::define::{InitialData, StoreType, StoreTypeId};
use crate::error::{Result, StoreError};
use crate::store::Store;

new_key_type! {
    /// Unique identifier for a store instance
    pub struct StoreInstanceId;
}

/// Object-safe view of a `Store<T, A>` held by the registry
pub trait AnyStore {
    /// Id of the store type the instance was created from
    fn store_type(&self) -> StoreTypeId;

    /// Number of live subscribers
    fn subscriber_count(&self) -> usize;

    /// Clear subscribers and make handles inert
    fn dispose(&self);

    fn as_any(&self) -> &dyn Any;
}

impl<T: 'static, A: 'static> AnyStore for Store<T, A> {
    fn store_type(&self) -> StoreTypeId {
        self.type_id()
    }

    fn subscriber_count(&self) -> usize {
        Store::subscriber_count(self)
    }

    fn dispose(&self) {
        Store::dispose(self);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Registry of live store instances
pub struct Registry {
    stores: SlotMap<StoreInstanceId, Box<dyn AnyStore>>,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            stores: SlotMap::with_key(),
        }
    }

    /// Create an instance of `store_type`
    ///
    /// The starting data is the type's default data with `initial` applied.
    /// The action factory runs once, here.
    pub fn create<T: Clone + 'static, A: 'static>(
        &mut self,
        store_type: &StoreType<T, A>,
        initial: Option<&InitialData<T>>,
    ) -> StoreInstanceId {
        let data = store_type.initial_data(initial);
        let id = self.stores.insert_with_key(|id| {
            Box::new(Store::new(id, store_type.id(), data, |handle| {
                store_type.build_actions(handle)
            }))
        });
        debug!("Registry::create - store type {} -> {:?}", store_type.id(), id);
        id
    }

    /// Look up a live instance with its concrete data and action types
    pub fn get<T: 'static, A: 'static>(&self, id: StoreInstanceId) -> Result<Store<T, A>> {
        let entry = self
            .stores
            .get(id)
            .ok_or(StoreError::Disposed { instance: id })?;
        entry
            .as_any()
            .downcast_ref::<Store<T, A>>()
            .cloned()
            .ok_or(StoreError::InvalidStore {
                type_id: entry.store_type(),
                instance: id,
            })
    }

    /// Store type an instance was created from
    pub fn store_type(&self, id: StoreInstanceId) -> Option<StoreTypeId> {
        self.stores.get(id).map(|store| store.store_type())
    }

    /// Remove an instance
    ///
    /// Subscribers are dropped without being notified. Returns `false` if
    /// the id was not live.
    pub fn dispose(&mut self, id: StoreInstanceId) -> bool {
        match self.stores.remove(id) {
            Some(store) => {
                if store.subscriber_count() > 0 {
                    debug!(
                        "Registry::dispose - {:?} still had {} subscriber(s)",
                        id,
                        store.subscriber_count()
                    );
                }
                store.dispose();
                debug!("Registry::dispose - {:?}", id);
                true
            }
            None => false,
        }
    }

    /// Check whether an instance is live
    pub fn contains(&self, id: StoreInstanceId) -> bool {
        self.stores.contains_key(id)
    }

    /// Number of live instances
    pub fn len(&self) -> usize {
        self.stores.len()
    }

    /// Check if the registry has no live instances
    pub fn is_empty(&self) -> bool {
        self.stores.is_empty()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}
