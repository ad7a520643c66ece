//! Store scopes
//!
//! Each mounted scope provider owns one record in a [`ScopeArena`]: the
//! instances it created, keyed by store type, plus a pointer to the
//! enclosing scope. Resolving a store type walks the parent pointers from a
//! component's scope outwards, so the nearest provider of a type wins and
//! nested providers shadow their ancestors for their own subtree only.

use rustc_hash::FxHashMap;
use slotmap::{new_key_type, SlotMap};
use smallvec::SmallVec;
use tracing::debug;

use crate::define::{ProviderTag, StoreTypeId};
use crate::error::{Result, StoreError};
use crate::registry::{Registry, StoreInstanceId};

new_key_type! {
    /// Unique identifier for a mounted scope
    pub struct ScopeId;
}

struct ScopeRecord {
    parent: Option<ScopeId>,
    stores: FxHashMap<StoreTypeId, StoreInstanceId>,
}

/// Arena of live scope records
pub struct ScopeArena {
    scopes: SlotMap<ScopeId, ScopeRecord>,
}

impl ScopeArena {
    pub fn new() -> Self {
        Self {
            scopes: SlotMap::with_key(),
        }
    }

    /// Add a scope nested in `parent`
    pub fn push(
        &mut self,
        parent: Option<ScopeId>,
        stores: FxHashMap<StoreTypeId, StoreInstanceId>,
    ) -> ScopeId {
        self.scopes.insert(ScopeRecord { parent, stores })
    }

    /// Remove a scope record
    pub fn remove(&mut self, id: ScopeId) -> bool {
        self.scopes.remove(id).is_some()
    }

    /// Enclosing scope of `id`
    pub fn parent(&self, id: ScopeId) -> Option<ScopeId> {
        self.scopes.get(id).and_then(|record| record.parent)
    }

    /// Instance of `type_id` visible from `scope`
    ///
    /// Walks from `scope` to the root; the first scope providing the type
    /// wins.
    pub fn resolve(&self, scope: Option<ScopeId>, type_id: StoreTypeId) -> Result<StoreInstanceId> {
        let mut current = match scope {
            Some(id) if self.scopes.contains_key(id) => Some(id),
            _ => return Err(StoreError::MissingContext),
        };

        while let Some(id) = current {
            let Some(record) = self.scopes.get(id) else {
                break;
            };
            if let Some(&instance) = record.stores.get(&type_id) {
                return Ok(instance);
            }
            current = record.parent;
        }

        Err(StoreError::NotProvided { type_id })
    }

    /// Number of live scopes
    pub fn len(&self) -> usize {
        self.scopes.len()
    }

    /// Check if no scope is live
    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }
}

impl Default for ScopeArena {
    fn default() -> Self {
        Self::new()
    }
}

/// Lifecycle phase of a scope provider
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ScopePhase {
    #[default]
    Unmounted,
    Mounting,
    Active,
    Unmounting,
}

/// Creates store instances for a subtree and disposes them again
///
/// The host calls [`ScopeProvider::mount`] when the provider node mounts and
/// [`ScopeProvider::unmount`] after every descendant has unmounted.
#[derive(Debug, Default)]
pub struct ScopeProvider {
    phase: ScopePhase,
    scope: Option<ScopeId>,
    created: SmallVec<[(StoreTypeId, StoreInstanceId); 4]>,
}

impl ScopeProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create one instance per tag and publish them as a new scope
    ///
    /// If a type appears twice in `tags`, the later tag's instance is the one
    /// descendants see; both are disposed on unmount.
    pub fn mount(
        &mut self,
        tags: &[ProviderTag],
        parent: Option<ScopeId>,
        registry: &mut Registry,
        scopes: &mut ScopeArena,
    ) -> ScopeId {
        if let (ScopePhase::Active, Some(scope)) = (self.phase, self.scope) {
            debug!("ScopeProvider::mount - already active as {:?}", scope);
            return scope;
        }

        self.phase = ScopePhase::Mounting;
        let mut stores = FxHashMap::default();
        for tag in tags {
            let instance = tag.instantiate(registry);
            stores.insert(tag.type_id(), instance);
            self.created.push((tag.type_id(), instance));
        }

        let scope = scopes.push(parent, stores);
        debug!(
            "ScopeProvider::mount - {:?} (parent {:?}) with {} store(s)",
            scope,
            parent,
            self.created.len()
        );
        self.scope = Some(scope);
        self.phase = ScopePhase::Active;
        scope
    }

    /// Dispose every created instance, newest first, and drop the scope
    pub fn unmount(&mut self, registry: &mut Registry, scopes: &mut ScopeArena) {
        if self.phase != ScopePhase::Active {
            return;
        }

        self.phase = ScopePhase::Unmounting;
        while let Some((_, instance)) = self.created.pop() {
            registry.dispose(instance);
        }
        if let Some(scope) = self.scope.take() {
            scopes.remove(scope);
            debug!("ScopeProvider::unmount - {:?}", scope);
        }
        self.phase = ScopePhase::Unmounted;
    }

    /// Current lifecycle phase
    pub fn phase(&self) -> ScopePhase {
        self.phase
    }

    /// Scope published while active
    pub fn scope(&self) -> Option<ScopeId> {
        self.scope
    }

    /// Instances created by this provider, in creation order
    pub fn instances(&self) -> impl Iterator<Item = (StoreTypeId, StoreInstanceId)> + '_ {
        self.created.iter().copied()
    }

    /// Whether the tag list names the same store types, in the same order,
    /// as the ones this provider mounted with
    pub fn matches(&self, tags: &[ProviderTag]) -> bool {
        self.created.len() == tags.len()
            && self
                .created
                .iter()
                .zip(tags)
                .all(|((type_id, _), tag)| *type_id == tag.type_id())
    }
}
