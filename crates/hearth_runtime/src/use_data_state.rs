//! Per-item state hook
//!
//! Keeps a [`DataState`] for the component and composes it onto the items it
//! renders. A `records` base that changed since the previous render is adopted
//! unless it equals the held collection; local edits go through
//! [`DataStateSetter`].

use std::fmt;
use std::rc::Rc;

use hearth_core::{DataState, Identified, RecordOf, RecordSet, StateChange, StateKey, WithState};
use tracing::trace;

use crate::cx::{Cx, ForceUpdate};

/// Local edits survive re-renders until the caller passes a different base
struct DataStateSlot<S> {
    setter: DataStateSetter<S>,
    base: Vec<RecordOf<S>>,
}

/// Stable handle editing a component's data state
///
/// Every edit re-renders the owning component.
pub struct DataStateSetter<S> {
    state: DataState<S>,
    force_update: ForceUpdate,
}

impl<S: Clone + Default + PartialEq + 'static> DataStateSetter<S> {
    /// Apply `change` to the state of `target`
    pub fn set<I: Identified + ?Sized>(&self, target: &I, change: StateChange<S>) {
        self.state.set(target, change);
        self.force_update.call();
    }

    /// Mutate the state of `target` in place
    pub fn merge<I, F>(&self, target: &I, f: F)
    where
        I: Identified + ?Sized,
        F: FnOnce(&mut S) + 'static,
    {
        self.set(target, StateChange::merge(f));
    }

    /// Replace the state of `target` with a value computed from the current one
    pub fn update<I, F>(&self, target: &I, f: F)
    where
        I: Identified + ?Sized,
        F: FnOnce(S) -> S + 'static,
    {
        self.set(target, StateChange::update(f));
    }

    /// Current collection
    pub fn records(&self) -> Rc<RecordSet<S>> {
        self.state.records()
    }
}

impl<S> DataStateSetter<S> {
    /// Whether both setters edit the same collection
    pub fn ptr_eq(&self, other: &DataStateSetter<S>) -> bool {
        self.state.ptr_eq(&other.state)
    }
}

impl<S> Clone for DataStateSetter<S> {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
            force_update: self.force_update.clone(),
        }
    }
}

impl<S> fmt::Debug for DataStateSetter<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataStateSetter")
            .field("component", &self.force_update.component())
            .finish()
    }
}

impl Cx<'_> {
    /// Compose per-item state onto `items`
    ///
    /// `delegate` receives the stored state (or `S::default()`) and the item
    /// and returns the state to attach. Returns the composed items, the
    /// setter, and the held collection.
    pub fn use_data_state<T, S, D>(
        &mut self,
        items: &[T],
        records: &[RecordOf<S>],
        key: StateKey,
        delegate: D,
    ) -> (Vec<WithState<T, S>>, DataStateSetter<S>, Rc<RecordSet<S>>)
    where
        T: Clone + Identified,
        S: Clone + Default + PartialEq + 'static,
        D: Fn(S, &T) -> S,
    {
        let setter = self.data_state_slot(records);
        let composed = setter.state.compose_all(items, key, &delegate);
        let held = setter.state.records();
        (composed, setter, held)
    }

    /// Single-item form of [`Cx::use_data_state`]
    pub fn use_data_state_one<T, S, D>(
        &mut self,
        item: &T,
        records: &[RecordOf<S>],
        key: StateKey,
        delegate: D,
    ) -> (WithState<T, S>, DataStateSetter<S>, Rc<RecordSet<S>>)
    where
        T: Clone + Identified,
        S: Clone + Default + PartialEq + 'static,
        D: Fn(S, &T) -> S,
    {
        let setter = self.data_state_slot(records);
        let composed = setter.state.compose_one(item, key, &delegate);
        let held = setter.state.records();
        (composed, setter, held)
    }

    fn data_state_slot<S>(&mut self, records: &[RecordOf<S>]) -> DataStateSetter<S>
    where
        S: Clone + Default + PartialEq + 'static,
    {
        let force_update = self.force_update_handle();
        let (slot, created) = self.hook_state(|| DataStateSlot {
            setter: DataStateSetter {
                state: DataState::new(records),
                force_update,
            },
            base: records.to_vec(),
        });
        if !created && slot.base.as_slice() != records {
            slot.base = records.to_vec();
            if slot.setter.state.sync(records) {
                trace!("use_data_state: adopted {} new base record(s)", records.len());
            }
        }
        slot.setter.clone()
    }
}
