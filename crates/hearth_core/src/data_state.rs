//! Per-record auxiliary state
//!
//! Data-state keeps locally owned state next to records that belong to
//! someone else (a list coming from props, a query result). Each piece of
//! state is a [`RecordOf<S>`] keyed by the id of the record it augments; at
//! read time the state is merged onto a copy of the record as a
//! [`WithState`] composite.
//!
//! ```rust
//! use hearth_core::data_state::{compose, Identified, RecordOf, RecordSet, StateKey};
//!
//! #[derive(Clone, Debug)]
//! struct Row {
//!     id: String,
//!     name: String,
//! }
//!
//! impl Identified for Row {
//!     fn id(&self) -> &str {
//!         &self.id
//!     }
//! }
//!
//! #[derive(Clone, Debug, Default, PartialEq)]
//! struct Expanded {
//!     open: bool,
//! }
//!
//! const EXPANDED: StateKey = StateKey::new("expanded");
//!
//! let records = RecordSet::from_records(&[RecordOf::new("a", Expanded { open: true })]);
//! let row = Row { id: "a".into(), name: "Foo".into() };
//! let composite = compose(&row, &records, EXPANDED, &|state, _| state);
//!
//! assert_eq!(composite.name, "Foo");
//! assert!(composite.state().open);
//! ```

use std::cell::RefCell;
use std::fmt;
use std::ops::Deref;
use std::rc::Rc;

use indexmap::IndexMap;
use serde::ser::Error as _;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;

/// Anything that carries a record id
///
/// Implemented for `str` and `String` as well, so a raw id can be used
/// wherever an item is accepted.
pub trait Identified {
    fn id(&self) -> &str;
}

impl Identified for str {
    fn id(&self) -> &str {
        self
    }
}

impl Identified for String {
    fn id(&self) -> &str {
        self
    }
}

impl<T: Identified + ?Sized> Identified for &T {
    fn id(&self) -> &str {
        T::id(self)
    }
}

/// Auxiliary state keyed by the id of the record it belongs to
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordOf<S> {
    pub id: String,
    #[serde(flatten)]
    pub state: S,
}

impl<S> RecordOf<S> {
    pub fn new(id: impl Into<String>, state: S) -> Self {
        Self {
            id: id.into(),
            state,
        }
    }
}

impl<S> Identified for RecordOf<S> {
    fn id(&self) -> &str {
        &self.id
    }
}

/// Ordered, id-unique collection of auxiliary state
///
/// Ids keep the position of their first insertion; later upserts replace
/// the state in place.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordSet<S> {
    records: IndexMap<String, S>,
}

impl<S: Clone> RecordSet<S> {
    pub fn new() -> Self {
        Self {
            records: IndexMap::new(),
        }
    }

    /// Build from a record list; a repeated id keeps its first position and
    /// its last state
    pub fn from_records(records: &[RecordOf<S>]) -> Self {
        let mut set = Self::new();
        for record in records {
            set.upsert(record.id.clone(), record.state.clone());
        }
        set
    }

    /// State stored for `id`
    pub fn find_by_id(&self, id: &str) -> Option<&S> {
        self.records.get(id)
    }

    /// Insert `state` for `id`, or replace it in place if `id` is present
    pub fn upsert(&mut self, id: impl Into<String>, state: S) {
        let id = id.into();
        match self.records.get_mut(&id) {
            Some(slot) => *slot = state,
            None => {
                self.records.insert(id, state);
            }
        }
    }

    /// Iterate in collection order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &S)> + '_ {
        self.records.iter().map(|(id, state)| (id.as_str(), state))
    }

    /// Copy out as a record list
    pub fn to_records(&self) -> Vec<RecordOf<S>> {
        self.iter()
            .map(|(id, state)| RecordOf::new(id, state.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl<S: Clone + PartialEq> RecordSet<S> {
    /// Whether this set holds exactly `records`, in the same order
    pub fn matches(&self, records: &[RecordOf<S>]) -> bool {
        self.records.len() == records.len()
            && self
                .records
                .iter()
                .zip(records)
                .all(|((id, state), record)| *id == record.id && *state == record.state)
    }
}

impl<S: Clone> Default for RecordSet<S> {
    fn default() -> Self {
        Self::new()
    }
}

/// Name under which auxiliary state is attached to a composite
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct StateKey(&'static str);

impl StateKey {
    pub const fn new(name: &'static str) -> Self {
        Self(name)
    }

    pub const fn name(&self) -> &'static str {
        self.0
    }
}

/// A record with its auxiliary state attached
///
/// Derefs to the record. Serializes as the record's fields plus one extra
/// field, named by the [`StateKey`], holding the state.
#[derive(Clone, Debug, PartialEq)]
pub struct WithState<T, S> {
    item: T,
    key: StateKey,
    state: S,
}

impl<T, S> WithState<T, S> {
    pub fn new(item: T, key: StateKey, state: S) -> Self {
        Self { item, key, state }
    }

    pub fn item(&self) -> &T {
        &self.item
    }

    pub fn state(&self) -> &S {
        &self.state
    }

    pub fn key(&self) -> StateKey {
        self.key
    }

    pub fn into_parts(self) -> (T, S) {
        (self.item, self.state)
    }
}

impl<T, S> Deref for WithState<T, S> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.item
    }
}

impl<T: Serialize, S: Serialize> Serialize for WithState<T, S> {
    fn serialize<Z: Serializer>(&self, serializer: Z) -> Result<Z::Ok, Z::Error> {
        let mut fields = match serde_json::to_value(&self.item).map_err(Z::Error::custom)? {
            Value::Object(fields) => fields,
            other => {
                return Err(Z::Error::custom(format!(
                    "record with state must serialize to an object, got {other}"
                )))
            }
        };
        let state = serde_json::to_value(&self.state).map_err(Z::Error::custom)?;
        fields.insert(self.key.name().to_owned(), state);
        fields.serialize(serializer)
    }
}

/// Attach the state stored for `item` (or `S::default()`) through `delegate`
pub fn compose<T, S>(
    item: &T,
    records: &RecordSet<S>,
    key: StateKey,
    delegate: &dyn Fn(S, &T) -> S,
) -> WithState<T, S>
where
    T: Clone + Identified,
    S: Clone + Default,
{
    let state = records.find_by_id(item.id()).cloned().unwrap_or_default();
    WithState::new(item.clone(), key, delegate(state, item))
}

/// Next-state computation for a data-state setter
pub enum StateChange<S> {
    /// Assign some fields of the current state
    Merge(Box<dyn FnOnce(&mut S)>),
    /// Compute the next state from the current one
    Update(Box<dyn FnOnce(S) -> S>),
}

impl<S> StateChange<S> {
    pub fn merge<F: FnOnce(&mut S) + 'static>(f: F) -> Self {
        Self::Merge(Box::new(f))
    }

    pub fn update<F: FnOnce(S) -> S + 'static>(f: F) -> Self {
        Self::Update(Box::new(f))
    }

    pub fn apply(self, mut current: S) -> S {
        match self {
            Self::Merge(merge) => {
                merge(&mut current);
                current
            }
            Self::Update(update) => update(current),
        }
    }
}

impl<S> fmt::Debug for StateChange<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Merge(_) => f.write_str("StateChange::Merge(..)"),
            Self::Update(_) => f.write_str("StateChange::Update(..)"),
        }
    }
}

/// Held record-of-state collection with an equality gate on resync
///
/// Clones share the same collection.
pub struct DataState<S> {
    records: Rc<RefCell<Rc<RecordSet<S>>>>,
}

impl<S: Clone + Default + PartialEq + 'static> DataState<S> {
    pub fn new(records: &[RecordOf<S>]) -> Self {
        Self {
            records: Rc::new(RefCell::new(Rc::new(RecordSet::from_records(records)))),
        }
    }

    /// Adopt `records` unless they equal the held collection
    ///
    /// Returns `true` if the held collection was replaced. When it is not,
    /// [`DataState::records`] keeps returning the same `Rc`.
    pub fn sync(&self, records: &[RecordOf<S>]) -> bool {
        if self.records.borrow().matches(records) {
            return false;
        }
        *self.records.borrow_mut() = Rc::new(RecordSet::from_records(records));
        true
    }

    /// The held collection
    pub fn records(&self) -> Rc<RecordSet<S>> {
        Rc::clone(&self.records.borrow())
    }

    /// Upsert the state of `target` computed by `change`
    ///
    /// An id with no state yet starts from `S::default()` and is appended.
    pub fn set<I: Identified + ?Sized>(&self, target: &I, change: StateChange<S>) {
        let id = target.id();
        let current = self.records.borrow().find_by_id(id).cloned().unwrap_or_default();
        let next = change.apply(current);

        let mut records = self.records.borrow_mut();
        Rc::make_mut(&mut records).upsert(id, next);
    }

    /// Attach state to a single item
    pub fn compose_one<T>(&self, item: &T, key: StateKey, delegate: &dyn Fn(S, &T) -> S) -> WithState<T, S>
    where
        T: Clone + Identified,
    {
        compose(item, &self.records.borrow(), key, delegate)
    }

    /// Attach state to every item, preserving their order
    pub fn compose_all<T>(
        &self,
        items: &[T],
        key: StateKey,
        delegate: &dyn Fn(S, &T) -> S,
    ) -> Vec<WithState<T, S>>
    where
        T: Clone + Identified,
    {
        let records = self.records.borrow();
        items
            .iter()
            .map(|item| compose(item, &records, key, delegate))
            .collect()
    }
}

impl<S> DataState<S> {
    /// Whether both handles share the same collection
    pub fn ptr_eq(&self, other: &DataState<S>) -> bool {
        Rc::ptr_eq(&self.records, &other.records)
    }
}

impl<S> Clone for DataState<S> {
    fn clone(&self) -> Self {
        Self {
            records: Rc::clone(&self.records),
        }
    }
}
