//! Store instances
//!
//! A [`Store`] owns the current data of one store instance, the action set
//! built for it, and an ordered list of subscribers. Data is never mutated in
//! place: every mutation installs a fresh value and then notifies subscribers
//! with it.
//!
//! Notification walks a snapshot of the subscriber list taken when
//! [`Store::replace`] starts, so callbacks may register, unregister or even
//! replace the data again without invalidating the pass. A callback that is
//! unregistered during a pass is skipped when the pass reaches it.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use smallvec::SmallVec;
use tracing::{trace, warn};

use crate::define::StoreTypeId;
use crate::registry::StoreInstanceId;

/// Subscriber callback, invoked with the newly installed data
pub type SubscriberFn<T> = Box<dyn Fn(&T)>;

struct SubscriberEntry<T> {
    key: u64,
    active: Cell<bool>,
    callback: SubscriberFn<T>,
}

/// Shared state of a store instance (data + subscribers)
pub(crate) struct StoreCell<T> {
    data: RefCell<Rc<T>>,
    subscribers: RefCell<Vec<Rc<SubscriberEntry<T>>>>,
    next_key: Cell<u64>,
    disposed: Cell<bool>,
}

impl<T: 'static> StoreCell<T> {
    fn new(data: T) -> Self {
        Self {
            data: RefCell::new(Rc::new(data)),
            subscribers: RefCell::new(Vec::new()),
            next_key: Cell::new(0),
            disposed: Cell::new(false),
        }
    }

    fn data(&self) -> Rc<T> {
        Rc::clone(&self.data.borrow())
    }

    fn replace(&self, data: T) {
        let data = Rc::new(data);
        *self.data.borrow_mut() = Rc::clone(&data);

        let snapshot: SmallVec<[Rc<SubscriberEntry<T>>; 8]> =
            self.subscribers.borrow().iter().cloned().collect();
        trace!("store notify: {} subscriber(s)", snapshot.len());

        for entry in snapshot {
            if entry.active.get() {
                (entry.callback)(&data);
            }
        }
    }

    fn register(self: &Rc<Self>, callback: SubscriberFn<T>) -> Subscription {
        let key = self.next_key.get();
        self.next_key.set(key + 1);
        self.subscribers.borrow_mut().push(Rc::new(SubscriberEntry {
            key,
            active: Cell::new(true),
            callback,
        }));

        let cell = Rc::downgrade(self);
        Subscription::new(move || {
            if let Some(cell) = cell.upgrade() {
                cell.unregister(key);
            }
        })
    }

    fn unregister(&self, key: u64) {
        self.subscribers.borrow_mut().retain(|entry| {
            if entry.key == key {
                entry.active.set(false);
                false
            } else {
                true
            }
        });
    }

    fn clear(&self) {
        for entry in self.subscribers.borrow_mut().drain(..) {
            entry.active.set(false);
        }
    }
}

/// A live store instance
///
/// Cloning a `Store` is cheap and yields another handle to the same
/// instance. The action set is built once, when the instance is created,
/// and is shared by every clone.
pub struct Store<T, A> {
    id: StoreInstanceId,
    type_id: StoreTypeId,
    cell: Rc<StoreCell<T>>,
    actions: Rc<A>,
}

impl<T: 'static, A: 'static> Store<T, A> {
    pub(crate) fn new<F>(id: StoreInstanceId, type_id: StoreTypeId, data: T, factory: F) -> Self
    where
        F: FnOnce(StoreHandle<T>) -> A,
    {
        let cell = Rc::new(StoreCell::new(data));
        let actions = Rc::new(factory(StoreHandle {
            cell: Rc::downgrade(&cell),
        }));
        Self {
            id,
            type_id,
            cell,
            actions,
        }
    }

    /// Instance id of this store
    pub fn id(&self) -> StoreInstanceId {
        self.id
    }

    /// Id of the store type this instance was created from
    pub fn type_id(&self) -> StoreTypeId {
        self.type_id
    }

    /// Current data
    pub fn data(&self) -> Rc<T> {
        self.cell.data()
    }

    /// The fixed action set of this instance
    pub fn actions(&self) -> Rc<A> {
        Rc::clone(&self.actions)
    }

    /// Install `data` as the current data and notify every subscriber with it
    ///
    /// No equality check happens here; gating is up to the subscribers.
    pub fn replace(&self, data: T) {
        self.cell.replace(data);
    }

    /// Replace the data with a value computed from the current data
    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&T) -> T,
    {
        let next = f(&self.cell.data());
        self.cell.replace(next);
    }

    /// Subscribe to data replacements
    ///
    /// Registering the same closure twice yields two independent entries.
    pub fn register<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&T) + 'static,
    {
        self.cell.register(Box::new(callback))
    }

    /// Number of live subscribers
    pub fn subscriber_count(&self) -> usize {
        self.cell.subscribers.borrow().len()
    }

    /// Handle usable by action sets and long-lived callbacks
    pub fn handle(&self) -> StoreHandle<T> {
        StoreHandle {
            cell: Rc::downgrade(&self.cell),
        }
    }

    /// Whether the instance has been disposed by its registry
    pub fn is_disposed(&self) -> bool {
        self.cell.disposed.get()
    }

    /// Drop every subscriber and make outstanding handles inert
    pub(crate) fn dispose(&self) {
        self.cell.disposed.set(true);
        self.cell.clear();
    }
}

impl<T, A> Clone for Store<T, A> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            type_id: self.type_id,
            cell: Rc::clone(&self.cell),
            actions: Rc::clone(&self.actions),
        }
    }
}

impl<T, A> fmt::Debug for Store<T, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("id", &self.id)
            .field("type_id", &self.type_id)
            .field("subscribers", &self.cell.subscribers.borrow().len())
            .finish()
    }
}

/// Mutation handle passed to a store type's action factory
///
/// Holds a weak reference to the instance, so every call reads the data that
/// is current at call time. Once the instance is disposed the handle is
/// inert: reads return `None` and writes are dropped.
pub struct StoreHandle<T> {
    cell: Weak<StoreCell<T>>,
}

impl<T: 'static> StoreHandle<T> {
    fn live(&self) -> Option<Rc<StoreCell<T>>> {
        self.cell.upgrade().filter(|cell| !cell.disposed.get())
    }

    /// Current data, or `None` once the store is gone
    pub fn get(&self) -> Option<Rc<T>> {
        self.live().map(|cell| cell.data())
    }

    /// Replace the store's data and notify subscribers
    pub fn replace(&self, data: T) {
        match self.live() {
            Some(cell) => cell.replace(data),
            None => warn!("StoreHandle::replace on a disposed store; ignoring"),
        }
    }

    /// Replace the store's data with a value computed from the current data
    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&T) -> T,
    {
        match self.live() {
            Some(cell) => {
                let next = f(&cell.data());
                cell.replace(next);
            }
            None => warn!("StoreHandle::update on a disposed store; ignoring"),
        }
    }

    /// Whether the underlying store is still live
    pub fn is_alive(&self) -> bool {
        self.live().is_some()
    }

    /// Live subscribers of the store, zero once it is gone
    pub fn subscriber_count(&self) -> usize {
        self.live().map_or(0, |cell| cell.subscribers.borrow().len())
    }
}

impl<T> Clone for StoreHandle<T> {
    fn clone(&self) -> Self {
        Self {
            cell: Weak::clone(&self.cell),
        }
    }
}

/// Capability removing exactly one subscriber entry
///
/// Dropping a `Subscription` does not unregister it; call
/// [`Subscription::unregister`] from the owner's teardown.
#[must_use = "a subscription stays registered until `unregister` is called"]
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    fn new<F: FnOnce() + 'static>(cancel: F) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// Remove the subscriber entry. Calling it again is a no-op.
    pub fn unregister(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }

    /// Whether `unregister` has not been called yet
    pub fn is_active(&self) -> bool {
        self.cancel.is_some()
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::KeyData;

    fn test_store(count: i32) -> Store<i32, ()> {
        Store::new(
            StoreInstanceId::from(KeyData::from_ffi(1)),
            StoreTypeId::next(),
            count,
            |_| (),
        )
    }

    #[test]
    fn test_replace_notifies_in_registration_order() {
        let store = test_store(0);
        let log = Rc::new(RefCell::new(Vec::new()));

        let log_a = log.clone();
        let _a = store.register(move |v| log_a.borrow_mut().push(("a", *v)));
        let log_b = log.clone();
        let _b = store.register(move |v| log_b.borrow_mut().push(("b", *v)));

        store.replace(1);
        store.replace(2);

        assert_eq!(
            *log.borrow(),
            vec![("a", 1), ("b", 1), ("a", 2), ("b", 2)]
        );
        assert_eq!(*store.data(), 2);
    }

    #[test]
    fn test_unregistered_subscriber_is_not_notified() {
        let store = test_store(0);
        let count = Rc::new(Cell::new(0));

        let c = count.clone();
        let mut sub = store.register(move |_| c.set(c.get() + 1));

        store.replace(1);
        sub.unregister();
        store.replace(2);

        assert_eq!(count.get(), 1);
        assert_eq!(store.subscriber_count(), 0);
        assert!(!sub.is_active());

        // idempotent
        sub.unregister();
    }

    #[test]
    fn test_same_callback_twice_yields_two_entries() {
        let store = test_store(0);
        let count = Rc::new(Cell::new(0));
        let callback = {
            let count = count.clone();
            Rc::new(move |_: &i32| count.set(count.get() + 1))
        };

        let cb = callback.clone();
        let mut first = store.register(move |v| cb(v));
        let cb = callback.clone();
        let _second = store.register(move |v| cb(v));

        store.replace(1);
        assert_eq!(count.get(), 2);

        first.unregister();
        store.replace(2);
        assert_eq!(count.get(), 3);
    }

    #[test]
    fn test_unregister_during_notification_skips_later_entry() {
        let store = test_store(0);
        let later_calls = Rc::new(Cell::new(0));
        let later: Rc<RefCell<Option<Subscription>>> = Rc::new(RefCell::new(None));

        let later_slot = later.clone();
        let _first = store.register(move |_| {
            if let Some(sub) = later_slot.borrow_mut().as_mut() {
                sub.unregister();
            }
        });

        let calls = later_calls.clone();
        *later.borrow_mut() = Some(store.register(move |_| calls.set(calls.get() + 1)));

        store.replace(1);
        assert_eq!(later_calls.get(), 0);
    }

    #[test]
    fn test_register_during_notification_waits_for_next_pass() {
        let store = test_store(0);
        let late_calls = Rc::new(Cell::new(0));
        let registered = Rc::new(RefCell::new(Vec::new()));

        let store_clone = store.clone();
        let late = late_calls.clone();
        let subs = registered.clone();
        let _first = store.register(move |_| {
            if subs.borrow().is_empty() {
                let late = late.clone();
                subs.borrow_mut()
                    .push(store_clone.register(move |_| late.set(late.get() + 1)));
            }
        });

        store.replace(1);
        assert_eq!(late_calls.get(), 0);

        store.replace(2);
        assert_eq!(late_calls.get(), 1);
    }

    #[test]
    fn test_reentrant_replace_runs_to_completion() {
        let store = test_store(0);
        let seen = Rc::new(RefCell::new(Vec::new()));

        let handle = store.handle();
        let _bump = store.register(move |v| {
            if *v == 1 {
                handle.replace(10);
            }
        });
        let log = seen.clone();
        let _log = store.register(move |v| log.borrow_mut().push(*v));

        store.replace(1);

        // the nested pass finishes before the outer pass reaches `_log`
        assert_eq!(*seen.borrow(), vec![10, 1]);
        assert_eq!(*store.data(), 10);
    }

    #[test]
    fn test_handle_reads_current_data() {
        let store = test_store(5);
        let handle = store.handle();

        store.replace(7);
        assert_eq!(handle.get().as_deref(), Some(&7));

        handle.update(|v| v + 1);
        assert_eq!(*store.data(), 8);
    }

    #[test]
    fn test_disposed_handle_is_inert() {
        let store = test_store(1);
        let handle = store.handle();
        let count = Rc::new(Cell::new(0));
        let c = count.clone();
        let sub = store.register(move |_| c.set(c.get() + 1));

        store.dispose();

        assert!(store.is_disposed());
        assert!(!handle.is_alive());
        assert!(handle.get().is_none());
        handle.replace(3);
        assert_eq!(*store.data(), 1);
        assert_eq!(count.get(), 0);
        assert_eq!(store.subscriber_count(), 0);
        drop(sub);
    }
}
