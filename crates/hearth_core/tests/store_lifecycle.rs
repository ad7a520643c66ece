//! Integration tests for store instances across registry and scopes
//!
//! These tests verify that:
//! - A provider's instances are reachable through the scope arena
//! - Stale scope mappings and mistyped lookups fail with distinct errors
//! - Handles and subscriptions outliving their store stay harmless

use std::cell::RefCell;
use std::rc::Rc;

use hearth_core::{define_store, Registry, ScopeArena, ScopeProvider, StoreError, StoreHandle};
use pretty_assertions::assert_eq;

#[derive(Clone, Debug, PartialEq)]
struct Cart {
    items: Vec<String>,
}

struct CartActions {
    store: StoreHandle<Cart>,
}

impl CartActions {
    fn add(&self, item: &str) {
        let item = item.to_string();
        self.store.update(move |cart| {
            let mut items = cart.items.clone();
            items.push(item);
            Cart { items }
        });
    }
}

#[test]
fn test_actions_mutate_the_scoped_instance() {
    let cart = define_store()
        .data(Cart { items: Vec::new() })
        .actions(|store| CartActions { store })
        .create();

    let mut registry = Registry::new();
    let mut scopes = ScopeArena::new();
    let mut provider = ScopeProvider::new();
    let scope = provider.mount(&[cart.provide()], None, &mut registry, &mut scopes);

    let id = scopes.resolve(Some(scope), cart.id()).unwrap();
    let store = registry.get::<Cart, CartActions>(id).unwrap();

    let seen = Rc::new(RefCell::new(Vec::new()));
    let mut subscription = {
        let seen = Rc::clone(&seen);
        store.register(move |cart: &Cart| seen.borrow_mut().push(cart.items.len()))
    };

    store.actions().add("tea");
    store.actions().add("milk");
    assert_eq!(*seen.borrow(), vec![1, 2]);
    assert_eq!(store.data().items, vec!["tea".to_string(), "milk".to_string()]);

    subscription.unregister();
    store.actions().add("sugar");
    assert_eq!(*seen.borrow(), vec![1, 2]);

    provider.unmount(&mut registry, &mut scopes);
    assert!(registry.is_empty());
    assert!(scopes.is_empty());
}

#[test]
fn test_stale_and_mistyped_lookups() {
    let cart = define_store().data(Cart { items: Vec::new() }).create();

    let mut registry = Registry::new();
    let mut scopes = ScopeArena::new();
    let mut provider = ScopeProvider::new();
    let scope = provider.mount(&[cart.provide()], None, &mut registry, &mut scopes);
    let id = scopes.resolve(Some(scope), cart.id()).unwrap();

    let mistyped = registry.get::<String, ()>(id).unwrap_err();
    assert_eq!(
        mistyped,
        StoreError::InvalidStore {
            type_id: cart.id(),
            instance: id,
        }
    );

    let handle = registry.get::<Cart, ()>(id).unwrap().handle();
    assert!(registry.dispose(id));

    // the scope still maps the type, but the instance is gone
    assert_eq!(scopes.resolve(Some(scope), cart.id()), Ok(id));
    assert_eq!(
        registry.get::<Cart, ()>(id).unwrap_err(),
        StoreError::Disposed { instance: id }
    );

    assert!(!handle.is_alive());
    handle.replace(Cart {
        items: vec!["ignored".into()],
    });
    assert!(handle.get().is_none());

    provider.unmount(&mut registry, &mut scopes);
    assert_eq!(
        scopes.resolve(Some(scope), cart.id()),
        Err(StoreError::MissingContext)
    );
}
