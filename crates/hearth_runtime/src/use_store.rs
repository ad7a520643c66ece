//! Store binding hooks
//!
//! A component binds to the nearest store instance of a type provided above
//! it. The binding keeps the last selection; a store change re-renders the
//! component only when the selection changes.

use std::cell::RefCell;
use std::rc::Rc;

use hearth_core::{StoreType, Subscription};
use tracing::trace;

use crate::cx::{Cx, ForceUpdate};
use crate::error::Result;

type Selector<T, Sel> = Rc<dyn Fn(&T) -> Sel>;
type ChangeFn<Sel> = Rc<dyn Fn(&Sel)>;

struct Binding<T, Sel> {
    selection: RefCell<Sel>,
    selector: RefCell<Selector<T, Sel>>,
    on_change: RefCell<Option<ChangeFn<Sel>>>,
    subscription: RefCell<Option<Subscription>>,
    force_update: ForceUpdate,
}

impl<T: 'static, Sel: Clone + PartialEq + 'static> Binding<T, Sel> {
    fn notify(&self, data: &T) {
        let selector = Rc::clone(&self.selector.borrow());
        let next = selector(data);
        if *self.selection.borrow() == next {
            return;
        }

        *self.selection.borrow_mut() = next.clone();
        trace!("store binding: selection changed for {:?}", self.force_update.component());
        self.force_update.call();

        let on_change = self.on_change.borrow().clone();
        if let Some(on_change) = on_change {
            on_change(&next);
        }
    }

    fn release(&self) {
        let subscription = self.subscription.borrow_mut().take();
        if let Some(mut subscription) = subscription {
            subscription.unregister();
        }
    }
}

impl Cx<'_> {
    /// Bind to the nearest `store_type` instance, selecting the whole data
    ///
    /// Returns a copy of the current data and the instance's actions. The
    /// actions `Rc` is the same on every render.
    pub fn use_store<T, A>(&mut self, store_type: &StoreType<T, A>) -> Result<(T, Rc<A>)>
    where
        T: Clone + PartialEq + 'static,
        A: 'static,
    {
        self.bind_store(store_type, Rc::new(T::clone), None)
    }

    /// Bind to the nearest `store_type` instance through `selector`
    ///
    /// Store changes that leave the selection equal do not re-render.
    pub fn use_store_select<T, A, Sel, F>(
        &mut self,
        store_type: &StoreType<T, A>,
        selector: F,
    ) -> Result<(Sel, Rc<A>)>
    where
        T: Clone + 'static,
        A: 'static,
        Sel: Clone + PartialEq + 'static,
        F: Fn(&T) -> Sel + 'static,
    {
        self.bind_store(store_type, Rc::new(selector), None)
    }

    /// Like [`Cx::use_store_select`], also calling `on_change` with each new
    /// selection after the re-render is requested
    pub fn use_store_with<T, A, Sel, F, C>(
        &mut self,
        store_type: &StoreType<T, A>,
        selector: F,
        on_change: C,
    ) -> Result<(Sel, Rc<A>)>
    where
        T: Clone + 'static,
        A: 'static,
        Sel: Clone + PartialEq + 'static,
        F: Fn(&T) -> Sel + 'static,
        C: Fn(&Sel) + 'static,
    {
        self.bind_store(store_type, Rc::new(selector), Some(Rc::new(on_change)))
    }

    fn bind_store<T, A, Sel>(
        &mut self,
        store_type: &StoreType<T, A>,
        selector: Selector<T, Sel>,
        on_change: Option<ChangeFn<Sel>>,
    ) -> Result<(Sel, Rc<A>)>
    where
        T: Clone + 'static,
        A: 'static,
        Sel: Clone + PartialEq + 'static,
    {
        let instance = self.shared().scopes.borrow().resolve(self.scope(), store_type.id())?;
        let store = self.shared().registry.borrow().get::<T, A>(instance)?;

        let force_update = self.force_update_handle();
        let (binding, created) = self.hook_state(|| {
            Rc::new(Binding {
                selection: RefCell::new(selector(&store.data())),
                selector: RefCell::new(Rc::clone(&selector)),
                on_change: RefCell::new(on_change.clone()),
                subscription: RefCell::new(None),
                force_update,
            })
        });
        let binding = Rc::clone(binding);

        if created {
            let subscriber = Rc::clone(&binding);
            let subscription = store.register(move |data: &T| subscriber.notify(data));
            *binding.subscription.borrow_mut() = Some(subscription);

            let owner = Rc::clone(&binding);
            self.on_teardown(move || owner.release());
        } else {
            *binding.selector.borrow_mut() = selector;
            *binding.on_change.borrow_mut() = on_change;
        }

        let selection = binding.selection.borrow().clone();
        Ok((selection, store.actions()))
    }
}
