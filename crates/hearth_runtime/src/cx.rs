//! Hook context
//!
//! A [`Cx`] is handed to a component's render closure. Hooks are matched to
//! their state by call order, so a component must call the same hooks in the
//! same order on every render; breaking that rule is a programming error and
//! panics.

use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use hearth_core::ScopeId;

use crate::runtime::{ComponentId, Shared};

/// Per-component hook state, kept across renders
#[derive(Default)]
pub(crate) struct HookSlots {
    slots: Vec<Box<dyn Any>>,
    cursor: usize,
    teardown: Vec<Box<dyn FnOnce()>>,
    mounted: bool,
}

impl HookSlots {
    pub(crate) fn begin(&mut self) {
        self.cursor = 0;
    }

    pub(crate) fn finish(&mut self) {
        self.mounted = true;
    }

    /// Run unmount callbacks in registration order
    pub(crate) fn teardown(self) {
        for callback in self.teardown {
            callback();
        }
    }
}

/// Render context of one component
pub struct Cx<'a> {
    shared: &'a Rc<Shared>,
    component: ComponentId,
    name: &'a str,
    scope: Option<ScopeId>,
    hooks: &'a mut HookSlots,
}

impl<'a> Cx<'a> {
    pub(crate) fn new(
        shared: &'a Rc<Shared>,
        component: ComponentId,
        name: &'a str,
        scope: Option<ScopeId>,
        hooks: &'a mut HookSlots,
    ) -> Self {
        Self {
            shared,
            component,
            name,
            scope,
            hooks,
        }
    }

    /// Id of the component being rendered
    pub fn component(&self) -> ComponentId {
        self.component
    }

    /// Name the component was mounted with
    pub fn name(&self) -> &str {
        self.name
    }

    /// Nearest enclosing store scope
    pub fn scope(&self) -> Option<ScopeId> {
        self.scope
    }

    /// Whether this is the component's first render
    pub fn is_first_render(&self) -> bool {
        !self.hooks.mounted
    }

    pub(crate) fn shared(&self) -> &Rc<Shared> {
        self.shared
    }

    /// Next hook slot, created with `init` on the first render
    ///
    /// The flag is `true` when the slot was just created.
    pub(crate) fn hook_state<T: 'static>(&mut self, init: impl FnOnce() -> T) -> (&mut T, bool) {
        let index = self.hooks.cursor;
        self.hooks.cursor += 1;

        let created = index == self.hooks.slots.len();
        if created {
            if self.hooks.mounted {
                panic!(
                    "component `{}` called more hooks than on its first render",
                    self.name
                );
            }
            self.hooks.slots.push(Box::new(init()));
        }

        let name = self.name;
        match self.hooks.slots[index].downcast_mut::<T>() {
            Some(slot) => (slot, created),
            None => panic!("hook order changed between renders of component `{name}`"),
        }
    }

    pub(crate) fn hook<T: 'static>(&mut self, init: impl FnOnce() -> T) -> &mut T {
        self.hook_state(init).0
    }

    /// Queue a callback to run when the component unmounts
    pub(crate) fn on_teardown(&mut self, callback: impl FnOnce() + 'static) {
        self.hooks.teardown.push(Box::new(callback));
    }

    pub(crate) fn force_update_handle(&self) -> ForceUpdate {
        ForceUpdate {
            shared: Rc::downgrade(self.shared),
            component: self.component,
        }
    }

    // =========================================================================
    // Basic hooks
    // =========================================================================

    /// Stable handle re-rendering this component
    pub fn use_force_update(&mut self) -> ForceUpdate {
        let handle = self.force_update_handle();
        self.hook(|| handle).clone()
    }

    /// Mutable cell that keeps its identity for the component's lifetime
    pub fn use_ref<T: 'static>(&mut self, init: impl FnOnce() -> T) -> Rc<RefCell<T>> {
        Rc::clone(self.hook(|| Rc::new(RefCell::new(init()))))
    }

    /// Run `callback` once, when the component unmounts
    ///
    /// Every render may pass a new closure; the one from the latest render
    /// is the one that runs.
    pub fn use_unmount<F: FnOnce() + 'static>(&mut self, callback: F) {
        type Latest = Rc<RefCell<Option<Box<dyn FnOnce()>>>>;

        let (latest, created) = self.hook_state(|| -> Latest { Rc::new(RefCell::new(None)) });
        let latest = Rc::clone(latest);
        *latest.borrow_mut() = Some(Box::new(callback));

        if created {
            self.on_teardown(move || {
                let callback = latest.borrow_mut().take();
                if let Some(callback) = callback {
                    callback();
                }
            });
        }
    }
}

/// Re-renders one component when called
///
/// Calling it while the runtime is rendering queues the component for the
/// current flush; otherwise the component re-renders before `call` returns.
/// A handle whose component or runtime is gone does nothing.
#[derive(Clone)]
pub struct ForceUpdate {
    shared: Weak<Shared>,
    component: ComponentId,
}

impl ForceUpdate {
    pub fn call(&self) {
        if let Some(shared) = self.shared.upgrade() {
            shared.request_update(self.component);
        }
    }

    /// Component this handle re-renders
    pub fn component(&self) -> ComponentId {
        self.component
    }
}

impl PartialEq for ForceUpdate {
    fn eq(&self, other: &Self) -> bool {
        self.component == other.component && Weak::ptr_eq(&self.shared, &other.shared)
    }
}

impl Eq for ForceUpdate {}

impl fmt::Debug for ForceUpdate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ForceUpdate").field(&self.component).finish()
    }
}
