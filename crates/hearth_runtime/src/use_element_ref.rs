//! Single element ref hook
//!
//! Tracks which element a component's ref is attached to and reports
//! transitions. Re-attaching the same element is silent; moving to another
//! element disconnects the old one before connecting the new one.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use tracing::trace;

use crate::cx::Cx;
use crate::node::{Element, RefTarget};

/// Connect and disconnect callbacks of [`Cx::use_single_element_ref`]
pub struct ElementLifecycle {
    connected: Box<dyn Fn(&Element)>,
    disconnected: Box<dyn Fn()>,
}

impl ElementLifecycle {
    pub fn new<C, D>(connected: C, disconnected: D) -> Self
    where
        C: Fn(&Element) + 'static,
        D: Fn() + 'static,
    {
        Self {
            connected: Box::new(connected),
            disconnected: Box::new(disconnected),
        }
    }
}

impl fmt::Debug for ElementLifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ElementLifecycle(..)")
    }
}

struct RefState {
    lifecycle: RefCell<Rc<ElementLifecycle>>,
    current: RefCell<Option<Element>>,
}

impl RefState {
    fn attach(&self, element: Option<&Element>) {
        let lifecycle = Rc::clone(&self.lifecycle.borrow());
        match element {
            Some(element) => {
                let previous = self.current.replace(Some(element.clone()));
                if previous.as_ref() == Some(element) {
                    return;
                }
                if let Some(previous) = previous {
                    trace!("element ref: {:?} -> {:?}", previous, element);
                    (lifecycle.disconnected)();
                }
                (lifecycle.connected)(element);
            }
            None => {
                let previous = self.current.take();
                if previous.is_some() {
                    (lifecycle.disconnected)();
                }
            }
        }
    }
}

impl Cx<'_> {
    /// Ref target to attach to at most one element
    ///
    /// The returned target is the same instance on every render, so
    /// re-rendering onto the same element makes no calls. The callbacks from
    /// the latest render are the ones invoked.
    pub fn use_single_element_ref(&mut self, lifecycle: ElementLifecycle) -> RefTarget {
        let lifecycle = Rc::new(lifecycle);
        let (slot, created) = self.hook_state(|| {
            let state = Rc::new(RefState {
                lifecycle: RefCell::new(Rc::clone(&lifecycle)),
                current: RefCell::new(None),
            });
            let attached = Rc::clone(&state);
            let target = RefTarget::new(move |element: Option<&Element>| attached.attach(element));
            (state, target)
        });
        if !created {
            *slot.0.lifecycle.borrow_mut() = lifecycle;
        }
        slot.1.clone()
    }
}
