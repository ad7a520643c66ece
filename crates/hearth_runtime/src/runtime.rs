//! Component runtime
//!
//! [`Runtime`] owns the mounted component tree together with the store
//! [`Registry`] and [`ScopeArena`] that scope nodes publish into. Rendering is
//! synchronous: an entry point renders what it was asked to, then drains every
//! component marked dirty along the way before it returns.
//!
//! Reconciliation is positional. A node replacing one of the same kind at the
//! same position (same element tag, same component name) updates it in place;
//! anything else unmounts the old subtree and mounts the new one.

use std::borrow::Cow;
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use hearth_core::{Registry, ScopeArena, ScopeId, ScopeProvider};
use rustc_hash::FxHashMap;
use slotmap::{new_key_type, SlotMap};
use tracing::{debug, error, trace};

use crate::config::RuntimeConfig;
use crate::cx::{Cx, HookSlots};
use crate::error::{Result, RuntimeError};
use crate::node::{component, ComponentNode, Element, Node, RefTarget, RenderFn};

new_key_type! {
    /// Handle to a mounted component
    pub struct ComponentId;
}

/// Handle to a tree mounted with [`Runtime::mount`]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RootId(ComponentId);

impl RootId {
    /// Component rendering this root's node
    pub fn component(self) -> ComponentId {
        self.0
    }
}

// =========================================================================
// Mounted tree
// =========================================================================

#[derive(Default)]
pub(crate) enum Mounted {
    #[default]
    Empty,
    Text(String),
    Element {
        element: Element,
        ref_target: Option<RefTarget>,
        children: Vec<Mounted>,
    },
    Component(ComponentId),
    Scope {
        provider: ScopeProvider,
        children: Vec<Mounted>,
    },
    Fragment(Vec<Mounted>),
}

struct ComponentState {
    name: Cow<'static, str>,
    render: RenderFn,
    scope: Option<ScopeId>,
    /// `None` while the component is rendering
    hooks: Option<HookSlots>,
    output: Mounted,
    render_count: usize,
}

/// Clears the rendering flag when an entry point returns or unwinds
struct RenderGuard<'a> {
    flag: &'a Cell<bool>,
}

impl Drop for RenderGuard<'_> {
    fn drop(&mut self) {
        self.flag.set(false);
    }
}

pub(crate) struct Shared {
    pub(crate) registry: RefCell<Registry>,
    pub(crate) scopes: RefCell<ScopeArena>,
    components: RefCell<SlotMap<ComponentId, ComponentState>>,
    roots: RefCell<Vec<ComponentId>>,
    dirty: RefCell<VecDeque<ComponentId>>,
    rendering: Cell<bool>,
    pending_error: RefCell<Option<RuntimeError>>,
    next_element_id: Cell<u64>,
    config: RuntimeConfig,
}

impl Shared {
    fn new(config: RuntimeConfig) -> Self {
        Self {
            registry: RefCell::new(Registry::new()),
            scopes: RefCell::new(ScopeArena::new()),
            components: RefCell::new(SlotMap::with_key()),
            roots: RefCell::new(Vec::new()),
            dirty: RefCell::new(VecDeque::new()),
            rendering: Cell::new(false),
            pending_error: RefCell::new(None),
            next_element_id: Cell::new(1),
            config,
        }
    }

    /// Run `work` as an entry point, then drain dirty components
    fn run<R>(self: &Rc<Self>, work: impl FnOnce(&Rc<Self>) -> Result<R>) -> Result<R> {
        if self.rendering.get() {
            return Err(RuntimeError::Reentrant);
        }
        self.rendering.set(true);
        let _guard = RenderGuard {
            flag: &self.rendering,
        };

        let value = work(self)?;
        self.drain_dirty()?;
        Ok(value)
    }

    fn mark_dirty(&self, id: ComponentId) {
        let mut dirty = self.dirty.borrow_mut();
        if !dirty.contains(&id) {
            dirty.push_back(id);
        }
    }

    /// Called by [`ForceUpdate`](crate::ForceUpdate)
    pub(crate) fn request_update(self: &Rc<Self>, id: ComponentId) {
        if !self.components.borrow().contains_key(id) {
            trace!("Runtime::request_update - {:?} is not mounted", id);
            return;
        }
        self.mark_dirty(id);
        if self.rendering.get() {
            return;
        }

        if let Err(err) = self.run(|_| Ok(())) {
            error!("Runtime::request_update - flush failed: {}", err);
            *self.pending_error.borrow_mut() = Some(err);
        }
    }

    /// Re-render queued components until the queue is empty
    ///
    /// Each component may be re-rendered at most `max_render_passes` times
    /// per drain, however many distinct components an update reaches.
    fn drain_dirty(self: &Rc<Self>) -> Result<()> {
        let limit = self.config.max_render_passes;
        let mut passes: FxHashMap<ComponentId, usize> = FxHashMap::default();
        loop {
            let Some(id) = self.dirty.borrow_mut().pop_front() else {
                return Ok(());
            };
            if !self.components.borrow().contains_key(id) {
                continue;
            }

            let count = passes.entry(id).or_insert(0);
            *count += 1;
            if *count > limit {
                self.dirty.borrow_mut().clear();
                error!(
                    "Runtime::flush - {:?} re-rendered more than {} times, giving up",
                    id, limit
                );
                return Err(RuntimeError::UpdateDepthExceeded { limit });
            }
            self.render_component(id)?;
        }
    }

    fn next_element_id(&self) -> u64 {
        let id = self.next_element_id.get();
        self.next_element_id.set(id + 1);
        id
    }

    // =========================================================================
    // Components
    // =========================================================================

    fn mount_component(self: &Rc<Self>, node: ComponentNode, scope: Option<ScopeId>) -> Result<ComponentId> {
        let id = self.components.borrow_mut().insert(ComponentState {
            name: node.name,
            render: node.render,
            scope,
            hooks: Some(HookSlots::default()),
            output: Mounted::Empty,
            render_count: 0,
        });
        trace!("Runtime::mount_component - {:?}", id);

        if let Err(err) = self.render_component(id) {
            self.unmount_component(id);
            return Err(err);
        }
        Ok(id)
    }

    /// Evaluate a component and reconcile its output
    fn render_component(self: &Rc<Self>, id: ComponentId) -> Result<()> {
        self.dirty.borrow_mut().retain(|dirty| *dirty != id);

        let taken = {
            let mut components = self.components.borrow_mut();
            let Some(state) = components.get_mut(id) else {
                return Ok(());
            };
            let Some(hooks) = state.hooks.take() else {
                // Already rendering further up the stack; render again afterwards
                self.mark_dirty(id);
                return Ok(());
            };
            state.render_count += 1;
            (
                Rc::clone(&state.render),
                state.name.clone(),
                state.scope,
                hooks,
                std::mem::take(&mut state.output),
                state.render_count,
            )
        };
        let (render, name, scope, mut hooks, mut output, count) = taken;

        if self.config.trace_renders {
            trace!("Runtime::render - `{}` {:?} (render #{})", name, id, count);
        }

        hooks.begin();
        let rendered = {
            let mut cx = Cx::new(self, id, &name, scope, &mut hooks);
            render(&mut cx)
        };
        let result = match rendered {
            Ok(node) => self.update_node(&mut output, node, scope),
            Err(err) => Err(err),
        };
        if result.is_ok() {
            hooks.finish();
        }

        let orphaned = match self.components.borrow_mut().get_mut(id) {
            Some(state) => {
                state.hooks = Some(hooks);
                state.output = output;
                None
            }
            None => Some((hooks, output)),
        };
        if let Some((hooks, output)) = orphaned {
            // Unmounted while rendering
            self.unmount_mounted(output);
            hooks.teardown();
        }
        result
    }

    fn unmount_component(&self, id: ComponentId) {
        let Some(state) = self.components.borrow_mut().remove(id) else {
            return;
        };
        self.dirty.borrow_mut().retain(|dirty| *dirty != id);
        trace!("Runtime::unmount_component - `{}` {:?}", state.name, id);

        self.unmount_mounted(state.output);
        if let Some(hooks) = state.hooks {
            hooks.teardown();
        }
    }

    // =========================================================================
    // Reconciliation
    // =========================================================================

    fn mount_node(self: &Rc<Self>, node: Node, scope: Option<ScopeId>) -> Result<Mounted> {
        match node {
            Node::Empty => Ok(Mounted::Empty),
            Node::Text(text) => Ok(Mounted::Text(text)),
            Node::Element(node) => {
                let element = Element::new(self.next_element_id(), node.tag, node.attrs);
                let children = self.mount_children(node.children, scope)?;
                if let Some(target) = &node.ref_target {
                    target.call(Some(&element));
                }
                Ok(Mounted::Element {
                    element,
                    ref_target: node.ref_target,
                    children,
                })
            }
            Node::Component(node) => Ok(Mounted::Component(self.mount_component(node, scope)?)),
            Node::Scope(node) => {
                let mut provider = ScopeProvider::new();
                let child_scope = provider.mount(
                    &node.tags,
                    scope,
                    &mut self.registry.borrow_mut(),
                    &mut self.scopes.borrow_mut(),
                );
                match self.mount_children(node.children, Some(child_scope)) {
                    Ok(children) => Ok(Mounted::Scope { provider, children }),
                    Err(err) => {
                        provider.unmount(&mut self.registry.borrow_mut(), &mut self.scopes.borrow_mut());
                        Err(err)
                    }
                }
            }
            Node::Fragment(children) => Ok(Mounted::Fragment(self.mount_children(children, scope)?)),
        }
    }

    /// Mount every node, or none of them
    fn mount_children(self: &Rc<Self>, nodes: Vec<Node>, scope: Option<ScopeId>) -> Result<Vec<Mounted>> {
        let mut mounted = Vec::with_capacity(nodes.len());
        for node in nodes {
            match self.mount_node(node, scope) {
                Ok(child) => mounted.push(child),
                Err(err) => {
                    while let Some(child) = mounted.pop() {
                        self.unmount_mounted(child);
                    }
                    return Err(err);
                }
            }
        }
        Ok(mounted)
    }

    fn same_kind(&self, mounted: &Mounted, node: &Node) -> bool {
        match (mounted, node) {
            (Mounted::Empty, Node::Empty)
            | (Mounted::Text(_), Node::Text(_))
            | (Mounted::Scope { .. }, Node::Scope(_))
            | (Mounted::Fragment(_), Node::Fragment(_)) => true,
            (Mounted::Element { element, .. }, Node::Element(node)) => element.tag() == node.tag,
            (Mounted::Component(id), Node::Component(node)) => self
                .components
                .borrow()
                .get(*id)
                .is_some_and(|state| state.name == node.name),
            _ => false,
        }
    }

    fn update_node(self: &Rc<Self>, slot: &mut Mounted, node: Node, scope: Option<ScopeId>) -> Result<()> {
        if !self.same_kind(slot, &node) {
            let old = std::mem::take(slot);
            self.unmount_mounted(old);
            *slot = self.mount_node(node, scope)?;
            return Ok(());
        }

        match (slot, node) {
            (Mounted::Text(current), Node::Text(text)) => {
                *current = text;
                Ok(())
            }
            (
                Mounted::Element {
                    element,
                    ref_target,
                    children,
                },
                Node::Element(node),
            ) => {
                element.set_attrs(node.attrs);
                self.update_children(children, node.children, scope)?;

                let unchanged = match (ref_target.as_ref(), node.ref_target.as_ref()) {
                    (Some(current), Some(next)) => current.ptr_eq(next),
                    (None, None) => true,
                    _ => false,
                };
                if !unchanged {
                    if let Some(previous) = ref_target.take() {
                        previous.call(None);
                    }
                    if let Some(next) = &node.ref_target {
                        next.call(Some(&*element));
                    }
                    *ref_target = node.ref_target;
                }
                Ok(())
            }
            (Mounted::Component(id), Node::Component(node)) => {
                if let Some(state) = self.components.borrow_mut().get_mut(*id) {
                    state.render = node.render;
                }
                self.render_component(*id)
            }
            (Mounted::Scope { provider, children }, Node::Scope(node)) => {
                if !provider.matches(&node.tags) {
                    debug!(
                        "Runtime::update - provider tags changed after mount; keeping the stores of {:?}",
                        provider.scope()
                    );
                }
                let child_scope = provider.scope();
                self.update_children(children, node.children, child_scope)
            }
            (Mounted::Fragment(children), Node::Fragment(nodes)) => self.update_children(children, nodes, scope),
            _ => Ok(()),
        }
    }

    fn update_children(
        self: &Rc<Self>,
        children: &mut Vec<Mounted>,
        nodes: Vec<Node>,
        scope: Option<ScopeId>,
    ) -> Result<()> {
        while children.len() > nodes.len() {
            if let Some(child) = children.pop() {
                self.unmount_mounted(child);
            }
        }
        for (index, node) in nodes.into_iter().enumerate() {
            if index < children.len() {
                self.update_node(&mut children[index], node, scope)?;
            } else {
                let child = self.mount_node(node, scope)?;
                children.push(child);
            }
        }
        Ok(())
    }

    /// Unmount a subtree, children before their parent
    fn unmount_mounted(&self, mounted: Mounted) {
        match mounted {
            Mounted::Empty | Mounted::Text(_) => {}
            Mounted::Element {
                ref_target, children, ..
            } => {
                for child in children {
                    self.unmount_mounted(child);
                }
                if let Some(target) = ref_target {
                    target.call(None);
                }
            }
            Mounted::Component(id) => self.unmount_component(id),
            Mounted::Scope { mut provider, children } => {
                for child in children {
                    self.unmount_mounted(child);
                }
                provider.unmount(&mut self.registry.borrow_mut(), &mut self.scopes.borrow_mut());
            }
            Mounted::Fragment(children) => {
                for child in children {
                    self.unmount_mounted(child);
                }
            }
        }
    }

    // =========================================================================
    // Serialization
    // =========================================================================

    fn write_html(&self, mounted: &Mounted, components: &SlotMap<ComponentId, ComponentState>, out: &mut String) {
        match mounted {
            Mounted::Empty => {}
            Mounted::Text(text) => out.push_str(text),
            Mounted::Element { element, children, .. } => {
                element.write_open_tag(out);
                for child in children {
                    self.write_html(child, components, out);
                }
                out.push_str("</");
                out.push_str(element.tag());
                out.push('>');
            }
            Mounted::Component(id) => {
                if let Some(state) = components.get(*id) {
                    self.write_html(&state.output, components, out);
                }
            }
            Mounted::Scope { children, .. } | Mounted::Fragment(children) => {
                for child in children {
                    self.write_html(child, components, out);
                }
            }
        }
    }
}

// =========================================================================
// Runtime
// =========================================================================

/// Owner of mounted trees and the store instances their scopes created
///
/// Dropping the runtime unmounts every remaining root.
pub struct Runtime {
    shared: Rc<Shared>,
}

impl Runtime {
    pub fn new() -> Self {
        Self::with_config(RuntimeConfig::default())
    }

    pub fn with_config(config: RuntimeConfig) -> Self {
        debug!(
            "Runtime::new - max_render_passes={} trace_renders={}",
            config.max_render_passes, config.trace_renders
        );
        Self {
            shared: Rc::new(Shared::new(config)),
        }
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.shared.config
    }

    /// Mount a tree and render it
    ///
    /// If anything in the tree fails to render, nothing stays mounted.
    pub fn mount(&self, node: impl Into<Node>) -> Result<RootId> {
        let node = node.into();
        self.shared.run(|shared| {
            let id = shared.mount_component(root_component(node), None)?;
            shared.roots.borrow_mut().push(id);
            debug!("Runtime::mount - root {:?}", id);
            Ok(RootId(id))
        })
    }

    /// Reconcile a root against a new tree
    pub fn set_root(&self, root: RootId, node: impl Into<Node>) -> Result<()> {
        let node = node.into();
        self.shared.run(|shared| {
            {
                let mut components = shared.components.borrow_mut();
                let state = components.get_mut(root.0).ok_or(RuntimeError::UnknownRoot(root))?;
                state.render = root_component(node).render;
            }
            shared.render_component(root.0)
        })
    }

    /// Unmount a root and everything below it
    pub fn unmount(&self, root: RootId) -> Result<()> {
        self.shared.run(|shared| {
            if !shared.roots.borrow().contains(&root.0) {
                return Err(RuntimeError::UnknownRoot(root));
            }
            shared.roots.borrow_mut().retain(|id| *id != root.0);
            shared.unmount_component(root.0);
            debug!("Runtime::unmount - root {:?}", root.0);
            Ok(())
        })
    }

    /// Render every component marked dirty
    ///
    /// Reports the error of an update triggered outside an entry point first,
    /// if one is pending.
    pub fn flush(&self) -> Result<()> {
        if let Some(err) = self.take_error() {
            return Err(err);
        }
        self.shared.run(|_| Ok(()))
    }

    /// Error of the last failed update triggered outside an entry point
    pub fn take_error(&self) -> Option<RuntimeError> {
        self.shared.pending_error.borrow_mut().take()
    }

    /// Serialize a root's mounted tree
    pub fn html(&self, root: RootId) -> Option<String> {
        let components = self.shared.components.borrow();
        let state = components.get(root.0)?;
        let mut out = String::new();
        self.shared.write_html(&state.output, &components, &mut out);
        Some(out)
    }

    /// Times a component has rendered
    pub fn render_count(&self, component: ComponentId) -> Option<usize> {
        self.shared
            .components
            .borrow()
            .get(component)
            .map(|state| state.render_count)
    }

    /// Live store instances
    pub fn store_count(&self) -> usize {
        self.shared.registry.borrow().len()
    }

    /// Published scopes
    pub fn scope_count(&self) -> usize {
        self.shared.scopes.borrow().len()
    }

    /// Mounted components, roots included
    pub fn component_count(&self) -> usize {
        self.shared.components.borrow().len()
    }

    pub fn is_rendering(&self) -> bool {
        self.shared.rendering.get()
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Runtime {
    fn drop(&mut self) {
        if self.shared.rendering.get() {
            return;
        }
        let roots: Vec<ComponentId> = self.shared.roots.borrow_mut().drain(..).collect();
        if roots.is_empty() {
            return;
        }
        self.shared.rendering.set(true);
        let _guard = RenderGuard {
            flag: &self.shared.rendering,
        };
        for root in roots {
            self.shared.unmount_component(root);
        }
    }
}

fn root_component(node: Node) -> ComponentNode {
    component("root", move |_: &mut Cx<'_>| Ok(node.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{el, text};

    #[test]
    fn test_mount_renders_html() {
        let runtime = Runtime::new();
        let root = runtime
            .mount(el("div").attr("id", "a").child(text("hi")))
            .unwrap();
        assert_eq!(runtime.html(root).as_deref(), Some(r#"<div id="a">hi</div>"#));
    }

    #[test]
    fn test_same_tag_keeps_element() {
        let runtime = Runtime::new();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let target = {
            let seen = Rc::clone(&seen);
            RefTarget::new(move |element: Option<&Element>| {
                seen.borrow_mut().push(element.map(Element::id));
            })
        };

        let root = runtime.mount(el("div").with_ref(target.clone())).unwrap();
        runtime
            .set_root(root, el("div").attr("class", "x").with_ref(target.clone()))
            .unwrap();
        assert_eq!(seen.borrow().len(), 1);

        runtime.set_root(root, el("span").with_ref(target)).unwrap();
        let seen = seen.borrow();
        assert_eq!(seen.len(), 3);
        assert!(seen[1].is_none());
        assert_ne!(seen[0], seen[2]);
    }

    #[test]
    fn test_component_name_decides_identity() {
        let runtime = Runtime::new();
        let counter = |name: &'static str| {
            component(name, |cx: &mut Cx<'_>| {
                let renders = cx.use_ref(|| 0u32);
                *renders.borrow_mut() += 1;
                let count = *renders.borrow();
                Ok(text(count.to_string()))
            })
        };

        let root = runtime.mount(counter("a")).unwrap();
        runtime.set_root(root, counter("a")).unwrap();
        assert_eq!(runtime.html(root).as_deref(), Some("2"));

        runtime.set_root(root, counter("b")).unwrap();
        assert_eq!(runtime.html(root).as_deref(), Some("1"));
    }

    #[test]
    fn test_unmount_runs_cleanups_and_unknown_root() {
        let runtime = Runtime::new();
        let cleaned = Rc::new(Cell::new(0));
        let node = {
            let cleaned = Rc::clone(&cleaned);
            component("c", move |cx: &mut Cx<'_>| {
                let cleaned = Rc::clone(&cleaned);
                cx.use_unmount(move || cleaned.set(cleaned.get() + 1));
                Ok(Node::Empty)
            })
        };

        let root = runtime.mount(node).unwrap();
        assert_eq!(runtime.component_count(), 2);
        runtime.unmount(root).unwrap();
        assert_eq!(cleaned.get(), 1);
        assert_eq!(runtime.component_count(), 0);
        assert_eq!(runtime.unmount(root), Err(RuntimeError::UnknownRoot(root)));
    }

    #[test]
    fn test_drop_unmounts_roots() {
        let cleaned = Rc::new(Cell::new(false));
        {
            let runtime = Runtime::new();
            let cleaned = Rc::clone(&cleaned);
            runtime
                .mount(component("c", move |cx: &mut Cx<'_>| {
                    let cleaned = Rc::clone(&cleaned);
                    cx.use_unmount(move || cleaned.set(true));
                    Ok(Node::Empty)
                }))
                .unwrap();
        }
        assert!(cleaned.get());
    }
}
