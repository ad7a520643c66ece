//! Render output
//!
//! Components return a [`Node`] tree describing what they want mounted:
//!
//! ```rust
//! use hearth_runtime::node::{el, text, Node};
//!
//! let node: Node = el("ul")
//!     .attr("class", "todo")
//!     .child(el("li").child(text("write tests")))
//!     .child(el("li").child(text("ship")))
//!     .into();
//! ```
//!
//! Nodes are descriptions; the runtime turns them into mounted [`Element`]
//! instances and keeps those alive across re-renders as long as the node at
//! the same position keeps the same tag.

use std::borrow::Cow;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use hearth_core::ProviderTag;

use crate::cx::Cx;
use crate::error::Result;

/// Render closure of a component
pub type RenderFn = Rc<dyn Fn(&mut Cx<'_>) -> Result<Node>>;

/// Attribute list of an element
pub type Attributes = Vec<(Cow<'static, str>, String)>;

/// Description of one piece of UI
#[derive(Clone, Default)]
pub enum Node {
    /// Nothing is mounted at this position
    #[default]
    Empty,
    Text(String),
    Element(ElementNode),
    Component(ComponentNode),
    Scope(ScopeNode),
    Fragment(Vec<Node>),
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Empty => f.write_str("Empty"),
            Node::Text(text) => f.debug_tuple("Text").field(text).finish(),
            Node::Element(element) => f
                .debug_struct("Element")
                .field("tag", &element.tag)
                .field("children", &element.children)
                .finish(),
            Node::Component(component) => f.debug_tuple("Component").field(&component.name).finish(),
            Node::Scope(scope) => f
                .debug_struct("Scope")
                .field("tags", &scope.tags)
                .field("children", &scope.children)
                .finish(),
            Node::Fragment(children) => f.debug_tuple("Fragment").field(children).finish(),
        }
    }
}

/// Host element description
#[derive(Clone)]
pub struct ElementNode {
    pub(crate) tag: &'static str,
    pub(crate) attrs: Attributes,
    pub(crate) ref_target: Option<RefTarget>,
    pub(crate) children: Vec<Node>,
}

impl ElementNode {
    /// Set an attribute
    pub fn attr(mut self, name: impl Into<Cow<'static, str>>, value: impl Into<String>) -> Self {
        let name = name.into();
        let value = value.into();
        match self.attrs.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.attrs.push((name, value)),
        }
        self
    }

    /// Attach a ref target, called with the mounted element
    pub fn with_ref(mut self, target: RefTarget) -> Self {
        self.ref_target = Some(target);
        self
    }

    /// Append a child
    pub fn child(mut self, child: impl Into<Node>) -> Self {
        self.children.push(child.into());
        self
    }

    /// Append several children
    pub fn children<I>(mut self, children: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Node>,
    {
        self.children.extend(children.into_iter().map(Into::into));
        self
    }
}

impl From<ElementNode> for Node {
    fn from(element: ElementNode) -> Self {
        Node::Element(element)
    }
}

/// Component description: a name and a render closure
///
/// The name is the component's identity during reconciliation: a component
/// node replacing one with the same name at the same position updates it in
/// place, keeping its hook state.
#[derive(Clone)]
pub struct ComponentNode {
    pub(crate) name: Cow<'static, str>,
    pub(crate) render: RenderFn,
}

impl From<ComponentNode> for Node {
    fn from(component: ComponentNode) -> Self {
        Node::Component(component)
    }
}

/// Scope provider description
#[derive(Clone)]
pub struct ScopeNode {
    pub(crate) tags: Vec<ProviderTag>,
    pub(crate) children: Vec<Node>,
}

impl ScopeNode {
    pub fn child(mut self, child: impl Into<Node>) -> Self {
        self.children.push(child.into());
        self
    }

    pub fn children<I>(mut self, children: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Node>,
    {
        self.children.extend(children.into_iter().map(Into::into));
        self
    }
}

impl From<ScopeNode> for Node {
    fn from(scope: ScopeNode) -> Self {
        Node::Scope(scope)
    }
}

impl From<&str> for Node {
    fn from(value: &str) -> Self {
        Node::Text(value.to_owned())
    }
}

impl From<String> for Node {
    fn from(value: String) -> Self {
        Node::Text(value)
    }
}

impl From<Vec<Node>> for Node {
    fn from(children: Vec<Node>) -> Self {
        Node::Fragment(children)
    }
}

/// Start an element description
pub fn el(tag: &'static str) -> ElementNode {
    ElementNode {
        tag,
        attrs: Vec::new(),
        ref_target: None,
        children: Vec::new(),
    }
}

/// Text node
pub fn text(value: impl Into<String>) -> Node {
    Node::Text(value.into())
}

/// Component node
pub fn component<F>(name: impl Into<Cow<'static, str>>, render: F) -> ComponentNode
where
    F: Fn(&mut Cx<'_>) -> Result<Node> + 'static,
{
    ComponentNode {
        name: name.into(),
        render: Rc::new(render),
    }
}

/// Scope provider node creating one store instance per tag for its children
pub fn scope(tags: impl IntoIterator<Item = ProviderTag>) -> ScopeNode {
    ScopeNode {
        tags: tags.into_iter().collect(),
        children: Vec::new(),
    }
}

// =========================================================================
// Mounted elements
// =========================================================================

struct ElementData {
    id: u64,
    tag: &'static str,
    attrs: RefCell<Attributes>,
}

/// A mounted host element
///
/// Cheap to clone; clones refer to the same instance. Two handles are equal
/// when they refer to the same instance.
#[derive(Clone)]
pub struct Element {
    data: Rc<ElementData>,
}

impl Element {
    pub(crate) fn new(id: u64, tag: &'static str, attrs: Attributes) -> Self {
        Self {
            data: Rc::new(ElementData {
                id,
                tag,
                attrs: RefCell::new(attrs),
            }),
        }
    }

    /// Runtime-unique id of this instance
    pub fn id(&self) -> u64 {
        self.data.id
    }

    pub fn tag(&self) -> &'static str {
        self.data.tag
    }

    /// Current value of an attribute
    pub fn attr(&self, name: &str) -> Option<String> {
        self.data
            .attrs
            .borrow()
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.clone())
    }

    pub(crate) fn set_attrs(&self, attrs: Attributes) {
        *self.data.attrs.borrow_mut() = attrs;
    }

    pub(crate) fn write_open_tag(&self, out: &mut String) {
        out.push('<');
        out.push_str(self.data.tag);
        for (name, value) in self.data.attrs.borrow().iter() {
            out.push(' ');
            out.push_str(name);
            out.push_str("=\"");
            out.push_str(value);
            out.push('"');
        }
        out.push('>');
    }
}

impl PartialEq for Element {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.data, &other.data)
    }
}

impl Eq for Element {}

impl fmt::Debug for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Element")
            .field("id", &self.data.id)
            .field("tag", &self.data.tag)
            .finish()
    }
}

/// Callback receiving the element a node mounted (`Some`) or `None` when
/// the element is detached
///
/// The runtime compares targets by identity: re-rendering with the same
/// target on the same element makes no calls.
#[derive(Clone)]
pub struct RefTarget {
    callback: Rc<dyn Fn(Option<&Element>)>,
}

impl RefTarget {
    pub fn new<F: Fn(Option<&Element>) + 'static>(callback: F) -> Self {
        Self {
            callback: Rc::new(callback),
        }
    }

    pub fn call(&self, element: Option<&Element>) {
        (self.callback)(element);
    }

    /// Whether both targets are the same callback instance
    pub fn ptr_eq(&self, other: &RefTarget) -> bool {
        Rc::ptr_eq(&self.callback, &other.callback)
    }
}

impl fmt::Debug for RefTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("RefTarget(..)")
    }
}
