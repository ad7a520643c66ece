//! Hearth Runtime
//!
//! A synchronous component runtime hosting [`hearth_core`] stores:
//!
//! - **Components**: named render closures with call-order hook state
//! - **Scope nodes**: mount one store instance per provider tag for a subtree
//! - **Store hooks**: [`Cx::use_store`] and friends, re-rendering on selection change
//! - **Data-state hook**: [`Cx::use_data_state`] composing per-item state
//! - **Element refs**: [`Cx::use_single_element_ref`] with connect/disconnect callbacks
//!
//! # Example
//!
//! ```rust
//! use hearth_core::define_store;
//! use hearth_runtime::node::{component, el, scope, text};
//! use hearth_runtime::{Cx, Runtime};
//!
//! #[derive(Clone, Debug, PartialEq)]
//! struct Greeting {
//!     name: String,
//! }
//!
//! let greeting = define_store()
//!     .data(Greeting { name: "world".into() })
//!     .create();
//!
//! let view = {
//!     let greeting = greeting.clone();
//!     component("hello", move |cx: &mut Cx<'_>| {
//!         let (data, _) = cx.use_store(&greeting)?;
//!         Ok(el("p").child(text(format!("hello {}", data.name))).into())
//!     })
//! };
//!
//! let runtime = Runtime::new();
//! let tree = scope([greeting.provide_with(Greeting { name: "hearth".into() })]).child(view);
//! let root = runtime.mount(tree).unwrap();
//! assert_eq!(runtime.html(root).as_deref(), Some("<p>hello hearth</p>"));
//!
//! runtime.unmount(root).unwrap();
//! assert_eq!(runtime.store_count(), 0);
//! ```

pub mod config;
pub mod cx;
pub mod error;
pub mod node;
pub mod runtime;
pub mod use_data_state;
pub mod use_element_ref;
pub mod use_store;

pub use config::{ConfigError, RuntimeConfig, DEFAULT_MAX_RENDER_PASSES};
pub use cx::{Cx, ForceUpdate};
pub use error::{Result, RuntimeError};
pub use node::{Element, Node, RefTarget};
pub use runtime::{ComponentId, RootId, Runtime};
pub use use_data_state::DataStateSetter;
pub use use_element_ref::ElementLifecycle;
