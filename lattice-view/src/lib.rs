//! Lattice View
//!
//! This crate provides a minimal reactive view-binding engine. Given a data
//! object and a template tree with directives and `{{ }}` interpolations, it
//! keeps the rendered tree synchronized with the data and writes user input
//! back into it.
//!
//! It implements:
//!
//! - Dependency tracking (observable objects, change sources, watchers)
//! - Memoized computed properties
//! - Dotted-path expressions and interpolation templates
//! - A directive compiler (`v-model`, `v-on:<event>`, `v-html`, `v-text`)
//! - Binding teardown on unmount
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `reactive`: Objects, change sources, the evaluation tracker, watchers
//! - `expr`: Path parsing, template parsing, path reads and writes
//! - `dom`: The host-tree capability trait and an in-memory tree
//! - `compiler`: Tree walk, directive registry, render actions
//! - `vm`: The view model that ties data, methods and computed properties
//!   to a mounted tree
//!
//! # Example
//!
//! ```rust,ignore
//! use lattice_view::dom::memory::Element;
//! use lattice_view::{Options, ViewModel};
//! use serde_json::json;
//!
//! let input = Element::new("input").attr("v-model", "user.name");
//! let app = Element::new("div")
//!     .child(input.clone())
//!     .text("Hello {{ user.name }}");
//!
//! let vm = ViewModel::new(
//!     Options::new()
//!         .target(app.clone())
//!         .data(json!({ "user": { "name": "x" } })),
//! )?;
//!
//! // Typing into the input updates the data and every other binding.
//! input.input("y")?;
//! assert_eq!(vm.get("user.name")?, "y".into());
//! assert_eq!(app.text_content(), "Hello y");
//! ```

pub mod compiler;
pub mod config;
pub mod dom;
pub mod error;
pub mod expr;
pub mod reactive;
pub mod value;
pub mod vm;

pub use config::Settings;
pub use error::{Error, PathFault, Result};
pub use value::{Function, Value};
pub use vm::{ComputedFn, Options, ViewModel, WeakViewModel};
