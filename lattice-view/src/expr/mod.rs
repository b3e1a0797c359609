//! Expressions
//!
//! The expression language is deliberately small: dotted paths (`a.b.c`) and
//! text templates that embed them between delimiters (`Hello {{ user.name }}`).
//! There are no operators, literals or calls.

mod path;
mod resolver;
mod template;

pub use path::Path;
pub use resolver::{read, read_path, resolve_template, write, write_path};
pub use template::{contains_interpolation, Segment, Template};
