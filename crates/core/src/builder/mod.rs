//! Fluent constructors with deferred errors.
//!
//! Every setter returns the builder and records problems instead of
//! failing, so a chain always completes. The terminal `build` runs the
//! static configuration checks and returns either the finished value or
//! the full list of defects; `must_build` panics on the same list.

mod action;
mod field;
mod layout;
mod schema;

pub use action::ActionBuilder;
pub use field::FieldBuilder;
pub use layout::LayoutBuilder;
pub use schema::SchemaBuilder;
