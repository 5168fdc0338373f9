//! formweave-core: the schema model shared by every formweave crate.
//!
//! A schema describes a form, wizard, table or detail view as data: typed
//! [`Field`]s, [`Action`]s and an optional [`Layout`], with condition trees
//! that drive visibility and required state at runtime.
//!
//! # Public API
//!
//! - [`Value`] / [`DataMap`] -- dynamically-typed field values
//! - [`Schema`], [`Field`], [`Action`], [`Layout`] -- the descriptors
//! - [`SchemaBuilder`] and friends -- fluent constructors with deferred errors
//! - [`Validate`] -- static configuration checks
//! - [`SchemaError`] / [`ErrorKind`] -- the shared error taxonomy
//! - [`EventBus`] -- in-process event dispatch
//! - [`cancellable`] -- cancellation for long-running operations

pub mod builder;
pub mod cancel;
pub mod error;
pub mod events;
pub mod graph;
pub mod model;
pub mod validate;
pub mod value;

// ── Convenience re-exports ───────────────────────────────────────────

pub use builder::{ActionBuilder, FieldBuilder, LayoutBuilder, SchemaBuilder};
pub use cancel::{cancellable, CancellationToken};
pub use error::{ErrorKind, SchemaError, SchemaErrors};
pub use events::{Event, EventBus, EventBusConfig, EventKind, SubscriptionId};
pub use graph::dependency_order;
pub use model::*;
pub use validate::Validate;
pub use value::{DataMap, Value};
