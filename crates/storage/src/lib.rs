//! formweave-storage: where registered schemas live.
//!
//! [`SchemaStorage`] is the durable byte-level backend and [`CacheBackend`]
//! the shared TTL cache in front of it. [`MemoryStorage`] and
//! [`MemoryCache`] are the in-process implementations; other backends can
//! check themselves against [`conformance::run_conformance_suite`].

pub mod conformance;
mod error;
mod memory;
mod record;
mod traits;

pub use error::StorageError;
pub use memory::{MemoryCache, MemoryStorage};
pub use record::{IndexFields, ListFilter, Precondition, SchemaMetadata, StorageEntry};
pub use traits::{CacheBackend, SchemaStorage};
