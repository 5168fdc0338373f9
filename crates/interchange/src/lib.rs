//! formweave-interchange: wire formats for schema documents.
//!
//! JSON is the canonical format and YAML an isomorphic alternative. The
//! [`Parser`] turns bytes into a checked [`Schema`](formweave_core::Schema),
//! consulting registered [`ParserPlugin`]s before falling back to the
//! built-in formats. The serializer side produces pretty or canonical
//! output and a content hash over the canonical form, which the registry
//! records as a checksum.

pub mod deserialize;
pub mod serialize;

pub use deserialize::{Format, InterchangeError, ParseOptions, Parser, ParserPlugin};
pub use serialize::{content_hash, to_canonical_json, to_json, to_json_pretty, to_yaml};
