//! Core types and algorithms for SDIF containers.
//!
//! An SDIF container is a single SQLite file holding provenance-tagged
//! tables, JSON objects, binary media and the soft links between them. This
//! crate owns everything that does not need a database connection: the types
//! the store emits and accepts, the [`SdifStore`](store::SdifStore) contract,
//! and the schema canonicalizer and comparator that operate on introspection
//! output. Storage backends and the merge engine depend on it; it depends on
//! no database crate.

pub mod analysis;
pub mod canonical;
pub mod canonicalize;
pub mod capability;
pub mod compare;
pub mod config;
pub mod error;
pub mod naming;
pub mod schema;
pub mod store;
pub mod table;
pub mod value;

pub use error::{Error, ErrorKind, Result};
pub use store::{Classify, SdifStore};

/// The only container format version this implementation reads and writes.
pub const SDIF_VERSION: &str = "1.0";

/// Prefix reserved for the container's own metadata relations.
pub const RESERVED_PREFIX: &str = "sdif_";
