//! Static description of the store's operations.
//!
//! Handed to anything that needs to know what a container can do (e.g. a
//! tool-calling front end) without reflecting over a live object.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Capability {
  pub name:     &'static str,
  pub summary:  &'static str,
  /// Whether the operation writes; mutating operations are refused on
  /// read-only containers.
  pub mutating: bool,
}

const fn read(name: &'static str, summary: &'static str) -> Capability {
  Capability { name, summary, mutating: false }
}

const fn write(name: &'static str, summary: &'static str) -> Capability {
  Capability { name, summary, mutating: true }
}

/// One entry per [`SdifStore`](crate::store::SdifStore) operation.
pub const CAPABILITIES: &[Capability] = &[
  read("properties", "Format version and creation timestamp."),
  write("refresh_creation_timestamp", "Set the creation timestamp to now."),
  read("list_sources", "All provenance records, ordered by id."),
  write("add_source", "Append a provenance record and return its id."),
  write("create_table", "Create a user table under a fail, replace or add collision policy."),
  write("insert_data", "Insert a uniform batch of rows atomically."),
  read("read_table", "All rows of a user table."),
  write("drop_table", "Drop a user table and its metadata; unknown tables are ignored."),
  read("list_tables", "User table names."),
  read("table_metadata", "Metadata row of one user table."),
  write("add_object", "Store a named JSON document."),
  read("get_object", "Fetch a JSON document by name."),
  read("list_objects", "Stored JSON document names."),
  write("add_media", "Store a named binary blob."),
  read("get_media", "Fetch a binary blob by name."),
  read("list_media", "Stored media names."),
  write("add_semantic_link", "Record a typed soft link between two elements."),
  read("list_semantic_links", "All semantic links."),
  read("introspect_schema", "Structural description of the whole container."),
  read("sample_analysis", "Random sample rows and per-column statistics."),
  read("query", "Run a single read-only SQL statement."),
];

pub fn find(name: &str) -> Option<&'static Capability> {
  CAPABILITIES.iter().find(|c| c.name == name)
}
