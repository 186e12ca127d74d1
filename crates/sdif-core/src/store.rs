//! The `SdifStore` trait.
//!
//! Implemented by storage backends (e.g. `sdif-store-sqlite`). The merge
//! engine and the CLI depend on this abstraction for every read and write.
//! Calls are synchronous and blocking; one store owns one connection.

use crate::{
  analysis::{SampleOptions, SampleReport},
  error::ErrorKind,
  schema::{ContainerSchema, Properties, SemanticLink, Source, TableMetadata},
  table::{NewMedia, NewObject, NewSemanticLink, NewTable, StoredMedia, StoredObject},
  value::Row,
};

/// Anything that can report where it sits in the shared failure taxonomy.
pub trait Classify {
  fn kind(&self) -> ErrorKind;
}

impl Classify for crate::Error {
  fn kind(&self) -> ErrorKind { crate::Error::kind(self) }
}

/// Abstraction over one open SDIF container.
///
/// Every write fails with a permission-denied error on a store opened
/// read-only, before anything reaches the engine. Structural validation runs
/// before any mutation; engine failures roll the whole operation back.
pub trait SdifStore {
  type Error: std::error::Error + Classify + Send + Sync + 'static;

  fn is_read_only(&self) -> bool;

  // ── Properties and sources ────────────────────────────────────────────

  /// The singleton properties row, `None` if the container lacks one.
  fn properties(&self) -> Result<Option<Properties>, Self::Error>;

  /// Refresh the creation timestamp to now.
  fn refresh_creation_timestamp(&self) -> Result<(), Self::Error>;

  /// All sources, ordered by id.
  fn list_sources(&self) -> Result<Vec<Source>, Self::Error>;

  /// Append a provenance record and return its new id.
  fn add_source(
    &self,
    file_name: &str,
    file_type: &str,
    description: Option<&str>,
  ) -> Result<i64, Self::Error>;

  // ── Tables ────────────────────────────────────────────────────────────

  /// Create a user table and return the name actually used, which differs
  /// from the requested one under [`CollisionPolicy::Add`](crate::table::CollisionPolicy::Add).
  fn create_table(&self, table: &NewTable) -> Result<String, Self::Error>;

  /// Insert a uniform batch of rows atomically and refresh the row count.
  fn insert_data(&self, table_name: &str, rows: &[Row]) -> Result<(), Self::Error>;

  /// Every row of a user table, in engine order.
  fn read_table(&self, table_name: &str) -> Result<Vec<Row>, Self::Error>;

  /// Drop a table and its metadata. Dropping an unknown table is a no-op.
  fn drop_table(&self, table_name: &str) -> Result<(), Self::Error>;

  /// User table names, ascending.
  fn list_tables(&self) -> Result<Vec<String>, Self::Error>;

  fn table_metadata(&self, table_name: &str) -> Result<Option<TableMetadata>, Self::Error>;

  // ── Objects and media ─────────────────────────────────────────────────

  fn add_object(&self, object: &NewObject) -> Result<(), Self::Error>;

  fn get_object(&self, name: &str) -> Result<Option<StoredObject>, Self::Error>;

  fn list_objects(&self) -> Result<Vec<String>, Self::Error>;

  fn add_media(&self, media: &NewMedia) -> Result<(), Self::Error>;

  fn get_media(&self, name: &str) -> Result<Option<StoredMedia>, Self::Error>;

  fn list_media(&self) -> Result<Vec<String>, Self::Error>;

  // ── Semantic links ────────────────────────────────────────────────────

  /// Record a soft link and return its id.
  fn add_semantic_link(&self, link: &NewSemanticLink) -> Result<i64, Self::Error>;

  /// All links, ordered by id.
  fn list_semantic_links(&self) -> Result<Vec<SemanticLink>, Self::Error>;

  // ── Introspection ─────────────────────────────────────────────────────

  /// Full structural description; the canonicalizer's only input.
  fn introspect_schema(&self) -> Result<ContainerSchema, Self::Error>;

  /// Random sample rows plus per-column statistics. Never mutates.
  fn sample_analysis(&self, options: &SampleOptions) -> Result<SampleReport, Self::Error>;

  /// Release the connection. Safe to call more than once.
  fn close(&mut self) -> Result<(), Self::Error>;
}
