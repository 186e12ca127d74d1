//! Error type for `sdif-store-sqlite`.

use std::path::PathBuf;

use sdif_core::{ErrorKind, schema::ElementKind, store::Classify};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] sdif_core::Error),

  #[error("database error: {0}")]
  Database(#[from] rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("i/o error on {path}: {source}")]
  Io {
    path:   PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("container file not found: {0}")]
  FileNotFound(PathBuf),

  #[error("container is open in read-only mode")]
  ReadOnly,

  #[error("container is closed")]
  Closed,

  /// The file opened read-only lacks one of the metadata relations.
  #[error("not an SDIF container: missing metadata relation {0:?}")]
  NotAContainer(&'static str),

  #[error("invalid table name {name:?}: {reason}")]
  InvalidTableName { name: String, reason: &'static str },

  #[error("invalid column {column:?} in table {table:?}: {reason}")]
  InvalidColumn { table: String, column: String, reason: &'static str },

  #[error("table {0:?} must declare at least one column")]
  NoColumns(String),

  #[error("unknown source id {0}")]
  UnknownSource(i64),

  #[error("table {0:?} already exists; use the replace or add collision policy")]
  TableExists(String),

  #[error("table {0:?} not found")]
  TableNotFound(String),

  #[error("foreign key on {table}.{column} references missing table {target:?}")]
  MissingForeignKeyTarget { table: String, column: String, target: String },

  #[error("row {index} of the batch for {table:?} has different columns than the first row")]
  NonUniformRows { table: String, index: usize },

  #[error("{entity} {name:?} already exists")]
  Duplicate { entity: &'static str, name: String },

  #[error("element spec for a {0} endpoint must be a JSON object")]
  InvalidElementSpec(ElementKind),

  #[error("query rejected: {0}")]
  QueryRejected(String),

  /// A stored value could not be decoded.
  #[error("corrupt container data: {0}")]
  Corrupt(String),
}

impl Error {
  pub fn kind(&self) -> ErrorKind {
    match self {
      Error::Core(e) => e.kind(),
      Error::Database(_) => ErrorKind::Engine,
      Error::FileNotFound(_) | Error::TableNotFound(_) => ErrorKind::NotFound,
      Error::ReadOnly | Error::QueryRejected(_) => ErrorKind::PermissionDenied,
      Error::Duplicate { .. } => ErrorKind::AlreadyExists,
      Error::Json(_)
      | Error::NotAContainer(_)
      | Error::InvalidTableName { .. }
      | Error::InvalidColumn { .. }
      | Error::NoColumns(_)
      | Error::UnknownSource(_)
      | Error::TableExists(_)
      | Error::MissingForeignKeyTarget { .. }
      | Error::NonUniformRows { .. }
      | Error::InvalidElementSpec(_) => ErrorKind::InvalidArgument,
      Error::Io { .. } | Error::Closed | Error::Corrupt(_) => ErrorKind::OperationFailed,
    }
  }
}

impl Classify for Error {
  fn kind(&self) -> ErrorKind { Error::kind(self) }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
