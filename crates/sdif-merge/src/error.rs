//! Error type for `sdif-merge`.

use std::path::PathBuf;

use sdif_core::{ErrorKind, schema::ElementKind, store::Classify};
use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum Error {
  #[error("no input containers given")]
  NoInputs,

  #[error("merge target {0} is a directory")]
  TargetIsDirectory(PathBuf),

  #[error("input container not found: {0}")]
  InputNotFound(PathBuf),

  #[error("i/o error on {path}: {source}")]
  Io {
    path:   PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("could not open {path}: {source}")]
  Open {
    path:   PathBuf,
    #[source]
    source: sdif_store_sqlite::Error,
  },

  /// A store call failed; `kind` is the store's own classification.
  #[error("{operation} failed: {source}")]
  Store {
    operation: &'static str,
    kind:      ErrorKind,
    #[source]
    source:    BoxError,
  },

  #[error("{path} has format version {found:?}, target has {expected:?}")]
  VersionMismatch { path: PathBuf, found: String, expected: String },

  #[error("element spec for a {0} endpoint must be a JSON object")]
  InvalidElementSpec(ElementKind),

  #[error("merge target {0} is also one of several inputs")]
  TargetIsInput(PathBuf),

  #[error("{entity} {name:?} is owned by source {source_id}, which was not copied")]
  UnmappedSource { entity: &'static str, name: String, source_id: i64 },

  #[error(transparent)]
  Core(#[from] sdif_core::Error),
}

impl Error {
  /// Wrap a store error, keeping its classification.
  pub(crate) fn store<E>(operation: &'static str) -> impl FnOnce(E) -> Self
  where
    E: std::error::Error + Classify + Send + Sync + 'static,
  {
    move |e| Error::Store { operation, kind: e.kind(), source: Box::new(e) }
  }

  pub fn kind(&self) -> ErrorKind {
    match self {
      Error::NoInputs
      | Error::TargetIsDirectory(_)
      | Error::TargetIsInput(_)
      | Error::VersionMismatch { .. }
      | Error::InvalidElementSpec(_) => ErrorKind::InvalidArgument,
      Error::InputNotFound(_) => ErrorKind::NotFound,
      Error::Open { source, .. } => source.kind(),
      Error::Store { kind, .. } => *kind,
      Error::Core(e) => e.kind(),
      Error::Io { .. } | Error::UnmappedSource { .. } => ErrorKind::OperationFailed,
    }
  }
}

impl Classify for Error {
  fn kind(&self) -> ErrorKind { Error::kind(self) }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
