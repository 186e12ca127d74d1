//! Error types for `sdif-core`.

use serde::Serialize;
use strum::{Display, EnumString};
use thiserror::Error;

/// The failure taxonomy shared by every SDIF crate.
///
/// Each crate keeps its own concrete error enum; `kind()` on those enums maps
/// a concrete failure back onto one of these categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
  /// A file, table, object or media item that was asked for does not exist.
  NotFound,
  /// A write was attempted on a container opened read-only.
  PermissionDenied,
  /// A caller-supplied argument failed validation. Nothing was mutated.
  InvalidArgument,
  /// An object or media item with the same name is already stored.
  AlreadyExists,
  /// An operation could not complete for a reason other than bad input.
  OperationFailed,
  /// The storage engine reported a failure; the transaction was rolled back.
  Engine,
}

#[derive(Debug, Error)]
pub enum Error {
  #[error("invalid argument: {0}")]
  InvalidArgument(String),

  #[error("unknown element kind: {0:?}")]
  UnknownElementKind(String),

  #[error("unknown referential action: {0:?}")]
  UnknownReferentialAction(String),

  #[error("could not find a unique name for {base:?} after {attempts} attempts")]
  NamesExhausted { base: String, attempts: u32 },

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

impl Error {
  pub fn kind(&self) -> ErrorKind {
    match self {
      Error::InvalidArgument(_)
      | Error::UnknownElementKind(_)
      | Error::UnknownReferentialAction(_)
      | Error::Serialization(_) => ErrorKind::InvalidArgument,
      Error::NamesExhausted { .. } => ErrorKind::OperationFailed,
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
