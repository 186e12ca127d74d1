//! Cell values stored in user data tables.
//!
//! One variant per SQLite storage class. Rows are plain column-name → value
//! mappings; every row in an insert batch must carry the same key set.

use std::collections::BTreeMap;

use base64::Engine as _;
use serde::{Serialize, Serializer};

/// A single cell in a user data table.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
  Null,
  Integer(i64),
  Real(f64),
  Text(String),
  Blob(Vec<u8>),
}

/// One table row keyed by column name.
pub type Row = BTreeMap<String, CellValue>;

/// Build a [`Row`] from `(column, value)` pairs.
pub fn row<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Row
where
  K: Into<String>,
  V: Into<CellValue>,
{
  pairs
    .into_iter()
    .map(|(k, v)| (k.into(), v.into()))
    .collect()
}

impl CellValue {
  pub fn is_null(&self) -> bool { matches!(self, CellValue::Null) }

  /// The SQLite storage class name, as `typeof()` reports it.
  pub fn storage_class(&self) -> &'static str {
    match self {
      CellValue::Null => "null",
      CellValue::Integer(_) => "integer",
      CellValue::Real(_) => "real",
      CellValue::Text(_) => "text",
      CellValue::Blob(_) => "blob",
    }
  }

  pub fn as_f64(&self) -> Option<f64> {
    match self {
      CellValue::Integer(i) => Some(*i as f64),
      CellValue::Real(r) => Some(*r),
      _ => None,
    }
  }
}

// Blobs are rendered as standard base64 so reports stay valid JSON.
impl Serialize for CellValue {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    match self {
      CellValue::Null => serializer.serialize_none(),
      CellValue::Integer(i) => serializer.serialize_i64(*i),
      CellValue::Real(r) => serializer.serialize_f64(*r),
      CellValue::Text(s) => serializer.serialize_str(s),
      CellValue::Blob(b) => serializer
        .serialize_str(&base64::engine::general_purpose::STANDARD.encode(b)),
    }
  }
}

impl From<i64> for CellValue {
  fn from(v: i64) -> Self { CellValue::Integer(v) }
}

impl From<i32> for CellValue {
  fn from(v: i32) -> Self { CellValue::Integer(i64::from(v)) }
}

impl From<f64> for CellValue {
  fn from(v: f64) -> Self { CellValue::Real(v) }
}

impl From<bool> for CellValue {
  fn from(v: bool) -> Self { CellValue::Integer(i64::from(v)) }
}

impl From<&str> for CellValue {
  fn from(v: &str) -> Self { CellValue::Text(v.to_owned()) }
}

impl From<String> for CellValue {
  fn from(v: String) -> Self { CellValue::Text(v) }
}

impl From<Vec<u8>> for CellValue {
  fn from(v: Vec<u8>) -> Self { CellValue::Blob(v) }
}

impl<T: Into<CellValue>> From<Option<T>> for CellValue {
  fn from(v: Option<T>) -> Self { v.map_or(CellValue::Null, Into::into) }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn row_builder_keys_by_column() {
    let r = row([("id", CellValue::from(1)), ("name", "a".into())]);
    assert_eq!(r.get("id"), Some(&CellValue::Integer(1)));
    assert_eq!(r.get("name"), Some(&CellValue::Text("a".into())));
  }

  #[test]
  fn blob_serializes_as_base64() {
    let json = serde_json::to_string(&CellValue::Blob(vec![0xde, 0xad])).unwrap();
    assert_eq!(json, "\"3q0=\"");
  }

  #[test]
  fn none_becomes_null() {
    let v: CellValue = Option::<i64>::None.into();
    assert!(v.is_null());
  }
}
