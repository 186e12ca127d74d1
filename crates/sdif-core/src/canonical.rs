//! The closed value type canonical schemas are built from.
//!
//! Every variant is totally ordered and hashable, so canonical values can sit
//! inside sets, be used as sort keys, and be compared structurally without
//! caring how the JSON they came from was laid out.

use std::{
  cmp::Ordering,
  collections::{BTreeMap, BTreeSet},
  fmt,
  hash::{Hash, Hasher},
};

use serde::{
  Serialize, Serializer,
  ser::{SerializeMap, SerializeSeq},
};
use serde_json::Value;

// ─── Real ────────────────────────────────────────────────────────────────────

/// An `f64` with a total order (IEEE 754 `totalOrder`), so it can live in
/// ordered sets and maps.
#[derive(Debug, Clone, Copy)]
pub struct Real(pub f64);

impl PartialEq for Real {
  fn eq(&self, other: &Self) -> bool { self.0.total_cmp(&other.0) == Ordering::Equal }
}

impl Eq for Real {}

impl PartialOrd for Real {
  fn partial_cmp(&self, other: &Self) -> Option<Ordering> { Some(self.cmp(other)) }
}

impl Ord for Real {
  fn cmp(&self, other: &Self) -> Ordering { self.0.total_cmp(&other.0) }
}

impl Hash for Real {
  fn hash<H: Hasher>(&self, state: &mut H) { self.0.to_bits().hash(state) }
}

// ─── Canonical ───────────────────────────────────────────────────────────────

/// A comparison-ready value.
///
/// `Map` keeps its entries sorted by key, so two maps with the same pairs are
/// equal regardless of insertion order. `Seq` preserves order. `Set` is
/// sorted and deduplicated. Variant order is the sort order across kinds.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Canonical {
  Null,
  Bool(bool),
  Int(i64),
  Real(Real),
  Text(String),
  Seq(Vec<Canonical>),
  Map(BTreeMap<String, Canonical>),
  Set(BTreeSet<Canonical>),
}

/// Canonicalize an arbitrary JSON value by structural recursion: objects
/// become key-sorted maps, arrays stay ordered sequences, scalars are kept.
pub fn canonicalize_value(value: &Value) -> Canonical {
  match value {
    Value::Null => Canonical::Null,
    Value::Bool(b) => Canonical::Bool(*b),
    Value::Number(n) => match n.as_i64() {
      Some(i) => Canonical::Int(i),
      None => Canonical::Real(Real(n.as_f64().unwrap_or(f64::NAN))),
    },
    Value::String(s) => Canonical::Text(s.clone()),
    Value::Array(items) => Canonical::Seq(items.iter().map(canonicalize_value).collect()),
    Value::Object(map) => Canonical::Map(
      map
        .iter()
        .map(|(k, v)| (k.clone(), canonicalize_value(v)))
        .collect(),
    ),
  }
}

impl Canonical {
  /// Build a map from `(key, value)` pairs.
  pub fn map<K: Into<String>>(pairs: impl IntoIterator<Item = (K, Canonical)>) -> Self {
    Canonical::Map(pairs.into_iter().map(|(k, v)| (k.into(), v)).collect())
  }

  pub fn text(s: impl Into<String>) -> Self { Canonical::Text(s.into()) }

  pub fn opt_text(s: Option<&str>) -> Self { s.map_or(Canonical::Null, Canonical::text) }

  pub fn as_map(&self) -> Option<&BTreeMap<String, Canonical>> {
    match self {
      Canonical::Map(m) => Some(m),
      _ => None,
    }
  }

  pub fn get(&self, key: &str) -> Option<&Canonical> { self.as_map()?.get(key) }

  /// Short variant name, used when reporting a change of kind.
  pub fn type_name(&self) -> &'static str {
    match self {
      Canonical::Null => "null",
      Canonical::Bool(_) => "bool",
      Canonical::Int(_) => "int",
      Canonical::Real(_) => "real",
      Canonical::Text(_) => "text",
      Canonical::Seq(_) => "seq",
      Canonical::Map(_) => "map",
      Canonical::Set(_) => "set",
    }
  }
}

impl From<bool> for Canonical {
  fn from(b: bool) -> Self { Canonical::Bool(b) }
}

impl From<i64> for Canonical {
  fn from(i: i64) -> Self { Canonical::Int(i) }
}

impl From<&str> for Canonical {
  fn from(s: &str) -> Self { Canonical::Text(s.to_owned()) }
}

impl From<String> for Canonical {
  fn from(s: String) -> Self { Canonical::Text(s) }
}

impl FromIterator<Canonical> for Canonical {
  /// Collects into an ordered `Seq`.
  fn from_iter<I: IntoIterator<Item = Canonical>>(iter: I) -> Self {
    Canonical::Seq(iter.into_iter().collect())
  }
}

// Sets and sequences both serialize as arrays; maps as objects.
impl Serialize for Canonical {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    match self {
      Canonical::Null => serializer.serialize_none(),
      Canonical::Bool(b) => serializer.serialize_bool(*b),
      Canonical::Int(i) => serializer.serialize_i64(*i),
      Canonical::Real(r) => serializer.serialize_f64(r.0),
      Canonical::Text(s) => serializer.serialize_str(s),
      Canonical::Seq(items) => {
        let mut seq = serializer.serialize_seq(Some(items.len()))?;
        for item in items {
          seq.serialize_element(item)?;
        }
        seq.end()
      }
      Canonical::Set(items) => {
        let mut seq = serializer.serialize_seq(Some(items.len()))?;
        for item in items {
          seq.serialize_element(item)?;
        }
        seq.end()
      }
      Canonical::Map(entries) => {
        let mut map = serializer.serialize_map(Some(entries.len()))?;
        for (k, v) in entries {
          map.serialize_entry(k, v)?;
        }
        map.end()
      }
    }
  }
}

/// Compact JSON rendering.
impl fmt::Display for Canonical {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let s = serde_json::to_string(self).map_err(|_| fmt::Error)?;
    f.write_str(&s)
  }
}
