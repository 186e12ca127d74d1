//! Encoding and decoding helpers between SDIF domain types and the values
//! stored in SQLite columns.
//!
//! Timestamps are UTC strings in `%Y-%m-%dT%H:%M:%SZ`. Structured payloads
//! (object data, schema hints, technical metadata, link specs) are compact
//! JSON text.

use chrono::Utc;
use rusqlite::types::{Value as SqlValue, ValueRef};
use sdif_core::{
  schema::{ElementKind, SemanticLink},
  table::ReferentialAction,
  value::CellValue,
};
use serde_json::Value;

use crate::{Error, Result};

// ─── Timestamps ──────────────────────────────────────────────────────────────

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

pub fn now_timestamp() -> String { Utc::now().format(TIMESTAMP_FORMAT).to_string() }

// ─── Identifiers ─────────────────────────────────────────────────────────────

/// Quote an identifier for interpolation into SQL.
pub fn quote_ident(name: &str) -> String { format!("\"{}\"", name.replace('"', "\"\"")) }

// ─── Cell values ─────────────────────────────────────────────────────────────

pub fn encode_cell(v: &CellValue) -> SqlValue {
  match v {
    CellValue::Null => SqlValue::Null,
    CellValue::Integer(i) => SqlValue::Integer(*i),
    CellValue::Real(r) => SqlValue::Real(*r),
    CellValue::Text(s) => SqlValue::Text(s.clone()),
    CellValue::Blob(b) => SqlValue::Blob(b.clone()),
  }
}

pub fn decode_cell(v: ValueRef<'_>) -> CellValue {
  match v {
    ValueRef::Null => CellValue::Null,
    ValueRef::Integer(i) => CellValue::Integer(i),
    ValueRef::Real(r) => CellValue::Real(r),
    ValueRef::Text(t) => CellValue::Text(String::from_utf8_lossy(t).into_owned()),
    ValueRef::Blob(b) => CellValue::Blob(b.to_vec()),
  }
}

// ─── JSON payloads ───────────────────────────────────────────────────────────

pub fn encode_json(v: &Value) -> Result<String> { Ok(serde_json::to_string(v)?) }

pub fn encode_opt_json(v: Option<&Value>) -> Result<Option<String>> {
  v.map(encode_json).transpose()
}

pub fn decode_json(s: &str) -> Result<Value> { Ok(serde_json::from_str(s)?) }

pub fn decode_opt_json(s: Option<&str>) -> Result<Option<Value>> {
  s.filter(|s| !s.is_empty()).map(decode_json).transpose()
}

// ─── Enumerations ────────────────────────────────────────────────────────────

pub fn decode_element_kind(s: &str) -> Result<ElementKind> {
  ElementKind::parse(s).map_err(|_| Error::Corrupt(format!("unknown element type {s:?}")))
}

pub fn decode_action(s: &str) -> Result<ReferentialAction> {
  ReferentialAction::parse(s)
    .map_err(|_| Error::Corrupt(format!("unknown referential action {s:?}")))
}

// ─── Raw rows ────────────────────────────────────────────────────────────────

/// A `sdif_semantic_links` row before its specs are parsed.
pub struct RawLink {
  pub link_id:           i64,
  pub link_type:         String,
  pub description:       Option<String>,
  pub from_element_type: String,
  pub from_element_spec: String,
  pub to_element_type:   String,
  pub to_element_spec:   String,
}

impl RawLink {
  pub const COLUMNS: &'static str = "link_id, link_type, description, from_element_type, \
                                     from_element_spec, to_element_type, to_element_spec";

  pub fn from_row(r: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      link_id:           r.get(0)?,
      link_type:         r.get(1)?,
      description:       r.get(2)?,
      from_element_type: r.get(3)?,
      from_element_spec: r.get(4)?,
      to_element_type:   r.get(5)?,
      to_element_spec:   r.get(6)?,
    })
  }

  pub fn into_link(self) -> Result<SemanticLink> {
    Ok(SemanticLink {
      link_id:           self.link_id,
      link_type:         self.link_type,
      description:       self.description,
      from_element_type: decode_element_kind(&self.from_element_type)?,
      from_element_spec: decode_json(&self.from_element_spec)?,
      to_element_type:   decode_element_kind(&self.to_element_type)?,
      to_element_spec:   decode_json(&self.to_element_spec)?,
    })
  }
}
