//! Introspection output: the structural description of a whole container.
//!
//! [`ContainerSchema`] is what `introspect_schema` returns and the only input
//! the canonicalizer reads. Everything here is plain data and serializes to
//! JSON with field names matching the on-disk column names.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::{Display, EnumString};

use crate::{Error, Result, table::ReferentialAction};

// ─── Element kinds ───────────────────────────────────────────────────────────

/// The kind tag of a semantic-link endpoint.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  PartialOrd,
  Ord,
  Hash,
  Display,
  EnumString,
  Serialize,
  Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ElementKind {
  Table,
  Column,
  Object,
  Media,
  JsonPath,
  Source,
}

impl ElementKind {
  pub const ALL: [ElementKind; 6] = [
    ElementKind::Table,
    ElementKind::Column,
    ElementKind::Object,
    ElementKind::Media,
    ElementKind::JsonPath,
    ElementKind::Source,
  ];

  pub fn parse(s: &str) -> Result<Self> {
    s.parse().map_err(|_| Error::UnknownElementKind(s.to_owned()))
  }

  pub fn as_str(self) -> &'static str {
    match self {
      ElementKind::Table => "table",
      ElementKind::Column => "column",
      ElementKind::Object => "object",
      ElementKind::Media => "media",
      ElementKind::JsonPath => "json_path",
      ElementKind::Source => "source",
    }
  }
}

// ─── Container-level records ─────────────────────────────────────────────────

/// The singleton properties row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Properties {
  pub sdif_version:       String,
  pub creation_timestamp: Option<String>,
}

/// A provenance record for one originating input file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
  pub source_id:            i64,
  pub original_file_name:   String,
  pub original_file_type:   String,
  pub source_description:   Option<String>,
  pub processing_timestamp: Option<String>,
}

/// An optional JSON payload read back from a text column.
///
/// A payload that fails to parse is kept as `{ "error": … }` so "absent",
/// "malformed" and "valid" stay distinguishable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum JsonPayload {
  Invalid { error: String },
  Valid(Value),
}

impl JsonPayload {
  /// Parse stored text; `None` for a missing or empty column.
  pub fn from_stored(text: Option<&str>) -> Option<Self> {
    let text = text.filter(|t| !t.is_empty())?;
    Some(match serde_json::from_str(text) {
      Ok(v) => JsonPayload::Valid(v),
      Err(e) => JsonPayload::Invalid { error: format!("Invalid JSON: {e}") },
    })
  }

  pub fn valid(&self) -> Option<&Value> {
    match self {
      JsonPayload::Valid(v) => Some(v),
      JsonPayload::Invalid { .. } => None,
    }
  }
}

// ─── Tables ──────────────────────────────────────────────────────────────────

/// A row of the tables metadata relation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableMetadata {
  pub table_name:          String,
  pub source_id:           i64,
  pub description:         Option<String>,
  pub original_identifier: Option<String>,
  pub row_count:           i64,
}

/// One physical column, merged with its descriptive metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnInfo {
  pub name:                 String,
  pub sqlite_type:          String,
  pub not_null:             bool,
  pub default_value:        Option<String>,
  /// 1-based position in the primary key, `None` for non-key columns.
  pub primary_key:          Option<u32>,
  pub description:          Option<String>,
  pub original_column_name: Option<String>,
}

/// One column pair of a (possibly composite) foreign key constraint.
///
/// Rows with the same `id` belong to one constraint; `seq` orders them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKeyInfo {
  pub id:            i64,
  pub seq:           i64,
  pub from_column:   String,
  pub target_table:  String,
  pub target_column: String,
  pub on_update:     ReferentialAction,
  pub on_delete:     ReferentialAction,
  #[serde(rename = "match")]
  pub match_clause:  String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
  pub metadata:     TableMetadata,
  pub columns:      Vec<ColumnInfo>,
  pub foreign_keys: Vec<ForeignKeyInfo>,
}

impl TableSchema {
  /// Primary-key column names, ordered by key position.
  pub fn primary_key_columns(&self) -> Vec<&str> {
    let mut pk: Vec<(u32, &str)> = self
      .columns
      .iter()
      .filter_map(|c| c.primary_key.map(|p| (p, c.name.as_str())))
      .collect();
    pk.sort_by_key(|(p, _)| *p);
    pk.into_iter().map(|(_, name)| name).collect()
  }
}

// ─── Objects, media, links ───────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectInfo {
  pub source_id:   i64,
  pub description: Option<String>,
  pub schema_hint: Option<JsonPayload>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaInfo {
  pub source_id:          i64,
  pub media_type:         String,
  pub description:        Option<String>,
  pub original_format:    Option<String>,
  pub technical_metadata: Option<JsonPayload>,
}

/// A stored semantic link with parsed element specs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SemanticLink {
  pub link_id:           i64,
  pub link_type:         String,
  pub description:       Option<String>,
  pub from_element_type: ElementKind,
  pub from_element_spec: Value,
  pub to_element_type:   ElementKind,
  pub to_element_spec:   Value,
}

// ─── Whole container ─────────────────────────────────────────────────────────

/// Full structural description of a container, as introspection reports it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerSchema {
  pub properties:     Option<Properties>,
  pub sources:        Vec<Source>,
  pub tables:         BTreeMap<String, TableSchema>,
  pub objects:        BTreeMap<String, ObjectInfo>,
  pub media:          BTreeMap<String, MediaInfo>,
  pub semantic_links: Vec<SemanticLink>,
}
