//! Input types for the write side of a container.
//!
//! These mirror `NewFact`-style request structs: callers build them, the
//! store validates them before touching the engine, and nothing here knows
//! about SQL beyond the engine type names and default expressions it carries
//! through verbatim.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::{Display, EnumString};

use crate::{Error, Result, schema::ElementKind};

// ─── Referential actions ─────────────────────────────────────────────────────

/// `ON UPDATE` / `ON DELETE` behaviour of a foreign key.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString, Serialize, Deserialize,
)]
#[strum(ascii_case_insensitive)]
pub enum ReferentialAction {
  #[default]
  #[strum(serialize = "NO ACTION")]
  #[serde(rename = "NO ACTION")]
  NoAction,
  #[strum(serialize = "RESTRICT")]
  #[serde(rename = "RESTRICT")]
  Restrict,
  #[strum(serialize = "SET NULL")]
  #[serde(rename = "SET NULL")]
  SetNull,
  #[strum(serialize = "SET DEFAULT")]
  #[serde(rename = "SET DEFAULT")]
  SetDefault,
  #[strum(serialize = "CASCADE")]
  #[serde(rename = "CASCADE")]
  Cascade,
}

impl ReferentialAction {
  pub fn parse(s: &str) -> Result<Self> {
    s.trim()
      .parse()
      .map_err(|_| Error::UnknownReferentialAction(s.to_owned()))
  }
}

/// A single-column foreign key declared on a [`ColumnSpec`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKeySpec {
  pub table:     String,
  pub column:    String,
  pub on_update: Option<ReferentialAction>,
  pub on_delete: Option<ReferentialAction>,
}

/// A table-level foreign key over one or more columns, matched by position
/// against `target_columns`.
///
/// An empty `target_columns` references the target's primary key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableForeignKey {
  pub columns:        Vec<String>,
  pub table:          String,
  pub target_columns: Vec<String>,
  pub on_update:      Option<ReferentialAction>,
  pub on_delete:      Option<ReferentialAction>,
}

impl TableForeignKey {
  pub fn new<C, T>(columns: C, table: impl Into<String>, target_columns: T) -> Self
  where
    C: IntoIterator,
    C::Item: Into<String>,
    T: IntoIterator,
    T::Item: Into<String>,
  {
    Self {
      columns:        columns.into_iter().map(Into::into).collect(),
      table:          table.into(),
      target_columns: target_columns.into_iter().map(Into::into).collect(),
      on_update:      None,
      on_delete:      None,
    }
  }
}

// ─── Columns ─────────────────────────────────────────────────────────────────

/// Declaration of one column of a user table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
  pub name:                 String,
  /// Engine type name, e.g. `INTEGER`, `TEXT`, `REAL`. Upper-cased on use.
  pub sql_type:             String,
  pub not_null:             bool,
  /// 1-based position within the primary key. Columns sharing a position
  /// keep their declaration order.
  pub primary_key:          Option<u32>,
  /// Literal SQL default expression, exactly as the engine reports it back.
  pub default_value:        Option<String>,
  pub description:          Option<String>,
  pub original_column_name: Option<String>,
  pub foreign_key:          Option<ForeignKeySpec>,
}

impl ColumnSpec {
  pub fn new(name: impl Into<String>, sql_type: impl Into<String>) -> Self {
    Self {
      name:                 name.into(),
      sql_type:             sql_type.into(),
      not_null:             false,
      primary_key:          None,
      default_value:        None,
      description:          None,
      original_column_name: None,
      foreign_key:          None,
    }
  }

  pub fn not_null(mut self) -> Self {
    self.not_null = true;
    self
  }

  pub fn primary_key(self) -> Self { self.primary_key_at(1) }

  pub fn primary_key_at(mut self, position: u32) -> Self {
    self.primary_key = Some(position.max(1));
    self
  }

  pub fn default_value(mut self, expr: impl Into<String>) -> Self {
    self.default_value = Some(expr.into());
    self
  }

  pub fn description(mut self, text: impl Into<String>) -> Self {
    self.description = Some(text.into());
    self
  }

  pub fn original_name(mut self, name: impl Into<String>) -> Self {
    self.original_column_name = Some(name.into());
    self
  }

  pub fn references(mut self, table: impl Into<String>, column: impl Into<String>) -> Self {
    self.foreign_key = Some(ForeignKeySpec {
      table:     table.into(),
      column:    column.into(),
      on_update: None,
      on_delete: None,
    });
    self
  }

  /// Sets `ON DELETE` on the foreign key declared by [`Self::references`].
  pub fn on_delete(mut self, action: ReferentialAction) -> Self {
    if let Some(fk) = self.foreign_key.as_mut() {
      fk.on_delete = Some(action);
    }
    self
  }

  /// Sets `ON UPDATE` on the foreign key declared by [`Self::references`].
  pub fn on_update(mut self, action: ReferentialAction) -> Self {
    if let Some(fk) = self.foreign_key.as_mut() {
      fk.on_update = Some(action);
    }
    self
  }
}

// ─── Tables ──────────────────────────────────────────────────────────────────

/// What `create_table` does when the requested name is already taken.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CollisionPolicy {
  /// Refuse with an invalid-argument error.
  #[default]
  Fail,
  /// Drop the existing table and its metadata, then create anew.
  Replace,
  /// Create under the first free `<name>_<n>` suffix.
  Add,
}

impl CollisionPolicy {
  pub fn parse(s: &str) -> Result<Self> {
    s.parse().map_err(|_| {
      Error::InvalidArgument(format!(
        "unknown collision policy {s:?}; expected fail, replace or add"
      ))
    })
  }
}

/// Request to create a user table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTable {
  pub name:                String,
  pub columns:             Vec<ColumnSpec>,
  /// Constraints spanning several columns; single-column ones usually sit
  /// on the [`ColumnSpec`] instead.
  pub foreign_keys:        Vec<TableForeignKey>,
  pub source_id:           i64,
  pub description:         Option<String>,
  pub original_identifier: Option<String>,
  pub on_collision:        CollisionPolicy,
}

impl NewTable {
  pub fn new(name: impl Into<String>, source_id: i64, columns: Vec<ColumnSpec>) -> Self {
    Self {
      name: name.into(),
      columns,
      foreign_keys: Vec::new(),
      source_id,
      description: None,
      original_identifier: None,
      on_collision: CollisionPolicy::Fail,
    }
  }

  pub fn on_collision(mut self, policy: CollisionPolicy) -> Self {
    self.on_collision = policy;
    self
  }

  pub fn foreign_key(mut self, fk: TableForeignKey) -> Self {
    self.foreign_keys.push(fk);
    self
  }

  pub fn description(mut self, text: impl Into<String>) -> Self {
    self.description = Some(text.into());
    self
  }

  pub fn original_identifier(mut self, id: impl Into<String>) -> Self {
    self.original_identifier = Some(id.into());
    self
  }
}

// ─── Objects, media, links ───────────────────────────────────────────────────

/// Request to store an immutable JSON document.
#[derive(Debug, Clone, PartialEq)]
pub struct NewObject {
  pub name:        String,
  pub source_id:   i64,
  pub json_data:   Value,
  pub description: Option<String>,
  pub schema_hint: Option<Value>,
}

/// Request to store an immutable binary blob.
#[derive(Debug, Clone, PartialEq)]
pub struct NewMedia {
  pub name:               String,
  pub source_id:          i64,
  pub media_data:         Vec<u8>,
  /// Broad category: image, audio, video, binary, …
  pub media_type:         String,
  pub description:        Option<String>,
  /// Concrete encoding, e.g. `png`.
  pub original_format:    Option<String>,
  pub technical_metadata: Option<Value>,
}

/// One end of a semantic link.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementRef {
  pub kind: ElementKind,
  /// Kind-specific locator, always a JSON object, e.g.
  /// `{"table_name": "orders"}` or `{"source_id": 3}`.
  pub spec: Value,
}

impl ElementRef {
  pub fn new(kind: ElementKind, spec: Value) -> Self { Self { kind, spec } }

  /// Build from an untyped kind tag; unknown tags are rejected.
  pub fn parse(kind: &str, spec: Value) -> Result<Self> {
    Ok(Self { kind: ElementKind::parse(kind)?, spec })
  }
}

/// Request to record a typed, directed edge between two elements.
#[derive(Debug, Clone, PartialEq)]
pub struct NewSemanticLink {
  /// Free-form relationship name: annotation, reference, logical_foreign_key…
  pub link_type:   String,
  pub description: Option<String>,
  pub from:        ElementRef,
  pub to:          ElementRef,
}

/// A JSON object read back from a container.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredObject {
  pub object_name: String,
  pub source_id:   i64,
  pub json_data:   Value,
  pub description: Option<String>,
  pub schema_hint: Option<Value>,
}

/// A media item read back from a container.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredMedia {
  pub media_name:         String,
  pub source_id:          i64,
  pub media_type:         String,
  pub media_data:         Vec<u8>,
  pub description:        Option<String>,
  pub original_format:    Option<String>,
  pub technical_metadata: Option<Value>,
}
