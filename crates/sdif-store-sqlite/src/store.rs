//! [`SqliteContainer`], the SQLite implementation of [`SdifStore`].

use std::{
  fs,
  path::{Path, PathBuf},
};

use rusqlite::{Connection, OpenFlags, OptionalExtension as _, params, params_from_iter};
use sdif_core::{
  RESERVED_PREFIX, SDIF_VERSION,
  analysis::{SampleOptions, SampleReport},
  naming::unique_name,
  schema::{ContainerSchema, Properties, SemanticLink, Source, TableMetadata},
  store::SdifStore,
  table::{
    CollisionPolicy, ColumnSpec, ElementRef, NewMedia, NewObject, NewSemanticLink, NewTable,
    ReferentialAction, StoredMedia, StoredObject,
  },
  value::Row,
};
use tracing::{debug, info, warn};

use crate::{
  Error, Result,
  encode::{encode_cell, encode_json, encode_opt_json, now_timestamp, quote_ident},
  introspect, sample,
  schema::{METADATA_TABLES, SCHEMA},
};

// ─── Open modes ──────────────────────────────────────────────────────────────

/// How [`SqliteContainer::open`] treats the file at the given path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
  /// The file must exist and already be a container. Every write is refused.
  ReadOnly,
  /// Create the file and metadata relations if absent; keep existing data.
  ReadWrite,
  /// Delete any existing file, then initialise a fresh container.
  Overwrite,
}

// ─── Container ───────────────────────────────────────────────────────────────

/// One open SDIF container backed by a single SQLite file.
///
/// Holds one exclusive connection; `close` releases it early, dropping the
/// container releases it otherwise.
pub struct SqliteContainer {
  conn:      Option<Connection>,
  path:      Option<PathBuf>,
  read_only: bool,
}

impl SqliteContainer {
  /// Open the container at `path` in the given mode.
  pub fn open(path: impl AsRef<Path>, mode: OpenMode) -> Result<Self> {
    let path = path.as_ref();
    match mode {
      OpenMode::ReadOnly => Self::open_read_only(path),
      OpenMode::ReadWrite => Self::open_read_write(path),
      OpenMode::Overwrite => {
        if path.exists() {
          info!(path = %path.display(), "removing existing file before overwrite");
          fs::remove_file(path)
            .map_err(|source| Error::Io { path: path.to_owned(), source })?;
        }
        Self::open_read_write(path)
      }
    }
  }

  /// A fresh container that lives only as long as this value.
  pub fn open_in_memory() -> Result<Self> {
    let conn = Connection::open_in_memory()?;
    initialise(&conn)?;
    Ok(Self { conn: Some(conn), path: None, read_only: false })
  }

  fn open_read_only(path: &Path) -> Result<Self> {
    if !path.is_file() {
      return Err(Error::FileNotFound(path.to_owned()));
    }
    let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)?;
    for table in METADATA_TABLES {
      if !introspect::physical_table_exists(&conn, table)? {
        return Err(Error::NotAContainer(table));
      }
    }
    debug!(path = %path.display(), "opened container read-only");
    Ok(Self { conn: Some(conn), path: Some(path.to_owned()), read_only: true })
  }

  fn open_read_write(path: &Path) -> Result<Self> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
      fs::create_dir_all(parent)
        .map_err(|source| Error::Io { path: parent.to_owned(), source })?;
    }
    let conn = Connection::open(path)?;
    initialise(&conn)?;
    debug!(path = %path.display(), "opened container read-write");
    Ok(Self { conn: Some(conn), path: Some(path.to_owned()), read_only: false })
  }

  /// File backing this container; `None` for in-memory containers.
  pub fn path(&self) -> Option<&Path> { self.path.as_deref() }

  pub(crate) fn conn(&self) -> Result<&Connection> { self.conn.as_ref().ok_or(Error::Closed) }

  /// The connection, provided writes are allowed.
  fn writable(&self) -> Result<&Connection> {
    if self.read_only {
      return Err(Error::ReadOnly);
    }
    self.conn()
  }

  fn require_source(conn: &Connection, source_id: i64) -> Result<()> {
    if introspect::source_exists(conn, source_id)? {
      Ok(())
    } else {
      Err(Error::UnknownSource(source_id))
    }
  }
}

/// Create the metadata relations and the properties row if absent.
fn initialise(conn: &Connection) -> Result<()> {
  conn.execute_batch(SCHEMA)?;
  let has_properties = conn
    .query_row("SELECT 1 FROM sdif_properties LIMIT 1", [], |_| Ok(()))
    .optional()?
    .is_some();
  if !has_properties {
    conn.execute(
      "INSERT INTO sdif_properties (sdif_version, creation_timestamp) VALUES (?1, ?2)",
      params![SDIF_VERSION, now_timestamp()],
    )?;
    info!(version = SDIF_VERSION, "initialised new container");
  }
  Ok(())
}

// ─── Table DDL ───────────────────────────────────────────────────────────────

fn validate_table(table: &NewTable) -> Result<()> {
  let name = table.name.as_str();
  if name.trim().is_empty() {
    return Err(Error::InvalidTableName { name: name.to_owned(), reason: "name is empty" });
  }
  let lower = name.to_ascii_lowercase();
  if lower.starts_with(RESERVED_PREFIX) {
    return Err(Error::InvalidTableName {
      name:   name.to_owned(),
      reason: "the sdif_ prefix is reserved for metadata",
    });
  }
  if lower.starts_with("sqlite_") {
    return Err(Error::InvalidTableName {
      name:   name.to_owned(),
      reason: "the sqlite_ prefix is reserved by the engine",
    });
  }
  if table.columns.is_empty() {
    return Err(Error::NoColumns(name.to_owned()));
  }

  let mut seen = std::collections::HashSet::new();
  for col in &table.columns {
    if col.name.trim().is_empty() {
      return Err(Error::InvalidColumn {
        table:  name.to_owned(),
        column: col.name.clone(),
        reason: "column name is empty",
      });
    }
    if !seen.insert(col.name.to_ascii_lowercase()) {
      return Err(Error::InvalidColumn {
        table:  name.to_owned(),
        column: col.name.clone(),
        reason: "duplicate column name",
      });
    }
  }

  for fk in &table.foreign_keys {
    let invalid = |column: &str, reason| Error::InvalidColumn {
      table: name.to_owned(),
      column: column.to_owned(),
      reason,
    };
    if fk.columns.is_empty() {
      return Err(invalid("", "foreign key names no columns"));
    }
    if !fk.target_columns.is_empty() && fk.target_columns.len() != fk.columns.len() {
      return Err(invalid(&fk.columns[0], "foreign key column counts differ"));
    }
    if let Some(missing) = fk.columns.iter().find(|c| !seen.contains(&c.to_ascii_lowercase())) {
      return Err(invalid(missing, "foreign key names an unknown column"));
    }
  }
  Ok(())
}

fn column_type(col: &ColumnSpec) -> String {
  let ty = col.sql_type.trim();
  if ty.is_empty() { "TEXT".to_owned() } else { ty.to_ascii_uppercase() }
}

fn references(target: &str, columns: &[&str]) -> String {
  if columns.iter().any(|c| c.is_empty()) {
    return format!("REFERENCES {}", quote_ident(target));
  }
  let cols: Vec<String> = columns.iter().map(|c| quote_ident(c)).collect();
  format!("REFERENCES {}({})", quote_ident(target), cols.join(", "))
}

fn push_actions(
  clause: &mut String,
  on_delete: Option<ReferentialAction>,
  on_update: Option<ReferentialAction>,
) {
  if let Some(action) = on_delete {
    clause.push_str(&format!(" ON DELETE {action}"));
  }
  if let Some(action) = on_update {
    clause.push_str(&format!(" ON UPDATE {action}"));
  }
}

/// `CREATE TABLE` statement for `table` under `name`.
///
/// A foreign key naming the requested name is a self-reference and follows
/// the table to `name`.
fn create_table_sql(name: &str, table: &NewTable) -> String {
  let requested = table.name.as_str();
  let columns = &table.columns;
  let effective = |target: &str| if target == requested { name.to_owned() } else { target.to_owned() };

  let mut pk: Vec<(u32, usize, &str)> = columns
    .iter()
    .enumerate()
    .filter_map(|(i, c)| c.primary_key.map(|pos| (pos, i, c.name.as_str())))
    .collect();
  pk.sort();
  let inline_pk = pk.len() == 1;

  let mut parts: Vec<String> = columns
    .iter()
    .map(|c| {
      let mut def = format!("{} {}", quote_ident(&c.name), column_type(c));
      if inline_pk && c.primary_key.is_some() {
        def.push_str(" PRIMARY KEY");
      }
      if c.not_null {
        def.push_str(" NOT NULL");
      }
      if let Some(expr) = &c.default_value {
        def.push_str(" DEFAULT ");
        def.push_str(expr);
      }
      def
    })
    .collect();

  if pk.len() > 1 {
    let cols: Vec<String> = pk.iter().map(|(_, _, n)| quote_ident(n)).collect();
    parts.push(format!("PRIMARY KEY ({})", cols.join(", ")));
  }

  for c in columns {
    let Some(fk) = &c.foreign_key else { continue };
    let mut clause = format!(
      "FOREIGN KEY ({}) {}",
      quote_ident(&c.name),
      references(&effective(&fk.table), &[fk.column.as_str()]),
    );
    push_actions(&mut clause, fk.on_delete, fk.on_update);
    parts.push(clause);
  }

  for fk in &table.foreign_keys {
    let from: Vec<String> = fk.columns.iter().map(|c| quote_ident(c)).collect();
    let to: Vec<&str> = fk.target_columns.iter().map(String::as_str).collect();
    let mut clause = format!(
      "FOREIGN KEY ({}) {}",
      from.join(", "),
      references(&effective(&fk.table), &to),
    );
    push_actions(&mut clause, fk.on_delete, fk.on_update);
    parts.push(clause);
  }

  format!("CREATE TABLE {} (\n  {}\n)", quote_ident(name), parts.join(",\n  "))
}

/// Drop a user relation and its metadata on `conn`, inside the caller's
/// transaction.
fn drop_relation(conn: &Connection, name: &str) -> Result<()> {
  conn.execute(&format!("DROP TABLE IF EXISTS {}", quote_ident(name)), [])?;
  conn.execute("DELETE FROM sdif_columns_metadata WHERE table_name = ?1", [name])?;
  conn.execute("DELETE FROM sdif_tables_metadata WHERE table_name = ?1", [name])?;
  Ok(())
}

fn check_element(element: &ElementRef) -> Result<()> {
  if element.spec.is_object() {
    Ok(())
  } else {
    Err(Error::InvalidElementSpec(element.kind))
  }
}

// ─── SdifStore impl ──────────────────────────────────────────────────────────

impl SdifStore for SqliteContainer {
  type Error = Error;

  fn is_read_only(&self) -> bool { self.read_only }

  // ── Properties and sources ────────────────────────────────────────────────

  fn properties(&self) -> Result<Option<Properties>> { introspect::properties(self.conn()?) }

  fn refresh_creation_timestamp(&self) -> Result<()> {
    let conn = self.writable()?;
    let now = now_timestamp();
    let updated =
      conn.execute("UPDATE sdif_properties SET creation_timestamp = ?1", [&now])?;
    if updated == 0 {
      conn.execute(
        "INSERT INTO sdif_properties (sdif_version, creation_timestamp) VALUES (?1, ?2)",
        params![SDIF_VERSION, now],
      )?;
    }
    Ok(())
  }

  fn list_sources(&self) -> Result<Vec<Source>> { introspect::sources(self.conn()?) }

  fn add_source(
    &self,
    file_name: &str,
    file_type: &str,
    description: Option<&str>,
  ) -> Result<i64> {
    let conn = self.writable()?;
    conn.execute(
      "INSERT INTO sdif_sources (
         original_file_name, original_file_type, source_description, processing_timestamp
       ) VALUES (?1, ?2, ?3, ?4)",
      params![file_name, file_type, description, now_timestamp()],
    )?;
    let id = conn.last_insert_rowid();
    debug!(source_id = id, file_name, "added source");
    Ok(id)
  }

  // ── Tables ────────────────────────────────────────────────────────────────

  fn create_table(&self, table: &NewTable) -> Result<String> {
    let conn = self.writable()?;
    validate_table(table)?;
    Self::require_source(conn, table.source_id)?;

    let requested = table.name.as_str();
    let taken = introspect::relation_exists(conn, requested)?;
    let (name, replace) = match (taken, table.on_collision) {
      (false, _) => (requested.to_owned(), false),
      (true, CollisionPolicy::Fail) => return Err(Error::TableExists(requested.to_owned())),
      (true, CollisionPolicy::Replace) => (requested.to_owned(), true),
      (true, CollisionPolicy::Add) => {
        let taken = introspect::relation_names(conn)?;
        (unique_name(requested, |c| taken.contains(c))?, false)
      }
    };

    let column_targets = table
      .columns
      .iter()
      .filter_map(|c| c.foreign_key.as_ref().map(|fk| (c.name.clone(), &fk.table)));
    let table_targets = table.foreign_keys.iter().map(|fk| (fk.columns.join(", "), &fk.table));
    for (column, target) in column_targets.chain(table_targets) {
      if target != requested && !introspect::relation_exists(conn, target)? {
        return Err(Error::MissingForeignKeyTarget {
          table: requested.to_owned(),
          column,
          target: target.clone(),
        });
      }
    }

    let ddl = create_table_sql(&name, table);
    let tx = conn.unchecked_transaction()?;
    if replace {
      warn!(table = %name, "replacing existing table");
      drop_relation(&tx, &name)?;
    }
    tx.execute(&ddl, [])?;
    tx.execute(
      "INSERT INTO sdif_tables_metadata (
         table_name, source_id, description, original_identifier, row_count
       ) VALUES (?1, ?2, ?3, ?4, 0)",
      params![name, table.source_id, table.description, table.original_identifier],
    )?;
    {
      let mut stmt = tx.prepare(
        "INSERT INTO sdif_columns_metadata (
           table_name, column_name, description, original_column_name
         ) VALUES (?1, ?2, ?3, ?4)",
      )?;
      for col in &table.columns {
        stmt.execute(params![name, col.name, col.description, col.original_column_name])?;
      }
    }
    tx.commit()?;

    if name != requested {
      info!(requested, created = %name, "table name taken; created under a suffixed name");
    } else {
      debug!(table = %name, columns = table.columns.len(), "created table");
    }
    Ok(name)
  }

  fn insert_data(&self, table_name: &str, rows: &[Row]) -> Result<()> {
    let conn = self.writable()?;
    if introspect::table_metadata(conn, table_name)?.is_none() {
      return Err(Error::TableNotFound(table_name.to_owned()));
    }
    let Some(first) = rows.first() else {
      return Ok(());
    };
    if let Some(index) = rows.iter().position(|r| !r.keys().eq(first.keys())) {
      return Err(Error::NonUniformRows { table: table_name.to_owned(), index });
    }

    let columns: Vec<String> = first.keys().map(|c| quote_ident(c)).collect();
    let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{i}")).collect();
    let sql = format!(
      "INSERT INTO {} ({}) VALUES ({})",
      quote_ident(table_name),
      columns.join(", "),
      placeholders.join(", "),
    );

    let tx = conn.unchecked_transaction()?;
    // Self-referencing rows may arrive in any order; checked at commit.
    tx.execute_batch("PRAGMA defer_foreign_keys = ON")?;
    {
      let mut stmt = tx.prepare(&sql)?;
      for row in rows {
        stmt.execute(params_from_iter(row.values().map(encode_cell)))?;
      }
    }
    tx.execute(
      &format!(
        "UPDATE sdif_tables_metadata SET row_count = (SELECT COUNT(*) FROM {})
         WHERE table_name = ?1",
        quote_ident(table_name)
      ),
      [table_name],
    )?;
    tx.commit()?;
    debug!(table = table_name, rows = rows.len(), "inserted rows");
    Ok(())
  }

  fn read_table(&self, table_name: &str) -> Result<Vec<Row>> {
    introspect::read_table(self.conn()?, table_name)
  }

  fn drop_table(&self, table_name: &str) -> Result<()> {
    let conn = self.writable()?;
    let tx = conn.unchecked_transaction()?;
    drop_relation(&tx, table_name)?;
    tx.commit()?;
    debug!(table = table_name, "dropped table");
    Ok(())
  }

  fn list_tables(&self) -> Result<Vec<String>> { introspect::table_names(self.conn()?) }

  fn table_metadata(&self, table_name: &str) -> Result<Option<TableMetadata>> {
    introspect::table_metadata(self.conn()?, table_name)
  }

  // ── Objects and media ─────────────────────────────────────────────────────

  fn add_object(&self, object: &NewObject) -> Result<()> {
    let conn = self.writable()?;
    Self::require_source(conn, object.source_id)?;
    if introspect::object(conn, &object.name)?.is_some() {
      return Err(Error::Duplicate { entity: "object", name: object.name.clone() });
    }
    let json = encode_json(&object.json_data)?;
    let hint = encode_opt_json(object.schema_hint.as_ref())?;
    conn.execute(
      "INSERT INTO sdif_objects (object_name, source_id, json_data, description, schema_hint)
       VALUES (?1, ?2, ?3, ?4, ?5)",
      params![object.name, object.source_id, json, object.description, hint],
    )?;
    Ok(())
  }

  fn get_object(&self, name: &str) -> Result<Option<StoredObject>> {
    introspect::object(self.conn()?, name)
  }

  fn list_objects(&self) -> Result<Vec<String>> { introspect::object_names(self.conn()?) }

  fn add_media(&self, media: &NewMedia) -> Result<()> {
    let conn = self.writable()?;
    Self::require_source(conn, media.source_id)?;
    let exists = conn
      .query_row("SELECT 1 FROM sdif_media WHERE media_name = ?1", [&media.name], |_| Ok(()))
      .optional()?
      .is_some();
    if exists {
      return Err(Error::Duplicate { entity: "media", name: media.name.clone() });
    }
    let meta = encode_opt_json(media.technical_metadata.as_ref())?;
    conn.execute(
      "INSERT INTO sdif_media (
         media_name, source_id, media_type, media_data, description,
         original_format, technical_metadata
       ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
      params![
        media.name,
        media.source_id,
        media.media_type,
        media.media_data,
        media.description,
        media.original_format,
        meta,
      ],
    )?;
    Ok(())
  }

  fn get_media(&self, name: &str) -> Result<Option<StoredMedia>> {
    introspect::media(self.conn()?, name)
  }

  fn list_media(&self) -> Result<Vec<String>> { introspect::media_names(self.conn()?) }

  // ── Semantic links ────────────────────────────────────────────────────────

  fn add_semantic_link(&self, link: &NewSemanticLink) -> Result<i64> {
    let conn = self.writable()?;
    check_element(&link.from)?;
    check_element(&link.to)?;
    conn.execute(
      "INSERT INTO sdif_semantic_links (
         link_type, description, from_element_type, from_element_spec,
         to_element_type, to_element_spec
       ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
      params![
        link.link_type,
        link.description,
        link.from.kind.as_str(),
        encode_json(&link.from.spec)?,
        link.to.kind.as_str(),
        encode_json(&link.to.spec)?,
      ],
    )?;
    Ok(conn.last_insert_rowid())
  }

  fn list_semantic_links(&self) -> Result<Vec<SemanticLink>> {
    introspect::semantic_links(self.conn()?)
  }

  // ── Introspection ─────────────────────────────────────────────────────────

  fn introspect_schema(&self) -> Result<ContainerSchema> { introspect::schema(self.conn()?) }

  fn sample_analysis(&self, options: &SampleOptions) -> Result<SampleReport> {
    sample::analyse(self.conn()?, options)
  }

  fn close(&mut self) -> Result<()> {
    if let Some(conn) = self.conn.take() {
      conn.close().map_err(|(_, e)| e)?;
      debug!(path = ?self.path, "closed container");
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use sdif_core::table::TableForeignKey;

  use super::*;

  fn sql(name: &str, requested: &str, columns: Vec<ColumnSpec>) -> String {
    create_table_sql(name, &NewTable::new(requested, 1, columns))
  }

  #[test]
  fn composite_key_is_table_level_in_position_order() {
    let cols = vec![
      ColumnSpec::new("b", "text").primary_key_at(2),
      ColumnSpec::new("a", "integer").primary_key_at(1),
    ];
    let sql = sql("t", "t", cols);
    assert!(sql.contains("\"b\" TEXT,"));
    assert!(sql.contains("PRIMARY KEY (\"a\", \"b\")"));
  }

  #[test]
  fn single_key_is_inline() {
    let cols = vec![ColumnSpec::new("id", "").primary_key().not_null()];
    let sql = sql("t", "t", cols);
    assert!(sql.contains("\"id\" TEXT PRIMARY KEY NOT NULL"));
  }

  #[test]
  fn self_reference_follows_the_effective_name() {
    let cols = vec![
      ColumnSpec::new("id", "INTEGER").primary_key(),
      ColumnSpec::new("parent", "INTEGER")
        .references("node", "id")
        .on_delete(ReferentialAction::SetNull),
    ];
    let sql = sql("node_1", "node", cols);
    assert!(sql.contains("FOREIGN KEY (\"parent\") REFERENCES \"node_1\"(\"id\") ON DELETE SET NULL"));
  }

  #[test]
  fn composite_foreign_key_is_table_level() {
    let table = NewTable::new("lines", 1, vec![
      ColumnSpec::new("order_id", "INTEGER").primary_key_at(1),
      ColumnSpec::new("line_no", "INTEGER").primary_key_at(2),
    ])
    .foreign_key(TableForeignKey {
      on_delete: Some(ReferentialAction::Cascade),
      ..TableForeignKey::new(["order_id", "line_no"], "slots", ["o", "n"])
    });
    let sql = create_table_sql("lines", &table);
    assert!(sql.contains(
      "FOREIGN KEY (\"order_id\", \"line_no\") REFERENCES \"slots\"(\"o\", \"n\") ON DELETE CASCADE"
    ));
  }

  #[test]
  fn foreign_key_without_target_columns_references_the_key() {
    let table = NewTable::new("t", 1, vec![ColumnSpec::new("a", "TEXT")])
      .foreign_key(TableForeignKey::new(["a"], "u", Vec::<String>::new()));
    assert!(create_table_sql("t", &table).contains("FOREIGN KEY (\"a\") REFERENCES \"u\"\n"));
  }

  #[test]
  fn table_foreign_keys_must_name_declared_columns() {
    let t = NewTable::new("t", 1, vec![ColumnSpec::new("a", "TEXT")])
      .foreign_key(TableForeignKey::new(["a", "b"], "u", ["x", "y"]));
    assert!(matches!(validate_table(&t), Err(Error::InvalidColumn { ref column, .. }) if column == "b"));

    let t = NewTable::new("t", 1, vec![ColumnSpec::new("a", "TEXT")])
      .foreign_key(TableForeignKey::new(["a"], "u", ["x", "y"]));
    assert!(matches!(validate_table(&t), Err(Error::InvalidColumn { .. })));
  }

  #[test]
  fn reserved_prefix_is_case_insensitive() {
    let t = NewTable::new("SDIF_Things", 1, vec![ColumnSpec::new("a", "TEXT")]);
    assert!(matches!(validate_table(&t), Err(Error::InvalidTableName { .. })));
  }
}
