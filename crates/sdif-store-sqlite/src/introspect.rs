//! Read-side queries over a container connection.
//!
//! Free functions over `&Connection` so both the store's read operations and
//! the sampler share them.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use rusqlite::{Connection, OptionalExtension as _};
use sdif_core::{
  schema::{
    ColumnInfo, ContainerSchema, ForeignKeyInfo, JsonPayload, MediaInfo, ObjectInfo,
    Properties, SemanticLink, Source, TableMetadata, TableSchema,
  },
  table::{StoredMedia, StoredObject},
  value::Row,
};
use tracing::warn;

use crate::{
  Error, Result,
  encode::{RawLink, decode_action, decode_cell, decode_json, decode_opt_json, quote_ident},
};

// ─── Container-level ─────────────────────────────────────────────────────────

pub fn properties(conn: &Connection) -> Result<Option<Properties>> {
  Ok(
    conn
      .query_row(
        "SELECT sdif_version, creation_timestamp FROM sdif_properties LIMIT 1",
        [],
        |r| {
          Ok(Properties { sdif_version: r.get(0)?, creation_timestamp: r.get(1)? })
        },
      )
      .optional()?,
  )
}

pub fn sources(conn: &Connection) -> Result<Vec<Source>> {
  let mut stmt = conn.prepare(
    "SELECT source_id, original_file_name, original_file_type,
            source_description, processing_timestamp
     FROM sdif_sources ORDER BY source_id",
  )?;
  let rows = stmt.query_map([], |r| {
    Ok(Source {
      source_id:            r.get(0)?,
      original_file_name:   r.get(1)?,
      original_file_type:   r.get(2)?,
      source_description:   r.get(3)?,
      processing_timestamp: r.get(4)?,
    })
  })?;
  Ok(rows.collect::<rusqlite::Result<_>>()?)
}

pub fn source_exists(conn: &Connection, source_id: i64) -> Result<bool> {
  Ok(
    conn
      .query_row("SELECT 1 FROM sdif_sources WHERE source_id = ?1", [source_id], |_| Ok(()))
      .optional()?
      .is_some(),
  )
}

// ─── Tables ──────────────────────────────────────────────────────────────────

pub fn table_names(conn: &Connection) -> Result<Vec<String>> {
  names(conn, "SELECT table_name FROM sdif_tables_metadata ORDER BY table_name")
}

/// Whether `name` is registered in metadata or exists as any relation.
pub fn relation_exists(conn: &Connection, name: &str) -> Result<bool> {
  let registered = conn
    .query_row("SELECT 1 FROM sdif_tables_metadata WHERE table_name = ?1", [name], |_| Ok(()))
    .optional()?
    .is_some();
  Ok(registered || physical_table_exists(conn, name)?)
}

/// Every name `relation_exists` would accept: registered tables plus any
/// physical table or view.
pub fn relation_names(conn: &Connection) -> Result<BTreeSet<String>> {
  let mut taken: BTreeSet<String> = table_names(conn)?.into_iter().collect();
  taken.extend(names(
    conn,
    "SELECT name FROM sqlite_master WHERE type IN ('table', 'view') ORDER BY name",
  )?);
  Ok(taken)
}

pub fn physical_table_exists(conn: &Connection, name: &str) -> Result<bool> {
  Ok(
    conn
      .query_row(
        "SELECT 1 FROM sqlite_master WHERE type IN ('table', 'view') AND name = ?1",
        [name],
        |_| Ok(()),
      )
      .optional()?
      .is_some(),
  )
}

pub fn table_metadata(conn: &Connection, name: &str) -> Result<Option<TableMetadata>> {
  Ok(
    conn
      .query_row(
        "SELECT table_name, source_id, description, original_identifier, row_count
         FROM sdif_tables_metadata WHERE table_name = ?1",
        [name],
        |r| {
          Ok(TableMetadata {
            table_name:          r.get(0)?,
            source_id:           r.get(1)?,
            description:         r.get(2)?,
            original_identifier: r.get(3)?,
            row_count:           r.get::<_, Option<i64>>(4)?.unwrap_or(0),
          })
        },
      )
      .optional()?,
  )
}

/// Physical columns in declaration order, merged with column metadata.
pub fn columns(conn: &Connection, table: &str) -> Result<Vec<ColumnInfo>> {
  let mut meta_stmt = conn.prepare(
    "SELECT column_name, description, original_column_name
     FROM sdif_columns_metadata WHERE table_name = ?1",
  )?;
  let meta: HashMap<String, (Option<String>, Option<String>)> = meta_stmt
    .query_map([table], |r| Ok((r.get(0)?, (r.get(1)?, r.get(2)?))))?
    .collect::<rusqlite::Result<_>>()?;

  let mut stmt =
    conn.prepare("SELECT name, type, \"notnull\", dflt_value, pk FROM pragma_table_info(?1)")?;
  let rows = stmt.query_map([table], |r| {
    let pk: u32 = r.get(4)?;
    Ok(ColumnInfo {
      name:                 r.get(0)?,
      sqlite_type:          r.get(1)?,
      not_null:             r.get(2)?,
      default_value:        r.get(3)?,
      primary_key:          (pk > 0).then_some(pk),
      description:          None,
      original_column_name: None,
    })
  })?;

  let mut cols = rows.collect::<rusqlite::Result<Vec<_>>>()?;
  for col in &mut cols {
    if let Some((description, original)) = meta.get(&col.name) {
      col.description = description.clone();
      col.original_column_name = original.clone();
    }
  }
  Ok(cols)
}

pub fn foreign_keys(conn: &Connection, table: &str) -> Result<Vec<ForeignKeyInfo>> {
  let mut stmt = conn.prepare(
    "SELECT id, seq, \"table\", \"from\", \"to\", on_update, on_delete, \"match\"
     FROM pragma_foreign_key_list(?1) ORDER BY id, seq",
  )?;
  let raw = stmt
    .query_map([table], |r| {
      Ok((
        r.get::<_, i64>(0)?,
        r.get::<_, i64>(1)?,
        r.get::<_, String>(2)?,
        r.get::<_, String>(3)?,
        // NULL when the key targets the parent's primary key implicitly.
        r.get::<_, Option<String>>(4)?,
        r.get::<_, String>(5)?,
        r.get::<_, String>(6)?,
        r.get::<_, String>(7)?,
      ))
    })?
    .collect::<rusqlite::Result<Vec<_>>>()?;

  raw
    .into_iter()
    .map(|(id, seq, target, from, to, on_update, on_delete, match_clause)| {
      Ok(ForeignKeyInfo {
        id,
        seq,
        from_column: from,
        target_table: target,
        target_column: to.unwrap_or_default(),
        on_update: decode_action(&on_update)?,
        on_delete: decode_action(&on_delete)?,
        match_clause,
      })
    })
    .collect()
}

pub fn read_rows(conn: &Connection, sql: &str, params: impl rusqlite::Params) -> Result<Vec<Row>> {
  let mut stmt = conn.prepare(sql)?;
  let names: Vec<String> = stmt.column_names().into_iter().map(str::to_owned).collect();
  let mut rows = stmt.query(params)?;
  let mut out = Vec::new();
  while let Some(r) = rows.next()? {
    let mut row = Row::new();
    for (i, name) in names.iter().enumerate() {
      row.insert(name.clone(), decode_cell(r.get_ref(i)?));
    }
    out.push(row);
  }
  Ok(out)
}

pub fn read_table(conn: &Connection, table: &str) -> Result<Vec<Row>> {
  if !physical_table_exists(conn, table)? {
    return Err(Error::TableNotFound(table.to_owned()));
  }
  read_rows(conn, &format!("SELECT * FROM {}", quote_ident(table)), [])
}

// ─── Objects and media ───────────────────────────────────────────────────────

pub fn object_names(conn: &Connection) -> Result<Vec<String>> {
  names(conn, "SELECT object_name FROM sdif_objects ORDER BY object_name")
}

pub fn media_names(conn: &Connection) -> Result<Vec<String>> {
  names(conn, "SELECT media_name FROM sdif_media ORDER BY media_name")
}

pub fn object(conn: &Connection, name: &str) -> Result<Option<StoredObject>> {
  let raw = conn
    .query_row(
      "SELECT object_name, source_id, json_data, description, schema_hint
       FROM sdif_objects WHERE object_name = ?1",
      [name],
      |r| {
        Ok((
          r.get::<_, String>(0)?,
          r.get::<_, i64>(1)?,
          r.get::<_, String>(2)?,
          r.get::<_, Option<String>>(3)?,
          r.get::<_, Option<String>>(4)?,
        ))
      },
    )
    .optional()?;

  raw
    .map(|(object_name, source_id, json, description, hint)| {
      Ok(StoredObject {
        object_name,
        source_id,
        json_data: decode_json(&json)?,
        description,
        schema_hint: decode_opt_json(hint.as_deref())?,
      })
    })
    .transpose()
}

pub fn media(conn: &Connection, name: &str) -> Result<Option<StoredMedia>> {
  let raw = conn
    .query_row(
      "SELECT media_name, source_id, media_type, media_data, description,
              original_format, technical_metadata
       FROM sdif_media WHERE media_name = ?1",
      [name],
      |r| {
        Ok((
          r.get::<_, String>(0)?,
          r.get::<_, i64>(1)?,
          r.get::<_, String>(2)?,
          r.get::<_, Vec<u8>>(3)?,
          r.get::<_, Option<String>>(4)?,
          r.get::<_, Option<String>>(5)?,
          r.get::<_, Option<String>>(6)?,
        ))
      },
    )
    .optional()?;

  raw
    .map(|(media_name, source_id, media_type, media_data, description, original_format, meta)| {
      Ok(StoredMedia {
        media_name,
        source_id,
        media_type,
        media_data,
        description,
        original_format,
        technical_metadata: decode_opt_json(meta.as_deref())?,
      })
    })
    .transpose()
}

fn object_infos(conn: &Connection) -> Result<BTreeMap<String, ObjectInfo>> {
  let mut stmt =
    conn.prepare("SELECT object_name, source_id, description, schema_hint FROM sdif_objects")?;
  let rows = stmt.query_map([], |r| {
    Ok((
      r.get::<_, String>(0)?,
      r.get::<_, i64>(1)?,
      r.get::<_, Option<String>>(2)?,
      r.get::<_, Option<String>>(3)?,
    ))
  })?;

  let mut out = BTreeMap::new();
  for row in rows {
    let (name, source_id, description, hint) = row?;
    let schema_hint = JsonPayload::from_stored(hint.as_deref());
    if let Some(JsonPayload::Invalid { error }) = &schema_hint {
      warn!(object = %name, %error, "stored schema hint is not valid JSON");
    }
    out.insert(name, ObjectInfo { source_id, description, schema_hint });
  }
  Ok(out)
}

fn media_infos(conn: &Connection) -> Result<BTreeMap<String, MediaInfo>> {
  // media_data stays on disk.
  let mut stmt = conn.prepare(
    "SELECT media_name, source_id, media_type, description, original_format,
            technical_metadata
     FROM sdif_media",
  )?;
  let rows = stmt.query_map([], |r| {
    Ok((
      r.get::<_, String>(0)?,
      r.get::<_, i64>(1)?,
      r.get::<_, String>(2)?,
      r.get::<_, Option<String>>(3)?,
      r.get::<_, Option<String>>(4)?,
      r.get::<_, Option<String>>(5)?,
    ))
  })?;

  let mut out = BTreeMap::new();
  for row in rows {
    let (name, source_id, media_type, description, original_format, meta) = row?;
    let technical_metadata = JsonPayload::from_stored(meta.as_deref());
    if let Some(JsonPayload::Invalid { error }) = &technical_metadata {
      warn!(media = %name, %error, "stored technical metadata is not valid JSON");
    }
    out.insert(name, MediaInfo {
      source_id,
      media_type,
      description,
      original_format,
      technical_metadata,
    });
  }
  Ok(out)
}

// ─── Links ───────────────────────────────────────────────────────────────────

pub fn semantic_links(conn: &Connection) -> Result<Vec<SemanticLink>> {
  let sql = format!("SELECT {} FROM sdif_semantic_links ORDER BY link_id", RawLink::COLUMNS);
  let mut stmt = conn.prepare(&sql)?;
  let raw = stmt
    .query_map([], RawLink::from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  raw.into_iter().map(RawLink::into_link).collect()
}

// ─── Whole schema ────────────────────────────────────────────────────────────

pub fn schema(conn: &Connection) -> Result<ContainerSchema> {
  let mut tables = BTreeMap::new();
  for name in table_names(conn)? {
    let Some(metadata) = table_metadata(conn, &name)? else {
      continue;
    };
    let table = TableSchema {
      columns: columns(conn, &name)?,
      foreign_keys: foreign_keys(conn, &name)?,
      metadata,
    };
    tables.insert(name, table);
  }

  Ok(ContainerSchema {
    properties: properties(conn)?,
    sources: sources(conn)?,
    tables,
    objects: object_infos(conn)?,
    media: media_infos(conn)?,
    semantic_links: semantic_links(conn)?,
  })
}

fn names(conn: &Connection, sql: &str) -> Result<Vec<String>> {
  let mut stmt = conn.prepare(sql)?;
  let rows = stmt.query_map([], |r| r.get(0))?;
  Ok(rows.collect::<rusqlite::Result<_>>()?)
}
