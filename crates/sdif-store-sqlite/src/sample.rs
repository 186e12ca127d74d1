//! Statistical sampling of user tables.
//!
//! Counting and grouping happen in SQL; the summary arithmetic is in
//! [`sdif_core::analysis`]. Nothing here writes, so the cached row counts are
//! left alone.

use rusqlite::Connection;
use sdif_core::analysis::{
  ColumnAnalysis, InferredType, ItemListing, ItemSummary, NumericSummary, SampleOptions,
  SampleReport, TableReport, TableSample, is_datetime_type, null_percentage,
};
use tracing::{debug, warn};

use crate::{
  Result,
  encode::{decode_cell, quote_ident},
  introspect,
};

pub fn analyse(conn: &Connection, options: &SampleOptions) -> Result<SampleReport> {
  let mut report = SampleReport::default();

  for name in introspect::table_names(conn)? {
    let entry = match analyse_table(conn, &name, options) {
      Ok(sample) => TableReport::Analysed(sample),
      Err(e) => {
        warn!(table = %name, error = %e, "sample analysis failed");
        TableReport::Failed { error: e.to_string() }
      }
    };
    report.tables.insert(name, entry);
  }

  if options.include_objects {
    report.objects = Some(object_listing(conn)?);
  }
  if options.include_media {
    report.media = Some(media_listing(conn)?);
  }
  Ok(report)
}

fn analyse_table(conn: &Connection, table: &str, options: &SampleOptions) -> Result<TableSample> {
  let row_count = introspect::table_metadata(conn, table)?.map_or(0, |m| m.row_count);
  let quoted = quote_ident(table);

  let total: i64 = conn.query_row(&format!("SELECT COUNT(*) FROM {quoted}"), [], |r| r.get(0))?;
  if total == 0 {
    debug!(table, "empty table, skipping analysis");
    return Ok(TableSample { row_count, ..TableSample::default() });
  }

  let sample_rows = introspect::read_rows(
    conn,
    &format!("SELECT * FROM {quoted} ORDER BY RANDOM() LIMIT ?1"),
    [sql_limit(options.sample_rows)],
  )?;

  let mut column_analysis = std::collections::BTreeMap::new();
  for col in introspect::columns(conn, table)? {
    let analysis = analyse_column(conn, &quoted, &col.name, &col.sqlite_type, total, options)?;
    column_analysis.insert(col.name, analysis);
  }

  Ok(TableSample { row_count, sample_rows, column_analysis })
}

fn analyse_column(
  conn: &Connection,
  table: &str,
  column: &str,
  sqlite_type: &str,
  total: i64,
  options: &SampleOptions,
) -> Result<ColumnAnalysis> {
  let col = quote_ident(column);

  let mut stmt = conn.prepare(&format!("SELECT typeof({col}), COUNT(*) FROM {table} GROUP BY 1"))?;
  let classes = stmt
    .query_map([], |r| Ok((r.get::<_, String>(0)?, r.get::<_, i64>(1)?)))?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  let nulls = classes
    .iter()
    .find(|(class, _)| class == "null")
    .map_or(0, |(_, n)| *n);
  let inferred_type = InferredType::from_storage_classes(classes.iter().map(|(c, _)| c.as_str()));

  let distinct_count: i64 =
    conn.query_row(&format!("SELECT COUNT(DISTINCT {col}) FROM {table}"), [], |r| r.get(0))?;

  let mut stmt = conn.prepare(&format!(
    "SELECT {col}, COUNT(*) AS n FROM {table} WHERE {col} IS NOT NULL
     GROUP BY {col} ORDER BY n DESC, {col} LIMIT ?1"
  ))?;
  let most_common_values = stmt
    .query_map([sql_limit(options.top_n_values)], |r| {
      Ok((decode_cell(r.get_ref(0)?), r.get::<_, i64>(1)?.max(0) as u64))
    })?
    .collect::<rusqlite::Result<Vec<_>>>()?;

  let is_numeric = inferred_type.is_numeric();
  let numeric_summary = if is_numeric {
    let mut stmt = conn.prepare(&format!(
      "SELECT {col} FROM {table} WHERE typeof({col}) IN ('integer', 'real')"
    ))?;
    let values = stmt
      .query_map([], |r| r.get::<_, f64>(0))?
      .collect::<rusqlite::Result<Vec<_>>>()?;
    NumericSummary::compute(&values)
  } else {
    None
  };

  Ok(ColumnAnalysis {
    sqlite_type: sqlite_type.to_owned(),
    inferred_type,
    null_percentage: null_percentage(nulls.max(0) as u64, total.max(0) as u64),
    distinct_count: distinct_count.max(0) as u64,
    most_common_values,
    is_numeric,
    is_datetime: is_datetime_type(sqlite_type),
    numeric_summary,
  })
}

fn object_listing(conn: &Connection) -> Result<ItemListing> {
  let mut stmt = conn.prepare(
    "SELECT object_name, description, source_id FROM sdif_objects ORDER BY object_name",
  )?;
  let items = stmt
    .query_map([], |r| {
      Ok(ItemSummary {
        name:        r.get(0)?,
        description: r.get(1)?,
        source_id:   r.get(2)?,
        media_type:  None,
      })
    })?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  Ok(items.into_iter().collect())
}

fn media_listing(conn: &Connection) -> Result<ItemListing> {
  let mut stmt = conn.prepare(
    "SELECT media_name, description, source_id, media_type FROM sdif_media ORDER BY media_name",
  )?;
  let items = stmt
    .query_map([], |r| {
      Ok(ItemSummary {
        name:        r.get(0)?,
        description: r.get(1)?,
        source_id:   r.get(2)?,
        media_type:  Some(r.get(3)?),
      })
    })?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  Ok(items.into_iter().collect())
}

/// `LIMIT` operand for a count. SQLite reads a negative limit as unbounded.
fn sql_limit(n: usize) -> i64 { i64::try_from(n).unwrap_or(i64::MAX) }
