//! Read-only ad-hoc SQL over a container.

use sdif_core::{store::SdifStore as _, value::CellValue};
use serde::Serialize;
use tracing::{debug, warn};

use crate::{Error, Result, SqliteContainer, encode::decode_cell};

/// Words that make a statement a write or an engine-level command.
const FORBIDDEN: &[&str] = &[
  "insert", "update", "delete", "replace", "drop", "create", "alter", "attach", "detach",
  "pragma", "vacuum", "reindex",
];

const ALLOWED_LEADING: &[&str] = &["select", "with", "explain"];

/// Column names plus rows, positionally aligned.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryResult {
  pub columns: Vec<String>,
  pub rows:    Vec<Vec<CellValue>>,
}

/// Reject anything that is not a single read-only statement.
///
/// Matching is on whole words, so a column called `updated_at` passes while
/// `UPDATE` anywhere in the text does not.
pub fn check_read_only(sql: &str) -> Result<()> {
  let trimmed = sql.trim().trim_end_matches(';').trim_end();
  if trimmed.is_empty() {
    return Err(Error::QueryRejected("empty statement".into()));
  }
  if trimmed.contains(';') {
    return Err(Error::QueryRejected("only a single statement is allowed".into()));
  }

  let words: Vec<String> = trimmed
    .split(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
    .filter(|w| !w.is_empty())
    .map(str::to_ascii_lowercase)
    .collect();

  let leading = words.first().map(String::as_str).unwrap_or_default();
  if !ALLOWED_LEADING.contains(&leading) {
    return Err(Error::QueryRejected(format!(
      "statement must start with SELECT, WITH or EXPLAIN, not {leading:?}"
    )));
  }
  if let Some(word) = words.iter().find(|w| FORBIDDEN.contains(&w.as_str())) {
    return Err(Error::QueryRejected(format!("forbidden keyword {word:?}")));
  }
  Ok(())
}

impl SqliteContainer {
  /// Run one read-only statement and return every row.
  pub fn query(&self, sql: &str) -> Result<QueryResult> {
    check_read_only(sql)?;
    let conn = self.conn()?;
    if !self.is_read_only() {
      warn!("running an ad-hoc query on a writable container");
    }

    let mut stmt = conn.prepare(sql)?;
    let columns: Vec<String> = stmt.column_names().into_iter().map(str::to_owned).collect();
    let width = columns.len();
    let mut rows = Vec::new();
    let mut cursor = stmt.query([])?;
    while let Some(r) = cursor.next()? {
      let row = (0..width)
        .map(|i| r.get_ref(i).map(decode_cell))
        .collect::<rusqlite::Result<Vec<_>>>()?;
      rows.push(row);
    }
    debug!(rows = rows.len(), "query complete");
    Ok(QueryResult { columns, rows })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn plain_select_passes() {
    assert!(check_read_only("SELECT * FROM t;").is_ok());
    assert!(check_read_only("  with x as (select 1) select * from x").is_ok());
    assert!(check_read_only("SELECT updated_at FROM t").is_ok());
  }

  #[test]
  fn writes_are_rejected() {
    for sql in [
      "DELETE FROM t",
      "select 1; drop table t",
      "WITH x AS (SELECT 1) INSERT INTO t SELECT * FROM x",
      "PRAGMA table_info(t)",
      "",
    ] {
      let err = check_read_only(sql).unwrap_err();
      assert_eq!(err.kind(), sdif_core::ErrorKind::PermissionDenied, "{sql}");
    }
  }
}
