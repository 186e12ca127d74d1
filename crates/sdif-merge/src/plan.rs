//! Table planning for one source container.
//!
//! Planning is pure and runs in two steps over an arena of pending tables
//! keyed by original name. [`assign_names`] fixes every target name first, so
//! [`plan_tables`] can rewrite same-source foreign keys before anything is
//! created. The result lists tables in an order where every foreign key
//! points at a table created earlier (or at itself).

use std::collections::{BTreeMap, BTreeSet};

use sdif_core::{
  naming::unique_name,
  schema::{ForeignKeyInfo, TableSchema},
  table::{CollisionPolicy, ColumnSpec, ForeignKeySpec, NewTable, TableForeignKey},
};
use serde::Serialize;
use tracing::warn;

use crate::{Error, Result};

/// A foreign key left out of the merged table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DroppedForeignKey {
  pub table:  String,
  /// Comma-separated for composite keys.
  pub column: String,
  pub target: String,
  pub reason: &'static str,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TablePlan {
  /// Original name → name in the target.
  pub renames: BTreeMap<String, String>,
  /// Ready-to-create tables, in creation order. Each is named with its
  /// target name; `renames` maps back.
  pub tables:  Vec<NewTable>,
  pub dropped: Vec<DroppedForeignKey>,
}

/// Where a kept foreign key lives on a pending table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
  /// On the column at this index.
  Column(usize),
  /// In `NewTable::foreign_keys` at this index.
  Table(usize),
}

struct Pending {
  table: NewTable,
  /// Foreign keys that need another same-source table created first, with
  /// that table's original name.
  deps:  Vec<(Slot, String)>,
}

impl Pending {
  /// Remove the foreign key at `slot`, returning the columns it covered.
  /// Table-level slots are blanked rather than removed so later indices hold.
  fn unset(&mut self, slot: Slot) -> String {
    match slot {
      Slot::Column(i) => {
        self.table.columns[i].foreign_key = None;
        self.table.columns[i].name.clone()
      }
      Slot::Table(i) => std::mem::take(&mut self.table.foreign_keys[i].columns).join(", "),
    }
  }
}

/// Pass 1: a unique target name for every table of one source.
///
/// A candidate is free when `is_taken` says so and no earlier table of this
/// source was assigned it.
pub fn assign_names<'a>(
  originals: impl IntoIterator<Item = &'a str>,
  mut is_taken: impl FnMut(&str) -> bool,
) -> Result<BTreeMap<String, String>> {
  let mut assigned = BTreeSet::new();
  let mut renames = BTreeMap::new();
  for original in originals {
    let name = unique_name(original, |c| is_taken(c) || assigned.contains(c))?;
    assigned.insert(name.clone());
    renames.insert(original.to_owned(), name);
  }
  Ok(renames)
}

/// Pass 2: build every table of one source against the rename map.
///
/// `source_ids` maps the source container's ids to the target's.
pub fn plan_tables(
  tables: &BTreeMap<String, TableSchema>,
  source_ids: &BTreeMap<i64, i64>,
  is_taken: impl FnMut(&str) -> bool,
) -> Result<TablePlan> {
  let renames = assign_names(tables.keys().map(String::as_str), is_taken)?;
  let mut dropped = Vec::new();

  let mut arena = BTreeMap::new();
  for (original, schema) in tables {
    let pending = pending_table(original, schema, &renames, source_ids, &mut dropped)?;
    arena.insert(original.clone(), pending);
  }

  let tables = creation_order(arena, &mut dropped);
  Ok(TablePlan { renames, tables, dropped })
}

fn pending_table(
  original: &str,
  schema: &TableSchema,
  renames: &BTreeMap<String, String>,
  source_ids: &BTreeMap<i64, i64>,
  dropped: &mut Vec<DroppedForeignKey>,
) -> Result<Pending> {
  let source_id = *source_ids.get(&schema.metadata.source_id).ok_or_else(|| {
    Error::UnmappedSource {
      entity:    "table",
      name:      original.to_owned(),
      source_id: schema.metadata.source_id,
    }
  })?;

  let mut columns: Vec<ColumnSpec> = schema
    .columns
    .iter()
    .map(|c| ColumnSpec {
      name:                 c.name.clone(),
      sql_type:             c.sqlite_type.clone(),
      not_null:             c.not_null,
      primary_key:          c.primary_key,
      default_value:        c.default_value.clone(),
      description:          c.description.clone(),
      original_column_name: c.original_column_name.clone(),
      foreign_key:          None,
    })
    .collect();

  let mut constraints: BTreeMap<i64, Vec<&ForeignKeyInfo>> = BTreeMap::new();
  for fk in &schema.foreign_keys {
    constraints.entry(fk.id).or_default().push(fk);
  }

  let mut deps = Vec::new();
  let mut table_fks = Vec::new();
  for parts in constraints.values_mut() {
    parts.sort_by_key(|fk| fk.seq);
    let fk = parts[0];
    let from = parts.iter().map(|p| p.from_column.as_str()).collect::<Vec<_>>().join(", ");
    let mut skip = |reason: &'static str| {
      warn!(table = original, column = %from, target = %fk.target_table, reason, "dropping foreign key");
      dropped.push(DroppedForeignKey {
        table: original.to_owned(),
        column: from.clone(),
        target: fk.target_table.clone(),
        reason,
      });
    };

    let Some(target) = renames.get(&fk.target_table) else {
      skip("target table belongs to another source");
      continue;
    };
    let Some(indices) = parts
      .iter()
      .map(|p| columns.iter().position(|c| c.name == p.from_column))
      .collect::<Option<Vec<usize>>>()
    else {
      skip("column not found");
      continue;
    };

    let slot = if let &[index] = indices.as_slice() {
      if columns[index].foreign_key.is_some() {
        skip("column already carries a foreign key");
        continue;
      }
      columns[index].foreign_key = Some(ForeignKeySpec {
        table:     target.clone(),
        column:    fk.target_column.clone(),
        on_update: Some(fk.on_update),
        on_delete: Some(fk.on_delete),
      });
      Slot::Column(index)
    } else {
      table_fks.push(TableForeignKey {
        columns:        parts.iter().map(|p| p.from_column.clone()).collect(),
        table:          target.clone(),
        target_columns: parts.iter().map(|p| p.target_column.clone()).collect(),
        on_update:      Some(fk.on_update),
        on_delete:      Some(fk.on_delete),
      });
      Slot::Table(table_fks.len() - 1)
    };
    if fk.target_table != original {
      deps.push((slot, fk.target_table.clone()));
    }
  }

  let name = renames
    .get(original)
    .cloned()
    .unwrap_or_else(|| original.to_owned());
  let table = NewTable {
    name,
    columns,
    foreign_keys: table_fks,
    source_id,
    description: schema.metadata.description.clone(),
    original_identifier: schema.metadata.original_identifier.clone(),
    on_collision: CollisionPolicy::Fail,
  };
  Ok(Pending { table, deps })
}

/// Dependencies first, ties by original name. When only cycles remain, the
/// alphabetically first table loses its unmet foreign keys.
fn creation_order(
  mut arena: BTreeMap<String, Pending>,
  dropped: &mut Vec<DroppedForeignKey>,
) -> Vec<NewTable> {
  let mut created = BTreeSet::new();
  let mut order = Vec::with_capacity(arena.len());

  while !arena.is_empty() {
    let ready = arena
      .iter()
      .find(|(_, p)| p.deps.iter().all(|(_, d)| created.contains(d)))
      .map(|(k, _)| k.clone());

    let key = match ready {
      Some(key) => key,
      None => {
        let Some((key, pending)) = arena.iter_mut().next() else { break };
        let unmet: Vec<(Slot, String)> = pending
          .deps
          .iter()
          .filter(|(_, d)| !created.contains(d))
          .cloned()
          .collect();
        for (slot, target) in unmet {
          let column = pending.unset(slot);
          warn!(table = %key, %column, %target, "dropping foreign key that closes a cycle");
          dropped.push(DroppedForeignKey {
            table: key.clone(),
            column,
            target,
            reason: "foreign key closes a cycle",
          });
          pending.deps.retain(|(s, _)| *s != slot);
        }
        pending.table.foreign_keys.retain(|fk| !fk.columns.is_empty());
        key.clone()
      }
    };

    if let Some(pending) = arena.remove(&key) {
      order.push(pending.table);
    }
    created.insert(key);
  }
  order
}

#[cfg(test)]
mod tests {
  use sdif_core::{
    schema::{ColumnInfo, TableMetadata},
    table::ReferentialAction,
  };

  use super::*;

  fn column(name: &str, pk: Option<u32>) -> ColumnInfo {
    ColumnInfo {
      name:                 name.into(),
      sqlite_type:          "INTEGER".into(),
      not_null:             false,
      default_value:        None,
      primary_key:          pk,
      description:          None,
      original_column_name: None,
    }
  }

  fn fk(id: i64, from: &str, target: &str) -> ForeignKeyInfo {
    ForeignKeyInfo {
      id,
      seq: 0,
      from_column: from.into(),
      target_table: target.into(),
      target_column: "id".into(),
      on_update: ReferentialAction::NoAction,
      on_delete: ReferentialAction::Cascade,
      match_clause: "NONE".into(),
    }
  }

  fn table(name: &str, refs: &[(&str, &str)]) -> (String, TableSchema) {
    let mut columns = vec![column("id", Some(1))];
    let mut foreign_keys = Vec::new();
    for (i, (col, target)) in refs.iter().enumerate() {
      columns.push(column(col, None));
      foreign_keys.push(fk(i as i64, col, target));
    }
    let metadata = TableMetadata {
      table_name:          name.into(),
      source_id:           1,
      description:         None,
      original_identifier: None,
      row_count:           0,
    };
    (name.into(), TableSchema { metadata, columns, foreign_keys })
  }

  fn ids() -> BTreeMap<i64, i64> { [(1, 7)].into() }

  fn names(plan: &TablePlan) -> Vec<&str> { plan.tables.iter().map(|t| t.name.as_str()).collect() }

  #[test]
  fn names_avoid_target_and_each_other() {
    let taken: BTreeSet<&str> = ["orders"].into();
    let renames = assign_names(["orders", "orders_1"], |n| taken.contains(n)).unwrap();
    // `orders` takes `orders_1`, so the source's own `orders_1` moves on.
    assert_eq!(renames["orders"], "orders_1");
    assert_eq!(renames["orders_1"], "orders_1_1");
  }

  #[test]
  fn foreign_keys_follow_renames_and_order() {
    let tables: BTreeMap<_, _> = [
      table("orders", &[("customer_id", "customers")]),
      table("customers", &[]),
    ]
    .into();
    let plan = plan_tables(&tables, &ids(), |n| n == "customers").unwrap();

    assert_eq!(names(&plan), ["customers_1", "orders"]);
    let orders = &plan.tables[1];
    assert_eq!(orders.source_id, 7);
    let fk = orders.columns[1].foreign_key.as_ref().unwrap();
    assert_eq!(fk.table, "customers_1");
    assert_eq!(fk.on_delete, Some(ReferentialAction::Cascade));
    assert!(plan.dropped.is_empty());
  }

  #[test]
  fn self_reference_is_kept_without_ordering_constraint() {
    let tables: BTreeMap<_, _> = [table("nodes", &[("parent", "nodes")])].into();
    let plan = plan_tables(&tables, &ids(), |n| n == "nodes").unwrap();
    let fk = plan.tables[0].columns[1].foreign_key.as_ref().unwrap();
    assert_eq!(fk.table, "nodes_1");
  }

  #[test]
  fn foreign_keys_outside_the_source_are_dropped() {
    let tables: BTreeMap<_, _> = [table("orders", &[("customer_id", "elsewhere")])].into();
    let plan = plan_tables(&tables, &ids(), |_| false).unwrap();
    assert!(plan.tables[0].columns[1].foreign_key.is_none());
    assert_eq!(plan.dropped.len(), 1);
    assert_eq!(plan.dropped[0].target, "elsewhere");
  }

  #[test]
  fn cycles_are_broken_at_the_first_name() {
    let tables: BTreeMap<_, _> =
      [table("a", &[("b_id", "b")]), table("b", &[("a_id", "a")])].into();
    let plan = plan_tables(&tables, &ids(), |_| false).unwrap();

    assert_eq!(names(&plan), ["a", "b"]);
    assert!(plan.tables[0].columns[1].foreign_key.is_none());
    assert!(plan.tables[1].columns[1].foreign_key.is_some());
    assert_eq!(plan.dropped[0].reason, "foreign key closes a cycle");
  }

  /// `name` with columns `a` and `b` referencing `target(x, y)` as one
  /// constraint, parts listed out of sequence.
  fn composite(name: &str, target: &str) -> (String, TableSchema) {
    let (name, mut schema) = table(name, &[]);
    schema.columns.push(column("a", None));
    schema.columns.push(column("b", None));
    let part = |seq, from: &str, to: &str| ForeignKeyInfo {
      seq,
      target_column: to.into(),
      ..fk(0, from, target)
    };
    schema.foreign_keys = vec![part(1, "b", "y"), part(0, "a", "x")];
    (name, schema)
  }

  #[test]
  fn composite_foreign_keys_are_carried_as_one_constraint() {
    let tables: BTreeMap<_, _> = [composite("lines", "slots"), table("slots", &[])].into();
    let plan = plan_tables(&tables, &ids(), |n| n == "slots").unwrap();

    assert_eq!(names(&plan), ["slots_1", "lines"]);
    let lines = &plan.tables[1];
    assert!(lines.columns.iter().all(|c| c.foreign_key.is_none()));
    assert_eq!(lines.foreign_keys.len(), 1);
    let fk = &lines.foreign_keys[0];
    assert_eq!(fk.columns, ["a", "b"]);
    assert_eq!(fk.table, "slots_1");
    assert_eq!(fk.target_columns, ["x", "y"]);
    assert_eq!(fk.on_delete, Some(ReferentialAction::Cascade));
    assert!(plan.dropped.is_empty());
  }

  #[test]
  fn composite_foreign_keys_break_cycles_too() {
    let tables: BTreeMap<_, _> = [composite("a", "b"), table("b", &[("a_id", "a")])].into();
    let plan = plan_tables(&tables, &ids(), |_| false).unwrap();

    assert_eq!(names(&plan), ["a", "b"]);
    assert!(plan.tables[0].foreign_keys.is_empty());
    assert_eq!(plan.dropped.len(), 1);
    assert_eq!(plan.dropped[0].column, "a, b");
    assert!(plan.tables[1].columns[1].foreign_key.is_some());
  }

  #[test]
  fn unknown_owner_is_an_error() {
    let tables: BTreeMap<_, _> = [table("t", &[])].into();
    let err = plan_tables(&tables, &BTreeMap::new(), |_| false).unwrap_err();
    assert!(matches!(err, Error::UnmappedSource { source_id: 1, .. }));
  }
}
