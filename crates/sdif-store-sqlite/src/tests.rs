//! Integration tests for `SqliteContainer` against in-memory and temporary
//! containers.

use sdif_core::{
  ErrorKind,
  analysis::{InferredType, SampleOptions, TableReport},
  schema::ElementKind,
  store::SdifStore,
  table::{
    CollisionPolicy, ColumnSpec, ElementRef, NewMedia, NewObject, NewSemanticLink, NewTable,
    ReferentialAction, TableForeignKey,
  },
  value::{CellValue, row},
};
use serde_json::json;

use crate::{Error, OpenMode, SqliteContainer};

fn store() -> SqliteContainer { SqliteContainer::open_in_memory().expect("in-memory container") }

fn with_source(s: &SqliteContainer) -> i64 {
  s.add_source("input.csv", "csv", Some("test input")).unwrap()
}

fn people(source_id: i64) -> NewTable {
  NewTable::new("people", source_id, vec![
    ColumnSpec::new("id", "INTEGER").primary_key(),
    ColumnSpec::new("name", "TEXT").not_null().description("display name"),
    ColumnSpec::new("age", "INTEGER"),
  ])
}

// ─── Lifecycle ───────────────────────────────────────────────────────────────

#[test]
fn new_container_has_version_and_timestamp() {
  let s = store();
  let props = s.properties().unwrap().unwrap();
  assert_eq!(props.sdif_version, "1.0");
  assert!(props.creation_timestamp.is_some());
  assert!(!s.is_read_only());
}

#[test]
fn missing_file_is_not_found_in_read_only_mode() {
  let dir = tempfile::tempdir().unwrap();
  let err = SqliteContainer::open(dir.path().join("nope.sdif"), OpenMode::ReadOnly)
    .err()
    .unwrap();
  assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn read_only_container_refuses_writes() {
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("c.sdif");
  {
    let mut s = SqliteContainer::open(&path, OpenMode::ReadWrite).unwrap();
    with_source(&s);
    s.close().unwrap();
  }

  let s = SqliteContainer::open(&path, OpenMode::ReadOnly).unwrap();
  assert!(s.is_read_only());
  assert_eq!(s.list_sources().unwrap().len(), 1);
  let err = s.add_source("x", "csv", None).unwrap_err();
  assert!(matches!(err, Error::ReadOnly));
  assert_eq!(err.kind(), ErrorKind::PermissionDenied);
  assert_eq!(s.create_table(&people(1)).unwrap_err().kind(), ErrorKind::PermissionDenied);
}

#[test]
fn read_only_open_rejects_plain_sqlite_files() {
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("plain.db");
  rusqlite::Connection::open(&path)
    .unwrap()
    .execute_batch("CREATE TABLE t (a INTEGER);")
    .unwrap();

  let err = SqliteContainer::open(&path, OpenMode::ReadOnly).err().unwrap();
  assert!(matches!(err, Error::NotAContainer("sdif_properties")));
  assert_eq!(err.kind(), ErrorKind::InvalidArgument);
}

#[test]
fn overwrite_discards_existing_content() {
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("nested").join("c.sdif");
  {
    let s = SqliteContainer::open(&path, OpenMode::ReadWrite).unwrap();
    let src = with_source(&s);
    s.create_table(&people(src)).unwrap();
  }
  {
    let s = SqliteContainer::open(&path, OpenMode::ReadWrite).unwrap();
    assert_eq!(s.list_tables().unwrap(), vec!["people"]);
  }
  let s = SqliteContainer::open(&path, OpenMode::Overwrite).unwrap();
  assert!(s.list_tables().unwrap().is_empty());
  assert!(s.list_sources().unwrap().is_empty());
}

#[test]
fn close_is_idempotent_and_later_calls_fail() {
  let mut s = store();
  s.close().unwrap();
  s.close().unwrap();
  let err = s.list_tables().unwrap_err();
  assert!(matches!(err, Error::Closed));
  assert_eq!(err.kind(), ErrorKind::OperationFailed);
}

#[test]
fn refresh_updates_timestamp_in_place() {
  let s = store();
  s.refresh_creation_timestamp().unwrap();
  let count: i64 = s
    .query("SELECT COUNT(*) AS n FROM sdif_properties")
    .map(|r| match r.rows[0][0] {
      CellValue::Integer(n) => n,
      _ => -1,
    })
    .unwrap();
  assert_eq!(count, 1);
}

// ─── Tables ──────────────────────────────────────────────────────────────────

#[test]
fn introspection_reports_declared_columns_in_order() {
  let s = store();
  let src = with_source(&s);
  let name = s
    .create_table(&NewTable::new("pairs", src, vec![
      ColumnSpec::new("left", "text").primary_key_at(2),
      ColumnSpec::new("right", "INTEGER").primary_key_at(1),
      ColumnSpec::new("note", "").default_value("'n/a'").original_name("Note"),
    ]))
    .unwrap();
  assert_eq!(name, "pairs");

  let schema = s.introspect_schema().unwrap();
  let table = &schema.tables["pairs"];
  let names: Vec<_> = table.columns.iter().map(|c| c.name.as_str()).collect();
  assert_eq!(names, ["left", "right", "note"]);

  let types: Vec<_> = table.columns.iter().map(|c| c.sqlite_type.as_str()).collect();
  assert_eq!(types, ["TEXT", "INTEGER", "TEXT"]);

  assert_eq!(table.columns[0].primary_key, Some(2));
  assert_eq!(table.columns[1].primary_key, Some(1));
  assert_eq!(table.columns[2].primary_key, None);
  assert_eq!(table.columns[2].default_value.as_deref(), Some("'n/a'"));
  assert_eq!(table.columns[2].original_column_name.as_deref(), Some("Note"));
  assert_eq!(table.primary_key_columns(), ["right", "left"]);
  assert_eq!(table.metadata.row_count, 0);
  assert_eq!(table.metadata.source_id, src);
}

#[test]
fn foreign_keys_are_introspected_with_actions() {
  let s = store();
  let src = with_source(&s);
  s.create_table(&people(src)).unwrap();
  s.create_table(&NewTable::new("pets", src, vec![
    ColumnSpec::new("id", "INTEGER").primary_key(),
    ColumnSpec::new("owner", "INTEGER")
      .references("people", "id")
      .on_delete(ReferentialAction::Cascade),
  ]))
  .unwrap();

  let schema = s.introspect_schema().unwrap();
  let fks = &schema.tables["pets"].foreign_keys;
  assert_eq!(fks.len(), 1);
  assert_eq!(fks[0].from_column, "owner");
  assert_eq!(fks[0].target_table, "people");
  assert_eq!(fks[0].target_column, "id");
  assert_eq!(fks[0].on_delete, ReferentialAction::Cascade);
  assert_eq!(fks[0].on_update, ReferentialAction::NoAction);
}

#[test]
fn composite_foreign_keys_are_introspected_in_column_order() {
  let s = store();
  let src = with_source(&s);
  s.create_table(&NewTable::new("slots", src, vec![
    ColumnSpec::new("day", "TEXT").primary_key_at(1),
    ColumnSpec::new("hour", "INTEGER").primary_key_at(2),
  ]))
  .unwrap();
  s.create_table(
    &NewTable::new("bookings", src, vec![
      ColumnSpec::new("id", "INTEGER").primary_key(),
      ColumnSpec::new("slot_day", "TEXT"),
      ColumnSpec::new("slot_hour", "INTEGER"),
    ])
    .foreign_key(TableForeignKey {
      on_delete: Some(ReferentialAction::Cascade),
      ..TableForeignKey::new(["slot_day", "slot_hour"], "slots", ["day", "hour"])
    }),
  )
  .unwrap();

  let schema = s.introspect_schema().unwrap();
  let fks = &schema.tables["bookings"].foreign_keys;
  assert_eq!(fks.len(), 2);
  assert_eq!(fks[0].id, fks[1].id);
  let pairs: Vec<_> =
    fks.iter().map(|fk| (fk.from_column.as_str(), fk.target_column.as_str())).collect();
  assert_eq!(pairs, [("slot_day", "day"), ("slot_hour", "hour")]);
  assert!(fks.iter().all(|fk| fk.on_delete == ReferentialAction::Cascade));

  let err = s
    .create_table(
      &NewTable::new("orphans", src, vec![ColumnSpec::new("a", "TEXT"), ColumnSpec::new("b", "TEXT")])
        .foreign_key(TableForeignKey::new(["a", "b"], "missing", ["x", "y"])),
    )
    .unwrap_err();
  assert!(matches!(err, Error::MissingForeignKeyTarget { ref column, .. } if column == "a, b"));
}

#[test]
fn create_table_validates_before_writing() {
  let s = store();
  let src = with_source(&s);

  let err = s
    .create_table(&NewTable::new("sdif_hidden", src, vec![ColumnSpec::new("a", "TEXT")]))
    .unwrap_err();
  assert_eq!(err.kind(), ErrorKind::InvalidArgument);

  let err = s.create_table(&NewTable::new("empty", src, vec![])).unwrap_err();
  assert!(matches!(err, Error::NoColumns(_)));

  let err = s.create_table(&people(src + 100)).unwrap_err();
  assert!(matches!(err, Error::UnknownSource(_)));

  let err = s
    .create_table(&NewTable::new("orphan", src, vec![
      ColumnSpec::new("x", "INTEGER").references("missing", "id"),
    ]))
    .unwrap_err();
  assert!(matches!(err, Error::MissingForeignKeyTarget { .. }));

  assert!(s.list_tables().unwrap().is_empty());
}

#[test]
fn collision_policies() {
  let s = store();
  let src = with_source(&s);
  s.create_table(&people(src)).unwrap();

  let err = s.create_table(&people(src)).unwrap_err();
  assert!(matches!(err, Error::TableExists(_)));

  let added = s.create_table(&people(src).on_collision(CollisionPolicy::Add)).unwrap();
  assert_eq!(added, "people_1");
  let added = s.create_table(&people(src).on_collision(CollisionPolicy::Add)).unwrap();
  assert_eq!(added, "people_2");

  s.insert_data("people", &[row([("id", CellValue::from(1)), ("name", "a".into()), (
    "age",
    CellValue::Null,
  )])])
  .unwrap();
  let replaced = s
    .create_table(
      &NewTable::new("people", src, vec![ColumnSpec::new("only", "TEXT")])
        .on_collision(CollisionPolicy::Replace),
    )
    .unwrap();
  assert_eq!(replaced, "people");

  let schema = s.introspect_schema().unwrap();
  let cols: Vec<_> = schema.tables["people"].columns.iter().map(|c| c.name.clone()).collect();
  assert_eq!(cols, ["only"]);
  assert_eq!(schema.tables["people"].metadata.row_count, 0);
  assert_eq!(s.list_tables().unwrap(), ["people", "people_1", "people_2"]);
}

#[test]
fn add_policy_skips_unregistered_relations() {
  let s = store();
  let src = with_source(&s);
  s.create_table(&people(src)).unwrap();
  s.conn().unwrap().execute_batch("CREATE VIEW people_1 AS SELECT 1").unwrap();

  let added = s.create_table(&people(src).on_collision(CollisionPolicy::Add)).unwrap();
  assert_eq!(added, "people_2");
}

#[test]
fn drop_then_recreate_with_fail_policy() {
  let s = store();
  let src = with_source(&s);
  s.create_table(&people(src)).unwrap();
  s.drop_table("people").unwrap();
  assert!(!s.introspect_schema().unwrap().tables.contains_key("people"));
  s.drop_table("people").unwrap();
  assert_eq!(s.create_table(&people(src)).unwrap(), "people");
}

// ─── Rows ────────────────────────────────────────────────────────────────────

#[test]
fn insert_keeps_row_count_in_sync() {
  let s = store();
  let src = with_source(&s);
  s.create_table(&people(src)).unwrap();

  let rows: Vec<_> = (1..=3)
    .map(|i| row([("id", CellValue::from(i)), ("name", format!("p{i}").into()), ("age", (20 + i).into())]))
    .collect();
  s.insert_data("people", &rows).unwrap();
  assert_eq!(s.table_metadata("people").unwrap().unwrap().row_count, 3);

  // Second row violates NOT NULL; the whole batch rolls back.
  let bad = vec![
    row([("id", CellValue::from(10)), ("name", "ok".into()), ("age", CellValue::Null)]),
    row([("id", CellValue::from(11)), ("name", CellValue::Null), ("age", CellValue::Null)]),
  ];
  let err = s.insert_data("people", &bad).unwrap_err();
  assert_eq!(err.kind(), ErrorKind::Engine);
  assert_eq!(s.table_metadata("people").unwrap().unwrap().row_count, 3);
  assert_eq!(s.read_table("people").unwrap().len(), 3);

  s.insert_data("people", &[]).unwrap();
}

#[test]
fn non_uniform_rows_are_rejected() {
  let s = store();
  let src = with_source(&s);
  s.create_table(&people(src)).unwrap();
  let err = s
    .insert_data("people", &[
      row([("id", CellValue::from(1)), ("name", "a".into())]),
      row([("id", CellValue::from(2)), ("age", 3.into())]),
    ])
    .unwrap_err();
  assert!(matches!(err, Error::NonUniformRows { index: 1, .. }));
  assert!(s.read_table("people").unwrap().is_empty());
}

#[test]
fn unknown_tables_are_not_found() {
  let s = store();
  let err = s.insert_data("ghost", &[row([("a", 1)])]).unwrap_err();
  assert_eq!(err.kind(), ErrorKind::NotFound);
  let err = s.insert_data("ghost", &[]).unwrap_err();
  assert!(matches!(err, Error::TableNotFound(_)));
  assert_eq!(s.read_table("ghost").unwrap_err().kind(), ErrorKind::NotFound);
}

#[test]
fn self_referencing_rows_may_arrive_in_any_order() {
  let s = store();
  let src = with_source(&s);
  s.create_table(&NewTable::new("nodes", src, vec![
    ColumnSpec::new("id", "INTEGER").primary_key(),
    ColumnSpec::new("parent", "INTEGER").references("nodes", "id"),
  ]))
  .unwrap();

  s.insert_data("nodes", &[
    row([("id", CellValue::from(2)), ("parent", 1.into())]),
    row([("id", CellValue::from(1)), ("parent", CellValue::Null)]),
  ])
  .unwrap();
  assert_eq!(s.table_metadata("nodes").unwrap().unwrap().row_count, 2);

  let err = s
    .insert_data("nodes", &[row([("id", CellValue::from(3)), ("parent", 99.into())])])
    .unwrap_err();
  assert_eq!(err.kind(), ErrorKind::Engine);
  assert_eq!(s.table_metadata("nodes").unwrap().unwrap().row_count, 2);
}

#[test]
fn blobs_and_reals_round_trip() {
  let s = store();
  let src = with_source(&s);
  s.create_table(&NewTable::new("mixed", src, vec![
    ColumnSpec::new("b", "BLOB"),
    ColumnSpec::new("r", "REAL"),
  ]))
  .unwrap();
  s.insert_data("mixed", &[row([("b", CellValue::Blob(vec![0, 1, 2])), ("r", 1.5.into())])])
    .unwrap();
  let rows = s.read_table("mixed").unwrap();
  assert_eq!(rows[0]["b"], CellValue::Blob(vec![0, 1, 2]));
  assert_eq!(rows[0]["r"], CellValue::Real(1.5));
}

// ─── Objects, media, links ───────────────────────────────────────────────────

#[test]
fn objects_are_unique_by_name() {
  let s = store();
  let src = with_source(&s);
  let object = NewObject {
    name:        "config".into(),
    source_id:   src,
    json_data:   json!({"debug": true}),
    description: None,
    schema_hint: Some(json!({"type": "object"})),
  };
  s.add_object(&object).unwrap();
  let err = s.add_object(&object).unwrap_err();
  assert_eq!(err.kind(), ErrorKind::AlreadyExists);

  let stored = s.get_object("config").unwrap().unwrap();
  assert_eq!(stored.json_data, json!({"debug": true}));
  assert_eq!(stored.schema_hint, Some(json!({"type": "object"})));
  assert!(s.get_object("other").unwrap().is_none());
  assert_eq!(s.list_objects().unwrap(), ["config"]);

  let err = s.add_object(&NewObject { name: "x".into(), source_id: 42, ..object }).unwrap_err();
  assert_eq!(err.kind(), ErrorKind::InvalidArgument);
}

#[test]
fn media_round_trips() {
  let s = store();
  let src = with_source(&s);
  let media = NewMedia {
    name:               "logo".into(),
    source_id:          src,
    media_data:         vec![0x89, b'P', b'N', b'G'],
    media_type:         "image".into(),
    description:        Some("company logo".into()),
    original_format:    Some("png".into()),
    technical_metadata: Some(json!({"width": 64})),
  };
  s.add_media(&media).unwrap();
  assert_eq!(s.add_media(&media).unwrap_err().kind(), ErrorKind::AlreadyExists);

  let stored = s.get_media("logo").unwrap().unwrap();
  assert_eq!(stored.media_data, media.media_data);
  assert_eq!(stored.original_format.as_deref(), Some("png"));

  let schema = s.introspect_schema().unwrap();
  assert_eq!(schema.media["logo"].media_type, "image");
}

#[test]
fn links_are_stored_with_their_specs() {
  let s = store();
  let src = with_source(&s);
  s.create_table(&people(src)).unwrap();
  let id = s
    .add_semantic_link(&NewSemanticLink {
      link_type:   "annotation".into(),
      description: None,
      from:        ElementRef::new(ElementKind::Source, json!({"source_id": src})),
      to:          ElementRef::new(ElementKind::Table, json!({"table_name": "people"})),
    })
    .unwrap();

  let links = s.list_semantic_links().unwrap();
  assert_eq!(links.len(), 1);
  assert_eq!(links[0].link_id, id);
  assert_eq!(links[0].to_element_type, ElementKind::Table);
  assert_eq!(links[0].to_element_spec, json!({"table_name": "people"}));

  let err = s
    .add_semantic_link(&NewSemanticLink {
      link_type:   "annotation".into(),
      description: None,
      from:        ElementRef::new(ElementKind::Table, json!("people")),
      to:          ElementRef::new(ElementKind::Table, json!({"table_name": "people"})),
    })
    .unwrap_err();
  assert!(matches!(err, Error::InvalidElementSpec(ElementKind::Table)));

  let err = ElementRef::parse("spreadsheet", json!({})).unwrap_err();
  assert_eq!(err.kind(), ErrorKind::InvalidArgument);
}

// ─── Query and sampling ──────────────────────────────────────────────────────

#[test]
fn query_returns_columns_and_rows() {
  let s = store();
  let src = with_source(&s);
  s.create_table(&people(src)).unwrap();
  s.insert_data("people", &[row([("id", CellValue::from(1)), ("name", "a".into()), ("age", 30.into())])])
    .unwrap();

  let result = s.query("SELECT name, age FROM people").unwrap();
  assert_eq!(result.columns, ["name", "age"]);
  assert_eq!(result.rows, vec![vec![CellValue::Text("a".into()), CellValue::Integer(30)]]);

  let err = s.query("DELETE FROM people").unwrap_err();
  assert_eq!(err.kind(), ErrorKind::PermissionDenied);
  assert_eq!(s.read_table("people").unwrap().len(), 1);
}

#[test]
fn sample_analysis_summarises_columns() {
  let s = store();
  let src = with_source(&s);
  s.create_table(&people(src)).unwrap();
  s.create_table(&NewTable::new("empty", src, vec![ColumnSpec::new("a", "TEXT")]))
    .unwrap();
  let rows = vec![
    row([("id", CellValue::from(1)), ("name", "a".into()), ("age", 10.into())]),
    row([("id", CellValue::from(2)), ("name", "b".into()), ("age", 20.into())]),
    row([("id", CellValue::from(3)), ("name", "b".into()), ("age", CellValue::Null)]),
    row([("id", CellValue::from(4)), ("name", "c".into()), ("age", 30.into())]),
  ];
  s.insert_data("people", &rows).unwrap();

  let options = SampleOptions { sample_rows: 2, top_n_values: 1, ..SampleOptions::default() };
  let report = s.sample_analysis(&options).unwrap();

  let TableReport::Analysed(people) = &report.tables["people"] else {
    panic!("people analysis failed");
  };
  assert_eq!(people.row_count, 4);
  assert_eq!(people.sample_rows.len(), 2);

  let name = &people.column_analysis["name"];
  assert_eq!(name.inferred_type, InferredType::String);
  assert_eq!(name.distinct_count, 3);
  assert_eq!(name.most_common_values, vec![(CellValue::Text("b".into()), 2)]);
  assert!(name.numeric_summary.is_none());

  let age = &people.column_analysis["age"];
  assert_eq!(age.inferred_type, InferredType::Integer);
  assert_eq!(age.null_percentage, 25.0);
  let summary = age.numeric_summary.unwrap();
  assert_eq!(summary.mean, 20.0);
  assert_eq!(summary.median, 20.0);

  let TableReport::Analysed(empty) = &report.tables["empty"] else {
    panic!("empty analysis failed");
  };
  assert!(empty.column_analysis.is_empty());
  assert!(report.objects.is_none());

  // Sampling leaves the cached count alone.
  assert_eq!(s.table_metadata("people").unwrap().unwrap().row_count, 4);
}
