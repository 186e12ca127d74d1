//! Metadata DDL for SDIF containers.
//!
//! Relation names are fixed for cross-tool compatibility. Executed on every
//! read-write open; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.

/// The metadata relations every container must carry.
pub const METADATA_TABLES: [&str; 7] = [
  "sdif_properties",
  "sdif_sources",
  "sdif_tables_metadata",
  "sdif_columns_metadata",
  "sdif_objects",
  "sdif_media",
  "sdif_semantic_links",
];

/// Full metadata DDL. No WAL: a container must stay a single file.
pub const SCHEMA: &str = "
PRAGMA foreign_keys = ON;

-- Singleton; version is fixed once written.
CREATE TABLE IF NOT EXISTS sdif_properties (
    sdif_version       TEXT NOT NULL,
    creation_timestamp TEXT
);

CREATE TABLE IF NOT EXISTS sdif_sources (
    source_id            INTEGER PRIMARY KEY AUTOINCREMENT,
    original_file_name   TEXT NOT NULL,
    original_file_type   TEXT NOT NULL,
    source_description   TEXT,
    processing_timestamp TEXT
);

CREATE TABLE IF NOT EXISTS sdif_tables_metadata (
    table_name          TEXT PRIMARY KEY,
    source_id           INTEGER NOT NULL,
    description         TEXT,
    original_identifier TEXT,
    row_count           INTEGER,
    FOREIGN KEY (source_id) REFERENCES sdif_sources(source_id) ON DELETE RESTRICT
);

CREATE TABLE IF NOT EXISTS sdif_columns_metadata (
    table_name           TEXT NOT NULL,
    column_name          TEXT NOT NULL,
    description          TEXT,
    original_column_name TEXT,
    PRIMARY KEY (table_name, column_name),
    FOREIGN KEY (table_name) REFERENCES sdif_tables_metadata(table_name) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS sdif_objects (
    object_name TEXT PRIMARY KEY,
    source_id   INTEGER NOT NULL,
    json_data   TEXT NOT NULL,   -- JSON
    description TEXT,
    schema_hint TEXT,            -- JSON or NULL
    FOREIGN KEY (source_id) REFERENCES sdif_sources(source_id) ON DELETE RESTRICT
);

CREATE TABLE IF NOT EXISTS sdif_media (
    media_name         TEXT PRIMARY KEY,
    source_id          INTEGER NOT NULL,
    media_type         TEXT NOT NULL,
    media_data         BLOB NOT NULL,
    description        TEXT,
    original_format    TEXT,
    technical_metadata TEXT,     -- JSON or NULL
    FOREIGN KEY (source_id) REFERENCES sdif_sources(source_id) ON DELETE RESTRICT
);

-- Soft links; specs are JSON objects and are not integrity-checked.
CREATE TABLE IF NOT EXISTS sdif_semantic_links (
    link_id           INTEGER PRIMARY KEY AUTOINCREMENT,
    link_type         TEXT NOT NULL,
    description       TEXT,
    from_element_type TEXT NOT NULL
        CHECK (from_element_type IN ('table', 'column', 'object', 'media', 'json_path', 'source')),
    from_element_spec TEXT NOT NULL,
    to_element_type   TEXT NOT NULL
        CHECK (to_element_type IN ('table', 'column', 'object', 'media', 'json_path', 'source')),
    to_element_spec   TEXT NOT NULL
);
";
