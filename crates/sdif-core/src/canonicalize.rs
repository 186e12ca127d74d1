//! Reduce an introspected [`ContainerSchema`] to its comparison-ready form.
//!
//! The output keeps only the facets a [`SchemaConfig`] enforces. Facets that
//! are order-insensitive under the config become sorted sequences or sets so
//! two containers that differ only in layout canonicalize identically.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use serde_json::Value;

use crate::{
  canonical::{Canonical, canonicalize_value},
  config::{LinksMode, MediaMode, ObjectsMode, SchemaConfig, TechnicalMetadataMode},
  schema::{ContainerSchema, ForeignKeyInfo, JsonPayload, TableSchema},
};

// ─── CanonicalSchema ─────────────────────────────────────────────────────────

/// A canonical schema: a key-sorted map of enforced facets.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct CanonicalSchema(BTreeMap<String, Canonical>);

impl CanonicalSchema {
  pub fn from_map(map: BTreeMap<String, Canonical>) -> Self { Self(map) }

  pub fn get(&self, key: &str) -> Option<&Canonical> { self.0.get(key) }

  pub fn as_map(&self) -> &BTreeMap<String, Canonical> { &self.0 }

  pub fn into_canonical(self) -> Canonical { Canonical::Map(self.0) }
}

// ─── Canonicalization ────────────────────────────────────────────────────────

/// Apply `config` to `schema`.
pub fn canonicalize(schema: &ContainerSchema, config: &SchemaConfig) -> CanonicalSchema {
  let mut out = BTreeMap::new();

  if config.enforce_sdif_version {
    let version = schema.properties.as_ref().map(|p| p.sdif_version.as_str());
    out.insert("sdif_version".to_owned(), Canonical::opt_text(version));
  }

  let key_rules = config.enforce_primary_keys || config.enforce_foreign_keys;
  if config.enforce_table_names {
    let tables = schema
      .tables
      .iter()
      .map(|(name, t)| (name.clone(), canonical_table(t, config)))
      .collect();
    out.insert("tables".to_owned(), Canonical::Map(tables));
  } else if !schema.tables.is_empty() || key_rules {
    let tables: BTreeSet<Canonical> = schema
      .tables
      .values()
      .map(|t| canonical_table(t, config))
      .collect();
    out.insert("tables_set".to_owned(), Canonical::Set(tables));
  }

  if config.objects_mode != ObjectsMode::Ignore {
    out.insert("objects".to_owned(), canonical_objects(schema, config));
  }

  if config.media_mode != MediaMode::Ignore {
    out.insert("media".to_owned(), canonical_media(schema, config));
  }

  match config.semantic_links_mode {
    LinksMode::Ignore => {}
    LinksMode::LinkTypesOnly => {
      let types = schema
        .semantic_links
        .iter()
        .filter(|l| !l.link_type.is_empty())
        .map(|l| Canonical::text(&l.link_type))
        .collect();
      out.insert("semantic_link_types_present".to_owned(), Canonical::Set(types));
    }
    LinksMode::FullStructure => {
      // Link ids and descriptions carry no structure.
      let mut links: Vec<Canonical> = schema
        .semantic_links
        .iter()
        .map(|l| {
          Canonical::map([
            ("link_type", Canonical::text(&l.link_type)),
            ("from_element_type", Canonical::text(l.from_element_type.as_str())),
            ("from_element_spec", canonicalize_value(&l.from_element_spec)),
            ("to_element_type", Canonical::text(l.to_element_type.as_str())),
            ("to_element_spec", canonicalize_value(&l.to_element_spec)),
          ])
        })
        .collect();
      links.sort();
      out.insert("semantic_links".to_owned(), Canonical::Seq(links));
    }
  }

  CanonicalSchema(out)
}

fn canonical_table(table: &TableSchema, config: &SchemaConfig) -> Canonical {
  let mut out = BTreeMap::new();

  let mut columns = Vec::with_capacity(table.columns.len());
  for col in &table.columns {
    let mut def = BTreeMap::new();
    if config.enforce_column_names {
      def.insert("name".to_owned(), Canonical::text(&col.name));
    }
    if config.enforce_column_types {
      def.insert("sqlite_type".to_owned(), Canonical::text(&col.sqlite_type));
    }
    if config.enforce_column_not_null_constraints {
      def.insert("not_null".to_owned(), Canonical::Bool(col.not_null));
    }
    if config.enforce_column_default_values {
      def.insert("default_value".to_owned(), Canonical::opt_text(col.default_value.as_deref()));
    }
    // An empty definition still marks a position when names are ignored.
    if !def.is_empty() || !config.enforce_column_names {
      columns.push(Canonical::Map(def));
    }
  }
  if !config.enforce_column_order {
    columns.sort();
  }
  out.insert("columns".to_owned(), Canonical::Seq(columns));

  if config.enforce_primary_keys {
    let pk = table
      .primary_key_columns()
      .into_iter()
      .map(Canonical::from)
      .collect();
    out.insert("primary_key_columns".to_owned(), pk);
  }

  if config.enforce_foreign_keys {
    let mut groups: BTreeMap<i64, Vec<&ForeignKeyInfo>> = BTreeMap::new();
    for fk in &table.foreign_keys {
      groups.entry(fk.id).or_default().push(fk);
    }
    let mut fks: Vec<Canonical> = groups
      .into_values()
      .filter_map(|mut group| {
        group.sort_by_key(|fk| fk.seq);
        let first = *group.first()?;
        let mut def = BTreeMap::new();
        def.insert(
          "from_columns".to_owned(),
          group.iter().map(|fk| Canonical::text(&fk.from_column)).collect(),
        );
        def.insert("target_table".to_owned(), Canonical::text(&first.target_table));
        def.insert(
          "target_columns".to_owned(),
          group.iter().map(|fk| Canonical::text(&fk.target_column)).collect(),
        );
        if config.enforce_foreign_key_referential_actions {
          def.insert("on_update".to_owned(), Canonical::text(first.on_update.to_string()));
          def.insert("on_delete".to_owned(), Canonical::text(first.on_delete.to_string()));
        }
        Some(Canonical::Map(def))
      })
      .collect();
    fks.sort();
    out.insert("foreign_keys".to_owned(), Canonical::Seq(fks));
  }

  Canonical::Map(out)
}

/// A payload that parsed and is not an `{ "error": … }` marker.
fn usable_payload(payload: Option<&JsonPayload>) -> Option<&Value> {
  payload
    .and_then(JsonPayload::valid)
    .filter(|v| !v.as_object().is_some_and(|o| o.contains_key("error")))
}

fn canonical_objects(schema: &ContainerSchema, config: &SchemaConfig) -> Canonical {
  let entries = schema.objects.iter().map(|(name, info)| {
    let mut entry = BTreeMap::new();
    if config.objects_mode == ObjectsMode::NamesAndSchemaHint {
      let hint = usable_payload(info.schema_hint.as_ref());
      entry.insert("schema_hint_exists_and_valid".to_owned(), Canonical::Bool(hint.is_some()));
      if let Some(hint) = hint {
        entry.insert("schema_hint".to_owned(), canonicalize_value(hint));
      }
    }
    (name.clone(), Canonical::Map(entry))
  });
  Canonical::Map(entries.collect())
}

fn canonical_media(schema: &ContainerSchema, config: &SchemaConfig) -> Canonical {
  let entries = schema.media.iter().map(|(name, info)| {
    let mut entry = BTreeMap::new();
    match config.media_mode {
      MediaMode::Ignore | MediaMode::NamesOnly => {}
      MediaMode::NamesAndType => {
        entry.insert("media_type".to_owned(), Canonical::text(&info.media_type));
      }
      MediaMode::NamesTypeAndOriginalFormat => {
        entry.insert("media_type".to_owned(), Canonical::text(&info.media_type));
        entry.insert(
          "original_format".to_owned(),
          Canonical::opt_text(info.original_format.as_deref()),
        );
      }
    }
    if config.media_technical_metadata_mode == TechnicalMetadataMode::ContentComparison {
      let meta = usable_payload(info.technical_metadata.as_ref());
      entry.insert(
        "technical_metadata_exists_and_valid".to_owned(),
        Canonical::Bool(meta.is_some()),
      );
      if let Some(meta) = meta {
        entry.insert("technical_metadata".to_owned(), canonicalize_value(meta));
      }
    }
    (name.clone(), Canonical::Map(entry))
  });
  Canonical::Map(entries.collect())
}
