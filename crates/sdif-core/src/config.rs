//! Comparison strictness policy.
//!
//! A [`SchemaConfig`] decides which facets of a container's structure survive
//! canonicalization and therefore take part in equivalence and compatibility
//! checks. It deserializes from any `serde` source; missing fields fall back
//! to the strictest setting.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// How stored JSON objects are compared.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ObjectsMode {
  Ignore,
  NamesOnly,
  #[default]
  NamesAndSchemaHint,
}

/// How stored media items are compared.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum MediaMode {
  Ignore,
  NamesOnly,
  NamesAndType,
  #[default]
  #[serde(alias = "names_type_and_format")]
  #[strum(to_string = "names_type_and_original_format", serialize = "names_type_and_format")]
  NamesTypeAndOriginalFormat,
}

/// Whether media technical metadata takes part in comparison.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TechnicalMetadataMode {
  #[default]
  Ignore,
  ContentComparison,
}

/// How semantic links are compared.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum LinksMode {
  Ignore,
  /// Only the set of distinct link types.
  #[serde(alias = "types_only")]
  #[strum(to_string = "link_types_only", serialize = "types_only")]
  LinkTypesOnly,
  /// Every link minus its id and description.
  #[default]
  FullStructure,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchemaConfig {
  pub enforce_sdif_version:                    bool,
  /// When off, tables are compared as an unordered set of structures.
  pub enforce_table_names:                     bool,
  pub enforce_column_order:                    bool,
  /// When off, columns are matched by position only.
  pub enforce_column_names:                    bool,
  pub enforce_column_types:                    bool,
  pub enforce_column_not_null_constraints:     bool,
  pub enforce_column_default_values:           bool,
  pub enforce_primary_keys:                    bool,
  pub enforce_foreign_keys:                    bool,
  /// Only consulted when `enforce_foreign_keys` is on.
  pub enforce_foreign_key_referential_actions: bool,
  pub objects_mode:                            ObjectsMode,
  pub media_mode:                              MediaMode,
  pub media_technical_metadata_mode:           TechnicalMetadataMode,
  pub semantic_links_mode:                     LinksMode,
}

impl Default for SchemaConfig {
  fn default() -> Self {
    Self {
      enforce_sdif_version:                    true,
      enforce_table_names:                     true,
      enforce_column_order:                    true,
      enforce_column_names:                    true,
      enforce_column_types:                    true,
      enforce_column_not_null_constraints:     true,
      enforce_column_default_values:           true,
      enforce_primary_keys:                    true,
      enforce_foreign_keys:                    true,
      enforce_foreign_key_referential_actions: true,
      objects_mode:                            ObjectsMode::default(),
      media_mode:                              MediaMode::default(),
      media_technical_metadata_mode:           TechnicalMetadataMode::default(),
      semantic_links_mode:                     LinksMode::default(),
    }
  }
}

impl SchemaConfig {
  /// Compare tables only by structure: names and ordering of tables and
  /// columns are ignored, everything else is enforced.
  pub fn structure_only() -> Self {
    Self {
      enforce_table_names: false,
      enforce_column_order: false,
      ..Self::default()
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn missing_fields_take_strict_defaults() {
    let cfg: SchemaConfig =
      serde_json::from_str(r#"{"enforce_table_names": false, "media_mode": "names_only"}"#)
        .unwrap();
    assert!(!cfg.enforce_table_names);
    assert!(cfg.enforce_column_order);
    assert_eq!(cfg.media_mode, MediaMode::NamesOnly);
    assert_eq!(cfg.objects_mode, ObjectsMode::NamesAndSchemaHint);
    assert_eq!(cfg.semantic_links_mode, LinksMode::FullStructure);
  }

  #[test]
  fn modes_parse_from_strings() {
    assert_eq!("ignore".parse::<ObjectsMode>().unwrap(), ObjectsMode::Ignore);
    assert_eq!(
      "names_type_and_format".parse::<MediaMode>().unwrap(),
      MediaMode::NamesTypeAndOriginalFormat
    );
    assert_eq!("link_types_only".parse::<LinksMode>().unwrap(), LinksMode::LinkTypesOnly);
    assert!("everything".parse::<LinksMode>().is_err());
  }

  #[test]
  fn unknown_mode_is_rejected_on_deserialize() {
    let err = serde_json::from_str::<SchemaConfig>(r#"{"objects_mode": "bogus"}"#);
    assert!(err.is_err());
  }
}
