//! Rewriting semantic-link element specs through merge id maps.

use std::collections::BTreeMap;

use sdif_core::{schema::ElementKind, table::ElementRef};
use serde::Serialize;
use serde_json::Value;

use crate::{Error, Result};

/// Old → new identifiers for one source container.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IdMaps {
  pub sources: BTreeMap<i64, i64>,
  pub tables:  BTreeMap<String, String>,
  pub objects: BTreeMap<String, String>,
  pub media:   BTreeMap<String, String>,
}

impl IdMaps {
  /// The name map and spec key an element kind locates itself by.
  fn names_for(&self, kind: ElementKind) -> Option<(&'static str, &BTreeMap<String, String>)> {
    match kind {
      ElementKind::Table | ElementKind::Column => Some(("table_name", &self.tables)),
      ElementKind::Object | ElementKind::JsonPath => Some(("object_name", &self.objects)),
      ElementKind::Media => Some(("media_name", &self.media)),
      ElementKind::Source => None,
    }
  }

  /// Rewrite one endpoint. Identifiers missing from a map stay as they are.
  pub fn remap(&self, kind: ElementKind, spec: &Value) -> Result<ElementRef> {
    let Value::Object(fields) = spec else {
      return Err(Error::InvalidElementSpec(kind));
    };
    let mut fields = fields.clone();

    if let Some(id) = fields.get("source_id").and_then(Value::as_i64) {
      if let Some(new) = self.sources.get(&id) {
        fields.insert("source_id".into(), Value::from(*new));
      }
    }

    if let Some((key, names)) = self.names_for(kind) {
      let renamed = fields
        .get(key)
        .and_then(Value::as_str)
        .and_then(|old| names.get(old));
      if let Some(new) = renamed {
        fields.insert(key.into(), Value::from(new.as_str()));
      }
    }

    Ok(ElementRef::new(kind, Value::Object(fields)))
  }
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  fn maps() -> IdMaps {
    IdMaps {
      sources: [(1, 3)].into(),
      tables:  [("orders".to_owned(), "orders_1".to_owned())].into(),
      objects: [("cfg".to_owned(), "cfg_1".to_owned())].into(),
      media:   [("logo".to_owned(), "logo_2".to_owned())].into(),
    }
  }

  #[test]
  fn names_are_rewritten_per_kind() {
    let m = maps();
    let col = m
      .remap(ElementKind::Column, &json!({"table_name": "orders", "column_name": "id"}))
      .unwrap();
    assert_eq!(col.spec, json!({"table_name": "orders_1", "column_name": "id"}));

    let path = m
      .remap(ElementKind::JsonPath, &json!({"object_name": "cfg", "json_path": "$.a"}))
      .unwrap();
    assert_eq!(path.spec["object_name"], "cfg_1");

    let media = m.remap(ElementKind::Media, &json!({"media_name": "logo"})).unwrap();
    assert_eq!(media.spec["media_name"], "logo_2");
  }

  #[test]
  fn source_ids_are_rewritten_for_any_kind() {
    let m = maps();
    let src = m.remap(ElementKind::Source, &json!({"source_id": 1})).unwrap();
    assert_eq!(src.spec, json!({"source_id": 3}));
    let table = m
      .remap(ElementKind::Table, &json!({"table_name": "other", "source_id": 1}))
      .unwrap();
    assert_eq!(table.spec, json!({"table_name": "other", "source_id": 3}));
  }

  #[test]
  fn unknown_identifiers_are_left_alone() {
    let spec = json!({"table_name": "unrelated", "source_id": 99});
    let out = maps().remap(ElementKind::Table, &spec).unwrap();
    assert_eq!(out.spec, spec);
  }

  #[test]
  fn non_object_specs_are_rejected() {
    let err = maps().remap(ElementKind::Object, &json!("cfg")).unwrap_err();
    assert!(matches!(err, Error::InvalidElementSpec(ElementKind::Object)));
  }
}
