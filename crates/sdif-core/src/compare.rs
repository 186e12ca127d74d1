//! Equivalence and compatibility over canonical schemas.
//!
//! Neither check fails on structurally different inputs; a difference is a
//! return value. Both functions are pure and safe to call from any thread.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use tracing::debug;

use crate::{
  canonical::Canonical,
  canonicalize::{CanonicalSchema, canonicalize},
  config::SchemaConfig,
  schema::ContainerSchema,
};

const DIFF_HEADER: &str = "Schema differences found based on configuration:";
const EQUIVALENT_LINE: &str = "Schemas are equivalent based on the current configuration.";

// ─── Report types ────────────────────────────────────────────────────────────

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DiffVerbosity {
  /// Human-readable lines.
  #[default]
  Summary,
  /// Structured list of every change.
  Delta,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
  /// A map key present only on the right.
  Added,
  /// A map key present only on the left.
  Removed,
  /// Same kind of value, different content.
  Changed,
  /// Different kind of value at the same path.
  TypeChanged,
  /// A sequence or set element present only on the right.
  ItemAdded,
  /// A sequence or set element present only on the left.
  ItemRemoved,
}

/// One difference between two canonical schemas.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchemaChange {
  pub kind: ChangeKind,
  /// Location rendered as `root['tables']['t']['columns'][0]`.
  pub path: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub old:  Option<Canonical>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub new:  Option<Canonical>,
}

impl SchemaChange {
  fn summary_line(&self) -> String {
    let show = |v: &Option<Canonical>| v.as_ref().map(ToString::to_string).unwrap_or_default();
    let type_of = |v: &Option<Canonical>| v.as_ref().map_or("none", Canonical::type_name);
    match self.kind {
      ChangeKind::Added => format!("  + Added at '{}': {}", self.path, show(&self.new)),
      ChangeKind::Removed => format!("  - Removed at '{}': {}", self.path, show(&self.old)),
      ChangeKind::Changed => format!(
        "  ~ Changed at '{}': from '{}' to '{}'",
        self.path,
        show(&self.old),
        show(&self.new)
      ),
      ChangeKind::TypeChanged => format!(
        "  ! Type changed at '{}': from {} to {}",
        self.path,
        type_of(&self.old),
        type_of(&self.new)
      ),
      ChangeKind::ItemAdded => {
        format!("  + Item added to iterable at '{}': {}", self.path, show(&self.new))
      }
      ChangeKind::ItemRemoved => {
        format!("  - Item removed from iterable at '{}': {}", self.path, show(&self.old))
      }
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiffReport {
  Summary(Vec<String>),
  Delta(Vec<SchemaChange>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Comparison {
  pub are_equivalent: bool,
  pub diff:           DiffReport,
}

// ─── Equivalence ─────────────────────────────────────────────────────────────

/// Strict structural equality of two canonical schemas.
pub fn compare(a: &CanonicalSchema, b: &CanonicalSchema, verbosity: DiffVerbosity) -> Comparison {
  let changes = delta(a, b);
  let are_equivalent = changes.is_empty();
  debug!(are_equivalent, changes = changes.len(), "compared canonical schemas");

  let diff = match verbosity {
    DiffVerbosity::Delta => DiffReport::Delta(changes),
    DiffVerbosity::Summary if are_equivalent => DiffReport::Summary(vec![EQUIVALENT_LINE.to_owned()]),
    DiffVerbosity::Summary => {
      let mut lines = Vec::with_capacity(changes.len() + 1);
      lines.push(DIFF_HEADER.to_owned());
      lines.extend(changes.iter().map(SchemaChange::summary_line));
      DiffReport::Summary(lines)
    }
  };
  Comparison { are_equivalent, diff }
}

/// Every change needed to turn `a` into `b`, in path order.
pub fn delta(a: &CanonicalSchema, b: &CanonicalSchema) -> Vec<SchemaChange> {
  let mut out = Vec::new();
  diff_maps("root", a.as_map(), b.as_map(), &mut out);
  out
}

fn diff_maps(
  path: &str,
  a: &BTreeMap<String, Canonical>,
  b: &BTreeMap<String, Canonical>,
  out: &mut Vec<SchemaChange>,
) {
  for (key, left) in a {
    let child = format!("{path}['{key}']");
    match b.get(key) {
      Some(right) => diff_values(&child, left, right, out),
      None => out.push(SchemaChange {
        kind: ChangeKind::Removed,
        path: child,
        old:  Some(left.clone()),
        new:  None,
      }),
    }
  }
  for (key, right) in b {
    if !a.contains_key(key) {
      out.push(SchemaChange {
        kind: ChangeKind::Added,
        path: format!("{path}['{key}']"),
        old:  None,
        new:  Some(right.clone()),
      });
    }
  }
}

fn diff_values(path: &str, a: &Canonical, b: &Canonical, out: &mut Vec<SchemaChange>) {
  if a == b {
    return;
  }
  match (a, b) {
    (Canonical::Map(x), Canonical::Map(y)) => diff_maps(path, x, y, out),
    (Canonical::Seq(x), Canonical::Seq(y)) => {
      for i in 0..x.len().max(y.len()) {
        let child = format!("{path}[{i}]");
        match (x.get(i), y.get(i)) {
          (Some(l), Some(r)) => diff_values(&child, l, r, out),
          (Some(l), None) => out.push(SchemaChange {
            kind: ChangeKind::ItemRemoved,
            path: child,
            old:  Some(l.clone()),
            new:  None,
          }),
          (None, Some(r)) => out.push(SchemaChange {
            kind: ChangeKind::ItemAdded,
            path: child,
            old:  None,
            new:  Some(r.clone()),
          }),
          (None, None) => {}
        }
      }
    }
    (Canonical::Set(x), Canonical::Set(y)) => {
      out.extend(x.difference(y).map(|l| SchemaChange {
        kind: ChangeKind::ItemRemoved,
        path: path.to_owned(),
        old:  Some(l.clone()),
        new:  None,
      }));
      out.extend(y.difference(x).map(|r| SchemaChange {
        kind: ChangeKind::ItemAdded,
        path: path.to_owned(),
        old:  None,
        new:  Some(r.clone()),
      }));
    }
    _ => {
      let kind = if std::mem::discriminant(a) == std::mem::discriminant(b) {
        ChangeKind::Changed
      } else {
        ChangeKind::TypeChanged
      };
      out.push(SchemaChange {
        kind,
        path: path.to_owned(),
        old: Some(a.clone()),
        new: Some(b.clone()),
      });
    }
  }
}

// ─── Compatibility ───────────────────────────────────────────────────────────

/// Does `producer` provide everything `consumer` requires?
///
/// Maps need every consumer key, recursively compatible. Sequences and sets
/// need every consumer element somewhere in the producer's collection. The
/// producer may carry anything extra.
pub fn is_compatible_with(consumer: &CanonicalSchema, producer: &CanonicalSchema) -> bool {
  map_compatible(consumer.as_map(), producer.as_map())
}

fn map_compatible(
  consumer: &BTreeMap<String, Canonical>,
  producer: &BTreeMap<String, Canonical>,
) -> bool {
  consumer.iter().all(|(key, required)| match producer.get(key) {
    Some(provided) => value_compatible(required, provided),
    None => {
      debug!(key, "producer is missing a required key");
      false
    }
  })
}

fn value_compatible(consumer: &Canonical, producer: &Canonical) -> bool {
  match (consumer, producer) {
    (Canonical::Null, _) => true,
    (_, Canonical::Null) => false,
    (Canonical::Map(c), Canonical::Map(p)) => map_compatible(c, p),
    (Canonical::Seq(c), Canonical::Seq(p)) => c.iter().all(|item| p.contains(item)),
    (Canonical::Set(c), Canonical::Set(p)) => c.is_subset(p),
    (c, p) if std::mem::discriminant(c) != std::mem::discriminant(p) => {
      debug!(expected = c.type_name(), found = p.type_name(), "type mismatch");
      false
    }
    (c, p) => c == p,
  }
}

// ─── Comparator ──────────────────────────────────────────────────────────────

/// Canonicalizes raw introspection output under one config, then compares.
#[derive(Debug, Clone, Default)]
pub struct SchemaComparator {
  pub config: SchemaConfig,
}

impl SchemaComparator {
  pub fn new(config: SchemaConfig) -> Self { Self { config } }

  pub fn canonicalize(&self, schema: &ContainerSchema) -> CanonicalSchema {
    canonicalize(schema, &self.config)
  }

  pub fn compare(
    &self,
    a: &ContainerSchema,
    b: &ContainerSchema,
    verbosity: DiffVerbosity,
  ) -> Comparison {
    compare(&self.canonicalize(a), &self.canonicalize(b), verbosity)
  }

  pub fn is_compatible_with(&self, consumer: &ContainerSchema, producer: &ContainerSchema) -> bool {
    is_compatible_with(&self.canonicalize(consumer), &self.canonicalize(producer))
  }
}
