//! Sampling and per-column statistics.
//!
//! The store gathers raw counts and values; the arithmetic lives here so it
//! can be tested without a database.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::value::{CellValue, Row};

// ─── Options ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SampleOptions {
  /// Random rows returned per table.
  pub sample_rows:     usize,
  /// Most frequent values reported per column.
  pub top_n_values:    usize,
  pub include_objects: bool,
  pub include_media:   bool,
}

impl Default for SampleOptions {
  fn default() -> Self {
    Self { sample_rows: 5, top_n_values: 10, include_objects: false, include_media: false }
  }
}

// ─── Report ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SampleReport {
  pub tables: BTreeMap<String, TableReport>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub objects: Option<ItemListing>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub media: Option<ItemListing>,
}

/// Per-table outcome; one failing table does not abort the report.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum TableReport {
  Analysed(TableSample),
  Failed { error: String },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TableSample {
  /// As recorded in the tables metadata relation.
  pub row_count:       i64,
  pub sample_rows:     Vec<Row>,
  pub column_analysis: BTreeMap<String, ColumnAnalysis>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnAnalysis {
  pub sqlite_type:        String,
  pub inferred_type:      InferredType,
  /// 0–100, rounded to two decimals.
  pub null_percentage:    f64,
  pub distinct_count:     u64,
  /// `(value, count)`, most frequent first.
  pub most_common_values: Vec<(CellValue, u64)>,
  pub is_numeric:         bool,
  pub is_datetime:        bool,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub numeric_summary:    Option<NumericSummary>,
}

/// Dominant storage class of a column's non-null values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum InferredType {
  Empty,
  Integer,
  Floating,
  MixedIntegerFloat,
  String,
  Bytes,
  Mixed,
}

impl InferredType {
  /// Infer from the `typeof()` names of a column's values. Nulls are skipped.
  pub fn from_storage_classes<'a>(classes: impl IntoIterator<Item = &'a str>) -> Self {
    let (mut int, mut real, mut text, mut blob) = (false, false, false, false);
    for class in classes {
      match class {
        "integer" => int = true,
        "real" => real = true,
        "text" => text = true,
        "blob" => blob = true,
        _ => {}
      }
    }
    match (int, real, text, blob) {
      (false, false, false, false) => InferredType::Empty,
      (true, false, false, false) => InferredType::Integer,
      (false, true, false, false) => InferredType::Floating,
      (true, true, false, false) => InferredType::MixedIntegerFloat,
      (false, false, true, false) => InferredType::String,
      (false, false, false, true) => InferredType::Bytes,
      _ => InferredType::Mixed,
    }
  }

  pub fn is_numeric(self) -> bool {
    matches!(
      self,
      InferredType::Integer | InferredType::Floating | InferredType::MixedIntegerFloat
    )
  }
}

/// Whether a declared engine type names a date or time.
pub fn is_datetime_type(sql_type: &str) -> bool {
  let upper = sql_type.to_ascii_uppercase();
  ["DATE", "DATETIME", "TIMESTAMP"]
    .iter()
    .any(|t| upper.contains(t))
}

pub fn null_percentage(nulls: u64, total: u64) -> f64 {
  if total == 0 {
    return 0.0;
  }
  (nulls as f64 / total as f64 * 10_000.0).round() / 100.0
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct NumericSummary {
  pub min:     f64,
  pub max:     f64,
  pub mean:    f64,
  pub median:  f64,
  /// Sample standard deviation; absent for a single value.
  pub std_dev: Option<f64>,
  pub q25:     f64,
  pub q75:     f64,
}

impl NumericSummary {
  /// `None` when there are no values.
  pub fn compute(values: &[f64]) -> Option<Self> {
    if values.is_empty() {
      return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let n = sorted.len() as f64;
    let mean = sorted.iter().sum::<f64>() / n;
    let std_dev = (sorted.len() > 1).then(|| {
      let ss: f64 = sorted.iter().map(|v| (v - mean).powi(2)).sum();
      (ss / (n - 1.0)).sqrt()
    });

    Some(Self {
      min: sorted[0],
      max: sorted[sorted.len() - 1],
      mean,
      median: quantile(&sorted, 0.5),
      std_dev,
      q25: quantile(&sorted, 0.25),
      q75: quantile(&sorted, 0.75),
    })
  }
}

/// Linear-interpolation quantile of an ascending, non-empty slice.
fn quantile(sorted: &[f64], q: f64) -> f64 {
  let pos = q * (sorted.len() - 1) as f64;
  let lo = pos.floor() as usize;
  let hi = pos.ceil() as usize;
  sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}

// ─── Object / media listings ─────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ItemListing {
  pub count: usize,
  pub items: Vec<ItemSummary>,
}

impl FromIterator<ItemSummary> for ItemListing {
  fn from_iter<I: IntoIterator<Item = ItemSummary>>(iter: I) -> Self {
    let items: Vec<_> = iter.into_iter().collect();
    Self { count: items.len(), items }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemSummary {
  pub name:        String,
  pub description: Option<String>,
  pub source_id:   i64,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub media_type:  Option<String>,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn inferred_type_from_classes() {
    assert_eq!(InferredType::from_storage_classes([]), InferredType::Empty);
    assert_eq!(InferredType::from_storage_classes(["null", "integer"]), InferredType::Integer);
    assert_eq!(
      InferredType::from_storage_classes(["integer", "real"]),
      InferredType::MixedIntegerFloat
    );
    assert_eq!(InferredType::from_storage_classes(["text", "integer"]), InferredType::Mixed);
    assert!(!InferredType::String.is_numeric());
  }

  #[test]
  fn summary_matches_linear_interpolation() {
    let s = NumericSummary::compute(&[4.0, 1.0, 3.0, 2.0]).unwrap();
    assert_eq!(s.min, 1.0);
    assert_eq!(s.max, 4.0);
    assert_eq!(s.mean, 2.5);
    assert_eq!(s.median, 2.5);
    assert_eq!(s.q25, 1.75);
    assert_eq!(s.q75, 3.25);
    let std = s.std_dev.unwrap();
    assert!((std - 1.290_994_448_735_805_6).abs() < 1e-12);
  }

  #[test]
  fn single_value_has_no_std_dev() {
    let s = NumericSummary::compute(&[7.0]).unwrap();
    assert_eq!(s.median, 7.0);
    assert_eq!(s.std_dev, None);
    assert!(NumericSummary::compute(&[]).is_none());
  }

  #[test]
  fn null_percentage_rounds_to_two_places() {
    assert_eq!(null_percentage(1, 3), 33.33);
    assert_eq!(null_percentage(0, 0), 0.0);
  }

  #[test]
  fn datetime_detection_uses_declared_type() {
    assert!(is_datetime_type("timestamp"));
    assert!(is_datetime_type("DATE"));
    assert!(!is_datetime_type("TEXT"));
  }

  #[test]
  fn failed_table_serializes_as_error_object() {
    let r = TableReport::Failed { error: "boom".into() };
    assert_eq!(serde_json::to_string(&r).unwrap(), r#"{"error":"boom"}"#);
  }
}
