//! Merging several containers into one.

use std::{
  collections::{BTreeMap, BTreeSet},
  fs,
  path::{Path, PathBuf},
};

use sdif_core::{
  naming::unique_name,
  store::SdifStore,
  table::{NewMedia, NewObject, NewSemanticLink},
};
use sdif_store_sqlite::{OpenMode, SqliteContainer};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::{
  Error, Result,
  plan::{DroppedForeignKey, plan_tables},
  remap::IdMaps,
};

// ─── Report ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize)]
pub struct MergeReport {
  pub target: PathBuf,
  pub inputs: Vec<InputReport>,
}

/// What happened to one input container.
#[derive(Debug, Clone, Default, Serialize)]
pub struct InputReport {
  pub path:                 PathBuf,
  /// The file was copied as-is; nothing below applies.
  pub copied_verbatim:      bool,
  #[serde(flatten)]
  pub ids:                  IdMaps,
  pub rows_copied:          u64,
  /// Tables created empty because copying their rows failed.
  pub failed_tables:        Vec<String>,
  pub dropped_foreign_keys: Vec<DroppedForeignKey>,
  pub links_copied:         usize,
  pub links_skipped:        usize,
}

// ─── Entry point ─────────────────────────────────────────────────────────────

/// Merge every container in `inputs`, in order, into a fresh container at
/// `target`, and return what was copied where.
///
/// A single input is copied to `target` byte for byte, or left untouched
/// when it already is `target`.
pub fn merge<P: AsRef<Path>>(inputs: &[P], target: impl AsRef<Path>) -> Result<MergeReport> {
  let target = target.as_ref();
  if inputs.is_empty() {
    return Err(Error::NoInputs);
  }
  if target.is_dir() {
    return Err(Error::TargetIsDirectory(target.to_owned()));
  }
  for input in inputs {
    if !input.as_ref().is_file() {
      return Err(Error::InputNotFound(input.as_ref().to_owned()));
    }
  }

  if target.exists() {
    let resolved = resolve(target)?;
    let mut is_input = false;
    for input in inputs {
      is_input |= resolve(input.as_ref())? == resolved;
    }
    if is_input && inputs.len() == 1 {
      info!(target = %target.display(), "single input is the target; nothing to merge");
      return Ok(MergeReport { target: target.to_owned(), inputs: Vec::new() });
    }
    if is_input {
      return Err(Error::TargetIsInput(target.to_owned()));
    }
  }

  if let [input] = inputs {
    return copy_single(input.as_ref(), target);
  }

  let mut out = SqliteContainer::open(target, OpenMode::Overwrite)
    .map_err(|source| Error::Open { path: target.to_owned(), source })?;
  let mut report = MergeReport { target: target.to_owned(), inputs: Vec::new() };

  for input in inputs {
    let path = input.as_ref();
    let mut container = SqliteContainer::open(path, OpenMode::ReadOnly)
      .map_err(|source| Error::Open { path: path.to_owned(), source })?;
    info!(input = %path.display(), "merging container");
    let input_report = merge_into(&container, &out, path)?;
    container.close().map_err(Error::store("close input"))?;
    report.inputs.push(input_report);
  }

  out.refresh_creation_timestamp().map_err(Error::store("refresh creation timestamp"))?;
  out.close().map_err(Error::store("close target"))?;
  info!(target = %target.display(), inputs = inputs.len(), "merge complete");
  Ok(report)
}

fn copy_single(input: &Path, target: &Path) -> Result<MergeReport> {
  if let Some(parent) = target.parent().filter(|p| !p.as_os_str().is_empty()) {
    fs::create_dir_all(parent).map_err(|source| Error::Io { path: parent.to_owned(), source })?;
  }
  if target.exists() {
    fs::remove_file(target).map_err(|source| Error::Io { path: target.to_owned(), source })?;
  }
  let bytes =
    fs::copy(input, target).map_err(|source| Error::Io { path: target.to_owned(), source })?;
  info!(input = %input.display(), target = %target.display(), bytes, "copied single input");

  let input = InputReport { path: input.to_owned(), copied_verbatim: true, ..InputReport::default() };
  Ok(MergeReport { target: target.to_owned(), inputs: vec![input] })
}

fn resolve(path: &Path) -> Result<PathBuf> {
  fs::canonicalize(path).map_err(|source| Error::Io { path: path.to_owned(), source })
}

// ─── One source ──────────────────────────────────────────────────────────────

/// Copy every entity of `source` into `target`, remapping identifiers so
/// nothing collides with what `target` already holds.
///
/// `label` names the source in the report, errors and logs.
pub fn merge_into<S, T>(source: &S, target: &T, label: &Path) -> Result<InputReport>
where
  S: SdifStore,
  T: SdifStore,
{
  let mut report = InputReport { path: label.to_owned(), ..InputReport::default() };
  check_version(source, target, label)?;

  // Sources
  for src in source.list_sources().map_err(Error::store("list sources"))? {
    let new_id = target
      .add_source(
        &src.original_file_name,
        &src.original_file_type,
        src.source_description.as_deref(),
      )
      .map_err(Error::store("add source"))?;
    report.ids.sources.insert(src.source_id, new_id);
  }

  // Tables
  let schema = source.introspect_schema().map_err(Error::store("introspect source"))?;
  let existing: BTreeSet<String> =
    target.list_tables().map_err(Error::store("list target tables"))?.into_iter().collect();
  let plan = plan_tables(&schema.tables, &report.ids.sources, |n| existing.contains(n))?;
  let originals: BTreeMap<&str, &str> =
    plan.renames.iter().map(|(old, new)| (new.as_str(), old.as_str())).collect();

  for table in &plan.tables {
    target.create_table(table).map_err(Error::store("create table"))?;
    let original = originals.get(table.name.as_str()).copied().unwrap_or(table.name.as_str());

    let copied = source
      .read_table(original)
      .map_err(Error::store("read table"))
      .and_then(|rows| {
        target.insert_data(&table.name, &rows).map_err(Error::store("insert rows"))?;
        Ok(rows.len() as u64)
      });
    match copied {
      Ok(rows) => {
        debug!(from = original, to = %table.name, rows, "copied table");
        report.rows_copied += rows;
      }
      Err(e) => {
        warn!(table = original, error = %e, "could not copy rows; table left empty");
        report.failed_tables.push(original.to_owned());
      }
    }
  }
  report.ids.tables = plan.renames.clone();
  report.dropped_foreign_keys = plan.dropped;

  copy_objects(source, target, &mut report.ids)?;
  copy_media(source, target, &mut report.ids)?;

  // Links
  for link in source.list_semantic_links().map_err(Error::store("list semantic links"))? {
    let copied = report
      .ids
      .remap(link.from_element_type, &link.from_element_spec)
      .and_then(|from| {
        let to = report.ids.remap(link.to_element_type, &link.to_element_spec)?;
        Ok(NewSemanticLink {
          link_type: link.link_type.clone(),
          description: link.description.clone(),
          from,
          to,
        })
      })
      .and_then(|new| target.add_semantic_link(&new).map_err(Error::store("add semantic link")));
    match copied {
      Ok(_) => report.links_copied += 1,
      Err(e) => {
        warn!(link_id = link.link_id, error = %e, "skipping semantic link");
        report.links_skipped += 1;
      }
    }
  }

  info!(
    input = %label.display(),
    tables = plan.tables.len(),
    rows = report.rows_copied,
    objects = report.ids.objects.len(),
    media = report.ids.media.len(),
    links = report.links_copied,
    "merged container"
  );
  Ok(report)
}

fn check_version<S: SdifStore, T: SdifStore>(source: &S, target: &T, label: &Path) -> Result<()> {
  let expected = target.properties().map_err(Error::store("read target properties"))?;
  let found = source.properties().map_err(Error::store("read source properties"))?;
  match (found, expected) {
    (None, _) => {
      warn!(input = %label.display(), "container has no properties row; merging anyway");
      Ok(())
    }
    (Some(found), Some(expected)) if found.sdif_version != expected.sdif_version => {
      Err(Error::VersionMismatch {
        path:     label.to_owned(),
        found:    found.sdif_version,
        expected: expected.sdif_version,
      })
    }
    _ => Ok(()),
  }
}

fn mapped_source(ids: &IdMaps, entity: &'static str, name: &str, source_id: i64) -> Result<i64> {
  ids
    .sources
    .get(&source_id)
    .copied()
    .ok_or_else(|| Error::UnmappedSource { entity, name: name.to_owned(), source_id })
}

fn copy_objects<S: SdifStore, T: SdifStore>(source: &S, target: &T, ids: &mut IdMaps) -> Result<()> {
  let mut taken: BTreeSet<String> =
    target.list_objects().map_err(Error::store("list target objects"))?.into_iter().collect();

  for name in source.list_objects().map_err(Error::store("list objects"))? {
    let Some(object) = source.get_object(&name).map_err(Error::store("read object"))? else {
      continue;
    };
    let new_name = unique_name(&name, |c| taken.contains(c))?;
    let source_id = mapped_source(ids, "object", &name, object.source_id)?;
    target
      .add_object(&NewObject {
        name: new_name.clone(),
        source_id,
        json_data: object.json_data,
        description: object.description,
        schema_hint: object.schema_hint,
      })
      .map_err(Error::store("add object"))?;
    taken.insert(new_name.clone());
    ids.objects.insert(name, new_name);
  }
  Ok(())
}

fn copy_media<S: SdifStore, T: SdifStore>(source: &S, target: &T, ids: &mut IdMaps) -> Result<()> {
  let mut taken: BTreeSet<String> =
    target.list_media().map_err(Error::store("list target media"))?.into_iter().collect();

  for name in source.list_media().map_err(Error::store("list media"))? {
    let Some(media) = source.get_media(&name).map_err(Error::store("read media"))? else {
      continue;
    };
    let new_name = unique_name(&name, |c| taken.contains(c))?;
    let source_id = mapped_source(ids, "media", &name, media.source_id)?;
    target
      .add_media(&NewMedia {
        name: new_name.clone(),
        source_id,
        media_data: media.media_data,
        media_type: media.media_type,
        description: media.description,
        original_format: media.original_format,
        technical_metadata: media.technical_metadata,
      })
      .map_err(Error::store("add media"))?;
    taken.insert(new_name.clone());
    ids.media.insert(name, new_name);
  }
  Ok(())
}
