//! `sdif`: command-line front end for SDIF containers.
//!
//! # Usage
//!
//! ```
//! sdif schema data.sdif
//! sdif sample data.sdif --rows 10 --objects
//! sdif query data.sdif "SELECT * FROM orders LIMIT 5"
//! sdif compare a.sdif b.sdif --delta
//! sdif merge --output all.sdif a.sdif b.sdif
//! sdif capabilities insert_data
//! ```
//!
//! Comparison and sampling defaults come from `sdif.toml` (or `--config`),
//! overridden by `SDIF_`-prefixed environment variables such as
//! `SDIF_SCHEMA__ENFORCE_COLUMN_ORDER=false`, overridden in turn by flags.
//! Every command prints pretty JSON on stdout.

use std::{
  path::{Path, PathBuf},
  process::ExitCode,
};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use sdif_core::{
  SdifStore,
  analysis::SampleOptions,
  capability::{self, CAPABILITIES},
  compare::{DiffVerbosity, SchemaComparator},
  config::SchemaConfig,
  schema::ContainerSchema,
};
use sdif_store_sqlite::{OpenMode, SqliteContainer};
use serde::{Deserialize, Serialize};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

// ─── CLI args ────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "sdif", version, about = "Inspect, compare and merge SDIF containers")]
struct Cli {
  /// Path to a TOML config file with `[schema]` and `[sample]` tables.
  #[arg(short, long, value_name = "FILE", default_value = "sdif.toml", global = true)]
  config: PathBuf,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Print the structural description of a container.
  Schema { file: PathBuf },

  /// Print sample rows and per-column statistics.
  Sample {
    file: PathBuf,
    /// Random rows per table.
    #[arg(long)]
    rows: Option<usize>,
    /// Most frequent values per column.
    #[arg(long)]
    top: Option<usize>,
    /// Include a listing of stored objects.
    #[arg(long)]
    objects: bool,
    /// Include a listing of stored media.
    #[arg(long)]
    media: bool,
  },

  /// Run one read-only SQL statement.
  Query { file: PathBuf, sql: String },

  /// Check two containers for schema equivalence. Exits 1 when they differ.
  Compare {
    a: PathBuf,
    b: PathBuf,
    /// Report structured changes instead of summary lines.
    #[arg(long)]
    delta: bool,
  },

  /// Check that PRODUCER satisfies everything CONSUMER's schema requires.
  /// Exits 1 when it does not.
  Compatible { consumer: PathBuf, producer: PathBuf },

  /// Merge containers into a new one.
  Merge {
    /// Target container; overwritten if it exists.
    #[arg(short, long, value_name = "FILE")]
    output: PathBuf,
    #[arg(required = true)]
    inputs: Vec<PathBuf>,
  },

  /// List the operations a container supports, or describe one of them.
  Capabilities { name: Option<String> },
}

// ─── Config file ─────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CliConfig {
  schema: SchemaConfig,
  sample: SampleOptions,
}

fn load_config(path: &Path) -> anyhow::Result<CliConfig> {
  config::Config::builder()
    .add_source(config::File::from(path).required(false))
    .add_source(
      config::Environment::with_prefix("SDIF")
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true),
    )
    .build()
    .context("failed to read configuration")?
    .try_deserialize()
    .context("failed to deserialise configuration")
}

// ─── Entry point ─────────────────────────────────────────────────────────────

fn main() -> anyhow::Result<ExitCode> {
  tracing_subscriber::fmt()
    .with_writer(std::io::stderr)
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::WARN.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();
  let cfg = load_config(&cli.config)?;

  match cli.command {
    Command::Schema { file } => {
      print_json(&introspect(&file)?)?;
    }

    Command::Sample { file, rows, top, objects, media } => {
      let options = SampleOptions {
        sample_rows:     rows.unwrap_or(cfg.sample.sample_rows),
        top_n_values:    top.unwrap_or(cfg.sample.top_n_values),
        include_objects: objects || cfg.sample.include_objects,
        include_media:   media || cfg.sample.include_media,
      };
      let mut container = open(&file)?;
      let report = container
        .sample_analysis(&options)
        .with_context(|| format!("failed to sample {}", file.display()))?;
      container.close()?;
      print_json(&report)?;
    }

    Command::Query { file, sql } => {
      let mut container = open(&file)?;
      let result = container.query(&sql).context("query failed")?;
      container.close()?;
      print_json(&result)?;
    }

    Command::Compare { a, b, delta } => {
      let verbosity = if delta { DiffVerbosity::Delta } else { DiffVerbosity::Summary };
      let comparator = SchemaComparator::new(cfg.schema);
      let result = comparator.compare(&introspect(&a)?, &introspect(&b)?, verbosity);
      print_json(&result)?;
      if !result.are_equivalent {
        return Ok(ExitCode::FAILURE);
      }
    }

    Command::Compatible { consumer, producer } => {
      let comparator = SchemaComparator::new(cfg.schema);
      let compatible =
        comparator.is_compatible_with(&introspect(&consumer)?, &introspect(&producer)?);
      print_json(&Compatibility { compatible })?;
      if !compatible {
        return Ok(ExitCode::FAILURE);
      }
    }

    Command::Merge { output, inputs } => {
      let report = sdif_merge::merge(&inputs, &output)
        .with_context(|| format!("failed to merge into {}", output.display()))?;
      print_json(&report)?;
    }

    Command::Capabilities { name: None } => {
      print_json(&CAPABILITIES)?;
    }

    Command::Capabilities { name: Some(name) } => {
      let capability = capability::find(&name)
        .with_context(|| format!("unknown capability {name:?}; run `sdif capabilities`"))?;
      print_json(capability)?;
    }
  }

  Ok(ExitCode::SUCCESS)
}

#[derive(Serialize)]
struct Compatibility {
  compatible: bool,
}

fn open(path: &Path) -> anyhow::Result<SqliteContainer> {
  SqliteContainer::open(path, OpenMode::ReadOnly)
    .with_context(|| format!("failed to open {}", path.display()))
}

fn introspect(path: &Path) -> anyhow::Result<ContainerSchema> {
  let mut container = open(path)?;
  let schema = container
    .introspect_schema()
    .with_context(|| format!("failed to introspect {}", path.display()))?;
  container.close()?;
  Ok(schema)
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
  println!("{}", serde_json::to_string_pretty(value)?);
  Ok(())
}
