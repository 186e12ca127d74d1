//! Merging SDIF containers.
//!
//! [`merge`] opens every input read-only and drains it into a freshly
//! overwritten target, one input at a time. Tables, objects and media that
//! would collide get counter-suffixed names; sources get new ids; foreign keys
//! within one input and semantic links follow the renames. All reads and
//! writes go through [`SdifStore`](sdif_core::SdifStore), so [`merge_into`]
//! works with any pair of backends.

mod merge;
mod plan;
mod remap;

pub mod error;

pub use error::{Error, Result};
pub use merge::{InputReport, MergeReport, merge, merge_into};
pub use plan::{DroppedForeignKey, TablePlan, assign_names, plan_tables};
pub use remap::IdMaps;
