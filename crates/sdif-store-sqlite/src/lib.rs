//! SQLite backend for SDIF containers.
//!
//! One [`SqliteContainer`] owns one synchronous [`rusqlite`] connection to a
//! single container file. All metadata relations live next to the user
//! tables in that file.

mod encode;
mod introspect;
mod query;
mod sample;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use query::QueryResult;
pub use store::{OpenMode, SqliteContainer};

#[cfg(test)]
mod tests;
