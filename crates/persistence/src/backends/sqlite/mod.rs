//! SQLite backend implementation.
//!
//! Provides the [`Store`](crate::core::Store) contract over SQLite, in
//! in-memory mode (tests, demos) or file mode (single-site deployments).
//!
//! # Example
//!
//! ```no_run
//! use emr_persistence::backends::sqlite::SqliteBackend;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // In-memory database with the schema already initialized
//! let backend = SqliteBackend::in_memory()?;
//!
//! // File database, migrated to the current schema version
//! let backend = SqliteBackend::open("./data/bridge.db")?;
//! # Ok(())
//! # }
//! ```
//!
//! # Schema
//!
//! One table per record type, named as in the upstream EMR (`orders`, `obs`,
//! `concept`, `encounter`, ...). Every table has an auto-assigned integer
//! primary key and a `UNIQUE` uuid column. Booleans are stored as 0/1 and
//! timestamps as `YYYY-MM-DDTHH:MM:SS.ffffffZ` text.

mod backend;
mod schema;
mod store;

pub use backend::{SqliteBackend, SqliteBackendConfig};
pub use schema::SCHEMA_VERSION;
