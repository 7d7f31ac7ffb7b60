//! EMR Bridge Persistence Layer
//!
//! Typed accessors for the clinical records of an OpenMRS-style electronic
//! medical record: orders, observations, concepts, encounters, and the
//! diagnosis views derived from coded observations.
//!
//! # Architecture
//!
//! - [`types`] - Field values, rows, table descriptors, queries and pages
//! - [`error`] - Error types for all operations
//! - [`core`] - The [`Store`](core::Store) contract, record traits, typed
//!   change sets and the generic [`EntityAccessor`](core::EntityAccessor)
//! - [`records`] - Concrete records and their specialized accessors
//! - [`backends`] - Store implementations (SQLite)
//!
//! # Update semantics
//!
//! Two update modes exist for every writable record:
//!
//! - **Partial** (`update_partial`): a change set whose fields are each
//!   omitted, explicitly null, or set. Only present fields are written.
//! - **Full** (`update_full`): a replacement payload enumerating every
//!   writable field. Required fields must be supplied; nullable fields left
//!   out are cleared.
//!
//! Both return the updated record and the exact set of fields whose stored
//! value changed. Missing records yield `None`, never an error.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use emr_persistence::backends::sqlite::SqliteBackend;
//! use emr_persistence::records::{OrderAccessor, OrderChanges, OrderDraft};
//! use emr_persistence::core::Patch;
//! use emr_persistence::types::{Identity, Page};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(SqliteBackend::in_memory()?);
//! let orders = OrderAccessor::new(store);
//!
//! let order = orders.create(OrderDraft::new(9, 18566, 1)).await?;
//!
//! let changes = OrderChanges {
//!     instructions: Patch::Set("Take with food".to_string()),
//!     ..Default::default()
//! };
//! let updated = orders
//!     .update_partial_tracked(&Identity::uuid(&order.uuid)?, &changes)
//!     .await?
//!     .expect("order exists");
//! assert!(updated.updated_fields.contains("instructions"));
//!
//! let active = orders.list(Page::default()).await?;
//! assert_eq!(active.len(), 1);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod backends;
pub mod core;
pub mod error;
pub mod records;
pub mod types;

// Re-export commonly used types at crate root
pub use error::{PersistenceError, StorageError, StorageResult, ValidationError};
pub use types::{FieldValue, Identity, Page, Query, Row};

// Re-export core traits
pub use core::{ChangeSet, Entity, EntityAccessor, Record, Replacement, Retirable, Store};

#[cfg(feature = "sqlite")]
pub use backends::sqlite::SqliteBackend;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name.
pub const NAME: &str = env!("CARGO_PKG_NAME");
