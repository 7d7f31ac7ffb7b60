//! Core accessor abstractions.
//!
//! - [`Store`] - query/command contract with the relational store
//! - [`Entity`], [`Record`] - readable rows and writable records
//! - [`Patch`], [`ChangeSet`], [`Replacement`] - typed update payloads
//! - [`EntityAccessor`] - generic fetch/list/create/update operations
//! - [`Retirable`] - retire/void lifecycle
//!
//! ```text
//! Transport ──▶ ChangeSet / Replacement ──▶ EntityAccessor<R, S> ──▶ Store
//!                                              │
//!                       Record hooks ◀─────────┘
//!               (apply_defaults, stamp_audit)
//! ```

mod accessor;
mod changeset;
mod lifecycle;
mod record;
mod store;

pub use accessor::{EntityAccessor, RecordFilter, Updated, Visibility, diff_fields};
pub use changeset::{ChangeSet, Patch, Replacement};
pub use lifecycle::{LifecycleState, Retirable};
pub use record::{AuditContext, Entity, Record, now};
pub use store::{Store, WriteBatch, WriteOp, WriteOutcome, select_entities};
