//! Record traits.
//!
//! An [`Entity`] is anything that can be decoded from a row of a known table.
//! A [`Record`] is a writable entity with the dual `id`/`uuid` identity, a
//! creation payload, typed change sets and per-type hooks for defaults and
//! audit stamping.

use std::fmt::Debug;

use chrono::{DateTime, SubsecRound, Utc};
use serde::Serialize;

use super::changeset::{ChangeSet, Replacement};
use crate::error::PersistenceError;
use crate::types::{Row, TableSpec};

/// Current time at the precision the store keeps (microseconds).
///
/// Stamping with this value means an in-memory record and its re-read copy
/// compare equal.
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// A row type that can be read from the store.
pub trait Entity: Sized + Send + Sync + 'static {
    /// The relation this entity lives in.
    const TABLE: &'static TableSpec;

    /// Decodes one row.
    fn from_row(row: &Row) -> Result<Self, PersistenceError>;
}

/// Input to the [`Record::stamp_audit`] hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuditContext {
    /// Actor named by the incoming change, if any.
    pub changed_by: Option<i64>,
    /// Timestamp of the change.
    pub at: DateTime<Utc>,
}

impl AuditContext {
    /// Audit context stamped with the current time.
    pub fn new(changed_by: Option<i64>) -> Self {
        Self {
            changed_by,
            at: now(),
        }
    }
}

/// A uniquely identified, mutable domain entity.
///
/// `id` is assigned by the store and `uuid` by the accessor at creation; both
/// are immutable afterwards. Audit metadata is only ever changed through the
/// hooks below or the lifecycle operations.
pub trait Record: Entity + Clone + Debug + Serialize {
    /// Display name used in logs and error messages.
    const NAME: &'static str;

    /// Boolean column marking the record retired or voided, if the type has a
    /// soft-delete lifecycle. Default listings exclude rows where it is set.
    const LIFECYCLE_COLUMN: Option<&'static str> = None;

    /// Creation payload.
    type Draft: Send;

    /// Partial update payload.
    type Changes: ChangeSet<Self>;

    /// Full replace payload.
    type Replacement: Replacement<Self>;

    /// Primary key.
    fn id(&self) -> i64;

    /// External identity.
    fn uuid(&self) -> &str;

    /// Encodes every column except the primary key.
    fn to_row(&self) -> Row;

    /// Encodes a creation payload as the row to insert.
    fn draft_row(draft: Self::Draft, uuid: &str, created_at: DateTime<Utc>) -> Row;

    /// Injects type-specific defaults into a creation payload.
    fn apply_defaults(_draft: &mut Self::Draft) {}

    /// Updates audit fields before a modified record is written.
    fn stamp_audit(&mut self, _audit: &AuditContext) {}
}
