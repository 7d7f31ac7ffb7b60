//! Soft-delete lifecycle (retire / void).
//!
//! ```text
//!            retire              retire (re-stamps actor)
//!   Active ──────────▶ Retired ◀─────┐
//!     ▲                  │  └────────┘
//!     └──────────────────┘
//!          unretire
//! ```
//!
//! Both transitions are accepted from either state. Repeating one re-stamps
//! the acting user and timestamp; nothing is ever physically removed.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use super::accessor::{EntityAccessor, Visibility};
use super::record::{AuditContext, Record, now};
use super::store::Store;
use crate::error::StorageResult;
use crate::types::{Identity, Page};

/// Lifecycle state of a retirable record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleState {
    /// Visible in default listings.
    Active,
    /// Retired or voided.
    Retired,
}

/// A record with a retire/void flag.
///
/// Implementors must set [`Record::LIFECYCLE_COLUMN`].
pub trait Retirable: Record {
    /// Current lifecycle state.
    fn state(&self) -> LifecycleState;

    /// Sets the flag and records actor, time and (when given) reason.
    fn mark_retired(&mut self, by: i64, at: DateTime<Utc>, reason: Option<&str>);

    /// Clears the flag together with actor, time and reason.
    fn clear_retired(&mut self);
}

impl<R: Retirable, S: Store + ?Sized> EntityAccessor<R, S> {
    /// Retires (voids) a record. Returns `None` if it does not exist.
    ///
    /// Retiring an already retired record succeeds and re-stamps the actor
    /// and timestamp; the previous reason is kept unless a new one is given.
    pub async fn retire(
        &self,
        identity: &Identity,
        retired_by: i64,
        reason: Option<&str>,
    ) -> StorageResult<Option<R>> {
        let Some(current) = self.fetch(identity).await? else {
            return Ok(None);
        };
        let audit = AuditContext {
            changed_by: Some(retired_by),
            at: now(),
        };
        let mut updated = current.clone();
        updated.mark_retired(retired_by, audit.at, reason);
        updated.stamp_audit(&audit);
        info!(
            record = R::NAME,
            %identity,
            retired_by,
            already_retired = current.state() == LifecycleState::Retired,
            "Retiring record"
        );
        Ok(Some(self.persist(&current, updated).await?.record))
    }

    /// Returns a record to the active state. Returns `None` if it does not
    /// exist. Accepted on active records, where it only re-stamps audit fields.
    pub async fn unretire(
        &self,
        identity: &Identity,
        unretired_by: i64,
    ) -> StorageResult<Option<R>> {
        let Some(current) = self.fetch(identity).await? else {
            return Ok(None);
        };
        let mut updated = current.clone();
        updated.clear_retired();
        updated.stamp_audit(&AuditContext::new(Some(unretired_by)));
        info!(record = R::NAME, %identity, unretired_by, "Unretiring record");
        Ok(Some(self.persist(&current, updated).await?.record))
    }

    /// Lists retired records only.
    pub async fn list_retired(&self, page: Page) -> StorageResult<Vec<R>> {
        self.list_with(Visibility::RetiredOnly, page).await
    }
}
