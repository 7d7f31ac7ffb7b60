//! The generic record accessor.
//!
//! [`EntityAccessor`] provides the data-access contract shared by every
//! record type: fetch by id or UUID, paged listing, creation, partial update,
//! full replace and field diffing. Type-specific lookups are added as
//! inherent impl blocks on `EntityAccessor<Order, S>` and friends, next to
//! each record type.
//!
//! # Update semantics
//!
//! - A partial update writes only the fields present in the change set. An
//!   empty change set returns the stored record as-is, without stamping audit
//!   fields or writing.
//! - A full replace writes every field of the payload and always stamps audit
//!   fields, even when no value differs.
//! - Only the columns that actually differ are sent to the store, in a single
//!   atomic write. A failed write leaves the store untouched and the mutated
//!   copy is dropped.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use emr_persistence::backends::sqlite::SqliteBackend;
//! use emr_persistence::core::EntityAccessor;
//! use emr_persistence::records::{Order, OrderChanges, OrderDraft};
//! use emr_persistence::types::{Identity, Page};
//!
//! # async fn example() -> Result<(), emr_persistence::StorageError> {
//! let backend = Arc::new(SqliteBackend::in_memory()?);
//! let orders = EntityAccessor::<Order, _>::new(backend);
//!
//! let order = orders.create(OrderDraft::new(9, 18566, 1)).await?;
//! let changes = OrderChanges {
//!     instructions: Some("Updated".to_string()).into(),
//!     ..Default::default()
//! };
//! let updated = orders
//!     .update_partial(&Identity::uuid(&order.uuid)?, &changes)
//!     .await?
//!     .expect("order exists");
//! assert_eq!(updated.patient_id, 9);
//!
//! let page = orders.list(Page::default()).await?;
//! assert_eq!(page.len(), 1);
//! # Ok(())
//! # }
//! ```

use std::collections::BTreeSet;
use std::marker::PhantomData;
use std::sync::Arc;

use tracing::{debug, info};
use uuid::Uuid;

use super::changeset::{ChangeSet, Replacement};
use super::record::{AuditContext, Record, now};
use super::store::{Store, select_entities};
use crate::error::{PersistenceError, StorageResult, ValidationError};
use crate::types::{Identity, Page, Predicate, Query, SortKey, normalize_uuid};

/// Which lifecycle states a listing returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Visibility {
    /// Only records that are not retired or voided.
    #[default]
    ActiveOnly,
    /// Every record.
    IncludeRetired,
    /// Only retired or voided records.
    RetiredOnly,
}

impl Visibility {
    /// `IncludeRetired` when the flag is set, `ActiveOnly` otherwise.
    pub fn including_retired(include: bool) -> Self {
        if include {
            Visibility::IncludeRetired
        } else {
            Visibility::ActiveOnly
        }
    }

    fn predicate(self, column: Option<&'static str>) -> Option<Predicate> {
        let column = column?;
        match self {
            Visibility::ActiveOnly => Some(Predicate::eq(column, false)),
            Visibility::RetiredOnly => Some(Predicate::eq(column, true)),
            Visibility::IncludeRetired => None,
        }
    }
}

/// A typed filter over one record type, turned into a store predicate.
///
/// Record modules implement this on small enums (`OrderFilter`,
/// `EncounterFilter`, ...) so that every scoped listing shares the paging
/// and visibility rules of [`EntityAccessor::list_by`].
pub trait RecordFilter<R> {
    /// The predicate selecting matching rows.
    fn predicate(&self) -> Predicate;

    /// Ordering of the listing. Primary key order when empty.
    fn order(&self) -> Vec<SortKey> {
        Vec::new()
    }
}

/// A record returned together with the names of the columns that changed.
#[derive(Debug, Clone, PartialEq)]
pub struct Updated<R> {
    /// The record as stored after the update.
    pub record: R,
    /// Columns whose value differs from the pre-update record.
    pub updated_fields: BTreeSet<&'static str>,
}

/// Names of the columns whose values differ between two versions of a record.
///
/// Pure; never touches the store.
pub fn diff_fields<R: Record>(before: &R, after: &R) -> BTreeSet<&'static str> {
    let old = before.to_row();
    let new = after.to_row();
    R::TABLE
        .column_names()
        .filter(|column| old.get(column) != new.get(column))
        .collect()
}

/// Data access for one record type over a shared store handle.
///
/// Holds no state besides the store, so a single instance can serve
/// concurrent callers.
pub struct EntityAccessor<R, S: ?Sized> {
    store: Arc<S>,
    _record: PhantomData<fn() -> R>,
}

impl<R, S: ?Sized> Clone for EntityAccessor<R, S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            _record: PhantomData,
        }
    }
}

impl<R, S: ?Sized> std::fmt::Debug for EntityAccessor<R, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityAccessor")
            .field("record", &std::any::type_name::<R>())
            .finish_non_exhaustive()
    }
}

impl<R: Record, S: Store + ?Sized> EntityAccessor<R, S> {
    /// Creates an accessor over `store`.
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            _record: PhantomData,
        }
    }

    /// Returns the underlying store.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Looks up a record by primary key.
    pub async fn fetch_by_id(&self, id: i64) -> StorageResult<Option<R>> {
        self.fetch_where(Predicate::eq(R::TABLE.id_column, id)).await
    }

    /// Looks up a record by UUID.
    ///
    /// # Errors
    ///
    /// * `StorageError::Validation` - If `uuid` is not a well-formed UUID
    pub async fn fetch_by_uuid(&self, uuid: &str) -> StorageResult<Option<R>> {
        let uuid = normalize_uuid(uuid)?;
        self.fetch_where(Predicate::eq("uuid", uuid)).await
    }

    /// Looks up a record by either identity.
    pub async fn fetch(&self, identity: &Identity) -> StorageResult<Option<R>> {
        match identity {
            Identity::Id(id) => self.fetch_by_id(*id).await,
            Identity::Uuid(uuid) => self.fetch_by_uuid(uuid).await,
        }
    }

    /// Returns the first record matching `predicate`, in primary key order.
    pub async fn fetch_where(&self, predicate: Predicate) -> StorageResult<Option<R>> {
        let query = Query::new(R::TABLE).filter(predicate).page(Page { skip: 0, limit: 1 });
        match self.store.select_one(&query).await? {
            Some(row) => Ok(Some(R::from_row(&row)?)),
            None => Ok(None),
        }
    }

    /// Lists active records in primary key order.
    pub async fn list(&self, page: Page) -> StorageResult<Vec<R>> {
        self.list_where(Vec::new(), Visibility::ActiveOnly, page).await
    }

    /// Lists records in primary key order with an explicit visibility.
    pub async fn list_with(&self, visibility: Visibility, page: Page) -> StorageResult<Vec<R>> {
        self.list_where(Vec::new(), visibility, page).await
    }

    /// Lists records matching every predicate, in primary key order.
    pub async fn list_where(
        &self,
        predicates: Vec<Predicate>,
        visibility: Visibility,
        page: Page,
    ) -> StorageResult<Vec<R>> {
        let query = self.query(predicates, visibility).page(page);
        self.load(&query).await
    }

    /// Lists records matching a typed filter, in the order the filter asks for.
    pub async fn list_by<F: RecordFilter<R> + Sync>(
        &self,
        filter: &F,
        visibility: Visibility,
        page: Page,
    ) -> StorageResult<Vec<R>> {
        let query = filter
            .order()
            .into_iter()
            .fold(self.query(vec![filter.predicate()], visibility), |query, key| {
                query.order_by(key.column, key.direction)
            })
            .page(page);
        self.load(&query).await
    }

    /// Lists records matching `query` built by a specialization.
    pub(crate) async fn load(&self, query: &Query) -> StorageResult<Vec<R>> {
        let records: Vec<R> = select_entities(self.store.as_ref(), query).await?;
        debug!(record = R::NAME, count = records.len(), "Listed records");
        Ok(records)
    }

    /// Counts records with the given visibility.
    pub async fn count(&self, visibility: Visibility) -> StorageResult<u64> {
        self.store.count(&self.query(Vec::new(), visibility)).await
    }

    /// Base query of a listing. With no ordering terms added, rows come back
    /// in primary key order.
    pub(crate) fn query(&self, predicates: Vec<Predicate>, visibility: Visibility) -> Query {
        Query::new(R::TABLE)
            .filters(predicates)
            .filters(visibility.predicate(R::LIFECYCLE_COLUMN))
    }

    /// Creates a record.
    ///
    /// Assigns a fresh UUID, runs the `apply_defaults` hook, stamps the
    /// creation time, inserts atomically and returns the stored record.
    ///
    /// # Errors
    ///
    /// * `StorageError::Persistence` - If the insert fails; nothing is written
    pub async fn create(&self, mut draft: R::Draft) -> StorageResult<R> {
        R::apply_defaults(&mut draft);
        let uuid = Uuid::new_v4().to_string();
        let row = R::draft_row(draft, &uuid, now());
        let id = self.store.insert(R::TABLE, row).await?;
        info!(record = R::NAME, id, uuid = %uuid, "Created record");
        self.refetch(id).await
    }

    /// Applies a partial update. Returns `None` if the record does not exist.
    pub async fn update_partial(
        &self,
        identity: &Identity,
        changes: &R::Changes,
    ) -> StorageResult<Option<R>> {
        Ok(self
            .update_partial_tracked(identity, changes)
            .await?
            .map(|updated| updated.record))
    }

    /// [`update_partial`](Self::update_partial), also reporting the changed
    /// columns.
    pub async fn update_partial_tracked(
        &self,
        identity: &Identity,
        changes: &R::Changes,
    ) -> StorageResult<Option<Updated<R>>> {
        changes.validate()?;
        let Some(current) = self.fetch(identity).await? else {
            return Ok(None);
        };
        if changes.is_empty() {
            debug!(record = R::NAME, %identity, "Empty change set, nothing to write");
            return Ok(Some(Updated {
                record: current,
                updated_fields: BTreeSet::new(),
            }));
        }

        let mut updated = current.clone();
        changes.apply(&mut updated);
        updated.stamp_audit(&AuditContext::new(changes.changed_by()));
        debug!(
            record = R::NAME,
            %identity,
            fields = ?changes.present_fields(),
            "Applying partial update"
        );
        self.persist(&current, updated).await.map(Some)
    }

    /// Replaces every writable field. Returns `None` if the record does not
    /// exist.
    ///
    /// # Errors
    ///
    /// * `StorageError::Validation` - If the payload fails validation or its
    ///   `uuid` names a different record
    pub async fn update_full(
        &self,
        identity: &Identity,
        replacement: &R::Replacement,
    ) -> StorageResult<Option<R>> {
        Ok(self
            .update_full_tracked(identity, replacement)
            .await?
            .map(|updated| updated.record))
    }

    /// [`update_full`](Self::update_full), also reporting the changed columns.
    pub async fn update_full_tracked(
        &self,
        identity: &Identity,
        replacement: &R::Replacement,
    ) -> StorageResult<Option<Updated<R>>> {
        replacement.validate()?;
        let payload_uuid = replacement.uuid().map(normalize_uuid).transpose()?;
        if let (Identity::Uuid(addressed), Some(payload)) = (identity, &payload_uuid) {
            check_identity(addressed, payload)?;
        }

        let Some(current) = self.fetch(identity).await? else {
            return Ok(None);
        };
        if let Some(payload) = &payload_uuid {
            check_identity(current.uuid(), payload)?;
        }

        let mut updated = current.clone();
        replacement.apply(&mut updated);
        updated.stamp_audit(&AuditContext::new(replacement.changed_by()));
        debug!(record = R::NAME, %identity, "Applying full replace");
        self.persist(&current, updated).await.map(Some)
    }

    /// Names of the columns whose values differ between `before` and `after`.
    pub fn diff_fields(before: &R, after: &R) -> BTreeSet<&'static str> {
        diff_fields(before, after)
    }

    /// Writes the columns that differ between `before` and `after` in one
    /// atomic update and returns the re-read record.
    pub(crate) async fn persist(&self, before: &R, after: R) -> StorageResult<Updated<R>> {
        let updated_fields = diff_fields(before, &after);
        if updated_fields.is_empty() {
            return Ok(Updated {
                record: after,
                updated_fields,
            });
        }

        let row = after.to_row().project(updated_fields.iter().copied());
        self.store.update(R::TABLE, before.id(), row).await?;
        info!(
            record = R::NAME,
            id = before.id(),
            fields = ?updated_fields,
            "Updated record"
        );
        let record = self.refetch(before.id()).await?;
        Ok(Updated {
            record,
            updated_fields,
        })
    }

    async fn refetch(&self, id: i64) -> StorageResult<R> {
        self.fetch_by_id(id).await?.ok_or_else(|| {
            PersistenceError::MissingAfterWrite {
                record: R::NAME,
                id,
            }
            .into()
        })
    }
}

fn check_identity(addressed: &str, payload: &str) -> Result<(), ValidationError> {
    if addressed == payload {
        Ok(())
    } else {
        Err(ValidationError::IdentityMismatch {
            addressed: addressed.to_string(),
            payload: payload.to_string(),
        })
    }
}
