//! Visits: a stay or appointment grouping a patient's encounters, from
//! `date_started` until it is stopped.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::core::{
    AuditContext, ChangeSet, Entity, EntityAccessor, LifecycleState, Patch, Record, RecordFilter,
    Replacement, Retirable, Store, Visibility, now,
};
use crate::error::{PersistenceError, StorageResult, ValidationError};
use crate::present_fields;
use crate::records::{Encounter, Order};
use crate::types::{Identity, Page, Predicate, Row, SortDirection, SortKey, Subquery, TableSpec};

const VISIT: TableSpec = TableSpec {
    name: "visit",
    id_column: "visit_id",
    columns: crate::columns![
        "visit_id": Integer,
        "uuid": Text,
        "patient_id": Integer,
        "visit_type_id": Integer,
        "date_started": Timestamp,
        "date_stopped": Timestamp,
        "indication_concept_id": Integer,
        "location_id": Integer,
        "creator": Integer,
        "date_created": Timestamp,
        "changed_by": Integer,
        "date_changed": Timestamp,
        "voided": Bool,
        "voided_by": Integer,
        "date_voided": Timestamp,
        "void_reason": Text,
    ],
};

/// A patient visit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Visit {
    pub visit_id: i64,
    pub uuid: String,
    pub patient_id: i64,
    pub visit_type_id: Option<i64>,
    pub date_started: DateTime<Utc>,
    pub date_stopped: Option<DateTime<Utc>>,
    pub indication_concept_id: Option<i64>,
    pub location_id: Option<i64>,
    pub creator: Option<i64>,
    pub date_created: DateTime<Utc>,
    pub changed_by: Option<i64>,
    pub date_changed: Option<DateTime<Utc>>,
    pub voided: bool,
    pub voided_by: Option<i64>,
    pub date_voided: Option<DateTime<Utc>>,
    pub void_reason: Option<String>,
}

impl Visit {
    /// A visit is active until it is stopped.
    pub fn is_active(&self) -> bool {
        self.date_stopped.is_none()
    }
}

/// Payload for creating a visit. `date_started` defaults to now.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct VisitDraft {
    pub patient_id: i64,
    pub visit_type_id: i64,
    pub creator: i64,
    #[serde(default)]
    pub date_started: Option<DateTime<Utc>>,
    #[serde(default)]
    pub date_stopped: Option<DateTime<Utc>>,
    #[serde(default)]
    pub indication_concept_id: Option<i64>,
    #[serde(default)]
    pub location_id: Option<i64>,
}

impl VisitDraft {
    pub fn new(patient_id: i64, visit_type_id: i64, creator: i64) -> Self {
        Self {
            patient_id,
            visit_type_id,
            creator,
            ..Default::default()
        }
    }
}

/// Partial update of a visit.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct VisitChanges {
    pub patient_id: Patch<i64>,
    pub visit_type_id: Patch<i64>,
    pub date_started: Patch<DateTime<Utc>>,
    pub date_stopped: Patch<DateTime<Utc>>,
    pub indication_concept_id: Patch<i64>,
    pub location_id: Patch<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub changed_by: Option<i64>,
}

impl ChangeSet<Visit> for VisitChanges {
    fn present_fields(&self) -> Vec<&'static str> {
        present_fields!(self;
            patient_id, visit_type_id, date_started, date_stopped, indication_concept_id,
            location_id,
        )
    }

    fn validate(&self) -> Result<(), ValidationError> {
        self.patient_id.require_non_null(Visit::NAME, "patient_id")?;
        self.visit_type_id.require_non_null(Visit::NAME, "visit_type_id")?;
        self.date_started.require_non_null(Visit::NAME, "date_started")
    }

    fn apply(&self, visit: &mut Visit) {
        self.patient_id.apply_required(&mut visit.patient_id);
        if let Patch::Set(visit_type_id) = &self.visit_type_id {
            visit.visit_type_id = Some(*visit_type_id);
        }
        self.date_started.apply_required(&mut visit.date_started);
        self.date_stopped.apply_nullable(&mut visit.date_stopped);
        self.indication_concept_id
            .apply_nullable(&mut visit.indication_concept_id);
        self.location_id.apply_nullable(&mut visit.location_id);
    }

    fn changed_by(&self) -> Option<i64> {
        self.changed_by
    }
}

/// Full replacement of a visit.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct VisitReplace {
    pub patient_id: i64,
    pub visit_type_id: i64,
    pub date_started: DateTime<Utc>,
    pub location_id: i64,
    pub indication_concept_id: i64,
    #[serde(default)]
    pub uuid: Option<String>,
    #[serde(default)]
    pub date_stopped: Option<DateTime<Utc>>,
    #[serde(default)]
    pub changed_by: Option<i64>,
}

impl Replacement<Visit> for VisitReplace {
    fn validate(&self) -> Result<(), ValidationError> {
        check_stop_after_start(self.date_started, self.date_stopped)
    }

    fn uuid(&self) -> Option<&str> {
        self.uuid.as_deref()
    }

    fn apply(&self, visit: &mut Visit) {
        visit.patient_id = self.patient_id;
        visit.visit_type_id = Some(self.visit_type_id);
        visit.date_started = self.date_started;
        visit.date_stopped = self.date_stopped;
        visit.location_id = Some(self.location_id);
        visit.indication_concept_id = Some(self.indication_concept_id);
    }

    fn changed_by(&self) -> Option<i64> {
        self.changed_by
    }
}

fn check_stop_after_start(
    started: DateTime<Utc>,
    stopped: Option<DateTime<Utc>>,
) -> Result<(), ValidationError> {
    match stopped {
        Some(stopped) if stopped < started => Err(ValidationError::InvalidValue {
            field: "date_stopped".to_string(),
            message: "must not be before date_started".to_string(),
        }),
        _ => Ok(()),
    }
}

impl Entity for Visit {
    const TABLE: &'static TableSpec = &VISIT;

    fn from_row(row: &Row) -> Result<Self, PersistenceError> {
        Ok(Self {
            visit_id: row.integer("visit_id")?,
            uuid: row.text("uuid")?,
            patient_id: row.integer("patient_id")?,
            visit_type_id: row.opt_integer("visit_type_id")?,
            date_started: row.timestamp("date_started")?,
            date_stopped: row.opt_timestamp("date_stopped")?,
            indication_concept_id: row.opt_integer("indication_concept_id")?,
            location_id: row.opt_integer("location_id")?,
            creator: row.opt_integer("creator")?,
            date_created: row.timestamp("date_created")?,
            changed_by: row.opt_integer("changed_by")?,
            date_changed: row.opt_timestamp("date_changed")?,
            voided: row.bool("voided")?,
            voided_by: row.opt_integer("voided_by")?,
            date_voided: row.opt_timestamp("date_voided")?,
            void_reason: row.opt_text("void_reason")?,
        })
    }
}

impl Record for Visit {
    const NAME: &'static str = "Visit";
    const LIFECYCLE_COLUMN: Option<&'static str> = Some("voided");

    type Draft = VisitDraft;
    type Changes = VisitChanges;
    type Replacement = VisitReplace;

    fn id(&self) -> i64 {
        self.visit_id
    }

    fn uuid(&self) -> &str {
        &self.uuid
    }

    fn to_row(&self) -> Row {
        Row::new()
            .with("uuid", self.uuid.as_str())
            .with("patient_id", self.patient_id)
            .with("visit_type_id", self.visit_type_id)
            .with("date_started", self.date_started)
            .with("date_stopped", self.date_stopped)
            .with("indication_concept_id", self.indication_concept_id)
            .with("location_id", self.location_id)
            .with("creator", self.creator)
            .with("date_created", self.date_created)
            .with("changed_by", self.changed_by)
            .with("date_changed", self.date_changed)
            .with("voided", self.voided)
            .with("voided_by", self.voided_by)
            .with("date_voided", self.date_voided)
            .with("void_reason", self.void_reason.clone())
    }

    fn draft_row(draft: VisitDraft, uuid: &str, created_at: DateTime<Utc>) -> Row {
        Row::new()
            .with("uuid", uuid)
            .with("patient_id", draft.patient_id)
            .with("visit_type_id", draft.visit_type_id)
            .with("date_started", draft.date_started.unwrap_or(created_at))
            .with("date_stopped", draft.date_stopped)
            .with("indication_concept_id", draft.indication_concept_id)
            .with("location_id", draft.location_id)
            .with("creator", draft.creator)
            .with("date_created", created_at)
            .with("voided", false)
    }

    fn stamp_audit(&mut self, audit: &AuditContext) {
        if audit.changed_by.is_some() {
            self.changed_by = audit.changed_by;
        }
        self.date_changed = Some(audit.at);
    }
}

impl Retirable for Visit {
    fn state(&self) -> LifecycleState {
        if self.voided {
            LifecycleState::Retired
        } else {
            LifecycleState::Active
        }
    }

    fn mark_retired(&mut self, by: i64, at: DateTime<Utc>, reason: Option<&str>) {
        self.voided = true;
        self.voided_by = Some(by);
        self.date_voided = Some(at);
        if let Some(reason) = reason {
            self.void_reason = Some(reason.to_string());
        }
    }

    fn clear_retired(&mut self) {
        self.voided = false;
        self.voided_by = None;
        self.date_voided = None;
        self.void_reason = None;
    }
}

/// Scoped visit listings. Unless noted, the most recently started visit
/// comes first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VisitFilter {
    Patient(i64),
    VisitType(i64),
    Location(i64),
    Creator(i64),
    /// Not yet stopped, optionally for one patient.
    Active { patient_id: Option<i64> },
    /// Stopped; the most recently stopped visit comes first.
    Completed,
    /// `date_started` within `[start, end]`, optionally for one patient.
    DateRange {
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
        patient_id: Option<i64>,
    },
    /// Visits with an active encounter holding an active order of the type.
    WithOrderType {
        order_type_id: i64,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
        patient_id: Option<i64>,
    },
}

fn started_within(
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
    patient_id: Option<i64>,
) -> Vec<Predicate> {
    [
        start.map(|s| Predicate::gte("date_started", s)),
        end.map(|e| Predicate::lte("date_started", e)),
        patient_id.map(|id| Predicate::eq("patient_id", id)),
    ]
    .into_iter()
    .flatten()
    .collect()
}

/// Active encounters holding an active order of `order_type_id`.
fn encounters_with_order_type(order_type_id: i64) -> Subquery {
    let orders = Subquery::new(Order::TABLE, "encounter_id")
        .filter(Predicate::eq("order_type_id", order_type_id))
        .filter(Predicate::eq("voided", false));
    Subquery::new(Encounter::TABLE, "visit_id")
        .filter(Predicate::eq("voided", false))
        .filter(Predicate::in_select("encounter_id", orders))
}

impl RecordFilter<Visit> for VisitFilter {
    fn predicate(&self) -> Predicate {
        match self {
            VisitFilter::Patient(id) => Predicate::eq("patient_id", *id),
            VisitFilter::VisitType(id) => Predicate::eq("visit_type_id", *id),
            VisitFilter::Location(id) => Predicate::eq("location_id", *id),
            VisitFilter::Creator(id) => Predicate::eq("creator", *id),
            VisitFilter::Active { patient_id } => {
                let mut all = vec![Predicate::IsNull("date_stopped")];
                all.extend(patient_id.map(|id| Predicate::eq("patient_id", id)));
                Predicate::AllOf(all)
            }
            VisitFilter::Completed => Predicate::IsNotNull("date_stopped"),
            VisitFilter::DateRange {
                start,
                end,
                patient_id,
            } => Predicate::AllOf(started_within(*start, *end, *patient_id)),
            VisitFilter::WithOrderType {
                order_type_id,
                start,
                end,
                patient_id,
            } => {
                let mut all = started_within(*start, *end, *patient_id);
                all.push(Predicate::in_select(
                    "visit_id",
                    encounters_with_order_type(*order_type_id),
                ));
                Predicate::AllOf(all)
            }
        }
    }

    fn order(&self) -> Vec<SortKey> {
        let column = match self {
            VisitFilter::Completed => "date_stopped",
            _ => "date_started",
        };
        vec![SortKey {
            column,
            direction: SortDirection::Descending,
        }]
    }
}

/// Accessor for visits.
pub type VisitAccessor<S> = EntityAccessor<Visit, S>;

impl<S: Store + ?Sized> EntityAccessor<Visit, S> {
    /// Active visits that have not been stopped, newest first.
    pub async fn list_active(
        &self,
        patient_id: Option<i64>,
        page: Page,
    ) -> StorageResult<Vec<Visit>> {
        self.list_by(&VisitFilter::Active { patient_id }, Visibility::ActiveOnly, page)
            .await
    }

    /// Active visits that have been stopped, most recently stopped first.
    pub async fn list_completed(&self, page: Page) -> StorageResult<Vec<Visit>> {
        self.list_by(&VisitFilter::Completed, Visibility::ActiveOnly, page)
            .await
    }

    /// Active visits of a patient, newest first.
    pub async fn list_by_patient(&self, patient_id: i64, page: Page) -> StorageResult<Vec<Visit>> {
        self.list_by(&VisitFilter::Patient(patient_id), Visibility::ActiveOnly, page)
            .await
    }

    /// Active visits started within `[start, end]`. Either bound may be open.
    pub async fn list_by_date_range(
        &self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
        patient_id: Option<i64>,
        page: Page,
    ) -> StorageResult<Vec<Visit>> {
        check_range(start, end)?;
        let filter = VisitFilter::DateRange {
            start,
            end,
            patient_id,
        };
        self.list_by(&filter, Visibility::ActiveOnly, page).await
    }

    /// Active visits in which an order of the given type was placed.
    pub async fn list_with_order_type(
        &self,
        order_type_id: i64,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
        patient_id: Option<i64>,
        page: Page,
    ) -> StorageResult<Vec<Visit>> {
        check_range(start, end)?;
        let filter = VisitFilter::WithOrderType {
            order_type_id,
            start,
            end,
            patient_id,
        };
        self.list_by(&filter, Visibility::ActiveOnly, page).await
    }

    /// Stops a visit at `date_stopped`, or now. Returns `None` if the visit
    /// does not exist.
    ///
    /// Stopping an already stopped visit moves its stop time.
    pub async fn stop(
        &self,
        identity: &Identity,
        stopped_by: i64,
        date_stopped: Option<DateTime<Utc>>,
    ) -> StorageResult<Option<Visit>> {
        let Some(current) = self.fetch(identity).await? else {
            return Ok(None);
        };
        let audit = AuditContext {
            changed_by: Some(stopped_by),
            at: now(),
        };
        let stopped_at = date_stopped.unwrap_or(audit.at);
        check_stop_after_start(current.date_started, Some(stopped_at))?;

        let mut updated = current.clone();
        updated.date_stopped = Some(stopped_at);
        updated.stamp_audit(&audit);
        info!(%identity, stopped_by, %stopped_at, "Stopping visit");
        Ok(Some(self.persist(&current, updated).await?.record))
    }

    /// Voids a visit.
    pub async fn void(
        &self,
        identity: &Identity,
        voided_by: i64,
        reason: Option<&str>,
    ) -> StorageResult<Option<Visit>> {
        self.retire(identity, voided_by, reason).await
    }

    /// Reverses a void.
    pub async fn unvoid(&self, identity: &Identity, unvoided_by: i64) -> StorageResult<Option<Visit>> {
        self.unretire(identity, unvoided_by).await
    }
}

fn check_range(
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
) -> Result<(), ValidationError> {
    match (start, end) {
        (Some(start), Some(end)) if start > end => Err(ValidationError::InvalidValue {
            field: "start_date".to_string(),
            message: "start_date must not be after end_date".to_string(),
        }),
        _ => Ok(()),
    }
}
