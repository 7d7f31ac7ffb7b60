//! Encounters: a patient's interaction with the health system at a point in
//! time, optionally grouped into a visit.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::{
    AuditContext, ChangeSet, Entity, EntityAccessor, LifecycleState, Patch, Record, RecordFilter,
    Replacement, Retirable, Store, Visibility,
};
use crate::error::{PersistenceError, StorageResult, ValidationError};
use crate::present_fields;
use crate::types::{Identity, Page, Predicate, Row, TableSpec};

const ENCOUNTER: TableSpec = TableSpec {
    name: "encounter",
    id_column: "encounter_id",
    columns: crate::columns![
        "encounter_id": Integer,
        "uuid": Text,
        "encounter_type": Integer,
        "patient_id": Integer,
        "location_id": Integer,
        "form_id": Integer,
        "encounter_datetime": Timestamp,
        "visit_id": Integer,
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

/// A clinical encounter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Encounter {
    pub encounter_id: i64,
    pub uuid: String,
    pub encounter_type: i64,
    pub patient_id: i64,
    pub location_id: Option<i64>,
    pub form_id: Option<i64>,
    pub encounter_datetime: DateTime<Utc>,
    pub visit_id: Option<i64>,
    pub creator: Option<i64>,
    pub date_created: DateTime<Utc>,
    pub changed_by: Option<i64>,
    pub date_changed: Option<DateTime<Utc>>,
    pub voided: bool,
    pub voided_by: Option<i64>,
    pub date_voided: Option<DateTime<Utc>>,
    pub void_reason: Option<String>,
}

/// Payload for creating an encounter.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct EncounterDraft {
    pub encounter_type: i64,
    pub patient_id: i64,
    #[serde(default)]
    pub location_id: Option<i64>,
    #[serde(default)]
    pub form_id: Option<i64>,
    #[serde(default)]
    pub encounter_datetime: Option<DateTime<Utc>>,
    #[serde(default)]
    pub visit_id: Option<i64>,
    #[serde(default)]
    pub creator: Option<i64>,
}

/// Partial update of an encounter.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct EncounterChanges {
    pub encounter_type: Patch<i64>,
    pub patient_id: Patch<i64>,
    pub location_id: Patch<i64>,
    pub form_id: Patch<i64>,
    pub encounter_datetime: Patch<DateTime<Utc>>,
    pub visit_id: Patch<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub changed_by: Option<i64>,
}

impl ChangeSet<Encounter> for EncounterChanges {
    fn present_fields(&self) -> Vec<&'static str> {
        present_fields!(self;
            encounter_type, patient_id, location_id, form_id, encounter_datetime, visit_id,
        )
    }

    fn validate(&self) -> Result<(), ValidationError> {
        self.encounter_type.require_non_null(Encounter::NAME, "encounter_type")?;
        self.patient_id.require_non_null(Encounter::NAME, "patient_id")?;
        self.encounter_datetime
            .require_non_null(Encounter::NAME, "encounter_datetime")
    }

    fn apply(&self, encounter: &mut Encounter) {
        self.encounter_type.apply_required(&mut encounter.encounter_type);
        self.patient_id.apply_required(&mut encounter.patient_id);
        self.location_id.apply_nullable(&mut encounter.location_id);
        self.form_id.apply_nullable(&mut encounter.form_id);
        self.encounter_datetime
            .apply_required(&mut encounter.encounter_datetime);
        self.visit_id.apply_nullable(&mut encounter.visit_id);
    }

    fn changed_by(&self) -> Option<i64> {
        self.changed_by
    }
}

/// Full replacement of an encounter.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct EncounterReplace {
    pub encounter_type: i64,
    pub patient_id: i64,
    pub encounter_datetime: DateTime<Utc>,
    #[serde(default)]
    pub uuid: Option<String>,
    #[serde(default)]
    pub location_id: Option<i64>,
    #[serde(default)]
    pub form_id: Option<i64>,
    #[serde(default)]
    pub visit_id: Option<i64>,
    #[serde(default)]
    pub changed_by: Option<i64>,
}

impl Replacement<Encounter> for EncounterReplace {
    fn uuid(&self) -> Option<&str> {
        self.uuid.as_deref()
    }

    fn apply(&self, encounter: &mut Encounter) {
        encounter.encounter_type = self.encounter_type;
        encounter.patient_id = self.patient_id;
        encounter.encounter_datetime = self.encounter_datetime;
        encounter.location_id = self.location_id;
        encounter.form_id = self.form_id;
        encounter.visit_id = self.visit_id;
    }

    fn changed_by(&self) -> Option<i64> {
        self.changed_by
    }
}

impl Entity for Encounter {
    const TABLE: &'static TableSpec = &ENCOUNTER;

    fn from_row(row: &Row) -> Result<Self, PersistenceError> {
        Ok(Self {
            encounter_id: row.integer("encounter_id")?,
            uuid: row.text("uuid")?,
            encounter_type: row.integer("encounter_type")?,
            patient_id: row.integer("patient_id")?,
            location_id: row.opt_integer("location_id")?,
            form_id: row.opt_integer("form_id")?,
            encounter_datetime: row.timestamp("encounter_datetime")?,
            visit_id: row.opt_integer("visit_id")?,
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

impl Record for Encounter {
    const NAME: &'static str = "Encounter";
    const LIFECYCLE_COLUMN: Option<&'static str> = Some("voided");

    type Draft = EncounterDraft;
    type Changes = EncounterChanges;
    type Replacement = EncounterReplace;

    fn id(&self) -> i64 {
        self.encounter_id
    }

    fn uuid(&self) -> &str {
        &self.uuid
    }

    fn to_row(&self) -> Row {
        Row::new()
            .with("uuid", self.uuid.as_str())
            .with("encounter_type", self.encounter_type)
            .with("patient_id", self.patient_id)
            .with("location_id", self.location_id)
            .with("form_id", self.form_id)
            .with("encounter_datetime", self.encounter_datetime)
            .with("visit_id", self.visit_id)
            .with("creator", self.creator)
            .with("date_created", self.date_created)
            .with("changed_by", self.changed_by)
            .with("date_changed", self.date_changed)
            .with("voided", self.voided)
            .with("voided_by", self.voided_by)
            .with("date_voided", self.date_voided)
            .with("void_reason", self.void_reason.clone())
    }

    fn draft_row(draft: EncounterDraft, uuid: &str, created_at: DateTime<Utc>) -> Row {
        Row::new()
            .with("uuid", uuid)
            .with("encounter_type", draft.encounter_type)
            .with("patient_id", draft.patient_id)
            .with("location_id", draft.location_id)
            .with("form_id", draft.form_id)
            .with(
                "encounter_datetime",
                draft.encounter_datetime.unwrap_or(created_at),
            )
            .with("visit_id", draft.visit_id)
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

impl Retirable for Encounter {
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

/// Scoped encounter listings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncounterFilter {
    Patient(i64),
    EncounterType(i64),
    Location(i64),
    Visit(i64),
    Creator(i64),
    /// `encounter_datetime` within `[start, end]`; either bound may be open.
    DateRange {
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    },
}

impl RecordFilter<Encounter> for EncounterFilter {
    fn predicate(&self) -> Predicate {
        match self {
            EncounterFilter::Patient(id) => Predicate::eq("patient_id", *id),
            EncounterFilter::EncounterType(id) => Predicate::eq("encounter_type", *id),
            EncounterFilter::Location(id) => Predicate::eq("location_id", *id),
            EncounterFilter::Visit(id) => Predicate::eq("visit_id", *id),
            EncounterFilter::Creator(id) => Predicate::eq("creator", *id),
            EncounterFilter::DateRange { start, end } => {
                let mut bounds: Vec<Predicate> = [
                    start.map(|s| Predicate::gte("encounter_datetime", s)),
                    end.map(|e| Predicate::lte("encounter_datetime", e)),
                ]
                .into_iter()
                .flatten()
                .collect();
                match bounds.len() {
                    0 => Predicate::IsNotNull("encounter_datetime"),
                    1 => bounds.remove(0),
                    _ => Predicate::AllOf(bounds),
                }
            }
        }
    }
}

/// Accessor for encounters.
pub type EncounterAccessor<S> = EntityAccessor<Encounter, S>;

impl<S: Store + ?Sized> EntityAccessor<Encounter, S> {
    /// Active encounters for a patient.
    pub async fn list_by_patient(&self, patient_id: i64, page: Page) -> StorageResult<Vec<Encounter>> {
        self.list_by(&EncounterFilter::Patient(patient_id), Visibility::ActiveOnly, page)
            .await
    }

    /// Active encounters belonging to a visit.
    pub async fn list_by_visit(&self, visit_id: i64, page: Page) -> StorageResult<Vec<Encounter>> {
        self.list_by(&EncounterFilter::Visit(visit_id), Visibility::ActiveOnly, page)
            .await
    }

    /// Active encounters at a location.
    pub async fn list_by_location(
        &self,
        location_id: i64,
        page: Page,
    ) -> StorageResult<Vec<Encounter>> {
        self.list_by(&EncounterFilter::Location(location_id), Visibility::ActiveOnly, page)
            .await
    }

    /// Active encounters whose datetime falls within `[start, end]`.
    pub async fn list_by_date_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        page: Page,
    ) -> StorageResult<Vec<Encounter>> {
        if start > end {
            return Err(ValidationError::InvalidValue {
                field: "start".to_string(),
                message: "start must not be after end".to_string(),
            }
            .into());
        }
        let filter = EncounterFilter::DateRange {
            start: Some(start),
            end: Some(end),
        };
        self.list_by(&filter, Visibility::ActiveOnly, page).await
    }

    /// Voids an encounter.
    pub async fn void(
        &self,
        identity: &Identity,
        voided_by: i64,
        reason: Option<&str>,
    ) -> StorageResult<Option<Encounter>> {
        self.retire(identity, voided_by, reason).await
    }

    /// Reverses a void.
    pub async fn unvoid(
        &self,
        identity: &Identity,
        unvoided_by: i64,
    ) -> StorageResult<Option<Encounter>> {
        self.unretire(identity, unvoided_by).await
    }
}
