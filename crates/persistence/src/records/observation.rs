//! Observations: a single measured, coded or free-text clinical fact.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::{
    AuditContext, ChangeSet, Entity, EntityAccessor, LifecycleState, Patch, Record, RecordFilter,
    Replacement, Retirable, Store, Visibility,
};
use crate::error::{PersistenceError, StorageResult, ValidationError};
use crate::present_fields;
use crate::types::{Identity, Page, Predicate, Row, TableSpec};

/// Status assigned when a new observation does not name one.
pub const DEFAULT_STATUS: &str = "FINAL";

const OBS: TableSpec = TableSpec {
    name: "obs",
    id_column: "obs_id",
    columns: crate::columns![
        "obs_id": Integer,
        "uuid": Text,
        "person_id": Integer,
        "concept_id": Integer,
        "encounter_id": Integer,
        "order_id": Integer,
        "obs_datetime": Timestamp,
        "location_id": Integer,
        "obs_group_id": Integer,
        "accession_number": Text,
        "value_coded": Integer,
        "value_numeric": Real,
        "value_text": Text,
        "value_datetime": Timestamp,
        "comments": Text,
        "status": Text,
        "interpretation": Text,
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

/// A recorded observation about a person.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub obs_id: i64,
    pub uuid: String,
    pub person_id: i64,
    pub concept_id: i64,
    pub encounter_id: Option<i64>,
    pub order_id: Option<i64>,
    pub obs_datetime: DateTime<Utc>,
    pub location_id: Option<i64>,
    pub obs_group_id: Option<i64>,
    pub accession_number: Option<String>,
    pub value_coded: Option<i64>,
    pub value_numeric: Option<f64>,
    pub value_text: Option<String>,
    pub value_datetime: Option<DateTime<Utc>>,
    pub comments: Option<String>,
    pub status: String,
    pub interpretation: Option<String>,
    pub creator: Option<i64>,
    pub date_created: DateTime<Utc>,
    pub changed_by: Option<i64>,
    pub date_changed: Option<DateTime<Utc>>,
    pub voided: bool,
    pub voided_by: Option<i64>,
    pub date_voided: Option<DateTime<Utc>>,
    pub void_reason: Option<String>,
}

/// Payload for recording an observation.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct ObservationDraft {
    pub person_id: i64,
    pub concept_id: i64,
    #[serde(default)]
    pub encounter_id: Option<i64>,
    #[serde(default)]
    pub order_id: Option<i64>,
    #[serde(default)]
    pub obs_datetime: Option<DateTime<Utc>>,
    #[serde(default)]
    pub location_id: Option<i64>,
    #[serde(default)]
    pub obs_group_id: Option<i64>,
    #[serde(default)]
    pub accession_number: Option<String>,
    #[serde(default)]
    pub value_coded: Option<i64>,
    #[serde(default)]
    pub value_numeric: Option<f64>,
    #[serde(default)]
    pub value_text: Option<String>,
    #[serde(default)]
    pub value_datetime: Option<DateTime<Utc>>,
    #[serde(default)]
    pub comments: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub interpretation: Option<String>,
    #[serde(default)]
    pub creator: Option<i64>,
}

impl ObservationDraft {
    /// A minimal draft recording `concept_id` for `person_id`.
    pub fn new(person_id: i64, concept_id: i64) -> Self {
        Self {
            person_id,
            concept_id,
            ..Default::default()
        }
    }
}

/// Partial update of an observation.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ObservationChanges {
    pub person_id: Patch<i64>,
    pub concept_id: Patch<i64>,
    pub encounter_id: Patch<i64>,
    pub order_id: Patch<i64>,
    pub obs_datetime: Patch<DateTime<Utc>>,
    pub location_id: Patch<i64>,
    pub obs_group_id: Patch<i64>,
    pub accession_number: Patch<String>,
    pub value_coded: Patch<i64>,
    pub value_numeric: Patch<f64>,
    pub value_text: Patch<String>,
    pub value_datetime: Patch<DateTime<Utc>>,
    pub comments: Patch<String>,
    pub status: Patch<String>,
    pub interpretation: Patch<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub changed_by: Option<i64>,
}

impl ChangeSet<Observation> for ObservationChanges {
    fn present_fields(&self) -> Vec<&'static str> {
        present_fields!(self;
            person_id, concept_id, encounter_id, order_id, obs_datetime, location_id,
            obs_group_id, accession_number, value_coded, value_numeric, value_text,
            value_datetime, comments, status, interpretation,
        )
    }

    fn validate(&self) -> Result<(), ValidationError> {
        self.person_id.require_non_null(Observation::NAME, "person_id")?;
        self.concept_id.require_non_null(Observation::NAME, "concept_id")?;
        self.obs_datetime.require_non_null(Observation::NAME, "obs_datetime")?;
        self.status.require_non_null(Observation::NAME, "status")
    }

    fn apply(&self, obs: &mut Observation) {
        self.person_id.apply_required(&mut obs.person_id);
        self.concept_id.apply_required(&mut obs.concept_id);
        self.encounter_id.apply_nullable(&mut obs.encounter_id);
        self.order_id.apply_nullable(&mut obs.order_id);
        self.obs_datetime.apply_required(&mut obs.obs_datetime);
        self.location_id.apply_nullable(&mut obs.location_id);
        self.obs_group_id.apply_nullable(&mut obs.obs_group_id);
        self.accession_number.apply_nullable(&mut obs.accession_number);
        self.value_coded.apply_nullable(&mut obs.value_coded);
        self.value_numeric.apply_nullable(&mut obs.value_numeric);
        self.value_text.apply_nullable(&mut obs.value_text);
        self.value_datetime.apply_nullable(&mut obs.value_datetime);
        self.comments.apply_nullable(&mut obs.comments);
        self.status.apply_required(&mut obs.status);
        self.interpretation.apply_nullable(&mut obs.interpretation);
    }

    fn changed_by(&self) -> Option<i64> {
        self.changed_by
    }
}

fn default_status() -> String {
    DEFAULT_STATUS.to_string()
}

/// Full replacement of an observation.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ObservationReplace {
    pub person_id: i64,
    pub concept_id: i64,
    pub obs_datetime: DateTime<Utc>,
    #[serde(default)]
    pub uuid: Option<String>,
    #[serde(default)]
    pub encounter_id: Option<i64>,
    #[serde(default)]
    pub order_id: Option<i64>,
    #[serde(default)]
    pub location_id: Option<i64>,
    #[serde(default)]
    pub obs_group_id: Option<i64>,
    #[serde(default)]
    pub accession_number: Option<String>,
    #[serde(default)]
    pub value_coded: Option<i64>,
    #[serde(default)]
    pub value_numeric: Option<f64>,
    #[serde(default)]
    pub value_text: Option<String>,
    #[serde(default)]
    pub value_datetime: Option<DateTime<Utc>>,
    #[serde(default)]
    pub comments: Option<String>,
    #[serde(default = "default_status")]
    pub status: String,
    #[serde(default)]
    pub interpretation: Option<String>,
    #[serde(default)]
    pub changed_by: Option<i64>,
}

impl Replacement<Observation> for ObservationReplace {
    fn uuid(&self) -> Option<&str> {
        self.uuid.as_deref()
    }

    fn apply(&self, obs: &mut Observation) {
        obs.person_id = self.person_id;
        obs.concept_id = self.concept_id;
        obs.obs_datetime = self.obs_datetime;
        obs.encounter_id = self.encounter_id;
        obs.order_id = self.order_id;
        obs.location_id = self.location_id;
        obs.obs_group_id = self.obs_group_id;
        obs.accession_number = self.accession_number.clone();
        obs.value_coded = self.value_coded;
        obs.value_numeric = self.value_numeric;
        obs.value_text = self.value_text.clone();
        obs.value_datetime = self.value_datetime;
        obs.comments = self.comments.clone();
        obs.status = self.status.clone();
        obs.interpretation = self.interpretation.clone();
    }

    fn changed_by(&self) -> Option<i64> {
        self.changed_by
    }
}

impl Entity for Observation {
    const TABLE: &'static TableSpec = &OBS;

    fn from_row(row: &Row) -> Result<Self, PersistenceError> {
        Ok(Self {
            obs_id: row.integer("obs_id")?,
            uuid: row.text("uuid")?,
            person_id: row.integer("person_id")?,
            concept_id: row.integer("concept_id")?,
            encounter_id: row.opt_integer("encounter_id")?,
            order_id: row.opt_integer("order_id")?,
            obs_datetime: row.timestamp("obs_datetime")?,
            location_id: row.opt_integer("location_id")?,
            obs_group_id: row.opt_integer("obs_group_id")?,
            accession_number: row.opt_text("accession_number")?,
            value_coded: row.opt_integer("value_coded")?,
            value_numeric: row.opt_real("value_numeric")?,
            value_text: row.opt_text("value_text")?,
            value_datetime: row.opt_timestamp("value_datetime")?,
            comments: row.opt_text("comments")?,
            status: row.text("status")?,
            interpretation: row.opt_text("interpretation")?,
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

impl Record for Observation {
    const NAME: &'static str = "Observation";
    const LIFECYCLE_COLUMN: Option<&'static str> = Some("voided");

    type Draft = ObservationDraft;
    type Changes = ObservationChanges;
    type Replacement = ObservationReplace;

    fn id(&self) -> i64 {
        self.obs_id
    }

    fn uuid(&self) -> &str {
        &self.uuid
    }

    fn to_row(&self) -> Row {
        Row::new()
            .with("uuid", self.uuid.as_str())
            .with("person_id", self.person_id)
            .with("concept_id", self.concept_id)
            .with("encounter_id", self.encounter_id)
            .with("order_id", self.order_id)
            .with("obs_datetime", self.obs_datetime)
            .with("location_id", self.location_id)
            .with("obs_group_id", self.obs_group_id)
            .with("accession_number", self.accession_number.clone())
            .with("value_coded", self.value_coded)
            .with("value_numeric", self.value_numeric)
            .with("value_text", self.value_text.clone())
            .with("value_datetime", self.value_datetime)
            .with("comments", self.comments.clone())
            .with("status", self.status.as_str())
            .with("interpretation", self.interpretation.clone())
            .with("creator", self.creator)
            .with("date_created", self.date_created)
            .with("changed_by", self.changed_by)
            .with("date_changed", self.date_changed)
            .with("voided", self.voided)
            .with("voided_by", self.voided_by)
            .with("date_voided", self.date_voided)
            .with("void_reason", self.void_reason.clone())
    }

    fn draft_row(draft: ObservationDraft, uuid: &str, created_at: DateTime<Utc>) -> Row {
        Row::new()
            .with("uuid", uuid)
            .with("person_id", draft.person_id)
            .with("concept_id", draft.concept_id)
            .with("encounter_id", draft.encounter_id)
            .with("order_id", draft.order_id)
            .with("obs_datetime", draft.obs_datetime.unwrap_or(created_at))
            .with("location_id", draft.location_id)
            .with("obs_group_id", draft.obs_group_id)
            .with("accession_number", draft.accession_number)
            .with("value_coded", draft.value_coded)
            .with("value_numeric", draft.value_numeric)
            .with("value_text", draft.value_text)
            .with("value_datetime", draft.value_datetime)
            .with("comments", draft.comments)
            .with("status", draft.status.unwrap_or_else(default_status))
            .with("interpretation", draft.interpretation)
            .with("creator", draft.creator)
            .with("date_created", created_at)
            .with("voided", false)
    }

    fn apply_defaults(draft: &mut ObservationDraft) {
        draft.status.get_or_insert_with(default_status);
    }

    fn stamp_audit(&mut self, audit: &AuditContext) {
        if audit.changed_by.is_some() {
            self.changed_by = audit.changed_by;
        }
        self.date_changed = Some(audit.at);
    }
}

impl Retirable for Observation {
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

/// Which value column an observation carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    Coded,
    Numeric,
    Text,
    Datetime,
}

impl ValueType {
    fn column(self) -> &'static str {
        match self {
            ValueType::Coded => "value_coded",
            ValueType::Numeric => "value_numeric",
            ValueType::Text => "value_text",
            ValueType::Datetime => "value_datetime",
        }
    }
}

impl FromStr for ValueType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "coded" => Ok(ValueType::Coded),
            "numeric" => Ok(ValueType::Numeric),
            "text" => Ok(ValueType::Text),
            "datetime" => Ok(ValueType::Datetime),
            _ => Err(ValidationError::InvalidValue {
                field: "value_type".to_string(),
                message: format!("unknown value type '{s}'"),
            }),
        }
    }
}

/// Scoped observation listings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObservationFilter {
    Person(i64),
    Encounter(i64),
    Concept(i64),
    Order(i64),
    Location(i64),
    Status(String),
    ValueType(ValueType),
}

impl RecordFilter<Observation> for ObservationFilter {
    fn predicate(&self) -> Predicate {
        match self {
            ObservationFilter::Person(id) => Predicate::eq("person_id", *id),
            ObservationFilter::Encounter(id) => Predicate::eq("encounter_id", *id),
            ObservationFilter::Concept(id) => Predicate::eq("concept_id", *id),
            ObservationFilter::Order(id) => Predicate::eq("order_id", *id),
            ObservationFilter::Location(id) => Predicate::eq("location_id", *id),
            ObservationFilter::Status(status) => Predicate::eq("status", status.as_str()),
            ObservationFilter::ValueType(kind) => Predicate::IsNotNull(kind.column()),
        }
    }
}

/// Accessor for observations.
pub type ObservationAccessor<S> = EntityAccessor<Observation, S>;

impl<S: Store + ?Sized> EntityAccessor<Observation, S> {
    /// Active observations about a person.
    pub async fn list_by_person(
        &self,
        person_id: i64,
        page: Page,
    ) -> StorageResult<Vec<Observation>> {
        self.list_by(&ObservationFilter::Person(person_id), Visibility::ActiveOnly, page)
            .await
    }

    /// Active observations recorded during an encounter.
    pub async fn list_by_encounter(
        &self,
        encounter_id: i64,
        page: Page,
    ) -> StorageResult<Vec<Observation>> {
        self.list_by(
            &ObservationFilter::Encounter(encounter_id),
            Visibility::ActiveOnly,
            page,
        )
        .await
    }

    /// Active observations of a concept.
    pub async fn list_by_concept(
        &self,
        concept_id: i64,
        page: Page,
    ) -> StorageResult<Vec<Observation>> {
        self.list_by(&ObservationFilter::Concept(concept_id), Visibility::ActiveOnly, page)
            .await
    }

    /// Active observations resulting from an order.
    pub async fn list_by_order(&self, order_id: i64, page: Page) -> StorageResult<Vec<Observation>> {
        self.list_by(&ObservationFilter::Order(order_id), Visibility::ActiveOnly, page)
            .await
    }

    /// Active observations carrying a value of the named type
    /// (`coded`, `numeric`, `text` or `datetime`). Unknown types match nothing.
    pub async fn list_by_value_type(
        &self,
        value_type: &str,
        page: Page,
    ) -> StorageResult<Vec<Observation>> {
        match value_type.parse::<ValueType>() {
            Ok(kind) => {
                self.list_by(&ObservationFilter::ValueType(kind), Visibility::ActiveOnly, page)
                    .await
            }
            Err(_) => Ok(Vec::new()),
        }
    }

    /// Voids an observation.
    pub async fn void(
        &self,
        identity: &Identity,
        voided_by: i64,
        reason: Option<&str>,
    ) -> StorageResult<Option<Observation>> {
        self.retire(identity, voided_by, reason).await
    }

    /// Reverses a void.
    pub async fn unvoid(
        &self,
        identity: &Identity,
        unvoided_by: i64,
    ) -> StorageResult<Option<Observation>> {
        self.unretire(identity, unvoided_by).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_type_parsing() {
        assert_eq!("Coded".parse::<ValueType>().unwrap(), ValueType::Coded);
        assert_eq!("numeric".parse::<ValueType>().unwrap(), ValueType::Numeric);
        assert!("boolean".parse::<ValueType>().is_err());
    }

    #[test]
    fn test_value_type_filter_checks_value_column() {
        assert_eq!(
            ObservationFilter::ValueType(ValueType::Text).predicate(),
            Predicate::IsNotNull("value_text")
        );
    }

    #[test]
    fn test_status_default_applied() {
        let mut draft = ObservationDraft::new(9, 5089);
        Observation::apply_defaults(&mut draft);
        assert_eq!(draft.status.as_deref(), Some(DEFAULT_STATUS));
    }

    #[test]
    fn test_clearing_numeric_value() {
        let changes: ObservationChanges =
            serde_json::from_str(r#"{"value_numeric": null, "comments": "re-measured"}"#).unwrap();
        assert!(changes.validate().is_ok());
        assert_eq!(changes.present_fields(), vec!["value_numeric", "comments"]);
    }
}
