//! Drugs: dispensable formulations of a concept.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::visit_type::require_name;
use crate::core::{
    AuditContext, ChangeSet, Entity, EntityAccessor, LifecycleState, Patch, Record, RecordFilter,
    Replacement, Retirable, Store, Visibility,
};
use crate::error::{PersistenceError, StorageResult, ValidationError};
use crate::present_fields;
use crate::types::{Page, Predicate, Row, SortDirection, SortKey, TableSpec};

const DRUG: TableSpec = TableSpec {
    name: "drug",
    id_column: "drug_id",
    columns: crate::columns![
        "drug_id": Integer,
        "uuid": Text,
        "concept_id": Integer,
        "name": Text,
        "combination": Bool,
        "dosage_form": Integer,
        "maximum_daily_dose": Real,
        "minimum_daily_dose": Real,
        "route": Integer,
        "strength": Text,
        "dose_limit_units": Integer,
        "creator": Integer,
        "date_created": Timestamp,
        "changed_by": Integer,
        "date_changed": Timestamp,
        "retired": Bool,
        "retired_by": Integer,
        "date_retired": Timestamp,
        "retire_reason": Text,
    ],
};

/// A drug. `dosage_form`, `route` and `dose_limit_units` are concept ids.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Drug {
    pub drug_id: i64,
    pub uuid: String,
    pub concept_id: i64,
    pub name: String,
    pub combination: bool,
    pub dosage_form: Option<i64>,
    pub maximum_daily_dose: Option<f64>,
    pub minimum_daily_dose: Option<f64>,
    pub route: Option<i64>,
    pub strength: Option<String>,
    pub dose_limit_units: Option<i64>,
    pub creator: i64,
    pub date_created: DateTime<Utc>,
    pub changed_by: Option<i64>,
    pub date_changed: Option<DateTime<Utc>>,
    pub retired: bool,
    pub retired_by: Option<i64>,
    pub date_retired: Option<DateTime<Utc>>,
    pub retire_reason: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct DrugDraft {
    pub concept_id: i64,
    pub name: String,
    pub creator: i64,
    #[serde(default)]
    pub combination: Option<bool>,
    #[serde(default)]
    pub dosage_form: Option<i64>,
    #[serde(default)]
    pub maximum_daily_dose: Option<f64>,
    #[serde(default)]
    pub minimum_daily_dose: Option<f64>,
    #[serde(default)]
    pub route: Option<i64>,
    #[serde(default)]
    pub strength: Option<String>,
    #[serde(default)]
    pub dose_limit_units: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct DrugChanges {
    pub concept_id: Patch<i64>,
    pub name: Patch<String>,
    pub combination: Patch<bool>,
    pub dosage_form: Patch<i64>,
    pub maximum_daily_dose: Patch<f64>,
    pub minimum_daily_dose: Patch<f64>,
    pub route: Patch<i64>,
    pub strength: Patch<String>,
    pub dose_limit_units: Patch<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub changed_by: Option<i64>,
}

impl ChangeSet<Drug> for DrugChanges {
    fn present_fields(&self) -> Vec<&'static str> {
        present_fields!(self;
            concept_id, name, combination, dosage_form, maximum_daily_dose, minimum_daily_dose,
            route, strength, dose_limit_units,
        )
    }

    fn validate(&self) -> Result<(), ValidationError> {
        self.concept_id.require_non_null(Drug::NAME, "concept_id")?;
        self.name.require_non_null(Drug::NAME, "name")?;
        self.combination.require_non_null(Drug::NAME, "combination")
    }

    fn apply(&self, drug: &mut Drug) {
        self.concept_id.apply_required(&mut drug.concept_id);
        self.name.apply_required(&mut drug.name);
        self.combination.apply_required(&mut drug.combination);
        self.dosage_form.apply_nullable(&mut drug.dosage_form);
        self.maximum_daily_dose
            .apply_nullable(&mut drug.maximum_daily_dose);
        self.minimum_daily_dose
            .apply_nullable(&mut drug.minimum_daily_dose);
        self.route.apply_nullable(&mut drug.route);
        self.strength.apply_nullable(&mut drug.strength);
        self.dose_limit_units.apply_nullable(&mut drug.dose_limit_units);
    }

    fn changed_by(&self) -> Option<i64> {
        self.changed_by
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DrugReplace {
    pub concept_id: i64,
    pub name: String,
    #[serde(default)]
    pub uuid: Option<String>,
    #[serde(default)]
    pub combination: bool,
    #[serde(default)]
    pub dosage_form: Option<i64>,
    #[serde(default)]
    pub maximum_daily_dose: Option<f64>,
    #[serde(default)]
    pub minimum_daily_dose: Option<f64>,
    #[serde(default)]
    pub route: Option<i64>,
    #[serde(default)]
    pub strength: Option<String>,
    #[serde(default)]
    pub dose_limit_units: Option<i64>,
    #[serde(default)]
    pub changed_by: Option<i64>,
}

impl Replacement<Drug> for DrugReplace {
    fn validate(&self) -> Result<(), ValidationError> {
        require_name(&self.name)?;
        if let (Some(min), Some(max)) = (self.minimum_daily_dose, self.maximum_daily_dose)
            && min > max
        {
            return Err(ValidationError::InvalidValue {
                field: "minimum_daily_dose".to_string(),
                message: "must not exceed maximum_daily_dose".to_string(),
            });
        }
        Ok(())
    }

    fn uuid(&self) -> Option<&str> {
        self.uuid.as_deref()
    }

    fn apply(&self, drug: &mut Drug) {
        drug.concept_id = self.concept_id;
        drug.name = self.name.clone();
        drug.combination = self.combination;
        drug.dosage_form = self.dosage_form;
        drug.maximum_daily_dose = self.maximum_daily_dose;
        drug.minimum_daily_dose = self.minimum_daily_dose;
        drug.route = self.route;
        drug.strength = self.strength.clone();
        drug.dose_limit_units = self.dose_limit_units;
    }

    fn changed_by(&self) -> Option<i64> {
        self.changed_by
    }
}

impl Entity for Drug {
    const TABLE: &'static TableSpec = &DRUG;

    fn from_row(row: &Row) -> Result<Self, PersistenceError> {
        Ok(Self {
            drug_id: row.integer("drug_id")?,
            uuid: row.text("uuid")?,
            concept_id: row.integer("concept_id")?,
            name: row.text("name")?,
            combination: row.bool("combination")?,
            dosage_form: row.opt_integer("dosage_form")?,
            maximum_daily_dose: row.opt_real("maximum_daily_dose")?,
            minimum_daily_dose: row.opt_real("minimum_daily_dose")?,
            route: row.opt_integer("route")?,
            strength: row.opt_text("strength")?,
            dose_limit_units: row.opt_integer("dose_limit_units")?,
            creator: row.integer("creator")?,
            date_created: row.timestamp("date_created")?,
            changed_by: row.opt_integer("changed_by")?,
            date_changed: row.opt_timestamp("date_changed")?,
            retired: row.bool("retired")?,
            retired_by: row.opt_integer("retired_by")?,
            date_retired: row.opt_timestamp("date_retired")?,
            retire_reason: row.opt_text("retire_reason")?,
        })
    }
}

impl Record for Drug {
    const NAME: &'static str = "Drug";
    const LIFECYCLE_COLUMN: Option<&'static str> = Some("retired");

    type Draft = DrugDraft;
    type Changes = DrugChanges;
    type Replacement = DrugReplace;

    fn id(&self) -> i64 {
        self.drug_id
    }

    fn uuid(&self) -> &str {
        &self.uuid
    }

    fn to_row(&self) -> Row {
        Row::new()
            .with("uuid", self.uuid.as_str())
            .with("concept_id", self.concept_id)
            .with("name", self.name.as_str())
            .with("combination", self.combination)
            .with("dosage_form", self.dosage_form)
            .with("maximum_daily_dose", self.maximum_daily_dose)
            .with("minimum_daily_dose", self.minimum_daily_dose)
            .with("route", self.route)
            .with("strength", self.strength.clone())
            .with("dose_limit_units", self.dose_limit_units)
            .with("creator", self.creator)
            .with("date_created", self.date_created)
            .with("changed_by", self.changed_by)
            .with("date_changed", self.date_changed)
            .with("retired", self.retired)
            .with("retired_by", self.retired_by)
            .with("date_retired", self.date_retired)
            .with("retire_reason", self.retire_reason.clone())
    }

    fn draft_row(draft: DrugDraft, uuid: &str, created_at: DateTime<Utc>) -> Row {
        Row::new()
            .with("uuid", uuid)
            .with("concept_id", draft.concept_id)
            .with("name", draft.name)
            .with("combination", draft.combination.unwrap_or(false))
            .with("dosage_form", draft.dosage_form)
            .with("maximum_daily_dose", draft.maximum_daily_dose)
            .with("minimum_daily_dose", draft.minimum_daily_dose)
            .with("route", draft.route)
            .with("strength", draft.strength)
            .with("dose_limit_units", draft.dose_limit_units)
            .with("creator", draft.creator)
            .with("date_created", created_at)
            .with("retired", false)
    }

    fn apply_defaults(draft: &mut DrugDraft) {
        draft.combination.get_or_insert(false);
    }

    fn stamp_audit(&mut self, audit: &AuditContext) {
        if audit.changed_by.is_some() {
            self.changed_by = audit.changed_by;
        }
        self.date_changed = Some(audit.at);
    }
}

impl Retirable for Drug {
    fn state(&self) -> LifecycleState {
        if self.retired {
            LifecycleState::Retired
        } else {
            LifecycleState::Active
        }
    }

    fn mark_retired(&mut self, by: i64, at: DateTime<Utc>, reason: Option<&str>) {
        self.retired = true;
        self.retired_by = Some(by);
        self.date_retired = Some(at);
        if let Some(reason) = reason {
            self.retire_reason = Some(reason.to_string());
        }
    }

    fn clear_retired(&mut self) {
        self.retired = false;
        self.retired_by = None;
        self.date_retired = None;
        self.retire_reason = None;
    }
}

/// Scoped drug listings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DrugFilter {
    Concept(i64),
    Creator(i64),
    /// Substring of the name, listed in name order.
    NameContains(String),
}

impl RecordFilter<Drug> for DrugFilter {
    fn predicate(&self) -> Predicate {
        match self {
            DrugFilter::Concept(id) => Predicate::eq("concept_id", *id),
            DrugFilter::Creator(id) => Predicate::eq("creator", *id),
            DrugFilter::NameContains(term) => Predicate::Contains("name", term.clone()),
        }
    }

    fn order(&self) -> Vec<SortKey> {
        match self {
            DrugFilter::NameContains(_) => vec![SortKey {
                column: "name",
                direction: SortDirection::Ascending,
            }],
            _ => Vec::new(),
        }
    }
}

pub type DrugAccessor<S> = EntityAccessor<Drug, S>;

impl<S: Store + ?Sized> EntityAccessor<Drug, S> {
    /// Active drugs whose name contains `term`.
    pub async fn search_by_name(&self, term: &str, page: Page) -> StorageResult<Vec<Drug>> {
        self.list_by(
            &DrugFilter::NameContains(term.to_string()),
            Visibility::ActiveOnly,
            page,
        )
        .await
    }

    /// Active drugs formulating a concept.
    pub async fn list_by_concept(&self, concept_id: i64, page: Page) -> StorageResult<Vec<Drug>> {
        self.list_by(&DrugFilter::Concept(concept_id), Visibility::ActiveOnly, page)
            .await
    }
}
