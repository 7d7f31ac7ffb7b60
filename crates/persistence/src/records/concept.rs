//! Concepts: the coded vocabulary every order and observation refers to.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::{
    AuditContext, ChangeSet, Entity, EntityAccessor, LifecycleState, Patch, Record, RecordFilter,
    Replacement, Retirable, Store, Visibility,
};
use crate::error::{PersistenceError, StorageResult, ValidationError};
use crate::present_fields;
use crate::types::{Page, Predicate, Row, TableSpec};

const CONCEPT: TableSpec = TableSpec {
    name: "concept",
    id_column: "concept_id",
    columns: crate::columns![
        "concept_id": Integer,
        "uuid": Text,
        "short_name": Text,
        "description": Text,
        "form_text": Text,
        "datatype_id": Integer,
        "class_id": Integer,
        "is_set": Bool,
        "version": Text,
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

/// A dictionary concept.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Concept {
    pub concept_id: i64,
    pub uuid: String,
    pub short_name: Option<String>,
    pub description: Option<String>,
    pub form_text: Option<String>,
    pub datatype_id: Option<i64>,
    pub class_id: Option<i64>,
    pub is_set: bool,
    pub version: Option<String>,
    pub creator: i64,
    pub date_created: DateTime<Utc>,
    pub changed_by: Option<i64>,
    pub date_changed: Option<DateTime<Utc>>,
    pub retired: bool,
    pub retired_by: Option<i64>,
    pub date_retired: Option<DateTime<Utc>>,
    pub retire_reason: Option<String>,
}

/// Payload for creating a concept.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct ConceptDraft {
    pub creator: i64,
    #[serde(default)]
    pub short_name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub form_text: Option<String>,
    #[serde(default)]
    pub datatype_id: Option<i64>,
    #[serde(default)]
    pub class_id: Option<i64>,
    #[serde(default)]
    pub is_set: Option<bool>,
    #[serde(default)]
    pub version: Option<String>,
}

/// Partial update of a concept.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConceptChanges {
    pub short_name: Patch<String>,
    pub description: Patch<String>,
    pub form_text: Patch<String>,
    pub datatype_id: Patch<i64>,
    pub class_id: Patch<i64>,
    pub is_set: Patch<bool>,
    pub version: Patch<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub changed_by: Option<i64>,
}

impl ChangeSet<Concept> for ConceptChanges {
    fn present_fields(&self) -> Vec<&'static str> {
        present_fields!(self;
            short_name, description, form_text, datatype_id, class_id, is_set, version,
        )
    }

    fn validate(&self) -> Result<(), ValidationError> {
        self.is_set.require_non_null(Concept::NAME, "is_set")
    }

    fn apply(&self, concept: &mut Concept) {
        self.short_name.apply_nullable(&mut concept.short_name);
        self.description.apply_nullable(&mut concept.description);
        self.form_text.apply_nullable(&mut concept.form_text);
        self.datatype_id.apply_nullable(&mut concept.datatype_id);
        self.class_id.apply_nullable(&mut concept.class_id);
        self.is_set.apply_required(&mut concept.is_set);
        self.version.apply_nullable(&mut concept.version);
    }

    fn changed_by(&self) -> Option<i64> {
        self.changed_by
    }
}

/// Full replacement of a concept.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ConceptReplace {
    pub short_name: String,
    pub description: String,
    pub datatype_id: i64,
    pub class_id: i64,
    #[serde(default)]
    pub uuid: Option<String>,
    #[serde(default)]
    pub form_text: Option<String>,
    #[serde(default)]
    pub is_set: bool,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub changed_by: Option<i64>,
}

impl Replacement<Concept> for ConceptReplace {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.short_name.trim().is_empty() {
            return Err(ValidationError::InvalidValue {
                field: "short_name".to_string(),
                message: "must not be empty".to_string(),
            });
        }
        Ok(())
    }

    fn uuid(&self) -> Option<&str> {
        self.uuid.as_deref()
    }

    fn apply(&self, concept: &mut Concept) {
        concept.short_name = Some(self.short_name.clone());
        concept.description = Some(self.description.clone());
        concept.datatype_id = Some(self.datatype_id);
        concept.class_id = Some(self.class_id);
        concept.form_text = self.form_text.clone();
        concept.is_set = self.is_set;
        concept.version = self.version.clone();
    }

    fn changed_by(&self) -> Option<i64> {
        self.changed_by
    }
}

impl Entity for Concept {
    const TABLE: &'static TableSpec = &CONCEPT;

    fn from_row(row: &Row) -> Result<Self, PersistenceError> {
        Ok(Self {
            concept_id: row.integer("concept_id")?,
            uuid: row.text("uuid")?,
            short_name: row.opt_text("short_name")?,
            description: row.opt_text("description")?,
            form_text: row.opt_text("form_text")?,
            datatype_id: row.opt_integer("datatype_id")?,
            class_id: row.opt_integer("class_id")?,
            is_set: row.bool("is_set")?,
            version: row.opt_text("version")?,
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

impl Record for Concept {
    const NAME: &'static str = "Concept";
    const LIFECYCLE_COLUMN: Option<&'static str> = Some("retired");

    type Draft = ConceptDraft;
    type Changes = ConceptChanges;
    type Replacement = ConceptReplace;

    fn id(&self) -> i64 {
        self.concept_id
    }

    fn uuid(&self) -> &str {
        &self.uuid
    }

    fn to_row(&self) -> Row {
        Row::new()
            .with("uuid", self.uuid.as_str())
            .with("short_name", self.short_name.clone())
            .with("description", self.description.clone())
            .with("form_text", self.form_text.clone())
            .with("datatype_id", self.datatype_id)
            .with("class_id", self.class_id)
            .with("is_set", self.is_set)
            .with("version", self.version.clone())
            .with("creator", self.creator)
            .with("date_created", self.date_created)
            .with("changed_by", self.changed_by)
            .with("date_changed", self.date_changed)
            .with("retired", self.retired)
            .with("retired_by", self.retired_by)
            .with("date_retired", self.date_retired)
            .with("retire_reason", self.retire_reason.clone())
    }

    fn draft_row(draft: ConceptDraft, uuid: &str, created_at: DateTime<Utc>) -> Row {
        Row::new()
            .with("uuid", uuid)
            .with("short_name", draft.short_name)
            .with("description", draft.description)
            .with("form_text", draft.form_text)
            .with("datatype_id", draft.datatype_id)
            .with("class_id", draft.class_id)
            .with("is_set", draft.is_set.unwrap_or(false))
            .with("version", draft.version)
            .with("creator", draft.creator)
            .with("date_created", created_at)
            .with("retired", false)
    }

    fn apply_defaults(draft: &mut ConceptDraft) {
        draft.is_set.get_or_insert(false);
    }

    fn stamp_audit(&mut self, audit: &AuditContext) {
        if audit.changed_by.is_some() {
            self.changed_by = audit.changed_by;
        }
        self.date_changed = Some(audit.at);
    }
}

impl Retirable for Concept {
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

/// Scoped concept listings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConceptFilter {
    Datatype(i64),
    Class(i64),
    Creator(i64),
    /// Substring of the short name or the description.
    NameContains(String),
}

impl RecordFilter<Concept> for ConceptFilter {
    fn predicate(&self) -> Predicate {
        match self {
            ConceptFilter::Datatype(id) => Predicate::eq("datatype_id", *id),
            ConceptFilter::Class(id) => Predicate::eq("class_id", *id),
            ConceptFilter::Creator(id) => Predicate::eq("creator", *id),
            ConceptFilter::NameContains(term) => Predicate::AnyOf(vec![
                Predicate::Contains("short_name", term.clone()),
                Predicate::Contains("description", term.clone()),
            ]),
        }
    }
}

/// Accessor for concepts.
pub type ConceptAccessor<S> = EntityAccessor<Concept, S>;

impl<S: Store + ?Sized> EntityAccessor<Concept, S> {
    /// Looks up a concept by exact short name.
    pub async fn fetch_by_name(&self, short_name: &str) -> StorageResult<Option<Concept>> {
        self.fetch_where(Predicate::eq("short_name", short_name)).await
    }

    /// Active concepts whose short name or description contains `term`.
    pub async fn search_by_name(&self, term: &str, page: Page) -> StorageResult<Vec<Concept>> {
        self.list_by(
            &ConceptFilter::NameContains(term.to_string()),
            Visibility::ActiveOnly,
            page,
        )
        .await
    }

    /// Active concepts of a datatype.
    pub async fn list_by_datatype(&self, datatype_id: i64, page: Page) -> StorageResult<Vec<Concept>> {
        self.list_by(&ConceptFilter::Datatype(datatype_id), Visibility::ActiveOnly, page)
            .await
    }

    /// Active concepts of a class.
    pub async fn list_by_class(&self, class_id: i64, page: Page) -> StorageResult<Vec<Concept>> {
        self.list_by(&ConceptFilter::Class(class_id), Visibility::ActiveOnly, page)
            .await
    }
}
