//! Visit types, such as `OPD` or `IPD`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::{
    AuditContext, ChangeSet, Entity, EntityAccessor, LifecycleState, Patch, Record, RecordFilter,
    Replacement, Retirable, Store, Visibility,
};
use crate::error::{PersistenceError, StorageResult, ValidationError};
use crate::present_fields;
use crate::types::{Page, Predicate, Row, SortDirection, SortKey, TableSpec};

const VISIT_TYPE: TableSpec = TableSpec {
    name: "visit_type",
    id_column: "visit_type_id",
    columns: crate::columns![
        "visit_type_id": Integer,
        "uuid": Text,
        "name": Text,
        "description": Text,
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

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisitType {
    pub visit_type_id: i64,
    pub uuid: String,
    pub name: String,
    pub description: Option<String>,
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
pub struct VisitTypeDraft {
    pub name: String,
    pub creator: i64,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct VisitTypeChanges {
    pub name: Patch<String>,
    pub description: Patch<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub changed_by: Option<i64>,
}

impl ChangeSet<VisitType> for VisitTypeChanges {
    fn present_fields(&self) -> Vec<&'static str> {
        present_fields!(self; name, description,)
    }

    fn validate(&self) -> Result<(), ValidationError> {
        self.name.require_non_null(VisitType::NAME, "name")
    }

    fn apply(&self, visit_type: &mut VisitType) {
        self.name.apply_required(&mut visit_type.name);
        self.description.apply_nullable(&mut visit_type.description);
    }

    fn changed_by(&self) -> Option<i64> {
        self.changed_by
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct VisitTypeReplace {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub uuid: Option<String>,
    #[serde(default)]
    pub changed_by: Option<i64>,
}

impl Replacement<VisitType> for VisitTypeReplace {
    fn validate(&self) -> Result<(), ValidationError> {
        require_name(&self.name)
    }

    fn uuid(&self) -> Option<&str> {
        self.uuid.as_deref()
    }

    fn apply(&self, visit_type: &mut VisitType) {
        visit_type.name = self.name.clone();
        visit_type.description = Some(self.description.clone());
    }

    fn changed_by(&self) -> Option<i64> {
        self.changed_by
    }
}

pub(super) fn require_name(name: &str) -> Result<(), ValidationError> {
    if name.trim().is_empty() {
        return Err(ValidationError::InvalidValue {
            field: "name".to_string(),
            message: "must not be empty".to_string(),
        });
    }
    Ok(())
}

impl Entity for VisitType {
    const TABLE: &'static TableSpec = &VISIT_TYPE;

    fn from_row(row: &Row) -> Result<Self, PersistenceError> {
        Ok(Self {
            visit_type_id: row.integer("visit_type_id")?,
            uuid: row.text("uuid")?,
            name: row.text("name")?,
            description: row.opt_text("description")?,
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

impl Record for VisitType {
    const NAME: &'static str = "VisitType";
    const LIFECYCLE_COLUMN: Option<&'static str> = Some("retired");

    type Draft = VisitTypeDraft;
    type Changes = VisitTypeChanges;
    type Replacement = VisitTypeReplace;

    fn id(&self) -> i64 {
        self.visit_type_id
    }

    fn uuid(&self) -> &str {
        &self.uuid
    }

    fn to_row(&self) -> Row {
        Row::new()
            .with("uuid", self.uuid.as_str())
            .with("name", self.name.as_str())
            .with("description", self.description.clone())
            .with("creator", self.creator)
            .with("date_created", self.date_created)
            .with("changed_by", self.changed_by)
            .with("date_changed", self.date_changed)
            .with("retired", self.retired)
            .with("retired_by", self.retired_by)
            .with("date_retired", self.date_retired)
            .with("retire_reason", self.retire_reason.clone())
    }

    fn draft_row(draft: VisitTypeDraft, uuid: &str, created_at: DateTime<Utc>) -> Row {
        Row::new()
            .with("uuid", uuid)
            .with("name", draft.name)
            .with("description", draft.description)
            .with("creator", draft.creator)
            .with("date_created", created_at)
            .with("retired", false)
    }

    fn stamp_audit(&mut self, audit: &AuditContext) {
        if audit.changed_by.is_some() {
            self.changed_by = audit.changed_by;
        }
        self.date_changed = Some(audit.at);
    }
}

impl Retirable for VisitType {
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

/// Scoped visit type listings, in name order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VisitTypeFilter {
    Creator(i64),
    /// Substring of the name or the description.
    NameContains(String),
}

impl RecordFilter<VisitType> for VisitTypeFilter {
    fn predicate(&self) -> Predicate {
        match self {
            VisitTypeFilter::Creator(id) => Predicate::eq("creator", *id),
            VisitTypeFilter::NameContains(term) => Predicate::AnyOf(vec![
                Predicate::Contains("name", term.clone()),
                Predicate::Contains("description", term.clone()),
            ]),
        }
    }

    fn order(&self) -> Vec<SortKey> {
        vec![SortKey {
            column: "name",
            direction: SortDirection::Ascending,
        }]
    }
}

pub type VisitTypeAccessor<S> = EntityAccessor<VisitType, S>;

impl<S: Store + ?Sized> EntityAccessor<VisitType, S> {
    /// Looks up an active visit type by exact name.
    pub async fn fetch_by_name(&self, name: &str) -> StorageResult<Option<VisitType>> {
        self.fetch_where(Predicate::AllOf(vec![
            Predicate::eq("name", name),
            Predicate::eq("retired", false),
        ]))
        .await
    }

    /// Active visit types whose name or description contains `term`.
    pub async fn search(&self, term: &str, page: Page) -> StorageResult<Vec<VisitType>> {
        self.list_by(
            &VisitTypeFilter::NameContains(term.to_string()),
            Visibility::ActiveOnly,
            page,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_name_is_rejected() {
        let replace = VisitTypeReplace {
            name: "  ".to_string(),
            description: "Outpatient".to_string(),
            uuid: None,
            changed_by: None,
        };
        assert!(replace.validate().is_err());
    }

    #[test]
    fn test_changes_reject_null_name() {
        let changes: VisitTypeChanges = serde_json::from_str(r#"{"name": null}"#).unwrap();
        assert!(changes.validate().is_err());
    }
}
