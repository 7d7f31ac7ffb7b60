//! Order types, organised as a tree through `parent`.

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

const ORDER_TYPE: TableSpec = TableSpec {
    name: "order_type",
    id_column: "order_type_id",
    columns: crate::columns![
        "order_type_id": Integer,
        "uuid": Text,
        "name": Text,
        "description": Text,
        "java_class_name": Text,
        "parent": Integer,
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

/// A kind of order, such as `Drug Order` or `Lab Order`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderType {
    pub order_type_id: i64,
    pub uuid: String,
    pub name: String,
    pub description: Option<String>,
    /// Class handling orders of this type in the upstream EMR.
    pub java_class_name: Option<String>,
    pub parent: Option<i64>,
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
pub struct OrderTypeDraft {
    pub name: String,
    pub creator: i64,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub java_class_name: Option<String>,
    #[serde(default)]
    pub parent: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct OrderTypeChanges {
    pub name: Patch<String>,
    pub description: Patch<String>,
    pub java_class_name: Patch<String>,
    pub parent: Patch<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub changed_by: Option<i64>,
}

impl ChangeSet<OrderType> for OrderTypeChanges {
    fn present_fields(&self) -> Vec<&'static str> {
        present_fields!(self; name, description, java_class_name, parent,)
    }

    fn validate(&self) -> Result<(), ValidationError> {
        self.name.require_non_null(OrderType::NAME, "name")
    }

    fn apply(&self, order_type: &mut OrderType) {
        self.name.apply_required(&mut order_type.name);
        self.description.apply_nullable(&mut order_type.description);
        self.java_class_name
            .apply_nullable(&mut order_type.java_class_name);
        self.parent.apply_nullable(&mut order_type.parent);
    }

    fn changed_by(&self) -> Option<i64> {
        self.changed_by
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct OrderTypeReplace {
    pub name: String,
    pub description: String,
    pub java_class_name: String,
    pub parent: i64,
    #[serde(default)]
    pub uuid: Option<String>,
    #[serde(default)]
    pub changed_by: Option<i64>,
}

impl Replacement<OrderType> for OrderTypeReplace {
    fn validate(&self) -> Result<(), ValidationError> {
        require_name(&self.name)
    }

    fn uuid(&self) -> Option<&str> {
        self.uuid.as_deref()
    }

    fn apply(&self, order_type: &mut OrderType) {
        order_type.name = self.name.clone();
        order_type.description = Some(self.description.clone());
        order_type.java_class_name = Some(self.java_class_name.clone());
        order_type.parent = Some(self.parent);
    }

    fn changed_by(&self) -> Option<i64> {
        self.changed_by
    }
}

impl Entity for OrderType {
    const TABLE: &'static TableSpec = &ORDER_TYPE;

    fn from_row(row: &Row) -> Result<Self, PersistenceError> {
        Ok(Self {
            order_type_id: row.integer("order_type_id")?,
            uuid: row.text("uuid")?,
            name: row.text("name")?,
            description: row.opt_text("description")?,
            java_class_name: row.opt_text("java_class_name")?,
            parent: row.opt_integer("parent")?,
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

impl Record for OrderType {
    const NAME: &'static str = "OrderType";
    const LIFECYCLE_COLUMN: Option<&'static str> = Some("retired");

    type Draft = OrderTypeDraft;
    type Changes = OrderTypeChanges;
    type Replacement = OrderTypeReplace;

    fn id(&self) -> i64 {
        self.order_type_id
    }

    fn uuid(&self) -> &str {
        &self.uuid
    }

    fn to_row(&self) -> Row {
        Row::new()
            .with("uuid", self.uuid.as_str())
            .with("name", self.name.as_str())
            .with("description", self.description.clone())
            .with("java_class_name", self.java_class_name.clone())
            .with("parent", self.parent)
            .with("creator", self.creator)
            .with("date_created", self.date_created)
            .with("changed_by", self.changed_by)
            .with("date_changed", self.date_changed)
            .with("retired", self.retired)
            .with("retired_by", self.retired_by)
            .with("date_retired", self.date_retired)
            .with("retire_reason", self.retire_reason.clone())
    }

    fn draft_row(draft: OrderTypeDraft, uuid: &str, created_at: DateTime<Utc>) -> Row {
        Row::new()
            .with("uuid", uuid)
            .with("name", draft.name)
            .with("description", draft.description)
            .with("java_class_name", draft.java_class_name)
            .with("parent", draft.parent)
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

impl Retirable for OrderType {
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

/// Scoped order type listings, in name order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderTypeFilter {
    Parent(i64),
    /// Top of the tree: no parent.
    Root,
    JavaClass(String),
    Creator(i64),
    /// Substring of the name or the description.
    NameContains(String),
}

impl RecordFilter<OrderType> for OrderTypeFilter {
    fn predicate(&self) -> Predicate {
        match self {
            OrderTypeFilter::Parent(id) => Predicate::eq("parent", *id),
            OrderTypeFilter::Root => Predicate::IsNull("parent"),
            OrderTypeFilter::JavaClass(name) => Predicate::eq("java_class_name", name.as_str()),
            OrderTypeFilter::Creator(id) => Predicate::eq("creator", *id),
            OrderTypeFilter::NameContains(term) => Predicate::AnyOf(vec![
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

pub type OrderTypeAccessor<S> = EntityAccessor<OrderType, S>;

impl<S: Store + ?Sized> EntityAccessor<OrderType, S> {
    /// Looks up an order type by its unique name.
    pub async fn fetch_by_name(&self, name: &str) -> StorageResult<Option<OrderType>> {
        self.fetch_where(Predicate::eq("name", name)).await
    }

    /// Active order types whose name or description contains `term`.
    pub async fn search(&self, term: &str, page: Page) -> StorageResult<Vec<OrderType>> {
        self.list_by(
            &OrderTypeFilter::NameContains(term.to_string()),
            Visibility::ActiveOnly,
            page,
        )
        .await
    }

    /// Active order types without a parent.
    pub async fn list_roots(&self, page: Page) -> StorageResult<Vec<OrderType>> {
        self.list_by(&OrderTypeFilter::Root, Visibility::ActiveOnly, page)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_filter_selects_parentless_types() {
        assert_eq!(OrderTypeFilter::Root.predicate(), Predicate::IsNull("parent"));
    }

    #[test]
    fn test_replace_requires_java_class_and_parent() {
        let missing = serde_json::from_str::<OrderTypeReplace>(
            r#"{"name": "Lab Order", "description": "Laboratory tests"}"#,
        );
        assert!(missing.is_err());
    }
}
