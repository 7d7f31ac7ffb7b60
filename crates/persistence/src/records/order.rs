//! Clinical orders.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::{
    AuditContext, ChangeSet, Entity, EntityAccessor, LifecycleState, Patch, Record, RecordFilter,
    Replacement, Retirable, Store, Visibility,
};
use crate::error::{PersistenceError, StorageResult, ValidationError};
use crate::present_fields;
use crate::types::{Identity, Page, Predicate, Row, TableSpec};

/// Urgency assigned when a new order does not name one.
pub const DEFAULT_URGENCY: &str = "ROUTINE";

/// Action assigned when a new order does not name one.
pub const DEFAULT_ORDER_ACTION: &str = "NEW";

const ORDERS: TableSpec = TableSpec {
    name: "orders",
    id_column: "order_id",
    columns: crate::columns![
        "order_id": Integer,
        "uuid": Text,
        "order_type_id": Integer,
        "concept_id": Integer,
        "orderer": Integer,
        "encounter_id": Integer,
        "patient_id": Integer,
        "care_setting": Integer,
        "instructions": Text,
        "urgency": Text,
        "order_action": Text,
        "order_number": Text,
        "accession_number": Text,
        "date_activated": Timestamp,
        "auto_expire_date": Timestamp,
        "date_stopped": Timestamp,
        "scheduled_date": Timestamp,
        "order_reason_non_coded": Text,
        "previous_order_id": Integer,
        "comment_to_fulfiller": Text,
        "fulfiller_status": Text,
        "fulfiller_comment": Text,
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

/// A clinical order (lab test, drug, procedure) for a patient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub order_id: i64,
    pub uuid: String,
    pub order_type_id: Option<i64>,
    pub concept_id: i64,
    pub orderer: Option<i64>,
    pub encounter_id: Option<i64>,
    pub patient_id: i64,
    pub care_setting: i64,
    pub instructions: Option<String>,
    pub urgency: String,
    pub order_action: String,
    pub order_number: Option<String>,
    pub accession_number: Option<String>,
    pub date_activated: Option<DateTime<Utc>>,
    pub auto_expire_date: Option<DateTime<Utc>>,
    pub date_stopped: Option<DateTime<Utc>>,
    pub scheduled_date: Option<DateTime<Utc>>,
    pub order_reason_non_coded: Option<String>,
    pub previous_order_id: Option<i64>,
    pub comment_to_fulfiller: Option<String>,
    pub fulfiller_status: Option<String>,
    pub fulfiller_comment: Option<String>,
    pub creator: Option<i64>,
    pub date_created: DateTime<Utc>,
    pub changed_by: Option<i64>,
    pub date_changed: Option<DateTime<Utc>>,
    pub voided: bool,
    pub voided_by: Option<i64>,
    pub date_voided: Option<DateTime<Utc>>,
    pub void_reason: Option<String>,
}

/// Payload for creating an order.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct OrderDraft {
    pub patient_id: i64,
    pub concept_id: i64,
    pub care_setting: i64,
    #[serde(default)]
    pub order_type_id: Option<i64>,
    #[serde(default)]
    pub orderer: Option<i64>,
    #[serde(default)]
    pub encounter_id: Option<i64>,
    #[serde(default)]
    pub instructions: Option<String>,
    #[serde(default)]
    pub urgency: Option<String>,
    #[serde(default)]
    pub order_action: Option<String>,
    #[serde(default)]
    pub order_number: Option<String>,
    #[serde(default)]
    pub accession_number: Option<String>,
    #[serde(default)]
    pub date_activated: Option<DateTime<Utc>>,
    #[serde(default)]
    pub auto_expire_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub scheduled_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub order_reason_non_coded: Option<String>,
    #[serde(default)]
    pub previous_order_id: Option<i64>,
    #[serde(default)]
    pub comment_to_fulfiller: Option<String>,
    #[serde(default)]
    pub creator: Option<i64>,
}

impl OrderDraft {
    /// A minimal draft for `patient_id` ordering `concept_id` in a care setting.
    pub fn new(patient_id: i64, concept_id: i64, care_setting: i64) -> Self {
        Self {
            patient_id,
            concept_id,
            care_setting,
            ..Default::default()
        }
    }
}

/// Partial update of an order.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct OrderChanges {
    pub order_type_id: Patch<i64>,
    pub concept_id: Patch<i64>,
    pub orderer: Patch<i64>,
    pub encounter_id: Patch<i64>,
    pub patient_id: Patch<i64>,
    pub care_setting: Patch<i64>,
    pub instructions: Patch<String>,
    pub urgency: Patch<String>,
    pub order_action: Patch<String>,
    pub order_number: Patch<String>,
    pub accession_number: Patch<String>,
    pub date_activated: Patch<DateTime<Utc>>,
    pub auto_expire_date: Patch<DateTime<Utc>>,
    pub date_stopped: Patch<DateTime<Utc>>,
    pub scheduled_date: Patch<DateTime<Utc>>,
    pub order_reason_non_coded: Patch<String>,
    pub previous_order_id: Patch<i64>,
    pub comment_to_fulfiller: Patch<String>,
    pub fulfiller_status: Patch<String>,
    pub fulfiller_comment: Patch<String>,
    /// Acting user; recorded as `changed_by`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub changed_by: Option<i64>,
}

impl ChangeSet<Order> for OrderChanges {
    fn present_fields(&self) -> Vec<&'static str> {
        present_fields!(self;
            order_type_id, concept_id, orderer, encounter_id, patient_id, care_setting,
            instructions, urgency, order_action, order_number, accession_number,
            date_activated, auto_expire_date, date_stopped, scheduled_date,
            order_reason_non_coded, previous_order_id, comment_to_fulfiller,
            fulfiller_status, fulfiller_comment,
        )
    }

    fn validate(&self) -> Result<(), ValidationError> {
        self.concept_id.require_non_null(Order::NAME, "concept_id")?;
        self.patient_id.require_non_null(Order::NAME, "patient_id")?;
        self.care_setting.require_non_null(Order::NAME, "care_setting")?;
        self.urgency.require_non_null(Order::NAME, "urgency")?;
        self.order_action.require_non_null(Order::NAME, "order_action")
    }

    fn apply(&self, order: &mut Order) {
        self.order_type_id.apply_nullable(&mut order.order_type_id);
        self.concept_id.apply_required(&mut order.concept_id);
        self.orderer.apply_nullable(&mut order.orderer);
        self.encounter_id.apply_nullable(&mut order.encounter_id);
        self.patient_id.apply_required(&mut order.patient_id);
        self.care_setting.apply_required(&mut order.care_setting);
        self.instructions.apply_nullable(&mut order.instructions);
        self.urgency.apply_required(&mut order.urgency);
        self.order_action.apply_required(&mut order.order_action);
        self.order_number.apply_nullable(&mut order.order_number);
        self.accession_number.apply_nullable(&mut order.accession_number);
        self.date_activated.apply_nullable(&mut order.date_activated);
        self.auto_expire_date.apply_nullable(&mut order.auto_expire_date);
        self.date_stopped.apply_nullable(&mut order.date_stopped);
        self.scheduled_date.apply_nullable(&mut order.scheduled_date);
        self.order_reason_non_coded
            .apply_nullable(&mut order.order_reason_non_coded);
        self.previous_order_id.apply_nullable(&mut order.previous_order_id);
        self.comment_to_fulfiller
            .apply_nullable(&mut order.comment_to_fulfiller);
        self.fulfiller_status.apply_nullable(&mut order.fulfiller_status);
        self.fulfiller_comment.apply_nullable(&mut order.fulfiller_comment);
    }

    fn changed_by(&self) -> Option<i64> {
        self.changed_by
    }
}

fn default_urgency() -> String {
    DEFAULT_URGENCY.to_string()
}

fn default_order_action() -> String {
    DEFAULT_ORDER_ACTION.to_string()
}

/// Full replacement of an order.
///
/// The identifying foreign keys are required. Omitted nullable fields are
/// cleared, and omitted `urgency` / `order_action` fall back to their
/// creation defaults.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct OrderReplace {
    pub order_type_id: i64,
    pub concept_id: i64,
    pub orderer: i64,
    pub encounter_id: i64,
    pub patient_id: i64,
    pub care_setting: i64,
    #[serde(default)]
    pub uuid: Option<String>,
    #[serde(default)]
    pub instructions: Option<String>,
    #[serde(default = "default_urgency")]
    pub urgency: String,
    #[serde(default = "default_order_action")]
    pub order_action: String,
    #[serde(default)]
    pub order_number: Option<String>,
    #[serde(default)]
    pub accession_number: Option<String>,
    #[serde(default)]
    pub date_activated: Option<DateTime<Utc>>,
    #[serde(default)]
    pub auto_expire_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub date_stopped: Option<DateTime<Utc>>,
    #[serde(default)]
    pub scheduled_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub order_reason_non_coded: Option<String>,
    #[serde(default)]
    pub previous_order_id: Option<i64>,
    #[serde(default)]
    pub comment_to_fulfiller: Option<String>,
    #[serde(default)]
    pub fulfiller_status: Option<String>,
    #[serde(default)]
    pub fulfiller_comment: Option<String>,
    #[serde(default)]
    pub changed_by: Option<i64>,
}

impl Replacement<Order> for OrderReplace {
    fn validate(&self) -> Result<(), ValidationError> {
        for (field, value) in [("urgency", &self.urgency), ("order_action", &self.order_action)] {
            if value.trim().is_empty() {
                return Err(ValidationError::InvalidValue {
                    field: field.to_string(),
                    message: "must not be empty".to_string(),
                });
            }
        }
        Ok(())
    }

    fn uuid(&self) -> Option<&str> {
        self.uuid.as_deref()
    }

    fn apply(&self, order: &mut Order) {
        order.order_type_id = Some(self.order_type_id);
        order.concept_id = self.concept_id;
        order.orderer = Some(self.orderer);
        order.encounter_id = Some(self.encounter_id);
        order.patient_id = self.patient_id;
        order.care_setting = self.care_setting;
        order.instructions = self.instructions.clone();
        order.urgency = self.urgency.clone();
        order.order_action = self.order_action.clone();
        order.order_number = self.order_number.clone();
        order.accession_number = self.accession_number.clone();
        order.date_activated = self.date_activated;
        order.auto_expire_date = self.auto_expire_date;
        order.date_stopped = self.date_stopped;
        order.scheduled_date = self.scheduled_date;
        order.order_reason_non_coded = self.order_reason_non_coded.clone();
        order.previous_order_id = self.previous_order_id;
        order.comment_to_fulfiller = self.comment_to_fulfiller.clone();
        order.fulfiller_status = self.fulfiller_status.clone();
        order.fulfiller_comment = self.fulfiller_comment.clone();
    }

    fn changed_by(&self) -> Option<i64> {
        self.changed_by
    }
}

impl Entity for Order {
    const TABLE: &'static TableSpec = &ORDERS;

    fn from_row(row: &Row) -> Result<Self, PersistenceError> {
        Ok(Self {
            order_id: row.integer("order_id")?,
            uuid: row.text("uuid")?,
            order_type_id: row.opt_integer("order_type_id")?,
            concept_id: row.integer("concept_id")?,
            orderer: row.opt_integer("orderer")?,
            encounter_id: row.opt_integer("encounter_id")?,
            patient_id: row.integer("patient_id")?,
            care_setting: row.integer("care_setting")?,
            instructions: row.opt_text("instructions")?,
            urgency: row.text("urgency")?,
            order_action: row.text("order_action")?,
            order_number: row.opt_text("order_number")?,
            accession_number: row.opt_text("accession_number")?,
            date_activated: row.opt_timestamp("date_activated")?,
            auto_expire_date: row.opt_timestamp("auto_expire_date")?,
            date_stopped: row.opt_timestamp("date_stopped")?,
            scheduled_date: row.opt_timestamp("scheduled_date")?,
            order_reason_non_coded: row.opt_text("order_reason_non_coded")?,
            previous_order_id: row.opt_integer("previous_order_id")?,
            comment_to_fulfiller: row.opt_text("comment_to_fulfiller")?,
            fulfiller_status: row.opt_text("fulfiller_status")?,
            fulfiller_comment: row.opt_text("fulfiller_comment")?,
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

impl Record for Order {
    const NAME: &'static str = "Order";
    const LIFECYCLE_COLUMN: Option<&'static str> = Some("voided");

    type Draft = OrderDraft;
    type Changes = OrderChanges;
    type Replacement = OrderReplace;

    fn id(&self) -> i64 {
        self.order_id
    }

    fn uuid(&self) -> &str {
        &self.uuid
    }

    fn to_row(&self) -> Row {
        Row::new()
            .with("uuid", self.uuid.as_str())
            .with("order_type_id", self.order_type_id)
            .with("concept_id", self.concept_id)
            .with("orderer", self.orderer)
            .with("encounter_id", self.encounter_id)
            .with("patient_id", self.patient_id)
            .with("care_setting", self.care_setting)
            .with("instructions", self.instructions.clone())
            .with("urgency", self.urgency.as_str())
            .with("order_action", self.order_action.as_str())
            .with("order_number", self.order_number.clone())
            .with("accession_number", self.accession_number.clone())
            .with("date_activated", self.date_activated)
            .with("auto_expire_date", self.auto_expire_date)
            .with("date_stopped", self.date_stopped)
            .with("scheduled_date", self.scheduled_date)
            .with("order_reason_non_coded", self.order_reason_non_coded.clone())
            .with("previous_order_id", self.previous_order_id)
            .with("comment_to_fulfiller", self.comment_to_fulfiller.clone())
            .with("fulfiller_status", self.fulfiller_status.clone())
            .with("fulfiller_comment", self.fulfiller_comment.clone())
            .with("creator", self.creator)
            .with("date_created", self.date_created)
            .with("changed_by", self.changed_by)
            .with("date_changed", self.date_changed)
            .with("voided", self.voided)
            .with("voided_by", self.voided_by)
            .with("date_voided", self.date_voided)
            .with("void_reason", self.void_reason.clone())
    }

    fn draft_row(draft: OrderDraft, uuid: &str, created_at: DateTime<Utc>) -> Row {
        Row::new()
            .with("uuid", uuid)
            .with("order_type_id", draft.order_type_id)
            .with("concept_id", draft.concept_id)
            .with("orderer", draft.orderer)
            .with("encounter_id", draft.encounter_id)
            .with("patient_id", draft.patient_id)
            .with("care_setting", draft.care_setting)
            .with("instructions", draft.instructions)
            .with("urgency", draft.urgency.unwrap_or_else(default_urgency))
            .with(
                "order_action",
                draft.order_action.unwrap_or_else(default_order_action),
            )
            .with("order_number", draft.order_number)
            .with("accession_number", draft.accession_number)
            .with("date_activated", draft.date_activated)
            .with("auto_expire_date", draft.auto_expire_date)
            .with("scheduled_date", draft.scheduled_date)
            .with("order_reason_non_coded", draft.order_reason_non_coded)
            .with("previous_order_id", draft.previous_order_id)
            .with("comment_to_fulfiller", draft.comment_to_fulfiller)
            .with("creator", draft.creator)
            .with("date_created", created_at)
            .with("voided", false)
    }

    fn apply_defaults(draft: &mut OrderDraft) {
        draft.urgency.get_or_insert_with(default_urgency);
        draft.order_action.get_or_insert_with(default_order_action);
    }

    fn stamp_audit(&mut self, audit: &AuditContext) {
        if audit.changed_by.is_some() {
            self.changed_by = audit.changed_by;
        }
        self.date_changed = Some(audit.at);
    }
}

impl Retirable for Order {
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

/// Scoped order listings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderFilter {
    Patient(i64),
    Encounter(i64),
    Concept(i64),
    Orderer(i64),
    OrderType(i64),
    CareSetting(i64),
    Urgency(String),
    Action(String),
    FulfillerStatus(String),
}

impl RecordFilter<Order> for OrderFilter {
    fn predicate(&self) -> Predicate {
        match self {
            OrderFilter::Patient(id) => Predicate::eq("patient_id", *id),
            OrderFilter::Encounter(id) => Predicate::eq("encounter_id", *id),
            OrderFilter::Concept(id) => Predicate::eq("concept_id", *id),
            OrderFilter::Orderer(id) => Predicate::eq("orderer", *id),
            OrderFilter::OrderType(id) => Predicate::eq("order_type_id", *id),
            OrderFilter::CareSetting(id) => Predicate::eq("care_setting", *id),
            OrderFilter::Urgency(urgency) => Predicate::eq("urgency", urgency.as_str()),
            OrderFilter::Action(action) => Predicate::eq("order_action", action.as_str()),
            OrderFilter::FulfillerStatus(status) => {
                Predicate::eq("fulfiller_status", status.as_str())
            }
        }
    }
}

/// Accessor for orders.
pub type OrderAccessor<S> = EntityAccessor<Order, S>;

impl<S: Store + ?Sized> EntityAccessor<Order, S> {
    /// Looks up an order by its order number.
    pub async fn fetch_by_order_number(&self, order_number: &str) -> StorageResult<Option<Order>> {
        self.fetch_where(Predicate::eq("order_number", order_number))
            .await
    }

    /// Active orders for a patient.
    pub async fn list_by_patient(&self, patient_id: i64, page: Page) -> StorageResult<Vec<Order>> {
        self.list_by(&OrderFilter::Patient(patient_id), Visibility::ActiveOnly, page)
            .await
    }

    /// Active orders placed during an encounter.
    pub async fn list_by_encounter(
        &self,
        encounter_id: i64,
        page: Page,
    ) -> StorageResult<Vec<Order>> {
        self.list_by(&OrderFilter::Encounter(encounter_id), Visibility::ActiveOnly, page)
            .await
    }

    /// Active orders for a concept.
    pub async fn list_by_concept(&self, concept_id: i64, page: Page) -> StorageResult<Vec<Order>> {
        self.list_by(&OrderFilter::Concept(concept_id), Visibility::ActiveOnly, page)
            .await
    }

    /// Active orders with the given urgency.
    pub async fn list_by_urgency(&self, urgency: &str, page: Page) -> StorageResult<Vec<Order>> {
        self.list_by(
            &OrderFilter::Urgency(urgency.to_string()),
            Visibility::ActiveOnly,
            page,
        )
        .await
    }

    /// Voids an order.
    pub async fn void(
        &self,
        identity: &Identity,
        voided_by: i64,
        reason: Option<&str>,
    ) -> StorageResult<Option<Order>> {
        self.retire(identity, voided_by, reason).await
    }

    /// Reverses a void.
    pub async fn unvoid(&self, identity: &Identity, unvoided_by: i64) -> StorageResult<Option<Order>> {
        self.unretire(identity, unvoided_by).await
    }
}
