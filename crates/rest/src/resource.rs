//! Binding of record types to their HTTP resources.
//!
//! Every record exposed under `/api` implements [`RestResource`], which names
//! its path segment, its lifecycle verbs and the foreign-key scopes it can be
//! listed by. The generic handlers in [`crate::handlers::records`] do the rest.

use emr_persistence::core::{Record, RecordFilter, Retirable};
use emr_persistence::records::{
    Concept, ConceptFilter, Drug, DrugFilter, Encounter, EncounterFilter, Observation,
    ObservationFilter, Order, OrderFilter, OrderType, OrderTypeFilter, ValueType, Visit,
    VisitFilter, VisitType, VisitTypeFilter,
};
use serde::de::DeserializeOwned;

use crate::error::RestError;

/// Soft-delete vocabulary of a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    /// `retire` / `unretire`, listed under `retired`.
    Retire,
    /// `void` / `unvoid`, listed under `voided`.
    Void,
}

impl Lifecycle {
    /// Path segment of the soft-delete action.
    pub fn verb(self) -> &'static str {
        match self {
            Lifecycle::Retire => "retire",
            Lifecycle::Void => "void",
        }
    }

    /// Path segment of the reverse action.
    pub fn undo_verb(self) -> &'static str {
        match self {
            Lifecycle::Retire => "unretire",
            Lifecycle::Void => "unvoid",
        }
    }

    /// Path segment listing soft-deleted records.
    pub fn listing(self) -> &'static str {
        match self {
            Lifecycle::Retire => "retired",
            Lifecycle::Void => "voided",
        }
    }
}

/// A record type served under `/api/{PATH}`.
pub trait RestResource:
    Retirable
    + Record<Draft: DeserializeOwned, Changes: DeserializeOwned, Replacement: DeserializeOwned>
{
    /// Collection path segment, e.g. `orders`.
    const PATH: &'static str;

    /// Soft-delete vocabulary.
    const LIFECYCLE: Lifecycle;

    /// Path segments accepted by `GET /api/{PATH}/{scope}/{value}`.
    const SCOPES: &'static [&'static str];

    /// Filter type the scopes translate into.
    type Filter: RecordFilter<Self> + Send + Sync;

    /// Translates a scope and its raw value into a filter.
    ///
    /// `Ok(None)` means the value can never match and the listing is empty.
    fn scope_filter(scope: &str, value: &str) -> Result<Option<Self::Filter>, RestError>;
}

fn parse_id(scope: &str, value: &str) -> Result<i64, RestError> {
    value
        .parse()
        .map_err(|_| RestError::validation(format!("invalid {} id '{}'", scope, value)))
}

fn unknown_scope(scope: &str) -> RestError {
    RestError::validation(format!("unknown listing scope '{}'", scope))
}

impl RestResource for Order {
    const PATH: &'static str = "orders";
    const LIFECYCLE: Lifecycle = Lifecycle::Void;
    const SCOPES: &'static [&'static str] = &[
        "patient",
        "encounter",
        "concept",
        "orderer",
        "type",
        "care-setting",
        "urgency",
        "action",
        "status",
    ];
    type Filter = OrderFilter;

    fn scope_filter(scope: &str, value: &str) -> Result<Option<OrderFilter>, RestError> {
        let filter = match scope {
            "patient" => OrderFilter::Patient(parse_id(scope, value)?),
            "encounter" => OrderFilter::Encounter(parse_id(scope, value)?),
            "concept" => OrderFilter::Concept(parse_id(scope, value)?),
            "orderer" => OrderFilter::Orderer(parse_id(scope, value)?),
            "type" => OrderFilter::OrderType(parse_id(scope, value)?),
            "care-setting" => OrderFilter::CareSetting(parse_id(scope, value)?),
            "urgency" => OrderFilter::Urgency(value.to_string()),
            "action" => OrderFilter::Action(value.to_string()),
            "status" => OrderFilter::FulfillerStatus(value.to_string()),
            _ => return Err(unknown_scope(scope)),
        };
        Ok(Some(filter))
    }
}

impl RestResource for Observation {
    const PATH: &'static str = "observations";
    const LIFECYCLE: Lifecycle = Lifecycle::Void;
    const SCOPES: &'static [&'static str] = &[
        "person",
        "encounter",
        "concept",
        "order",
        "location",
        "status",
        "value-type",
    ];
    type Filter = ObservationFilter;

    fn scope_filter(scope: &str, value: &str) -> Result<Option<ObservationFilter>, RestError> {
        let filter = match scope {
            "person" => ObservationFilter::Person(parse_id(scope, value)?),
            "encounter" => ObservationFilter::Encounter(parse_id(scope, value)?),
            "concept" => ObservationFilter::Concept(parse_id(scope, value)?),
            "order" => ObservationFilter::Order(parse_id(scope, value)?),
            "location" => ObservationFilter::Location(parse_id(scope, value)?),
            "status" => ObservationFilter::Status(value.to_string()),
            "value-type" => match value.parse::<ValueType>() {
                Ok(kind) => ObservationFilter::ValueType(kind),
                Err(_) => return Ok(None),
            },
            _ => return Err(unknown_scope(scope)),
        };
        Ok(Some(filter))
    }
}

impl RestResource for Concept {
    const PATH: &'static str = "concepts";
    const LIFECYCLE: Lifecycle = Lifecycle::Retire;
    const SCOPES: &'static [&'static str] = &["datatype", "class", "creator"];
    type Filter = ConceptFilter;

    fn scope_filter(scope: &str, value: &str) -> Result<Option<ConceptFilter>, RestError> {
        let filter = match scope {
            "datatype" => ConceptFilter::Datatype(parse_id(scope, value)?),
            "class" => ConceptFilter::Class(parse_id(scope, value)?),
            "creator" => ConceptFilter::Creator(parse_id(scope, value)?),
            _ => return Err(unknown_scope(scope)),
        };
        Ok(Some(filter))
    }
}

impl RestResource for Encounter {
    const PATH: &'static str = "encounters";
    const LIFECYCLE: Lifecycle = Lifecycle::Void;
    const SCOPES: &'static [&'static str] = &["patient", "type", "location", "visit", "creator"];
    type Filter = EncounterFilter;

    fn scope_filter(scope: &str, value: &str) -> Result<Option<EncounterFilter>, RestError> {
        let filter = match scope {
            "patient" => EncounterFilter::Patient(parse_id(scope, value)?),
            "type" => EncounterFilter::EncounterType(parse_id(scope, value)?),
            "location" => EncounterFilter::Location(parse_id(scope, value)?),
            "visit" => EncounterFilter::Visit(parse_id(scope, value)?),
            "creator" => EncounterFilter::Creator(parse_id(scope, value)?),
            _ => return Err(unknown_scope(scope)),
        };
        Ok(Some(filter))
    }
}

impl RestResource for Visit {
    const PATH: &'static str = "visits";
    const LIFECYCLE: Lifecycle = Lifecycle::Void;
    const SCOPES: &'static [&'static str] = &["patient", "type", "location", "creator"];
    type Filter = VisitFilter;

    fn scope_filter(scope: &str, value: &str) -> Result<Option<VisitFilter>, RestError> {
        let filter = match scope {
            "patient" => VisitFilter::Patient(parse_id(scope, value)?),
            "type" => VisitFilter::VisitType(parse_id(scope, value)?),
            "location" => VisitFilter::Location(parse_id(scope, value)?),
            "creator" => VisitFilter::Creator(parse_id(scope, value)?),
            _ => return Err(unknown_scope(scope)),
        };
        Ok(Some(filter))
    }
}

impl RestResource for VisitType {
    const PATH: &'static str = "visit-types";
    const LIFECYCLE: Lifecycle = Lifecycle::Retire;
    const SCOPES: &'static [&'static str] = &["creator"];
    type Filter = VisitTypeFilter;

    fn scope_filter(scope: &str, value: &str) -> Result<Option<VisitTypeFilter>, RestError> {
        match scope {
            "creator" => Ok(Some(VisitTypeFilter::Creator(parse_id(scope, value)?))),
            _ => Err(unknown_scope(scope)),
        }
    }
}

impl RestResource for OrderType {
    const PATH: &'static str = "order-types";
    const LIFECYCLE: Lifecycle = Lifecycle::Retire;
    const SCOPES: &'static [&'static str] = &["parent", "java-class", "creator"];
    type Filter = OrderTypeFilter;

    fn scope_filter(scope: &str, value: &str) -> Result<Option<OrderTypeFilter>, RestError> {
        let filter = match scope {
            "parent" => OrderTypeFilter::Parent(parse_id(scope, value)?),
            "java-class" => OrderTypeFilter::JavaClass(value.to_string()),
            "creator" => OrderTypeFilter::Creator(parse_id(scope, value)?),
            _ => return Err(unknown_scope(scope)),
        };
        Ok(Some(filter))
    }
}

impl RestResource for Drug {
    const PATH: &'static str = "drugs";
    const LIFECYCLE: Lifecycle = Lifecycle::Retire;
    const SCOPES: &'static [&'static str] = &["concept", "creator"];
    type Filter = DrugFilter;

    fn scope_filter(scope: &str, value: &str) -> Result<Option<DrugFilter>, RestError> {
        let filter = match scope {
            "concept" => DrugFilter::Concept(parse_id(scope, value)?),
            "creator" => DrugFilter::Creator(parse_id(scope, value)?),
            _ => return Err(unknown_scope(scope)),
        };
        Ok(Some(filter))
    }
}
