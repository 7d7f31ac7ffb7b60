//! Clinical records and their specialized accessors.
//!
//! | Record        | Table       | Lifecycle | Accessor               |
//! |---------------|-------------|-----------|------------------------|
//! | [`Order`]       | `orders`    | voided    | [`OrderAccessor`]       |
//! | [`Observation`] | `obs`       | voided    | [`ObservationAccessor`] |
//! | [`Concept`]     | `concept`   | retired   | [`ConceptAccessor`]     |
//! | [`Encounter`]   | `encounter` | voided    | [`EncounterAccessor`]   |
//! | [`Visit`]       | `visit`     | voided    | [`VisitAccessor`]       |
//! | [`VisitType`]   | `visit_type`| retired   | [`VisitTypeAccessor`]   |
//! | [`OrderType`]   | `order_type`| retired   | [`OrderTypeAccessor`]   |
//! | [`Drug`]        | `drug`      | retired   | [`DrugAccessor`]        |
//!
//! Diagnoses and vital signs are read-only aggregations over observations,
//! see [`DiagnosisAccessor`] and [`VitalsAccessor`]. Providers are read only
//! as well, see [`ProviderAccessor`].

// Record fields mirror store columns one to one
#![allow(missing_docs)]

mod concept;
mod diagnosis;
mod drug;
mod encounter;
mod observation;
mod order;
mod order_type;
mod provider;
pub mod reference;
mod visit;
mod visit_type;
mod vitals;

pub use concept::{
    Concept, ConceptAccessor, ConceptChanges, ConceptDraft, ConceptFilter, ConceptReplace,
};
pub use diagnosis::{
    Diagnosis, DiagnosisAccessor, DiagnosisConcept, DiagnosisFilter, DiagnosisPage,
    EncounterSummary, PatientSummary, ReferenceCode, UNKNOWN_PATIENT, VisitDiagnoses,
};
pub use drug::{Drug, DrugAccessor, DrugChanges, DrugDraft, DrugFilter, DrugReplace};
pub use encounter::{
    Encounter, EncounterAccessor, EncounterChanges, EncounterDraft, EncounterFilter,
    EncounterReplace,
};
pub use observation::{
    DEFAULT_STATUS, Observation, ObservationAccessor, ObservationChanges, ObservationDraft,
    ObservationFilter, ObservationReplace, ValueType,
};
pub use order::{
    DEFAULT_ORDER_ACTION, DEFAULT_URGENCY, Order, OrderAccessor, OrderChanges, OrderDraft,
    OrderFilter, OrderReplace,
};
pub use order_type::{
    OrderType, OrderTypeAccessor, OrderTypeChanges, OrderTypeDraft, OrderTypeFilter,
    OrderTypeReplace,
};
pub use provider::{Provider, ProviderAccessor, ProviderDetails, ProviderPage, ProviderPerson};
pub use visit::{Visit, VisitAccessor, VisitChanges, VisitDraft, VisitFilter, VisitReplace};
pub use visit_type::{
    VisitType, VisitTypeAccessor, VisitTypeChanges, VisitTypeDraft, VisitTypeFilter,
    VisitTypeReplace,
};
pub use vitals::{
    VITAL_CLASSES, VisitVitals, VisitVitalsGrouped, VitalSign, VitalsAccessor, VitalsByType,
};
