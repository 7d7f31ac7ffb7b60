//! Vital signs recorded during a visit.
//!
//! A vital sign is an active observation, taken in an active encounter of
//! the visit, whose concept belongs to one of the [`VITAL_CLASSES`] and which
//! carries a value. Listings are newest first, like the diagnosis views, and
//! every joined relation is loaded once per page.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

use super::diagnosis::{
    EncounterSummary, PatientSummary, display_name, encounter_summaries, patient_summaries,
    unknown_patient,
};
use super::reference::{ConceptClass, ConceptName};
use super::{Concept, Encounter, Observation, Visit};
use crate::core::{Entity, EntityAccessor, Store, select_entities};
use crate::error::StorageResult;
use crate::types::{Identity, Page, Predicate, Query, SortDirection, Subquery};

/// Concept class names that mark a concept as a vital sign.
pub const VITAL_CLASSES: [&str; 4] = ["Vitals", "Vital Signs", "Vital", "Vital Sign"];

const DISPLAY_LOCALE: &str = "en";

/// One vital sign measurement.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VitalSign {
    pub obs_id: i64,
    pub uuid: String,
    pub obs_datetime: DateTime<Utc>,
    pub concept_id: i64,
    pub concept_name: Option<String>,
    pub value_numeric: Option<f64>,
    pub value_text: Option<String>,
    pub value_coded: Option<i64>,
    pub value_coded_name: Option<String>,
    pub value_datetime: Option<DateTime<Utc>>,
    pub comments: Option<String>,
    pub status: String,
    pub interpretation: Option<String>,
}

/// The vitals of one visit, newest first.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VisitVitals {
    pub visit_id: i64,
    pub visit_uuid: String,
    pub patient: PatientSummary,
    /// Encounter of the most recent vital sign on the page.
    pub encounter: Option<EncounterSummary>,
    pub vitals: Vec<VitalSign>,
    pub total_count: u64,
}

/// All measurements of one vital sign concept.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VitalsByType {
    pub vital_type: String,
    pub concept_id: i64,
    pub vitals: Vec<VitalSign>,
}

/// The vitals of one visit grouped by concept, groups in name order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VisitVitalsGrouped {
    pub visit_id: i64,
    pub visit_uuid: String,
    pub patient: PatientSummary,
    pub encounter: Option<EncounterSummary>,
    pub vitals_by_type: Vec<VitalsByType>,
    pub total_count: u64,
}

impl From<VisitVitals> for VisitVitalsGrouped {
    fn from(page: VisitVitals) -> Self {
        let mut groups: BTreeMap<String, VitalsByType> = BTreeMap::new();
        for vital in page.vitals {
            let vital_type = vital
                .concept_name
                .clone()
                .unwrap_or_else(|| vital.concept_id.to_string());
            groups
                .entry(vital_type.clone())
                .or_insert_with(|| VitalsByType {
                    vital_type,
                    concept_id: vital.concept_id,
                    vitals: Vec::new(),
                })
                .vitals
                .push(vital);
        }
        Self {
            visit_id: page.visit_id,
            visit_uuid: page.visit_uuid,
            patient: page.patient,
            encounter: page.encounter,
            vitals_by_type: groups.into_values().collect(),
            total_count: page.total_count,
        }
    }
}

/// Read-side accessor for vital signs.
pub struct VitalsAccessor<S: ?Sized> {
    store: Arc<S>,
}

impl<S: ?Sized> Clone for VitalsAccessor<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: Store + ?Sized> VitalsAccessor<S> {
    /// Creates an accessor over `store`.
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Vitals of a visit. Returns `None` if the visit does not exist or is
    /// voided.
    pub async fn list_by_visit(
        &self,
        visit: &Identity,
        page: Page,
    ) -> StorageResult<Option<VisitVitals>> {
        let visits = EntityAccessor::<Visit, S>::new(Arc::clone(&self.store));
        let Some(visit) = visits.fetch(visit).await?.filter(|v| !v.voided) else {
            return Ok(None);
        };

        let base = Self::base_query(visit.visit_id);
        let total_count = self.store.count(&base).await?;
        let query = base
            .order_by("obs_datetime", SortDirection::Descending)
            .page(page);
        let observations: Vec<Observation> = select_entities(self.store.as_ref(), &query).await?;
        let encounter_id = observations.first().and_then(|o| o.encounter_id);
        let vitals = self.enrich(observations).await?;
        debug!(visit_id = visit.visit_id, total_count, returned = vitals.len(), "Listed vitals");

        let patient = patient_summaries(self.store.as_ref(), &BTreeSet::from([visit.patient_id]))
            .await?
            .remove(&visit.patient_id)
            .unwrap_or_else(|| unknown_patient(visit.patient_id));
        let encounter = match encounter_id {
            Some(id) => encounter_summaries(self.store.as_ref(), &BTreeSet::from([id]))
                .await?
                .remove(&id),
            None => None,
        };

        Ok(Some(VisitVitals {
            visit_id: visit.visit_id,
            visit_uuid: visit.uuid,
            patient,
            encounter,
            vitals,
            total_count,
        }))
    }

    /// Vitals of a visit grouped by vital sign type.
    pub async fn grouped_by_visit(
        &self,
        visit: &Identity,
        page: Page,
    ) -> StorageResult<Option<VisitVitalsGrouped>> {
        Ok(self.list_by_visit(visit, page).await?.map(Into::into))
    }

    fn base_query(visit_id: i64) -> Query {
        let encounters = Subquery::new(Encounter::TABLE, "encounter_id")
            .filter(Predicate::eq("visit_id", visit_id))
            .filter(Predicate::eq("voided", false));
        let vital_concepts = Subquery::new(Concept::TABLE, "concept_id").filter(Predicate::in_select(
            "class_id",
            Subquery::new(ConceptClass::TABLE, "concept_class_id")
                .filter(Predicate::is_in("name", VITAL_CLASSES)),
        ));
        Query::new(Observation::TABLE)
            .filter(Predicate::eq("voided", false))
            .filter(Predicate::in_select("encounter_id", encounters))
            .filter(Predicate::in_select("concept_id", vital_concepts))
            .filter(Predicate::AnyOf(vec![
                Predicate::IsNotNull("value_numeric"),
                Predicate::IsNotNull("value_text"),
                Predicate::IsNotNull("value_coded"),
                Predicate::IsNotNull("value_datetime"),
            ]))
    }

    async fn enrich(&self, observations: Vec<Observation>) -> StorageResult<Vec<VitalSign>> {
        if observations.is_empty() {
            return Ok(Vec::new());
        }
        let concept_ids: BTreeSet<i64> = observations
            .iter()
            .flat_map(|o| [Some(o.concept_id), o.value_coded])
            .flatten()
            .collect();
        let names = self.concept_names(&concept_ids).await?;

        Ok(observations
            .into_iter()
            .map(|obs| VitalSign {
                concept_name: names.get(&obs.concept_id).cloned(),
                value_coded_name: obs.value_coded.and_then(|id| names.get(&id).cloned()),
                obs_id: obs.obs_id,
                uuid: obs.uuid,
                obs_datetime: obs.obs_datetime,
                concept_id: obs.concept_id,
                value_numeric: obs.value_numeric,
                value_text: obs.value_text,
                value_coded: obs.value_coded,
                value_datetime: obs.value_datetime,
                comments: obs.comments,
                status: obs.status,
                interpretation: obs.interpretation,
            })
            .collect())
    }

    /// Display names of concepts, falling back to the short name.
    async fn concept_names(&self, ids: &BTreeSet<i64>) -> StorageResult<HashMap<i64, String>> {
        let names = Query::new(ConceptName::TABLE)
            .filter(Predicate::is_in("concept_id", ids.iter().copied()))
            .filter(Predicate::eq("locale", DISPLAY_LOCALE))
            .filter(Predicate::eq("voided", false));
        let names: Vec<ConceptName> = select_entities(self.store.as_ref(), &names).await?;
        let concepts = Query::new(Concept::TABLE)
            .filter(Predicate::is_in("concept_id", ids.iter().copied()));
        let concepts: Vec<Concept> = select_entities(self.store.as_ref(), &concepts).await?;

        Ok(concepts
            .into_iter()
            .filter_map(|concept| {
                display_name(&names, concept.concept_id)
                    .or(concept.short_name)
                    .map(|name| (concept.concept_id, name))
            })
            .collect())
    }
}
