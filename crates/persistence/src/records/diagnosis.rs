//! Diagnosis views.
//!
//! A diagnosis is an observation whose coded value names a clinical concept.
//! The views here are read-side aggregations: each observation is returned
//! with its concept, every external reference code mapped to that concept,
//! and summaries of the patient and encounter it belongs to.
//!
//! ```text
//! obs.value_coded ──▶ concept ──▶ concept_reference_map ──▶ concept_reference_term
//!      │                                                          │
//!      ├──▶ encounter ──▶ visit                                   ▼
//!      └──▶ person ──▶ person_name                   concept_reference_source
//! ```
//!
//! Lookups are batched per page: one query per joined relation, never one per
//! observation.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::reference::{
    ConceptName, Person, PersonName, ReferenceMap, ReferenceSource, ReferenceTerm,
};
use super::{Concept, Encounter, Observation, Visit};
use crate::core::{Entity, Store, select_entities};
use crate::error::StorageResult;
use crate::types::{Identity, Page, Predicate, Query, SortDirection, Subquery, normalize_uuid};

/// Display name used when a patient has no usable name on record.
pub const UNKNOWN_PATIENT: &str = "Unknown";

/// Locale of the concept names shown in diagnosis views.
const DISPLAY_LOCALE: &str = "en";

/// An external code mapped to a concept.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReferenceCode {
    pub code: String,
    pub name: Option<String>,
    pub version: Option<String>,
    pub description: Option<String>,
    pub source_name: Option<String>,
    pub source_description: Option<String>,
    pub hl7_code: Option<String>,
}

/// The diagnosed concept with all of its reference codes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiagnosisConcept {
    pub concept_id: i64,
    pub uuid: String,
    pub name: Option<String>,
    pub short_name: Option<String>,
    pub description: Option<String>,
    pub reference_codes: Vec<ReferenceCode>,
}

/// Patient details shown alongside a diagnosis.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PatientSummary {
    pub patient_id: i64,
    pub uuid: Option<String>,
    pub name: String,
    pub gender: Option<String>,
    pub birthdate: Option<NaiveDate>,
}

/// Encounter details shown alongside a diagnosis.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EncounterSummary {
    pub encounter_id: i64,
    pub uuid: String,
    pub encounter_datetime: DateTime<Utc>,
    pub encounter_type: i64,
    pub location_id: Option<i64>,
    pub visit_id: Option<i64>,
}

/// A coded observation enriched into a diagnosis.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnosis {
    pub obs_id: i64,
    pub uuid: String,
    pub obs_datetime: DateTime<Utc>,
    pub concept: DiagnosisConcept,
    pub patient: PatientSummary,
    pub encounter: Option<EncounterSummary>,
    pub comments: Option<String>,
    pub status: String,
    pub interpretation: Option<String>,
}

/// One page of diagnoses.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiagnosisPage {
    pub diagnoses: Vec<Diagnosis>,
    pub total_count: u64,
    pub skip: u64,
    pub limit: u64,
}

/// All diagnoses recorded during one visit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VisitDiagnoses {
    pub visit_id: i64,
    pub visit_uuid: String,
    pub patient: PatientSummary,
    pub diagnoses: Vec<Diagnosis>,
    pub total_count: u64,
}

/// Filters for diagnosis listings. Every set field narrows the result.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct DiagnosisFilter {
    pub patient_id: Option<i64>,
    pub encounter_id: Option<i64>,
    pub visit_id: Option<i64>,
    pub concept_id: Option<i64>,
    /// Only concepts with (`true`) or without (`false`) any reference code.
    pub has_reference_codes: Option<bool>,
    /// Only concepts mapped into the named terminology.
    pub source_name: Option<String>,
}

/// Read-side accessor for diagnoses.
pub struct DiagnosisAccessor<S: ?Sized> {
    store: Arc<S>,
}

impl<S: ?Sized> Clone for DiagnosisAccessor<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: Store + ?Sized> DiagnosisAccessor<S> {
    /// Creates an accessor over `store`.
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Lists diagnoses, newest first.
    pub async fn list(&self, filter: &DiagnosisFilter, page: Page) -> StorageResult<DiagnosisPage> {
        let base = Self::base_query(filter);
        let total_count = self.store.count(&base).await?;
        let query = base
            .order_by("obs_datetime", SortDirection::Descending)
            .page(page);
        let observations: Vec<Observation> = select_entities(self.store.as_ref(), &query).await?;
        let diagnoses = self.enrich(observations).await?;
        debug!(total_count, returned = diagnoses.len(), "Listed diagnoses");

        Ok(DiagnosisPage {
            diagnoses,
            total_count,
            skip: page.skip,
            limit: page.limit,
        })
    }

    /// Diagnoses for one patient.
    pub async fn list_by_patient(&self, patient_id: i64, page: Page) -> StorageResult<DiagnosisPage> {
        let filter = DiagnosisFilter {
            patient_id: Some(patient_id),
            ..Default::default()
        };
        self.list(&filter, page).await
    }

    /// Diagnoses recorded during one encounter.
    pub async fn list_by_encounter(
        &self,
        encounter_id: i64,
        page: Page,
    ) -> StorageResult<DiagnosisPage> {
        let filter = DiagnosisFilter {
            encounter_id: Some(encounter_id),
            ..Default::default()
        };
        self.list(&filter, page).await
    }

    /// Diagnoses of one visit. Returns `None` if the visit does not exist.
    pub async fn list_by_visit(
        &self,
        visit: &Identity,
        page: Page,
    ) -> StorageResult<Option<VisitDiagnoses>> {
        let predicate = match visit {
            Identity::Id(id) => Predicate::eq("visit_id", *id),
            Identity::Uuid(uuid) => Predicate::eq("uuid", normalize_uuid(uuid)?),
        };
        let query = Query::new(Visit::TABLE).filter(predicate);
        let Some(visit) = select_entities::<Visit, S>(self.store.as_ref(), &query)
            .await?
            .into_iter()
            .next()
        else {
            return Ok(None);
        };

        let filter = DiagnosisFilter {
            visit_id: Some(visit.visit_id),
            ..Default::default()
        };
        let page = self.list(&filter, page).await?;
        let patient = patient_summaries(self.store.as_ref(), &BTreeSet::from([visit.patient_id]))
            .await?
            .remove(&visit.patient_id)
            .unwrap_or_else(|| unknown_patient(visit.patient_id));

        Ok(Some(VisitDiagnoses {
            visit_id: visit.visit_id,
            visit_uuid: visit.uuid,
            patient,
            diagnoses: page.diagnoses,
            total_count: page.total_count,
        }))
    }

    /// Enriches a single observation. Returns `None` if it has no coded value.
    pub async fn for_observation(&self, obs: &Observation) -> StorageResult<Option<Diagnosis>> {
        if obs.value_coded.is_none() {
            return Ok(None);
        }
        Ok(self.enrich(vec![obs.clone()]).await?.into_iter().next())
    }

    /// Every reference code mapped to a concept, in mapping order.
    pub async fn reference_codes(&self, concept_id: i64) -> StorageResult<Vec<ReferenceCode>> {
        Ok(self
            .reference_codes_for(&BTreeSet::from([concept_id]))
            .await?
            .remove(&concept_id)
            .unwrap_or_default())
    }

    /// Builds the observation query for `filter`.
    ///
    /// Joined relations are expressed as subqueries evaluated by the store,
    /// so the size of the concept dictionary never reaches the statement's
    /// parameter list. Observations whose coded value names no stored concept
    /// are excluded here, which keeps `total_count` equal to what [`enrich`]
    /// can return.
    ///
    /// [`enrich`]: Self::enrich
    fn base_query(filter: &DiagnosisFilter) -> Query {
        let mut query = Query::new(Observation::TABLE)
            .filter(Predicate::eq("voided", false))
            .filter(Predicate::IsNotNull("value_coded"))
            .filter(Predicate::in_select(
                "value_coded",
                Subquery::new(Concept::TABLE, "concept_id"),
            ));

        if let Some(patient_id) = filter.patient_id {
            query = query.filter(Predicate::eq("person_id", patient_id));
        }
        if let Some(encounter_id) = filter.encounter_id {
            query = query.filter(Predicate::eq("encounter_id", encounter_id));
        }
        if let Some(concept_id) = filter.concept_id {
            query = query.filter(Predicate::eq("value_coded", concept_id));
        }
        if let Some(visit_id) = filter.visit_id {
            query = query.filter(Predicate::in_select(
                "encounter_id",
                Subquery::new(Encounter::TABLE, "encounter_id")
                    .filter(Predicate::eq("visit_id", visit_id))
                    .filter(Predicate::eq("voided", false)),
            ));
        }
        if let Some(source_name) = &filter.source_name {
            query = query.filter(Predicate::in_select(
                "value_coded",
                mapped_concepts(Some(source_name)),
            ));
        }
        match filter.has_reference_codes {
            Some(true) => {
                query = query.filter(Predicate::in_select("value_coded", mapped_concepts(None)));
            }
            Some(false) => {
                query = query.filter(Predicate::not_in_select("value_coded", mapped_concepts(None)));
            }
            None => {}
        }
        query
    }

    async fn enrich(&self, observations: Vec<Observation>) -> StorageResult<Vec<Diagnosis>> {
        if observations.is_empty() {
            return Ok(Vec::new());
        }
        let concept_ids: BTreeSet<i64> = observations.iter().filter_map(|o| o.value_coded).collect();
        let person_ids: BTreeSet<i64> = observations.iter().map(|o| o.person_id).collect();
        let encounter_ids: BTreeSet<i64> =
            observations.iter().filter_map(|o| o.encounter_id).collect();

        let concepts = self.concepts(&concept_ids).await?;
        let patients = patient_summaries(self.store.as_ref(), &person_ids).await?;
        let encounters = encounter_summaries(self.store.as_ref(), &encounter_ids).await?;

        let mut diagnoses = Vec::with_capacity(observations.len());
        for obs in observations {
            let Some(concept_id) = obs.value_coded else {
                continue;
            };
            // Only reachable through `for_observation`; listings exclude
            // dangling coded values in the store.
            let Some(concept) = concepts.get(&concept_id).cloned() else {
                debug!(obs_id = obs.obs_id, concept_id, "Coded value references unknown concept");
                continue;
            };
            let patient = patients
                .get(&obs.person_id)
                .cloned()
                .unwrap_or_else(|| unknown_patient(obs.person_id));
            diagnoses.push(Diagnosis {
                obs_id: obs.obs_id,
                uuid: obs.uuid,
                obs_datetime: obs.obs_datetime,
                concept,
                patient,
                encounter: obs.encounter_id.and_then(|id| encounters.get(&id).cloned()),
                comments: obs.comments,
                status: obs.status,
                interpretation: obs.interpretation,
            });
        }
        Ok(diagnoses)
    }

    async fn concepts(&self, ids: &BTreeSet<i64>) -> StorageResult<HashMap<i64, DiagnosisConcept>> {
        let query = Query::new(Concept::TABLE).filter(Predicate::is_in("concept_id", ids.iter().copied()));
        let concepts: Vec<Concept> = select_entities(self.store.as_ref(), &query).await?;

        let names = Query::new(ConceptName::TABLE)
            .filter(Predicate::is_in("concept_id", ids.iter().copied()))
            .filter(Predicate::eq("locale", DISPLAY_LOCALE))
            .filter(Predicate::eq("voided", false));
        let names: Vec<ConceptName> = select_entities(self.store.as_ref(), &names).await?;
        let mut codes = self.reference_codes_for(ids).await?;

        Ok(concepts
            .into_iter()
            .map(|concept| {
                let name = display_name(&names, concept.concept_id)
                    .or_else(|| concept.short_name.clone());
                let view = DiagnosisConcept {
                    concept_id: concept.concept_id,
                    uuid: concept.uuid,
                    name,
                    short_name: concept.short_name,
                    description: concept.description,
                    reference_codes: codes.remove(&concept.concept_id).unwrap_or_default(),
                };
                (view.concept_id, view)
            })
            .collect())
    }

    async fn reference_codes_for(
        &self,
        concept_ids: &BTreeSet<i64>,
    ) -> StorageResult<HashMap<i64, Vec<ReferenceCode>>> {
        let maps = Query::new(ReferenceMap::TABLE)
            .filter(Predicate::is_in("concept_id", concept_ids.iter().copied()));
        let maps: Vec<ReferenceMap> = select_entities(self.store.as_ref(), &maps).await?;
        if maps.is_empty() {
            return Ok(HashMap::new());
        }

        let term_ids: BTreeSet<i64> = maps.iter().map(|m| m.concept_reference_term_id).collect();
        let terms = Query::new(ReferenceTerm::TABLE)
            .filter(Predicate::is_in("concept_reference_term_id", term_ids));
        let terms: HashMap<i64, ReferenceTerm> =
            select_entities::<ReferenceTerm, S>(self.store.as_ref(), &terms)
                .await?
                .into_iter()
                .map(|t| (t.concept_reference_term_id, t))
                .collect();

        let source_ids: BTreeSet<i64> = terms.values().map(|t| t.concept_source_id).collect();
        let sources = Query::new(ReferenceSource::TABLE)
            .filter(Predicate::is_in("concept_source_id", source_ids));
        let sources: HashMap<i64, ReferenceSource> =
            select_entities::<ReferenceSource, S>(self.store.as_ref(), &sources)
                .await?
                .into_iter()
                .map(|s| (s.concept_source_id, s))
                .collect();

        let mut codes: HashMap<i64, Vec<ReferenceCode>> = HashMap::new();
        for map in maps {
            let Some(term) = terms.get(&map.concept_reference_term_id) else {
                continue;
            };
            let source = sources.get(&term.concept_source_id);
            codes.entry(map.concept_id).or_default().push(ReferenceCode {
                code: term.code.clone(),
                name: term.name.clone(),
                version: term.version.clone(),
                description: term.description.clone(),
                source_name: source.map(|s| s.name.clone()),
                source_description: source.and_then(|s| s.description.clone()),
                hl7_code: source.and_then(|s| s.hl7_code.clone()),
            });
        }
        Ok(codes)
    }
}

/// Patient summaries keyed by person id, with the preferred usable name.
pub(super) async fn patient_summaries<S: Store + ?Sized>(
    store: &S,
    ids: &BTreeSet<i64>,
) -> StorageResult<HashMap<i64, PatientSummary>> {
    let people = Query::new(Person::TABLE).filter(Predicate::is_in("person_id", ids.iter().copied()));
    let people: Vec<Person> = select_entities(store, &people).await?;

    let names = Query::new(PersonName::TABLE)
        .filter(Predicate::is_in("person_id", ids.iter().copied()))
        .filter(Predicate::eq("voided", false))
        .order_by("preferred", SortDirection::Descending);
    let names: Vec<PersonName> = select_entities(store, &names).await?;

    Ok(people
        .into_iter()
        .map(|person| {
            let name = names
                .iter()
                .filter(|n| n.person_id == person.person_id)
                .find_map(PersonName::display)
                .unwrap_or_else(|| UNKNOWN_PATIENT.to_string());
            let summary = PatientSummary {
                patient_id: person.person_id,
                uuid: Some(person.uuid),
                name,
                gender: person.gender,
                birthdate: person.birthdate,
            };
            (summary.patient_id, summary)
        })
        .collect())
}

/// Encounter summaries keyed by encounter id.
pub(super) async fn encounter_summaries<S: Store + ?Sized>(
    store: &S,
    ids: &BTreeSet<i64>,
) -> StorageResult<HashMap<i64, EncounterSummary>> {
    if ids.is_empty() {
        return Ok(HashMap::new());
    }
    let query = Query::new(Encounter::TABLE)
        .filter(Predicate::is_in("encounter_id", ids.iter().copied()));
    let encounters: Vec<Encounter> = select_entities(store, &query).await?;
    Ok(encounters
        .into_iter()
        .map(|e| {
            (
                e.encounter_id,
                EncounterSummary {
                    encounter_id: e.encounter_id,
                    uuid: e.uuid,
                    encounter_datetime: e.encounter_datetime,
                    encounter_type: e.encounter_type,
                    location_id: e.location_id,
                    visit_id: e.visit_id,
                },
            )
        })
        .collect())
}

/// Concept ids with at least one reference mapping, optionally restricted to
/// the terminology named `source_name`.
fn mapped_concepts(source_name: Option<&str>) -> Subquery {
    let maps = Subquery::new(ReferenceMap::TABLE, "concept_id");
    match source_name {
        None => maps,
        Some(source_name) => maps.filter(Predicate::in_select(
            "concept_reference_term_id",
            Subquery::new(ReferenceTerm::TABLE, "concept_reference_term_id").filter(
                Predicate::in_select(
                    "concept_source_id",
                    Subquery::new(ReferenceSource::TABLE, "concept_source_id")
                        .filter(Predicate::eq("name", source_name)),
                ),
            ),
        )),
    }
}

/// Fully specified name first, then the locale-preferred name, then any.
pub(super) fn display_name(names: &[ConceptName], concept_id: i64) -> Option<String> {
    let candidates: Vec<&ConceptName> = names.iter().filter(|n| n.concept_id == concept_id).collect();
    candidates
        .iter()
        .find(|n| n.is_fully_specified())
        .or_else(|| candidates.iter().find(|n| n.locale_preferred))
        .or_else(|| candidates.first())
        .map(|n| n.name.clone())
}

pub(super) fn unknown_patient(patient_id: i64) -> PatientSummary {
    PatientSummary {
        patient_id,
        uuid: None,
        name: UNKNOWN_PATIENT.to_string(),
        gender: None,
        birthdate: None,
    }
}
