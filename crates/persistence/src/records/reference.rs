//! Read-only relations joined by the diagnosis, vitals and provider views:
//! concept names and classes, reference terminology mappings and people.

use chrono::NaiveDate;
use serde::Serialize;

use crate::core::Entity;
use crate::error::PersistenceError;
use crate::types::{Row, TableSpec};

/// Name type of the canonical, fully specified concept name.
pub const FULLY_SPECIFIED: &str = "FULLY_SPECIFIED";

const CONCEPT_NAME: TableSpec = TableSpec {
    name: "concept_name",
    id_column: "concept_name_id",
    columns: crate::columns![
        "concept_name_id": Integer,
        "concept_id": Integer,
        "name": Text,
        "locale": Text,
        "locale_preferred": Bool,
        "concept_name_type": Text,
        "voided": Bool,
        "uuid": Text,
    ],
};

/// A localized name of a concept.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConceptName {
    pub concept_name_id: i64,
    pub concept_id: i64,
    pub name: String,
    pub locale: String,
    pub locale_preferred: bool,
    pub concept_name_type: Option<String>,
    pub voided: bool,
    pub uuid: String,
}

impl ConceptName {
    /// True for the fully specified name.
    pub fn is_fully_specified(&self) -> bool {
        self.concept_name_type.as_deref() == Some(FULLY_SPECIFIED)
    }
}

impl Entity for ConceptName {
    const TABLE: &'static TableSpec = &CONCEPT_NAME;

    fn from_row(row: &Row) -> Result<Self, PersistenceError> {
        Ok(Self {
            concept_name_id: row.integer("concept_name_id")?,
            concept_id: row.integer("concept_id")?,
            name: row.text("name")?,
            locale: row.text("locale")?,
            locale_preferred: row.bool("locale_preferred")?,
            concept_name_type: row.opt_text("concept_name_type")?,
            voided: row.bool("voided")?,
            uuid: row.text("uuid")?,
        })
    }
}

const REFERENCE_SOURCE: TableSpec = TableSpec {
    name: "concept_reference_source",
    id_column: "concept_source_id",
    columns: crate::columns![
        "concept_source_id": Integer,
        "name": Text,
        "description": Text,
        "hl7_code": Text,
        "retired": Bool,
        "uuid": Text,
    ],
};

/// An external terminology, e.g. ICD-10-WHO or SNOMED CT.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReferenceSource {
    pub concept_source_id: i64,
    pub name: String,
    pub description: Option<String>,
    pub hl7_code: Option<String>,
    pub retired: bool,
    pub uuid: String,
}

impl Entity for ReferenceSource {
    const TABLE: &'static TableSpec = &REFERENCE_SOURCE;

    fn from_row(row: &Row) -> Result<Self, PersistenceError> {
        Ok(Self {
            concept_source_id: row.integer("concept_source_id")?,
            name: row.text("name")?,
            description: row.opt_text("description")?,
            hl7_code: row.opt_text("hl7_code")?,
            retired: row.bool("retired")?,
            uuid: row.text("uuid")?,
        })
    }
}

const REFERENCE_TERM: TableSpec = TableSpec {
    name: "concept_reference_term",
    id_column: "concept_reference_term_id",
    columns: crate::columns![
        "concept_reference_term_id": Integer,
        "concept_source_id": Integer,
        "code": Text,
        "name": Text,
        "version": Text,
        "description": Text,
        "retired": Bool,
        "uuid": Text,
    ],
};

/// A code within an external terminology.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReferenceTerm {
    pub concept_reference_term_id: i64,
    pub concept_source_id: i64,
    pub code: String,
    pub name: Option<String>,
    pub version: Option<String>,
    pub description: Option<String>,
    pub retired: bool,
    pub uuid: String,
}

impl Entity for ReferenceTerm {
    const TABLE: &'static TableSpec = &REFERENCE_TERM;

    fn from_row(row: &Row) -> Result<Self, PersistenceError> {
        Ok(Self {
            concept_reference_term_id: row.integer("concept_reference_term_id")?,
            concept_source_id: row.integer("concept_source_id")?,
            code: row.text("code")?,
            name: row.opt_text("name")?,
            version: row.opt_text("version")?,
            description: row.opt_text("description")?,
            retired: row.bool("retired")?,
            uuid: row.text("uuid")?,
        })
    }
}

const REFERENCE_MAP: TableSpec = TableSpec {
    name: "concept_reference_map",
    id_column: "concept_map_id",
    columns: crate::columns![
        "concept_map_id": Integer,
        "concept_id": Integer,
        "concept_reference_term_id": Integer,
        "uuid": Text,
    ],
};

/// Links a concept to a reference term.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReferenceMap {
    pub concept_map_id: i64,
    pub concept_id: i64,
    pub concept_reference_term_id: i64,
    pub uuid: String,
}

impl Entity for ReferenceMap {
    const TABLE: &'static TableSpec = &REFERENCE_MAP;

    fn from_row(row: &Row) -> Result<Self, PersistenceError> {
        Ok(Self {
            concept_map_id: row.integer("concept_map_id")?,
            concept_id: row.integer("concept_id")?,
            concept_reference_term_id: row.integer("concept_reference_term_id")?,
            uuid: row.text("uuid")?,
        })
    }
}

const CONCEPT_CLASS: TableSpec = TableSpec {
    name: "concept_class",
    id_column: "concept_class_id",
    columns: crate::columns![
        "concept_class_id": Integer,
        "name": Text,
        "description": Text,
        "retired": Bool,
        "uuid": Text,
    ],
};

/// Classification of concepts, such as `Diagnosis` or `Vitals`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConceptClass {
    pub concept_class_id: i64,
    pub name: String,
    pub description: Option<String>,
    pub retired: bool,
    pub uuid: String,
}

impl Entity for ConceptClass {
    const TABLE: &'static TableSpec = &CONCEPT_CLASS;

    fn from_row(row: &Row) -> Result<Self, PersistenceError> {
        Ok(Self {
            concept_class_id: row.integer("concept_class_id")?,
            name: row.text("name")?,
            description: row.opt_text("description")?,
            retired: row.bool("retired")?,
            uuid: row.text("uuid")?,
        })
    }
}

const PERSON: TableSpec = TableSpec {
    name: "person",
    id_column: "person_id",
    columns: crate::columns![
        "person_id": Integer,
        "gender": Text,
        "birthdate": Text,
        "voided": Bool,
        "uuid": Text,
    ],
};

/// Demographic core of a patient.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Person {
    pub person_id: i64,
    pub gender: Option<String>,
    pub birthdate: Option<NaiveDate>,
    pub voided: bool,
    pub uuid: String,
}

impl Entity for Person {
    const TABLE: &'static TableSpec = &PERSON;

    fn from_row(row: &Row) -> Result<Self, PersistenceError> {
        let birthdate = row
            .opt_text("birthdate")?
            .map(|raw| {
                NaiveDate::parse_from_str(&raw, "%Y-%m-%d").map_err(|e| PersistenceError::Decode {
                    column: "birthdate".to_string(),
                    message: e.to_string(),
                })
            })
            .transpose()?;
        Ok(Self {
            person_id: row.integer("person_id")?,
            gender: row.opt_text("gender")?,
            birthdate,
            voided: row.bool("voided")?,
            uuid: row.text("uuid")?,
        })
    }
}

const PERSON_NAME: TableSpec = TableSpec {
    name: "person_name",
    id_column: "person_name_id",
    columns: crate::columns![
        "person_name_id": Integer,
        "person_id": Integer,
        "preferred": Bool,
        "prefix": Text,
        "given_name": Text,
        "middle_name": Text,
        "family_name": Text,
        "family_name2": Text,
        "family_name_suffix": Text,
        "voided": Bool,
        "uuid": Text,
    ],
};

/// One name of a person.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PersonName {
    pub person_name_id: i64,
    pub person_id: i64,
    pub preferred: bool,
    pub prefix: Option<String>,
    pub given_name: Option<String>,
    pub middle_name: Option<String>,
    pub family_name: Option<String>,
    pub family_name2: Option<String>,
    pub family_name_suffix: Option<String>,
    pub voided: bool,
    pub uuid: String,
}

impl PersonName {
    /// Non-empty name parts joined by spaces, or `None` if every part is
    /// empty.
    pub fn display(&self) -> Option<String> {
        let parts: Vec<&str> = [
            &self.prefix,
            &self.given_name,
            &self.middle_name,
            &self.family_name,
            &self.family_name2,
            &self.family_name_suffix,
        ]
        .into_iter()
        .filter_map(|part| part.as_deref())
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect();
        (!parts.is_empty()).then(|| parts.join(" "))
    }
}

impl Entity for PersonName {
    const TABLE: &'static TableSpec = &PERSON_NAME;

    fn from_row(row: &Row) -> Result<Self, PersistenceError> {
        Ok(Self {
            person_name_id: row.integer("person_name_id")?,
            person_id: row.integer("person_id")?,
            preferred: row.bool("preferred")?,
            prefix: row.opt_text("prefix")?,
            given_name: row.opt_text("given_name")?,
            middle_name: row.opt_text("middle_name")?,
            family_name: row.opt_text("family_name")?,
            family_name2: row.opt_text("family_name2")?,
            family_name_suffix: row.opt_text("family_name_suffix")?,
            voided: row.bool("voided")?,
            uuid: row.text("uuid")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(given: Option<&str>, family: Option<&str>) -> PersonName {
        PersonName {
            person_name_id: 1,
            person_id: 1,
            preferred: true,
            prefix: None,
            given_name: given.map(str::to_string),
            middle_name: Some("  ".to_string()),
            family_name: family.map(str::to_string),
            family_name2: None,
            family_name_suffix: None,
            voided: false,
            uuid: "a".to_string(),
        }
    }

    #[test]
    fn test_display_name_skips_blank_parts() {
        assert_eq!(
            name(Some("Amina"), Some("Okoro")).display().as_deref(),
            Some("Amina Okoro")
        );
        assert_eq!(name(None, None).display(), None);
    }

    #[test]
    fn test_person_birthdate_decoding() {
        let row = Row::new()
            .with("person_id", 3_i64)
            .with("gender", "F")
            .with("birthdate", "1990-04-12")
            .with("voided", false)
            .with("uuid", "p-3");
        let person = Person::from_row(&row).unwrap();
        assert_eq!(person.birthdate, NaiveDate::from_ymd_opt(1990, 4, 12));

        let bad = row.clone().with("birthdate", "12/04/1990");
        assert!(Person::from_row(&bad).is_err());
    }
}
