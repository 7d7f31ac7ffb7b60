//! Providers: people (or named accounts) who deliver care. Read only; each
//! provider is returned with the person behind it.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use tracing::debug;

use super::reference::{Person, PersonName};
use crate::core::{Entity, Store, Visibility, select_entities};
use crate::error::{PersistenceError, StorageResult};
use crate::types::{Identity, Page, Predicate, Query, Row, TableSpec, normalize_uuid};

const PROVIDER: TableSpec = TableSpec {
    name: "provider",
    id_column: "provider_id",
    columns: crate::columns![
        "provider_id": Integer,
        "uuid": Text,
        "person_id": Integer,
        "name": Text,
        "identifier": Text,
        "role_id": Integer,
        "speciality_id": Integer,
        "provider_role_id": Integer,
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

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Provider {
    pub provider_id: i64,
    pub uuid: String,
    pub person_id: Option<i64>,
    pub name: Option<String>,
    pub identifier: Option<String>,
    pub role_id: Option<i64>,
    pub speciality_id: Option<i64>,
    pub provider_role_id: Option<i64>,
    pub creator: i64,
    pub date_created: DateTime<Utc>,
    pub changed_by: Option<i64>,
    pub date_changed: Option<DateTime<Utc>>,
    pub retired: bool,
    pub retired_by: Option<i64>,
    pub date_retired: Option<DateTime<Utc>>,
    pub retire_reason: Option<String>,
}

impl Entity for Provider {
    const TABLE: &'static TableSpec = &PROVIDER;

    fn from_row(row: &Row) -> Result<Self, PersistenceError> {
        Ok(Self {
            provider_id: row.integer("provider_id")?,
            uuid: row.text("uuid")?,
            person_id: row.opt_integer("person_id")?,
            name: row.opt_text("name")?,
            identifier: row.opt_text("identifier")?,
            role_id: row.opt_integer("role_id")?,
            speciality_id: row.opt_integer("speciality_id")?,
            provider_role_id: row.opt_integer("provider_role_id")?,
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

/// The person behind a provider.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProviderPerson {
    pub person_id: i64,
    pub uuid: String,
    pub gender: Option<String>,
    pub birthdate: Option<NaiveDate>,
    /// Preferred name, `None` when the person has no usable name.
    pub full_name: Option<String>,
}

/// A provider with its person.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProviderDetails {
    #[serde(flatten)]
    pub provider: Provider,
    pub person: Option<ProviderPerson>,
}

/// One page of providers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProviderPage {
    pub providers: Vec<ProviderDetails>,
    pub total_count: u64,
    pub skip: u64,
    pub limit: u64,
}

/// Read-side accessor for providers.
pub struct ProviderAccessor<S: ?Sized> {
    store: Arc<S>,
}

impl<S: ?Sized> Clone for ProviderAccessor<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: Store + ?Sized> ProviderAccessor<S> {
    /// Creates an accessor over `store`.
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Lists providers in id order.
    pub async fn list(&self, visibility: Visibility, page: Page) -> StorageResult<ProviderPage> {
        let base = Query::new(Provider::TABLE).filters(match visibility {
            Visibility::ActiveOnly => Some(Predicate::eq("retired", false)),
            Visibility::RetiredOnly => Some(Predicate::eq("retired", true)),
            Visibility::IncludeRetired => None,
        });
        let total_count = self.store.count(&base).await?;
        let providers: Vec<Provider> =
            select_entities(self.store.as_ref(), &base.page(page)).await?;
        let providers = self.enrich(providers).await?;
        debug!(total_count, returned = providers.len(), "Listed providers");

        Ok(ProviderPage {
            providers,
            total_count,
            skip: page.skip,
            limit: page.limit,
        })
    }

    /// A provider by id or UUID, retired or not.
    pub async fn fetch(&self, identity: &Identity) -> StorageResult<Option<ProviderDetails>> {
        let predicate = match identity {
            Identity::Id(id) => Predicate::eq("provider_id", *id),
            Identity::Uuid(uuid) => Predicate::eq("uuid", normalize_uuid(uuid)?),
        };
        let query = Query::new(Provider::TABLE).filter(predicate);
        let providers: Vec<Provider> = select_entities(self.store.as_ref(), &query).await?;
        Ok(self.enrich(providers).await?.into_iter().next())
    }

    async fn enrich(&self, providers: Vec<Provider>) -> StorageResult<Vec<ProviderDetails>> {
        let person_ids: BTreeSet<i64> = providers.iter().filter_map(|p| p.person_id).collect();
        let mut people = self.people(&person_ids).await?;
        Ok(providers
            .into_iter()
            .map(|provider| ProviderDetails {
                person: provider.person_id.and_then(|id| people.remove(&id)),
                provider,
            })
            .collect())
    }

    /// Active people keyed by id, each with their preferred name.
    async fn people(&self, ids: &BTreeSet<i64>) -> StorageResult<HashMap<i64, ProviderPerson>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let people = Query::new(Person::TABLE)
            .filter(Predicate::is_in("person_id", ids.iter().copied()))
            .filter(Predicate::eq("voided", false));
        let people: Vec<Person> = select_entities(self.store.as_ref(), &people).await?;
        let names = Query::new(PersonName::TABLE)
            .filter(Predicate::is_in("person_id", ids.iter().copied()))
            .filter(Predicate::eq("preferred", true))
            .filter(Predicate::eq("voided", false));
        let names: Vec<PersonName> = select_entities(self.store.as_ref(), &names).await?;

        Ok(people
            .into_iter()
            .map(|person| {
                let full_name = names
                    .iter()
                    .filter(|n| n.person_id == person.person_id)
                    .find_map(PersonName::display);
                let view = ProviderPerson {
                    person_id: person.person_id,
                    uuid: person.uuid,
                    gender: person.gender,
                    birthdate: person.birthdate,
                    full_name,
                };
                (view.person_id, view)
            })
            .collect())
    }
}
