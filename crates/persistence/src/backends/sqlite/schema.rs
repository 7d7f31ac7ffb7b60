//! SQLite schema definitions and migrations.
//!
//! Column names and types mirror the `TableSpec` descriptors of the records
//! in [`crate::records`]. Timestamps are written as UTC text in
//! `TIMESTAMP_FORMAT`, but rows loaded by other tools may carry
//! `YYYY-MM-DD HH:MM:SS` or a different number of fractional digits. The
//! store therefore never compares timestamp columns as text: range bounds
//! and `ORDER BY` go through `julianday()`.

use rusqlite::Connection;

use crate::error::{PersistenceError, StorageResult};

/// Current schema version.
pub const SCHEMA_VERSION: i32 = 3;

/// Initialize the database schema.
pub fn initialize_schema(conn: &Connection) -> StorageResult<()> {
    let current_version = get_schema_version(conn)?;

    if current_version == 0 {
        create_schema_v1(conn)?;
        set_schema_version(conn, 1)?;
        migrate_schema(conn, 1)?;
    } else if current_version < SCHEMA_VERSION {
        migrate_schema(conn, current_version)?;
    }

    Ok(())
}

fn migration_error(context: &str, e: rusqlite::Error) -> PersistenceError {
    PersistenceError::MigrationError {
        message: format!("{}: {}", context, e),
    }
}

/// Get the current schema version.
pub(crate) fn get_schema_version(conn: &Connection) -> StorageResult<i32> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER NOT NULL
        )",
        [],
    )
    .map_err(|e| migration_error("Failed to create schema_version table", e))?;

    let version: Option<i32> = conn
        .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| {
            row.get(0)
        })
        .ok();

    Ok(version.unwrap_or(0))
}

/// Set the schema version.
fn set_schema_version(conn: &Connection, version: i32) -> StorageResult<()> {
    conn.execute("DELETE FROM schema_version", [])
        .map_err(|e| migration_error("Failed to clear schema_version", e))?;
    conn.execute("INSERT INTO schema_version (version) VALUES (?1)", [version])
        .map_err(|e| migration_error("Failed to set schema_version", e))?;
    Ok(())
}

/// Create the initial schema (version 1).
pub(crate) fn create_schema_v1(conn: &Connection) -> StorageResult<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS person (
            person_id INTEGER PRIMARY KEY AUTOINCREMENT,
            gender TEXT,
            birthdate TEXT,
            voided INTEGER NOT NULL DEFAULT 0,
            uuid TEXT NOT NULL UNIQUE
        );

        CREATE TABLE IF NOT EXISTS person_name (
            person_name_id INTEGER PRIMARY KEY AUTOINCREMENT,
            person_id INTEGER NOT NULL REFERENCES person(person_id),
            preferred INTEGER NOT NULL DEFAULT 0,
            prefix TEXT,
            given_name TEXT,
            middle_name TEXT,
            family_name TEXT,
            family_name2 TEXT,
            family_name_suffix TEXT,
            voided INTEGER NOT NULL DEFAULT 0,
            uuid TEXT NOT NULL UNIQUE
        );

        CREATE TABLE IF NOT EXISTS visit (
            visit_id INTEGER PRIMARY KEY AUTOINCREMENT,
            patient_id INTEGER NOT NULL,
            visit_type_id INTEGER,
            location_id INTEGER,
            date_started TEXT NOT NULL,
            date_stopped TEXT,
            voided INTEGER NOT NULL DEFAULT 0,
            uuid TEXT NOT NULL UNIQUE
        );

        CREATE TABLE IF NOT EXISTS concept (
            concept_id INTEGER PRIMARY KEY AUTOINCREMENT,
            uuid TEXT NOT NULL UNIQUE,
            short_name TEXT,
            description TEXT,
            form_text TEXT,
            datatype_id INTEGER,
            class_id INTEGER,
            is_set INTEGER NOT NULL DEFAULT 0,
            version TEXT,
            creator INTEGER NOT NULL,
            date_created TEXT NOT NULL,
            changed_by INTEGER,
            date_changed TEXT,
            retired INTEGER NOT NULL DEFAULT 0,
            retired_by INTEGER,
            date_retired TEXT,
            retire_reason TEXT
        );

        CREATE TABLE IF NOT EXISTS concept_name (
            concept_name_id INTEGER PRIMARY KEY AUTOINCREMENT,
            concept_id INTEGER NOT NULL REFERENCES concept(concept_id),
            name TEXT NOT NULL,
            locale TEXT NOT NULL,
            locale_preferred INTEGER NOT NULL DEFAULT 0,
            concept_name_type TEXT,
            voided INTEGER NOT NULL DEFAULT 0,
            uuid TEXT NOT NULL UNIQUE
        );

        CREATE TABLE IF NOT EXISTS concept_reference_source (
            concept_source_id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            description TEXT,
            hl7_code TEXT,
            retired INTEGER NOT NULL DEFAULT 0,
            uuid TEXT NOT NULL UNIQUE
        );

        CREATE TABLE IF NOT EXISTS concept_reference_term (
            concept_reference_term_id INTEGER PRIMARY KEY AUTOINCREMENT,
            concept_source_id INTEGER NOT NULL
                REFERENCES concept_reference_source(concept_source_id),
            code TEXT NOT NULL,
            name TEXT,
            version TEXT,
            description TEXT,
            retired INTEGER NOT NULL DEFAULT 0,
            uuid TEXT NOT NULL UNIQUE
        );

        CREATE TABLE IF NOT EXISTS concept_reference_map (
            concept_map_id INTEGER PRIMARY KEY AUTOINCREMENT,
            concept_id INTEGER NOT NULL REFERENCES concept(concept_id),
            concept_reference_term_id INTEGER NOT NULL
                REFERENCES concept_reference_term(concept_reference_term_id),
            uuid TEXT NOT NULL UNIQUE
        );

        CREATE TABLE IF NOT EXISTS encounter (
            encounter_id INTEGER PRIMARY KEY AUTOINCREMENT,
            uuid TEXT NOT NULL UNIQUE,
            encounter_type INTEGER NOT NULL,
            patient_id INTEGER NOT NULL,
            location_id INTEGER,
            form_id INTEGER,
            encounter_datetime TEXT NOT NULL,
            visit_id INTEGER,
            creator INTEGER,
            date_created TEXT NOT NULL,
            changed_by INTEGER,
            date_changed TEXT,
            voided INTEGER NOT NULL DEFAULT 0,
            voided_by INTEGER,
            date_voided TEXT,
            void_reason TEXT
        );

        CREATE TABLE IF NOT EXISTS orders (
            order_id INTEGER PRIMARY KEY AUTOINCREMENT,
            uuid TEXT NOT NULL UNIQUE,
            order_type_id INTEGER,
            concept_id INTEGER NOT NULL,
            orderer INTEGER,
            encounter_id INTEGER,
            patient_id INTEGER NOT NULL,
            care_setting INTEGER NOT NULL,
            instructions TEXT,
            urgency TEXT NOT NULL DEFAULT 'ROUTINE',
            order_action TEXT NOT NULL DEFAULT 'NEW',
            order_number TEXT,
            accession_number TEXT,
            date_activated TEXT,
            auto_expire_date TEXT,
            date_stopped TEXT,
            scheduled_date TEXT,
            order_reason_non_coded TEXT,
            previous_order_id INTEGER,
            comment_to_fulfiller TEXT,
            fulfiller_status TEXT,
            fulfiller_comment TEXT,
            creator INTEGER,
            date_created TEXT NOT NULL,
            changed_by INTEGER,
            date_changed TEXT,
            voided INTEGER NOT NULL DEFAULT 0,
            voided_by INTEGER,
            date_voided TEXT,
            void_reason TEXT
        );

        CREATE TABLE IF NOT EXISTS obs (
            obs_id INTEGER PRIMARY KEY AUTOINCREMENT,
            uuid TEXT NOT NULL UNIQUE,
            person_id INTEGER NOT NULL,
            concept_id INTEGER NOT NULL,
            encounter_id INTEGER,
            order_id INTEGER,
            obs_datetime TEXT NOT NULL,
            location_id INTEGER,
            obs_group_id INTEGER,
            accession_number TEXT,
            value_coded INTEGER,
            value_numeric REAL,
            value_text TEXT,
            value_datetime TEXT,
            comments TEXT,
            status TEXT NOT NULL DEFAULT 'FINAL',
            interpretation TEXT,
            creator INTEGER,
            date_created TEXT NOT NULL,
            changed_by INTEGER,
            date_changed TEXT,
            voided INTEGER NOT NULL DEFAULT 0,
            voided_by INTEGER,
            date_voided TEXT,
            void_reason TEXT
        );
        ",
    )
    .map_err(|e| migration_error("Failed to create base tables", e))?;

    Ok(())
}

/// Run schema migrations from current version to latest.
pub(crate) fn migrate_schema(conn: &Connection, from_version: i32) -> StorageResult<()> {
    let mut version = from_version;

    while version < SCHEMA_VERSION {
        match version {
            1 => migrate_v1_to_v2(conn)?,
            2 => migrate_v2_to_v3(conn)?,
            _ => {
                return Err(PersistenceError::MigrationError {
                    message: format!("Unknown schema version: {}", version),
                }
                .into());
            }
        }
        version += 1;
        set_schema_version(conn, version)?;
        tracing::info!(version, "Migrated SQLite schema");
    }

    Ok(())
}

/// Migrate from schema version 1 to version 2.
///
/// Adds lookup indexes for the foreign-key scoped listings and the diagnosis
/// views.
fn migrate_v1_to_v2(conn: &Connection) -> StorageResult<()> {
    let indexes = [
        "CREATE INDEX IF NOT EXISTS idx_orders_patient ON orders(patient_id, voided)",
        "CREATE INDEX IF NOT EXISTS idx_orders_encounter ON orders(encounter_id)",
        "CREATE INDEX IF NOT EXISTS idx_orders_number ON orders(order_number)",
        "CREATE INDEX IF NOT EXISTS idx_obs_person ON obs(person_id, voided)",
        "CREATE INDEX IF NOT EXISTS idx_obs_encounter ON obs(encounter_id)",
        "CREATE INDEX IF NOT EXISTS idx_obs_value_coded ON obs(value_coded, obs_datetime)",
        "CREATE INDEX IF NOT EXISTS idx_encounter_patient ON encounter(patient_id, voided)",
        "CREATE INDEX IF NOT EXISTS idx_encounter_visit ON encounter(visit_id)",
        "CREATE INDEX IF NOT EXISTS idx_concept_name_concept ON concept_name(concept_id, locale)",
        "CREATE INDEX IF NOT EXISTS idx_reference_map_concept ON concept_reference_map(concept_id)",
        "CREATE INDEX IF NOT EXISTS idx_reference_term_source ON concept_reference_term(concept_source_id)",
        "CREATE INDEX IF NOT EXISTS idx_person_name_person ON person_name(person_id)",
    ];

    for index_sql in &indexes {
        conn.execute(index_sql, [])
            .map_err(|e| migration_error("Failed to create index", e))?;
    }

    Ok(())
}

/// Migrate from schema version 2 to version 3.
///
/// Gives visits the audit and void columns of the other records and adds
/// the visit type, drug, order type, provider and concept class tables.
/// Visits that predate the migration get the epoch as `date_created`.
fn migrate_v2_to_v3(conn: &Connection) -> StorageResult<()> {
    let visit_columns = [
        "indication_concept_id INTEGER",
        "creator INTEGER",
        "date_created TEXT NOT NULL DEFAULT '1970-01-01T00:00:00.000000Z'",
        "changed_by INTEGER",
        "date_changed TEXT",
        "voided_by INTEGER",
        "date_voided TEXT",
        "void_reason TEXT",
    ];
    for column in &visit_columns {
        conn.execute(&format!("ALTER TABLE visit ADD COLUMN {}", column), [])
            .map_err(|e| migration_error("Failed to extend visit", e))?;
    }

    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS visit_type (
            visit_type_id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            description TEXT,
            creator INTEGER NOT NULL,
            date_created TEXT NOT NULL,
            changed_by INTEGER,
            date_changed TEXT,
            retired INTEGER NOT NULL DEFAULT 0,
            retired_by INTEGER,
            date_retired TEXT,
            retire_reason TEXT,
            uuid TEXT NOT NULL UNIQUE
        );

        CREATE TABLE IF NOT EXISTS order_type (
            order_type_id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            description TEXT,
            java_class_name TEXT,
            parent INTEGER REFERENCES order_type(order_type_id),
            creator INTEGER NOT NULL,
            date_created TEXT NOT NULL,
            changed_by INTEGER,
            date_changed TEXT,
            retired INTEGER NOT NULL DEFAULT 0,
            retired_by INTEGER,
            date_retired TEXT,
            retire_reason TEXT,
            uuid TEXT NOT NULL UNIQUE
        );

        CREATE TABLE IF NOT EXISTS drug (
            drug_id INTEGER PRIMARY KEY AUTOINCREMENT,
            concept_id INTEGER NOT NULL,
            name TEXT NOT NULL,
            combination INTEGER NOT NULL DEFAULT 0,
            dosage_form INTEGER,
            maximum_daily_dose REAL,
            minimum_daily_dose REAL,
            route INTEGER,
            strength TEXT,
            dose_limit_units INTEGER,
            creator INTEGER NOT NULL,
            date_created TEXT NOT NULL,
            changed_by INTEGER,
            date_changed TEXT,
            retired INTEGER NOT NULL DEFAULT 0,
            retired_by INTEGER,
            date_retired TEXT,
            retire_reason TEXT,
            uuid TEXT NOT NULL UNIQUE
        );

        CREATE TABLE IF NOT EXISTS provider (
            provider_id INTEGER PRIMARY KEY AUTOINCREMENT,
            person_id INTEGER,
            name TEXT,
            identifier TEXT,
            role_id INTEGER,
            speciality_id INTEGER,
            provider_role_id INTEGER,
            creator INTEGER NOT NULL,
            date_created TEXT NOT NULL,
            changed_by INTEGER,
            date_changed TEXT,
            retired INTEGER NOT NULL DEFAULT 0,
            retired_by INTEGER,
            date_retired TEXT,
            retire_reason TEXT,
            uuid TEXT NOT NULL UNIQUE
        );

        CREATE TABLE IF NOT EXISTS concept_class (
            concept_class_id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            description TEXT,
            retired INTEGER NOT NULL DEFAULT 0,
            uuid TEXT NOT NULL UNIQUE
        );

        CREATE INDEX IF NOT EXISTS idx_visit_patient ON visit(patient_id, voided);
        CREATE INDEX IF NOT EXISTS idx_drug_concept ON drug(concept_id);
        CREATE INDEX IF NOT EXISTS idx_provider_person ON provider(person_id);
        ",
    )
    .map_err(|e| migration_error("Failed to create v3 tables", e))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index_count(conn: &Connection) -> i64 {
        conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'index' AND name LIKE 'idx_%'",
            [],
            |row| row.get(0),
        )
        .unwrap()
    }

    #[test]
    fn test_fresh_database_reaches_current_version() {
        let conn = Connection::open_in_memory().unwrap();
        initialize_schema(&conn).unwrap();
        assert_eq!(get_schema_version(&conn).unwrap(), SCHEMA_VERSION);
        assert!(index_count(&conn) > 0);
    }

    #[test]
    fn test_v1_database_is_migrated() {
        let conn = Connection::open_in_memory().unwrap();
        get_schema_version(&conn).unwrap();
        create_schema_v1(&conn).unwrap();
        set_schema_version(&conn, 1).unwrap();
        assert_eq!(index_count(&conn), 0);

        initialize_schema(&conn).unwrap();
        assert_eq!(get_schema_version(&conn).unwrap(), 3);
        assert_eq!(index_count(&conn), 15);
    }

    #[test]
    fn test_v2_visits_keep_their_rows() {
        let conn = Connection::open_in_memory().unwrap();
        get_schema_version(&conn).unwrap();
        create_schema_v1(&conn).unwrap();
        migrate_v1_to_v2(&conn).unwrap();
        set_schema_version(&conn, 2).unwrap();
        conn.execute(
            "INSERT INTO visit (patient_id, date_started, uuid) VALUES (1, '2024-03-01 07:00:00', 'v')",
            [],
        )
        .unwrap();

        initialize_schema(&conn).unwrap();
        let (created, voided_by): (String, Option<i64>) = conn
            .query_row("SELECT date_created, voided_by FROM visit", [], |row| {
                Ok((row.get(0)?, row.get(1)?))
            })
            .unwrap();
        assert_eq!(created, "1970-01-01T00:00:00.000000Z");
        assert_eq!(voided_by, None);
    }

    #[test]
    fn test_unknown_version_is_rejected() {
        let conn = Connection::open_in_memory().unwrap();
        get_schema_version(&conn).unwrap();
        let err = migrate_schema(&conn, 0).unwrap_err();
        assert!(err.to_string().contains("Unknown schema version"));
    }
}
