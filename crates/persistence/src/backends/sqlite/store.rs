//! [`Store`] implementation for SQLite.
//!
//! Queries are rendered from [`Query`] descriptions into parameterized SQL.
//! Identifiers come from the static [`TableSpec`]s and are validated before
//! rendering; every value is bound as a parameter.
//!
//! Timestamp comparisons and timestamp ordering go through `julianday()`, so
//! rows written by other tools as `YYYY-MM-DD HH:MM:SS` sort together with
//! rows in [`TIMESTAMP_FORMAT`].

use async_trait::async_trait;
use rusqlite::types::{Value, ValueRef};
use rusqlite::{Connection, TransactionBehavior, params_from_iter};

use crate::core::{Store, WriteBatch, WriteOp, WriteOutcome};
use crate::error::{PersistenceError, StorageResult, ValidationError};
use crate::types::{
    Column, ColumnKind, FieldValue, Predicate, Query, Row, SortDirection, Subquery,
    TIMESTAMP_FORMAT, TableSpec, parse_timestamp,
};

use super::SqliteBackend;

#[async_trait]
impl Store for SqliteBackend {
    fn backend_name(&self) -> &'static str {
        "sqlite"
    }

    async fn select(&self, query: &Query) -> StorageResult<Vec<Row>> {
        query.validate()?;
        let conn = self.get_connection()?;
        let rows = select_rows(&conn, query)?;
        tracing::trace!(table = query.table.name, rows = rows.len(), "select");
        Ok(rows)
    }

    async fn count(&self, query: &Query) -> StorageResult<u64> {
        query.validate()?;
        let conn = self.get_connection()?;
        let mut params = Vec::new();
        let sql = format!(
            "SELECT COUNT(*) FROM {}{}",
            quote(query.table.name),
            where_clause(&query.predicates, &mut params)
        );
        let count: i64 = conn.query_row(&sql, params_from_iter(params.iter()), |row| row.get(0))?;
        Ok(u64::try_from(count).unwrap_or(0))
    }

    async fn commit(&self, batch: WriteBatch) -> StorageResult<Vec<WriteOutcome>> {
        for op in batch.ops() {
            let (table, row) = match op {
                WriteOp::Insert { table, row } | WriteOp::Update { table, row, .. } => {
                    (*table, row)
                }
            };
            check_columns(table, row)?;
        }

        let mut conn = self.get_connection()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let mut outcomes = Vec::with_capacity(batch.ops().len());
        for op in batch {
            match apply(&tx, op) {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => {
                    // Dropping the transaction rolls it back.
                    tracing::warn!(error = %e, "Write batch rolled back");
                    return Err(e.into());
                }
            }
        }
        tx.commit()?;
        Ok(outcomes)
    }

    async fn health_check(&self) -> StorageResult<()> {
        let conn = self.get_connection()?;
        conn.query_row("SELECT 1", [], |_| Ok(()))?;
        Ok(())
    }
}

fn quote(identifier: &str) -> String {
    format!("\"{}\"", identifier)
}

fn bind(value: &FieldValue) -> Value {
    match value {
        FieldValue::Null => Value::Null,
        FieldValue::Bool(v) => Value::Integer(i64::from(*v)),
        FieldValue::Integer(v) => Value::Integer(*v),
        FieldValue::Real(v) => Value::Real(*v),
        FieldValue::Text(v) => Value::Text(v.clone()),
        FieldValue::Timestamp(v) => Value::Text(v.format(TIMESTAMP_FORMAT).to_string()),
    }
}

/// Escapes `LIKE` wildcards so the pattern matches literally.
fn escape_like(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn placeholders(values: &[FieldValue], params: &mut Vec<Value>) -> String {
    params.extend(values.iter().map(bind));
    vec!["?"; values.len()].join(", ")
}

fn render(predicate: &Predicate, params: &mut Vec<Value>) -> String {
    match predicate {
        Predicate::Eq(column, FieldValue::Null) | Predicate::IsNull(column) => {
            format!("{} IS NULL", quote(column))
        }
        Predicate::Eq(column, value) => {
            params.push(bind(value));
            format!("{} = ?", quote(column))
        }
        Predicate::Gte(column, value) => compare(column, ">=", value, params),
        Predicate::Lte(column, value) => compare(column, "<=", value, params),
        Predicate::IsNotNull(column) => format!("{} IS NOT NULL", quote(column)),
        Predicate::In(_, values) if values.is_empty() => "0".to_string(),
        Predicate::In(column, values) => {
            format!("{} IN ({})", quote(column), placeholders(values, params))
        }
        Predicate::NotIn(_, values) if values.is_empty() => "1".to_string(),
        Predicate::NotIn(column, values) => {
            format!("{} NOT IN ({})", quote(column), placeholders(values, params))
        }
        Predicate::Contains(column, needle) => {
            params.push(Value::Text(format!("%{}%", escape_like(needle))));
            format!("{} LIKE ? ESCAPE '\\'", quote(column))
        }
        Predicate::AnyOf(inner) if inner.is_empty() => "0".to_string(),
        Predicate::AnyOf(inner) => join(inner, " OR ", params),
        Predicate::AllOf(inner) if inner.is_empty() => "1".to_string(),
        Predicate::AllOf(inner) => join(inner, " AND ", params),
        Predicate::InSelect(column, sub) => {
            format!("{} IN ({})", quote(column), subselect(sub, None, params))
        }
        Predicate::NotInSelect(column, sub) => {
            let non_null = Predicate::IsNotNull(sub.column);
            format!(
                "{} NOT IN ({})",
                quote(column),
                subselect(sub, Some(&non_null), params)
            )
        }
    }
}

fn compare(column: &str, operator: &str, value: &FieldValue, params: &mut Vec<Value>) -> String {
    params.push(bind(value));
    match value {
        FieldValue::Timestamp(_) => format!("julianday({}) {} julianday(?)", quote(column), operator),
        _ => format!("{} {} ?", quote(column), operator),
    }
}

fn subselect(sub: &Subquery, extra: Option<&Predicate>, params: &mut Vec<Value>) -> String {
    let predicates: Vec<Predicate> = sub.predicates.iter().chain(extra).cloned().collect();
    format!(
        "SELECT {} FROM {}{}",
        quote(sub.column),
        quote(sub.table.name),
        where_clause(&predicates, params)
    )
}

fn order_term(table: &TableSpec, column: &str) -> String {
    match table.column(column).map(|c| c.kind) {
        Some(ColumnKind::Timestamp) => format!("julianday({})", quote(column)),
        _ => quote(column),
    }
}

fn join(inner: &[Predicate], separator: &str, params: &mut Vec<Value>) -> String {
    let parts: Vec<String> = inner.iter().map(|p| render(p, params)).collect();
    format!("({})", parts.join(separator))
}

fn where_clause(predicates: &[Predicate], params: &mut Vec<Value>) -> String {
    if predicates.is_empty() {
        return String::new();
    }
    let parts: Vec<String> = predicates.iter().map(|p| render(p, params)).collect();
    format!(" WHERE {}", parts.join(" AND "))
}

fn select_rows(conn: &Connection, query: &Query) -> StorageResult<Vec<Row>> {
    let table = query.table;
    let mut params = Vec::new();
    let columns: Vec<String> = table.column_names().map(quote).collect();
    let mut sql = format!(
        "SELECT {} FROM {}{}",
        columns.join(", "),
        quote(table.name),
        where_clause(&query.predicates, &mut params)
    );

    let order: Vec<String> = query
        .effective_order()
        .iter()
        .map(|key| {
            let direction = match key.direction {
                SortDirection::Ascending => "ASC",
                SortDirection::Descending => "DESC",
            };
            format!("{} {}", order_term(table, key.column), direction)
        })
        .collect();
    sql.push_str(" ORDER BY ");
    sql.push_str(&order.join(", "));

    if let Some(page) = query.page {
        sql.push_str(" LIMIT ? OFFSET ?");
        params.push(Value::Integer(i64::try_from(page.limit).unwrap_or(i64::MAX)));
        params.push(Value::Integer(i64::try_from(page.skip).unwrap_or(i64::MAX)));
    }

    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query(params_from_iter(params.iter()))?;
    let mut decoded = Vec::new();
    while let Some(sql_row) = rows.next()? {
        let mut row = Row::new();
        for (index, column) in table.columns.iter().enumerate() {
            row.set(column.name, decode(column, sql_row.get_ref(index)?)?);
        }
        decoded.push(row);
    }
    Ok(decoded)
}

fn decode(column: &Column, value: ValueRef<'_>) -> Result<FieldValue, PersistenceError> {
    let text = |bytes: &[u8]| String::from_utf8_lossy(bytes).into_owned();
    match (column.kind, value) {
        (_, ValueRef::Null) => Ok(FieldValue::Null),
        (ColumnKind::Integer, ValueRef::Integer(v)) => Ok(FieldValue::Integer(v)),
        (ColumnKind::Real, ValueRef::Real(v)) => Ok(FieldValue::Real(v)),
        (ColumnKind::Real, ValueRef::Integer(v)) => Ok(FieldValue::Real(v as f64)),
        (ColumnKind::Bool, ValueRef::Integer(v)) => Ok(FieldValue::Bool(v != 0)),
        (ColumnKind::Text, ValueRef::Text(v)) => Ok(FieldValue::Text(text(v))),
        (ColumnKind::Text, ValueRef::Integer(v)) => Ok(FieldValue::Text(v.to_string())),
        (ColumnKind::Timestamp, ValueRef::Text(v)) => {
            let raw = text(v);
            parse_timestamp(&raw)
                .map(FieldValue::Timestamp)
                .ok_or_else(|| PersistenceError::Decode {
                    column: column.name.to_string(),
                    message: format!("not a timestamp: {}", raw),
                })
        }
        (kind, other) => Err(PersistenceError::Decode {
            column: column.name.to_string(),
            message: format!("expected {:?}, found {}", kind, other.data_type()),
        }),
    }
}

fn check_columns(table: &'static TableSpec, row: &Row) -> Result<(), ValidationError> {
    match row.iter().find(|(name, _)| !table.has_column(name)) {
        Some((column, _)) => Err(ValidationError::UnknownColumn {
            table: table.name,
            column,
        }),
        None => Ok(()),
    }
}

fn apply(conn: &Connection, op: WriteOp) -> Result<WriteOutcome, PersistenceError> {
    match op {
        WriteOp::Insert { table, row } => {
            let sql = if row.is_empty() {
                format!("INSERT INTO {} DEFAULT VALUES", quote(table.name))
            } else {
                let columns: Vec<String> = row.iter().map(|(name, _)| quote(name)).collect();
                format!(
                    "INSERT INTO {} ({}) VALUES ({})",
                    quote(table.name),
                    columns.join(", "),
                    vec!["?"; row.len()].join(", ")
                )
            };
            let params: Vec<Value> = row.iter().map(|(_, value)| bind(value)).collect();
            conn.execute(&sql, params_from_iter(params.iter()))?;
            Ok(WriteOutcome::Inserted(conn.last_insert_rowid()))
        }
        WriteOp::Update { table, id, row } => {
            if row.is_empty() {
                return Ok(WriteOutcome::Updated(0));
            }
            let assignments: Vec<String> = row
                .iter()
                .map(|(name, _)| format!("{} = ?", quote(name)))
                .collect();
            let sql = format!(
                "UPDATE {} SET {} WHERE {} = ?",
                quote(table.name),
                assignments.join(", "),
                quote(table.id_column)
            );
            let mut params: Vec<Value> = row.iter().map(|(_, value)| bind(value)).collect();
            params.push(Value::Integer(id));
            let affected = conn.execute(&sql, params_from_iter(params.iter()))?;
            Ok(WriteOutcome::Updated(affected as u64))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Entity, now};
    use crate::error::StorageError;
    use crate::records::Concept;
    use crate::records::reference::Person;
    use crate::types::Page;

    fn concept_row(uuid: &str, short_name: &str) -> Row {
        Row::new()
            .with("uuid", uuid)
            .with("short_name", short_name)
            .with("creator", 1_i64)
            .with("date_created", now())
            .with("is_set", false)
            .with("retired", false)
    }

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
    }

    #[test]
    fn test_render_empty_sets() {
        let mut params = Vec::new();
        assert_eq!(render(&Predicate::In("x", vec![]), &mut params), "0");
        assert_eq!(render(&Predicate::NotIn("x", vec![]), &mut params), "1");
        assert_eq!(render(&Predicate::AnyOf(vec![]), &mut params), "0");
        assert!(params.is_empty());
    }

    #[test]
    fn test_render_subquery_binds_inner_values() {
        use crate::records::reference::{ReferenceMap, ReferenceTerm};

        let predicate = Predicate::in_select(
            "value_coded",
            Subquery::new(ReferenceMap::TABLE, "concept_id").filter(Predicate::in_select(
                "concept_reference_term_id",
                Subquery::new(ReferenceTerm::TABLE, "concept_reference_term_id")
                    .filter(Predicate::eq("concept_source_id", 4_i64)),
            )),
        );
        let mut params = Vec::new();
        assert_eq!(
            render(&predicate, &mut params),
            "\"value_coded\" IN (SELECT \"concept_id\" FROM \"concept_reference_map\" \
             WHERE \"concept_reference_term_id\" IN (SELECT \"concept_reference_term_id\" \
             FROM \"concept_reference_term\" WHERE \"concept_source_id\" = ?))"
        );
        assert_eq!(params, vec![Value::Integer(4)]);

        let mut params = Vec::new();
        let excluded =
            Predicate::not_in_select("value_coded", Subquery::new(ReferenceMap::TABLE, "concept_id"));
        assert_eq!(
            render(&excluded, &mut params),
            "\"value_coded\" NOT IN (SELECT \"concept_id\" FROM \"concept_reference_map\" \
             WHERE \"concept_id\" IS NOT NULL)"
        );
    }

    #[test]
    fn test_timestamp_bounds_compare_chronologically() {
        let mut params = Vec::new();
        let bound = Predicate::gte("encounter_datetime", now());
        assert_eq!(
            render(&bound, &mut params),
            "julianday(\"encounter_datetime\") >= julianday(?)"
        );
        let mut params = Vec::new();
        assert_eq!(render(&Predicate::lte("obs_id", 3_i64), &mut params), "\"obs_id\" <= ?");
    }

    #[tokio::test]
    async fn test_insert_and_select_decodes_types() {
        let backend = SqliteBackend::in_memory().unwrap();
        let id = backend
            .insert(
                Person::TABLE,
                Row::new()
                    .with("gender", "F")
                    .with("birthdate", "1987-02-01")
                    .with("voided", false)
                    .with("uuid", "p-1"),
            )
            .await
            .unwrap();

        let query = Query::new(Person::TABLE).filter(Predicate::eq("person_id", id));
        let row = backend.select_one(&query).await.unwrap().unwrap();
        assert_eq!(row.get("voided"), Some(&FieldValue::Bool(false)));
        assert_eq!(row.text("uuid").unwrap(), "p-1");
        assert_eq!(row.opt_text("birthdate").unwrap().as_deref(), Some("1987-02-01"));
    }

    #[tokio::test]
    async fn test_contains_matches_wildcards_literally() {
        let backend = SqliteBackend::in_memory().unwrap();
        backend.insert(Concept::TABLE, concept_row("c-1", "100% cotton")).await.unwrap();
        backend.insert(Concept::TABLE, concept_row("c-2", "1000 units")).await.unwrap();

        let query = Query::new(Concept::TABLE)
            .filter(Predicate::Contains("short_name", "100%".to_string()));
        let rows = backend.select(&query).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].text("uuid").unwrap(), "c-1");

        let case_insensitive = Query::new(Concept::TABLE)
            .filter(Predicate::Contains("short_name", "COTTON".to_string()));
        assert_eq!(backend.count(&case_insensitive).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_batch_rolls_back_on_constraint_violation() {
        let backend = SqliteBackend::in_memory().unwrap();
        let batch = WriteBatch::new()
            .insert(Concept::TABLE, concept_row("dup", "first"))
            .insert(Concept::TABLE, concept_row("dup", "second"));

        let err = backend.commit(batch).await.unwrap_err();
        assert!(matches!(
            err,
            StorageError::Persistence(PersistenceError::ConstraintViolation { .. })
        ));
        assert_eq!(backend.count(&Query::new(Concept::TABLE)).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_select_orders_and_pages() {
        let backend = SqliteBackend::in_memory().unwrap();
        for (uuid, name) in [("c-1", "b"), ("c-2", "a"), ("c-3", "c")] {
            backend.insert(Concept::TABLE, concept_row(uuid, name)).await.unwrap();
        }

        let query = Query::new(Concept::TABLE)
            .order_by("short_name", SortDirection::Descending)
            .page(Page::new(1, 5).unwrap());
        let names: Vec<String> = backend
            .select(&query)
            .await
            .unwrap()
            .iter()
            .map(|r| r.text("short_name").unwrap())
            .collect();
        assert_eq!(names, ["b", "a"]);
        assert_eq!(backend.count(&query).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_update_touches_listed_columns_only() {
        let backend = SqliteBackend::in_memory().unwrap();
        let id = backend.insert(Concept::TABLE, concept_row("c-1", "old")).await.unwrap();

        let affected = backend
            .update(Concept::TABLE, id, Row::new().with("description", "new text"))
            .await
            .unwrap();
        assert_eq!(affected, 1);

        let row = backend
            .select_one(&Query::new(Concept::TABLE).filter(Predicate::eq("concept_id", id)))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(row.text("short_name").unwrap(), "old");
        assert_eq!(row.text("description").unwrap(), "new text");
    }

    #[tokio::test]
    async fn test_unknown_columns_are_rejected() {
        let backend = SqliteBackend::in_memory().unwrap();
        let query = Query::new(Concept::TABLE).filter(Predicate::eq("nope", 1_i64));
        assert!(matches!(
            backend.select(&query).await,
            Err(StorageError::Validation(ValidationError::UnknownColumn { .. }))
        ));

        let err = backend
            .insert(Concept::TABLE, Row::new().with("nope", 1_i64))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Validation(_)));
    }
}
