//! The store contract.
//!
//! This module defines the [`Store`] trait, the query/command interface every
//! accessor talks to. A store supports:
//!
//! - equality and range filtering on named columns
//! - ordered retrieval with skip/limit pagination
//! - atomic multi-row, multi-column writes that commit or roll back as a unit
//!
//! Implementations must bind every [`FieldValue`](crate::types::FieldValue)
//! as a statement parameter. No caller-supplied text is ever spliced into
//! query strings.

use async_trait::async_trait;

use super::record::Entity;
use crate::error::{PersistenceError, StorageResult};
use crate::types::{Query, Row, TableSpec};

/// One write inside a [`WriteBatch`].
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    /// Inserts a new row. The primary key is assigned by the store.
    Insert {
        table: &'static TableSpec,
        row: Row,
    },
    /// Updates the listed columns of the row with the given primary key.
    Update {
        table: &'static TableSpec,
        id: i64,
        row: Row,
    },
}

/// Result of one [`WriteOp`], in batch order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// New primary key.
    Inserted(i64),
    /// Number of rows affected.
    Updated(u64),
}

/// An ordered set of writes applied atomically.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteBatch {
    ops: Vec<WriteOp>,
}

impl WriteBatch {
    /// Creates an empty batch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an insert.
    pub fn insert(mut self, table: &'static TableSpec, row: Row) -> Self {
        self.ops.push(WriteOp::Insert { table, row });
        self
    }

    /// Appends an update.
    pub fn update(mut self, table: &'static TableSpec, id: i64, row: Row) -> Self {
        self.ops.push(WriteOp::Update { table, id, row });
        self
    }

    /// The queued writes.
    pub fn ops(&self) -> &[WriteOp] {
        &self.ops
    }

    /// Returns true if the batch holds no writes.
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

impl IntoIterator for WriteBatch {
    type Item = WriteOp;
    type IntoIter = std::vec::IntoIter<WriteOp>;

    fn into_iter(self) -> Self::IntoIter {
        self.ops.into_iter()
    }
}

/// Query/command interface to the relational store.
///
/// Implementations hand out independent connections per call, so a single
/// store may be shared by concurrently running request handlers.
#[async_trait]
pub trait Store: Send + Sync {
    /// Returns a human-readable name for this storage backend.
    fn backend_name(&self) -> &'static str;

    /// Returns the rows matching `query`, in its effective order.
    ///
    /// # Errors
    ///
    /// * `StorageError::Validation` - If the query names unknown columns
    /// * `StorageError::Persistence` - If the store fails
    async fn select(&self, query: &Query) -> StorageResult<Vec<Row>>;

    /// Counts the rows matching `query`, ignoring its page window.
    async fn count(&self, query: &Query) -> StorageResult<u64>;

    /// Applies every write in `batch` inside one transaction.
    ///
    /// Either all writes commit or none do. On failure the transaction has
    /// been rolled back before the error is returned.
    async fn commit(&self, batch: WriteBatch) -> StorageResult<Vec<WriteOutcome>>;

    /// Verifies the store is reachable.
    async fn health_check(&self) -> StorageResult<()>;

    /// Returns the first row matching `query`.
    async fn select_one(&self, query: &Query) -> StorageResult<Option<Row>> {
        Ok(self.select(query).await?.into_iter().next())
    }

    /// Inserts a single row and returns its new primary key.
    async fn insert(&self, table: &'static TableSpec, row: Row) -> StorageResult<i64> {
        match self.commit(WriteBatch::new().insert(table, row)).await?.as_slice() {
            [WriteOutcome::Inserted(id)] => Ok(*id),
            other => Err(unexpected_outcome(self.backend_name(), other).into()),
        }
    }

    /// Updates a single row and returns the number of rows affected.
    async fn update(&self, table: &'static TableSpec, id: i64, row: Row) -> StorageResult<u64> {
        match self.commit(WriteBatch::new().update(table, id, row)).await?.as_slice() {
            [WriteOutcome::Updated(n)] => Ok(*n),
            other => Err(unexpected_outcome(self.backend_name(), other).into()),
        }
    }
}

/// Runs `query` and decodes every row as `E`.
pub async fn select_entities<E: Entity, S: Store + ?Sized>(
    store: &S,
    query: &Query,
) -> StorageResult<Vec<E>> {
    let rows = store.select(query).await?;
    let entities = rows
        .iter()
        .map(E::from_row)
        .collect::<Result<Vec<_>, PersistenceError>>()?;
    Ok(entities)
}

fn unexpected_outcome(backend_name: &str, outcome: &[WriteOutcome]) -> PersistenceError {
    PersistenceError::Internal {
        backend_name: backend_name.to_string(),
        message: format!("unexpected write outcome: {:?}", outcome),
        source: None,
    }
}
