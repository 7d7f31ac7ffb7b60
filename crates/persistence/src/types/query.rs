//! Backend-neutral query descriptions.

use super::{FieldValue, Page, TableSpec};
use crate::error::ValidationError;

/// A filter condition on one or more columns.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// `column = value`. A null value matches null columns.
    Eq(&'static str, FieldValue),
    /// `column >= value`.
    Gte(&'static str, FieldValue),
    /// `column <= value`.
    Lte(&'static str, FieldValue),
    /// `column IS NULL`.
    IsNull(&'static str),
    /// `column IS NOT NULL`.
    IsNotNull(&'static str),
    /// `column IN (values)`. An empty set matches nothing.
    In(&'static str, Vec<FieldValue>),
    /// `column NOT IN (values)`. An empty set matches everything.
    NotIn(&'static str, Vec<FieldValue>),
    /// Case-insensitive substring match on a text column.
    Contains(&'static str, String),
    /// Disjunction of the nested predicates. Empty matches nothing.
    AnyOf(Vec<Predicate>),
    /// Conjunction of the nested predicates. Empty matches everything.
    AllOf(Vec<Predicate>),
    /// `column IN (SELECT ...)`, evaluated by the store in one statement.
    InSelect(&'static str, Box<Subquery>),
    /// `column NOT IN (SELECT ...)`. Nulls produced by the subquery are
    /// ignored, so a null never turns the whole condition unknown.
    NotInSelect(&'static str, Box<Subquery>),
}

impl Predicate {
    /// Equality predicate.
    pub fn eq(column: &'static str, value: impl Into<FieldValue>) -> Self {
        Predicate::Eq(column, value.into())
    }

    /// Inclusive lower bound.
    pub fn gte(column: &'static str, value: impl Into<FieldValue>) -> Self {
        Predicate::Gte(column, value.into())
    }

    /// Inclusive upper bound.
    pub fn lte(column: &'static str, value: impl Into<FieldValue>) -> Self {
        Predicate::Lte(column, value.into())
    }

    /// Set membership.
    pub fn is_in<V: Into<FieldValue>>(column: &'static str, values: impl IntoIterator<Item = V>) -> Self {
        Predicate::In(column, values.into_iter().map(Into::into).collect())
    }

    /// Membership in the column values produced by `subquery`.
    pub fn in_select(column: &'static str, subquery: Subquery) -> Self {
        Predicate::InSelect(column, Box::new(subquery))
    }

    /// Exclusion from the column values produced by `subquery`.
    pub fn not_in_select(column: &'static str, subquery: Subquery) -> Self {
        Predicate::NotInSelect(column, Box::new(subquery))
    }

    /// Every column of the outer table this predicate touches. Columns
    /// inside subqueries belong to their own tables and are not listed.
    pub fn columns(&self) -> Vec<&'static str> {
        match self {
            Predicate::Eq(c, _)
            | Predicate::Gte(c, _)
            | Predicate::Lte(c, _)
            | Predicate::IsNull(c)
            | Predicate::IsNotNull(c)
            | Predicate::In(c, _)
            | Predicate::NotIn(c, _)
            | Predicate::Contains(c, _)
            | Predicate::InSelect(c, _)
            | Predicate::NotInSelect(c, _) => vec![c],
            Predicate::AnyOf(inner) | Predicate::AllOf(inner) => {
                inner.iter().flat_map(Predicate::columns).collect()
            }
        }
    }

    /// Subqueries directly nested in this predicate.
    pub fn subqueries(&self) -> Vec<&Subquery> {
        match self {
            Predicate::InSelect(_, sub) | Predicate::NotInSelect(_, sub) => vec![sub.as_ref()],
            Predicate::AnyOf(inner) | Predicate::AllOf(inner) => {
                inner.iter().flat_map(Predicate::subqueries).collect()
            }
            _ => Vec::new(),
        }
    }
}

/// A single-column read of another table, used as the right-hand side of
/// [`Predicate::InSelect`] and [`Predicate::NotInSelect`].
///
/// The id set stays inside the store, so it may be arbitrarily large.
#[derive(Debug, Clone, PartialEq)]
pub struct Subquery {
    /// Relation to read.
    pub table: &'static TableSpec,
    /// Column whose values form the set.
    pub column: &'static str,
    /// Conjunction of predicates on `table`.
    pub predicates: Vec<Predicate>,
}

impl Subquery {
    /// Selects `column` from every row of `table`.
    pub fn new(table: &'static TableSpec, column: &'static str) -> Self {
        Self {
            table,
            column,
            predicates: Vec::new(),
        }
    }

    /// Adds a predicate.
    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.predicates.push(predicate);
        self
    }

    /// Checks the selected column and every predicate against `table`,
    /// recursing into nested subqueries.
    pub fn validate(&self) -> Result<(), ValidationError> {
        check_columns(self.table, &self.predicates, [self.column])
    }
}

fn check_columns(
    table: &'static TableSpec,
    predicates: &[Predicate],
    extra: impl IntoIterator<Item = &'static str>,
) -> Result<(), ValidationError> {
    let referenced = predicates.iter().flat_map(Predicate::columns).chain(extra);
    for column in referenced {
        if !table.has_column(column) {
            return Err(ValidationError::UnknownColumn {
                table: table.name,
                column,
            });
        }
    }
    predicates
        .iter()
        .flat_map(Predicate::subqueries)
        .try_for_each(Subquery::validate)
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    /// Smallest first.
    Ascending,
    /// Largest first.
    Descending,
}

/// One ordering term.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortKey {
    /// Column to sort by.
    pub column: &'static str,
    /// Direction.
    pub direction: SortDirection,
}

/// A filtered, ordered, optionally paged read of one table.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    /// Target relation.
    pub table: &'static TableSpec,
    /// Conjunction of predicates.
    pub predicates: Vec<Predicate>,
    /// Ordering terms; the primary key is always appended as a tiebreaker.
    pub order: Vec<SortKey>,
    /// Optional result window.
    pub page: Option<Page>,
}

impl Query {
    /// Selects every row of `table`.
    pub fn new(table: &'static TableSpec) -> Self {
        Self {
            table,
            predicates: Vec::new(),
            order: Vec::new(),
            page: None,
        }
    }

    /// Adds a predicate.
    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.predicates.push(predicate);
        self
    }

    /// Adds several predicates.
    pub fn filters(mut self, predicates: impl IntoIterator<Item = Predicate>) -> Self {
        self.predicates.extend(predicates);
        self
    }

    /// Adds an ordering term.
    pub fn order_by(mut self, column: &'static str, direction: SortDirection) -> Self {
        self.order.push(SortKey { column, direction });
        self
    }

    /// Restricts the result window.
    pub fn page(mut self, page: Page) -> Self {
        self.page = Some(page);
        self
    }

    /// The ordering actually applied: the requested terms followed by the
    /// primary key ascending, so results are stable across calls.
    pub fn effective_order(&self) -> Vec<SortKey> {
        let mut order = self.order.clone();
        if !order.iter().any(|k| k.column == self.table.id_column) {
            order.push(SortKey {
                column: self.table.id_column,
                direction: SortDirection::Ascending,
            });
        }
        order
    }

    /// Checks that every referenced column belongs to its table, including
    /// the columns of nested subqueries.
    pub fn validate(&self) -> Result<(), ValidationError> {
        check_columns(
            self.table,
            &self.predicates,
            self.order.iter().map(|k| k.column),
        )
    }
}
