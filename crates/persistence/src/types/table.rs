//! Static descriptions of store relations.
//!
//! Column identifiers that end up in SQL text come exclusively from these
//! descriptors, never from caller input.

/// Storage type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    /// 64-bit integer (ids, foreign keys, counters).
    Integer,
    /// Floating point.
    Real,
    /// UTF-8 text.
    Text,
    /// Boolean stored as 0/1.
    Bool,
    /// UTC timestamp stored as fixed-width text.
    Timestamp,
}

/// A named, typed column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
    /// Column name.
    pub name: &'static str,
    /// Storage type.
    pub kind: ColumnKind,
}

impl Column {
    /// Creates a column descriptor.
    pub const fn new(name: &'static str, kind: ColumnKind) -> Self {
        Self { name, kind }
    }
}

/// Describes one relation: its name, primary key and columns.
#[derive(Debug, PartialEq, Eq)]
pub struct TableSpec {
    /// Table name.
    pub name: &'static str,
    /// Primary key column. Always an auto-assigned integer.
    pub id_column: &'static str,
    /// All columns, including the primary key.
    pub columns: &'static [Column],
}

impl TableSpec {
    /// Looks up a column by name.
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Returns true if the table defines the column.
    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    /// Column names in declaration order.
    pub fn column_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.columns.iter().map(|c| c.name)
    }
}

/// Shorthand for declaring column lists in `const` context.
#[macro_export]
macro_rules! columns {
    ($($name:literal : $kind:ident),* $(,)?) => {
        &[$($crate::types::Column::new($name, $crate::types::ColumnKind::$kind)),*]
    };
}
