//! Exact-match predicates over a single record column.

use serde::Serialize;
use std::fmt;

/// Columns a predicate may match on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Column {
    UniqueId,
    ReferenceId,
    Xpath,
}

impl Column {
    pub fn as_str(self) -> &'static str {
        match self {
            Column::UniqueId => "unique_id",
            Column::ReferenceId => "reference_id",
            Column::Xpath => "xpath",
        }
    }

    /// Folded SQL expression for the column.
    ///
    /// Must stay in sync with the expression indexes created by the store builder,
    /// otherwise lookups fall back to full scans.
    pub(crate) fn folded_sql(self) -> &'static str {
        match self {
            Column::UniqueId => "LOWER(unique_id)",
            Column::ReferenceId => "LOWER(reference_id)",
            Column::Xpath => "LOWER(TRIM(xpath, '/ '))",
        }
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single `column = value` clause, compared case-insensitively.
///
/// The value is stored already folded; construct through [`Predicate::exact`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Predicate {
    column: Column,
    value: String,
}

impl Predicate {
    pub fn exact(column: Column, value: &str) -> Self {
        Self {
            column,
            value: fold_case(value),
        }
    }

    pub fn column(&self) -> Column {
        self.column
    }

    /// The folded comparison value.
    pub fn value(&self) -> &str {
        &self.value
    }

    pub(crate) fn where_clause(&self) -> String {
        format!("{} = ?1", self.column.folded_sql())
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = {:?}", self.column, self.value)
    }
}

/// Case folding shared by both sides of every comparison.
///
/// SQLite's `LOWER` only folds ASCII, so the Rust side does the same.
pub fn fold_case(value: &str) -> String {
    value.to_ascii_lowercase()
}
