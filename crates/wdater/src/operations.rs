//! Structural operations.
//!
//! The units of change an update applies to a database, and the diff
//! descriptor handed to dialects when a column is modified.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::schema::{ColumnSchema, TableSchema};

/// Which properties of a column should be brought in line with its
/// definition when generating modify statements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ColumnDiff {
    /// Nullability differs from the database.
    pub nullability: bool,
    /// Re-apply the declared default value.
    pub defaults: bool,
    /// Column name must be matched case-sensitively.
    pub case_sensitive_name: bool,
}

impl ColumnDiff {
    /// A diff that touches every supported property.
    #[must_use]
    pub const fn all() -> Self {
        Self {
            nullability: true,
            defaults: true,
            case_sensitive_name: true,
        }
    }

    /// A diff that only re-applies the default value.
    #[must_use]
    pub const fn defaults_only() -> Self {
        Self {
            nullability: false,
            defaults: true,
            case_sensitive_name: false,
        }
    }

    /// Returns whether the column names `a` and `b` designate the same
    /// column under this diff.
    #[must_use]
    pub fn matches_name(&self, a: &str, b: &str) -> bool {
        if self.case_sensitive_name {
            a == b
        } else {
            a.eq_ignore_ascii_case(b)
        }
    }

    /// Returns true if nothing is marked as changed.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        !self.nullability && !self.defaults && !self.case_sensitive_name
    }
}

/// A single structural change derived from a schema diff.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StructuralOperation {
    /// Create a table with all of its columns.
    CreateTable {
        /// Table definition.
        table: TableSchema,
    },

    /// Drop a table.
    DropTable {
        /// Table name as reported by the database.
        name: String,
    },

    /// Add a column to an existing table.
    CreateColumn {
        /// Table name.
        table: String,
        /// Column definition.
        column: ColumnSchema,
    },

    /// Drop a column from an existing table.
    DropColumn {
        /// Table name.
        table: String,
        /// Column name.
        column_name: String,
    },

    /// Bring an existing column in line with its definition.
    ModifyColumn {
        /// Table name.
        table: String,
        /// Column definition.
        column: ColumnSchema,
        /// Whether nullability differs from the database.
        nullability_changed: bool,
    },
}

impl StructuralOperation {
    /// Returns the name of the table this operation touches.
    #[must_use]
    pub fn table_name(&self) -> &str {
        match self {
            Self::CreateTable { table } => &table.name,
            Self::DropTable { name } => name,
            Self::CreateColumn { table, .. }
            | Self::DropColumn { table, .. }
            | Self::ModifyColumn { table, .. } => table,
        }
    }

    /// Returns true if this operation destroys data.
    #[must_use]
    pub fn is_destructive(&self) -> bool {
        matches!(self, Self::DropTable { .. } | Self::DropColumn { .. })
    }
}

impl fmt::Display for StructuralOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CreateTable { table } => write!(f, "create table {}", table.name),
            Self::DropTable { name } => write!(f, "drop table {name}"),
            Self::CreateColumn { table, column } => {
                write!(f, "create column {table}.{}", column.name)
            }
            Self::DropColumn { table, column_name } => {
                write!(f, "drop column {table}.{column_name}")
            }
            Self::ModifyColumn {
                table,
                column,
                nullability_changed,
            } => write!(
                f,
                "modify column {table}.{} (nullability changed: {nullability_changed})",
                column.name
            ),
        }
    }
}
