//! Query-related data models.
//!
//! This module defines the request, policy and result types that flow
//! through the execution engine.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Default row cap appended to unbounded SELECT/WITH statements.
pub const DEFAULT_ROW_LIMIT: u32 = 100;

/// Default per-statement timeout in milliseconds.
pub const DEFAULT_QUERY_TIMEOUT_MS: u64 = 30_000;

/// Classified intent of a SQL statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatementIntent {
    /// SELECT, SHOW, DESCRIBE, EXPLAIN or WITH
    Read,
    /// Anything else
    Write,
    /// Statements generated internally by the tool layer
    Meta,
}

impl std::fmt::Display for StatementIntent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Read => write!(f, "read"),
            Self::Write => write!(f, "write"),
            Self::Meta => write!(f, "meta"),
        }
    }
}

/// A statement ready for execution. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionRequest {
    sql: String,
    intent: StatementIntent,
}

impl ExecutionRequest {
    pub fn new(sql: impl Into<String>, intent: StatementIntent) -> Self {
        Self {
            sql: sql.into(),
            intent,
        }
    }

    /// Build a request for a statement generated by the tool layer itself.
    pub fn meta(sql: impl Into<String>) -> Self {
        Self::new(sql, StatementIntent::Meta)
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn intent(&self) -> StatementIntent {
        self.intent
    }
}

/// Engine-wide execution policy, fixed at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionPolicy {
    /// Wrap every lease in a database-enforced read-only transaction
    pub readonly: bool,
    /// Per-statement budget in milliseconds. 0 disables the timer.
    pub timeout_ms: u64,
}

impl ExecutionPolicy {
    pub fn new(readonly: bool, timeout_ms: u64) -> Self {
        Self {
            readonly,
            timeout_ms,
        }
    }

    /// The timer budget, or `None` when timeouts are disabled.
    pub fn timeout(&self) -> Option<std::time::Duration> {
        (self.timeout_ms > 0).then(|| std::time::Duration::from_millis(self.timeout_ms))
    }
}

impl Default for ExecutionPolicy {
    fn default() -> Self {
        Self::new(false, DEFAULT_QUERY_TIMEOUT_MS)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMetadata {
    pub name: String,
    /// MySQL type name (e.g., "BIGINT", "VARCHAR")
    pub type_name: String,
}

impl ColumnMetadata {
    /// Create new column metadata.
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
        }
    }
}

/// Tabular result: ordered columns and positional row tuples.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RowSet {
    pub columns: Vec<ColumnMetadata>,
    pub rows: Vec<Vec<JsonValue>>,
}

impl RowSet {
    pub fn new(columns: Vec<ColumnMetadata>, rows: Vec<Vec<JsonValue>>) -> Self {
        Self { columns, rows }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Position of a column, matched case-insensitively.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.name.eq_ignore_ascii_case(name))
    }

    /// Cell lookup by row index and column name.
    pub fn value(&self, row: usize, column: &str) -> Option<&JsonValue> {
        let idx = self.column_index(column)?;
        self.rows.get(row)?.get(idx)
    }

    /// String cell, `None` for NULL or non-string values.
    pub fn str_value(&self, row: usize, column: &str) -> Option<&str> {
        self.value(row, column).and_then(JsonValue::as_str)
    }

    /// Values of the first column, rendered as strings. Used for SHOW lists.
    pub fn first_column_strings(&self) -> Vec<String> {
        self.rows
            .iter()
            .filter_map(|row| row.first())
            .map(|v| match v {
                JsonValue::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect()
    }
}

/// Outcome of a statement that returns no rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteEffect {
    pub affected_rows: u64,
    pub changed_rows: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionResult {
    Rows(RowSet),
    Effect(WriteEffect),
}

impl ExecutionResult {
    /// The row set, or an empty one for statements that produced an effect.
    pub fn into_rows(self) -> RowSet {
        match self {
            Self::Rows(rows) => rows,
            Self::Effect(_) => RowSet::default(),
        }
    }

    /// The write effect. Row-returning statements report zero affected rows.
    pub fn effect(&self) -> WriteEffect {
        match self {
            Self::Rows(_) => WriteEffect::default(),
            Self::Effect(effect) => *effect,
        }
    }
}
