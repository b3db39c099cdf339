//! Error types for the MySQL MCP Server.
//!
//! Every failure the engine can surface falls into one of four variants.
//! `Resource` is kept separate internally so lease problems can be logged
//! distinctly, but callers see it reported as an execution failure.

use sqlx::mysql::MySqlDatabaseError;
use thiserror::Error;

/// MySQL error number for "Cannot execute statement in a READ ONLY transaction".
pub const ER_CANT_EXECUTE_IN_READ_ONLY_TRANSACTION: u16 = 1792;

/// MySQL error number for SQL syntax errors.
pub const ER_PARSE_ERROR: u16 = 1064;

/// MySQL error number for statements the prepared-statement protocol does not support.
pub const ER_UNSUPPORTED_PS: u16 = 1295;

#[derive(Error, Debug)]
pub enum DbError {
    /// The statement was sent to the wrong entry point, or the server mode forbids it.
    #[error("{message}")]
    Policy { message: String },

    #[error("Query timeout after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// Failure reported by the database. The message is passed through verbatim.
    #[error("{message}")]
    Execution {
        message: String,
        /// SQLSTATE, e.g. "42S02" for a missing table
        sql_state: Option<String>,
        /// MySQL error number, e.g. 1146
        number: Option<u16>,
    },

    /// Lease acquisition failed, or a connection could not be used any more.
    #[error("{message}")]
    Resource { message: String },
}

/// Error category as reported to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Policy,
    Timeout,
    Execution,
}

impl DbError {
    /// Create a policy error.
    pub fn policy(message: impl Into<String>) -> Self {
        Self::Policy {
            message: message.into(),
        }
    }

    /// Create a timeout error for the given budget.
    pub fn timeout(timeout_ms: u64) -> Self {
        Self::Timeout { timeout_ms }
    }

    /// Create an execution error without driver codes.
    pub fn execution(message: impl Into<String>) -> Self {
        Self::Execution {
            message: message.into(),
            sql_state: None,
            number: None,
        }
    }

    /// Create a resource error.
    pub fn resource(message: impl Into<String>) -> Self {
        Self::Resource {
            message: message.into(),
        }
    }

    /// The category callers see. Resource failures are folded into execution failures.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Policy { .. } => ErrorCategory::Policy,
            Self::Timeout { .. } => ErrorCategory::Timeout,
            Self::Execution { .. } | Self::Resource { .. } => ErrorCategory::Execution,
        }
    }

    /// True when the server rejected a write inside a read-only transaction.
    pub fn is_read_only_violation(&self) -> bool {
        matches!(
            self,
            Self::Execution {
                number: Some(ER_CANT_EXECUTE_IN_READ_ONLY_TRANSACTION),
                ..
            }
        )
    }

    /// A short hint pointing the caller at the tool or setting that helps.
    pub fn hint(&self) -> Option<&'static str> {
        if let Self::Timeout { .. } = self {
            return Some("Hint: increase MYSQL_QUERY_TIMEOUT or optimize the query.");
        }
        if self.is_read_only_violation() {
            return Some("Hint: the server is in read-only mode.");
        }
        if let Self::Execution {
            number: Some(ER_PARSE_ERROR),
            ..
        } = self
        {
            return Some("Hint: check SQL syntax.");
        }
        if let Self::Execution {
            number: Some(ER_UNSUPPORTED_PS),
            ..
        } = self
        {
            return Some("Hint: this statement cannot be run through this server.");
        }

        let message = self.to_string().to_lowercase();
        if message.contains("column '") && message.contains("doesn't exist") {
            Some("Hint: use describe_table to check available columns.")
        } else if message.contains("table '") && message.contains("doesn't exist") {
            Some("Hint: use list_tables to check available tables.")
        } else if message.contains("unknown column") {
            Some("Hint: use describe_table to check column names.")
        } else if message.contains("unknown database") {
            Some("Hint: use list_databases to check available databases.")
        } else if message.contains("access denied") {
            Some("Hint: check database user permissions.")
        } else if message.contains("connection refused")
            || message.contains("timed out")
            || message.contains("failed to lookup address")
        {
            Some("Hint: check MYSQL_HOST and MYSQL_PORT settings.")
        } else if message.contains("error in your sql syntax") {
            Some("Hint: check SQL syntax.")
        } else {
            None
        }
    }
}

/// Render an error as tool output text, with a hint line when one applies.
pub fn format_error(err: &DbError) -> String {
    match err.hint() {
        Some(hint) => format!("Error: {}\n{}", err, hint),
        None => format!("Error: {}", err),
    }
}

/// Convert sqlx errors to DbError.
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db_err) => {
                let sql_state = db_err.code().map(|c| c.to_string());
                let number = db_err
                    .try_downcast_ref::<MySqlDatabaseError>()
                    .map(|e| e.number());
                DbError::Execution {
                    message: db_err.message().to_string(),
                    sql_state,
                    number,
                }
            }
            sqlx::Error::PoolTimedOut => {
                DbError::resource("Timed out waiting for a free connection from the pool")
            }
            sqlx::Error::PoolClosed => DbError::resource("Connection pool is closed"),
            sqlx::Error::WorkerCrashed => DbError::resource("Database worker crashed"),
            sqlx::Error::Io(io_err) => DbError::execution(format!("I/O error: {}", io_err)),
            sqlx::Error::Tls(tls_err) => DbError::execution(format!("TLS error: {}", tls_err)),
            sqlx::Error::Protocol(msg) => DbError::execution(format!("Protocol error: {}", msg)),
            sqlx::Error::ColumnDecode { index, source } => {
                DbError::execution(format!("Failed to decode column {}: {}", index, source))
            }
            other => DbError::execution(other.to_string()),
        }
    }
}

/// Result type alias for database operations.
pub type DbResult<T> = Result<T, DbError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn mysql_error(message: &str, number: u16) -> DbError {
        DbError::Execution {
            message: message.to_string(),
            sql_state: None,
            number: Some(number),
        }
    }

    #[test]
    fn test_timeout_message_contains_duration() {
        let err = DbError::timeout(50);
        assert_eq!(err.to_string(), "Query timeout after 50ms");
    }

    #[test]
    fn test_execution_message_is_verbatim() {
        let err = DbError::execution("Unknown column 'nme' in 'field list'");
        assert_eq!(err.to_string(), "Unknown column 'nme' in 'field list'");
    }

    #[test]
    fn test_resource_folds_into_execution() {
        assert_eq!(
            DbError::resource("pool closed").category(),
            ErrorCategory::Execution
        );
        assert_eq!(DbError::policy("no").category(), ErrorCategory::Policy);
        assert_eq!(DbError::timeout(1).category(), ErrorCategory::Timeout);
    }

    #[test]
    fn test_hint_missing_table() {
        let err = mysql_error("Table 'shop.userz' doesn't exist", 1146);
        assert_eq!(
            err.hint(),
            Some("Hint: use list_tables to check available tables.")
        );
    }

    #[test]
    fn test_hint_missing_column_in_table() {
        let err = DbError::execution("Column 'nme' doesn't exist in table 'users'.");
        assert_eq!(
            err.hint(),
            Some("Hint: use describe_table to check available columns.")
        );
    }

    #[test]
    fn test_hint_unknown_column_and_database() {
        assert_eq!(
            mysql_error("Unknown column 'x' in 'where clause'", 1054).hint(),
            Some("Hint: use describe_table to check column names.")
        );
        assert_eq!(
            mysql_error("Unknown database 'nope'", 1049).hint(),
            Some("Hint: use list_databases to check available databases.")
        );
    }

    #[test]
    fn test_hint_read_only_violation() {
        let err = mysql_error(
            "Cannot execute statement in a READ ONLY transaction.",
            ER_CANT_EXECUTE_IN_READ_ONLY_TRANSACTION,
        );
        assert!(err.is_read_only_violation());
        assert_eq!(err.hint(), Some("Hint: the server is in read-only mode."));
    }

    #[test]
    fn test_hint_syntax_error() {
        let err = mysql_error("You have an error in your SQL syntax; check the manual", 1064);
        assert_eq!(err.hint(), Some("Hint: check SQL syntax."));
    }

    #[test]
    fn test_hint_unsupported_statement() {
        let err = mysql_error(
            "This command is not supported in the prepared statement protocol yet",
            ER_UNSUPPORTED_PS,
        );
        assert_eq!(
            err.hint(),
            Some("Hint: this statement cannot be run through this server.")
        );
    }

    #[test]
    fn test_hint_connection_refused() {
        let err = DbError::execution("I/O error: Connection refused (os error 111)");
        assert_eq!(
            err.hint(),
            Some("Hint: check MYSQL_HOST and MYSQL_PORT settings.")
        );
    }

    #[test]
    fn test_no_hint_for_policy() {
        assert!(DbError::policy("Use the \"query\" tool").hint().is_none());
    }

    #[test]
    fn test_format_error_with_hint() {
        let text = format_error(&DbError::timeout(30000));
        assert_eq!(
            text,
            "Error: Query timeout after 30000ms\nHint: increase MYSQL_QUERY_TIMEOUT or optimize the query."
        );
    }

    #[test]
    fn test_format_error_without_hint() {
        let text = format_error(&DbError::execution("Duplicate entry '1' for key 'PRIMARY'"));
        assert_eq!(text, "Error: Duplicate entry '1' for key 'PRIMARY'");
    }

    #[test]
    fn test_from_sqlx_pool_timeout_is_resource() {
        let err: DbError = sqlx::Error::PoolTimedOut.into();
        assert!(matches!(err, DbError::Resource { .. }));
    }
}
