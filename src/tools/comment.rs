//! Comment editing tool.
//!
//! This module implements the `add_comment` MCP tool. It only changes table
//! or column comments: a column comment is applied by re-issuing the column's
//! existing definition from `information_schema` with the new comment.

use crate::db::{ConnectionPool, QueryRunner, Session};
use crate::error::{DbError, DbResult};
use crate::tools::format::{escape_string_value, qualified_table, quote_identifier, quote_string_value};
use schemars::JsonSchema;
use serde::Deserialize;
use tracing::info;

pub const READ_ONLY_COMMENT_REJECTION: &str =
    "Server is in read-only mode. Modifying comments is not allowed.";

pub const NO_DATABASE_SELECTED: &str =
    "No database selected. Specify a database name or set MYSQL_DATABASE.";

/// Input for the add_comment tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct AddCommentInput {
    /// Table name.
    pub table: String,
    /// Column name. If omitted, sets a table-level comment.
    #[serde(default)]
    pub column: Option<String>,
    /// Comment text to set.
    pub comment: String,
    /// Database name. Uses the current database if omitted.
    #[serde(default)]
    pub database: Option<String>,
}

/// Definition of an existing column, as stored in `information_schema.COLUMNS`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColumnDefinition {
    pub column_type: String,
    pub nullable: bool,
    pub default_value: Option<String>,
    pub extra: String,
}

pub struct CommentToolHandler<P: ConnectionPool> {
    runner: QueryRunner<P>,
}

impl<P: ConnectionPool> CommentToolHandler<P> {
    pub fn new(runner: QueryRunner<P>) -> Self {
        Self { runner }
    }

    pub async fn add_comment(&self, input: AddCommentInput) -> DbResult<String> {
        if self.runner.policy().readonly {
            return Err(DbError::policy(READ_ONLY_COMMENT_REJECTION));
        }

        let message = self
            .runner
            .with_session(|session| async move { apply_comment(&session, input).await })
            .await?;

        info!(result = %message, "Comment updated");
        Ok(message)
    }
}

async fn apply_comment<P: ConnectionPool>(
    session: &Session<P>,
    input: AddCommentInput,
) -> DbResult<String> {
    let database = resolve_database(session, input.database.as_deref())
        .await?
        .ok_or_else(|| DbError::policy(NO_DATABASE_SELECTED))?;
    let full_name = qualified_table(Some(&database), &input.table);

    let Some(column) = input.column.filter(|c| !c.trim().is_empty()) else {
        session
            .execute(&format!(
                "ALTER TABLE {} COMMENT = '{}'",
                full_name,
                escape_string_value(&input.comment)
            ))
            .await?;
        return Ok(format!("Table comment updated: {}", input.table));
    };

    let definition = session
        .execute(&column_definition_sql(&database, &input.table, &column))
        .await?
        .into_rows();
    if definition.is_empty() {
        return Err(DbError::execution(format!(
            "Column '{}' doesn't exist in table '{}'.",
            column, input.table
        )));
    }

    let definition = ColumnDefinition {
        column_type: definition
            .str_value(0, "COLUMN_TYPE")
            .unwrap_or_default()
            .to_string(),
        nullable: definition.str_value(0, "IS_NULLABLE") != Some("NO"),
        default_value: definition.str_value(0, "COLUMN_DEFAULT").map(str::to_string),
        extra: definition.str_value(0, "EXTRA").unwrap_or_default().to_string(),
    };

    session
        .execute(&modify_column_sql(
            &full_name,
            &column,
            &definition,
            &input.comment,
        ))
        .await?;
    Ok(format!("Column comment updated: {}.{}", input.table, column))
}

/// The database named by the caller, or the connection's current one.
pub async fn resolve_database<P: ConnectionPool>(
    session: &Session<P>,
    database: Option<&str>,
) -> DbResult<Option<String>> {
    if let Some(db) = database.map(str::trim).filter(|s| !s.is_empty()) {
        return Ok(Some(db.to_string()));
    }
    let rows = session
        .execute("SELECT DATABASE() AS db")
        .await?
        .into_rows();
    Ok(rows.str_value(0, "db").map(str::to_string))
}

fn column_definition_sql(database: &str, table: &str, column: &str) -> String {
    format!(
        "SELECT COLUMN_TYPE, IS_NULLABLE, COLUMN_DEFAULT, EXTRA FROM information_schema.COLUMNS \
         WHERE TABLE_SCHEMA = {} AND TABLE_NAME = {} AND COLUMN_NAME = {}",
        quote_string_value(database),
        quote_string_value(table),
        quote_string_value(column)
    )
}

/// `ALTER TABLE … MODIFY COLUMN` that keeps the definition and sets the comment.
///
/// `CURRENT_TIMESTAMP` defaults are emitted bare and other expression
/// defaults (marked `DEFAULT_GENERATED` by MySQL 8) in parentheses. The
/// `DEFAULT_GENERATED` marker itself is not valid DDL and is dropped.
pub fn modify_column_sql(
    full_name: &str,
    column: &str,
    definition: &ColumnDefinition,
    comment: &str,
) -> String {
    let generated = definition.extra.contains("DEFAULT_GENERATED");
    let extra = definition.extra.replace("DEFAULT_GENERATED", "");
    let extra = extra.trim();

    let mut sql = format!(
        "ALTER TABLE {} MODIFY COLUMN {} {}",
        full_name,
        quote_identifier(column),
        definition.column_type
    );
    if !definition.nullable {
        sql.push_str(" NOT NULL");
    }
    if let Some(default) = &definition.default_value {
        if default.to_uppercase().starts_with("CURRENT_TIMESTAMP") {
            sql.push_str(&format!(" DEFAULT {}", default));
        } else if generated {
            sql.push_str(&format!(" DEFAULT ({})", default));
        } else {
            sql.push_str(&format!(" DEFAULT {}", quote_string_value(default)));
        }
    }
    if !extra.is_empty() {
        sql.push_str(&format!(" {}", extra));
    }
    sql.push_str(&format!(" COMMENT {}", quote_string_value(comment)));
    sql
}
