//! Schema introspection tools.
//!
//! This module implements the `list_databases`, `list_tables`,
//! `describe_table` and `describe_all_tables` MCP tools. All of them issue
//! internally generated `SHOW` statements through the runner, so read-only
//! mode wraps them in the same read-only transaction as caller queries.

use crate::db::{ConnectionPool, QueryRunner};
use crate::error::{DbError, DbResult};
use crate::models::ExecutionRequest;
use crate::tools::format::{ColumnInfo, format_table_description, qualified_table, quote_identifier};
use schemars::JsonSchema;
use serde::Deserialize;
use tracing::info;

/// Text returned by `describe_all_tables` for a database without tables.
pub const NO_TABLES: &str = "(no tables)";

/// Input for the list_tables tool.
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct ListTablesInput {
    /// Database name. Uses the current database if omitted.
    #[serde(default)]
    pub database: Option<String>,
}

/// Input for the describe_table tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct DescribeTableInput {
    /// Table name to describe.
    pub table: String,
    /// Database name. Uses the current database if omitted.
    #[serde(default)]
    pub database: Option<String>,
}

/// Input for the describe_all_tables tool.
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct DescribeAllTablesInput {
    /// Database name. Uses the current database if omitted.
    #[serde(default)]
    pub database: Option<String>,
}

pub struct SchemaToolHandler<P: ConnectionPool> {
    runner: QueryRunner<P>,
}

impl<P: ConnectionPool> SchemaToolHandler<P> {
    pub fn new(runner: QueryRunner<P>) -> Self {
        Self { runner }
    }

    /// JSON array of database names.
    pub async fn list_databases(&self) -> DbResult<String> {
        let rows = self
            .runner
            .execute(&ExecutionRequest::meta("SHOW DATABASES"))
            .await?
            .into_rows();
        to_json_list(&rows.first_column_strings())
    }

    /// JSON array of table names.
    pub async fn list_tables(&self, input: ListTablesInput) -> DbResult<String> {
        let database = non_empty(input.database.as_deref());
        let rows = self
            .runner
            .execute(&ExecutionRequest::meta(show_tables_sql(database)))
            .await?
            .into_rows();
        to_json_list(&rows.first_column_strings())
    }

    pub async fn describe_table(&self, input: DescribeTableInput) -> DbResult<String> {
        let database = non_empty(input.database.as_deref());
        let rows = self
            .runner
            .execute(&ExecutionRequest::meta(show_columns_sql(
                database,
                &input.table,
            )))
            .await?
            .into_rows();
        let columns = ColumnInfo::from_show_columns(&rows);
        Ok(format_table_description(&input.table, &columns))
    }

    /// Describe every table of a database on a single leased connection.
    pub async fn describe_all_tables(&self, input: DescribeAllTablesInput) -> DbResult<String> {
        let database = non_empty(input.database.as_deref()).map(str::to_string);

        let parts = self
            .runner
            .with_session(|session| async move {
                let tables = session
                    .execute(&show_tables_sql(database.as_deref()))
                    .await?
                    .into_rows()
                    .first_column_strings();

                let mut parts = Vec::with_capacity(tables.len());
                for table in &tables {
                    let rows = session
                        .execute(&show_columns_sql(database.as_deref(), table))
                        .await?
                        .into_rows();
                    let columns = ColumnInfo::from_show_columns(&rows);
                    parts.push(format_table_description(table, &columns));
                }
                Ok(parts)
            })
            .await?;

        info!(table_count = parts.len(), "Described all tables");

        if parts.is_empty() {
            return Ok(NO_TABLES.to_string());
        }
        Ok(parts.join("\n\n"))
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}

fn show_tables_sql(database: Option<&str>) -> String {
    match database {
        Some(db) => format!("SHOW TABLES FROM {}", quote_identifier(db)),
        None => "SHOW TABLES".to_string(),
    }
}

fn show_columns_sql(database: Option<&str>, table: &str) -> String {
    format!("SHOW FULL COLUMNS FROM {}", qualified_table(database, table))
}

fn to_json_list(names: &[String]) -> DbResult<String> {
    serde_json::to_string(names)
        .map_err(|e| DbError::execution(format!("Failed to render result: {}", e)))
}
