//! Query execution tool.
//!
//! This module implements the `query` MCP tool. Only statements classified as
//! reads are accepted; unbounded SELECT/WITH statements are capped at the
//! configured row limit before they are sent.

use crate::db::{ConnectionPool, QueryRunner, prepare_read};
use crate::error::DbResult;
use crate::tools::format::{OutputFormat, format_rows};
use schemars::JsonSchema;
use serde::Deserialize;
use std::time::Instant;
use tracing::info;

/// Input for the query tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct QueryInput {
    /// The SQL query to execute. Only SELECT, SHOW, DESCRIBE, EXPLAIN, and WITH (CTE) statements are allowed.
    pub sql: String,
    /// Output format: "json" (default) returns {"columns": [...], "rows": [[...]]}, "table" returns an ASCII table, "markdown" returns a markdown table
    #[serde(default)]
    pub format: OutputFormat,
}

pub struct QueryToolHandler<P: ConnectionPool> {
    runner: QueryRunner<P>,
    max_rows: u32,
}

impl<P: ConnectionPool> QueryToolHandler<P> {
    pub fn new(runner: QueryRunner<P>, max_rows: u32) -> Self {
        Self { runner, max_rows }
    }

    /// Run a read statement and render its rows.
    pub async fn query(&self, input: QueryInput) -> DbResult<String> {
        let request = prepare_read(&input.sql, self.max_rows)?;

        let start = Instant::now();
        let rows = self.runner.execute(&request).await?.into_rows();
        let execution_time_ms = start.elapsed().as_millis() as u64;

        info!(
            row_count = rows.row_count(),
            execution_time_ms = execution_time_ms,
            "Query executed"
        );

        Ok(format_rows(&rows, input.format, execution_time_ms))
    }
}
