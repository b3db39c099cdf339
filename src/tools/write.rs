//! Write operation tool.
//!
//! This module implements the `execute` MCP tool for INSERT, UPDATE, DELETE
//! and DDL statements. Reads are redirected to the `query` tool, and in
//! read-only mode every call is refused before the database is contacted.

use crate::db::{ConnectionPool, QueryRunner, prepare_write};
use crate::error::{DbError, DbResult};
use crate::models::WriteEffect;
use schemars::JsonSchema;
use serde::Deserialize;
use tracing::info;

pub const READ_ONLY_WRITE_REJECTION: &str =
    "Server is in read-only mode. Data modification is not allowed.";

/// Input for the execute tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ExecuteInput {
    /// The SQL statement to execute. SELECT statements are not allowed here; use the "query" tool instead.
    pub sql: String,
}

pub struct WriteToolHandler<P: ConnectionPool> {
    runner: QueryRunner<P>,
}

impl<P: ConnectionPool> WriteToolHandler<P> {
    pub fn new(runner: QueryRunner<P>) -> Self {
        Self { runner }
    }

    pub async fn execute(&self, input: ExecuteInput) -> DbResult<String> {
        if self.runner.policy().readonly {
            return Err(DbError::policy(READ_ONLY_WRITE_REJECTION));
        }

        let request = prepare_write(&input.sql)?;
        let effect = self.runner.execute(&request).await?.effect();

        info!(
            affected_rows = effect.affected_rows,
            changed_rows = effect.changed_rows,
            "Write operation executed"
        );

        Ok(format_effect(&effect))
    }
}

pub fn format_effect(effect: &WriteEffect) -> String {
    format!(
        "affectedRows: {}, changedRows: {}",
        effect.affected_rows, effect.changed_rows
    )
}
