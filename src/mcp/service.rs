//! MCP service implementation using rmcp.
//!
//! This module defines the MySqlService struct with all MySQL tools exposed
//! via the MCP protocol using the rmcp framework's macros. Every tool returns
//! plain text; failures come back as an error result carrying the formatted
//! message and, when one applies, a hint.

use crate::db::{MySqlLeasePool, QueryRunner};
use crate::error::{DbResult, format_error};
use crate::tools::comment::{AddCommentInput, CommentToolHandler};
use crate::tools::query::{QueryInput, QueryToolHandler};
use crate::tools::schema::{
    DescribeAllTablesInput, DescribeTableInput, ListTablesInput, SchemaToolHandler,
};
use crate::tools::write::{ExecuteInput, WriteToolHandler};
use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::tool::ToolRouter,
    handler::server::wrapper::Parameters,
    model::{CallToolResult, Content, Implementation, ProtocolVersion, ServerCapabilities, ServerInfo},
    tool, tool_handler, tool_router,
};
use tracing::warn;

#[derive(Clone)]
pub struct MySqlService {
    /// Shared execution engine for all tools
    runner: QueryRunner<MySqlLeasePool>,
    /// Row cap applied to unbounded SELECT/WITH statements
    max_rows: u32,
    /// Tool router for MCP tool dispatch (auto-generated)
    tool_router: ToolRouter<Self>,
}

impl MySqlService {
    pub fn new(runner: QueryRunner<MySqlLeasePool>, max_rows: u32) -> Self {
        Self {
            runner,
            max_rows,
            tool_router: Self::tool_router(),
        }
    }

    pub fn runner(&self) -> &QueryRunner<MySqlLeasePool> {
        &self.runner
    }
}

/// Turn a handler outcome into a tool result.
///
/// Handler failures are not protocol errors: the client gets an error result
/// with the message (and hint) as text, the way a SQL console would show it.
pub fn into_tool_result(tool: &str, outcome: DbResult<String>) -> CallToolResult {
    match outcome {
        Ok(text) => CallToolResult::success(vec![Content::text(text)]),
        Err(e) => {
            warn!(tool = tool, category = ?e.category(), error = %e, "Tool call failed");
            CallToolResult::error(vec![Content::text(format_error(&e))])
        }
    }
}

#[tool_router]
impl MySqlService {
    #[tool(
        description = "Execute a read-only SQL query (SELECT, SHOW, DESCRIBE, EXPLAIN, WITH).\nSELECT and WITH statements without a LIMIT are capped at the configured row limit.\nOutput format: json (default), table, or markdown."
    )]
    async fn query(
        &self,
        Parameters(input): Parameters<QueryInput>,
    ) -> Result<CallToolResult, McpError> {
        let handler = QueryToolHandler::new(self.runner.clone(), self.max_rows);
        Ok(into_tool_result("query", handler.query(input).await))
    }

    #[tool(
        description = "Execute a data-modifying SQL statement (INSERT, UPDATE, DELETE, CREATE, ALTER, DROP).\nNot available when the server runs in read-only mode.\nReturns the number of affected and changed rows."
    )]
    async fn execute(
        &self,
        Parameters(input): Parameters<ExecuteInput>,
    ) -> Result<CallToolResult, McpError> {
        let handler = WriteToolHandler::new(self.runner.clone());
        Ok(into_tool_result("execute", handler.execute(input).await))
    }

    #[tool(description = "List all databases on the MySQL server.")]
    async fn list_databases(&self) -> Result<CallToolResult, McpError> {
        let handler = SchemaToolHandler::new(self.runner.clone());
        Ok(into_tool_result(
            "list_databases",
            handler.list_databases().await,
        ))
    }

    #[tool(description = "List all tables in a database.\nUses the current database if `database` is omitted.")]
    async fn list_tables(
        &self,
        Parameters(input): Parameters<ListTablesInput>,
    ) -> Result<CallToolResult, McpError> {
        let handler = SchemaToolHandler::new(self.runner.clone());
        Ok(into_tool_result("list_tables", handler.list_tables(input).await))
    }

    #[tool(
        description = "Show the structure of a table: column names, types, nullability, keys, defaults, extra attributes and comments."
    )]
    async fn describe_table(
        &self,
        Parameters(input): Parameters<DescribeTableInput>,
    ) -> Result<CallToolResult, McpError> {
        let handler = SchemaToolHandler::new(self.runner.clone());
        Ok(into_tool_result(
            "describe_table",
            handler.describe_table(input).await,
        ))
    }

    #[tool(
        description = "Show the structure of every table in a database in one call.\nUses the current database if `database` is omitted."
    )]
    async fn describe_all_tables(
        &self,
        Parameters(input): Parameters<DescribeAllTablesInput>,
    ) -> Result<CallToolResult, McpError> {
        let handler = SchemaToolHandler::new(self.runner.clone());
        Ok(into_tool_result(
            "describe_all_tables",
            handler.describe_all_tables(input).await,
        ))
    }

    #[tool(
        description = "Set a comment on a table, or on a column when `column` is given.\nThe column keeps its existing type, nullability, default and attributes.\nNot available when the server runs in read-only mode."
    )]
    async fn add_comment(
        &self,
        Parameters(input): Parameters<AddCommentInput>,
    ) -> Result<CallToolResult, McpError> {
        let handler = CommentToolHandler::new(self.runner.clone());
        Ok(into_tool_result("add_comment", handler.add_comment(input).await))
    }
}

#[tool_handler]
impl ServerHandler for MySqlService {
    fn get_info(&self) -> ServerInfo {
        let mode = if self.runner.policy().readonly {
            "This server is in **read-only** mode: `execute` and `add_comment` are disabled and \
            every statement runs inside a read-only transaction that is rolled back afterwards."
        } else {
            "This server is in **read-write** mode: use `execute` for data modification."
        };

        ServerInfo {
            protocol_version: ProtocolVersion::V_2025_03_26,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "mysql-mcp-server".to_owned(),
                title: Some("MySQL MCP Server".to_owned()),
                version: env!("CARGO_PKG_VERSION").to_owned(),
                icons: None,
                website_url: None,
            },
            instructions: Some(format!(
                "MySQL tools for exploring schemas and running SQL.\n\
                \n\
                ## Workflow\n\
                1. Call `list_databases` and `list_tables` to find the data\n\
                2. Call `describe_table` (or `describe_all_tables`) to learn column names\n\
                3. Use `query` for reads and `execute` for writes\n\
                \n\
                ## Mode\n\
                {}\n\
                \n\
                ## Limits\n\
                SELECT and WITH statements without a LIMIT return at most {} rows.",
                mode, self.max_rows
            )),
        }
    }
}
