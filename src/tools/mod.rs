//! MCP tool implementations.
//!
//! This module contains all database tool handlers:
//! - `query`: Execute read statements (SELECT, SHOW, DESCRIBE, EXPLAIN, WITH)
//! - `execute`: Execute write operations (INSERT/UPDATE/DELETE/DDL)
//! - `list_databases`, `list_tables`, `describe_table`, `describe_all_tables`:
//!   Schema introspection
//! - `add_comment`: Set a table or column comment
//! - `format`: Result rendering shared by the tools

pub mod comment;
pub mod format;
pub mod query;
pub mod schema;
pub mod write;

pub use comment::{AddCommentInput, CommentToolHandler};
pub use format::{OutputFormat, format_rows};
pub use query::{QueryInput, QueryToolHandler};
pub use schema::{DescribeAllTablesInput, DescribeTableInput, ListTablesInput, SchemaToolHandler};
pub use write::{ExecuteInput, WriteToolHandler};
