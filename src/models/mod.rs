//! Data models for the MySQL MCP Server.
//!
//! This module re-exports all model types used throughout the application.

pub mod query;

// Re-export commonly used types
pub use query::{
    ColumnMetadata, DEFAULT_QUERY_TIMEOUT_MS, DEFAULT_ROW_LIMIT, ExecutionPolicy,
    ExecutionRequest, ExecutionResult, RowSet, StatementIntent, WriteEffect,
};
