//! MySQL MCP Server Library
//!
//! This library provides MCP (Model Context Protocol) tools for AI assistants
//! to explore and query MySQL databases. Statements are classified before they
//! are sent, run under a timeout, and in read-only mode execute inside a
//! read-only transaction that is always rolled back.

pub mod config;
pub mod db;
pub mod error;
pub mod mcp;
pub mod models;
pub mod tools;
pub mod transport;

pub use config::{Config, MySqlConfig};
pub use db::{ConnectionPool, MySqlLeasePool, QueryRunner, Session};
pub use error::{DbError, DbResult};
pub use mcp::MySqlService;
