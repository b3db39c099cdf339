//! Connection lease pool.
//!
//! The execution engine only talks to a pool through the [`ConnectionPool`]
//! and [`PooledConnection`] traits: lease a connection, run statements on it,
//! hand it back. [`MySqlLeasePool`] is the production implementation on top of
//! `sqlx::MySqlPool`.
//!
//! Caller statements go through the prepared-statement protocol, which the
//! server accepts only one statement at a time. The text protocol is kept for
//! the engine's own session and transaction control statements.

use crate::config::MySqlConfig;
use crate::db::session::READ_ONLY_SESSION_SQL;
use crate::db::types;
use crate::error::{DbError, DbResult};
use crate::models::{ColumnMetadata, ExecutionResult, RowSet, WriteEffect};
use futures_util::TryStreamExt;
use sqlx::mysql::{MySqlConnectOptions, MySqlPoolOptions, MySqlSslMode};
use sqlx::pool::PoolConnection;
use sqlx::{Either, Executor, MySql, MySqlPool};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info};

/// How long `acquire` waits for a free connection before failing.
pub const DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 30;

/// A connection leased from a [`ConnectionPool`].
pub trait PooledConnection: Send + 'static {
    /// Run one caller statement on this connection. Stacked statements are
    /// refused by the server.
    fn execute(&mut self, sql: &str) -> impl Future<Output = DbResult<ExecutionResult>> + Send;

    /// Make later transactions on this connection read-only.
    fn set_read_only(&mut self) -> impl Future<Output = DbResult<()>> + Send;

    fn begin_transaction(&mut self) -> impl Future<Output = DbResult<()>> + Send;

    fn rollback(&mut self) -> impl Future<Output = DbResult<()>> + Send;
}

/// Bounded pool of database connections.
///
/// `release` takes the connection by value, so a lease can only ever be
/// returned once.
pub trait ConnectionPool: Send + Sync + 'static {
    type Connection: PooledConnection;

    /// Lease a connection. Suspends while the pool is saturated.
    fn acquire(&self) -> impl Future<Output = DbResult<Self::Connection>> + Send;

    /// Return a leased connection to the pool.
    fn release(&self, conn: Self::Connection);

    /// Run a single caller statement on whichever connection the pool picks,
    /// in auto-commit mode.
    fn execute(&self, sql: &str) -> impl Future<Output = DbResult<ExecutionResult>> + Send;
}

/// `sqlx` backed MySQL pool.
#[derive(Debug, Clone)]
pub struct MySqlLeasePool {
    pool: MySqlPool,
}

impl MySqlLeasePool {
    /// Build the pool. Connections are opened lazily on first use.
    pub fn connect(config: &MySqlConfig) -> DbResult<Self> {
        let mut options = MySqlConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .username(&config.user)
            .password(&config.password)
            .charset("utf8mb4")
            .ssl_mode(if config.ssl {
                MySqlSslMode::VerifyIdentity
            } else {
                MySqlSslMode::Disabled
            });
        if let Some(database) = &config.database {
            options = options.database(database);
        }

        if config.max_connections == 0 {
            return Err(DbError::resource("max_connections must be greater than 0"));
        }

        let pool = MySqlPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(DEFAULT_ACQUIRE_TIMEOUT_SECS))
            .connect_lazy_with(options);

        info!(
            host = %config.host,
            port = config.port,
            database = ?config.database,
            max_connections = config.max_connections,
            ssl = config.ssl,
            "MySQL pool created"
        );

        Ok(Self { pool })
    }

    /// Close the pool, waiting for leased connections to come back.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

impl ConnectionPool for MySqlLeasePool {
    type Connection = MySqlLease;

    async fn acquire(&self) -> DbResult<MySqlLease> {
        let conn = self.pool.acquire().await?;
        Ok(MySqlLease { conn })
    }

    fn release(&self, conn: MySqlLease) {
        // Dropping a PoolConnection hands it back to the sqlx pool.
        drop(conn);
    }

    async fn execute(&self, sql: &str) -> DbResult<ExecutionResult> {
        run_statement(&self.pool, sql).await
    }
}

/// A connection leased from [`MySqlLeasePool`].
pub struct MySqlLease {
    conn: PoolConnection<MySql>,
}

impl PooledConnection for MySqlLease {
    async fn execute(&mut self, sql: &str) -> DbResult<ExecutionResult> {
        run_statement(&mut *self.conn, sql).await
    }

    async fn set_read_only(&mut self) -> DbResult<()> {
        (&mut *self.conn).execute(READ_ONLY_SESSION_SQL).await?;
        Ok(())
    }

    async fn begin_transaction(&mut self) -> DbResult<()> {
        (&mut *self.conn).execute("START TRANSACTION").await?;
        Ok(())
    }

    async fn rollback(&mut self) -> DbResult<()> {
        (&mut *self.conn).execute("ROLLBACK").await?;
        Ok(())
    }
}

/// Prepare `sql` as a single statement, run it and collect its result.
///
/// The statement is not cached on the connection. A statement that yields at
/// least one row becomes `Rows`; otherwise the affected-row count becomes an
/// `Effect`. MySQL's "changed rows" counter is not exposed by the driver, so
/// it mirrors the affected count.
async fn run_statement<'e, E>(executor: E, sql: &'e str) -> DbResult<ExecutionResult>
where
    E: Executor<'e, Database = MySql>,
{
    debug!(sql = %sql, "Executing statement");

    let mut stream = executor.fetch_many(sqlx::query(sql).persistent(false));
    let mut columns: Vec<ColumnMetadata> = Vec::new();
    let mut rows = Vec::new();
    let mut affected_rows = 0u64;

    while let Some(item) = stream.try_next().await? {
        match item {
            Either::Left(done) => affected_rows += done.rows_affected(),
            Either::Right(row) => {
                if columns.is_empty() {
                    columns = types::column_metadata(&row);
                }
                rows.push(types::decode_row(&row));
            }
        }
    }

    if rows.is_empty() {
        Ok(ExecutionResult::Effect(WriteEffect {
            affected_rows,
            changed_rows: affected_rows,
        }))
    } else {
        Ok(ExecutionResult::Rows(RowSet::new(columns, rows)))
    }
}
