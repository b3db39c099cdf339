//! Query execution engine.
//!
//! [`QueryRunner`] executes classified requests under a fixed
//! [`ExecutionPolicy`]:
//! - Non-read-only: the statement goes straight to the pool's auto-commit path.
//! - Read-only: the statement runs in a one-statement [`Session`], i.e. inside
//!   a read-only transaction that is always rolled back.
//!
//! Every statement is bounded by the policy timeout. A timeout abandons only
//! the caller's wait; the statement keeps its connection until it settles.

use crate::db::pool::ConnectionPool;
use crate::db::session::{Session, await_statement};
use crate::error::{DbError, DbResult};
use crate::models::{ExecutionPolicy, ExecutionRequest, ExecutionResult};
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, warn};

pub struct QueryRunner<P: ConnectionPool> {
    pool: Arc<P>,
    policy: ExecutionPolicy,
}

impl<P: ConnectionPool> Clone for QueryRunner<P> {
    fn clone(&self) -> Self {
        Self {
            pool: Arc::clone(&self.pool),
            policy: self.policy,
        }
    }
}

impl<P: ConnectionPool> QueryRunner<P> {
    pub fn new(pool: Arc<P>, policy: ExecutionPolicy) -> Self {
        Self { pool, policy }
    }

    pub fn policy(&self) -> ExecutionPolicy {
        self.policy
    }

    pub fn pool(&self) -> &Arc<P> {
        &self.pool
    }

    /// Execute a single statement.
    pub async fn execute(&self, request: &ExecutionRequest) -> DbResult<ExecutionResult> {
        debug!(
            intent = %request.intent(),
            readonly = self.policy.readonly,
            "Executing request"
        );

        let sql = request.sql().to_string();
        if self.policy.readonly {
            return self
                .with_session(|session| async move { session.execute(&sql).await })
                .await;
        }

        let pool = Arc::clone(&self.pool);
        let mut task = tokio::spawn(async move { pool.execute(&sql).await });
        match await_statement(&mut task, self.policy).await {
            Ok(result) => result,
            Err(err) => {
                if matches!(err, DbError::Timeout { .. }) {
                    warn!(
                        timeout_ms = self.policy.timeout_ms,
                        "Statement timed out; it keeps running on the server"
                    );
                }
                Err(err)
            }
        }
    }

    /// Run `body` against one leased connection.
    ///
    /// Setup happens once before `body` runs and teardown once after it
    /// returns or fails, however many statements it issues. The body's result
    /// is returned unchanged; teardown failures are logged, never surfaced.
    pub async fn with_session<T, F, Fut>(&self, body: F) -> DbResult<T>
    where
        F: FnOnce(Session<P>) -> Fut,
        Fut: Future<Output = DbResult<T>>,
    {
        let session = Session::open(Arc::clone(&self.pool), self.policy).await?;
        let result = body(session.clone()).await;
        session.close().await;
        result
    }
}
