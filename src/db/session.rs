//! Sessions: several statements on one leased connection.
//!
//! A session is opened once (lease, then in read-only mode
//! `SET SESSION TRANSACTION READ ONLY` and a transaction begin) and torn down
//! once (rollback in read-only mode, then release). Statements run on a
//! spawned task so a timeout only abandons the caller's wait; the connection
//! stays with that task until the statement settles, and teardown waits for it.
//!
//! Lifecycle of the connection slot:
//!
//! ```text
//! Idle(conn) --execute--> Busy(task) --settled--> Idle(conn)
//!                             |
//!                 timeout or dropped caller: stays Busy, later statements are refused
//!
//! close / drop: Idle -> rollback + release
//!               Busy -> background task awaits the statement, then rollback + release
//! ```

use crate::db::pool::{ConnectionPool, PooledConnection};
use crate::error::{DbError, DbResult};
use crate::models::{ExecutionPolicy, ExecutionResult};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Statement that forces the server to reject writes for the rest of the session.
pub const READ_ONLY_SESSION_SQL: &str = "SET SESSION TRANSACTION READ ONLY";

type StatementTask<C> = JoinHandle<(C, DbResult<ExecutionResult>)>;

enum Slot<C> {
    Idle(C),
    Busy(StatementTask<C>),
    Closed,
}

struct SessionState<P: ConnectionPool> {
    pool: Arc<P>,
    policy: ExecutionPolicy,
    slot: Slot<P::Connection>,
}

/// Handle to an open session. Clones share the same connection.
pub struct Session<P: ConnectionPool> {
    state: Arc<Mutex<SessionState<P>>>,
}

impl<P: ConnectionPool> Clone for Session<P> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

impl<P: ConnectionPool> Session<P> {
    /// Lease a connection and, in read-only mode, open the read-only transaction.
    ///
    /// If setup fails the connection is rolled back (best effort) and released
    /// before the error is returned.
    pub(crate) async fn open(pool: Arc<P>, policy: ExecutionPolicy) -> DbResult<Self> {
        let mut conn = pool.acquire().await?;

        if policy.readonly {
            if let Err(err) = begin_read_only(&mut conn).await {
                rollback_quietly(&mut conn).await;
                pool.release(conn);
                return Err(err);
            }
        }

        debug!(readonly = policy.readonly, "Session opened");
        Ok(Self {
            state: Arc::new(Mutex::new(SessionState {
                pool,
                policy,
                slot: Slot::Idle(conn),
            })),
        })
    }

    /// Run one statement on the session connection, bounded by the policy timeout.
    ///
    /// Statements issued through clones of the same session run one at a time,
    /// in the order their callers reach the session lock.
    pub async fn execute(&self, sql: &str) -> DbResult<ExecutionResult> {
        let mut state = self.state.lock().await;
        state.run(sql.to_string()).await
    }

    /// Tear the session down. Later statements fail with a resource error.
    pub(crate) async fn close(&self) {
        let mut state = self.state.lock().await;
        state.close().await;
    }
}

impl<P: ConnectionPool> SessionState<P> {
    async fn run(&mut self, sql: String) -> DbResult<ExecutionResult> {
        let mut conn = match std::mem::replace(&mut self.slot, Slot::Closed) {
            Slot::Idle(conn) => conn,
            busy @ Slot::Busy(_) => {
                self.slot = busy;
                return Err(DbError::resource(
                    "Session connection is still busy with an unfinished statement",
                ));
            }
            Slot::Closed => return Err(DbError::resource("Session is already closed")),
        };

        self.slot = Slot::Busy(tokio::spawn(async move {
            let result = conn.execute(&sql).await;
            (conn, result)
        }));

        // The task stays in the slot while we wait, so a dropped caller
        // leaves it for teardown to collect.
        let Slot::Busy(task) = &mut self.slot else {
            return Err(DbError::resource("Session connection slot was lost"));
        };

        match await_statement(task, self.policy).await {
            Ok((conn, result)) => {
                self.slot = Slot::Idle(conn);
                result
            }
            Err(err @ DbError::Timeout { .. }) => {
                warn!(
                    timeout_ms = self.policy.timeout_ms,
                    "Statement timed out; connection stays leased until it settles"
                );
                Err(err)
            }
            Err(err) => {
                self.slot = Slot::Closed;
                Err(err)
            }
        }
    }

    async fn close(&mut self) {
        match std::mem::replace(&mut self.slot, Slot::Closed) {
            Slot::Closed => {}
            idle @ Slot::Idle(_) => {
                teardown(Arc::clone(&self.pool), self.policy.readonly, idle).await;
                debug!("Session closed");
            }
            busy @ Slot::Busy(_) => {
                debug!("Session closed with a statement in flight; release deferred");
                tokio::spawn(teardown(Arc::clone(&self.pool), self.policy.readonly, busy));
            }
        }
    }
}

impl<P: ConnectionPool> Drop for SessionState<P> {
    fn drop(&mut self) {
        let slot = std::mem::replace(&mut self.slot, Slot::Closed);
        if matches!(slot, Slot::Closed) {
            return;
        }

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            match slot {
                Slot::Idle(conn) => {
                    warn!("Session dropped outside a runtime; connection returned without rollback");
                    self.pool.release(conn);
                }
                _ => warn!("Session dropped outside a runtime with a statement in flight"),
            }
            return;
        };

        let pool = Arc::clone(&self.pool);
        let readonly = self.policy.readonly;
        runtime.spawn(async move {
            teardown(pool, readonly, slot).await;
            warn!("Session released via Drop - the session future was dropped before finishing");
        });
    }
}

/// Wait for a statement task, giving up once the policy budget runs out.
///
/// Giving up does not touch the task; it keeps running and keeps whatever it owns.
pub(crate) async fn await_statement<T>(
    task: &mut JoinHandle<T>,
    policy: ExecutionPolicy,
) -> DbResult<T> {
    let joined = match policy.timeout() {
        None => task.await,
        Some(budget) => tokio::time::timeout(budget, task)
            .await
            .map_err(|_| DbError::timeout(policy.timeout_ms))?,
    };

    joined.map_err(|e| DbError::resource(format!("Statement task failed: {}", e)))
}

async fn begin_read_only<C: PooledConnection>(conn: &mut C) -> DbResult<()> {
    conn.set_read_only().await?;
    conn.begin_transaction().await
}

/// Roll back, logging instead of returning a failure.
async fn rollback_quietly<C: PooledConnection>(conn: &mut C) {
    if let Err(err) = conn.rollback().await {
        warn!(error = %err, "Rollback failed; releasing connection anyway");
    }
}

/// Final rollback and release for whatever the slot still holds.
async fn teardown<P: ConnectionPool>(pool: Arc<P>, readonly: bool, slot: Slot<P::Connection>) {
    let mut conn = match slot {
        Slot::Idle(conn) => conn,
        Slot::Busy(task) => match task.await {
            Ok((conn, _)) => {
                debug!("Abandoned statement settled; releasing connection");
                conn
            }
            Err(err) => {
                warn!(error = %err, "Abandoned statement task failed; connection not returned");
                return;
            }
        },
        Slot::Closed => return,
    };

    if readonly {
        rollback_quietly(&mut conn).await;
    }
    pool.release(conn);
}
