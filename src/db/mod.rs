//! Database layer.
//!
//! - `classifier`: statement intent and row-cap detection
//! - `pool`: the connection lease traits and the MySQL pool behind them
//! - `runner`: single-statement execution under the engine policy
//! - `session`: several statements on one leased connection
//! - `types`: MySQL row decoding

pub mod classifier;
pub mod pool;
pub mod runner;
pub mod session;
pub mod types;

pub use classifier::{Classification, classify, prepare_read, prepare_write};
pub use pool::{ConnectionPool, MySqlLease, MySqlLeasePool, PooledConnection};
pub use runner::QueryRunner;
pub use session::Session;
