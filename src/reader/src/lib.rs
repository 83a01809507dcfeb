//! Prometheus remote_read over ClickHouse.
//!
//! Each remote_read query becomes one grouped SQL statement. Rows come back
//! sorted by series identity and are regrouped into time series as they stream.

pub mod assembler;
pub mod clause;
pub mod clickhouse;
pub mod error;
pub mod executor;
pub mod handler;
pub mod hints;
pub mod matcher;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use self::clickhouse::ClickHouseExecutor;
pub use error::ReadError;
pub use executor::{ReadSettings, RemoteReader, RowStream, SqlExecutor, Statement, StorageRow};
pub use handler::{ReadHandlerState, create_router};
