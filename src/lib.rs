// Core infrastructure modules
pub mod core;

// Supporting modules
pub mod config;
pub mod sql;

#[doc(hidden)]
pub mod test_utils;

pub use crate::core::db::{
    CommandRequest, ConnectionConfig, Descriptor, Driver, Environment, InstanceInfo, Params, QueryOutput,
    QueryRequest, ResultRow, Session, SessionStatus, SqliteDriver, Value,
};
pub use crate::core::{DbError, DriverError, Result};
pub use crate::sql::StatementPolicy;
