//! Database module for the piano catalog
//! Uses SQLite via sqlx; every session buffers its writes on one pooled connection
//! and flushes them in a single transaction at commit

mod connection;
mod error;
mod mapping;
mod models;
mod ops;
mod pending;
mod schema;
mod session;

#[cfg(test)]
pub(crate) mod test_support;

pub use connection::{
    ConnectionHandle, DEFAULT_ACQUIRE_TIMEOUT, DEFAULT_MAX_CONNECTIONS, DatabaseConfig,
    SessionFactory, configure, create_session_factory,
};
pub use error::{DatabaseError, Result};
pub use mapping::{ColumnDef, ColumnKind, Entity, SqliteQuery};
pub use models::*;
pub use session::Session;
