//! Connection factory
//!
//! [`configure`] opens the shared SQLite pool once at startup and returns a
//! [`ConnectionHandle`]. A [`SessionFactory`] built from that handle mints one
//! [`Session`] (one pooled connection plus its buffered changes) per unit of
//! work.

use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Pool, Sqlite};

use super::error::{DatabaseError, Result};
use super::schema;
use super::session::Session;

/// Default maximum connections in the pool
pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;

/// Default wait for a free pooled connection
pub const DEFAULT_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(30);

/// Everything needed to open the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    /// SQLite URL, e.g. `sqlite:data/pianos.db?mode=rwc`
    pub connection_string: String,
    /// Upper bound on mapped name columns, in characters
    pub max_name_length: usize,
    pub max_connections: u32,
    /// Wait for a pooled connection, and for SQLite's write lock
    pub acquire_timeout: Duration,
}

impl DatabaseConfig {
    pub fn new(connection_string: impl Into<String>, max_name_length: usize) -> Self {
        Self {
            connection_string: connection_string.into(),
            max_name_length,
            max_connections: DEFAULT_MAX_CONNECTIONS,
            acquire_timeout: DEFAULT_ACQUIRE_TIMEOUT,
        }
    }

    pub fn with_max_connections(mut self, max_connections: u32) -> Self {
        self.max_connections = max_connections;
        self
    }

    pub fn with_acquire_timeout(mut self, acquire_timeout: Duration) -> Self {
        self.acquire_timeout = acquire_timeout;
        self
    }
}

/// Shared connection pool
///
/// Cheap to clone; clones share the same pool. Closing any clone closes the
/// pool for all of them.
#[derive(Clone)]
pub struct ConnectionHandle {
    pool: Pool<Sqlite>,
    max_name_length: usize,
}

impl std::fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("max_name_length", &self.max_name_length)
            .finish_non_exhaustive()
    }
}

/// Open the pool and make sure the schema exists
///
/// Validation is eager: an empty, non-SQLite or unparsable connection string,
/// or a database that cannot be opened, fails here with
/// [`DatabaseError::Configuration`]. Calling this twice with the same string
/// yields two independent pools over the same database.
pub async fn configure(config: &DatabaseConfig) -> Result<ConnectionHandle> {
    let url = config.connection_string.trim();
    if url.is_empty() {
        return Err(DatabaseError::configuration("connection string is empty"));
    }
    if !url.starts_with("sqlite:") {
        return Err(DatabaseError::configuration(format!(
            "unsupported connection string {url:?}, expected a sqlite: URL"
        )));
    }
    if config.max_name_length == 0 {
        return Err(DatabaseError::configuration(
            "max_name_length must be at least 1",
        ));
    }
    if config.max_connections == 0 {
        return Err(DatabaseError::configuration(
            "max_connections must be at least 1",
        ));
    }

    let options = SqliteConnectOptions::from_str(url)
        .map_err(|e| DatabaseError::configuration(format!("invalid connection string {url:?}: {e}")))?
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .busy_timeout(config.acquire_timeout);

    let pool = SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(config.acquire_timeout)
        .connect_with(options)
        .await
        .map_err(|e| DatabaseError::configuration(format!("failed to open {url:?}: {e}")))?;

    if let Err(e) = schema::run_migrations(&pool).await {
        pool.close().await;
        return Err(e);
    }

    tracing::info!(
        "Opened piano database at {} (max {} connections)",
        url,
        config.max_connections
    );

    Ok(ConnectionHandle {
        pool,
        max_name_length: config.max_name_length,
    })
}

impl ConnectionHandle {
    /// Underlying sqlx pool, for queries outside any session
    #[inline]
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    pub fn max_name_length(&self) -> usize {
        self.max_name_length
    }

    /// Close the pool, waiting for checked-out connections to come back
    pub async fn close(&self) {
        self.pool.close().await;
        tracing::info!("Closed piano database");
    }

    pub fn is_closed(&self) -> bool {
        self.pool.is_closed()
    }
}

/// Mints sessions bound to one pool
#[derive(Debug, Clone)]
pub struct SessionFactory {
    handle: ConnectionHandle,
}

impl SessionFactory {
    pub fn new(handle: ConnectionHandle) -> Self {
        Self { handle }
    }

    /// Start a unit of work on its own pooled connection
    ///
    /// Waits for a free connection up to the configured acquire timeout, then
    /// fails with [`DatabaseError::ResourceExhausted`]. The session holds no
    /// lock on the store until it commits.
    pub async fn new_session(&self) -> Result<Session> {
        let conn = self.handle.pool.acquire().await?;
        Ok(Session::new(conn, self.handle.max_name_length))
    }

    pub fn handle(&self) -> &ConnectionHandle {
        &self.handle
    }
}

/// Build a session factory sharing `handle`'s pool
pub fn create_session_factory(handle: &ConnectionHandle) -> SessionFactory {
    SessionFactory::new(handle.clone())
}
