//! Database error types
//!
//! Only foreign key violations and contention (pool acquisition timeouts, or
//! SQLite's write lock still busy after its timeout) are picked out of the
//! store's errors. Everything else is carried through untouched as
//! [`DatabaseError::Store`], with the original `sqlx::Error` as its source.

use thiserror::Error;

/// Result alias for the database layer
pub type Result<T> = std::result::Result<T, DatabaseError>;

/// Errors surfaced by the connection factory, sessions and entity mapping
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Connection string missing, malformed, or the store could not be opened
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A mapped column value broke its declared constraint before reaching the store
    #[error("{column} is {actual} characters long, limit is {max}")]
    Validation {
        column: &'static str,
        max: usize,
        actual: usize,
    },

    /// A foreign key points at a row that does not exist
    #[error("referential integrity violated: {0}")]
    ReferentialIntegrity(#[source] sqlx::Error),

    /// No pooled connection, or no write lock, became available in time
    #[error("resource exhausted: {0}")]
    ResourceExhausted(#[source] sqlx::Error),

    /// Any other store failure, unclassified
    #[error("database error: {0}")]
    Store(#[source] sqlx::Error),
}

impl DatabaseError {
    /// Create a configuration error
    pub fn configuration(reason: impl Into<String>) -> Self {
        Self::Configuration(reason.into())
    }
}

/// Primary result code for `SQLITE_BUSY`; extended codes keep it in the low byte
const SQLITE_BUSY: i32 = 5;

fn is_busy(db: &(dyn sqlx::error::DatabaseError + 'static)) -> bool {
    let busy_code = db
        .code()
        .and_then(|code| code.parse::<i32>().ok())
        .is_some_and(|code| code & 0xff == SQLITE_BUSY);
    busy_code || db.message().contains("database is locked")
}

impl From<sqlx::Error> for DatabaseError {
    fn from(err: sqlx::Error) -> Self {
        if matches!(err, sqlx::Error::PoolTimedOut) {
            return Self::ResourceExhausted(err);
        }
        if err.as_database_error().is_some_and(is_busy) {
            return Self::ResourceExhausted(err);
        }

        let foreign_key = err.as_database_error().is_some_and(|db| {
            db.is_foreign_key_violation() || db.message().contains("FOREIGN KEY constraint failed")
        });

        if foreign_key {
            Self::ReferentialIntegrity(err)
        } else {
            Self::Store(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_timeout_is_resource_exhausted() {
        let err: DatabaseError = sqlx::Error::PoolTimedOut.into();
        assert!(matches!(err, DatabaseError::ResourceExhausted(_)));
    }

    #[test]
    fn test_other_errors_pass_through() {
        let err: DatabaseError = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, DatabaseError::Store(sqlx::Error::RowNotFound)));

        let err: DatabaseError = sqlx::Error::PoolClosed.into();
        assert!(matches!(err, DatabaseError::Store(_)));
    }

    #[test]
    fn test_validation_display() {
        let err = DatabaseError::Validation {
            column: "name",
            max: 10,
            actual: 11,
        };
        assert_eq!(err.to_string(), "name is 11 characters long, limit is 10");
    }
}
