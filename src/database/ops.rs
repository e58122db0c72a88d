//! Database operations organized by entity type
//!
//! Everything here runs on the connection a session holds. Reads run in
//! autocommit mode; writes are issued by the session inside its own short
//! write transaction.

mod categories;
mod pianos;

pub use categories::*;
pub use pianos::*;

use sqlx::SqliteConnection;

use super::error::Result;
use super::mapping::Entity;

/// Reserve the next primary key of `E`'s table
///
/// Advances the table's AUTOINCREMENT counter, so the id is never handed out
/// again even if the row is never written. Must run inside a write transaction.
pub async fn next_id<E: Entity>(conn: &mut SqliteConnection) -> Result<i64> {
    // The counter row only appears after the table's first insert
    sqlx::query(
        "INSERT INTO sqlite_sequence (name, seq) SELECT ?, 0 WHERE NOT EXISTS (SELECT 1 FROM sqlite_sequence WHERE name = ?)",
    )
    .bind(E::TABLE)
    .bind(E::TABLE)
    .execute(&mut *conn)
    .await?;

    let id: i64 =
        sqlx::query_scalar("UPDATE sqlite_sequence SET seq = seq + 1 WHERE name = ? RETURNING seq")
            .bind(E::TABLE)
            .fetch_one(&mut *conn)
            .await?;

    tracing::debug!("Reserved {} id {}", E::TABLE, id);
    Ok(id)
}
