//! Piano queries

use sqlx::SqliteConnection;

use crate::database::Piano;
use crate::database::error::Result;
use crate::database::mapping;

/// Get piano by id
pub async fn get_piano(conn: &mut SqliteConnection, id: i64) -> Result<Option<Piano>> {
    mapping::find_by_id::<Piano>(conn, id).await
}

/// Get all pianos
pub async fn get_all_pianos(conn: &mut SqliteConnection) -> Result<Vec<Piano>> {
    mapping::find_all::<Piano>(conn).await
}

/// Get pianos referencing a category
pub async fn get_pianos_in_category(
    conn: &mut SqliteConnection,
    category_id: i64,
) -> Result<Vec<Piano>> {
    mapping::find_by_column::<Piano>(conn, "piano_category_id", category_id).await
}
