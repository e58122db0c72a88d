//! Piano category queries

use sqlx::SqliteConnection;

use crate::database::PianoCategory;
use crate::database::error::Result;
use crate::database::mapping;

/// Get category by id
pub async fn get_category(conn: &mut SqliteConnection, id: i64) -> Result<Option<PianoCategory>> {
    mapping::find_by_id::<PianoCategory>(conn, id).await
}

/// Get all categories
pub async fn get_all_categories(conn: &mut SqliteConnection) -> Result<Vec<PianoCategory>> {
    mapping::find_all::<PianoCategory>(conn).await
}
