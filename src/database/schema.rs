//! Database schema bootstrap
//!
//! Tables are generated from the entity mapping tables and created only if
//! missing, so running this against an existing database is a no-op.

use sqlx::{Pool, Sqlite};

use super::error::Result;
use super::mapping::Entity;
use super::models::{Piano, PianoCategory};

/// Create the catalog tables and their foreign key indexes
pub async fn run_migrations(pool: &Pool<Sqlite>) -> Result<()> {
    // Referenced table first
    create_entity_table::<PianoCategory>(pool).await?;
    create_entity_table::<Piano>(pool).await?;

    tracing::info!("Schema ready: {}, {}", PianoCategory::TABLE, Piano::TABLE);
    Ok(())
}

async fn create_entity_table<E: Entity>(pool: &Pool<Sqlite>) -> Result<()> {
    sqlx::query(&E::create_table_sql()).execute(pool).await?;

    for index in E::create_index_sql() {
        sqlx::query(&index).execute(pool).await?;
    }

    Ok(())
}
