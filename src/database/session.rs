//! Session: one unit of work on one pooled connection
//!
//! Writes are buffered in the session and only reach the store on
//! [`Session::commit`], in one short `BEGIN IMMEDIATE` transaction. Until then
//! no write lock is held, so any number of sessions can have pending changes at
//! once without seeing each other's. Reads go to the store and have the
//! session's own pending changes applied on top.
//!
//! Ids are reserved from the table's AUTOINCREMENT counter when a row is added,
//! so a pending row already carries its final id. Names are validated against
//! the configured limit before anything is buffered; foreign keys are checked
//! by the store at commit.

use sqlx::pool::PoolConnection;
use sqlx::{Sqlite, SqliteConnection};

use super::error::Result;
use super::mapping::Entity;
use super::models::*;
use super::ops;
use super::pending::Pending;

/// Pooled connection plus the changes waiting for commit
///
/// Methods take `&mut self`, so a session stays with one task at a time.
pub struct Session {
    /// Always `Some` until the session is dropped
    conn: Option<PoolConnection<Sqlite>>,
    /// A write transaction was started and not yet finished
    write_open: bool,
    max_name_length: usize,
    categories: Pending<PianoCategory>,
    pianos: Pending<Piano>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("max_name_length", &self.max_name_length)
            .field("pending_categories", &self.categories.len())
            .field("pending_pianos", &self.pianos.len())
            .finish_non_exhaustive()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        // Interrupted mid-write: close the connection instead of returning it
        // to the pool with a transaction still open
        if self.write_open
            && let Some(conn) = self.conn.take()
        {
            tracing::warn!("Session dropped inside a write transaction, discarding connection");
            drop(conn.detach());
        }
    }
}

fn connection(conn: &mut Option<PoolConnection<Sqlite>>) -> &mut SqliteConnection {
    conn.as_deref_mut()
        .expect("session connection is only taken on drop")
}

impl Session {
    pub(crate) fn new(conn: PoolConnection<Sqlite>, max_name_length: usize) -> Self {
        Self {
            conn: Some(conn),
            write_open: false,
            max_name_length,
            categories: Pending::default(),
            pianos: Pending::default(),
        }
    }

    pub fn max_name_length(&self) -> usize {
        self.max_name_length
    }

    /// Whether commit would write anything
    pub fn has_pending_changes(&self) -> bool {
        !self.categories.is_empty() || !self.pianos.is_empty()
    }

    // ============ Piano Operations ============

    pub async fn add_piano(&mut self, piano: NewPiano) -> Result<Piano> {
        piano.validate(self.max_name_length)?;

        let id = self.reserve_id::<Piano>().await?;
        let piano = Piano {
            id,
            name: piano.name,
            piano_category_id: piano.piano_category_id,
        };
        self.pianos.insert(piano.clone());
        Ok(piano)
    }

    pub async fn get_piano(&mut self, id: i64) -> Result<Option<Piano>> {
        if let Some(pending) = self.pianos.get(id) {
            return Ok(pending.cloned());
        }
        ops::get_piano(connection(&mut self.conn), id).await
    }

    pub async fn list_pianos(&mut self) -> Result<Vec<Piano>> {
        let stored = ops::get_all_pianos(connection(&mut self.conn)).await?;
        Ok(self.pianos.overlay(stored, |_| true))
    }

    /// Record the in-memory state of `piano`, returns false if it does not exist
    pub async fn update_piano(&mut self, piano: &Piano) -> Result<bool> {
        piano.validate(self.max_name_length)?;

        if self.get_piano(piano.id).await?.is_none() {
            return Ok(false);
        }
        self.pianos.update(piano.clone());
        Ok(true)
    }

    pub async fn delete_piano(&mut self, id: i64) -> Result<bool> {
        if self.get_piano(id).await?.is_none() {
            return Ok(false);
        }
        self.pianos.delete(id);
        Ok(true)
    }

    /// Inverse side of `Piano::category`
    pub async fn pianos_in_category(&mut self, category_id: i64) -> Result<Vec<Piano>> {
        let stored = ops::get_pianos_in_category(connection(&mut self.conn), category_id).await?;
        Ok(self
            .pianos
            .overlay(stored, |piano| piano.piano_category_id == Some(category_id)))
    }

    // ============ Category Operations ============

    pub async fn add_category(&mut self, category: NewPianoCategory) -> Result<PianoCategory> {
        category.validate(self.max_name_length)?;

        let id = self.reserve_id::<PianoCategory>().await?;
        let category = PianoCategory {
            id,
            name: category.name,
        };
        self.categories.insert(category.clone());
        Ok(category)
    }

    pub async fn get_category(&mut self, id: i64) -> Result<Option<PianoCategory>> {
        if let Some(pending) = self.categories.get(id) {
            return Ok(pending.cloned());
        }
        ops::get_category(connection(&mut self.conn), id).await
    }

    pub async fn list_categories(&mut self) -> Result<Vec<PianoCategory>> {
        let stored = ops::get_all_categories(connection(&mut self.conn)).await?;
        Ok(self.categories.overlay(stored, |_| true))
    }

    pub async fn update_category(&mut self, category: &PianoCategory) -> Result<bool> {
        category.validate(self.max_name_length)?;

        if self.get_category(category.id).await?.is_none() {
            return Ok(false);
        }
        self.categories.update(category.clone());
        Ok(true)
    }

    /// Pianos still pointing at the category make the commit fail
    pub async fn delete_category(&mut self, id: i64) -> Result<bool> {
        if self.get_category(id).await?.is_none() {
            return Ok(false);
        }
        self.categories.delete(id);
        Ok(true)
    }

    // ============ Transaction Control ============

    /// Write every pending change and make it visible to other sessions
    ///
    /// Dangling foreign keys are reported here as
    /// [`DatabaseError::ReferentialIntegrity`](super::DatabaseError::ReferentialIntegrity),
    /// and nothing from the session is kept.
    pub async fn commit(mut self) -> Result<()> {
        if !self.has_pending_changes() {
            return Ok(());
        }

        self.begin_write().await?;
        let conn = connection(&mut self.conn);
        let mut result = self.categories.flush(&mut *conn).await;
        if result.is_ok() {
            result = self.pianos.flush(&mut *conn).await;
        }
        self.finish_write(result).await?;

        tracing::debug!(
            "Session committed {} category and {} piano changes",
            self.categories.len(),
            self.pianos.len()
        );
        Ok(())
    }

    /// Discard every pending change
    pub async fn rollback(self) -> Result<()> {
        tracing::debug!("Session rolled back");
        Ok(())
    }

    // ============ Write Transactions ============

    /// Reserve an id in its own short write transaction
    async fn reserve_id<E: Entity>(&mut self) -> Result<i64> {
        self.begin_write().await?;
        let result = ops::next_id::<E>(connection(&mut self.conn)).await;
        self.finish_write(result).await
    }

    /// Take the store's write lock, waiting up to the busy timeout
    async fn begin_write(&mut self) -> Result<()> {
        if self.write_open {
            self.abort_write().await?;
        }

        self.write_open = true;
        if let Err(e) = sqlx::query("BEGIN IMMEDIATE")
            .execute(connection(&mut self.conn))
            .await
        {
            self.write_open = false;
            return Err(e.into());
        }
        Ok(())
    }

    /// Commit the write transaction if `result` is Ok, roll it back otherwise
    async fn finish_write<T>(&mut self, result: Result<T>) -> Result<T> {
        let value = match result {
            Ok(value) => value,
            Err(e) => {
                self.abort_write().await?;
                return Err(e);
            }
        };

        match sqlx::query("COMMIT")
            .execute(connection(&mut self.conn))
            .await
        {
            Ok(_) => {
                self.write_open = false;
                Ok(value)
            }
            Err(e) => {
                // A failed COMMIT (e.g. deferred foreign key) leaves the transaction open
                self.abort_write().await?;
                Err(e.into())
            }
        }
    }

    async fn abort_write(&mut self) -> Result<()> {
        sqlx::query("ROLLBACK")
            .execute(connection(&mut self.conn))
            .await?;
        self.write_open = false;
        Ok(())
    }
}
