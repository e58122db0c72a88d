//! Database models for the piano catalog
//! These models map directly to SQLite tables through their [`Entity`] tables

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::error::Result;
use super::mapping::{ColumnDef, Entity, SqliteQuery, check_length};
use super::session::Session;

/// Piano stored in database
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Piano {
    /// Unique identifier (auto-increment)
    pub id: i64,
    /// Display name, at most `max_name_length` characters
    pub name: String,
    /// Category this piano belongs to
    pub piano_category_id: Option<i64>,
}

impl Entity for Piano {
    const TABLE: &'static str = "pianos";
    const PRIMARY_KEY: &'static str = "id";
    const COLUMNS: &'static [ColumnDef] = &[
        ColumnDef::primary_key("id"),
        ColumnDef::text("name").bounded(),
        ColumnDef::integer("piano_category_id")
            .nullable()
            .references(PianoCategory::TABLE, PianoCategory::PRIMARY_KEY),
    ];

    fn id(&self) -> i64 {
        self.id
    }

    fn bind_columns<'q>(&'q self, query: SqliteQuery<'q>) -> SqliteQuery<'q> {
        query.bind(&self.name).bind(self.piano_category_id)
    }
}

impl Piano {
    /// Check mapped constraints before the row is written
    pub fn validate(&self, max_name_length: usize) -> Result<()> {
        check_length::<Self>("name", &self.name, max_name_length)
    }

    /// Fetch the category this piano points at
    ///
    /// Loaded lazily through the session, so a category still pending in the
    /// same session is visible here.
    pub async fn category(&self, session: &mut Session) -> Result<Option<PianoCategory>> {
        match self.piano_category_id {
            Some(category_id) => session.get_category(category_id).await,
            None => Ok(None),
        }
    }
}

/// Piano category stored in database
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct PianoCategory {
    pub id: i64,
    pub name: String,
}

impl Entity for PianoCategory {
    const TABLE: &'static str = "piano_categories";
    const PRIMARY_KEY: &'static str = "id";
    const COLUMNS: &'static [ColumnDef] = &[
        ColumnDef::primary_key("id"),
        ColumnDef::text("name").bounded(),
    ];

    fn id(&self) -> i64 {
        self.id
    }

    fn bind_columns<'q>(&'q self, query: SqliteQuery<'q>) -> SqliteQuery<'q> {
        query.bind(&self.name)
    }
}

impl PianoCategory {
    pub fn validate(&self, max_name_length: usize) -> Result<()> {
        check_length::<Self>("name", &self.name, max_name_length)
    }

    /// All pianos whose `piano_category_id` is this category, ordered by id
    pub async fn pianos(&self, session: &mut Session) -> Result<Vec<Piano>> {
        session.pianos_in_category(self.id).await
    }
}

// ============ Input structs for creating new records ============

/// Input for creating a new piano
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPiano {
    pub name: String,
    pub piano_category_id: Option<i64>,
}

impl NewPiano {
    pub fn new(name: impl Into<String>, piano_category_id: Option<i64>) -> Self {
        Self {
            name: name.into(),
            piano_category_id,
        }
    }

    pub fn validate(&self, max_name_length: usize) -> Result<()> {
        check_length::<Piano>("name", &self.name, max_name_length)
    }
}

/// Input for creating a new piano category
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPianoCategory {
    pub name: String,
}

impl NewPianoCategory {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn validate(&self, max_name_length: usize) -> Result<()> {
        check_length::<PianoCategory>("name", &self.name, max_name_length)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::DatabaseError;

    #[test]
    fn test_name_at_limit_is_valid() {
        let piano = NewPiano::new("a".repeat(8), None);
        assert!(piano.validate(8).is_ok());
    }

    #[test]
    fn test_name_over_limit_is_rejected() {
        let piano = NewPiano::new("a".repeat(9), Some(1));
        assert!(matches!(
            piano.validate(8),
            Err(DatabaseError::Validation { max: 8, actual: 9, .. })
        ));

        let category = NewPianoCategory::new("b".repeat(9));
        assert!(category.validate(8).is_err());
    }

    #[test]
    fn test_existing_piano_validation() {
        let piano = Piano {
            id: 3,
            name: "Grand".to_string(),
            piano_category_id: None,
        };
        assert!(piano.validate(5).is_ok());
        assert!(piano.validate(4).is_err());
    }

    #[test]
    fn test_empty_name_is_allowed() {
        assert!(NewPiano::new("", None).validate(1).is_ok());
    }
}
