//! Static entity-to-table mapping
//!
//! Every entity declares its table once as a slice of [`ColumnDef`]s. The DDL,
//! SELECT column lists, INSERT and UPDATE statements and text length checks are
//! derived from that table, which lets the helpers at the bottom of this file
//! load, write and delete rows for any [`Entity`] without per-entity SQL.

use sqlx::query::Query;
use sqlx::sqlite::{SqliteArguments, SqliteRow};
use sqlx::{Sqlite, SqliteConnection};

use super::error::{DatabaseError, Result};

/// Storage type of a mapped column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Integer,
    Text,
}

impl ColumnKind {
    fn sql_type(self) -> &'static str {
        match self {
            ColumnKind::Integer => "INTEGER",
            ColumnKind::Text => "TEXT",
        }
    }
}

/// One row of an entity's mapping table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnDef {
    /// Column name, also the struct field name
    pub name: &'static str,
    pub kind: ColumnKind,
    /// Store-assigned integer primary key
    pub primary_key: bool,
    pub nullable: bool,
    /// Text length is capped by the configured `max_name_length`
    pub bounded: bool,
    /// Foreign key target as `(table, column)`
    pub references: Option<(&'static str, &'static str)>,
}

impl ColumnDef {
    /// Auto-increment integer primary key
    pub const fn primary_key(name: &'static str) -> Self {
        Self {
            name,
            kind: ColumnKind::Integer,
            primary_key: true,
            nullable: false,
            bounded: false,
            references: None,
        }
    }

    /// Required text column
    pub const fn text(name: &'static str) -> Self {
        Self {
            name,
            kind: ColumnKind::Text,
            primary_key: false,
            nullable: false,
            bounded: false,
            references: None,
        }
    }

    /// Required integer column
    pub const fn integer(name: &'static str) -> Self {
        Self {
            name,
            kind: ColumnKind::Integer,
            primary_key: false,
            nullable: false,
            bounded: false,
            references: None,
        }
    }

    pub const fn nullable(self) -> Self {
        Self {
            nullable: true,
            ..self
        }
    }

    pub const fn bounded(self) -> Self {
        Self {
            bounded: true,
            ..self
        }
    }

    /// Foreign key, checked by the store when the transaction commits
    pub const fn references(self, table: &'static str, column: &'static str) -> Self {
        Self {
            references: Some((table, column)),
            ..self
        }
    }

    /// Column definition as it appears inside `CREATE TABLE`
    pub fn ddl(&self) -> String {
        let mut ddl = format!("{} {}", self.name, self.kind.sql_type());

        if self.primary_key {
            ddl.push_str(" PRIMARY KEY AUTOINCREMENT");
        } else if !self.nullable {
            ddl.push_str(" NOT NULL");
        }

        if let Some((table, column)) = self.references {
            ddl.push_str(&format!(
                " REFERENCES {table}({column}) DEFERRABLE INITIALLY DEFERRED"
            ));
        }

        ddl
    }
}

/// A struct mapped onto one table
///
/// Field order in the struct does not matter for loading (rows are decoded by
/// column name). Writes bind parameters with [`Entity::bind_columns`] in
/// `COLUMNS` order without the primary key, then the primary key last, which
/// is the order both [`Entity::insert_sql`] and [`Entity::update_sql`] expect.
pub trait Entity: for<'r> sqlx::FromRow<'r, SqliteRow> + Clone + Send + Unpin {
    const TABLE: &'static str;
    /// Must name the one column declared with [`ColumnDef::primary_key`]
    const PRIMARY_KEY: &'static str;
    const COLUMNS: &'static [ColumnDef];

    /// Primary key value of this row
    fn id(&self) -> i64;

    /// Bind every non primary key column, in `COLUMNS` order
    fn bind_columns<'q>(&'q self, query: SqliteQuery<'q>) -> SqliteQuery<'q>;

    fn column(name: &str) -> Option<&'static ColumnDef> {
        Self::COLUMNS.iter().find(|column| column.name == name)
    }

    /// True when exactly one column is the primary key and it is `PRIMARY_KEY`
    fn mapping_is_consistent() -> bool {
        let mut keys = Self::COLUMNS.iter().filter(|column| column.primary_key);
        matches!(
            (keys.next(), keys.next()),
            (Some(key), None) if key.name == Self::PRIMARY_KEY
        )
    }

    /// Comma separated column names for SELECT
    fn column_list() -> String {
        Self::COLUMNS
            .iter()
            .map(|column| column.name)
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn create_table_sql() -> String {
        debug_assert!(
            Self::mapping_is_consistent(),
            "{} must declare exactly one primary key column named {}",
            Self::TABLE,
            Self::PRIMARY_KEY
        );

        let columns = Self::COLUMNS
            .iter()
            .map(|column| format!("    {}", column.ddl()))
            .collect::<Vec<_>>()
            .join(",\n");

        format!(
            "CREATE TABLE IF NOT EXISTS {} (\n{}\n)",
            Self::TABLE,
            columns
        )
    }

    /// One index per foreign key column, so inverse lookups stay cheap
    fn create_index_sql() -> Vec<String> {
        Self::COLUMNS
            .iter()
            .filter(|column| column.references.is_some())
            .map(|column| {
                format!(
                    "CREATE INDEX IF NOT EXISTS idx_{table}_{name} ON {table}({name})",
                    table = Self::TABLE,
                    name = column.name
                )
            })
            .collect()
    }

    /// INSERT with an explicit primary key, bound last
    fn insert_sql() -> String {
        let mut columns = value_columns::<Self>();
        columns.push(Self::PRIMARY_KEY);
        let placeholders = vec!["?"; columns.len()].join(", ");

        format!(
            "INSERT INTO {} ({}) VALUES ({})",
            Self::TABLE,
            columns.join(", "),
            placeholders
        )
    }

    /// UPDATE of every non primary key column, primary key bound last
    fn update_sql() -> String {
        let assignments = value_columns::<Self>()
            .iter()
            .map(|name| format!("{name} = ?"))
            .collect::<Vec<_>>()
            .join(", ");

        format!(
            "UPDATE {} SET {} WHERE {} = ?",
            Self::TABLE,
            assignments,
            Self::PRIMARY_KEY
        )
    }
}

/// Query type handed to [`Entity::bind_columns`]
pub type SqliteQuery<'q> = Query<'q, Sqlite, SqliteArguments<'q>>;

fn value_columns<E: Entity>() -> Vec<&'static str> {
    E::COLUMNS
        .iter()
        .filter(|column| !column.primary_key)
        .map(|column| column.name)
        .collect()
}

/// Reject a text value longer than `max` characters if its column is bounded
pub fn check_length<E: Entity>(column: &'static str, value: &str, max: usize) -> Result<()> {
    let bounded = E::column(column).is_some_and(|def| def.bounded);
    if !bounded {
        return Ok(());
    }

    let actual = value.chars().count();
    if actual > max {
        return Err(DatabaseError::Validation {
            column,
            max,
            actual,
        });
    }
    Ok(())
}

// ============ Generic persistence helpers ============

/// Load one row by primary key
pub async fn find_by_id<E: Entity>(conn: &mut SqliteConnection, id: i64) -> Result<Option<E>> {
    let sql = format!(
        "SELECT {} FROM {} WHERE {} = ?",
        E::column_list(),
        E::TABLE,
        E::PRIMARY_KEY
    );
    let row = sqlx::query_as::<_, E>(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(row)
}

/// Load every row, ordered by primary key
pub async fn find_all<E: Entity>(conn: &mut SqliteConnection) -> Result<Vec<E>> {
    let sql = format!(
        "SELECT {} FROM {} ORDER BY {}",
        E::column_list(),
        E::TABLE,
        E::PRIMARY_KEY
    );
    let rows = sqlx::query_as::<_, E>(&sql).fetch_all(&mut *conn).await?;
    Ok(rows)
}

/// Load every row whose integer `column` equals `value`
pub async fn find_by_column<E: Entity>(
    conn: &mut SqliteConnection,
    column: &'static str,
    value: i64,
) -> Result<Vec<E>> {
    debug_assert!(E::column(column).is_some(), "{column} is not mapped");

    let sql = format!(
        "SELECT {} FROM {} WHERE {} = ? ORDER BY {}",
        E::column_list(),
        E::TABLE,
        column,
        E::PRIMARY_KEY
    );
    let rows = sqlx::query_as::<_, E>(&sql)
        .bind(value)
        .fetch_all(&mut *conn)
        .await?;
    Ok(rows)
}

/// Insert `row` under its own primary key
pub async fn insert_row<E: Entity>(conn: &mut SqliteConnection, row: &E) -> Result<()> {
    let sql = E::insert_sql();
    row.bind_columns(sqlx::query(&sql))
        .bind(row.id())
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Overwrite every mapped column of `row`, returns whether the row existed
pub async fn update_row<E: Entity>(conn: &mut SqliteConnection, row: &E) -> Result<bool> {
    let sql = E::update_sql();
    let result = row
        .bind_columns(sqlx::query(&sql))
        .bind(row.id())
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Delete one row by primary key, returns whether a row was removed
pub async fn delete_by_id<E: Entity>(conn: &mut SqliteConnection, id: i64) -> Result<bool> {
    let sql = format!("DELETE FROM {} WHERE {} = ?", E::TABLE, E::PRIMARY_KEY);
    let result = sqlx::query(&sql).bind(id).execute(&mut *conn).await?;
    Ok(result.rows_affected() > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{Piano, PianoCategory};

    #[test]
    fn test_column_list_follows_mapping_order() {
        assert_eq!(Piano::column_list(), "id, name, piano_category_id");
        assert_eq!(PianoCategory::column_list(), "id, name");
    }

    #[test]
    fn test_create_table_sql() {
        let sql = Piano::create_table_sql();
        assert!(sql.starts_with("CREATE TABLE IF NOT EXISTS pianos ("));
        assert!(sql.contains("id INTEGER PRIMARY KEY AUTOINCREMENT"));
        assert!(sql.contains("name TEXT NOT NULL"));
        assert!(sql.contains(
            "piano_category_id INTEGER REFERENCES piano_categories(id) DEFERRABLE INITIALLY DEFERRED"
        ));
        assert!(!sql.contains("piano_category_id INTEGER NOT NULL"));
    }

    #[test]
    fn test_insert_sql_binds_primary_key_last() {
        assert_eq!(
            Piano::insert_sql(),
            "INSERT INTO pianos (name, piano_category_id, id) VALUES (?, ?, ?)"
        );
        assert_eq!(
            PianoCategory::insert_sql(),
            "INSERT INTO piano_categories (name, id) VALUES (?, ?)"
        );
    }

    #[test]
    fn test_update_sql_sets_every_value_column() {
        assert_eq!(
            Piano::update_sql(),
            "UPDATE pianos SET name = ?, piano_category_id = ? WHERE id = ?"
        );
        assert_eq!(
            PianoCategory::update_sql(),
            "UPDATE piano_categories SET name = ? WHERE id = ?"
        );
    }

    #[test]
    fn test_mappings_declare_their_primary_key() {
        assert!(Piano::mapping_is_consistent());
        assert!(PianoCategory::mapping_is_consistent());
    }

    #[test]
    fn test_mapping_without_primary_key_is_inconsistent() {
        #[derive(Clone, sqlx::FromRow)]
        struct Keyless {
            id: i64,
            name: String,
        }

        impl Entity for Keyless {
            const TABLE: &'static str = "keyless";
            const PRIMARY_KEY: &'static str = "id";
            const COLUMNS: &'static [ColumnDef] =
                &[ColumnDef::integer("id"), ColumnDef::text("name")];

            fn id(&self) -> i64 {
                self.id
            }

            fn bind_columns<'q>(&'q self, query: SqliteQuery<'q>) -> SqliteQuery<'q> {
                query.bind(&self.name)
            }
        }

        assert!(!Keyless::mapping_is_consistent());
    }

    #[test]
    fn test_index_per_foreign_key() {
        assert_eq!(
            Piano::create_index_sql(),
            vec![
                "CREATE INDEX IF NOT EXISTS idx_pianos_piano_category_id ON pianos(piano_category_id)"
                    .to_string()
            ]
        );
        assert!(PianoCategory::create_index_sql().is_empty());
    }

    #[test]
    fn test_check_length_counts_characters() {
        // 5 characters, 10 bytes
        let name = "ÄÖÜßé";
        assert!(check_length::<Piano>("name", name, 5).is_ok());

        let err = check_length::<Piano>("name", name, 4).unwrap_err();
        assert!(matches!(
            err,
            DatabaseError::Validation {
                column: "name",
                max: 4,
                actual: 5
            }
        ));
    }

    #[test]
    fn test_check_length_ignores_unbounded_columns() {
        assert!(check_length::<Piano>("piano_category_id", "too long", 1).is_ok());
        assert!(check_length::<Piano>("missing", "too long", 1).is_ok());
    }
}
