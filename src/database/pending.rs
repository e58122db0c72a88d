//! Per-entity change set held by a session until commit

use std::collections::BTreeMap;

use sqlx::SqliteConnection;

use super::error::Result;
use super::mapping::{self, Entity};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Change<E> {
    Insert(E),
    Update(E),
    Delete,
}

/// Latest pending state of every row a session touched, keyed by primary key
#[derive(Debug, Clone)]
pub struct Pending<E> {
    changes: BTreeMap<i64, Change<E>>,
}

impl<E> Default for Pending<E> {
    fn default() -> Self {
        Self {
            changes: BTreeMap::new(),
        }
    }
}

impl<E: Entity> Pending<E> {
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    /// `None` if the row is untouched, `Some(None)` if it is pending deletion
    pub fn get(&self, id: i64) -> Option<Option<&E>> {
        self.changes.get(&id).map(|change| match change {
            Change::Insert(row) | Change::Update(row) => Some(row),
            Change::Delete => None,
        })
    }

    pub fn insert(&mut self, row: E) {
        self.changes.insert(row.id(), Change::Insert(row));
    }

    /// Record new state for a row known to exist
    pub fn update(&mut self, row: E) {
        let id = row.id();
        let change = match self.changes.get(&id) {
            Some(Change::Insert(_)) => Change::Insert(row),
            _ => Change::Update(row),
        };
        self.changes.insert(id, change);
    }

    /// Record removal of a row known to exist
    pub fn delete(&mut self, id: i64) {
        // A row inserted in this session never reaches the store
        if let Some(Change::Insert(_)) = self.changes.remove(&id) {
            return;
        }
        self.changes.insert(id, Change::Delete);
    }

    /// Apply pending changes on top of rows read from the store
    ///
    /// `keep` is the query's filter, re-checked against pending row state.
    /// Output is ordered by primary key like the store queries.
    pub fn overlay(&self, stored: Vec<E>, keep: impl Fn(&E) -> bool) -> Vec<E> {
        let mut rows: BTreeMap<i64, E> = stored.into_iter().map(|row| (row.id(), row)).collect();

        for (id, change) in &self.changes {
            match change {
                Change::Insert(row) | Change::Update(row) if keep(row) => {
                    rows.insert(*id, row.clone());
                }
                _ => {
                    rows.remove(id);
                }
            }
        }

        rows.into_values().collect()
    }

    /// Write every pending change through `conn`
    pub async fn flush(&self, conn: &mut SqliteConnection) -> Result<()> {
        for (id, change) in &self.changes {
            match change {
                Change::Insert(row) => mapping::insert_row(&mut *conn, row).await?,
                Change::Update(row) => {
                    mapping::update_row(&mut *conn, row).await?;
                }
                Change::Delete => {
                    mapping::delete_by_id::<E>(&mut *conn, *id).await?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::Piano;

    fn piano(id: i64, name: &str, category: Option<i64>) -> Piano {
        Piano {
            id,
            name: name.to_string(),
            piano_category_id: category,
        }
    }

    #[test]
    fn test_get_reports_pending_state() {
        let mut pending: Pending<Piano> = Pending::default();
        assert_eq!(pending.get(1), None);

        pending.update(piano(1, "Renamed", None));
        assert_eq!(pending.get(1), Some(Some(&piano(1, "Renamed", None))));

        pending.delete(1);
        assert_eq!(pending.get(1), Some(None));
    }

    #[test]
    fn test_deleting_pending_insert_forgets_it() {
        let mut pending: Pending<Piano> = Pending::default();
        pending.insert(piano(7, "Temporary", None));
        pending.delete(7);

        assert!(pending.is_empty());
        assert_eq!(pending.get(7), None);
    }

    #[test]
    fn test_update_of_pending_insert_stays_insert() {
        let mut pending: Pending<Piano> = Pending::default();
        pending.insert(piano(2, "First", None));
        pending.update(piano(2, "Second", None));

        assert_eq!(pending.len(), 1);
        assert_eq!(
            pending.changes.get(&2),
            Some(&Change::Insert(piano(2, "Second", None)))
        );
    }

    #[test]
    fn test_overlay_merges_by_id() {
        let stored = vec![
            piano(1, "Kept", Some(1)),
            piano(2, "Deleted", Some(1)),
            piano(3, "Moved away", Some(1)),
            piano(4, "Renamed", Some(1)),
        ];

        let mut pending: Pending<Piano> = Pending::default();
        pending.delete(2);
        pending.update(piano(3, "Moved away", Some(2)));
        pending.update(piano(4, "Renamed twice", Some(1)));
        pending.insert(piano(5, "New", Some(1)));
        pending.insert(piano(6, "Elsewhere", Some(2)));

        let in_first = pending.overlay(stored, |row| row.piano_category_id == Some(1));
        assert_eq!(
            in_first,
            vec![
                piano(1, "Kept", Some(1)),
                piano(4, "Renamed twice", Some(1)),
                piano(5, "New", Some(1)),
            ]
        );
    }
}
