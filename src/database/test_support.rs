//! Throwaway on-disk databases for tests

use std::path::Path;

use tempfile::TempDir;

use super::{ConnectionHandle, DatabaseConfig, SessionFactory, configure};

/// Config for a fresh database file inside `dir`
pub fn config_in(dir: &Path, max_name_length: usize) -> DatabaseConfig {
    let url = format!("sqlite:{}?mode=rwc", dir.join("pianos.db").display());
    DatabaseConfig::new(url, max_name_length)
}

/// Configured database that lives as long as this value
pub struct TestDb {
    pub handle: ConnectionHandle,
    pub factory: SessionFactory,
    _dir: TempDir,
}

impl TestDb {
    pub async fn open(max_name_length: usize) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let handle = configure(&config_in(dir.path(), max_name_length))
            .await
            .unwrap();
        let factory = SessionFactory::new(handle.clone());

        Self {
            handle,
            factory,
            _dir: dir,
        }
    }
}
