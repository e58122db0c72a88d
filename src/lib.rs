//! Pianos - persistence for a piano catalog
//!
//! Maps `Piano` and `PianoCategory` records onto SQLite tables and hands out
//! sessions (units of work flushed at commit) from a shared connection pool.
//!
//! ```rust,ignore
//! use pianos::database::{DatabaseConfig, NewPiano, SessionFactory, configure};
//!
//! let handle = configure(&DatabaseConfig::new("sqlite:pianos.db?mode=rwc", 100)).await?;
//! let factory = SessionFactory::new(handle.clone());
//!
//! let mut session = factory.new_session().await?;
//! let piano = session.add_piano(NewPiano::new("Steinway D", None)).await?;
//! session.commit().await?;
//!
//! handle.close().await;
//! ```

pub mod database;
pub mod settings;
