//! Application state shared by every request handler.
//!
//! Holds configuration only. Each request opens its own SQLite connection
//! through [`CoreState::open_db`], so the store's locking is the only
//! concurrency control between requests.

use std::path::{Path, PathBuf};

use chrono::{Duration, Local, NaiveDateTime};
use thiserror::Error;

use crate::accounts::TokenLifetimes;
use crate::config::ServerConfig;
use crate::db;

#[derive(Debug, Clone)]
pub struct CoreState {
    db_path: PathBuf,
    pub access_token_ttl: Duration,
    pub refresh_token_ttl: Duration,
}

impl CoreState {
    pub fn new(db_path: impl Into<PathBuf>, access_token_ttl: Duration, refresh_token_ttl: Duration) -> Self {
        Self {
            db_path: db_path.into(),
            access_token_ttl,
            refresh_token_ttl,
        }
    }

    pub fn from_config(config: &ServerConfig) -> Self {
        Self::new(
            config.database_path.clone(),
            config.access_token_ttl,
            config.refresh_token_ttl,
        )
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    pub fn token_lifetimes(&self) -> TokenLifetimes {
        TokenLifetimes {
            access: self.access_token_ttl,
            refresh: self.refresh_token_ttl,
        }
    }

    /// Create the database directory and apply pending migrations.
    pub fn prepare_storage(&self) -> Result<(), CoreError> {
        if let Some(parent) = self.db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        db::open_database(&self.db_path)?;
        Ok(())
    }

    /// Open a database connection for one request.
    pub fn open_db(&self) -> Result<rusqlite::Connection, CoreError> {
        db::open_database(&self.db_path).map_err(CoreError::Database)
    }

    /// Local wall-clock time, the reference for "today" and "upcoming".
    pub fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Database error: {0}")]
    Database(#[from] db::DatabaseError),
    #[error("Storage directory error: {0}")]
    Storage(#[from] std::io::Error),
}
