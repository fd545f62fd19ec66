//! Shared application state.
//!
//! `CoreState` is built once at startup and wrapped in `Arc` so every request
//! task and background job sees the same configuration, database handle and
//! token service. The SQLite connection sits behind a `Mutex`; callers take
//! the guard, run synchronous repository calls and drop it before any
//! `.await`.

use std::sync::{Mutex, MutexGuard};

use rusqlite::Connection;
use thiserror::Error;

use crate::config::{AppConfig, ConfigError};
use crate::crypto::CryptoError;
use crate::db::{self, DatabaseError};
use crate::token::TokenService;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Internal lock poisoned")]
    LockPoisoned,

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("Background task failed: {0}")]
    Task(String),
}

impl From<rusqlite::Error> for CoreError {
    fn from(err: rusqlite::Error) -> Self {
        CoreError::Database(DatabaseError::from(err))
    }
}

pub struct CoreState {
    config: AppConfig,
    db: Mutex<Connection>,
    tokens: TokenService,
}

impl CoreState {
    /// Open (and migrate) the configured database file.
    pub fn open(config: AppConfig) -> Result<Self, CoreError> {
        let path = config.database_path()?;
        let conn = db::open_database(&path)?;
        tracing::info!(path = %path.display(), "Database opened");
        Ok(Self::with_connection(config, conn))
    }

    /// Fresh in-memory database.
    pub fn in_memory(config: AppConfig) -> Result<Self, CoreError> {
        let conn = db::open_memory_database()?;
        Ok(Self::with_connection(config, conn))
    }

    pub fn with_connection(config: AppConfig, conn: Connection) -> Self {
        let tokens = TokenService::new(&config.jwt_secret, config.token_ttl);
        Self {
            config,
            db: Mutex::new(conn),
            tokens,
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn tokens(&self) -> &TokenService {
        &self.tokens
    }

    /// Lock the database connection. Never hold the guard across `.await`.
    pub fn db(&self) -> Result<MutexGuard<'_, Connection>, CoreError> {
        self.db.lock().map_err(|_| CoreError::LockPoisoned)
    }
}

impl std::fmt::Debug for CoreState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreState")
            .field("environment", &self.config.environment)
            .field("bind_addr", &self.config.bind_addr)
            .finish_non_exhaustive()
    }
}
