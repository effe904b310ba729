//! Backing-store bootstrap and schema migration entry points.
//!
//! # Responsibility
//! - Open the pooled SQLite connection used by every repository call.
//! - Wait for the store to become reachable under a bounded retry policy.
//! - Ensure the device schema exists before any data access.
//!
//! # Invariants
//! - Only the `sqlite` driver is supported; anything else fails fast.
//! - Core code must not read/write device data before schema ensure succeeds.

pub mod migrations;
mod open;
pub mod retry;

pub use open::{
    open_store, open_store_in_memory, open_store_with, wait_until_reachable, ConnectionPool,
    DevicePool, PooledConnection, SqliteProbe, StoreProbe,
};
pub use retry::{RetryExhausted, RetryPolicy, Sleeper, ThreadSleeper};

use thiserror::Error;

pub type DbResult<T> = Result<T, DbError>;

/// Errors raised while opening, probing or migrating the backing store.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("{0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    /// Configuration error; never retried.
    #[error("unknown driver `{0}`; expected `sqlite`")]
    UnknownDriver(String),

    /// The store never became reachable within the retry budget.
    #[error("device store unreachable after {attempts} attempts: {source}")]
    ConnectivityExhausted {
        attempts: u32,
        #[source]
        source: Box<DbError>,
    },

    /// Structural or permission problem while ensuring the schema,
    /// including a failed checkout of the migrating connection.
    #[error("schema migration failed: {0}")]
    SchemaMigration(#[source] Box<DbError>),

    #[error(
        "database schema version {db_version} is newer than supported {latest_supported}"
    )]
    UnsupportedSchemaVersion {
        db_version: u32,
        latest_supported: u32,
    },
}

impl DbError {
    pub(crate) fn schema_migration<E: Into<DbError>>(err: E) -> Self {
        Self::SchemaMigration(Box::new(err.into()))
    }
}

/// Backing-store kinds this crate can open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Driver {
    Sqlite,
}

impl Driver {
    /// Parses a driver identifier, case-insensitively.
    pub fn parse(value: &str) -> DbResult<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "sqlite" | "sqlite3" => Ok(Self::Sqlite),
            _ => Err(DbError::UnknownDriver(value.to_string())),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sqlite => "sqlite",
        }
    }
}
