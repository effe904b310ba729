//! Connection bootstrap for the device store.
//!
//! # Responsibility
//! - Build the `r2d2` pool over SQLite without touching the store.
//! - Probe reachability under the configured [`RetryPolicy`].
//! - Ensure the schema before handing the pool to callers.
//!
//! # Invariants
//! - Pooled connections have WAL journaling, a busy timeout and
//!   `foreign_keys=ON`.
//! - A returned pool always has migrations fully applied.

use super::migrations::apply_migrations;
use super::retry::{RetryPolicy, Sleeper, ThreadSleeper};
use super::{DbError, DbResult, Driver};
use crate::config::StoreConfig;
use crate::logging::ProgressLog;
use log::{error, info};
use r2d2::{ManageConnection, Pool};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;
use std::time::{Duration, Instant};

const MEMORY_CONNECTION_STRING: &str = ":memory:";

/// Alias for the underlying pool type.
pub type ConnectionPool = Pool<SqliteConnectionManager>;

/// Alias for a pooled connection.
pub type PooledConnection = r2d2::PooledConnection<SqliteConnectionManager>;

/// Shared, cloneable handle over the device store pool.
///
/// Every clone refers to the same pool; it is safe to hand one to each
/// concurrent caller.
#[derive(Clone)]
pub struct DevicePool {
    pool: ConnectionPool,
}

impl DevicePool {
    /// Checks out one connection, waiting at most the configured
    /// connection timeout.
    pub fn get(&self) -> DbResult<PooledConnection> {
        Ok(self.pool.get()?)
    }

    pub fn max_size(&self) -> u32 {
        self.pool.max_size()
    }
}

/// Reachability check run before the pool is used.
pub trait StoreProbe {
    fn probe(&self) -> DbResult<()>;
}

/// Opens a throwaway connection and runs `SELECT 1`.
pub struct SqliteProbe {
    manager: SqliteConnectionManager,
}

impl SqliteProbe {
    pub fn new(connection_string: &str) -> Self {
        Self {
            manager: manager_for(connection_string),
        }
    }
}

impl StoreProbe for SqliteProbe {
    fn probe(&self) -> DbResult<()> {
        let conn = self.manager.connect()?;
        conn.query_row("SELECT 1;", [], |row| row.get::<_, i64>(0))?;
        Ok(())
    }
}

#[derive(Debug)]
struct PragmaCustomizer {
    busy_timeout_ms: u32,
}

impl r2d2::CustomizeConnection<Connection, rusqlite::Error> for PragmaCustomizer {
    fn on_acquire(&self, conn: &mut Connection) -> Result<(), rusqlite::Error> {
        conn.execute_batch(&format!(
            "PRAGMA busy_timeout = {};\
             PRAGMA journal_mode = WAL;\
             PRAGMA foreign_keys = ON;",
            self.busy_timeout_ms
        ))
    }
}

/// Opens the device store with default pool and retry settings.
///
/// Sleeps between probe attempts on the calling thread.
pub fn open_store(
    driver: &str,
    connection_string: &str,
    logger: &dyn ProgressLog,
) -> DbResult<DevicePool> {
    let config = StoreConfig {
        driver: driver.to_string(),
        connection_string: connection_string.to_string(),
        ..StoreConfig::default()
    };
    open_store_with(&config, logger, &ThreadSleeper)
}

/// Opens the device store described by `config`.
///
/// # Errors
/// - [`DbError::UnknownDriver`] immediately for an unsupported driver.
/// - [`DbError::ConnectivityExhausted`] when every probe failed.
/// - [`DbError::SchemaMigration`] / [`DbError::UnsupportedSchemaVersion`]
///   when the schema cannot be ensured.
///
/// # Side effects
/// - Emits `store_open` logging events with duration and status.
pub fn open_store_with(
    config: &StoreConfig,
    logger: &dyn ProgressLog,
    sleeper: &dyn Sleeper,
) -> DbResult<DevicePool> {
    let started_at = Instant::now();
    let driver = match Driver::parse(&config.driver) {
        Ok(driver) => driver,
        Err(err) => {
            error!(
                "event=store_open module=db status=error error_code=unknown_driver error={}",
                err
            );
            return Err(err);
        }
    };
    info!(
        "event=store_open module=db status=start driver={} max_attempts={}",
        driver.as_str(),
        config.retry.attempts()
    );

    let pool = build_pool(config);
    let probe = SqliteProbe::new(&config.connection_string);

    if let Err(err) = wait_until_reachable(&probe, &config.retry, logger, sleeper) {
        error!(
            "event=store_open module=db status=error duration_ms={} error_code=store_unreachable error={}",
            started_at.elapsed().as_millis(),
            err
        );
        return Err(err);
    }

    if let Err(err) = ensure_schema(&pool) {
        error!(
            "event=store_open module=db status=error duration_ms={} error_code=schema_ensure_failed error={}",
            started_at.elapsed().as_millis(),
            err
        );
        return Err(err);
    }

    info!(
        "event=store_open module=db status=ok driver={} duration_ms={}",
        driver.as_str(),
        started_at.elapsed().as_millis()
    );
    Ok(pool)
}

/// Opens a private in-memory store backed by a single pooled connection.
pub fn open_store_in_memory() -> DbResult<DevicePool> {
    let started_at = Instant::now();
    let config = StoreConfig {
        connection_string: MEMORY_CONNECTION_STRING.to_string(),
        ..StoreConfig::default()
    };
    let pool = build_pool(&config);

    ensure_schema(&pool)?;
    info!(
        "event=store_open module=db status=ok mode=memory duration_ms={}",
        started_at.elapsed().as_millis()
    );
    Ok(pool)
}

/// Probes `probe` until it answers or `policy` runs out of attempts.
///
/// Every failed attempt is reported to `logger`.
pub fn wait_until_reachable(
    probe: &dyn StoreProbe,
    policy: &RetryPolicy,
    logger: &dyn ProgressLog,
    sleeper: &dyn Sleeper,
) -> DbResult<()> {
    let max_attempts = policy.attempts();
    policy
        .run(
            sleeper,
            |_| probe.probe(),
            |attempt, err| {
                logger.log(&format!(
                    "could not connect to device store (attempt {attempt}/{max_attempts}): {err}"
                ));
            },
        )
        .map_err(|exhausted| DbError::ConnectivityExhausted {
            attempts: exhausted.attempts,
            source: Box::new(exhausted.last_error),
        })
}

fn build_pool(config: &StoreConfig) -> DevicePool {
    // Lazy: no connection is opened until the first checkout.
    let builder = ConnectionPool::builder()
        .min_idle(Some(0))
        .connection_timeout(Duration::from_millis(config.connection_timeout_ms.max(1)))
        .connection_customizer(Box::new(PragmaCustomizer {
            busy_timeout_ms: config.busy_timeout_ms,
        }));

    // Each in-memory connection is its own database: keep exactly one alive.
    let builder = if is_memory(&config.connection_string) {
        builder.max_size(1).idle_timeout(None).max_lifetime(None)
    } else {
        builder.max_size(config.pool_size.max(1))
    };

    DevicePool {
        pool: builder.build_unchecked(manager_for(&config.connection_string)),
    }
}

fn ensure_schema(pool: &DevicePool) -> DbResult<()> {
    let mut conn = pool.get().map_err(DbError::schema_migration)?;
    apply_migrations(&mut conn)
}

fn manager_for(connection_string: &str) -> SqliteConnectionManager {
    if is_memory(connection_string) {
        SqliteConnectionManager::memory()
    } else {
        SqliteConnectionManager::file(connection_string.trim())
    }
}

fn is_memory(connection_string: &str) -> bool {
    connection_string.trim() == MEMORY_CONNECTION_STRING
}
