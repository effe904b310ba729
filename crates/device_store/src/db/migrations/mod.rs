//! Ensures the `devices` table and its lookup indexes.
//!
//! # Responsibility
//! - List the device schema steps: the table with its unique serial index,
//!   then the non-unique udid index.
//! - Bring an older or empty store up to the newest step in one transaction.
//!
//! # Invariants
//! - Step numbers only grow; a store stamped with a higher number than
//!   [`latest_version`] is refused.
//! - The last applied step is stamped into `PRAGMA user_version`.
//! - Every statement is `IF NOT EXISTS`, so replaying a migration against an
//!   already-migrated database is a no-op.

use crate::db::{DbError, DbResult};
use rusqlite::Connection;

/// One step of the device schema.
#[derive(Debug, Clone, Copy)]
struct Migration {
    /// Value stamped into `user_version` once `sql` has run.
    version: u32,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        sql: include_str!("0001_devices.sql"),
    },
    Migration {
        version: 2,
        sql: include_str!("0002_udid_index.sql"),
    },
];

/// Schema step a freshly opened store ends up at.
pub fn latest_version() -> u32 {
    MIGRATIONS.last().map_or(0, |migration| migration.version)
}

/// Creates whatever part of the device schema `conn` is still missing.
///
/// # Errors
/// - [`DbError::UnsupportedSchemaVersion`] when the store was stamped by a
///   newer build.
/// - [`DbError::SchemaMigration`] when a DDL statement or the stamp fails;
///   the store is left at its previous step.
pub fn apply_migrations(conn: &mut Connection) -> DbResult<()> {
    let current_version = current_user_version(conn)?;
    let latest = latest_version();

    if current_version > latest {
        return Err(DbError::UnsupportedSchemaVersion {
            db_version: current_version,
            latest_supported: latest,
        });
    }

    if current_version == latest {
        return Ok(());
    }

    let tx = conn.transaction().map_err(DbError::schema_migration)?;
    for step in MIGRATIONS.iter().filter(|step| step.version > current_version) {
        tx.execute_batch(step.sql)
            .map_err(DbError::schema_migration)?;
        tx.execute_batch(&format!("PRAGMA user_version = {};", step.version))
            .map_err(DbError::schema_migration)?;
    }
    tx.commit().map_err(DbError::schema_migration)?;

    Ok(())
}

/// Reads the device schema step stamped in `PRAGMA user_version`.
pub fn current_user_version(conn: &Connection) -> DbResult<u32> {
    conn.query_row("PRAGMA user_version;", [], |row| row.get::<_, u32>(0))
        .map_err(DbError::schema_migration)
}
