//! Device repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Merge provisioning and enrollment facts into one row per serial number.
//! - Provide projected and filtered reads over `devices`.
//!
//! # Invariants
//! - Each merge is a single `INSERT ... ON CONFLICT ... RETURNING` statement;
//!   concurrent merges for one serial number never lose a fact set.
//! - A merge writes only its own fact-set columns.
//! - Write errors are returned unwrapped; read errors carry the operation name.

use crate::db::{DbError, DevicePool};
use crate::model::device::{
    Device, DeviceId, DeviceSummary, EnrollmentFacts, FactValidationError, ProvisioningFacts,
};
use crate::repo::filter::{compose_where, QueryParam};
use crate::repo::projection::{parse_device_id, read_projected, select_list, DeviceColumn};
use rusqlite::{params, params_from_iter, Row};
use thiserror::Error;
use uuid::Uuid;

const MERGE_PROVISIONING_SQL: &str = "INSERT INTO devices (
    device_uuid,
    serial_number,
    model,
    description,
    color,
    asset_tag,
    dep_profile_status,
    dep_profile_uuid,
    dep_profile_assign_time,
    dep_profile_push_time,
    dep_profile_assigned_date,
    dep_profile_assigned_by,
    dep_device
) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
ON CONFLICT (serial_number) DO UPDATE SET
    model = excluded.model,
    description = excluded.description,
    color = excluded.color,
    asset_tag = excluded.asset_tag,
    dep_profile_status = excluded.dep_profile_status,
    dep_profile_uuid = excluded.dep_profile_uuid,
    dep_profile_assign_time = excluded.dep_profile_assign_time,
    dep_profile_push_time = excluded.dep_profile_push_time,
    dep_profile_assigned_date = excluded.dep_profile_assigned_date,
    dep_profile_assigned_by = excluded.dep_profile_assigned_by,
    dep_device = excluded.dep_device
RETURNING device_uuid;";

const MERGE_ENROLLMENT_SQL: &str = "INSERT INTO devices (
    device_uuid,
    udid,
    apple_mdm_topic,
    os_version,
    build_version,
    product_name,
    serial_number,
    imei,
    meid
) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
ON CONFLICT (serial_number) DO UPDATE SET
    udid = excluded.udid,
    apple_mdm_topic = excluded.apple_mdm_topic,
    os_version = excluded.os_version,
    build_version = excluded.build_version,
    product_name = excluded.product_name,
    serial_number = excluded.serial_number,
    imei = excluded.imei,
    meid = excluded.meid
RETURNING device_uuid;";

const DEVICE_SUMMARY_SQL: &str = "SELECT
    device_uuid,
    udid,
    serial_number,
    dep_profile_status,
    model,
    workflow_uuid
FROM devices";

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for device merge and query operations.
#[derive(Debug, Error)]
pub enum RepoError {
    #[error("{0}")]
    Validation(#[from] FactValidationError),

    /// Underlying store error from a merge, returned as-is.
    #[error("{0}")]
    Db(#[from] DbError),

    #[error("{operation} failed: {source}")]
    Query {
        operation: &'static str,
        #[source]
        source: DbError,
    },

    #[error("device not found: {0}")]
    NotFound(String),

    #[error("invalid device query: {0}")]
    InvalidQuery(String),

    #[error("invalid persisted device data: {0}")]
    InvalidData(String),

    /// Merge source tag other than `fetch` or `authenticate`.
    #[error("datastore command not supported `{0}`")]
    UnsupportedCommand(String),
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Repository interface for device merges and reads.
pub trait DeviceRepository {
    /// Upserts provisioning facts keyed by serial number.
    fn merge_provisioning(&self, facts: &ProvisioningFacts) -> RepoResult<DeviceId>;
    /// Upserts enrollment facts keyed by the re-asserted serial number.
    fn merge_enrollment(&self, facts: &EnrollmentFacts) -> RepoResult<DeviceId>;
    fn get_device(&self, id: DeviceId) -> RepoResult<Option<Device>>;
    /// Returns the oldest row for `udid` with only `projection` populated.
    ///
    /// An empty projection selects every column.
    fn get_device_by_udid(&self, udid: &str, projection: &[DeviceColumn]) -> RepoResult<Device>;
    fn list_devices(&self, params: &[&dyn QueryParam]) -> RepoResult<Vec<DeviceSummary>>;
}

/// SQLite-backed device repository sharing the store pool.
#[derive(Clone)]
pub struct SqliteDeviceRepository {
    pool: DevicePool,
}

impl SqliteDeviceRepository {
    pub fn new(pool: DevicePool) -> Self {
        Self { pool }
    }
}

impl DeviceRepository for SqliteDeviceRepository {
    fn merge_provisioning(&self, facts: &ProvisioningFacts) -> RepoResult<DeviceId> {
        facts.validate()?;

        let conn = self.pool.get()?;
        let id_text: String = conn.query_row(
            MERGE_PROVISIONING_SQL,
            params![
                Uuid::new_v4().to_string(),
                facts.serial_number.as_str(),
                facts.model.as_deref(),
                facts.description.as_deref(),
                facts.color.as_deref(),
                facts.asset_tag.as_deref(),
                facts.profile_status.as_deref(),
                facts.profile_uuid.as_deref(),
                facts.profile_assign_time,
                facts.profile_push_time,
                facts.profile_assigned_date,
                facts.profile_assigned_by.as_deref(),
                true,
            ],
            |row| row.get(0),
        )?;

        parse_device_id(&id_text)
    }

    fn merge_enrollment(&self, facts: &EnrollmentFacts) -> RepoResult<DeviceId> {
        facts.validate()?;

        let conn = self.pool.get()?;
        let id_text: String = conn.query_row(
            MERGE_ENROLLMENT_SQL,
            params![
                Uuid::new_v4().to_string(),
                facts.udid.as_str(),
                facts.mdm_topic.as_deref(),
                facts.os_version.as_deref(),
                facts.build_version.as_deref(),
                facts.product_name.as_deref(),
                facts.serial_number.as_str(),
                facts.imei.as_deref(),
                facts.meid.as_deref(),
            ],
            |row| row.get(0),
        )?;

        parse_device_id(&id_text)
    }

    fn get_device(&self, id: DeviceId) -> RepoResult<Option<Device>> {
        const OPERATION: &str = "get_device";
        let columns = DeviceColumn::ALL;
        let conn = self.pool.get().map_err(read_failed(OPERATION))?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM devices WHERE device_uuid = ?1;",
                select_list(columns)
            ))
            .map_err(sqlite_read_failed(OPERATION))?;

        let mut rows = stmt
            .query([id.to_string()])
            .map_err(sqlite_read_failed(OPERATION))?;
        match rows.next().map_err(sqlite_read_failed(OPERATION))? {
            Some(row) => Ok(Some(read_projected(row, columns)?)),
            None => Ok(None),
        }
    }

    fn get_device_by_udid(&self, udid: &str, projection: &[DeviceColumn]) -> RepoResult<Device> {
        const OPERATION: &str = "get_device_by_udid";
        if udid.trim().is_empty() {
            return Err(RepoError::InvalidQuery("udid must not be empty".to_string()));
        }

        let columns = if projection.is_empty() {
            DeviceColumn::ALL
        } else {
            projection
        };
        let conn = self.pool.get().map_err(read_failed(OPERATION))?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM devices WHERE udid = ?1 ORDER BY rowid ASC LIMIT 1;",
                select_list(columns)
            ))
            .map_err(sqlite_read_failed(OPERATION))?;

        let mut rows = stmt.query([udid]).map_err(sqlite_read_failed(OPERATION))?;
        match rows.next().map_err(sqlite_read_failed(OPERATION))? {
            Some(row) => read_projected(row, columns),
            None => Err(RepoError::NotFound(format!("udid `{udid}`"))),
        }
    }

    fn list_devices(&self, params: &[&dyn QueryParam]) -> RepoResult<Vec<DeviceSummary>> {
        const OPERATION: &str = "list_devices";
        let clause = compose_where(params);
        let sql = format!("{} ORDER BY rowid ASC;", clause.append_to(DEVICE_SUMMARY_SQL));

        let conn = self.pool.get().map_err(read_failed(OPERATION))?;
        let mut stmt = conn.prepare(&sql).map_err(sqlite_read_failed(OPERATION))?;
        let mut rows = stmt
            .query(params_from_iter(clause.into_values()))
            .map_err(sqlite_read_failed(OPERATION))?;

        let mut devices = Vec::new();
        while let Some(row) = rows.next().map_err(sqlite_read_failed(OPERATION))? {
            devices.push(parse_summary_row(row)?);
        }

        Ok(devices)
    }
}

fn parse_summary_row(row: &Row<'_>) -> RepoResult<DeviceSummary> {
    let id_text: String = row.get("device_uuid")?;
    Ok(DeviceSummary {
        uuid: parse_device_id(&id_text)?,
        udid: row.get("udid")?,
        serial_number: row.get("serial_number")?,
        dep_profile_status: row.get("dep_profile_status")?,
        model: row.get("model")?,
        workflow_uuid: row.get("workflow_uuid")?,
    })
}

fn read_failed(operation: &'static str) -> impl Fn(DbError) -> RepoError {
    move |source| RepoError::Query { operation, source }
}

fn sqlite_read_failed(operation: &'static str) -> impl Fn(rusqlite::Error) -> RepoError {
    move |err| RepoError::Query {
        operation,
        source: DbError::Sqlite(err),
    }
}
