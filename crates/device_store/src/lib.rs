//! Persistence layer for the device inventory.
//! Merges provisioning-feed and enrollment facts into one row per device.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use config::{ConfigError, StoreConfig};
pub use db::{open_store, open_store_in_memory, open_store_with, DbError, DbResult, DevicePool};
pub use logging::{default_log_level, init_logging, logging_status, LogFacade, ProgressLog};
pub use model::device::{
    Device, DeviceId, DeviceSummary, EnrollmentFacts, FactValidationError, MergeSource,
    ProvisioningFacts,
};
pub use repo::device_repo::{DeviceRepository, RepoError, RepoResult, SqliteDeviceRepository};
pub use repo::filter::{DeviceFilter, QueryParam};
pub use repo::projection::DeviceColumn;
pub use service::device_service::DeviceService;

/// Returns the store crate version.
pub fn store_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
