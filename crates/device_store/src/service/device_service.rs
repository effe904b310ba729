//! Device use-case service.
//!
//! # Responsibility
//! - Route source-tagged device payloads to the matching merge.
//! - Expose the read accessors callers use.
//!
//! # Invariants
//! - An unsupported source tag never reaches the repository.
//! - The caller's payload is never mutated; the id is only returned.

use crate::model::device::{Device, DeviceId, DeviceSummary, MergeSource};
use crate::repo::device_repo::{DeviceRepository, RepoError, RepoResult};
use crate::repo::filter::QueryParam;
use crate::repo::projection::DeviceColumn;
use log::{debug, warn};

/// Use-case service wrapper for device merges and reads.
pub struct DeviceService<R: DeviceRepository> {
    repo: R,
}

impl<R: DeviceRepository> DeviceService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Creates or merges the row for `device`'s serial number.
    ///
    /// # Contract
    /// - `"fetch"` writes provisioning facts only.
    /// - `"authenticate"` writes enrollment facts only.
    /// - Any other tag returns [`RepoError::UnsupportedCommand`] without a
    ///   write.
    /// - Returns the row's surrogate id, existing or new.
    pub fn create_or_merge(&self, source_tag: &str, device: &Device) -> RepoResult<DeviceId> {
        let source = match source_tag.parse::<MergeSource>() {
            Ok(source) => source,
            Err(tag) => {
                warn!(
                    "event=device_merge module=service status=error error_code=unsupported_command source={}",
                    tag
                );
                return Err(RepoError::UnsupportedCommand(tag));
            }
        };

        let id = match source {
            MergeSource::Fetch => self.repo.merge_provisioning(&device.provisioning_facts())?,
            MergeSource::Authenticate => self.repo.merge_enrollment(&device.enrollment_facts())?,
        };
        debug!(
            "event=device_merge module=service status=ok source={} device_uuid={}",
            source, id
        );
        Ok(id)
    }

    pub fn get_device(&self, id: DeviceId) -> RepoResult<Option<Device>> {
        self.repo.get_device(id)
    }

    /// Looks up a device by `udid`, populating only `projection`.
    pub fn get_device_by_udid(&self, udid: &str, projection: &[DeviceColumn]) -> RepoResult<Device> {
        self.repo.get_device_by_udid(udid, projection)
    }

    /// Lists device summaries matching every filter in `params`.
    pub fn list_devices(&self, params: &[&dyn QueryParam]) -> RepoResult<Vec<DeviceSummary>> {
        self.repo.list_devices(params)
    }
}
