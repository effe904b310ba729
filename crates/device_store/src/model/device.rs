//! Device domain model.
//!
//! # Responsibility
//! - Define the canonical device row and the two fact sets merged into it.
//! - Validate fact sets before they reach the store.
//!
//! # Invariants
//! - `uuid` is assigned once by the store and never changes.
//! - Provisioning facts and enrollment facts share only `serial_number`.
//! - Both fact sets require a non-blank serial number.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

/// Surrogate identifier of a device row.
pub type DeviceId = Uuid;

/// Fact-set validation failure raised before any write.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FactValidationError {
    #[error("serial number is required to merge {0} facts")]
    MissingSerialNumber(MergeSource),
}

/// Origin of a fact set, parsed from the caller's source tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeSource {
    /// Provisioning feed (`"fetch"`).
    Fetch,
    /// Enrollment handshake (`"authenticate"`).
    Authenticate,
}

impl MergeSource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Fetch => "fetch",
            Self::Authenticate => "authenticate",
        }
    }
}

impl Display for MergeSource {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MergeSource {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "fetch" => Ok(Self::Fetch),
            "authenticate" => Ok(Self::Authenticate),
            other => Err(other.to_string()),
        }
    }
}

/// Canonical device row.
///
/// Rows read through a projection only populate the projected fields; the
/// rest keep their `Default` values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    /// `None` until the row has been stored.
    pub uuid: Option<DeviceId>,
    /// Empty until the device enrolls.
    pub udid: String,
    pub serial_number: Option<String>,
    pub os_version: Option<String>,
    pub model: Option<String>,
    pub color: Option<String>,
    pub asset_tag: Option<String>,
    pub dep_profile_status: Option<String>,
    pub dep_profile_uuid: Option<String>,
    /// Unix epoch milliseconds.
    pub dep_profile_assign_time: Option<i64>,
    /// Unix epoch milliseconds.
    pub dep_profile_push_time: Option<i64>,
    /// Unix epoch milliseconds.
    pub dep_profile_assigned_date: Option<i64>,
    pub dep_profile_assigned_by: Option<String>,
    pub description: Option<String>,
    pub build_version: Option<String>,
    pub product_name: Option<String>,
    pub imei: Option<String>,
    pub meid: Option<String>,
    pub apple_mdm_token: Option<String>,
    pub apple_mdm_topic: Option<String>,
    pub apple_push_magic: Option<String>,
    pub mdm_enrolled: Option<bool>,
    /// Owned by the workflow collaborator; empty by default.
    pub workflow_uuid: String,
    /// Set once the provisioning feed has reported this device.
    pub dep_device: Option<bool>,
    pub awaiting_configuration: Option<bool>,
}

impl Device {
    /// Creates an unsaved device carrying only a serial number.
    pub fn with_serial(serial_number: impl Into<String>) -> Self {
        Self {
            serial_number: Some(serial_number.into()),
            ..Self::default()
        }
    }

    /// Extracts the provisioning-feed fact set.
    pub fn provisioning_facts(&self) -> ProvisioningFacts {
        ProvisioningFacts {
            serial_number: self.serial_number.clone().unwrap_or_default(),
            model: self.model.clone(),
            description: self.description.clone(),
            color: self.color.clone(),
            asset_tag: self.asset_tag.clone(),
            profile_status: self.dep_profile_status.clone(),
            profile_uuid: self.dep_profile_uuid.clone(),
            profile_assign_time: self.dep_profile_assign_time,
            profile_push_time: self.dep_profile_push_time,
            profile_assigned_date: self.dep_profile_assigned_date,
            profile_assigned_by: self.dep_profile_assigned_by.clone(),
        }
    }

    /// Extracts the enrollment-handshake fact set.
    pub fn enrollment_facts(&self) -> EnrollmentFacts {
        EnrollmentFacts {
            udid: self.udid.clone(),
            mdm_topic: self.apple_mdm_topic.clone(),
            os_version: self.os_version.clone(),
            build_version: self.build_version.clone(),
            product_name: self.product_name.clone(),
            serial_number: self.serial_number.clone().unwrap_or_default(),
            imei: self.imei.clone(),
            meid: self.meid.clone(),
        }
    }
}

/// Facts reported by the provisioning feed, keyed by serial number.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisioningFacts {
    pub serial_number: String,
    pub model: Option<String>,
    pub description: Option<String>,
    pub color: Option<String>,
    pub asset_tag: Option<String>,
    pub profile_status: Option<String>,
    pub profile_uuid: Option<String>,
    pub profile_assign_time: Option<i64>,
    pub profile_push_time: Option<i64>,
    pub profile_assigned_date: Option<i64>,
    pub profile_assigned_by: Option<String>,
}

impl ProvisioningFacts {
    pub fn validate(&self) -> Result<(), FactValidationError> {
        require_serial(&self.serial_number, MergeSource::Fetch)
    }
}

/// Facts reported by the device during enrollment.
///
/// The serial number is re-asserted by the device and is the merge key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrollmentFacts {
    pub udid: String,
    pub mdm_topic: Option<String>,
    pub os_version: Option<String>,
    pub build_version: Option<String>,
    pub product_name: Option<String>,
    pub serial_number: String,
    pub imei: Option<String>,
    pub meid: Option<String>,
}

impl EnrollmentFacts {
    pub fn validate(&self) -> Result<(), FactValidationError> {
        require_serial(&self.serial_number, MergeSource::Authenticate)
    }
}

fn require_serial(serial_number: &str, source: MergeSource) -> Result<(), FactValidationError> {
    if serial_number.trim().is_empty() {
        return Err(FactValidationError::MissingSerialNumber(source));
    }
    Ok(())
}

/// Row shape returned by filtered device listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceSummary {
    pub uuid: DeviceId,
    pub udid: String,
    pub serial_number: Option<String>,
    pub dep_profile_status: Option<String>,
    pub model: Option<String>,
    pub workflow_uuid: String,
}
