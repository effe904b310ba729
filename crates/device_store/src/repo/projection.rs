//! Column allow-list for projected device reads.
//!
//! Callers choose which columns a lookup returns. Only names from this enum
//! ever reach SQL text, so a projection cannot alter query structure.

use crate::model::device::Device;
use crate::repo::device_repo::{RepoError, RepoResult};
use rusqlite::Row;
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use uuid::Uuid;

/// One column of the `devices` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceColumn {
    DeviceUuid,
    Udid,
    SerialNumber,
    OsVersion,
    Model,
    Color,
    AssetTag,
    DepProfileStatus,
    DepProfileUuid,
    DepProfileAssignTime,
    DepProfilePushTime,
    DepProfileAssignedDate,
    DepProfileAssignedBy,
    Description,
    BuildVersion,
    ProductName,
    Imei,
    Meid,
    AppleMdmToken,
    AppleMdmTopic,
    ApplePushMagic,
    MdmEnrolled,
    WorkflowUuid,
    DepDevice,
    AwaitingConfiguration,
}

impl DeviceColumn {
    /// Every column, in table order.
    pub const ALL: &'static [DeviceColumn] = &[
        Self::DeviceUuid,
        Self::Udid,
        Self::SerialNumber,
        Self::OsVersion,
        Self::Model,
        Self::Color,
        Self::AssetTag,
        Self::DepProfileStatus,
        Self::DepProfileUuid,
        Self::DepProfileAssignTime,
        Self::DepProfilePushTime,
        Self::DepProfileAssignedDate,
        Self::DepProfileAssignedBy,
        Self::Description,
        Self::BuildVersion,
        Self::ProductName,
        Self::Imei,
        Self::Meid,
        Self::AppleMdmToken,
        Self::AppleMdmTopic,
        Self::ApplePushMagic,
        Self::MdmEnrolled,
        Self::WorkflowUuid,
        Self::DepDevice,
        Self::AwaitingConfiguration,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::DeviceUuid => "device_uuid",
            Self::Udid => "udid",
            Self::SerialNumber => "serial_number",
            Self::OsVersion => "os_version",
            Self::Model => "model",
            Self::Color => "color",
            Self::AssetTag => "asset_tag",
            Self::DepProfileStatus => "dep_profile_status",
            Self::DepProfileUuid => "dep_profile_uuid",
            Self::DepProfileAssignTime => "dep_profile_assign_time",
            Self::DepProfilePushTime => "dep_profile_push_time",
            Self::DepProfileAssignedDate => "dep_profile_assigned_date",
            Self::DepProfileAssignedBy => "dep_profile_assigned_by",
            Self::Description => "description",
            Self::BuildVersion => "build_version",
            Self::ProductName => "product_name",
            Self::Imei => "imei",
            Self::Meid => "meid",
            Self::AppleMdmToken => "apple_mdm_token",
            Self::AppleMdmTopic => "apple_mdm_topic",
            Self::ApplePushMagic => "apple_push_magic",
            Self::MdmEnrolled => "mdm_enrolled",
            Self::WorkflowUuid => "workflow_uuid",
            Self::DepDevice => "dep_device",
            Self::AwaitingConfiguration => "awaiting_configuration",
        }
    }

    /// Copies column `idx` of `row` into the matching field of `device`.
    pub(crate) fn read_into(self, row: &Row<'_>, idx: usize, device: &mut Device) -> RepoResult<()> {
        match self {
            Self::DeviceUuid => {
                let text: String = row.get(idx)?;
                device.uuid = Some(parse_device_id(&text)?);
            }
            Self::Udid => device.udid = row.get(idx)?,
            Self::SerialNumber => device.serial_number = row.get(idx)?,
            Self::OsVersion => device.os_version = row.get(idx)?,
            Self::Model => device.model = row.get(idx)?,
            Self::Color => device.color = row.get(idx)?,
            Self::AssetTag => device.asset_tag = row.get(idx)?,
            Self::DepProfileStatus => device.dep_profile_status = row.get(idx)?,
            Self::DepProfileUuid => device.dep_profile_uuid = row.get(idx)?,
            Self::DepProfileAssignTime => device.dep_profile_assign_time = row.get(idx)?,
            Self::DepProfilePushTime => device.dep_profile_push_time = row.get(idx)?,
            Self::DepProfileAssignedDate => device.dep_profile_assigned_date = row.get(idx)?,
            Self::DepProfileAssignedBy => device.dep_profile_assigned_by = row.get(idx)?,
            Self::Description => device.description = row.get(idx)?,
            Self::BuildVersion => device.build_version = row.get(idx)?,
            Self::ProductName => device.product_name = row.get(idx)?,
            Self::Imei => device.imei = row.get(idx)?,
            Self::Meid => device.meid = row.get(idx)?,
            Self::AppleMdmToken => device.apple_mdm_token = row.get(idx)?,
            Self::AppleMdmTopic => device.apple_mdm_topic = row.get(idx)?,
            Self::ApplePushMagic => device.apple_push_magic = row.get(idx)?,
            Self::MdmEnrolled => device.mdm_enrolled = row.get(idx)?,
            Self::WorkflowUuid => device.workflow_uuid = row.get(idx)?,
            Self::DepDevice => device.dep_device = row.get(idx)?,
            Self::AwaitingConfiguration => device.awaiting_configuration = row.get(idx)?,
        }
        Ok(())
    }
}

impl Display for DeviceColumn {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeviceColumn {
    type Err = RepoError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let name = value.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|column| column.as_str() == name)
            .ok_or_else(|| RepoError::InvalidQuery(format!("unknown device column `{name}`")))
    }
}

/// Renders `columns` as a comma-separated select list.
pub(crate) fn select_list(columns: &[DeviceColumn]) -> String {
    columns
        .iter()
        .map(|column| column.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Reads a row selected with `columns` into a partially populated device.
pub(crate) fn read_projected(row: &Row<'_>, columns: &[DeviceColumn]) -> RepoResult<Device> {
    let mut device = Device::default();
    for (idx, column) in columns.iter().enumerate() {
        column.read_into(row, idx, &mut device)?;
    }
    Ok(device)
}

pub(crate) fn parse_device_id(text: &str) -> RepoResult<Uuid> {
    Uuid::parse_str(text).map_err(|_| {
        RepoError::InvalidData(format!("invalid uuid value `{text}` in devices.device_uuid"))
    })
}

#[cfg(test)]
mod tests {
    use super::{select_list, DeviceColumn};
    use crate::repo::device_repo::RepoError;

    #[test]
    fn column_names_parse_back_to_columns() {
        for column in DeviceColumn::ALL {
            assert_eq!(column.as_str().parse::<DeviceColumn>().unwrap(), *column);
        }
    }

    #[test]
    fn unknown_column_name_is_rejected() {
        let err = "model; DROP TABLE devices".parse::<DeviceColumn>().unwrap_err();
        assert!(matches!(err, RepoError::InvalidQuery(_)));
    }

    #[test]
    fn select_list_joins_in_given_order() {
        assert_eq!(
            select_list(&[DeviceColumn::Model, DeviceColumn::Udid]),
            "model, udid"
        );
    }
}
