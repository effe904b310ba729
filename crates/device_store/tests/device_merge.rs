use device_store::db::{open_store_with, RetryPolicy, ThreadSleeper};
use device_store::{
    open_store_in_memory, Device, DeviceColumn, DeviceRepository, DeviceService, LogFacade,
    RepoError, SqliteDeviceRepository, StoreConfig,
};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

fn in_memory_service() -> DeviceService<SqliteDeviceRepository> {
    let pool = open_store_in_memory().unwrap();
    DeviceService::new(SqliteDeviceRepository::new(pool))
}

fn provisioned(serial: &str) -> Device {
    let mut device = Device::with_serial(serial);
    device.model = Some("Widget".to_string());
    device.description = Some("IPAD WI-FI 64GB".to_string());
    device.color = Some("SPACE GRAY".to_string());
    device.asset_tag = Some("ASSET-42".to_string());
    device.dep_profile_status = Some("assigned".to_string());
    device.dep_profile_uuid = Some("PROFILE-1".to_string());
    device.dep_profile_assign_time = Some(1_700_000_000_000);
    device.dep_profile_push_time = Some(1_700_000_100_000);
    device.dep_profile_assigned_date = Some(1_699_999_000_000);
    device.dep_profile_assigned_by = Some("admin@example.com".to_string());
    device
}

fn enrolled(serial: &str, udid: &str) -> Device {
    let mut device = Device::with_serial(serial);
    device.udid = udid.to_string();
    device.apple_mdm_topic = Some("com.apple.mgmt.External.topic".to_string());
    device.os_version = Some("17.1".to_string());
    device.build_version = Some("21B74".to_string());
    device.product_name = Some("iPad13,1".to_string());
    device.imei = Some("35 123456 789012 3".to_string());
    device.meid = Some("A1000012345678".to_string());
    device
}

fn assert_provisioning_facts(stored: &Device, expected: &Device) {
    assert_eq!(stored.model, expected.model);
    assert_eq!(stored.description, expected.description);
    assert_eq!(stored.color, expected.color);
    assert_eq!(stored.asset_tag, expected.asset_tag);
    assert_eq!(stored.dep_profile_status, expected.dep_profile_status);
    assert_eq!(stored.dep_profile_uuid, expected.dep_profile_uuid);
    assert_eq!(stored.dep_profile_assign_time, expected.dep_profile_assign_time);
    assert_eq!(stored.dep_profile_push_time, expected.dep_profile_push_time);
    assert_eq!(
        stored.dep_profile_assigned_date,
        expected.dep_profile_assigned_date
    );
    assert_eq!(stored.dep_profile_assigned_by, expected.dep_profile_assigned_by);
    assert_eq!(stored.dep_device, Some(true));
}

fn assert_enrollment_facts(stored: &Device, expected: &Device) {
    assert_eq!(stored.udid, expected.udid);
    assert_eq!(stored.apple_mdm_topic, expected.apple_mdm_topic);
    assert_eq!(stored.os_version, expected.os_version);
    assert_eq!(stored.build_version, expected.build_version);
    assert_eq!(stored.product_name, expected.product_name);
    assert_eq!(stored.imei, expected.imei);
    assert_eq!(stored.meid, expected.meid);
}

#[test]
fn fetch_then_authenticate_resolves_to_one_device() {
    let service = in_memory_service();

    let mut fetched = Device::with_serial("ABC123");
    fetched.model = Some("Widget".to_string());
    let first = service.create_or_merge("fetch", &fetched).unwrap();

    let mut enrolled = Device::with_serial("ABC123");
    enrolled.udid = "UDID-9".to_string();
    let second = service.create_or_merge("authenticate", &enrolled).unwrap();

    assert_eq!(first, second);

    let device = service
        .get_device_by_udid("UDID-9", &[DeviceColumn::Model, DeviceColumn::Udid])
        .unwrap();
    assert_eq!(
        device,
        Device {
            model: Some("Widget".to_string()),
            udid: "UDID-9".to_string(),
            ..Device::default()
        }
    );
}

#[test]
fn authenticate_preserves_every_provisioning_fact() {
    let service = in_memory_service();
    let provisioning = provisioned("C02PRESERVE");
    let enrollment = enrolled("C02PRESERVE", "UDID-P");

    let id = service.create_or_merge("fetch", &provisioning).unwrap();
    service.create_or_merge("authenticate", &enrollment).unwrap();

    let stored = service.get_device(id).unwrap().unwrap();
    assert_provisioning_facts(&stored, &provisioning);
    assert_enrollment_facts(&stored, &enrollment);
}

#[test]
fn fetch_after_enrollment_preserves_enrollment_facts() {
    let service = in_memory_service();
    let enrollment = enrolled("C02LATEDEP", "UDID-L");
    let provisioning = provisioned("C02LATEDEP");

    let enrolled_id = service.create_or_merge("authenticate", &enrollment).unwrap();
    let before = service.get_device(enrolled_id).unwrap().unwrap();
    assert_eq!(before.dep_device, None);
    assert_eq!(before.model, None);

    let fetched_id = service.create_or_merge("fetch", &provisioning).unwrap();
    assert_eq!(enrolled_id, fetched_id);

    let stored = service.get_device(enrolled_id).unwrap().unwrap();
    assert_provisioning_facts(&stored, &provisioning);
    assert_enrollment_facts(&stored, &enrollment);
}

#[test]
fn repeated_fetch_overwrites_provisioning_facts_in_place() {
    let service = in_memory_service();
    let mut device = provisioned("C02REPEAT");
    let id = service.create_or_merge("fetch", &device).unwrap();

    device.dep_profile_status = Some("pushed".to_string());
    device.color = None;
    let again = service.create_or_merge("fetch", &device).unwrap();

    assert_eq!(id, again);
    let stored = service.get_device(id).unwrap().unwrap();
    assert_eq!(stored.dep_profile_status.as_deref(), Some("pushed"));
    assert_eq!(stored.color, None);
    assert_eq!(stored.workflow_uuid, "");
    assert_eq!(service.list_devices(&[]).unwrap().len(), 1);
}

#[test]
fn merge_leaves_caller_payload_untouched() {
    let service = in_memory_service();
    let device = provisioned("C02PAYLOAD");

    let id = service.create_or_merge("fetch", &device).unwrap();

    assert_eq!(device.uuid, None);
    assert_eq!(service.get_device(id).unwrap().unwrap().uuid, Some(id));
}

#[test]
fn unsupported_source_tag_writes_nothing() {
    let service = in_memory_service();

    let err = service
        .create_or_merge("delete", &provisioned("C02DELETE"))
        .unwrap_err();

    assert!(matches!(err, RepoError::UnsupportedCommand(ref tag) if tag == "delete"));
    assert!(service.list_devices(&[]).unwrap().is_empty());
}

#[test]
fn blank_serial_number_is_rejected_before_write() {
    let service = in_memory_service();
    let mut device = enrolled("", "UDID-BLANK");
    device.serial_number = None;

    let err = service.create_or_merge("authenticate", &device).unwrap_err();

    assert!(matches!(err, RepoError::Validation(_)));
    assert!(service.list_devices(&[]).unwrap().is_empty());
}

#[test]
fn concurrent_merges_for_one_serial_keep_both_fact_sets() {
    let dir = tempfile::tempdir().unwrap();
    let config = StoreConfig {
        connection_string: dir.path().join("devices.db").to_str().unwrap().to_string(),
        pool_size: 4,
        retry: RetryPolicy::new(3, Duration::from_millis(10)),
        ..StoreConfig::default()
    };
    let pool = open_store_with(&config, &LogFacade, &ThreadSleeper).unwrap();
    let repo = SqliteDeviceRepository::new(pool);

    for round in 0..10 {
        let serial = format!("C02RACE{round:02}");
        let provisioning = provisioned(&serial).provisioning_facts();
        let enrollment = enrolled(&serial, &format!("UDID-RACE-{round}")).enrollment_facts();
        let barrier = Arc::new(Barrier::new(2));

        let fetch = {
            let repo = repo.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                repo.merge_provisioning(&provisioning).unwrap()
            })
        };
        let authenticate = {
            let repo = repo.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                repo.merge_enrollment(&enrollment).unwrap()
            })
        };

        let fetch_id = fetch.join().unwrap();
        let authenticate_id = authenticate.join().unwrap();
        assert_eq!(fetch_id, authenticate_id, "round {round} produced two rows");

        let stored = repo.get_device(fetch_id).unwrap().unwrap();
        assert_provisioning_facts(&stored, &provisioned(&serial));
        assert_enrollment_facts(&stored, &enrolled(&serial, &format!("UDID-RACE-{round}")));
    }

    assert_eq!(repo.list_devices(&[]).unwrap().len(), 10);
}
