//! Integration tests for configuration files and the persisted device record.

use std::io::Write;

use tempfile::{NamedTempFile, TempDir};
use tracker_common::config::{ConfigLoader, LogLevel, TrackerConfig};
use tracker_common::consts::DEVICE_SETTINGS_KEY;
use tracker_common::device::{ConfigUpdate, DeviceConfig};
use tracker_common::settings::{FileSettingsStore, SettingsStore};

// ── Helpers ──

fn write_toml(text: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(text.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

// ── Tests ──

#[test]
fn full_tracker_toml_loads_and_validates() {
    let file = write_toml(
        r#"
[shared]
log_level = "trace"
service_name = "bench-unit"

[runtime]
mailbox_capacity = 16
event_pool_capacity = 128

[cloud]
connect_retries = 4

[shutdown]
reboot_delay_s = 2
fallback_timeout_s = 20

[sampling]
default_timeout_s = 8
location_margin_s = 3
location_floor_s = 25

[storage]
settings_dir = "state"
"#,
    );
    let config = TrackerConfig::load(file.path()).unwrap();
    config.validate().unwrap();
    assert_eq!(config.shared.log_level, LogLevel::Trace);
    assert_eq!(config.runtime.mailbox_capacity, 16);
    assert_eq!(config.cloud.connect_retries, 4);
    assert_eq!(config.shutdown.fallback_timeout().as_secs(), 20);
    assert_eq!(config.sampling.location_floor_s, 25);
}

#[test]
fn unknown_log_level_is_a_parse_error() {
    let file = write_toml("[shared]\nlog_level = \"loud\"\n");
    assert!(TrackerConfig::load(file.path()).is_err());
}

#[test]
fn device_record_survives_store_reopen() {
    let dir = TempDir::new().unwrap();
    let mut cfg = DeviceConfig::default();
    cfg.apply_update(&ConfigUpdate {
        active_mode: Some(false),
        movement_timeout: Some(600),
        ..Default::default()
    });
    FileSettingsStore::new(dir.path())
        .save(DEVICE_SETTINGS_KEY, &cfg.to_stored())
        .unwrap();

    let bytes = FileSettingsStore::new(dir.path())
        .load(DEVICE_SETTINGS_KEY)
        .unwrap()
        .unwrap();
    let restored = DeviceConfig::from_stored(&bytes);
    assert_eq!(restored, cfg);
    assert_eq!(restored.version, 1);
}

#[test]
fn corrupted_device_record_restores_defaults() {
    let dir = TempDir::new().unwrap();
    let store = FileSettingsStore::new(dir.path());
    store.save(DEVICE_SETTINGS_KEY, b"\x00\x00\x00garbage").unwrap();
    let bytes = store.load(DEVICE_SETTINGS_KEY).unwrap().unwrap();
    assert_eq!(DeviceConfig::from_stored(&bytes), DeviceConfig::default());
}
