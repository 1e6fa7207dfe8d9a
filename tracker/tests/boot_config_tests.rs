//! Boot configuration: `tracker.toml` through to the runtime parameters and
//! the settings store the binary hands to the modules.

use std::io::Write;
use std::time::Duration;

use tempfile::{NamedTempFile, TempDir};

use tracker_common::config::{ConfigError, ConfigLoader, TrackerConfig};
use tracker_common::consts::DEVICE_SETTINGS_KEY;
use tracker_common::device::DeviceConfig;
use tracker_common::settings::{FileSettingsStore, SettingsStore};
use tracker_core::RuntimeConfig;

fn write_config(text: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(text.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

#[test]
fn test_file_values_reach_runtime() {
    let file = write_config(
        r#"[runtime]
mailbox_capacity = 16

[cloud]
connect_retries = 3

[shutdown]
reboot_delay_s = 2
fallback_timeout_s = 20

[sampling]
location_floor_s = 45
"#,
    );
    let config = TrackerConfig::load(file.path()).unwrap();
    config.validate().unwrap();

    let runtime = RuntimeConfig::from(&config);
    assert_eq!(runtime.mailbox_capacity, 16);
    assert_eq!(runtime.connect_retries, 3);
    assert_eq!(runtime.reboot_delay, Duration::from_secs(2));
    assert_eq!(runtime.fallback_timeout, Duration::from_secs(20));
    assert_eq!(runtime.sampling.location_floor, Duration::from_secs(45));
}

#[test]
fn test_defaults_match_runtime_defaults() {
    let runtime = RuntimeConfig::from(&TrackerConfig::default());
    assert_eq!(runtime, RuntimeConfig::default());
}

#[test]
fn test_invalid_shutdown_timing_rejected() {
    let file = write_config("[shutdown]\nreboot_delay_s = 40\n");
    let config = TrackerConfig::load(file.path()).unwrap();
    assert!(matches!(
        config.validate(),
        Err(ConfigError::ValidationError(_))
    ));
}

#[test]
fn test_device_record_survives_reboot() {
    let dir = TempDir::new().unwrap();
    let stored = DeviceConfig {
        active_mode: false,
        movement_timeout: 900,
        ..DeviceConfig::default()
    };

    FileSettingsStore::new(dir.path())
        .save(DEVICE_SETTINGS_KEY, &stored.to_stored())
        .unwrap();

    // A fresh store over the same directory, as after a reboot.
    let reloaded = FileSettingsStore::new(dir.path())
        .load(DEVICE_SETTINGS_KEY)
        .unwrap()
        .expect("record present");
    assert_eq!(DeviceConfig::from_stored(&reloaded), stored);
}

#[test]
fn test_missing_record_is_none() {
    let dir = TempDir::new().unwrap();
    let store = FileSettingsStore::new(dir.path());
    assert!(store.load(DEVICE_SETTINGS_KEY).unwrap().is_none());
}
