//! Integration test: cloud configuration round trip.
//!
//! Validates: the configuration is requested once the cloud connects, a
//! changed update is persisted, distributed and echoed back, and every
//! module follows the new mode.

use std::time::Duration;

use tracker_common::consts::DEVICE_SETTINGS_KEY;
use tracker_common::device::{ConfigUpdate, DeviceConfig};
use tracker_common::event::{AppEvent, DataEvent, Event, PayloadKind};
use tracker_common::settings::SettingsStore;
use tracker_core::ports::LedPattern;

use crate::common::{CloudControl, Harness, HarnessOptions};

#[tokio::test(start_paused = true)]
async fn changed_update_is_persisted_and_echoed() {
    let cloud = CloudControl::default();
    *cloud.config.lock() = Some(ConfigUpdate {
        active_mode: Some(false),
        movement_timeout: Some(600),
        accelerometer_threshold: Some(250.0),
        ..Default::default()
    });
    let h = Harness::start(HarnessOptions {
        cloud: cloud.clone(),
        ..Default::default()
    });
    h.run_until(Duration::from_secs(10)).await;

    assert_eq!(
        h.recorder
            .count(|ev| matches!(ev, Event::App(AppEvent::ConfigGet))),
        1
    );

    let ready = h
        .recorder
        .events(|ev| matches!(ev, Event::Data(DataEvent::ConfigReady(_))));
    let [Event::Data(DataEvent::ConfigReady(cfg))] = ready.as_slice() else {
        panic!("expected one ConfigReady, got {ready:?}");
    };
    assert!(!cfg.active_mode);
    assert_eq!(cfg.movement_timeout, 600);
    // Out-of-range threshold rejected, stale value kept.
    assert_eq!(cfg.accelerometer_threshold, 10.0);
    assert_eq!(cfg.version, 1);

    let stored = h.settings.load(DEVICE_SETTINGS_KEY).unwrap().unwrap();
    assert_eq!(DeviceConfig::from_stored(&stored), *cfg);

    assert!(
        cloud
            .sent_kinds()
            .iter()
            .any(|(_, kind)| *kind == PayloadKind::Config)
    );
    assert_eq!(h.leds.lock().last().copied(), Some(LedPattern::PassiveMode));
}

#[tokio::test(start_paused = true)]
async fn empty_cloud_config_gets_current_record() {
    let cloud = CloudControl::default();
    let h = Harness::start(HarnessOptions {
        cloud: cloud.clone(),
        ..Default::default()
    });
    h.run_until(Duration::from_secs(10)).await;

    assert_eq!(
        h.recorder
            .count(|ev| matches!(ev, Event::Data(DataEvent::ConfigReady(_)))),
        0
    );
    let sent = cloud.sent.lock();
    let config = sent
        .iter()
        .find(|p| p.kind == PayloadKind::Config)
        .expect("configuration reported");
    let body: serde_json::Value = serde_json::from_slice(&config.bytes).unwrap();
    assert_eq!(body["type"], "config");
    assert_eq!(body["body"]["active_wait_timeout"], 120);
}
