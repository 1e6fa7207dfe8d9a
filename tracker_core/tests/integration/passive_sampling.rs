//! Integration test: passive-mode sampling.
//!
//! Validates: movement triggers a sample, further movement is suppressed
//! while the resolution window is open, and active mode ignores movement.

use std::time::Duration;

use tracker_common::device::{DeviceConfig, NoDataFlags};
use tracker_common::event::{AppEvent, DataKind, Event, SensorEvent};

use crate::common::{Harness, HarnessOptions};

fn passive() -> DeviceConfig {
    DeviceConfig {
        active_mode: false,
        movement_resolution: 120,
        movement_timeout: 3600,
        no_data: NoDataFlags {
            gnss: true,
            neighbor_cell: true,
            wifi: true,
        },
        ..DeviceConfig::default()
    }
}

fn is_data_get(ev: &Event) -> bool {
    matches!(ev, Event::App(AppEvent::DataGet(_)))
}

#[tokio::test(start_paused = true)]
async fn movement_sampling_respects_resolution_window() {
    let h = Harness::start(HarnessOptions {
        device: passive(),
        ..Default::default()
    });

    h.run_until(Duration::from_secs(20)).await;
    h.sensor.shake();
    h.run_until(Duration::from_secs(40)).await;
    h.sensor.shake();
    h.run_until(Duration::from_secs(150)).await;
    h.sensor.shake();
    h.run_until(Duration::from_secs(160)).await;

    let requests = h.recorder.times(is_data_get);
    assert_eq!(requests.len(), 3, "boot sample plus two movement samples");
    assert!(requests[1] >= Duration::from_secs(20) && requests[1] < Duration::from_secs(21));
    assert!(requests[2] >= Duration::from_secs(150) && requests[2] < Duration::from_secs(151));

    assert_eq!(
        h.recorder
            .count(|ev| matches!(ev, Event::Sensor(SensorEvent::MovementDataReady(_)))),
        3
    );
    assert_eq!(
        h.recorder
            .count(|ev| matches!(ev, Event::Sensor(SensorEvent::ActivityDetected))),
        3
    );

    // Every location method is off, so location is never requested.
    let with_location = h.recorder.count(|ev| {
        matches!(ev, Event::App(AppEvent::DataGet(r)) if r.kinds.includes(DataKind::Location))
    });
    assert_eq!(with_location, 0);
}

#[tokio::test(start_paused = true)]
async fn movement_ignored_in_active_mode() {
    let h = Harness::start(HarnessOptions::default());
    h.run_until(Duration::from_secs(30)).await;
    h.sensor.shake();
    h.run_until(Duration::from_secs(60)).await;

    assert_eq!(h.recorder.count(is_data_get), 1);
    assert_eq!(
        h.recorder
            .count(|ev| matches!(ev, Event::Sensor(SensorEvent::MovementDataReady(_)))),
        0
    );
}
