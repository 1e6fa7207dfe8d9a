//! Integration test: error-triggered shutdown.
//!
//! Validates: one shutdown request per boot, every shutdown-capable module
//! acknowledges once, duplicate acks are not double-counted, and the device
//! resets exactly once after the graceful delay.

use std::collections::HashSet;
use std::time::Duration;

use tracker_common::error::ErrorCode;
use tracker_common::event::{CloudEvent, Event, Family, ShutdownReason, UtilEvent};

use crate::common::{Harness, HarnessOptions};

fn is_shutdown_request(ev: &Event) -> bool {
    matches!(ev, Event::Util(UtilEvent::ShutdownRequest(_)))
}

#[tokio::test(start_paused = true)]
async fn error_shuts_down_and_resets_once() {
    let h = Harness::start(HarnessOptions::default());
    h.run_until(Duration::from_secs(5)).await;
    assert_eq!(h.system.registry().active_count(), 7);

    h.system
        .bus()
        .publish(Event::error(Family::Sensor, ErrorCode::Driver))
        .unwrap();
    h.run_until(Duration::from_secs(6)).await;

    let acks = h.recorder.events(|ev| ev.as_shutdown_ready().is_some());
    let ids: HashSet<_> = acks.iter().filter_map(Event::as_shutdown_ready).collect();
    assert_eq!(ids.len(), 7);
    assert!(h.system.registry().is_complete());

    // Replay one ack and raise a second error; neither changes the outcome.
    h.system.bus().publish(acks[0].clone()).unwrap();
    h.system
        .bus()
        .publish(Event::error(Family::Modem, ErrorCode::Driver))
        .unwrap();
    h.run_until(Duration::from_secs(60)).await;

    assert_eq!(h.recorder.count(is_shutdown_request), 1);
    let resets = h.resets.calls();
    assert_eq!(resets.len(), 1, "reset issued exactly once");
    let (at, reason) = resets[0];
    assert_eq!(reason, ShutdownReason::Generic);
    assert!(at >= Duration::from_secs(10) && at < Duration::from_secs(11));
}

#[tokio::test(start_paused = true)]
async fn firmware_update_reboots_with_fota_reason() {
    let h = Harness::start(HarnessOptions::default());
    h.run_until(Duration::from_secs(5)).await;

    h.system.bus().publish(CloudEvent::FotaDone).unwrap();
    h.run_until(Duration::from_secs(40)).await;

    let requests = h.recorder.events(is_shutdown_request);
    assert_eq!(
        requests,
        vec![Event::Util(UtilEvent::ShutdownRequest(ShutdownReason::Fota))]
    );
    let resets = h.resets.calls();
    assert_eq!(resets.len(), 1);
    assert_eq!(resets[0].1, ShutdownReason::Fota);
    assert_eq!(
        h.leds.lock().last().copied(),
        Some(tracker_core::ports::LedPattern::FotaUpdateReboot)
    );
}
