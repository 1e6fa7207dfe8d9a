//! Integration test: payload acknowledgment ledger.
//!
//! Validates: payloads rejected by the transport come back as
//! `DataAck { sent: false }`, wait on the failed list and are resent with
//! their original id on the next cycle.

use std::collections::HashSet;
use std::sync::atomic::Ordering;
use std::time::Duration;

use tracker_common::device::{DeviceConfig, NoDataFlags};
use tracker_common::event::{CloudEvent, DataEvent, Event, PayloadKind};

use crate::common::{CloudControl, Harness, HarnessOptions};

fn quick_active() -> DeviceConfig {
    DeviceConfig {
        active_wait_timeout: 60,
        no_data: NoDataFlags {
            gnss: true,
            neighbor_cell: true,
            wifi: true,
        },
        ..DeviceConfig::default()
    }
}

#[tokio::test(start_paused = true)]
async fn failed_payloads_are_resent_next_cycle() {
    let cloud = CloudControl::default();
    cloud.fail_sends.store(true, Ordering::SeqCst);
    let h = Harness::start(HarnessOptions {
        device: quick_active(),
        cloud: cloud.clone(),
        ..Default::default()
    });

    h.run_until(Duration::from_secs(30)).await;
    let failed: HashSet<u32> = h
        .recorder
        .events(|ev| matches!(ev, Event::Cloud(CloudEvent::DataAck { sent: false, .. })))
        .iter()
        .filter_map(|ev| match ev {
            Event::Cloud(CloudEvent::DataAck { id, .. }) => Some(*id),
            _ => None,
        })
        .collect();
    assert!(!failed.is_empty());
    assert!(cloud.sent.lock().is_empty());

    cloud.fail_sends.store(false, Ordering::SeqCst);
    h.run_until(Duration::from_secs(70)).await;

    let delivered: HashSet<u32> = cloud.sent_kinds().into_iter().map(|(id, _)| id).collect();
    assert!(
        failed.is_subset(&delivered),
        "failed {failed:?} not all resent, delivered {delivered:?}"
    );
    assert!(
        cloud
            .sent_kinds()
            .iter()
            .any(|(id, kind)| *kind == PayloadKind::Data && !failed.contains(id)),
        "fresh cycle data sent alongside the resends"
    );
    assert_eq!(h.recorder.count(|ev| ev.as_error().is_some()), 0);
}

#[tokio::test(start_paused = true)]
async fn every_required_ack_frees_its_payload() {
    let h = Harness::start(HarnessOptions {
        device: quick_active(),
        ..Default::default()
    });
    // Sixteen cycles: twice the pending list capacity.
    h.run_until(Duration::from_secs(16 * 60 + 5)).await;

    let sends = h
        .recorder
        .count(|ev| matches!(ev, Event::Data(DataEvent::DataSend(_))));
    assert!(sends >= 16);
    assert_eq!(h.recorder.count(|ev| ev.as_error().is_some()), 0);
}
