//! Integration test: active-mode sampling cycle.
//!
//! Validates: the cycle fires as soon as the last response (location)
//! arrives, and falls back to the collection timeout when it never does.

use std::time::Duration;

use tracker_common::event::{AppEvent, DataEvent, DataKind, Event, LocationEvent};

use crate::common::{Harness, HarnessOptions, MOCK_EPOCH_MS};

fn within(t: Duration, secs: u64) -> bool {
    t >= Duration::from_secs(secs) && t < Duration::from_secs(secs + 1)
}

fn is_data_ready(ev: &Event) -> bool {
    matches!(ev, Event::Data(DataEvent::DataReady { .. }))
}

#[tokio::test(start_paused = true)]
async fn cycle_completes_when_location_arrives() {
    let h = Harness::start(HarnessOptions {
        fix_after: Duration::from_secs(90),
        ..Default::default()
    });
    h.run_until(Duration::from_secs(100)).await;

    let requests = h.recorder.events(|ev| matches!(ev, Event::App(AppEvent::DataGet(_))));
    assert_eq!(requests.len(), 1);
    let Event::App(AppEvent::DataGet(request)) = &requests[0] else {
        unreachable!()
    };
    assert!(request.kinds.includes(DataKind::Location));
    assert_eq!(request.timeout, Duration::from_secs(115));

    let ready = h.recorder.times(is_data_ready);
    assert_eq!(ready.len(), 1, "exactly one DataReady per cycle");
    assert!(within(ready[0], 90));
    assert_eq!(
        h.recorder
            .count(|ev| matches!(ev, Event::Data(DataEvent::CollectionTimeout { .. }))),
        0
    );

    let sent = h.cloud.sent.lock();
    let data = sent
        .iter()
        .find(|p| p.kind == tracker_common::event::PayloadKind::Data)
        .expect("data payload sent");
    let body: serde_json::Value = serde_json::from_slice(&data.bytes).unwrap();
    assert_eq!(body["type"], "data");
    assert_eq!(body["body"]["gnss"]["satellites_tracked"], 7);
    assert!(body["body"]["modem_static"].is_object());

    // Uptime stamps are shifted onto the network clock before encoding.
    let stamp = body["body"]["gnss"]["timestamp"].as_u64().unwrap();
    assert!(stamp <= MOCK_EPOCH_MS && stamp > MOCK_EPOCH_MS - 3_600_000);
    assert_eq!(
        h.recorder
            .count(|ev| matches!(ev, Event::Data(DataEvent::DateTimeObtained(_)))),
        1
    );
}

#[tokio::test(start_paused = true)]
async fn collection_timeout_fires_without_location() {
    let h = Harness::start(HarnessOptions {
        fix_after: Duration::from_secs(200),
        ..Default::default()
    });
    h.run_until(Duration::from_secs(119)).await;

    let ready = h.recorder.times(is_data_ready);
    assert_eq!(ready.len(), 1);
    assert!(within(ready[0], 115));
    assert_eq!(
        h.recorder
            .count(|ev| matches!(ev, Event::Location(LocationEvent::GnssDataReady(_)))),
        0
    );
}

#[tokio::test(start_paused = true)]
async fn active_timer_requests_next_cycle() {
    let h = Harness::start(HarnessOptions::default());
    h.run_until(Duration::from_secs(250)).await;

    let requests = h
        .recorder
        .times(|ev| matches!(ev, Event::App(AppEvent::DataGet(_))));
    assert_eq!(requests.len(), 3);
    assert!(within(requests[1], 120));
    assert!(within(requests[2], 240));

    // Static modem data is only requested until it has been seen once.
    let static_requested = h.recorder.count(|ev| {
        matches!(ev, Event::App(AppEvent::DataGet(r)) if r.kinds.includes(DataKind::ModemStatic))
    });
    assert_eq!(static_requested, 1);
}
