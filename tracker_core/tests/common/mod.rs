//! Shared fixtures: mock collaborators, an event recorder and a harness
//! that boots the full module set on a paused tokio clock.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use tracker_common::consts::DEVICE_SETTINGS_KEY;
use tracker_common::device::{ConfigUpdate, DeviceConfig};
use tracker_common::error::DriverError;
use tracker_common::event::{
    Acceleration, AckMode, Battery, Environmental, Event, Family, GnssFix, ModemDynamic,
    ModemStatic, OutboundPayload, PayloadKind, ShutdownReason,
};
use tracker_common::settings::{MemorySettingsStore, SettingsStore};

use tracker_core::bus::{Bus, Handled, Rank, Subscription};
use tracker_core::codec::JsonCodec;
use tracker_core::ports::{
    CloudLink, CloudLocationResult, CloudTransport, DateTimeLink, DateTimeSource, LedPattern,
    LocationBackend, LocationLink, LocationRequest, ModemBackend, ModemLink, SensorBackend,
    SensorLink, SystemReset, UiBackend, UiLink,
};
use tracker_core::{Backends, RuntimeConfig, System};

// ─── Recorder ───────────────────────────────────────────────────────

/// Captures every published event with its virtual timestamp.
#[derive(Clone)]
pub struct Recorder {
    t0: Instant,
    events: Arc<Mutex<Vec<(Duration, Event)>>>,
}

impl Recorder {
    pub fn attach(bus: &Bus) -> Self {
        let recorder = Self {
            t0: Instant::now(),
            events: Arc::new(Mutex::new(Vec::new())),
        };
        for family in Family::ALL {
            let rec = recorder.clone();
            bus.subscribe(Subscription::immediate(
                "recorder",
                family,
                Rank::Final,
                move |env| {
                    rec.events
                        .lock()
                        .push((rec.t0.elapsed(), env.event().clone()));
                    Handled::Pass
                },
            ));
        }
        recorder
    }

    /// Timestamps of events matching `pred`.
    pub fn times<F: Fn(&Event) -> bool>(&self, pred: F) -> Vec<Duration> {
        self.events
            .lock()
            .iter()
            .filter(|(_, ev)| pred(ev))
            .map(|(t, _)| *t)
            .collect()
    }

    pub fn events<F: Fn(&Event) -> bool>(&self, pred: F) -> Vec<Event> {
        self.events
            .lock()
            .iter()
            .filter(|(_, ev)| pred(ev))
            .map(|(_, ev)| ev.clone())
            .collect()
    }

    pub fn count<F: Fn(&Event) -> bool>(&self, pred: F) -> usize {
        self.events.lock().iter().filter(|(_, ev)| pred(ev)).count()
    }
}

// ─── Sample data ────────────────────────────────────────────────────

pub fn gnss_fix() -> GnssFix {
    GnssFix {
        latitude: 63.43,
        longitude: 10.39,
        altitude: 12.0,
        accuracy: 4.5,
        speed: 0.0,
        heading: 0.0,
        satellites_tracked: 7,
        search_time_ms: 90_000,
        timestamp: 0,
    }
}

// ─── Modem ──────────────────────────────────────────────────────────

pub struct MockModem;

impl ModemBackend for MockModem {
    fn init(&mut self) -> Result<(), DriverError> {
        Ok(())
    }

    fn connect(&mut self, link: ModemLink) -> Result<(), DriverError> {
        tokio::spawn(async move { link.lte_connected() });
        Ok(())
    }

    fn static_data(&mut self) -> Result<ModemStatic, DriverError> {
        Ok(ModemStatic {
            app_version: "1.0.0".into(),
            board_version: "mock".into(),
            modem_fw: "mfw_1.3.0".into(),
            iccid: "8931080019073497795".into(),
            band: 20,
            nw_mode_ltem: true,
            nw_mode_nbiot: false,
            timestamp: 0,
        })
    }

    fn dynamic_data(&mut self) -> Result<ModemDynamic, DriverError> {
        Ok(ModemDynamic {
            rsrp: -90,
            area_code: 2305,
            cell_id: 34237196,
            mccmnc: "24202".into(),
            ip_address: "10.81.183.99".into(),
            timestamp: 0,
        })
    }

    fn battery(&mut self) -> Result<Battery, DriverError> {
        Ok(Battery {
            voltage_mv: 3_900,
            timestamp: 0,
        })
    }

    fn power_off(&mut self) -> Result<(), DriverError> {
        Ok(())
    }
}

// ─── Location ───────────────────────────────────────────────────────

/// Reports a fix `delay` after each request.
pub struct MockLocation {
    pub delay: Duration,
    search: Option<JoinHandle<()>>,
}

impl MockLocation {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            search: None,
        }
    }
}

impl LocationBackend for MockLocation {
    fn init(&mut self) -> Result<(), DriverError> {
        Ok(())
    }

    fn request(
        &mut self,
        _request: LocationRequest,
        link: LocationLink,
    ) -> Result<(), DriverError> {
        let delay = self.delay;
        self.search = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            link.fix(gnss_fix());
        }));
        Ok(())
    }

    fn cancel(&mut self) -> Result<(), DriverError> {
        if let Some(search) = self.search.take() {
            search.abort();
        }
        Ok(())
    }

    fn cloud_location_result(&mut self, _result: CloudLocationResult) -> Result<(), DriverError> {
        Ok(())
    }
}

// ─── Sensor ─────────────────────────────────────────────────────────

#[derive(Clone, Default)]
pub struct SensorControl {
    link: Arc<Mutex<Option<SensorLink>>>,
    pub threshold: Arc<Mutex<Option<f64>>>,
}

impl SensorControl {
    /// Simulate an accelerometer interrupt.
    pub fn shake(&self) {
        if let Some(link) = self.link.lock().as_ref() {
            link.accelerometer_trigger(Acceleration {
                values: [0.4, 12.1, 9.8],
                timestamp: 0,
            });
        }
    }
}

pub struct MockSensor(pub SensorControl);

impl SensorBackend for MockSensor {
    fn start(&mut self, link: SensorLink) -> Result<(), DriverError> {
        *self.0.link.lock() = Some(link);
        Ok(())
    }

    fn environmental(&mut self) -> Result<Environmental, DriverError> {
        Ok(Environmental {
            temperature: 21.5,
            humidity: 40.0,
            timestamp: 0,
        })
    }

    fn set_threshold(&mut self, threshold: f64) -> Result<(), DriverError> {
        *self.0.threshold.lock() = Some(threshold);
        Ok(())
    }
}

// ─── UI ─────────────────────────────────────────────────────────────

pub struct MockUi(pub Arc<Mutex<Vec<LedPattern>>>);

impl UiBackend for MockUi {
    fn start(&mut self, _link: UiLink) -> Result<(), DriverError> {
        Ok(())
    }

    fn set_led(&mut self, pattern: LedPattern) -> Result<(), DriverError> {
        self.0.lock().push(pattern);
        Ok(())
    }
}

// ─── Cloud ──────────────────────────────────────────────────────────

#[derive(Clone, Default)]
pub struct CloudControl {
    /// Payloads the transport accepted.
    pub sent: Arc<Mutex<Vec<OutboundPayload>>>,
    /// Reject every send while set.
    pub fail_sends: Arc<AtomicBool>,
    /// Answer configuration requests with this update.
    pub config: Arc<Mutex<Option<ConfigUpdate>>>,
    link: Arc<Mutex<Option<CloudLink>>>,
}

impl CloudControl {
    pub fn sent_kinds(&self) -> Vec<(u32, PayloadKind)> {
        self.sent.lock().iter().map(|p| (p.id, p.kind)).collect()
    }
}

pub struct MockTransport(pub CloudControl);

impl CloudTransport for MockTransport {
    fn connect(&mut self, link: CloudLink) -> Result<(), DriverError> {
        *self.0.link.lock() = Some(link.clone());
        tokio::spawn(async move { link.connected() });
        Ok(())
    }

    fn disconnect(&mut self) -> Result<(), DriverError> {
        Ok(())
    }

    fn send(&mut self, payload: &OutboundPayload) -> Result<(), DriverError> {
        if self.0.fail_sends.load(Ordering::SeqCst) {
            return Err(DriverError::NotConnected);
        }
        self.0.sent.lock().push(payload.clone());
        if payload.ack == AckMode::Required {
            if let Some(link) = self.0.link.lock().as_ref() {
                link.data_ack(payload.id, true);
            }
        }
        Ok(())
    }

    fn request_config(&mut self) -> Result<(), DriverError> {
        let update = *self.0.config.lock();
        if let Some(link) = self.0.link.lock().as_ref() {
            match update {
                Some(update) => link.config_received(update),
                None => link.config_empty(),
            }
        }
        Ok(())
    }
}

// ─── Clock ──────────────────────────────────────────────────────────

/// Network time arrives right after it is requested.
pub struct MockClock;

pub const MOCK_EPOCH_MS: u64 = 1_700_000_000_000;

impl DateTimeSource for MockClock {
    fn update(&mut self, link: DateTimeLink) -> Result<(), DriverError> {
        tokio::spawn(async move { link.obtained(MOCK_EPOCH_MS) });
        Ok(())
    }
}

// ─── Reset ──────────────────────────────────────────────────────────

/// Records reset calls with their virtual time since boot.
#[derive(Clone)]
pub struct RecordingReset {
    t0: Instant,
    pub calls: Arc<Mutex<Vec<(Duration, ShutdownReason)>>>,
}

impl RecordingReset {
    pub fn new(t0: Instant) -> Self {
        Self {
            t0,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn calls(&self) -> Vec<(Duration, ShutdownReason)> {
        self.calls.lock().clone()
    }
}

impl SystemReset for RecordingReset {
    fn reboot(&self, reason: ShutdownReason) {
        self.calls.lock().push((self.t0.elapsed(), reason));
    }
}

// ─── Harness ────────────────────────────────────────────────────────

pub struct Harness {
    pub system: System,
    pub recorder: Recorder,
    pub cloud: CloudControl,
    pub sensor: SensorControl,
    pub leds: Arc<Mutex<Vec<LedPattern>>>,
    pub resets: RecordingReset,
    pub settings: MemorySettingsStore,
    pub t0: Instant,
}

pub struct HarnessOptions {
    pub device: DeviceConfig,
    pub fix_after: Duration,
    pub runtime: RuntimeConfig,
    pub cloud: CloudControl,
}

impl Default for HarnessOptions {
    fn default() -> Self {
        Self {
            device: DeviceConfig::default(),
            fix_after: Duration::from_secs(5),
            runtime: RuntimeConfig::default(),
            cloud: CloudControl::default(),
        }
    }
}

impl Harness {
    /// Boot every module. Call from a `start_paused` tokio test.
    pub fn start(opts: HarnessOptions) -> Self {
        let settings = MemorySettingsStore::new();
        settings
            .save(DEVICE_SETTINGS_KEY, &opts.device.to_stored())
            .unwrap();
        let sensor = SensorControl::default();
        let leds = Arc::new(Mutex::new(Vec::new()));
        let t0 = Instant::now();
        let resets = RecordingReset::new(t0);
        let backends = Backends {
            modem: Box::new(MockModem),
            location: Box::new(MockLocation::new(opts.fix_after)),
            sensor: Box::new(MockSensor(sensor.clone())),
            ui: Box::new(MockUi(leds.clone())),
            transport: Box::new(MockTransport(opts.cloud.clone())),
            codec: Box::new(JsonCodec),
            clock: Box::new(MockClock),
            settings: Arc::new(settings.clone()),
            reset: Arc::new(resets.clone()),
        };
        let system = System::start(opts.runtime, backends).unwrap();
        let recorder = Recorder::attach(system.bus());
        Self {
            system,
            recorder,
            cloud: opts.cloud,
            sensor,
            leds,
            resets,
            settings,
            t0,
        }
    }

    /// Advance virtual time to `at` after boot.
    pub async fn run_until(&self, at: Duration) {
        tokio::time::sleep_until(self.t0 + at).await;
        // Let tasks woken at the deadline drain their mailboxes.
        for _ in 0..50 {
            tokio::task::yield_now().await;
        }
    }
}
