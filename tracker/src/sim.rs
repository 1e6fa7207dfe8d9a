//! Simulated collaborators for running the firmware image on a host.
//!
//! Every backend answers with plausible values derived from the uptime
//! clock, so consecutive samples differ without pulling in an RNG.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use tracker_common::error::DriverError;
use tracker_common::event::{
    Acceleration, AckMode, AgnssRequest, Battery, ButtonPress, CellularInfo, Environmental,
    GnssFix, ModemDynamic, ModemStatic, NeighborCell, OutboundPayload, SearchStats,
    ShutdownReason, uptime_ms,
};
use tracker_common::watchdog::{Watchdog, WatchdogError, WatchdogEvent, WatchdogHandler};
use tracker_core::ports::{
    CloudLink, CloudLocationResult, CloudTransport, DateTimeLink, DateTimeSource, LedPattern,
    LocationBackend, LocationLink, LocationMethod, LocationRequest, ModemBackend, ModemLink,
    SensorBackend, SensorLink, SystemReset, UiBackend, UiLink,
};

/// Time a simulated GNSS search needs for a fix.
const GNSS_SEARCH: Duration = Duration::from_secs(25);
const LTE_ATTACH: Duration = Duration::from_secs(2);
const CLOUD_HANDSHAKE: Duration = Duration::from_secs(1);
const MAX_WATCHDOG_HANDLERS: usize = 4;

fn wobble(period_ms: u64, span: f64) -> f64 {
    let phase = (uptime_ms() % period_ms) as f64 / period_ms as f64;
    (phase * std::f64::consts::TAU).sin() * span
}

// ─── Modem ──────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct SimModem {
    attach: Option<JoinHandle<()>>,
}

impl ModemBackend for SimModem {
    fn init(&mut self) -> Result<(), DriverError> {
        info!("Simulated modem ready");
        Ok(())
    }

    fn connect(&mut self, link: ModemLink) -> Result<(), DriverError> {
        self.attach = Some(tokio::spawn(async move {
            tokio::time::sleep(LTE_ATTACH).await;
            link.lte_connected();
        }));
        Ok(())
    }

    fn static_data(&mut self) -> Result<ModemStatic, DriverError> {
        Ok(ModemStatic {
            app_version: env!("CARGO_PKG_VERSION").to_string(),
            board_version: "sim".to_string(),
            modem_fw: "mfw_sim_1.0.0".to_string(),
            iccid: "8901000000000000000".to_string(),
            band: 20,
            nw_mode_ltem: true,
            nw_mode_nbiot: false,
            timestamp: uptime_ms(),
        })
    }

    fn dynamic_data(&mut self) -> Result<ModemDynamic, DriverError> {
        Ok(ModemDynamic {
            rsrp: -95 + wobble(60_000, 8.0) as i16,
            area_code: 2305,
            cell_id: 34_237_196,
            mccmnc: "24202".to_string(),
            ip_address: "10.0.0.42".to_string(),
            timestamp: uptime_ms(),
        })
    }

    fn battery(&mut self) -> Result<Battery, DriverError> {
        Ok(Battery {
            voltage_mv: (3_900.0 + wobble(600_000, 150.0)) as u16,
            timestamp: uptime_ms(),
        })
    }

    fn power_off(&mut self) -> Result<(), DriverError> {
        if let Some(attach) = self.attach.take() {
            attach.abort();
        }
        info!("Simulated modem powered off");
        Ok(())
    }
}

// ─── Location ───────────────────────────────────────────────────────

/// GNSS fixes after [`GNSS_SEARCH`]; cellular and Wi-Fi searches hand cell
/// measurements to the cloud and wait for its answer until the timeout.
#[derive(Default)]
pub struct SimLocation {
    search: Option<JoinHandle<()>>,
    link: Option<LocationLink>,
    /// A-GNSS is requested once per boot, like a cold receiver would.
    assisted: bool,
}

fn cells() -> CellularInfo {
    let mut neighbors = heapless::Vec::new();
    for (i, earfcn) in [6400u32, 6300].into_iter().enumerate() {
        let _ = neighbors.push(NeighborCell {
            earfcn,
            phys_cell_id: 100 + i as u16,
            rsrp: -100,
            rsrq: -10,
        });
    }
    CellularInfo {
        cell_id: 34_237_196,
        mcc: 242,
        mnc: 2,
        tac: 2305,
        neighbors,
        timestamp: uptime_ms(),
    }
}

impl LocationBackend for SimLocation {
    fn init(&mut self) -> Result<(), DriverError> {
        Ok(())
    }

    fn request(&mut self, request: LocationRequest, link: LocationLink) -> Result<(), DriverError> {
        let Some(first) = request.methods.first().copied() else {
            return Err(DriverError::NotSupported);
        };
        let timeout = request.timeout;
        if first == LocationMethod::Gnss && !self.assisted {
            self.assisted = true;
            link.agnss_needed(AgnssRequest {
                sv_mask_ephe: u32::MAX,
                sv_mask_alm: u32::MAX,
                utc: true,
                klobuchar: true,
                position: true,
                system_time: true,
            });
        }
        self.link = Some(link.clone());
        self.search = Some(tokio::spawn(async move {
            match first {
                LocationMethod::Gnss if GNSS_SEARCH < timeout => {
                    tokio::time::sleep(GNSS_SEARCH).await;
                    link.fix(GnssFix {
                        latitude: 63.4305 + wobble(3_600_000, 0.01),
                        longitude: 10.3951 + wobble(2_700_000, 0.01),
                        altitude: 40.0,
                        accuracy: 5.0,
                        speed: 0.0,
                        heading: 0.0,
                        satellites_tracked: 8,
                        search_time_ms: GNSS_SEARCH.as_millis() as u32,
                        timestamp: uptime_ms(),
                    });
                }
                LocationMethod::Gnss => {
                    tokio::time::sleep(timeout).await;
                    link.timeout(SearchStats {
                        search_time_ms: timeout.as_millis() as u32,
                        satellites_tracked: 2,
                    });
                }
                LocationMethod::Cellular | LocationMethod::Wifi => {
                    let scan = Duration::from_secs(3);
                    tokio::time::sleep(scan).await;
                    link.cloud_location_request(cells());
                    tokio::time::sleep(timeout.saturating_sub(scan)).await;
                    link.result_unknown();
                }
            }
        }));
        debug!("Simulated {first:?} search started");
        Ok(())
    }

    fn cancel(&mut self) -> Result<(), DriverError> {
        if let Some(search) = self.search.take() {
            search.abort();
        }
        self.link = None;
        Ok(())
    }

    fn cloud_location_result(&mut self, result: CloudLocationResult) -> Result<(), DriverError> {
        let link = self.link.take().ok_or(DriverError::NotConnected)?;
        if let Some(search) = self.search.take() {
            search.abort();
        }
        match result {
            CloudLocationResult::Success(location) => {
                info!(
                    "Cloud location {:.5},{:.5} (±{} m)",
                    location.latitude, location.longitude, location.accuracy
                );
                link.cloud_resolved();
            }
            CloudLocationResult::Error => link.failed(),
            CloudLocationResult::Unknown => link.result_unknown(),
        }
        Ok(())
    }
}

// ─── Sensor ─────────────────────────────────────────────────────────

/// Environmental sensor plus an accelerometer that optionally reports
/// movement at a fixed period.
#[derive(Debug)]
pub struct SimSensor {
    movement_every: Option<Duration>,
    threshold: f64,
    shaker: Option<JoinHandle<()>>,
}

impl SimSensor {
    pub fn new(movement_every: Option<Duration>) -> Self {
        Self {
            movement_every,
            threshold: 0.0,
            shaker: None,
        }
    }
}

impl SensorBackend for SimSensor {
    fn start(&mut self, link: SensorLink) -> Result<(), DriverError> {
        let Some(period) = self.movement_every else {
            return Ok(());
        };
        let magnitude = self.threshold + 1.0;
        self.shaker = Some(tokio::spawn(async move {
            let mut tick = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            loop {
                tick.tick().await;
                link.accelerometer_trigger(Acceleration {
                    values: [magnitude, 0.2, 9.81],
                    timestamp: uptime_ms(),
                });
            }
        }));
        Ok(())
    }

    fn environmental(&mut self) -> Result<Environmental, DriverError> {
        Ok(Environmental {
            temperature: 21.0 + wobble(1_800_000, 3.0),
            humidity: 45.0 + wobble(2_400_000, 10.0),
            timestamp: uptime_ms(),
        })
    }

    fn set_threshold(&mut self, threshold: f64) -> Result<(), DriverError> {
        debug!("Accelerometer threshold {threshold} m/s²");
        self.threshold = threshold;
        Ok(())
    }
}

impl Drop for SimSensor {
    fn drop(&mut self) {
        if let Some(shaker) = self.shaker.take() {
            shaker.abort();
        }
    }
}

// ─── UI ─────────────────────────────────────────────────────────────

/// Status LED printed to the log; every line on stdin is a button press.
#[derive(Debug, Default)]
pub struct SimUi {
    reader: Option<JoinHandle<()>>,
}

impl UiBackend for SimUi {
    fn start(&mut self, link: UiLink) -> Result<(), DriverError> {
        self.reader = Some(tokio::spawn(async move {
            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            while let Ok(Some(_)) = lines.next_line().await {
                link.button(ButtonPress {
                    button: 1,
                    timestamp: uptime_ms(),
                });
            }
        }));
        Ok(())
    }

    fn set_led(&mut self, pattern: LedPattern) -> Result<(), DriverError> {
        info!("LED: {pattern:?}");
        Ok(())
    }
}

impl Drop for SimUi {
    fn drop(&mut self) {
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
    }
}

// ─── Cloud ──────────────────────────────────────────────────────────

/// Transport that logs payloads instead of sending them.
#[derive(Default)]
pub struct LogTransport {
    link: Option<CloudLink>,
    sent: u64,
}

impl CloudTransport for LogTransport {
    fn connect(&mut self, link: CloudLink) -> Result<(), DriverError> {
        self.link = Some(link.clone());
        tokio::spawn(async move {
            tokio::time::sleep(CLOUD_HANDSHAKE).await;
            link.connected();
        });
        Ok(())
    }

    fn disconnect(&mut self) -> Result<(), DriverError> {
        if let Some(link) = self.link.take() {
            link.disconnected();
        }
        Ok(())
    }

    fn send(&mut self, payload: &OutboundPayload) -> Result<(), DriverError> {
        let link = self.link.as_ref().ok_or(DriverError::NotConnected)?;
        self.sent += 1;
        info!(
            "Cloud <- {:?} #{} ({} bytes, {} sent): {}",
            payload.kind,
            payload.id,
            payload.bytes.len(),
            self.sent,
            String::from_utf8_lossy(&payload.bytes)
        );
        if payload.ack == AckMode::Required {
            link.data_ack(payload.id, true);
        }
        Ok(())
    }

    fn request_config(&mut self) -> Result<(), DriverError> {
        let link = self.link.as_ref().ok_or(DriverError::NotConnected)?;
        link.config_empty();
        Ok(())
    }
}

// ─── Clock ──────────────────────────────────────────────────────────

/// Network time taken from the host clock after a short delay.
#[derive(Debug, Default)]
pub struct SimClock;

impl DateTimeSource for SimClock {
    fn update(&mut self, link: DateTimeLink) -> Result<(), DriverError> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| DriverError::Io(e.to_string()))?;
        tokio::spawn(async move {
            tokio::time::sleep(CLOUD_HANDSHAKE).await;
            link.obtained((now + CLOUD_HANDSHAKE).as_millis() as u64);
        });
        Ok(())
    }
}

// ─── Reset ──────────────────────────────────────────────────────────

/// Turns a reset into a message for the reboot loop in `main`.
pub struct ChannelReset(pub mpsc::UnboundedSender<ShutdownReason>);

impl SystemReset for ChannelReset {
    fn reboot(&self, reason: ShutdownReason) {
        if self.0.send(reason).is_err() {
            warn!("Reboot loop gone, reset ({reason:?}) dropped");
        }
    }
}

// ─── Watchdog ───────────────────────────────────────────────────────

/// Host stand-in for the hardware watchdog: installs a timeout and feeds
/// it periodically, notifying every registered handler.
#[derive(Default)]
pub struct SimWatchdog {
    handlers: Arc<Mutex<Vec<Arc<dyn WatchdogHandler>>>>,
}

impl Watchdog for SimWatchdog {
    fn register(&mut self, handler: Arc<dyn WatchdogHandler>) -> Result<(), WatchdogError> {
        let mut handlers = self.handlers.lock();
        if handlers.len() >= MAX_WATCHDOG_HANDLERS {
            return Err(WatchdogError::HandlersFull {
                max: MAX_WATCHDOG_HANDLERS,
            });
        }
        handlers.push(handler);
        Ok(())
    }
}

impl SimWatchdog {
    fn notify(handlers: &Mutex<Vec<Arc<dyn WatchdogHandler>>>, event: WatchdogEvent) {
        for handler in handlers.lock().iter() {
            handler.on_event(event);
        }
    }

    /// Install `timeout_ms` and feed at `feed_every` until the task is aborted.
    pub fn start(&self, timeout_ms: u64, feed_every: Duration) -> JoinHandle<()> {
        let handlers = Arc::clone(&self.handlers);
        Self::notify(&handlers, WatchdogEvent::Start);
        Self::notify(&handlers, WatchdogEvent::TimeoutInstalled(timeout_ms));
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(feed_every);
            loop {
                tick.tick().await;
                Self::notify(&handlers, WatchdogEvent::Feed);
            }
        })
    }
}
