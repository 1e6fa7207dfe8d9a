//! External collaborators.
//!
//! Each backend is owned by exactly one module and called from that
//! module's task. Asynchronous results come back through a *link*: a small
//! cloneable handle that turns driver callbacks into bus events.
//!
//! | Backend            | Owner    | Link           |
//! |--------------------|----------|----------------|
//! | [`ModemBackend`]   | modem    | [`ModemLink`]  |
//! | [`LocationBackend`]| location | [`LocationLink`] |
//! | [`SensorBackend`]  | sensor   | [`SensorLink`] |
//! | [`UiBackend`]      | ui       | [`UiLink`]     |
//! | [`CloudTransport`] | cloud    | [`CloudLink`]  |
//! | [`DateTimeSource`] | data     | [`DateTimeLink`] |
//! | [`SystemReset`]    | util     | none           |

use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use tracker_common::device::ConfigUpdate;
use tracker_common::error::DriverError;
use tracker_common::event::{
    Acceleration, AgnssRequest, Battery, ButtonPress, CellularInfo, CloudEvent, CloudLocation,
    DataEvent, Environmental, Event, GnssFix, LocationEvent, ModemDynamic, ModemEvent,
    ModemStatic, OutboundPayload, PgpsRequest, SearchStats, SensorEvent, ShutdownReason, TimeSync,
    UiEvent, uptime_ms,
};

use crate::bus::Bus;

fn publish(bus: &Bus, event: impl Into<Event>) {
    if let Err(e) = bus.publish(event) {
        warn!("Link event dropped: {e}");
    }
}

// ─── Modem ──────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct ModemLink {
    bus: Arc<Bus>,
}

impl ModemLink {
    pub fn new(bus: Arc<Bus>) -> Self {
        Self { bus }
    }

    pub fn lte_connected(&self) {
        publish(&self.bus, ModemEvent::LteConnected);
    }

    pub fn lte_disconnected(&self) {
        publish(&self.bus, ModemEvent::LteDisconnected);
    }
}

pub trait ModemBackend: Send + 'static {
    fn init(&mut self) -> Result<(), DriverError>;

    /// Start network attach. Completion is reported through `link`.
    fn connect(&mut self, link: ModemLink) -> Result<(), DriverError>;

    fn static_data(&mut self) -> Result<ModemStatic, DriverError>;

    fn dynamic_data(&mut self) -> Result<ModemDynamic, DriverError>;

    fn battery(&mut self) -> Result<Battery, DriverError>;

    fn power_off(&mut self) -> Result<(), DriverError>;
}

// ─── Location ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocationMethod {
    Gnss,
    Cellular,
    Wifi,
}

/// Parameters of one location search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocationRequest {
    /// Methods in priority order.
    pub methods: heapless::Vec<LocationMethod, 3>,
    pub timeout: Duration,
}

#[derive(Clone)]
pub struct LocationLink {
    bus: Arc<Bus>,
}

impl LocationLink {
    pub fn new(bus: Arc<Bus>) -> Self {
        Self { bus }
    }

    /// Search ended with a fix.
    pub fn fix(&self, fix: GnssFix) {
        publish(&self.bus, LocationEvent::GnssDataReady(fix));
        publish(&self.bus, LocationEvent::Inactive);
    }

    /// Search ran out of time.
    pub fn timeout(&self, stats: SearchStats) {
        publish(&self.bus, LocationEvent::Timeout(stats));
        publish(&self.bus, LocationEvent::Inactive);
    }

    /// Search failed without a result.
    pub fn failed(&self) {
        publish(&self.bus, LocationEvent::DataNotReady);
        publish(&self.bus, LocationEvent::Inactive);
    }

    /// Search completed after a cloud location request without a local result.
    pub fn result_unknown(&self) {
        publish(&self.bus, LocationEvent::Inactive);
    }

    /// Search ended with a position resolved by the cloud. The cell
    /// measurements were already reported, so only the search ends.
    pub fn cloud_resolved(&self) {
        publish(&self.bus, LocationEvent::Inactive);
    }

    /// Backend needs the cloud to resolve cell measurements. The search
    /// stays active.
    pub fn cloud_location_request(&self, cells: CellularInfo) {
        publish(&self.bus, LocationEvent::CloudLocationDataReady(cells));
    }

    /// GNSS receiver is missing A-GNSS data.
    pub fn agnss_needed(&self, request: AgnssRequest) {
        publish(&self.bus, LocationEvent::AgnssNeeded(request));
    }

    /// GNSS receiver is missing P-GPS predictions.
    pub fn pgps_needed(&self, request: PgpsRequest) {
        publish(&self.bus, LocationEvent::PgpsNeeded(request));
    }
}

/// Cloud answer to a cloud location request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CloudLocationResult {
    Success(CloudLocation),
    Error,
    Unknown,
}

impl CloudLocationResult {
    /// Result carried by a cloud event, if any.
    pub fn from_event(event: &CloudEvent) -> Option<Self> {
        match event {
            CloudEvent::CloudLocationReceived(location) => Some(Self::Success(*location)),
            CloudEvent::CloudLocationError => Some(Self::Error),
            CloudEvent::CloudLocationUnknown => Some(Self::Unknown),
            _ => None,
        }
    }
}

pub trait LocationBackend: Send + 'static {
    fn init(&mut self) -> Result<(), DriverError>;

    /// Start a search. Results arrive through `link`.
    fn request(&mut self, request: LocationRequest, link: LocationLink) -> Result<(), DriverError>;

    fn cancel(&mut self) -> Result<(), DriverError>;

    /// Hand the cloud's answer to the search waiting on it.
    fn cloud_location_result(&mut self, result: CloudLocationResult) -> Result<(), DriverError>;
}

// ─── Sensors ────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct SensorLink {
    bus: Arc<Bus>,
}

impl SensorLink {
    pub fn new(bus: Arc<Bus>) -> Self {
        Self { bus }
    }

    /// Accelerometer crossed the activity threshold.
    pub fn accelerometer_trigger(&self, values: Acceleration) {
        publish(&self.bus, SensorEvent::AccelerometerTrigger(values));
    }
}

pub trait SensorBackend: Send + 'static {
    /// Enable interrupts. Triggers arrive through `link`.
    fn start(&mut self, link: SensorLink) -> Result<(), DriverError>;

    /// `DriverError::NotSupported` if the board has no environmental sensor.
    fn environmental(&mut self) -> Result<Environmental, DriverError>;

    /// Threshold in m/s².
    fn set_threshold(&mut self, threshold: f64) -> Result<(), DriverError>;
}

// ─── UI ─────────────────────────────────────────────────────────────

/// LED indication for the current device state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedPattern {
    Off,
    LteConnecting,
    CloudConnecting,
    LocationSearching,
    ActiveMode,
    PassiveMode,
    ErrorSystemFault,
    FotaUpdateReboot,
}

#[derive(Clone)]
pub struct UiLink {
    bus: Arc<Bus>,
}

impl UiLink {
    pub fn new(bus: Arc<Bus>) -> Self {
        Self { bus }
    }

    pub fn button(&self, press: ButtonPress) {
        publish(&self.bus, UiEvent::ButtonDataReady(press));
    }
}

pub trait UiBackend: Send + 'static {
    fn start(&mut self, link: UiLink) -> Result<(), DriverError>;

    fn set_led(&mut self, pattern: LedPattern) -> Result<(), DriverError>;
}

// ─── Cloud ──────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct CloudLink {
    bus: Arc<Bus>,
}

impl CloudLink {
    pub fn new(bus: Arc<Bus>) -> Self {
        Self { bus }
    }

    pub fn connected(&self) {
        publish(&self.bus, CloudEvent::Connected);
    }

    pub fn disconnected(&self) {
        publish(&self.bus, CloudEvent::Disconnected);
    }

    pub fn config_received(&self, update: ConfigUpdate) {
        publish(&self.bus, CloudEvent::ConfigReceived(update));
    }

    pub fn config_empty(&self) {
        publish(&self.bus, CloudEvent::ConfigEmpty);
    }

    /// Delivery result for a payload sent with `AckMode::Required`.
    pub fn data_ack(&self, id: u32, sent: bool) {
        publish(&self.bus, CloudEvent::DataAck { id, sent });
    }

    pub fn fota_done(&self) {
        publish(&self.bus, CloudEvent::FotaDone);
    }

    pub fn cloud_location(&self, result: CloudLocationResult) {
        let event = match result {
            CloudLocationResult::Success(location) => CloudEvent::CloudLocationReceived(location),
            CloudLocationResult::Error => CloudEvent::CloudLocationError,
            CloudLocationResult::Unknown => CloudEvent::CloudLocationUnknown,
        };
        publish(&self.bus, event);
    }
}

pub trait CloudTransport: Send + 'static {
    /// Start connecting. The result arrives through `link`.
    fn connect(&mut self, link: CloudLink) -> Result<(), DriverError>;

    fn disconnect(&mut self) -> Result<(), DriverError>;

    /// Hand an encoded payload to the transport.
    fn send(&mut self, payload: &OutboundPayload) -> Result<(), DriverError>;

    /// Ask the cloud for the device configuration.
    fn request_config(&mut self) -> Result<(), DriverError>;
}

// ─── Date and time ──────────────────────────────────────────────────

#[derive(Clone)]
pub struct DateTimeLink {
    bus: Arc<Bus>,
}

impl DateTimeLink {
    pub fn new(bus: Arc<Bus>) -> Self {
        Self { bus }
    }

    /// Wall-clock time is now `unix_ms`.
    pub fn obtained(&self, unix_ms: u64) {
        let sync = TimeSync {
            unix_ms,
            uptime_ms: uptime_ms(),
        };
        publish(&self.bus, DataEvent::DateTimeObtained(sync));
    }
}

/// Network or NTP time.
pub trait DateTimeSource: Send + 'static {
    /// Start obtaining the time. The result arrives through `link`.
    fn update(&mut self, link: DateTimeLink) -> Result<(), DriverError>;
}

// ─── Reset ──────────────────────────────────────────────────────────

pub trait SystemReset: Send + Sync + 'static {
    fn reboot(&self, reason: ShutdownReason);
}
