//! Event model shared by every module.
//!
//! Each module family owns one enum ([`AppEvent`], [`DataEvent`], ...). The
//! bus carries the umbrella [`Event`] enum, so a payload is only reachable
//! through the variant that owns it.
//!
//! ```text
//! Event
//!  ├── App(AppEvent)            Start, DataGet, DataGetAll, ConfigGet, ...
//!  ├── Data(DataEvent)          ConfigInit, DataReady, DataSend, DateTimeObtained, ...
//!  ├── Cloud(CloudEvent)        Connected, ConfigReceived, DataAck, CloudLocation*, ...
//!  ├── Modem(ModemEvent)        LteConnected, *DataReady, *DataNotReady, ...
//!  ├── Location(LocationEvent)  Active, GnssDataReady, Timeout, AgnssNeeded, ...
//!  ├── Sensor(SensorEvent)      EnvironmentalDataReady, MovementDataReady, ...
//!  ├── Ui(UiEvent)              ButtonDataReady, ...
//!  └── Util(UtilEvent)          ShutdownRequest, Error
//! ```
//!
//! Every family except util carries `Error(ErrorCode)` and
//! `ShutdownReady(ModuleId)`; [`Event::error`] and [`Event::shutdown_ready`]
//! build them generically.

use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::consts::NEIGHBOR_CELLS_MAX;
use crate::device::{ConfigUpdate, DeviceConfig};
use crate::error::ErrorCode;

// ─── Identity ───────────────────────────────────────────────────────

/// Identifier handed out by the module registry. Zero is never issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ModuleId(pub u32);

impl std::fmt::Display for ModuleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Event family, one per module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Family {
    App,
    Data,
    Cloud,
    Modem,
    Location,
    Sensor,
    Ui,
    Util,
}

impl Family {
    /// All families in declaration order.
    pub const ALL: [Family; 8] = [
        Family::App,
        Family::Data,
        Family::Cloud,
        Family::Modem,
        Family::Location,
        Family::Sensor,
        Family::Ui,
        Family::Util,
    ];

    /// Lowercase family name, matches the module name.
    pub const fn name(self) -> &'static str {
        match self {
            Family::App => "app",
            Family::Data => "data",
            Family::Cloud => "cloud",
            Family::Modem => "modem",
            Family::Location => "location",
            Family::Sensor => "sensor",
            Family::Ui => "ui",
            Family::Util => "util",
        }
    }
}

/// Milliseconds since the first call in this process.
pub fn uptime_ms() -> u64 {
    static START: OnceLock<Instant> = OnceLock::new();
    START.get_or_init(Instant::now).elapsed().as_millis() as u64
}

// ─── Sampling request ───────────────────────────────────────────────

/// One kind of data that can be requested in a sampling cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataKind {
    ModemStatic,
    ModemDynamic,
    Battery,
    Environmental,
    Location,
}

impl DataKind {
    pub const ALL: [DataKind; 5] = [
        DataKind::ModemStatic,
        DataKind::ModemDynamic,
        DataKind::Battery,
        DataKind::Environmental,
        DataKind::Location,
    ];
}

bitflags! {
    /// Set of [`DataKind`]s.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct DataKinds: u8 {
        const MODEM_STATIC  = 0x01;
        const MODEM_DYNAMIC = 0x02;
        const BATTERY       = 0x04;
        const ENVIRONMENTAL = 0x08;
        const LOCATION      = 0x10;
    }
}

impl From<DataKind> for DataKinds {
    fn from(kind: DataKind) -> Self {
        match kind {
            DataKind::ModemStatic => DataKinds::MODEM_STATIC,
            DataKind::ModemDynamic => DataKinds::MODEM_DYNAMIC,
            DataKind::Battery => DataKinds::BATTERY,
            DataKind::Environmental => DataKinds::ENVIRONMENTAL,
            DataKind::Location => DataKinds::LOCATION,
        }
    }
}

impl DataKinds {
    /// True if `kind` is part of the set.
    pub fn includes(self, kind: DataKind) -> bool {
        self.contains(DataKinds::from(kind))
    }

    /// Members of the set as [`DataKind`]s.
    pub fn kinds(self) -> impl Iterator<Item = DataKind> {
        DataKind::ALL.into_iter().filter(move |k| self.includes(*k))
    }

    /// Number of kinds in the set.
    pub fn count(self) -> usize {
        self.bits().count_ones() as usize
    }
}

/// Fan-out request issued by the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataRequest {
    /// Kinds every responder should sample.
    pub kinds: DataKinds,
    /// Budget for the data module to collect every response.
    pub timeout: Duration,
}

// ─── Payloads ───────────────────────────────────────────────────────

/// Modem information that does not change between reboots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModemStatic {
    pub app_version: String,
    pub board_version: String,
    pub modem_fw: String,
    pub iccid: String,
    pub band: u8,
    pub nw_mode_ltem: bool,
    pub nw_mode_nbiot: bool,
    pub timestamp: u64,
}

/// Modem network information sampled every cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModemDynamic {
    pub rsrp: i16,
    pub area_code: u32,
    pub cell_id: u32,
    pub mccmnc: String,
    pub ip_address: String,
    pub timestamp: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Battery {
    pub voltage_mv: u16,
    pub timestamp: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Environmental {
    pub temperature: f64,
    pub humidity: f64,
    pub timestamp: u64,
}

/// Accelerometer reading in m/s².
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Acceleration {
    pub values: [f64; 3],
    pub timestamp: u64,
}

/// GNSS position fix.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GnssFix {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: f64,
    pub accuracy: f64,
    pub speed: f64,
    pub heading: f64,
    pub satellites_tracked: u8,
    pub search_time_ms: u32,
    pub timestamp: u64,
}

/// Statistics reported when a location search ends without a fix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SearchStats {
    pub search_time_ms: u32,
    pub satellites_tracked: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NeighborCell {
    pub earfcn: u32,
    pub phys_cell_id: u16,
    pub rsrp: i16,
    pub rsrq: i16,
}

/// Cell measurements the cloud resolves into a position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellularInfo {
    pub cell_id: u32,
    pub mcc: u16,
    pub mnc: u16,
    pub tac: u32,
    pub neighbors: heapless::Vec<NeighborCell, NEIGHBOR_CELLS_MAX>,
    pub timestamp: u64,
}

/// Position the cloud resolved from cell or Wi-Fi measurements.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CloudLocation {
    pub latitude: f64,
    pub longitude: f64,
    /// Radius in meters.
    pub accuracy: f64,
}

/// A-GNSS data the GNSS receiver is missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AgnssRequest {
    /// Bit `n` set: ephemeris for satellite `n + 1` needed.
    pub sv_mask_ephe: u32,
    /// Bit `n` set: almanac for satellite `n + 1` needed.
    pub sv_mask_alm: u32,
    pub utc: bool,
    pub klobuchar: bool,
    pub position: bool,
    pub system_time: bool,
}

/// P-GPS prediction set the GNSS receiver asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PgpsRequest {
    pub prediction_count: u16,
    pub prediction_period_min: u16,
    pub gps_day: u16,
    pub gps_time_of_day: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ButtonPress {
    pub button: u8,
    pub timestamp: u64,
}

/// Wall-clock time paired with the uptime it was read at.
///
/// Samples are stamped with uptime; this maps them to Unix time once the
/// clock is known.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeSync {
    pub unix_ms: u64,
    pub uptime_ms: u64,
}

impl TimeSync {
    /// Unix time in milliseconds of an uptime timestamp.
    pub fn to_unix(&self, uptime_ms: u64) -> u64 {
        self.unix_ms
            .saturating_sub(self.uptime_ms)
            .saturating_add(uptime_ms)
    }
}

/// What an encoded payload contains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PayloadKind {
    Data,
    Batch,
    Ui,
    Config,
}

/// Whether the transport must confirm delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckMode {
    Required,
    Disabled,
}

/// Encoded buffer on its way to the cloud transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundPayload {
    pub id: u32,
    pub kind: PayloadKind,
    pub bytes: Arc<[u8]>,
    pub ack: AckMode,
}

/// Why the device is going down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShutdownReason {
    /// An irrecoverable error was reported by some module.
    Generic,
    /// A firmware update finished and needs a reboot to apply.
    Fota,
}

// ─── Family events ──────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    Start,
    DataGet(DataRequest),
    /// Sampling trigger fired by an app timer.
    DataGetAll,
    ConfigGet,
    Error(ErrorCode),
    ShutdownReady(ModuleId),
}

#[derive(Debug, Clone, PartialEq)]
pub enum DataEvent {
    ConfigInit(DeviceConfig),
    ConfigReady(DeviceConfig),
    ConfigGet,
    ConfigSend(OutboundPayload),
    /// Fan-in for `cycle` completed (all responses or timeout).
    DataReady { cycle: u32 },
    /// Fan-in budget for `cycle` elapsed.
    CollectionTimeout { cycle: u32 },
    DataSend(OutboundPayload),
    DataSendBatch(OutboundPayload),
    UiDataReady,
    UiDataSend(OutboundPayload),
    /// Wall-clock time became available; sample uploads may start.
    DateTimeObtained(TimeSync),
    Error(ErrorCode),
    ShutdownReady(ModuleId),
}

#[derive(Debug, Clone, PartialEq)]
pub enum CloudEvent {
    Connecting,
    Connected,
    Disconnected,
    /// Reconnect backoff elapsed.
    ConnectionTimeout,
    ConfigReceived(ConfigUpdate),
    ConfigEmpty,
    DataAck { id: u32, sent: bool },
    FotaDone,
    /// The cloud resolved the cell measurements of a location search.
    CloudLocationReceived(CloudLocation),
    CloudLocationError,
    /// The cloud could not place the measurements.
    CloudLocationUnknown,
    Error(ErrorCode),
    ShutdownReady(ModuleId),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ModemEvent {
    Initialized,
    LteConnecting,
    LteConnected,
    LteDisconnected,
    StaticDataReady(ModemStatic),
    StaticDataNotReady,
    DynamicDataReady(ModemDynamic),
    DynamicDataNotReady,
    BatteryDataReady(Battery),
    BatteryDataNotReady,
    Error(ErrorCode),
    ShutdownReady(ModuleId),
}

#[derive(Debug, Clone, PartialEq)]
pub enum LocationEvent {
    Active,
    Inactive,
    GnssDataReady(GnssFix),
    DataNotReady,
    Timeout(SearchStats),
    CloudLocationDataReady(CellularInfo),
    AgnssNeeded(AgnssRequest),
    PgpsNeeded(PgpsRequest),
    Error(ErrorCode),
    ShutdownReady(ModuleId),
}

#[derive(Debug, Clone, PartialEq)]
pub enum SensorEvent {
    /// Raw accelerometer trigger from the driver.
    AccelerometerTrigger(Acceleration),
    MovementDataReady(Acceleration),
    ActivityDetected,
    EnvironmentalDataReady(Environmental),
    EnvironmentalNotSupported,
    Error(ErrorCode),
    ShutdownReady(ModuleId),
}

#[derive(Debug, Clone, PartialEq)]
pub enum UiEvent {
    ButtonDataReady(ButtonPress),
    Error(ErrorCode),
    ShutdownReady(ModuleId),
}

#[derive(Debug, Clone, PartialEq)]
pub enum UtilEvent {
    ShutdownRequest(ShutdownReason),
    Error(ErrorCode),
}

// ─── Names ──────────────────────────────────────────────────────────

macro_rules! impl_event_names {
    ($ty:ident { $($pat:pat => $name:literal),* $(,)? }) => {
        impl $ty {
            /// Upper-case event name used in logs.
            pub const fn name(&self) -> &'static str {
                match self {
                    $($pat => $name,)*
                }
            }
        }
    };
}

impl_event_names!(AppEvent {
    AppEvent::Start => "APP_EVT_START",
    AppEvent::DataGet(_) => "APP_EVT_DATA_GET",
    AppEvent::DataGetAll => "APP_EVT_DATA_GET_ALL",
    AppEvent::ConfigGet => "APP_EVT_CONFIG_GET",
    AppEvent::Error(_) => "APP_EVT_ERROR",
    AppEvent::ShutdownReady(_) => "APP_EVT_SHUTDOWN_READY",
});
impl_event_names!(DataEvent {
    DataEvent::ConfigInit(_) => "DATA_EVT_CONFIG_INIT",
    DataEvent::ConfigReady(_) => "DATA_EVT_CONFIG_READY",
    DataEvent::ConfigGet => "DATA_EVT_CONFIG_GET",
    DataEvent::ConfigSend(_) => "DATA_EVT_CONFIG_SEND",
    DataEvent::DataReady { .. } => "DATA_EVT_DATA_READY",
    DataEvent::CollectionTimeout { .. } => "DATA_EVT_COLLECTION_TIMEOUT",
    DataEvent::DataSend(_) => "DATA_EVT_DATA_SEND",
    DataEvent::DataSendBatch(_) => "DATA_EVT_DATA_SEND_BATCH",
    DataEvent::UiDataReady => "DATA_EVT_UI_DATA_READY",
    DataEvent::UiDataSend(_) => "DATA_EVT_UI_DATA_SEND",
    DataEvent::DateTimeObtained(_) => "DATA_EVT_DATE_TIME_OBTAINED",
    DataEvent::Error(_) => "DATA_EVT_ERROR",
    DataEvent::ShutdownReady(_) => "DATA_EVT_SHUTDOWN_READY",
});
impl_event_names!(CloudEvent {
    CloudEvent::Connecting => "CLOUD_EVT_CONNECTING",
    CloudEvent::Connected => "CLOUD_EVT_CONNECTED",
    CloudEvent::Disconnected => "CLOUD_EVT_DISCONNECTED",
    CloudEvent::ConnectionTimeout => "CLOUD_EVT_CONNECTION_TIMEOUT",
    CloudEvent::ConfigReceived(_) => "CLOUD_EVT_CONFIG_RECEIVED",
    CloudEvent::ConfigEmpty => "CLOUD_EVT_CONFIG_EMPTY",
    CloudEvent::DataAck { .. } => "CLOUD_EVT_DATA_ACK",
    CloudEvent::FotaDone => "CLOUD_EVT_FOTA_DONE",
    CloudEvent::CloudLocationReceived(_) => "CLOUD_EVT_CLOUD_LOCATION_RECEIVED",
    CloudEvent::CloudLocationError => "CLOUD_EVT_CLOUD_LOCATION_ERROR",
    CloudEvent::CloudLocationUnknown => "CLOUD_EVT_CLOUD_LOCATION_UNKNOWN",
    CloudEvent::Error(_) => "CLOUD_EVT_ERROR",
    CloudEvent::ShutdownReady(_) => "CLOUD_EVT_SHUTDOWN_READY",
});
impl_event_names!(ModemEvent {
    ModemEvent::Initialized => "MODEM_EVT_INITIALIZED",
    ModemEvent::LteConnecting => "MODEM_EVT_LTE_CONNECTING",
    ModemEvent::LteConnected => "MODEM_EVT_LTE_CONNECTED",
    ModemEvent::LteDisconnected => "MODEM_EVT_LTE_DISCONNECTED",
    ModemEvent::StaticDataReady(_) => "MODEM_EVT_STATIC_DATA_READY",
    ModemEvent::StaticDataNotReady => "MODEM_EVT_STATIC_DATA_NOT_READY",
    ModemEvent::DynamicDataReady(_) => "MODEM_EVT_DYNAMIC_DATA_READY",
    ModemEvent::DynamicDataNotReady => "MODEM_EVT_DYNAMIC_DATA_NOT_READY",
    ModemEvent::BatteryDataReady(_) => "MODEM_EVT_BATTERY_DATA_READY",
    ModemEvent::BatteryDataNotReady => "MODEM_EVT_BATTERY_DATA_NOT_READY",
    ModemEvent::Error(_) => "MODEM_EVT_ERROR",
    ModemEvent::ShutdownReady(_) => "MODEM_EVT_SHUTDOWN_READY",
});
impl_event_names!(LocationEvent {
    LocationEvent::Active => "LOCATION_EVT_ACTIVE",
    LocationEvent::Inactive => "LOCATION_EVT_INACTIVE",
    LocationEvent::GnssDataReady(_) => "LOCATION_EVT_GNSS_DATA_READY",
    LocationEvent::DataNotReady => "LOCATION_EVT_DATA_NOT_READY",
    LocationEvent::Timeout(_) => "LOCATION_EVT_TIMEOUT",
    LocationEvent::CloudLocationDataReady(_) => "LOCATION_EVT_CLOUD_LOCATION_DATA_READY",
    LocationEvent::AgnssNeeded(_) => "LOCATION_EVT_AGNSS_NEEDED",
    LocationEvent::PgpsNeeded(_) => "LOCATION_EVT_PGPS_NEEDED",
    LocationEvent::Error(_) => "LOCATION_EVT_ERROR",
    LocationEvent::ShutdownReady(_) => "LOCATION_EVT_SHUTDOWN_READY",
});
impl_event_names!(SensorEvent {
    SensorEvent::AccelerometerTrigger(_) => "SENSOR_EVT_ACCELEROMETER_TRIGGER",
    SensorEvent::MovementDataReady(_) => "SENSOR_EVT_MOVEMENT_DATA_READY",
    SensorEvent::ActivityDetected => "SENSOR_EVT_ACTIVITY_DETECTED",
    SensorEvent::EnvironmentalDataReady(_) => "SENSOR_EVT_ENVIRONMENTAL_DATA_READY",
    SensorEvent::EnvironmentalNotSupported => "SENSOR_EVT_ENVIRONMENTAL_NOT_SUPPORTED",
    SensorEvent::Error(_) => "SENSOR_EVT_ERROR",
    SensorEvent::ShutdownReady(_) => "SENSOR_EVT_SHUTDOWN_READY",
});
impl_event_names!(UiEvent {
    UiEvent::ButtonDataReady(_) => "UI_EVT_BUTTON_DATA_READY",
    UiEvent::Error(_) => "UI_EVT_ERROR",
    UiEvent::ShutdownReady(_) => "UI_EVT_SHUTDOWN_READY",
});
impl_event_names!(UtilEvent {
    UtilEvent::ShutdownRequest(_) => "UTIL_EVT_SHUTDOWN_REQUEST",
    UtilEvent::Error(_) => "UTIL_EVT_ERROR",
});

// ─── Umbrella ───────────────────────────────────────────────────────

/// Any event that can travel on the bus.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    App(AppEvent),
    Data(DataEvent),
    Cloud(CloudEvent),
    Modem(ModemEvent),
    Location(LocationEvent),
    Sensor(SensorEvent),
    Ui(UiEvent),
    Util(UtilEvent),
}

macro_rules! impl_from_family {
    ($($variant:ident($ty:ty)),* $(,)?) => {
        $(
            impl From<$ty> for Event {
                fn from(ev: $ty) -> Self {
                    Event::$variant(ev)
                }
            }
        )*
    };
}

impl_from_family!(
    App(AppEvent),
    Data(DataEvent),
    Cloud(CloudEvent),
    Modem(ModemEvent),
    Location(LocationEvent),
    Sensor(SensorEvent),
    Ui(UiEvent),
    Util(UtilEvent),
);

impl Event {
    /// Family the event belongs to.
    pub const fn family(&self) -> Family {
        match self {
            Event::App(_) => Family::App,
            Event::Data(_) => Family::Data,
            Event::Cloud(_) => Family::Cloud,
            Event::Modem(_) => Family::Modem,
            Event::Location(_) => Family::Location,
            Event::Sensor(_) => Family::Sensor,
            Event::Ui(_) => Family::Ui,
            Event::Util(_) => Family::Util,
        }
    }

    /// Upper-case event name used in logs, e.g. `APP_EVT_DATA_GET`.
    pub const fn name(&self) -> &'static str {
        match self {
            Event::App(ev) => ev.name(),
            Event::Data(ev) => ev.name(),
            Event::Cloud(ev) => ev.name(),
            Event::Modem(ev) => ev.name(),
            Event::Location(ev) => ev.name(),
            Event::Sensor(ev) => ev.name(),
            Event::Ui(ev) => ev.name(),
            Event::Util(ev) => ev.name(),
        }
    }

    /// `Error` event of the given family.
    pub fn error(family: Family, code: ErrorCode) -> Event {
        match family {
            Family::App => AppEvent::Error(code).into(),
            Family::Data => DataEvent::Error(code).into(),
            Family::Cloud => CloudEvent::Error(code).into(),
            Family::Modem => ModemEvent::Error(code).into(),
            Family::Location => LocationEvent::Error(code).into(),
            Family::Sensor => SensorEvent::Error(code).into(),
            Family::Ui => UiEvent::Error(code).into(),
            Family::Util => UtilEvent::Error(code).into(),
        }
    }

    /// Shutdown acknowledgment of the given family. Util never acknowledges.
    pub fn shutdown_ready(family: Family, id: ModuleId) -> Option<Event> {
        let event = match family {
            Family::App => AppEvent::ShutdownReady(id).into(),
            Family::Data => DataEvent::ShutdownReady(id).into(),
            Family::Cloud => CloudEvent::ShutdownReady(id).into(),
            Family::Modem => ModemEvent::ShutdownReady(id).into(),
            Family::Location => LocationEvent::ShutdownReady(id).into(),
            Family::Sensor => SensorEvent::ShutdownReady(id).into(),
            Family::Ui => UiEvent::ShutdownReady(id).into(),
            Family::Util => return None,
        };
        Some(event)
    }

    /// Error code if this is an `Error` event of any family.
    pub fn as_error(&self) -> Option<ErrorCode> {
        match self {
            Event::App(AppEvent::Error(code))
            | Event::Data(DataEvent::Error(code))
            | Event::Cloud(CloudEvent::Error(code))
            | Event::Modem(ModemEvent::Error(code))
            | Event::Location(LocationEvent::Error(code))
            | Event::Sensor(SensorEvent::Error(code))
            | Event::Ui(UiEvent::Error(code))
            | Event::Util(UtilEvent::Error(code)) => Some(*code),
            _ => None,
        }
    }

    /// Acknowledging module if this is a `ShutdownReady` event.
    pub fn as_shutdown_ready(&self) -> Option<ModuleId> {
        match self {
            Event::App(AppEvent::ShutdownReady(id))
            | Event::Data(DataEvent::ShutdownReady(id))
            | Event::Cloud(CloudEvent::ShutdownReady(id))
            | Event::Modem(ModemEvent::ShutdownReady(id))
            | Event::Location(LocationEvent::ShutdownReady(id))
            | Event::Sensor(SensorEvent::ShutdownReady(id))
            | Event::Ui(UiEvent::ShutdownReady(id)) => Some(*id),
            _ => None,
        }
    }

    /// Error and shutdown traffic, allowed to use the pool reserve.
    pub fn is_control(&self) -> bool {
        self.as_error().is_some()
            || self.as_shutdown_ready().is_some()
            || matches!(self, Event::Util(UtilEvent::ShutdownRequest(_)))
    }

    /// Data kind answered by this event, if it is a sampling response.
    ///
    /// `NotReady`, `NotSupported` and location timeouts count as answers so a
    /// cycle always completes.
    pub fn answered_kind(&self) -> Option<DataKind> {
        match self {
            Event::Modem(ModemEvent::StaticDataReady(_) | ModemEvent::StaticDataNotReady) => {
                Some(DataKind::ModemStatic)
            }
            Event::Modem(ModemEvent::DynamicDataReady(_) | ModemEvent::DynamicDataNotReady) => {
                Some(DataKind::ModemDynamic)
            }
            Event::Modem(ModemEvent::BatteryDataReady(_) | ModemEvent::BatteryDataNotReady) => {
                Some(DataKind::Battery)
            }
            Event::Sensor(
                SensorEvent::EnvironmentalDataReady(_) | SensorEvent::EnvironmentalNotSupported,
            ) => Some(DataKind::Environmental),
            Event::Location(
                LocationEvent::GnssDataReady(_)
                | LocationEvent::DataNotReady
                | LocationEvent::Timeout(_)
                | LocationEvent::CloudLocationDataReady(_),
            ) => Some(DataKind::Location),
            _ => None,
        }
    }
}
