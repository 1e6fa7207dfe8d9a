//! Prelude module for common re-exports.
//!
//! ```rust
//! use tracker_common::prelude::*;
//! ```

// ─── Logging ────────────────────────────────────────────────────────
pub use crate::config::LogLevel;

// ─── Configuration ──────────────────────────────────────────────────
pub use crate::config::{ConfigError, ConfigLoader, SharedConfig, TrackerConfig};
pub use crate::device::{ConfigUpdate, DeviceConfig, NoDataFlags};

// ─── Errors ─────────────────────────────────────────────────────────
pub use crate::error::{DriverError, ErrorCode};

// ─── Events ─────────────────────────────────────────────────────────
pub use crate::event::{
    AppEvent, CloudEvent, DataEvent, DataKind, DataKinds, DataRequest, Event, Family,
    LocationEvent, ModemEvent, ModuleId, SensorEvent, ShutdownReason, UiEvent, UtilEvent,
};

// ─── Persistence ────────────────────────────────────────────────────
pub use crate::settings::{SettingsError, SettingsStore};
