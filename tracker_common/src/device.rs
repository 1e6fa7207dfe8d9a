//! Device configuration record.
//!
//! The record is owned by the data module. Everyone else receives copies
//! inside `ConfigInit` / `ConfigReady` events and treats them as read-only.
//!
//! Incoming cloud updates are partial ([`ConfigUpdate`]) and carry signed
//! values. Each field is range checked on its own: an out-of-range value is
//! rejected and the stale value kept, the rest of the update still applies.

use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use crate::consts::ACCELEROMETER_S_M2_MAX;

/// Location sources the cloud may switch off at run time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NoDataFlags {
    /// GNSS disabled.
    pub gnss: bool,
    /// Neighbor cell (cellular) positioning disabled.
    pub neighbor_cell: bool,
    /// Wi-Fi positioning disabled.
    pub wifi: bool,
}

impl NoDataFlags {
    /// True if at least one location method is still enabled.
    pub const fn any_location_enabled(&self) -> bool {
        !(self.gnss && self.neighbor_cell && self.wifi)
    }
}

/// Device configuration, versioned on every accepted change.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Incremented whenever an update changes the record.
    pub version: u32,
    /// Active (periodic) or passive (movement driven) sampling.
    pub active_mode: bool,
    /// Seconds between samples in active mode.
    pub active_wait_timeout: u32,
    /// Minimum seconds between movement-triggered samples in passive mode.
    pub movement_resolution: u32,
    /// Seconds between samples in passive mode when no movement occurs.
    pub movement_timeout: u32,
    /// Seconds allowed for a location search.
    pub location_timeout: u32,
    /// Accelerometer activity threshold in m/s².
    pub accelerometer_threshold: f64,
    /// Run-time data source opt-outs.
    pub no_data: NoDataFlags,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            version: 0,
            active_mode: true,
            active_wait_timeout: 120,
            movement_resolution: 120,
            movement_timeout: 3600,
            location_timeout: 300,
            accelerometer_threshold: 10.0,
            no_data: NoDataFlags::default(),
        }
    }
}

/// Partial configuration as received from the cloud.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ConfigUpdate {
    pub active_mode: Option<bool>,
    pub active_wait_timeout: Option<i64>,
    pub movement_resolution: Option<i64>,
    pub movement_timeout: Option<i64>,
    pub location_timeout: Option<i64>,
    pub accelerometer_threshold: Option<f64>,
    pub no_data: Option<NoDataFlags>,
}

/// Outcome of [`DeviceConfig::apply_update`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConfigDiff {
    /// At least one field changed.
    pub changed: bool,
    /// Names of fields whose new value was out of range.
    pub rejected: Vec<&'static str>,
}

impl DeviceConfig {
    /// Check every field against its range.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.active_wait_timeout == 0 {
            return Err("active_wait_timeout");
        }
        if self.movement_resolution == 0 {
            return Err("movement_resolution");
        }
        if self.movement_timeout == 0 {
            return Err("movement_timeout");
        }
        if self.location_timeout == 0 {
            return Err("location_timeout");
        }
        if !threshold_in_range(self.accelerometer_threshold) {
            return Err("accelerometer_threshold");
        }
        Ok(())
    }

    /// Decode a persisted record. Garbage or out-of-range records yield defaults.
    pub fn from_stored(bytes: &[u8]) -> Self {
        match serde_json::from_slice::<DeviceConfig>(bytes) {
            Ok(cfg) => match cfg.validate() {
                Ok(()) => cfg,
                Err(field) => {
                    warn!("Stored configuration rejected ({field} out of range), using defaults");
                    Self::default()
                }
            },
            Err(e) => {
                warn!("Stored configuration unreadable ({e}), using defaults");
                Self::default()
            }
        }
    }

    /// Encode for the settings store.
    pub fn to_stored(&self) -> Vec<u8> {
        // Serializing a plain struct of numbers and bools cannot fail.
        serde_json::to_vec(self).unwrap_or_default()
    }

    /// Apply a validated subset of `update`.
    pub fn apply_update(&mut self, update: &ConfigUpdate) -> ConfigDiff {
        let mut diff = ConfigDiff::default();

        if let Some(active) = update.active_mode {
            if active != self.active_mode {
                self.active_mode = active;
                warn!("New device mode: {}", if active { "Active" } else { "Passive" });
                diff.changed = true;
            }
        }

        apply_seconds(
            &mut self.active_wait_timeout,
            update.active_wait_timeout,
            "active_wait_timeout",
            &mut diff,
        );
        apply_seconds(
            &mut self.movement_resolution,
            update.movement_resolution,
            "movement_resolution",
            &mut diff,
        );
        apply_seconds(
            &mut self.movement_timeout,
            update.movement_timeout,
            "movement_timeout",
            &mut diff,
        );
        apply_seconds(
            &mut self.location_timeout,
            update.location_timeout,
            "location_timeout",
            &mut diff,
        );

        if let Some(threshold) = update.accelerometer_threshold {
            if threshold_in_range(threshold) {
                if threshold != self.accelerometer_threshold {
                    self.accelerometer_threshold = threshold;
                    warn!("New accelerometer threshold: {threshold}");
                    diff.changed = true;
                }
            } else {
                error!("New accelerometer threshold out of range: {threshold}");
                diff.rejected.push("accelerometer_threshold");
            }
        }

        if let Some(no_data) = update.no_data {
            if no_data != self.no_data {
                self.no_data = no_data;
                warn!("New no-data flags: {no_data:?}");
                diff.changed = true;
            }
        }

        if diff.changed {
            self.version = self.version.wrapping_add(1);
        }
        diff
    }
}

fn threshold_in_range(value: f64) -> bool {
    value.is_finite() && value > 0.0 && value < ACCELEROMETER_S_M2_MAX
}

fn apply_seconds(slot: &mut u32, value: Option<i64>, name: &'static str, diff: &mut ConfigDiff) {
    let Some(value) = value else {
        return;
    };
    match u32::try_from(value) {
        Ok(secs) if secs > 0 => {
            if *slot != secs {
                *slot = secs;
                warn!("New {name}: {secs}");
                diff.changed = true;
            }
        }
        _ => {
            error!("New {name} out of range: {value}");
            diff.rejected.push(name);
        }
    }
}
