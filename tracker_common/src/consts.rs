//! System-wide constants for the tracker workspace.
//!
//! Single source of truth for queue sizes, timing defaults and the cloud
//! reconnect table. Imported by all crates, no duplication permitted.

use static_assertions::const_assert;

/// Entries per module mailbox.
pub const MAILBOX_CAPACITY: usize = 10;

/// Events that may be in flight (published, not yet dropped by every reader).
pub const EVENT_POOL_CAPACITY: usize = 64;

/// Extra pool slots reserved for error and shutdown traffic.
pub const EVENT_POOL_RESERVE: usize = 8;

/// Samples kept per data kind while the cloud is unreachable.
pub const SAMPLE_BUFFER_CAPACITY: usize = 8;

/// Encoded payloads awaiting a cloud acknowledgment.
pub const PENDING_DATA_COUNT: usize = 8;

/// Encoded payloads that failed to send and wait for a resend.
pub const FAILED_DATA_COUNT: usize = 8;

/// Neighbor cells carried in a cloud location request.
pub const NEIGHBOR_CELLS_MAX: usize = 17;

/// Cloud connection attempts allowed before giving up.
pub const CLOUD_CONNECT_RETRIES: u32 = 10;

/// Reconnect wait per attempt, in seconds. The last entry is about 291 hours.
pub const CLOUD_BACKOFF_DELAYS_S: [u64; 15] = [
    32, 64, 128, 256, 512, 2048, 4096, 8192, 16384, 32768, 65536, 131072, 262144, 524288,
    1048576,
];

/// Graceful reboot delay after every shutdown-capable module acknowledged.
pub const REBOOT_DELAY_S: u64 = 5;

/// Unconditional reboot after a shutdown request.
pub const REBOOT_FALLBACK_S: u64 = 30;

/// Fan-in budget for a sampling cycle without location.
pub const DATA_GET_TIMEOUT_S: u64 = 10;

/// Headroom subtracted from the cycle interval when location is sampled.
pub const LOCATION_TIMEOUT_MARGIN_S: u64 = 5;

/// Lower bound of the fan-in budget when location is sampled.
pub const LOCATION_TIMEOUT_FLOOR_S: u64 = 30;

/// Upper bound (exclusive) for the accelerometer threshold, 100 m/s² ≈ 10.2 g.
pub const ACCELEROMETER_S_M2_MAX: f64 = 100.0;

/// Settings key under which the device configuration is persisted.
pub const DEVICE_SETTINGS_KEY: &str = "data_module/config";

/// Hardware watchdog timeout is shortened by this much for the software deadline.
pub const WATCHDOG_MARGIN_MS: u64 = 500;

const_assert!(REBOOT_DELAY_S < REBOOT_FALLBACK_S);
const_assert!(LOCATION_TIMEOUT_FLOOR_S > DATA_GET_TIMEOUT_S);
const_assert!(EVENT_POOL_RESERVE > 0);
