//! # Watchdog contract
//!
//! The firmware image owns a hardware watchdog and reports its lifecycle to
//! interested parties through [`WatchdogHandler`]s:
//!
//! ```text
//! Start ──► TimeoutInstalled(ms) ──► Feed ──► Feed ──► ...
//! ```
//!
//! [`SoftwareWatchdog`] is the handler the binary installs: it keeps a
//! deadline [`WATCHDOG_MARGIN_MS`] shorter than the hardware timeout, so a
//! stalled feeder is noticed before the hardware resets the device.

use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{debug, info};

use crate::consts::WATCHDOG_MARGIN_MS;

/// Lifecycle notification sent to every registered handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchdogEvent {
    /// The watchdog is about to be configured.
    Start,
    /// Hardware timeout installed, in milliseconds.
    TimeoutInstalled(u64),
    /// The watchdog was fed.
    Feed,
}

/// Error type for watchdog operations.
#[derive(Debug, thiserror::Error)]
pub enum WatchdogError {
    /// Installed timeout is not larger than the software margin.
    #[error("watchdog timeout {timeout_ms} ms must exceed margin {margin_ms} ms")]
    TimeoutTooShort { timeout_ms: u64, margin_ms: u64 },

    /// No more handlers can be registered.
    #[error("watchdog handler table full ({max})")]
    HandlersFull { max: usize },
}

/// Receiver of [`WatchdogEvent`]s.
pub trait WatchdogHandler: Send + Sync {
    fn on_event(&self, event: WatchdogEvent);
}

/// Source of watchdog events.
pub trait Watchdog {
    /// Register a handler that receives every subsequent event.
    fn register(&mut self, handler: std::sync::Arc<dyn WatchdogHandler>)
    -> Result<(), WatchdogError>;
}

/// Software shadow of the hardware watchdog.
#[derive(Debug, Default)]
pub struct SoftwareWatchdog {
    inner: Mutex<Shadow>,
}

#[derive(Debug, Default)]
struct Shadow {
    period: Option<Duration>,
    deadline: Option<Instant>,
    feeds: u64,
}

impl SoftwareWatchdog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Software period derived from a hardware timeout.
    pub fn period_for(timeout_ms: u64) -> Result<Duration, WatchdogError> {
        if timeout_ms <= WATCHDOG_MARGIN_MS {
            return Err(WatchdogError::TimeoutTooShort {
                timeout_ms,
                margin_ms: WATCHDOG_MARGIN_MS,
            });
        }
        Ok(Duration::from_millis(timeout_ms - WATCHDOG_MARGIN_MS))
    }

    /// Software period, once a timeout has been installed.
    pub fn period(&self) -> Option<Duration> {
        self.inner.lock().period
    }

    pub fn feeds(&self) -> u64 {
        self.inner.lock().feeds
    }

    /// True if armed and the deadline has passed at `now`.
    pub fn is_expired(&self, now: Instant) -> bool {
        self.inner.lock().deadline.is_some_and(|deadline| now >= deadline)
    }
}

impl WatchdogHandler for SoftwareWatchdog {
    fn on_event(&self, event: WatchdogEvent) {
        let mut shadow = self.inner.lock();
        match event {
            WatchdogEvent::Start => {
                debug!("Watchdog starting");
                shadow.deadline = None;
            }
            WatchdogEvent::TimeoutInstalled(ms) => match Self::period_for(ms) {
                Ok(period) => {
                    info!("Watchdog timeout {ms} ms, software period {period:?}");
                    shadow.period = Some(period);
                    shadow.deadline = Some(Instant::now() + period);
                }
                Err(e) => {
                    tracing::error!("{e}");
                    shadow.period = None;
                    shadow.deadline = None;
                }
            },
            WatchdogEvent::Feed => {
                shadow.feeds += 1;
                if let Some(period) = shadow.period {
                    shadow.deadline = Some(Instant::now() + period);
                }
            }
        }
    }
}
