//! Shutdown coordinator.
//!
//! ```text
//! Normal ──(any *Error / FotaDone)──► RebootPending
//!                                       │ ShutdownRequest(reason)
//!                                       │ fallback timer armed
//!                                       ▼
//!                      all ShutdownReady ──► reboot timer armed
//! ```
//!
//! Whichever timer fires first resets the device; the other is a no-op.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tracing::{debug, info, warn};

use tracker_common::event::{CloudEvent, Event, Family, ShutdownReason, UtilEvent};

use crate::bus::Rank;
use crate::module::{Module, ModuleContext, StateCell};
use crate::ports::SystemReset;
use crate::registry::ShutdownProgress;
use crate::timer::Timer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UtilState {
    Normal,
    RebootPending,
}

/// Calls the reset port at most once.
#[derive(Clone)]
struct ResetOnce {
    done: Arc<AtomicBool>,
    port: Arc<dyn SystemReset>,
}

impl ResetOnce {
    fn fire(&self, reason: ShutdownReason, via: &str) {
        if self.done.swap(true, Ordering::AcqRel) {
            debug!("Reset already issued, {via} ignored");
            return;
        }
        warn!("Rebooting ({reason:?}) via {via}");
        self.port.reboot(reason);
    }
}

pub struct UtilModule {
    state: StateCell<UtilState>,
    reason: ShutdownReason,
    reset: ResetOnce,
    reboot_delay: Duration,
    fallback_timeout: Duration,
    reboot_timer: Timer,
    fallback_timer: Timer,
}

impl UtilModule {
    pub fn new(
        reset: Arc<dyn SystemReset>,
        reboot_delay: Duration,
        fallback_timeout: Duration,
    ) -> Self {
        Self {
            state: StateCell::new("util", UtilState::Normal),
            reason: ShutdownReason::Generic,
            reset: ResetOnce {
                done: Arc::new(AtomicBool::new(false)),
                port: reset,
            },
            reboot_delay,
            fallback_timeout,
            reboot_timer: Timer::new("util_reboot"),
            fallback_timer: Timer::new("util_fallback"),
        }
    }

    pub fn state(&self) -> UtilState {
        self.state.get()
    }

    fn arm(&mut self, ctx: &ModuleContext, reason: ShutdownReason) {
        info!("Shutdown requested ({reason:?})");
        self.reason = reason;
        self.state.set(UtilState::RebootPending);
        ctx.send(UtilEvent::ShutdownRequest(reason));
        let reset = self.reset.clone();
        self.fallback_timer
            .start_with(self.fallback_timeout, move || reset.fire(reason, "fallback timer"));
    }

    fn on_ack(&mut self, ctx: &ModuleContext, event: &Event) {
        let Some(id) = event.as_shutdown_ready() else {
            return;
        };
        match ctx.registry().shutdown_register(id) {
            ShutdownProgress::Complete => {
                let reset = self.reset.clone();
                let reason = self.reason;
                self.reboot_timer
                    .start_with(self.reboot_delay, move || reset.fire(reason, "reboot timer"));
            }
            ShutdownProgress::Pending { remaining } => {
                debug!("Waiting for {remaining} modules");
            }
            ShutdownProgress::Duplicate { .. } | ShutdownProgress::Unknown => {}
        }
    }
}

impl Module for UtilModule {
    fn name(&self) -> &'static str {
        "util"
    }

    fn family(&self) -> Family {
        Family::Util
    }

    fn supports_shutdown(&self) -> bool {
        false
    }

    /// Every family, its own included: an overflow of this module's
    /// mailbox is reported as a util `Error`.
    fn subscriptions(&self) -> Vec<(Family, Rank)> {
        Family::ALL.into_iter().map(|f| (f, Rank::Early)).collect()
    }

    fn on_state(&mut self, ctx: &ModuleContext, event: &Event) {
        match self.state.get() {
            UtilState::Normal => {
                if let Some(code) = event.as_error() {
                    warn!("{} received ({code}), shutting down", event.name());
                    self.arm(ctx, ShutdownReason::Generic);
                } else if matches!(event, Event::Cloud(CloudEvent::FotaDone)) {
                    self.arm(ctx, ShutdownReason::Fota);
                }
            }
            UtilState::RebootPending => {
                if event.as_error().is_some() {
                    debug!("{} ignored, reboot already pending", event.name());
                }
            }
        }
    }

    fn on_all_states(&mut self, ctx: &ModuleContext, event: &Event) {
        self.on_ack(ctx, event);
    }
}
