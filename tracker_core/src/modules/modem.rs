//! Modem module: LTE attach and modem-side sampling.
//!
//! ```text
//! Init ──Start──► Disconnected ──connect──► Connecting ⇄ Connected
//! ```

use tracing::{debug, info, warn};

use tracker_common::error::{DriverError, ErrorCode};
use tracker_common::event::{AppEvent, DataKind, DataRequest, Event, Family, ModemEvent, UtilEvent};

use crate::bus::Rank;
use crate::module::{Module, ModuleContext, StateCell};
use crate::ports::{ModemBackend, ModemLink};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModemState {
    Init,
    Disconnected,
    Connecting,
    Connected,
    Shutdown,
}

pub struct ModemModule {
    state: StateCell<ModemState>,
    backend: Box<dyn ModemBackend>,
}

impl ModemModule {
    pub fn new(backend: Box<dyn ModemBackend>) -> Self {
        Self {
            state: StateCell::new("modem", ModemState::Init),
            backend,
        }
    }

    fn start(&mut self, ctx: &ModuleContext) {
        if let Err(e) = self.backend.init() {
            warn!("Modem init failed: {e}");
            ctx.send_error(ErrorCode::from(&e));
            return;
        }
        ctx.send(ModemEvent::Initialized);
        self.state.set(ModemState::Disconnected);
        self.connect(ctx);
    }

    fn connect(&mut self, ctx: &ModuleContext) {
        if let Err(e) = self.backend.connect(ModemLink::new(ctx.bus().clone())) {
            warn!("LTE connect failed: {e}");
            ctx.send_error(ErrorCode::from(&e));
            return;
        }
        info!("Connecting to LTE network");
        ctx.send(ModemEvent::LteConnecting);
        self.state.set(ModemState::Connecting);
    }

    fn sample(&mut self, ctx: &ModuleContext, request: &DataRequest) {
        for kind in request.kinds.kinds() {
            let event = match kind {
                DataKind::ModemStatic => answer(
                    self.backend.static_data(),
                    ModemEvent::StaticDataReady,
                    ModemEvent::StaticDataNotReady,
                ),
                DataKind::ModemDynamic => answer(
                    self.backend.dynamic_data(),
                    ModemEvent::DynamicDataReady,
                    ModemEvent::DynamicDataNotReady,
                ),
                DataKind::Battery => answer(
                    self.backend.battery(),
                    ModemEvent::BatteryDataReady,
                    ModemEvent::BatteryDataNotReady,
                ),
                DataKind::Environmental | DataKind::Location => continue,
            };
            ctx.send(event);
        }
    }
}

fn answer<T>(
    sample: Result<T, DriverError>,
    ready: impl FnOnce(T) -> ModemEvent,
    not_ready: ModemEvent,
) -> ModemEvent {
    match sample {
        Ok(value) => ready(value),
        Err(e) => {
            debug!("{} ({e})", not_ready.name());
            not_ready
        }
    }
}

impl Module for ModemModule {
    fn name(&self) -> &'static str {
        "modem"
    }

    fn family(&self) -> Family {
        Family::Modem
    }

    fn subscriptions(&self) -> Vec<(Family, Rank)> {
        vec![
            (Family::App, Rank::Normal),
            (Family::Modem, Rank::Normal),
            (Family::Util, Rank::Normal),
        ]
    }

    fn on_state(&mut self, ctx: &ModuleContext, event: &Event) {
        match (self.state.get(), event) {
            (ModemState::Init, Event::App(AppEvent::Start)) => self.start(ctx),
            (
                ModemState::Connecting | ModemState::Disconnected,
                Event::Modem(ModemEvent::LteConnected),
            ) => {
                info!("LTE connected");
                self.state.set(ModemState::Connected);
            }
            (
                ModemState::Connected | ModemState::Connecting,
                Event::Modem(ModemEvent::LteDisconnected),
            ) => {
                warn!("LTE disconnected");
                self.state.set(ModemState::Disconnected);
            }
            _ => {}
        }
    }

    fn on_all_states(&mut self, ctx: &ModuleContext, event: &Event) {
        match event {
            Event::App(AppEvent::DataGet(request)) if !self.state.is(ModemState::Shutdown) => {
                self.sample(ctx, request)
            }
            Event::Util(UtilEvent::ShutdownRequest(_)) if !self.state.is(ModemState::Shutdown) => {
                if let Err(e) = self.backend.power_off() {
                    warn!("Modem power off failed: {e}");
                }
                ctx.send_shutdown_ack();
                self.state.set(ModemState::Shutdown);
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_sample_answers_not_ready() {
        let event = answer::<u8>(
            Err(DriverError::Busy),
            |_| ModemEvent::LteConnected,
            ModemEvent::BatteryDataNotReady,
        );
        assert_eq!(event, ModemEvent::BatteryDataNotReady);
    }
}
