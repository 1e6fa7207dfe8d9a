//! UI module: button input and the status LED.
//!
//! The LED shows, in order of precedence: shutdown reason, a pending
//! connection overlay, an active location search, then the device mode.

use tracing::{debug, warn};

use tracker_common::error::ErrorCode;
use tracker_common::event::{
    AppEvent, CloudEvent, DataEvent, Event, Family, LocationEvent, ModemEvent, ShutdownReason,
    UtilEvent,
};

use crate::bus::Rank;
use crate::module::{Module, ModuleContext, StateCell};
use crate::ports::{LedPattern, UiBackend, UiLink};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiState {
    Init,
    Running,
    Shutdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiSubState {
    Active,
    Passive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiLocationState {
    Idle,
    Searching,
}

/// Connection phase shown on top of the running pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Overlay {
    LteConnecting,
    CloudConnecting,
}

pub struct UiModule {
    state: StateCell<UiState>,
    sub_state: StateCell<UiSubState>,
    location: StateCell<UiLocationState>,
    overlay: Option<Overlay>,
    reason: ShutdownReason,
    backend: Box<dyn UiBackend>,
    shown: Option<LedPattern>,
}

impl UiModule {
    pub fn new(backend: Box<dyn UiBackend>) -> Self {
        Self {
            state: StateCell::new("ui", UiState::Init),
            sub_state: StateCell::new("ui", UiSubState::Active),
            location: StateCell::new("ui", UiLocationState::Idle),
            overlay: None,
            reason: ShutdownReason::Generic,
            backend,
            shown: None,
        }
    }

    /// Pattern for the current state.
    pub fn pattern(&self) -> LedPattern {
        match self.state.get() {
            UiState::Shutdown => match self.reason {
                ShutdownReason::Fota => LedPattern::FotaUpdateReboot,
                ShutdownReason::Generic => LedPattern::ErrorSystemFault,
            },
            UiState::Init => match self.overlay {
                Some(Overlay::LteConnecting) => LedPattern::LteConnecting,
                Some(Overlay::CloudConnecting) => LedPattern::CloudConnecting,
                None => LedPattern::Off,
            },
            UiState::Running => match (self.overlay, self.location.get()) {
                (Some(Overlay::LteConnecting), _) => LedPattern::LteConnecting,
                (Some(Overlay::CloudConnecting), _) => LedPattern::CloudConnecting,
                (None, UiLocationState::Searching) => LedPattern::LocationSearching,
                (None, UiLocationState::Idle) => match self.sub_state.get() {
                    UiSubState::Active => LedPattern::ActiveMode,
                    UiSubState::Passive => LedPattern::PassiveMode,
                },
            },
        }
    }

    fn refresh(&mut self, ctx: &ModuleContext) {
        let pattern = self.pattern();
        if self.shown == Some(pattern) {
            return;
        }
        debug!("LED pattern {pattern:?}");
        if let Err(e) = self.backend.set_led(pattern) {
            warn!("Setting LED failed: {e}");
            ctx.send_error(ErrorCode::from(&e));
            return;
        }
        self.shown = Some(pattern);
    }

    fn set_mode(&mut self, active: bool) {
        self.sub_state.set(if active {
            UiSubState::Active
        } else {
            UiSubState::Passive
        });
    }

    fn track(&mut self, event: &Event) {
        match event {
            Event::Modem(ModemEvent::LteConnecting) => self.overlay = Some(Overlay::LteConnecting),
            Event::Modem(ModemEvent::LteConnected) => {
                if self.overlay == Some(Overlay::LteConnecting) {
                    self.overlay = None;
                }
            }
            Event::Cloud(CloudEvent::Connecting) => self.overlay = Some(Overlay::CloudConnecting),
            Event::Cloud(CloudEvent::Connected) => {
                if self.overlay == Some(Overlay::CloudConnecting) {
                    self.overlay = None;
                }
            }
            Event::Location(LocationEvent::Active) => {
                self.location.set(UiLocationState::Searching);
            }
            Event::Location(LocationEvent::Inactive) => {
                self.location.set(UiLocationState::Idle);
            }
            _ => {}
        }
    }
}

impl Module for UiModule {
    fn name(&self) -> &'static str {
        "ui"
    }

    fn family(&self) -> Family {
        Family::Ui
    }

    fn subscriptions(&self) -> Vec<(Family, Rank)> {
        vec![
            (Family::App, Rank::Normal),
            (Family::Data, Rank::Normal),
            (Family::Cloud, Rank::Normal),
            (Family::Modem, Rank::Normal),
            (Family::Location, Rank::Normal),
            (Family::Util, Rank::Late),
        ]
    }

    fn on_state(&mut self, ctx: &ModuleContext, event: &Event) {
        match (self.state.get(), event) {
            (UiState::Init, Event::App(AppEvent::Start)) => {
                if let Err(e) = self.backend.start(UiLink::new(ctx.bus().clone())) {
                    warn!("Button input unavailable: {e}");
                    ctx.send_error(ErrorCode::from(&e));
                }
            }
            (UiState::Init, Event::Data(DataEvent::ConfigInit(cfg))) => {
                self.set_mode(cfg.active_mode);
                self.state.set(UiState::Running);
            }
            (UiState::Running, Event::Data(DataEvent::ConfigReady(cfg))) => {
                self.set_mode(cfg.active_mode);
            }
            (UiState::Init | UiState::Running, Event::Util(UtilEvent::ShutdownRequest(reason))) => {
                self.reason = *reason;
                self.state.set(UiState::Shutdown);
                self.refresh(ctx);
                ctx.send_shutdown_ack();
            }
            _ => {}
        }
    }

    fn on_all_states(&mut self, ctx: &ModuleContext, event: &Event) {
        if self.state.is(UiState::Shutdown) {
            return;
        }
        self.track(event);
        self.refresh(ctx);
    }
}
