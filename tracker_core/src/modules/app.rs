//! Orchestrator: decides when to sample and what to ask for.
//!
//! ```text
//! Init ──ConfigInit──► Running{Active|Passive} ──ShutdownRequest──► Shutdown
//! ```
//!
//! Active mode samples every `active_wait_timeout`. Passive mode samples on
//! movement, at most once per `movement_resolution`, and every
//! `movement_timeout` regardless of movement.

use std::time::Duration;

use tracing::{debug, info, warn};

use tracker_common::consts::{
    DATA_GET_TIMEOUT_S, LOCATION_TIMEOUT_FLOOR_S, LOCATION_TIMEOUT_MARGIN_S,
};
use tracker_common::device::DeviceConfig;
use tracker_common::event::{
    AppEvent, CloudEvent, DataEvent, DataKinds, DataRequest, Event, Family, ModemEvent,
    SensorEvent, UtilEvent,
};

use crate::bus::Rank;
use crate::module::{Module, ModuleContext, StateCell};
use crate::timer::Timer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppState {
    Init,
    Running,
    Shutdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppSubState {
    Active,
    Passive,
}

impl AppSubState {
    fn from_config(cfg: &DeviceConfig) -> Self {
        if cfg.active_mode {
            AppSubState::Active
        } else {
            AppSubState::Passive
        }
    }
}

/// Fan-in budget parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplingPolicy {
    /// Budget when no location is requested.
    pub default_timeout: Duration,
    pub location_margin: Duration,
    pub location_floor: Duration,
}

impl Default for SamplingPolicy {
    fn default() -> Self {
        Self {
            default_timeout: Duration::from_secs(DATA_GET_TIMEOUT_S),
            location_margin: Duration::from_secs(LOCATION_TIMEOUT_MARGIN_S),
            location_floor: Duration::from_secs(LOCATION_TIMEOUT_FLOOR_S),
        }
    }
}

impl SamplingPolicy {
    /// Collection budget for one cycle.
    ///
    /// With location: `max(min(interval - margin, location_timeout + margin), floor)`.
    pub fn timeout(&self, cfg: &DeviceConfig, mode: AppSubState, location: bool) -> Duration {
        if !location {
            return self.default_timeout;
        }
        let interval = Duration::from_secs(u64::from(match mode {
            AppSubState::Active => cfg.active_wait_timeout,
            AppSubState::Passive => cfg.movement_resolution,
        }));
        let search = Duration::from_secs(u64::from(cfg.location_timeout)) + self.location_margin;
        interval
            .saturating_sub(self.location_margin)
            .min(search)
            .max(self.location_floor)
    }
}

pub struct AppModule {
    state: StateCell<AppState>,
    sub_state: StateCell<AppSubState>,
    config: DeviceConfig,
    policy: SamplingPolicy,
    /// Set from `DataGet` until the matching `DataReady`.
    request_pending: bool,
    static_data_seen: bool,
    config_requested: bool,
    active_timer: Timer,
    movement_timeout_timer: Timer,
    movement_resolution_timer: Timer,
}

impl AppModule {
    pub fn new(policy: SamplingPolicy) -> Self {
        Self {
            state: StateCell::new("app", AppState::Init),
            sub_state: StateCell::new("app", AppSubState::Active),
            config: DeviceConfig::default(),
            policy,
            request_pending: false,
            static_data_seen: false,
            config_requested: false,
            active_timer: Timer::new("app_active"),
            movement_timeout_timer: Timer::new("app_movement_timeout"),
            movement_resolution_timer: Timer::new("app_movement_resolution"),
        }
    }

    fn cancel_timers(&mut self) {
        self.active_timer.cancel();
        self.movement_timeout_timer.cancel();
        self.movement_resolution_timer.cancel();
    }

    fn start_timers(&mut self, ctx: &ModuleContext) {
        self.cancel_timers();
        match self.sub_state.get() {
            AppSubState::Active => {
                let period = secs(self.config.active_wait_timeout);
                info!("Active mode, sampling every {period:?}");
                self.active_timer
                    .start_periodic(period, ctx.bus(), AppEvent::DataGetAll);
            }
            AppSubState::Passive => {
                let period = secs(self.config.movement_timeout);
                info!("Passive mode, sampling on movement or every {period:?}");
                self.movement_timeout_timer
                    .start_periodic(period, ctx.bus(), AppEvent::DataGetAll);
            }
        }
    }

    /// Build and publish a `DataGet` unless one is outstanding. Returns
    /// whether a request went out.
    fn data_get(&mut self, ctx: &ModuleContext) -> bool {
        if self.request_pending {
            warn!("Sampling request already outstanding, skipped");
            return false;
        }
        let mut kinds = DataKinds::MODEM_DYNAMIC | DataKinds::BATTERY | DataKinds::ENVIRONMENTAL;
        if !self.static_data_seen {
            kinds |= DataKinds::MODEM_STATIC;
        }
        let location = self.config.no_data.any_location_enabled();
        if location {
            kinds |= DataKinds::LOCATION;
        }
        let timeout = self
            .policy
            .timeout(&self.config, self.sub_state.get(), location);
        debug!("Requesting {kinds:?}, timeout {timeout:?}");
        self.request_pending = true;
        ctx.send(AppEvent::DataGet(DataRequest { kinds, timeout }));
        true
    }

    fn on_movement(&mut self, ctx: &ModuleContext) {
        if self.movement_resolution_timer.is_pending() {
            debug!("Movement within resolution window, sample suppressed");
            return;
        }
        if !self.data_get(ctx) {
            return;
        }
        self.movement_resolution_timer
            .start_with(secs(self.config.movement_resolution), || {});
        self.movement_timeout_timer.start_periodic(
            secs(self.config.movement_timeout),
            ctx.bus(),
            AppEvent::DataGetAll,
        );
    }

    fn apply_config(&mut self, ctx: &ModuleContext, cfg: DeviceConfig) {
        let old = self.config;
        self.config = cfg;
        let mode_changed = self.sub_state.set(AppSubState::from_config(&cfg));
        let intervals_changed = old.active_wait_timeout != cfg.active_wait_timeout
            || old.movement_timeout != cfg.movement_timeout
            || old.movement_resolution != cfg.movement_resolution;
        if mode_changed || intervals_changed {
            self.start_timers(ctx);
        }
    }
}

fn secs(s: u32) -> Duration {
    Duration::from_secs(u64::from(s))
}

impl Module for AppModule {
    fn name(&self) -> &'static str {
        "app"
    }

    fn family(&self) -> Family {
        Family::App
    }

    fn subscriptions(&self) -> Vec<(Family, Rank)> {
        vec![
            (Family::App, Rank::Normal),
            (Family::Data, Rank::Normal),
            (Family::Cloud, Rank::Normal),
            (Family::Modem, Rank::Normal),
            (Family::Sensor, Rank::Normal),
            (Family::Util, Rank::Normal),
        ]
    }

    fn on_start(&mut self, ctx: &ModuleContext) {
        ctx.send(AppEvent::Start);
    }

    fn on_state(&mut self, ctx: &ModuleContext, event: &Event) {
        match (self.state.get(), event) {
            (AppState::Init, Event::Data(DataEvent::ConfigInit(cfg))) => {
                self.config = *cfg;
                self.sub_state.set(AppSubState::from_config(cfg));
                self.state.set(AppState::Running);
                self.start_timers(ctx);
                self.data_get(ctx);
            }
            (AppState::Running, Event::Data(DataEvent::ConfigReady(cfg))) => {
                self.apply_config(ctx, *cfg);
            }
            (AppState::Running, Event::App(AppEvent::DataGetAll)) => {
                self.data_get(ctx);
            }
            (state, Event::Util(UtilEvent::ShutdownRequest(_))) if state != AppState::Shutdown => {
                self.cancel_timers();
                ctx.send_shutdown_ack();
                self.state.set(AppState::Shutdown);
            }
            _ => {}
        }
    }

    fn on_sub_state(&mut self, ctx: &ModuleContext, event: &Event) {
        if !self.state.is(AppState::Running) {
            return;
        }
        if self.sub_state.is(AppSubState::Passive)
            && matches!(
                event,
                Event::Sensor(SensorEvent::MovementDataReady(_) | SensorEvent::ActivityDetected)
            )
        {
            self.on_movement(ctx);
        }
    }

    fn on_all_states(&mut self, ctx: &ModuleContext, event: &Event) {
        match event {
            Event::Data(DataEvent::DataReady { .. }) => self.request_pending = false,
            Event::Modem(ModemEvent::StaticDataReady(_)) => self.static_data_seen = true,
            Event::Cloud(CloudEvent::Connected) if !self.config_requested => {
                self.config_requested = true;
                ctx.send(AppEvent::ConfigGet);
            }
            _ => {}
        }
    }
}
