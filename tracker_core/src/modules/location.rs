//! Location module: runs one location search per sampling cycle.
//!
//! ```text
//! Init ──Modem::Initialized──► Running{Idle ⇄ Search} ──ShutdownRequest──► Shutdown
//! ```
//!
//! The module listens to its own family: `Active` / `Inactive` published
//! around a search drive the Idle/Search sub-state. Cloud location answers
//! are passed to the backend while a search runs.

use std::time::Duration;

use tracing::{debug, info, warn};

use tracker_common::device::{DeviceConfig, NoDataFlags};
use tracker_common::error::ErrorCode;
use tracker_common::event::{
    AppEvent, DataEvent, DataKind, Event, Family, LocationEvent, ModemEvent, UtilEvent,
};

use crate::bus::Rank;
use crate::module::{Module, ModuleContext, StateCell};
use crate::ports::{
    CloudLocationResult, LocationBackend, LocationLink, LocationMethod, LocationRequest,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocationState {
    Init,
    Running,
    Shutdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocationSubState {
    Idle,
    Search,
}

/// Enabled methods in priority order.
pub fn enabled_methods(no_data: &NoDataFlags) -> heapless::Vec<LocationMethod, 3> {
    let mut methods = heapless::Vec::new();
    for (method, disabled) in [
        (LocationMethod::Gnss, no_data.gnss),
        (LocationMethod::Cellular, no_data.neighbor_cell),
        (LocationMethod::Wifi, no_data.wifi),
    ] {
        if !disabled {
            let _ = methods.push(method);
        }
    }
    methods
}

pub struct LocationModule {
    state: StateCell<LocationState>,
    sub_state: StateCell<LocationSubState>,
    backend: Box<dyn LocationBackend>,
    config: DeviceConfig,
    /// The running search handed cell measurements to the cloud.
    cloud_pending: bool,
}

impl LocationModule {
    pub fn new(backend: Box<dyn LocationBackend>) -> Self {
        Self {
            state: StateCell::new("location", LocationState::Init),
            sub_state: StateCell::new("location", LocationSubState::Idle),
            backend,
            config: DeviceConfig::default(),
            cloud_pending: false,
        }
    }

    fn search_start(&mut self, ctx: &ModuleContext) {
        let methods = enabled_methods(&self.config.no_data);
        if methods.is_empty() {
            warn!("Every location method disabled");
            ctx.send(LocationEvent::DataNotReady);
            return;
        }
        let request = LocationRequest {
            methods,
            timeout: Duration::from_secs(u64::from(self.config.location_timeout)),
        };
        debug!("Location request {:?}", request);
        if let Err(e) = self
            .backend
            .request(request, LocationLink::new(ctx.bus().clone()))
        {
            warn!("Location request failed: {e}");
            ctx.send(LocationEvent::DataNotReady);
            return;
        }
        self.cloud_pending = false;
        self.sub_state.set(LocationSubState::Search);
        ctx.send(LocationEvent::Active);
    }

    fn restart_search(&mut self, ctx: &ModuleContext) {
        info!("Cloud location still pending, restarting search");
        if let Err(e) = self.backend.cancel() {
            warn!("Cancelling location search failed: {e}");
        }
        self.search_start(ctx);
    }
}

fn wants_location(event: &Event) -> bool {
    matches!(event, Event::App(AppEvent::DataGet(req)) if req.kinds.includes(DataKind::Location))
}

impl Module for LocationModule {
    fn name(&self) -> &'static str {
        "location"
    }

    fn family(&self) -> Family {
        Family::Location
    }

    fn subscriptions(&self) -> Vec<(Family, Rank)> {
        vec![
            (Family::App, Rank::Normal),
            (Family::Cloud, Rank::Normal),
            (Family::Data, Rank::Normal),
            (Family::Modem, Rank::Normal),
            (Family::Location, Rank::Normal),
            (Family::Util, Rank::Normal),
        ]
    }

    fn on_state(&mut self, ctx: &ModuleContext, event: &Event) {
        match (self.state.get(), event) {
            (LocationState::Init, Event::Modem(ModemEvent::Initialized)) => {
                if let Err(e) = self.backend.init() {
                    warn!("Location init failed: {e}");
                    ctx.send_error(ErrorCode::from(&e));
                    return;
                }
                self.state.set(LocationState::Running);
            }
            (LocationState::Init, Event::App(AppEvent::DataGet(_))) => {
                debug!("Location not initialized, request left to time out");
            }
            (
                LocationState::Init | LocationState::Running,
                Event::Util(UtilEvent::ShutdownRequest(_)),
            ) => {
                if self.sub_state.is(LocationSubState::Search) {
                    if let Err(e) = self.backend.cancel() {
                        warn!("Cancelling location search failed: {e}");
                    }
                }
                ctx.send_shutdown_ack();
                self.state.set(LocationState::Shutdown);
            }
            _ => {}
        }
    }

    fn on_sub_state(&mut self, ctx: &ModuleContext, event: &Event) {
        if !self.state.is(LocationState::Running) {
            return;
        }
        match (self.sub_state.get(), event) {
            (LocationSubState::Idle, ev) if wants_location(ev) => self.search_start(ctx),
            (LocationSubState::Idle, Event::Location(LocationEvent::Active)) => {
                self.sub_state.set(LocationSubState::Search);
            }
            (LocationSubState::Search, ev) if wants_location(ev) => {
                if self.cloud_pending {
                    self.restart_search(ctx);
                } else {
                    info!("Location search already active");
                }
            }
            (LocationSubState::Search, Event::Location(LocationEvent::Inactive)) => {
                self.cloud_pending = false;
                self.sub_state.set(LocationSubState::Idle);
            }
            (LocationSubState::Search, Event::Location(LocationEvent::CloudLocationDataReady(_))) => {
                self.cloud_pending = true;
            }
            (LocationSubState::Search, Event::Cloud(ev)) => {
                if let Some(result) = CloudLocationResult::from_event(ev) {
                    debug!("Cloud location result {result:?}");
                    if let Err(e) = self.backend.cloud_location_result(result) {
                        warn!("Passing cloud location result failed: {e}");
                    }
                }
            }
            _ => {}
        }
    }

    fn on_all_states(&mut self, _ctx: &ModuleContext, event: &Event) {
        if let Event::Data(DataEvent::ConfigInit(cfg) | DataEvent::ConfigReady(cfg)) = event {
            self.config = *cfg;
        }
    }
}
