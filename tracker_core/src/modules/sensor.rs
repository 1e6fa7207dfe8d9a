//! Sensor module: environmental sampling and accelerometer activity.

use tracing::{debug, info, warn};

use tracker_common::device::DeviceConfig;
use tracker_common::error::{DriverError, ErrorCode};
use tracker_common::event::{
    AppEvent, DataEvent, DataKind, Event, Family, SensorEvent, UtilEvent,
};

use crate::bus::Rank;
use crate::module::{Module, ModuleContext, StateCell};
use crate::ports::{SensorBackend, SensorLink};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorState {
    Init,
    Running,
    Shutdown,
}

pub struct SensorModule {
    state: StateCell<SensorState>,
    backend: Box<dyn SensorBackend>,
    config: DeviceConfig,
}

impl SensorModule {
    pub fn new(backend: Box<dyn SensorBackend>) -> Self {
        Self {
            state: StateCell::new("sensor", SensorState::Init),
            backend,
            config: DeviceConfig::default(),
        }
    }

    fn apply_config(&mut self, ctx: &ModuleContext, cfg: &DeviceConfig) {
        let threshold_changed = cfg.accelerometer_threshold != self.config.accelerometer_threshold;
        self.config = *cfg;
        if threshold_changed || self.state.is(SensorState::Init) {
            if let Err(e) = self.backend.set_threshold(cfg.accelerometer_threshold) {
                warn!("Setting accelerometer threshold failed: {e}");
                ctx.send_error(ErrorCode::from(&e));
            }
        }
    }

    fn environmental(&mut self, ctx: &ModuleContext) {
        match self.backend.environmental() {
            Ok(sample) => ctx.send(SensorEvent::EnvironmentalDataReady(sample)),
            Err(DriverError::NotSupported) => ctx.send(SensorEvent::EnvironmentalNotSupported),
            Err(e) => {
                warn!("Environmental sample failed: {e}");
                ctx.send(SensorEvent::EnvironmentalNotSupported);
            }
        }
    }
}

impl Module for SensorModule {
    fn name(&self) -> &'static str {
        "sensor"
    }

    fn family(&self) -> Family {
        Family::Sensor
    }

    fn subscriptions(&self) -> Vec<(Family, Rank)> {
        vec![
            (Family::App, Rank::Normal),
            (Family::Data, Rank::Normal),
            (Family::Sensor, Rank::Normal),
            (Family::Util, Rank::Normal),
        ]
    }

    fn on_state(&mut self, ctx: &ModuleContext, event: &Event) {
        match (self.state.get(), event) {
            (SensorState::Init, Event::Data(DataEvent::ConfigInit(cfg))) => {
                self.apply_config(ctx, cfg);
                if let Err(e) = self.backend.start(SensorLink::new(ctx.bus().clone())) {
                    warn!("Sensor start failed: {e}");
                    ctx.send_error(ErrorCode::from(&e));
                    return;
                }
                self.state.set(SensorState::Running);
            }
            (SensorState::Running, Event::Data(DataEvent::ConfigReady(cfg))) => {
                self.apply_config(ctx, cfg);
            }
            (SensorState::Running, Event::Sensor(SensorEvent::AccelerometerTrigger(values))) => {
                if self.config.active_mode {
                    debug!("Movement ignored in active mode");
                } else {
                    info!("Movement detected");
                    ctx.send(SensorEvent::MovementDataReady(*values));
                    ctx.send(SensorEvent::ActivityDetected);
                }
            }
            _ => {}
        }
    }

    fn on_all_states(&mut self, ctx: &ModuleContext, event: &Event) {
        if self.state.is(SensorState::Shutdown) {
            return;
        }
        match event {
            Event::App(AppEvent::DataGet(req)) if req.kinds.includes(DataKind::Environmental) => {
                self.environmental(ctx)
            }
            Event::Util(UtilEvent::ShutdownRequest(_)) => {
                ctx.send_shutdown_ack();
                self.state.set(SensorState::Shutdown);
            }
            _ => {}
        }
    }
}
