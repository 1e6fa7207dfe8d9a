//! System bootstrap: builds the bus and registry, prepares every module and
//! spawns their tasks.
//!
//! Preparation registers and subscribes all modules before any task runs,
//! so the `Start` event published by the app module reaches everybody.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::info;

use tracker_common::config::TrackerConfig;
use tracker_common::consts::{
    CLOUD_CONNECT_RETRIES, EVENT_POOL_CAPACITY, MAILBOX_CAPACITY, REBOOT_DELAY_S,
    REBOOT_FALLBACK_S,
};
use tracker_common::settings::SettingsStore;

use crate::bus::Bus;
use crate::codec::CloudCodec;
use crate::module::{Module, ModuleRunner};
use crate::modules::{
    AppModule, CloudModule, DataModule, LocationModule, ModemModule, SamplingPolicy, SensorModule,
    UiModule, UtilModule,
};
use crate::ports::{
    CloudTransport, DateTimeSource, LocationBackend, ModemBackend, SensorBackend, SystemReset,
    UiBackend,
};
use crate::registry::{ModuleRegistry, RegistryError};

#[derive(Debug, Error)]
pub enum SystemError {
    #[error("module registration failed: {0}")]
    Registry(#[from] RegistryError),

    #[error("invalid runtime parameter: {0}")]
    InvalidParameter(&'static str),
}

/// Collaborators handed to the modules at startup.
pub struct Backends {
    pub modem: Box<dyn ModemBackend>,
    pub location: Box<dyn LocationBackend>,
    pub sensor: Box<dyn SensorBackend>,
    pub ui: Box<dyn UiBackend>,
    pub transport: Box<dyn CloudTransport>,
    pub codec: Box<dyn CloudCodec>,
    pub clock: Box<dyn DateTimeSource>,
    pub settings: Arc<dyn SettingsStore>,
    pub reset: Arc<dyn SystemReset>,
}

/// Runtime tunables, usually taken from `tracker.toml`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeConfig {
    pub mailbox_capacity: usize,
    pub event_pool_capacity: usize,
    pub connect_retries: u32,
    pub reboot_delay: Duration,
    pub fallback_timeout: Duration,
    pub sampling: SamplingPolicy,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            mailbox_capacity: MAILBOX_CAPACITY,
            event_pool_capacity: EVENT_POOL_CAPACITY,
            connect_retries: CLOUD_CONNECT_RETRIES,
            reboot_delay: Duration::from_secs(REBOOT_DELAY_S),
            fallback_timeout: Duration::from_secs(REBOOT_FALLBACK_S),
            sampling: SamplingPolicy::default(),
        }
    }
}

impl From<&TrackerConfig> for RuntimeConfig {
    fn from(cfg: &TrackerConfig) -> Self {
        Self {
            mailbox_capacity: cfg.runtime.mailbox_capacity,
            event_pool_capacity: cfg.runtime.event_pool_capacity,
            connect_retries: cfg.cloud.connect_retries,
            reboot_delay: cfg.shutdown.reboot_delay(),
            fallback_timeout: cfg.shutdown.fallback_timeout(),
            sampling: SamplingPolicy {
                default_timeout: Duration::from_secs(cfg.sampling.default_timeout_s),
                location_margin: Duration::from_secs(cfg.sampling.location_margin_s),
                location_floor: Duration::from_secs(cfg.sampling.location_floor_s),
            },
        }
    }
}

impl RuntimeConfig {
    fn check(&self) -> Result<(), SystemError> {
        if self.mailbox_capacity == 0 {
            return Err(SystemError::InvalidParameter("mailbox_capacity"));
        }
        if self.event_pool_capacity == 0 {
            return Err(SystemError::InvalidParameter("event_pool_capacity"));
        }
        if self.reboot_delay >= self.fallback_timeout {
            return Err(SystemError::InvalidParameter("reboot_delay"));
        }
        Ok(())
    }
}

/// A running set of modules.
pub struct System {
    bus: Arc<Bus>,
    registry: Arc<ModuleRegistry>,
    tasks: Vec<JoinHandle<()>>,
}

type Spawn = Box<dyn FnOnce() -> JoinHandle<()>>;

fn prepare<M: Module>(
    module: M,
    bus: &Arc<Bus>,
    registry: &Arc<ModuleRegistry>,
    capacity: usize,
) -> Result<Spawn, RegistryError> {
    let runner = ModuleRunner::prepare(module, bus, registry, capacity)?;
    Ok(Box::new(move || runner.spawn()))
}

impl System {
    /// Prepare and spawn all modules. Must be called inside a tokio runtime.
    pub fn start(config: RuntimeConfig, backends: Backends) -> Result<Self, SystemError> {
        config.check()?;
        let bus = Arc::new(Bus::new(config.event_pool_capacity));
        let registry = Arc::new(ModuleRegistry::new());
        let cap = config.mailbox_capacity;

        // Util first so it observes errors raised during startup.
        let prepared = vec![
            prepare(
                UtilModule::new(backends.reset, config.reboot_delay, config.fallback_timeout),
                &bus,
                &registry,
                cap,
            )?,
            prepare(
                DataModule::new(backends.settings, backends.codec, backends.clock),
                &bus,
                &registry,
                cap,
            )?,
            prepare(
                CloudModule::new(backends.transport, config.connect_retries),
                &bus,
                &registry,
                cap,
            )?,
            prepare(ModemModule::new(backends.modem), &bus, &registry, cap)?,
            prepare(LocationModule::new(backends.location), &bus, &registry, cap)?,
            prepare(SensorModule::new(backends.sensor), &bus, &registry, cap)?,
            prepare(UiModule::new(backends.ui), &bus, &registry, cap)?,
            prepare(AppModule::new(config.sampling), &bus, &registry, cap)?,
        ];

        let tasks: Vec<_> = prepared.into_iter().map(|spawn| spawn()).collect();
        info!(
            "{} modules running, {} listeners, {} awaiting shutdown",
            registry.registered(),
            bus.listener_count(),
            registry.active_count()
        );
        Ok(Self {
            bus,
            registry,
            tasks,
        })
    }

    pub fn bus(&self) -> &Arc<Bus> {
        &self.bus
    }

    pub fn registry(&self) -> &Arc<ModuleRegistry> {
        &self.registry
    }

    /// Abort every module task.
    pub fn stop(self) {
        for task in &self.tasks {
            task.abort();
        }
        info!("All module tasks stopped");
    }
}

impl Drop for System {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}
