//! Module runtime: the [`Module`] trait, its context and the dispatch loop.
//!
//! Every module runs on its own tokio task and is the only writer of its
//! state. Events reach it through its mailbox and are dispatched in three
//! tiers:
//!
//! ```text
//! recv ──► on_state ──► on_sub_state ──► on_all_states
//! ```
//!
//! Startup is two-phase. [`ModuleRunner::prepare`] registers the module and
//! installs its subscriptions; [`ModuleRunner::spawn`] starts the task. The
//! system prepares every module before spawning any, so no event published
//! from an `on_start` is missed.

use std::fmt::Debug;
use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use tracker_common::error::ErrorCode;
use tracker_common::event::{Event, Family, ModuleId};

use crate::bus::{Bus, BusError, Rank, Subscription};
use crate::mailbox::Mailbox;
use crate::registry::{ModuleRegistry, RegistryError};

// ─── State cell ─────────────────────────────────────────────────────

/// Holder for one state variable that logs every transition.
#[derive(Debug, Clone)]
pub struct StateCell<S> {
    module: &'static str,
    state: S,
}

impl<S: Copy + PartialEq + Debug> StateCell<S> {
    pub fn new(module: &'static str, initial: S) -> Self {
        Self {
            module,
            state: initial,
        }
    }

    #[inline]
    pub fn get(&self) -> S {
        self.state
    }

    /// Move to `next`. Returns false if already there.
    pub fn set(&mut self, next: S) -> bool {
        if self.state == next {
            debug!("{}: state {:?} already set", self.module, next);
            return false;
        }
        debug!("{}: {:?} --> {:?}", self.module, self.state, next);
        self.state = next;
        true
    }

    #[inline]
    pub fn is(&self, state: S) -> bool {
        self.state == state
    }
}

// ─── Context ────────────────────────────────────────────────────────

/// What a module handler may touch besides its own state.
#[derive(Clone)]
pub struct ModuleContext {
    id: ModuleId,
    name: &'static str,
    family: Family,
    bus: Arc<Bus>,
    registry: Arc<ModuleRegistry>,
}

impl ModuleContext {
    pub fn id(&self) -> ModuleId {
        self.id
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn bus(&self) -> &Arc<Bus> {
        &self.bus
    }

    pub fn registry(&self) -> &Arc<ModuleRegistry> {
        &self.registry
    }

    /// Publish `event`. Pool exhaustion is escalated as `OutOfMemory`.
    pub fn send(&self, event: impl Into<Event>) {
        match self.bus.publish(event) {
            Ok(_) | Err(BusError::MailboxFull { .. }) => {}
            Err(BusError::PoolExhausted { event }) => {
                error!("{}: could not publish {event}", self.name);
                if let Err(e) = self.bus.publish(Event::error(self.family, ErrorCode::OutOfMemory))
                {
                    error!("{}: {e}", self.name);
                }
            }
        }
    }

    /// Publish this module's `Error(code)`.
    pub fn send_error(&self, code: ErrorCode) {
        error!("{}: error, {code}", self.name);
        self.send(Event::error(self.family, code));
    }

    /// Publish this module's `ShutdownReady`.
    pub fn send_shutdown_ack(&self) {
        if let Some(ack) = Event::shutdown_ready(self.family, self.id) {
            self.send(ack);
        }
    }
}

// ─── Module ─────────────────────────────────────────────────────────

/// One independently scheduled participant on the bus.
pub trait Module: Send + 'static {
    fn name(&self) -> &'static str;

    /// Family of the events this module publishes.
    fn family(&self) -> Family;

    /// Whether the shutdown coordinator waits for this module.
    fn supports_shutdown(&self) -> bool {
        true
    }

    fn subscriptions(&self) -> Vec<(Family, Rank)>;

    fn on_start(&mut self, _ctx: &ModuleContext) {}

    /// Super-state handler.
    fn on_state(&mut self, ctx: &ModuleContext, event: &Event);

    /// Sub-state handler, runs after [`Module::on_state`].
    fn on_sub_state(&mut self, _ctx: &ModuleContext, _event: &Event) {}

    /// Runs for every event regardless of state.
    fn on_all_states(&mut self, _ctx: &ModuleContext, _event: &Event) {}
}

/// A registered module waiting to be spawned.
pub struct ModuleRunner<M: Module> {
    module: M,
    ctx: ModuleContext,
    mailbox: Arc<Mailbox>,
}

impl<M: Module> ModuleRunner<M> {
    /// Register `module` and subscribe its mailbox.
    pub fn prepare(
        module: M,
        bus: &Arc<Bus>,
        registry: &Arc<ModuleRegistry>,
        mailbox_capacity: usize,
    ) -> Result<Self, RegistryError> {
        let name = module.name();
        let family = module.family();
        let id = registry.module_start(name, module.supports_shutdown())?;
        let mailbox = Arc::new(Mailbox::new(name, mailbox_capacity));
        for (topic, rank) in module.subscriptions() {
            bus.subscribe(Subscription::mailbox(
                name,
                topic,
                rank,
                Arc::clone(&mailbox),
                family,
            ));
        }
        Ok(Self {
            module,
            ctx: ModuleContext {
                id,
                name,
                family,
                bus: Arc::clone(bus),
                registry: Arc::clone(registry),
            },
            mailbox,
        })
    }

    pub fn id(&self) -> ModuleId {
        self.ctx.id
    }

    pub fn mailbox(&self) -> &Arc<Mailbox> {
        &self.mailbox
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    async fn run(mut self) {
        info!("{}: task started", self.ctx.name);
        self.module.on_start(&self.ctx);
        loop {
            let envelope = self.mailbox.recv().await;
            self.dispatch(envelope.event());
        }
    }

    fn dispatch(&mut self, event: &Event) {
        self.module.on_state(&self.ctx, event);
        self.module.on_sub_state(&self.ctx, event);
        self.module.on_all_states(&self.ctx, event);
    }
}

#[cfg(test)]
impl ModuleContext {
    /// Context for calling handlers directly, without a runner.
    pub(crate) fn detached(name: &'static str, family: Family, bus: Arc<Bus>) -> Self {
        Self {
            id: ModuleId(1),
            name,
            family,
            bus,
            registry: Arc::new(ModuleRegistry::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use tracker_common::event::{AppEvent, UiEvent};

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Light {
        Off,
        On,
    }

    #[test]
    fn state_cell_ignores_same_state() {
        let mut cell = StateCell::new("test", Light::Off);
        assert!(!cell.set(Light::Off));
        assert!(cell.set(Light::On));
        assert!(cell.is(Light::On));
    }

    struct Echo {
        tiers: Arc<Mutex<Vec<&'static str>>>,
    }

    impl Module for Echo {
        fn name(&self) -> &'static str {
            "echo"
        }
        fn family(&self) -> Family {
            Family::Ui
        }
        fn subscriptions(&self) -> Vec<(Family, Rank)> {
            vec![(Family::App, Rank::Normal)]
        }
        fn on_start(&mut self, ctx: &ModuleContext) {
            ctx.send(UiEvent::Error(ErrorCode::NoData));
        }
        fn on_state(&mut self, _ctx: &ModuleContext, _event: &Event) {
            self.tiers.lock().push("state");
        }
        fn on_sub_state(&mut self, _ctx: &ModuleContext, _event: &Event) {
            self.tiers.lock().push("sub");
        }
        fn on_all_states(&mut self, ctx: &ModuleContext, _event: &Event) {
            self.tiers.lock().push("all");
            ctx.send_shutdown_ack();
        }
    }

    #[tokio::test]
    async fn dispatch_runs_three_tiers_in_order() {
        let bus = Arc::new(Bus::new(16));
        let registry = Arc::new(ModuleRegistry::new());
        let tiers = Arc::new(Mutex::new(Vec::new()));
        let acks = Arc::new(Mutex::new(Vec::new()));
        {
            let acks = acks.clone();
            bus.subscribe(Subscription::immediate(
                "observer",
                Family::Ui,
                Rank::Normal,
                move |env| {
                    acks.lock().push(env.event().clone());
                    crate::bus::Handled::Pass
                },
            ));
        }
        let runner = ModuleRunner::prepare(
            Echo {
                tiers: tiers.clone(),
            },
            &bus,
            &registry,
            4,
        )
        .unwrap();
        let id = runner.id();
        bus.publish(AppEvent::Start).unwrap();
        let task = runner.spawn();
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        task.abort();
        assert_eq!(*tiers.lock(), vec!["state", "sub", "all"]);
        let acks = acks.lock();
        assert_eq!(acks[0].as_error(), Some(ErrorCode::NoData));
        assert_eq!(acks[1].as_shutdown_ready(), Some(id));
    }
}
