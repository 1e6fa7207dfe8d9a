//! Cancellable one-shot and periodic timers.
//!
//! A timer is a tokio task that publishes an event (or runs a closure) when
//! it fires. Cancelling aborts the task; an event that was already published
//! stays published, so handlers must tolerate stale timer events.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at, sleep};
use tracing::{debug, warn};

use tracker_common::event::Event;

use crate::bus::Bus;

#[derive(Debug)]
pub struct Timer {
    name: &'static str,
    task: Option<JoinHandle<()>>,
}

impl Timer {
    pub fn new(name: &'static str) -> Self {
        Self { name, task: None }
    }

    /// Publish `event` once after `delay`. Restarts a pending timer.
    pub fn start_once(&mut self, delay: Duration, bus: &Arc<Bus>, event: impl Into<Event>) {
        let event = event.into();
        let bus = Arc::clone(bus);
        let name = self.name;
        self.spawn(delay, async move {
            sleep(delay).await;
            debug!("Timer {name} fired");
            if let Err(e) = bus.publish(event) {
                warn!("Timer {name}: {e}");
            }
        });
    }

    /// Publish `event` every `period`, first after one full period.
    pub fn start_periodic(&mut self, period: Duration, bus: &Arc<Bus>, event: impl Into<Event>) {
        let event = event.into();
        let bus = Arc::clone(bus);
        let name = self.name;
        self.spawn(period, async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                debug!("Timer {name} fired");
                if let Err(e) = bus.publish(event.clone()) {
                    warn!("Timer {name}: {e}");
                }
            }
        });
    }

    /// Run `action` once after `delay`.
    pub fn start_with<F>(&mut self, delay: Duration, action: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let name = self.name;
        self.spawn(delay, async move {
            sleep(delay).await;
            debug!("Timer {name} fired");
            action();
        });
    }

    pub fn cancel(&mut self) {
        if let Some(task) = self.task.take() {
            if !task.is_finished() {
                debug!("Timer {} cancelled", self.name);
            }
            task.abort();
        }
    }

    /// True while the timer is armed and has not completed.
    pub fn is_pending(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    fn spawn<F>(&mut self, delay: Duration, fut: F)
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        self.cancel();
        debug!("Timer {} armed for {delay:?}", self.name);
        self.task = Some(tokio::spawn(fut));
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
