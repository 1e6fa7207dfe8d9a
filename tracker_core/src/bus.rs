//! Process-wide publish/subscribe event bus.
//!
//! ```text
//!  publish(ev) ──► pool.alloc ──► listeners (rank order, family filter)
//!                                   ├── Mailbox sink   → push, never consumes
//!                                   └── Immediate sink → callback, may consume
//! ```
//!
//! Delivery is synchronous on the publisher's task. The listener list is
//! copy-on-write: `publish` iterates a snapshot, so callbacks may publish or
//! subscribe re-entrantly.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, error, warn};

use tracker_common::consts::EVENT_POOL_RESERVE;
use tracker_common::error::ErrorCode;
use tracker_common::event::{Event, Family};

use crate::mailbox::Mailbox;
use crate::pool::{Envelope, EventPool};

/// Delivery order within one `publish` call. Stable within a rank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Rank {
    First,
    Early,
    Normal,
    Late,
    Final,
}

/// Return value of an immediate listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handled {
    /// Keep delivering to later listeners.
    Pass,
    /// Stop delivery here.
    Consumed,
}

pub type ImmediateFn = Arc<dyn Fn(&Envelope) -> Handled + Send + Sync>;

/// Where a listener's events go.
#[derive(Clone)]
pub enum Sink {
    /// Queue into a module mailbox. `owner` is the family whose `Error`
    /// event reports an overflow.
    Mailbox { mailbox: Arc<Mailbox>, owner: Family },
    /// Run inline on the publisher's task.
    Immediate(ImmediateFn),
}

impl std::fmt::Debug for Sink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Sink::Mailbox { mailbox, owner } => f
                .debug_struct("Mailbox")
                .field("mailbox", &mailbox.name())
                .field("owner", owner)
                .finish(),
            Sink::Immediate(_) => f.write_str("Immediate"),
        }
    }
}

/// One listener: a family filter, a rank and a sink.
#[derive(Debug, Clone)]
pub struct Subscription {
    pub listener: &'static str,
    pub family: Family,
    pub rank: Rank,
    pub sink: Sink,
}

impl Subscription {
    pub fn mailbox(
        listener: &'static str,
        family: Family,
        rank: Rank,
        mailbox: Arc<Mailbox>,
        owner: Family,
    ) -> Self {
        Self {
            listener,
            family,
            rank,
            sink: Sink::Mailbox { mailbox, owner },
        }
    }

    pub fn immediate<F>(listener: &'static str, family: Family, rank: Rank, f: F) -> Self
    where
        F: Fn(&Envelope) -> Handled + Send + Sync + 'static,
    {
        Self {
            listener,
            family,
            rank,
            sink: Sink::Immediate(Arc::new(f)),
        }
    }
}

/// Outcome of a successful publish.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Delivery {
    /// Listeners that received the event.
    pub delivered: usize,
    /// Immediate listener that consumed the event, if any.
    pub consumed_by: Option<&'static str>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BusError {
    /// The event pool refused the allocation; nothing was delivered.
    #[error("event pool exhausted, {event} dropped")]
    PoolExhausted { event: &'static str },

    /// A subscriber mailbox overflowed and was purged.
    #[error("mailbox of {module} overflowed")]
    MailboxFull { module: &'static str },
}

pub struct Bus {
    pool: Arc<EventPool>,
    listeners: RwLock<Arc<Vec<Subscription>>>,
}

impl Bus {
    /// Bus with `pool_capacity` ordinary slots plus the default control reserve.
    pub fn new(pool_capacity: usize) -> Self {
        Self::with_pool(EventPool::new(pool_capacity, EVENT_POOL_RESERVE))
    }

    pub fn with_pool(pool: Arc<EventPool>) -> Self {
        Self {
            pool,
            listeners: RwLock::new(Arc::new(Vec::new())),
        }
    }

    /// Insert a listener after every listener of the same or lower rank.
    pub fn subscribe(&self, subscription: Subscription) {
        let mut guard = self.listeners.write();
        let mut next: Vec<Subscription> = guard.as_ref().clone();
        let at = next
            .iter()
            .position(|s| s.rank > subscription.rank)
            .unwrap_or(next.len());
        debug!(
            "{} subscribed to {} at {:?}",
            subscription.listener,
            subscription.family.name(),
            subscription.rank
        );
        next.insert(at, subscription);
        *guard = Arc::new(next);
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }

    /// Allocate, deliver in rank order and report mailbox overflows.
    pub fn publish(&self, event: impl Into<Event>) -> Result<Delivery, BusError> {
        let event = event.into();
        let name = event.name();
        let Some(envelope) = self.pool.alloc(event) else {
            error!("Event pool exhausted, {name} dropped");
            return Err(BusError::PoolExhausted { event: name });
        };

        let family = envelope.family();
        let snapshot = self.listeners.read().clone();
        let mut delivery = Delivery::default();
        let mut overflowed: Vec<(Family, &'static str)> = Vec::new();

        for sub in snapshot.iter().filter(|s| s.family == family) {
            match &sub.sink {
                Sink::Mailbox { mailbox, owner } => match mailbox.push(envelope.clone()) {
                    Ok(()) => delivery.delivered += 1,
                    Err(e) => {
                        error!("{e}");
                        overflowed.push((*owner, mailbox.name()));
                    }
                },
                Sink::Immediate(callback) => {
                    delivery.delivered += 1;
                    if callback(&envelope) == Handled::Consumed {
                        debug!("{name} consumed by {}", sub.listener);
                        delivery.consumed_by = Some(sub.listener);
                        break;
                    }
                }
            }
        }
        drop(envelope);

        let Some(&(_, first)) = overflowed.first() else {
            return Ok(delivery);
        };
        for (owner, module) in overflowed {
            if let Err(e) = self.publish(Event::error(owner, ErrorCode::MailboxFull)) {
                warn!("Could not report overflow of {module}: {e}");
            }
        }
        Err(BusError::MailboxFull { module: first })
    }

    /// Slots held by undelivered or unprocessed events.
    pub fn in_flight(&self) -> usize {
        self.pool.in_flight()
    }

    /// Publishes refused by the pool.
    pub fn rejected(&self) -> u64 {
        self.pool.rejected()
    }
}
