//! Bounded event pool and the shared envelope.
//!
//! Every published event occupies one pool slot from allocation until the
//! last [`Envelope`] clone is dropped. Ordinary events may use `capacity`
//! slots; error and shutdown traffic may additionally dip into `reserve`,
//! so exhaustion can still be reported on the bus.

use std::fmt;
use std::ops::Deref;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use tracker_common::event::Event;

/// Slot accounting for published events.
#[derive(Debug)]
pub struct EventPool {
    capacity: usize,
    reserve: usize,
    in_flight: AtomicUsize,
    rejected: AtomicU64,
    seq: AtomicU64,
}

impl EventPool {
    pub fn new(capacity: usize, reserve: usize) -> Arc<Self> {
        Arc::new(Self {
            capacity,
            reserve,
            in_flight: AtomicUsize::new(0),
            rejected: AtomicU64::new(0),
            seq: AtomicU64::new(0),
        })
    }

    /// Take a slot for `event`. `None` if the pool is exhausted.
    pub fn alloc(self: &Arc<Self>, event: Event) -> Option<Envelope> {
        let limit = if event.is_control() {
            self.capacity + self.reserve
        } else {
            self.capacity
        };
        let taken = self
            .in_flight
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| (n < limit).then_some(n + 1));
        if taken.is_err() {
            self.rejected.fetch_add(1, Ordering::Relaxed);
            return None;
        }
        let seq = self.seq.fetch_add(1, Ordering::Relaxed) + 1;
        Some(Envelope(Arc::new(Slot {
            event,
            seq,
            pool: Arc::clone(self),
        })))
    }

    /// Slots currently held by live envelopes.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Allocations refused since creation.
    pub fn rejected(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

struct Slot {
    event: Event,
    seq: u64,
    pool: Arc<EventPool>,
}

impl Drop for Slot {
    fn drop(&mut self) {
        self.pool.in_flight.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Read-only, reference-counted published event.
#[derive(Clone)]
pub struct Envelope(Arc<Slot>);

impl Envelope {
    pub fn event(&self) -> &Event {
        &self.0.event
    }

    /// Publication sequence number, starts at 1.
    pub fn seq(&self) -> u64 {
        self.0.seq
    }
}

impl Deref for Envelope {
    type Target = Event;

    fn deref(&self) -> &Event {
        &self.0.event
    }
}

impl fmt::Debug for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Envelope")
            .field("seq", &self.0.seq)
            .field("event", &self.0.event)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracker_common::error::ErrorCode;
    use tracker_common::event::{AppEvent, Family};

    #[test]
    fn slot_returned_when_last_clone_drops() {
        let pool = EventPool::new(2, 0);
        let env = pool.alloc(AppEvent::Start.into()).unwrap();
        let copy = env.clone();
        assert_eq!(pool.in_flight(), 1);
        drop(env);
        assert_eq!(pool.in_flight(), 1);
        drop(copy);
        assert_eq!(pool.in_flight(), 0);
    }

    #[test]
    fn exhausted_pool_rejects_ordinary_events() {
        let pool = EventPool::new(1, 1);
        let _held = pool.alloc(AppEvent::Start.into()).unwrap();
        assert!(pool.alloc(AppEvent::DataGetAll.into()).is_none());
        assert_eq!(pool.rejected(), 1);
    }

    #[test]
    fn control_events_use_reserve() {
        let pool = EventPool::new(1, 1);
        let _held = pool.alloc(AppEvent::Start.into()).unwrap();
        let err = pool.alloc(Event::error(Family::Data, ErrorCode::OutOfMemory));
        assert!(err.is_some());
        assert!(pool.alloc(Event::error(Family::Data, ErrorCode::OutOfMemory)).is_none());
    }

    #[test]
    fn sequence_numbers_increase() {
        let pool = EventPool::new(4, 0);
        let a = pool.alloc(AppEvent::Start.into()).unwrap();
        let b = pool.alloc(AppEvent::Start.into()).unwrap();
        assert!(b.seq() > a.seq());
    }
}
