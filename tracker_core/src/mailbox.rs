//! Bounded per-module mailbox.
//!
//! Many publishers, one consumer (the owning module task). `push` never
//! blocks: on overflow the whole queue is purged and the caller gets
//! [`MailboxError::Full`] so the overflow can be reported.

use std::collections::VecDeque;

use parking_lot::Mutex;
use tokio::sync::Notify;
use tracing::warn;

use crate::pool::Envelope;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MailboxError {
    /// Queue was full; it has been purged and the new entry dropped.
    #[error("mailbox {name} full, purged {purged} entries")]
    Full { name: &'static str, purged: usize },
}

#[derive(Debug)]
pub struct Mailbox {
    name: &'static str,
    capacity: usize,
    queue: Mutex<VecDeque<Envelope>>,
    ready: Notify,
}

impl Mailbox {
    pub fn new(name: &'static str, capacity: usize) -> Self {
        Self {
            name,
            capacity,
            queue: Mutex::new(VecDeque::with_capacity(capacity)),
            ready: Notify::new(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Enqueue without blocking.
    pub fn push(&self, envelope: Envelope) -> Result<(), MailboxError> {
        {
            let mut queue = self.queue.lock();
            if queue.len() >= self.capacity {
                let purged = queue.len();
                queue.clear();
                warn!(
                    "{}: message {} could not be enqueued, purged {purged} entries",
                    self.name,
                    envelope.name()
                );
                return Err(MailboxError::Full {
                    name: self.name,
                    purged,
                });
            }
            queue.push_back(envelope);
        }
        self.ready.notify_one();
        Ok(())
    }

    /// Oldest entry, without waiting.
    pub fn try_recv(&self) -> Option<Envelope> {
        self.queue.lock().pop_front()
    }

    /// Oldest entry, suspending until one arrives.
    pub async fn recv(&self) -> Envelope {
        loop {
            if let Some(envelope) = self.try_recv() {
                return envelope;
            }
            self.ready.notified().await;
        }
    }

    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.lock().is_empty()
    }

    /// Drop every queued entry, returning how many were dropped.
    pub fn purge(&self) -> usize {
        let mut queue = self.queue.lock();
        let purged = queue.len();
        queue.clear();
        purged
    }
}
