//! Module registry and shutdown ledger.
//!
//! Hands out [`ModuleId`]s and tracks which shutdown-capable modules still
//! owe an acknowledgment. The whole ledger sits behind one mutex; every
//! critical section is a few comparisons long.

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use tracker_common::event::ModuleId;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// A module with this name is already registered.
    #[error("module {0} already registered")]
    Duplicate(&'static str),

    /// Registration after the shutdown ledger has completed.
    #[error("registry closed, {0} cannot register")]
    Closed(&'static str),
}

/// Result of recording a shutdown acknowledgment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownProgress {
    /// Acknowledgment counted, `remaining` modules still pending.
    Pending { remaining: usize },
    /// The last pending module acknowledged. Reported exactly once.
    Complete,
    /// This module already acknowledged; nothing changed.
    Duplicate { remaining: usize },
    /// Id not registered or not shutdown-capable.
    Unknown,
}

#[derive(Debug)]
struct Record {
    id: ModuleId,
    name: &'static str,
    supports_shutdown: bool,
    acked: bool,
}

#[derive(Debug, Default)]
struct Ledger {
    last_id: u32,
    modules: Vec<Record>,
    complete: bool,
}

impl Ledger {
    fn remaining(&self) -> usize {
        self.modules
            .iter()
            .filter(|m| m.supports_shutdown && !m.acked)
            .count()
    }
}

#[derive(Debug, Default)]
pub struct ModuleRegistry {
    ledger: Mutex<Ledger>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a module. Ids are monotonic and start at 1.
    pub fn module_start(
        &self,
        name: &'static str,
        supports_shutdown: bool,
    ) -> Result<ModuleId, RegistryError> {
        let mut ledger = self.ledger.lock();
        if ledger.complete {
            return Err(RegistryError::Closed(name));
        }
        if ledger.modules.iter().any(|m| m.name == name) {
            return Err(RegistryError::Duplicate(name));
        }
        ledger.last_id += 1;
        let id = ModuleId(ledger.last_id);
        ledger.modules.push(Record {
            id,
            name,
            supports_shutdown,
            acked: false,
        });
        info!("Module {name} started, id {id}");
        Ok(id)
    }

    /// Record a shutdown acknowledgment from `id`.
    pub fn shutdown_register(&self, id: ModuleId) -> ShutdownProgress {
        let mut ledger = self.ledger.lock();
        let Some(record) = ledger
            .modules
            .iter_mut()
            .find(|m| m.id == id && m.supports_shutdown)
        else {
            warn!("Shutdown ack from unknown module {id}");
            return ShutdownProgress::Unknown;
        };
        if record.acked {
            let name = record.name;
            let remaining = ledger.remaining();
            debug!("Repeated shutdown ack from {name}, ignored");
            return ShutdownProgress::Duplicate { remaining };
        }
        record.acked = true;
        let name = record.name;
        let remaining = ledger.remaining();
        if remaining == 0 {
            ledger.complete = true;
            info!("{name} acknowledged shutdown, all modules ready");
            ShutdownProgress::Complete
        } else {
            info!("{name} acknowledged shutdown, {remaining} pending");
            ShutdownProgress::Pending { remaining }
        }
    }

    /// Shutdown-capable modules that have not acknowledged yet.
    pub fn active_count(&self) -> usize {
        self.ledger.lock().remaining()
    }

    pub fn registered(&self) -> usize {
        self.ledger.lock().modules.len()
    }

    pub fn name_of(&self, id: ModuleId) -> Option<&'static str> {
        self.ledger
            .lock()
            .modules
            .iter()
            .find(|m| m.id == id)
            .map(|m| m.name)
    }

    pub fn is_complete(&self) -> bool {
        self.ledger.lock().complete
    }
}
