//! Sampling manifest: fan-in bookkeeping for one sampling cycle.
//!
//! The data module opens a manifest for every `DataGet`, records each
//! response against it and fires `DataReady` either when every requested
//! kind answered or when the cycle's timeout arrives, whichever is
//! processed first. Cycle ids let a late timeout from an older cycle be
//! recognised and dropped.

use tracing::{debug, warn};

use tracker_common::event::{DataKind, DataKinds};

/// Outcome of [`SamplingManifest::record`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    /// Counted; `remaining` kinds still outstanding.
    Counted { remaining: usize },
    /// Last outstanding kind; the cycle fired.
    Complete,
    /// This kind already answered in the current cycle.
    Duplicate,
    /// Not part of the current request.
    NotRequested,
    /// No cycle is open.
    Idle,
}

#[derive(Debug, Clone, Default)]
pub struct SamplingManifest {
    cycle: u32,
    requested: DataKinds,
    responded: DataKinds,
    open: bool,
}

impl SamplingManifest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a new cycle for `kinds` and return its id. An open cycle is replaced.
    pub fn begin(&mut self, kinds: DataKinds) -> u32 {
        if self.open {
            warn!(
                "Cycle {} replaced with {}/{} responses",
                self.cycle,
                self.responses_received(),
                self.requested_count()
            );
        }
        self.cycle = self.cycle.wrapping_add(1);
        self.requested = kinds;
        self.responded = DataKinds::empty();
        self.open = !kinds.is_empty();
        self.cycle
    }

    pub fn record(&mut self, kind: DataKind) -> RecordOutcome {
        if !self.open {
            return RecordOutcome::Idle;
        }
        if !self.requested.includes(kind) {
            return RecordOutcome::NotRequested;
        }
        if self.responded.includes(kind) {
            debug!("Cycle {}: duplicate {kind:?}", self.cycle);
            return RecordOutcome::Duplicate;
        }
        self.responded |= DataKinds::from(kind);
        if self.responded == self.requested {
            self.open = false;
            RecordOutcome::Complete
        } else {
            RecordOutcome::Counted {
                remaining: self.requested_count() - self.responses_received(),
            }
        }
    }

    /// Fire on timeout. True only if `cycle` is the open cycle.
    pub fn expire(&mut self, cycle: u32) -> bool {
        if !self.open || cycle != self.cycle {
            debug!("Stale timeout for cycle {cycle}, current {}", self.cycle);
            return false;
        }
        self.open = false;
        true
    }

    pub fn cycle(&self) -> u32 {
        self.cycle
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn requested(&self) -> DataKinds {
        self.requested
    }

    pub fn requested_count(&self) -> usize {
        self.requested.count()
    }

    pub fn responses_received(&self) -> usize {
        self.responded.count()
    }
}
