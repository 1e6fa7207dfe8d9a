//! # Tracker Core
//!
//! Event fabric of the asset tracker firmware.
//!
//! Eight modules (app, data, cloud, modem, location, sensor, ui, util) talk
//! only through the [`bus::Bus`]. Each runs on its own tokio task, drains
//! its [`mailbox::Mailbox`] and dispatches every event through its state
//! machine.
//!
//! ## Layers
//!
//! 1. **pool / bus / mailbox**: bounded event allocation and ranked delivery
//! 2. **module / registry / timer**: task runtime, shutdown ledger, timeouts
//! 3. **modules**: the tracker state machines
//! 4. **ports / codec**: collaborator traits the modules drive
//! 5. **system**: bootstrap wiring everything together

pub mod backoff;
pub mod bus;
pub mod codec;
pub mod mailbox;
pub mod manifest;
pub mod module;
pub mod modules;
pub mod pool;
pub mod ports;
pub mod registry;
pub mod system;
pub mod timer;

pub use bus::{Bus, BusError, Rank};
pub use system::{Backends, RuntimeConfig, System, SystemError};
