//! Tracker Common Library
//!
//! Shared data model for the tracker workspace: the event catalogue, the
//! device configuration record, constants, the TOML configuration loader,
//! the settings store and the watchdog contract.
//!
//! # Module Structure
//!
//! - [`consts`] - Queue sizes, timing defaults, reconnect table
//! - [`event`] - Per-family event enums and payloads
//! - [`device`] - Device configuration record and cloud updates
//! - [`error`] - Bus error codes and the collaborator error type
//! - [`config`] - `tracker.toml` loading
//! - [`settings`] - Key/value persistence
//! - [`watchdog`] - Watchdog lifecycle contract
//! - [`prelude`] - Common re-exports for convenience

pub mod config;
pub mod consts;
pub mod device;
pub mod error;
pub mod event;
pub mod prelude;
pub mod settings;
pub mod watchdog;
