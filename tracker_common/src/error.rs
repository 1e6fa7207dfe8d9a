//! Error codes carried on the bus and the collaborator error type.
//!
//! [`ErrorCode`] is what travels inside `*Error` events; it is `Copy` so every
//! event stays cheap to clone. [`DriverError`] is what collaborator ports
//! (modem, sensor, location, cloud transport) return to the modules.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error code attached to an `Error` event of any module family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCode {
    /// A module mailbox overflowed and was purged.
    MailboxFull,
    /// The event pool rejected an allocation.
    OutOfMemory,
    /// Cloud reconnect attempts exhausted.
    NetworkUnreachable,
    /// Nothing to encode or send.
    NoData,
    /// An acknowledgment referenced an unknown payload.
    NotFound,
    /// A bounded bookkeeping list is full.
    ListFull,
    /// A collaborator (driver, transport, codec) failed.
    Driver,
    /// A request carried an invalid argument.
    InvalidArgument,
    /// The settings store failed.
    Settings,
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            Self::MailboxFull => "mailbox full",
            Self::OutOfMemory => "event pool exhausted",
            Self::NetworkUnreachable => "network unreachable",
            Self::NoData => "no data",
            Self::NotFound => "not found",
            Self::ListFull => "list full",
            Self::Driver => "driver failure",
            Self::InvalidArgument => "invalid argument",
            Self::Settings => "settings store failure",
        };
        f.write_str(text)
    }
}

/// Failure reported by an external collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DriverError {
    /// The requested measurement or feature is not available on this board.
    #[error("not supported")]
    NotSupported,

    /// The link the operation depends on is down.
    #[error("not connected")]
    NotConnected,

    /// The collaborator is busy with a previous request.
    #[error("busy")]
    Busy,

    /// The operation timed out.
    #[error("timed out")]
    Timeout,

    /// Hardware or transport I/O failure.
    #[error("I/O error: {0}")]
    Io(String),
}

impl From<&DriverError> for ErrorCode {
    fn from(_: &DriverError) -> Self {
        ErrorCode::Driver
    }
}
