//! Error types for usbeeprom-core

use std::fmt;

use thiserror::Error;

use crate::transport::Endpoint;

/// Coarse classification of a transport failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// A single bulk transfer did not complete within its timeout
    Timeout,
    /// The endpoint stalled
    Stall,
    /// The device went away
    Disconnected,
    /// The device or interface is in use by someone else
    Busy,
    /// Insufficient permissions to open the device
    Access,
    /// The device or endpoint does not exist
    NotFound,
    /// Anything else reported by the USB stack
    Other,
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransportErrorKind::Timeout => "timeout",
            TransportErrorKind::Stall => "stall",
            TransportErrorKind::Disconnected => "disconnected",
            TransportErrorKind::Busy => "busy",
            TransportErrorKind::Access => "access denied",
            TransportErrorKind::NotFound => "not found",
            TransportErrorKind::Other => "other",
        };
        f.write_str(name)
    }
}

/// Failure reported by the USB transport
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} ({kind})")]
pub struct TransportError {
    kind: TransportErrorKind,
    message: String,
}

impl TransportError {
    /// Create a transport error with the library's description
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Shorthand for a timed out transfer
    pub fn timeout() -> Self {
        Self::new(TransportErrorKind::Timeout, "transfer timed out")
    }

    /// Error classification
    pub fn kind(&self) -> TransportErrorKind {
        self.kind
    }

    /// Human readable description from the USB stack
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Errors returned by device operations
#[derive(Debug, Error)]
pub enum Error {
    /// A data operation was given an empty buffer
    #[error("no data")]
    EmptyBuffer,

    /// `start + len` runs past the end of the address space
    #[error("too much data: {len} bytes at 0x{start:04X} exceeds the 64 KiB address space")]
    OutOfRange {
        /// Requested start address
        start: u16,
        /// Requested length
        len: usize,
    },

    /// Configured chunk size is larger than the endpoint's packet size
    #[error("invalid packet size {requested} (endpoint maximum is {max})")]
    InvalidChunkSize {
        /// Requested chunk size
        requested: usize,
        /// Endpoint maximum packet size
        max: usize,
    },

    /// The USB transport failed
    #[error("USB transfer failed: {0}")]
    Transport(#[from] TransportError),

    /// A transfer completed without moving any data
    #[error("transfer on {endpoint} endpoint made no progress")]
    NoProgress {
        /// Endpoint the transfer was issued on
        endpoint: Endpoint,
    },

    /// The status word read back after a command did not match
    #[error("expected status 0x{expected:04x}; got 0x{actual:04x}")]
    StatusMismatch {
        /// Status the command should have produced
        expected: u16,
        /// Status reported by the programmer
        actual: u16,
    },

    /// No matching programmer is attached
    #[error("no devices found")]
    DeviceNotFound,
}

impl Error {
    /// Whether this error was raised before any I/O took place
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Error::EmptyBuffer | Error::OutOfRange { .. } | Error::InvalidChunkSize { .. }
        )
    }
}

/// Result type alias using the core Error type
pub type Result<T> = std::result::Result<T, Error>;
