//! Status codes and error handling.
//!
//! South-bound calls historically returned a flat numeric status. This module
//! keeps that numbering in [`BviewStatus`] for collaborators that still speak
//! it, and exposes the idiomatic [`BviewError`] for everything inside Rust.

use std::fmt;
use thiserror::Error;

/// Numeric status codes understood by north-bound collaborators.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BviewStatus {
    Success = 0,
    Failure = 1,
    InvalidParameter = 2,
    Unsupported = 3,
    OutOfMemory = 4,
    Timeout = 5,
    NotReady = 6,
    TableFull = 7,
    InvalidCommand = 8,
    InvalidJson = 9,
    ResourceNotAvailable = 10,
    InvalidMemory = 11,
    OutOfRange = 12,
    InitFailed = 13,
    InvalidId = 14,
    Duplicate = 15,
}

impl BviewStatus {
    /// Creates a status from its raw value. Unknown values map to `Failure`.
    pub fn from_raw(status: i32) -> Self {
        match status {
            0 => BviewStatus::Success,
            1 => BviewStatus::Failure,
            2 => BviewStatus::InvalidParameter,
            3 => BviewStatus::Unsupported,
            4 => BviewStatus::OutOfMemory,
            5 => BviewStatus::Timeout,
            6 => BviewStatus::NotReady,
            7 => BviewStatus::TableFull,
            8 => BviewStatus::InvalidCommand,
            9 => BviewStatus::InvalidJson,
            10 => BviewStatus::ResourceNotAvailable,
            11 => BviewStatus::InvalidMemory,
            12 => BviewStatus::OutOfRange,
            13 => BviewStatus::InitFailed,
            14 => BviewStatus::InvalidId,
            15 => BviewStatus::Duplicate,
            _ => BviewStatus::Failure,
        }
    }

    /// Returns true if the status indicates success.
    pub fn is_success(&self) -> bool {
        *self == BviewStatus::Success
    }
}

impl fmt::Display for BviewStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BviewStatus::Success => "BVIEW_STATUS_SUCCESS",
            BviewStatus::Failure => "BVIEW_STATUS_FAILURE",
            BviewStatus::InvalidParameter => "BVIEW_STATUS_INVALID_PARAMETER",
            BviewStatus::Unsupported => "BVIEW_STATUS_UNSUPPORTED",
            BviewStatus::OutOfMemory => "BVIEW_STATUS_OUTOFMEMORY",
            BviewStatus::Timeout => "BVIEW_STATUS_TIMEOUT",
            BviewStatus::NotReady => "BVIEW_STATUS_NOTREADY",
            BviewStatus::TableFull => "BVIEW_STATUS_TABLE_FULL",
            BviewStatus::InvalidCommand => "BVIEW_STATUS_INVALID_COMMAND",
            BviewStatus::InvalidJson => "BVIEW_STATUS_INVALID_JSON",
            BviewStatus::ResourceNotAvailable => "BVIEW_STATUS_RESOURCE_NOT_AVAILABLE",
            BviewStatus::InvalidMemory => "BVIEW_STATUS_INVALID_MEMORY",
            BviewStatus::OutOfRange => "BVIEW_STATUS_OUTOFRANGE",
            BviewStatus::InitFailed => "BVIEW_STATUS_INIT_FAILED",
            BviewStatus::InvalidId => "BVIEW_STATUS_INVALID_ID",
            BviewStatus::Duplicate => "BVIEW_STATUS_DUPLICATE",
        };
        write!(f, "{}", s)
    }
}

/// Error type for redirector, cache and plugin operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BviewError {
    /// Null or out-of-range input.
    #[error("Invalid parameter: {message}")]
    InvalidParameter { message: String },

    /// No matching feature, plugin, unit or row.
    #[error("Not found: {item}")]
    NotFound { item: String },

    /// A computed index exceeds the declared size of its array.
    #[error("Index {index} out of range for {what} (size {size})")]
    OutOfRange {
        what: String,
        index: usize,
        size: usize,
    },

    /// The feature exists but does not implement the requested operation.
    #[error("Unsupported operation: {operation}")]
    Unsupported { operation: String },

    /// Connect, send or receive failed on the database session.
    #[error("Transport failure: {message}")]
    TransportFailure { message: String },

    /// A fixed-capacity table has no free slot.
    #[error("Table full: {table}")]
    TableFull { table: String },

    /// Generic or internal failure.
    #[error("Failure: {message}")]
    Failure { message: String },
}

impl BviewError {
    /// Creates an invalid parameter error.
    pub fn invalid_parameter(message: impl Into<String>) -> Self {
        BviewError::InvalidParameter {
            message: message.into(),
        }
    }

    /// Creates a not found error.
    pub fn not_found(item: impl Into<String>) -> Self {
        BviewError::NotFound { item: item.into() }
    }

    /// Creates an out of range error.
    pub fn out_of_range(what: impl Into<String>, index: usize, size: usize) -> Self {
        BviewError::OutOfRange {
            what: what.into(),
            index,
            size,
        }
    }

    /// Creates an unsupported operation error.
    pub fn unsupported(operation: impl Into<String>) -> Self {
        BviewError::Unsupported {
            operation: operation.into(),
        }
    }

    /// Creates a transport failure.
    pub fn transport(message: impl Into<String>) -> Self {
        BviewError::TransportFailure {
            message: message.into(),
        }
    }

    /// Creates a table full error.
    pub fn table_full(table: impl Into<String>) -> Self {
        BviewError::TableFull {
            table: table.into(),
        }
    }

    /// Creates a generic failure.
    pub fn failure(message: impl Into<String>) -> Self {
        BviewError::Failure {
            message: message.into(),
        }
    }

    /// Maps the error to its numeric wire status.
    pub fn status(&self) -> BviewStatus {
        match self {
            BviewError::InvalidParameter { .. } => BviewStatus::InvalidParameter,
            BviewError::NotFound { .. } => BviewStatus::Failure,
            BviewError::OutOfRange { .. } => BviewStatus::OutOfRange,
            BviewError::Unsupported { .. } => BviewStatus::Unsupported,
            BviewError::TransportFailure { .. } => BviewStatus::ResourceNotAvailable,
            BviewError::TableFull { .. } => BviewStatus::TableFull,
            BviewError::Failure { .. } => BviewStatus::Failure,
        }
    }

    /// Returns true if retrying the same call may succeed.
    ///
    /// Nothing in this workspace retries automatically; callers decide.
    pub fn is_retryable(&self) -> bool {
        matches!(self, BviewError::TransportFailure { .. })
    }
}

impl From<std::io::Error> for BviewError {
    fn from(e: std::io::Error) -> Self {
        BviewError::transport(e.to_string())
    }
}

/// Result type for BroadView operations.
pub type Result<T> = std::result::Result<T, BviewError>;
