//! Error taxonomy for target and conversion failures.
//!
//! The bridge surfaces these as `bool`/`Option` results at its public
//! boundary; callers inside the crate propagate them with `?`.

use thiserror::Error;

/// Errors raised by memory targets (simulated or real)
#[derive(Error, Debug)]
pub enum TargetError {
    #[error("No process attached")]
    NotAttached,

    #[error("Process not found: {0}")]
    ProcessNotFound(String),

    #[error("Failed to attach to process {id}: {reason}")]
    AttachFailed { id: String, reason: String },

    #[error("Failed to detach from process {id}: {reason}")]
    DetachFailed { id: String, reason: String },

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Failed to read memory at {address:#x}: {reason}")]
    ReadFailed { address: u64, reason: String },

    #[error("Failed to write memory at {address:#x}: {reason}")]
    WriteFailed { address: u64, reason: String },

    #[error("Not supported on this platform: {0}")]
    Unsupported(&'static str),
}

/// Errors raised while converting between typed values and raw bytes
#[derive(Error, Debug)]
pub enum ConversionError {
    #[error("Invalid integer value: '{0}'")]
    BadInt(String),

    #[error("Invalid float value: '{0}'")]
    BadFloat(String),

    #[error("Unknown value type: '{0}'")]
    UnknownType(String),

    #[error("Invalid address format: '{0}'")]
    BadAddress(String),
}
