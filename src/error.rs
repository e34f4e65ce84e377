//! Error types for the cortical engine.
//!
//! A single `thiserror`-derived enum covers every fallible operation in the
//! crate: device construction, kernel dispatch, and the configuration
//! loader. There are no internal retries; every error propagates to the
//! caller.

use thiserror::Error;

/// The main error type for cortical engine operations.
#[derive(Error, Debug)]
pub enum CoreError {
    /// No compute device is available to back a `ComputeContext`.
    #[error("no compute device available")]
    NoDevice,

    /// Kernel source was rejected at build time, with the backend's build log.
    #[error("kernel build failed: {0}")]
    KernelBuildFailure(String),

    /// An input or output buffer did not match the shape the region expects.
    #[error("invalid shape: expected {expected}, got {actual}")]
    InvalidShape {
        /// Expected length.
        expected: usize,
        /// Actual length received.
        actual: usize,
    },

    /// A kernel dispatch or buffer transfer failed on the backend.
    #[error("backend error {code} ({name}): {message}")]
    BackendError {
        /// Raw status code reported by the backend.
        code: i32,
        /// Name resolved from [`status_to_name`].
        name: &'static str,
        /// Backend-supplied detail.
        message: String,
    },

    /// An `Args`/`Topology` field held a value outside its documented domain.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// I/O error while loading a configuration file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error while loading/saving configuration.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CoreError {
    /// Build a [`CoreError::BackendError`] from a raw status code, resolving
    /// its name through [`status_to_name`].
    pub fn backend(code: i32, message: impl Into<String>) -> Self {
        CoreError::BackendError {
            code,
            name: status_to_name(code),
            message: message.into(),
        }
    }
}

/// Translate a raw backend status code into a stable name.
///
/// Mirrors the original engine's single `getCLError` switch table: a status
/// code is resolved to a name in exactly one place, kept apart from control
/// flow so callers only ever see [`CoreError::BackendError`].
pub fn status_to_name(code: i32) -> &'static str {
    match code {
        0 => "SUCCESS",
        -1 => "DEVICE_NOT_FOUND",
        -2 => "DEVICE_NOT_AVAILABLE",
        -3 => "COMPILER_NOT_AVAILABLE",
        -4 => "MEM_OBJECT_ALLOCATION_FAILURE",
        -5 => "OUT_OF_RESOURCES",
        -6 => "OUT_OF_HOST_MEMORY",
        -11 => "BUILD_PROGRAM_FAILURE",
        -30 => "INVALID_VALUE",
        -38 => "INVALID_MEM_OBJECT",
        -54 => "INVALID_WORK_GROUP_SIZE",
        _ => "UNKNOWN_ERROR",
    }
}

/// A specialized `Result` type for cortical engine operations.
pub type Result<T> = std::result::Result<T, CoreError>;
