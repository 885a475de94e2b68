//! Error types for the Orrery render core.
//!
//! One crate-level error enum covers the fatal taxonomy: backend/device
//! failures, allocation failure, resource misuse, descriptor partition
//! exhaustion and initialization failures. Recoverable conditions (a shader
//! that fails to compile) and transient conditions (an upload still in
//! flight) are deliberately not represented here; they are reported through
//! return values and state checks and never unwind.

use std::fmt;

/// Result type for Orrery render-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Orrery render-core errors
#[derive(Debug, Clone)]
pub enum Error {
    /// Backend-specific error (Vulkan, mock, etc.)
    BackendError(String),

    /// Out of GPU memory
    OutOfMemory,

    /// Invalid resource, or invalid use of a resource
    /// (e.g. a CPU copy into a device-local buffer)
    InvalidResource(String),

    /// A fixed-capacity descriptor partition is full
    CapacityExhausted(String),

    /// Initialization failed (device, swapchain, viewer)
    InitializationFailed(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::BackendError(msg) => write!(f, "Backend error: {}", msg),
            Error::OutOfMemory => write!(f, "Out of GPU memory"),
            Error::InvalidResource(msg) => write!(f, "Invalid resource: {}", msg),
            Error::CapacityExhausted(msg) => write!(f, "Capacity exhausted: {}", msg),
            Error::InitializationFailed(msg) => write!(f, "Initialization failed: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

/// Build an `Error::BackendError` from a format string, logging it with
/// source location through the crate logging system.
#[macro_export]
macro_rules! render_err {
    ($source:expr, $($arg:tt)*) => {{
        let message = format!($($arg)*);
        $crate::render_error!($source, "{}", message);
        $crate::error::Error::BackendError(message)
    }};
}

/// Log an error and return early from the enclosing function with
/// `Err(Error::BackendError(...))`.
#[macro_export]
macro_rules! render_bail {
    ($source:expr, $($arg:tt)*) => {
        return Err($crate::render_err!($source, $($arg)*))
    };
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
