//! Recoverable error type for allocation requests.
//!
//! Programmer errors (destroying a pool with live allocations, enumerating
//! defragmentation moves on metadata that doesn't support it, mismatched
//! handle/block pairs) are `assert!`/`debug_assert!`, not `Result` — see the
//! crate-level error handling notes in DESIGN.md.

use std::fmt;

/// Error returned by a fallible allocation or pool operation.
#[derive(Debug)]
pub enum AllocError {
    /// The device reported it has no more memory of the requested type.
    OutOfDeviceMemory,
    /// The host process is out of memory (object-pool growth, metadata growth).
    OutOfHostMemory,
    /// A descriptor field was invalid (zero size, bad alignment, conflicting flags).
    InvalidArgument(&'static str),
    /// The request would exceed a custom pool's or the allocator's configured budget.
    WithinBudgetExceeded,
    /// The requested combination of flags/heap type is not supported by this Rhi.
    NotSupported(&'static str),
}

impl fmt::Display for AllocError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AllocError::OutOfDeviceMemory => write!(f, "out of device memory"),
            AllocError::OutOfHostMemory => write!(f, "out of host memory"),
            AllocError::InvalidArgument(msg) => write!(f, "invalid argument: {msg}"),
            AllocError::WithinBudgetExceeded => write!(f, "allocation would exceed configured budget"),
            AllocError::NotSupported(msg) => write!(f, "not supported: {msg}"),
        }
    }
}

impl std::error::Error for AllocError {}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, AllocError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages_are_stable() {
        assert_eq!(AllocError::OutOfDeviceMemory.to_string(), "out of device memory");
        assert_eq!(
            AllocError::InvalidArgument("size must be nonzero").to_string(),
            "invalid argument: size must be nonzero"
        );
    }

    #[test]
    fn implements_std_error() {
        fn assert_error<E: std::error::Error>() {}
        assert_error::<AllocError>();
    }
}
