//! Synchronization primitives.
//!
//! Thin wrappers over `std::sync` or `parking_lot`, selected by the
//! `parking_lot` feature.

pub mod mutex;

pub use mutex::{Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};
