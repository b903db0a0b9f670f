//! Host-side utility building blocks used by the metadata and block-vector
//! implementations: alignment helpers, binary search helpers, a small JSON
//! writer, a POD growable vector, a bit-scan helper, and a slot-based pool
//! allocator.

pub mod bitscan;
pub mod json;
pub mod layout;
pub mod pool_alloc;
pub mod search;
pub mod vector;
