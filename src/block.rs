//! A normal block: one device heap plus one block-metadata instance
//!.

use crate::metadata::BlockMetadata;
use crate::rhi::Rhi;

/// Which suballocation algorithm a block vector (and therefore every block
/// in it) uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Algorithm {
    Linear,
    General,
}

pub(crate) fn new_metadata(algorithm: Algorithm, size: u64, is_virtual: bool) -> Box<dyn BlockMetadata + Send> {
    match algorithm {
        Algorithm::Linear => Box::new(crate::metadata::linear::BlockMetadataLinear::new(size, is_virtual)),
        Algorithm::General => Box::new(crate::metadata::general::BlockMetadataGeneral::new(size, is_virtual)),
    }
}

/// One device heap plus its metadata, owned by a [`crate::block_vector::BlockVector`].
pub struct NormalBlock<R: Rhi> {
    pub(crate) heap: R::Heap,
    pub(crate) metadata: Box<dyn BlockMetadata + Send>,
    pub(crate) id: u64,
}

impl<R: Rhi> NormalBlock<R> {
    pub fn new(heap: R::Heap, metadata: Box<dyn BlockMetadata + Send>, id: u64) -> Self {
        Self { heap, metadata, id }
    }

    pub fn capacity(&self) -> u64 {
        self.metadata.size()
    }

    pub fn is_empty(&self) -> bool {
        self.metadata.is_empty()
    }

    pub fn id(&self) -> u64 {
        self.id
    }
}
