//! A minimal bump allocator over one [`SharedRegion`], carving out each
//! block's control word, SQ, CQ, and pair of data banks. This is the
//! single-process generalization of the teacher's `SharedMemoryAllocator`:
//! no channel registry or cross-process attach is needed because the store
//! owns both "sides" of the simulation directly.

use crate::core::shared_memory::SharedRegion;
use crate::queue::layout::{block_region, BlockRegion};
use std::io;

pub struct Arena {
    region: SharedRegion,
    regions: Vec<BlockRegion>,
}

impl Arena {
    pub fn new(num_blocks: usize, queue_size: usize, max_value_size: usize) -> io::Result<Self> {
        let mut offset = 0usize;
        let mut regions = Vec::with_capacity(num_blocks);
        for _ in 0..num_blocks {
            let (region, len) = block_region(offset, queue_size, max_value_size);
            regions.push(region);
            offset += len;
        }

        let region = SharedRegion::create(offset.max(128))?;
        Ok(Self { region, regions })
    }

    pub fn region(&self, block: usize) -> BlockRegion {
        self.regions[block]
    }

    /// Raw base pointer. Every typed accessor in `queue::*` computes its own
    /// offset from this via the [`BlockRegion`] returned by [`Arena::region`].
    pub fn base_ptr(&self) -> *mut u8 {
        self.region.host_ptr().0
    }

    pub fn total_size(&self) -> usize {
        self.region.size()
    }
}

unsafe impl Send for Arena {}
unsafe impl Sync for Arena {}
