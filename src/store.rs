//! The top-level handle (SPEC_FULL.md §2/§6): owns the shared arena, the
//! backend, one [`BlockContext`]/[`Worker`] pair per block, and the ticket
//! tables backing async GET. This is the crate's `KVStore`, the thing an
//! embedder constructs once and then drives from many accelerator threads.

use std::sync::Arc;

use crate::accel::BlockContext;
use crate::backend::{Backend, MemoryBackend, SledBackend};
use crate::config::{BackendKind, StoreConfig};
use crate::core::Arena;
use crate::dispatch::Worker;
use crate::error::KvError;
use crate::queue::layout::MAX_KEY_INLINE;
use crate::queue::{CompletionQueue, SubmissionQueue};
use crate::ticket::TicketTable;

pub struct KVStore {
    // Declaration order is drop order: queues/workers must release their
    // raw pointers into the arena before the arena itself is unmapped.
    blocks: Vec<BlockContext>,
    workers: Vec<Worker>,
    backend: Arc<dyn Backend>,
    _arena: Arc<Arena>,
    closed: bool,
}

impl KVStore {
    pub fn open(config: StoreConfig) -> Result<Self, KvError> {
        validate(&config)?;

        let backend: Arc<dyn Backend> = match &config.backend {
            BackendKind::Memory => Arc::new(MemoryBackend::new()),
            BackendKind::Sled { path } => Arc::new(SledBackend::open(path)?),
        };

        let arena = Arc::new(Arena::new(config.num_blocks, config.queue_size, config.max_value_size)?);
        let pool = Arc::new(
            rayon::ThreadPoolBuilder::new()
                .thread_name(|i| format!("gpukv-pool-{i}"))
                .build()
                .expect("failed to build rayon thread pool"),
        );

        let mut blocks = Vec::with_capacity(config.num_blocks);
        let mut workers = Vec::with_capacity(config.num_blocks);

        for block in 0..config.num_blocks {
            let region = arena.region(block);
            let base = arena.base_ptr();

            let control = unsafe { base.add(region.control_offset) as *mut crate::queue::layout::BlockControl };
            unsafe { std::ptr::write(control, crate::queue::layout::BlockControl::new()) };

            let sq_slots = unsafe { base.add(region.sq_offset) as *mut crate::queue::layout::RequestSlot };
            let cq_slots = unsafe { base.add(region.cq_offset) as *mut crate::queue::layout::ResponseSlot };
            let put_bank = unsafe { base.add(region.put_bank_offset) };
            let get_bank = unsafe { base.add(region.get_bank_offset) };

            let sq = Arc::new(unsafe {
                SubmissionQueue::new(control, sq_slots, put_bank, config.queue_size, config.max_value_size)
            });
            let cq = Arc::new(unsafe {
                CompletionQueue::new(control, cq_slots, get_bank, config.queue_size, config.max_value_size)
            });

            let tickets = Arc::new(TicketTable::new(config.max_num_keys));
            let worker = Worker::spawn(block, Arc::clone(&sq), Arc::clone(&cq), Arc::clone(&backend), tickets, Arc::clone(&pool));

            blocks.push(BlockContext::new(sq, cq, config.max_value_size, config.max_key_size));
            workers.push(worker);
        }

        Ok(Self {
            blocks,
            workers,
            backend,
            _arena: arena,
            closed: false,
        })
    }

    pub fn num_blocks(&self) -> usize {
        self.blocks.len()
    }

    pub fn block(&self, index: usize) -> Result<&BlockContext, KvError> {
        self.blocks.get(index).ok_or(KvError::BlockOutOfRange {
            index,
            num_blocks: self.blocks.len(),
        })
    }

    /// Broadcasts `exit` to every block's worker and joins its thread. Safe
    /// to call more than once: a repeat call is a caller error reported as
    /// `KvError::AlreadyClosed` rather than re-running shutdown (SPEC_FULL.md
    /// §8 Testable Property 5).
    pub fn close_db(&mut self) -> Result<(), KvError> {
        if self.closed {
            return Err(KvError::AlreadyClosed);
        }
        for block in &self.blocks {
            block.kv_exit();
        }
        for worker in self.workers.drain(..) {
            worker.join();
        }
        self.backend.close_db();
        self.closed = true;
        Ok(())
    }

    pub fn delete_db(&mut self) -> Result<(), KvError> {
        let _ = self.close_db();
        let code = self.backend.delete_db();
        if code != crate::error::BACKEND_OK {
            return Err(KvError::BackendOpen(format!("delete_db failed with code {code}")));
        }
        Ok(())
    }
}

impl Drop for KVStore {
    fn drop(&mut self) {
        let _ = self.close_db();
    }
}

fn validate(config: &StoreConfig) -> Result<(), KvError> {
    if config.num_blocks == 0 {
        return Err(KvError::InvalidNumBlocks(config.num_blocks));
    }
    if config.max_num_keys == 0 {
        return Err(KvError::InvalidMaxNumKeys(config.max_num_keys));
    }
    if config.max_value_size == 0 {
        return Err(KvError::InvalidMaxValueSize(config.max_value_size));
    }
    if config.max_key_size == 0 || config.max_key_size > MAX_KEY_INLINE {
        return Err(KvError::InvalidMaxKeySize(config.max_key_size));
    }
    if !config.queue_size.is_power_of_two() {
        return Err(KvError::QueueSizeNotPowerOfTwo(config.queue_size));
    }
    if config.queue_size < config.max_num_keys {
        return Err(KvError::QueueTooSmall {
            queue_size: config.queue_size,
            max_num_keys: config.max_num_keys,
        });
    }
    Ok(())
}
