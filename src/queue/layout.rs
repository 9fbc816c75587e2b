//! Fixed-size slot types and per-block memory geometry (SPEC_FULL.md §3/§4.2/§4.3).

use crossbeam_utils::CachePadded;
use std::sync::atomic::{AtomicU32, AtomicU64};

/// Inline key capacity for one SQ slot. The spec parameterizes `maxKeySize`
/// at construction time; a fixed-size slot layout needs a compile-time
/// ceiling, so `max_key_size` is validated against this bound at
/// [`crate::store::KVStore::open`].
pub const MAX_KEY_INLINE: usize = 64;

/// The command carried by the leading slot of a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Cmd {
    Put = 0,
    MultiPut = 1,
    Get = 2,
    MultiGet = 3,
    Delete = 4,
    AsyncGetInitiate = 5,
    AsyncGetFinalize = 6,
    Exit = 7,
}

/// One Submission Queue slot. A batch of `increment_size` keys occupies
/// `increment_size` consecutive slots; every slot in the batch repeats the
/// command/request-id/increment-size descriptor (SPEC_FULL.md calls this out
/// as a deliberate simplification over "only the leading slot carries it")
/// so that any consumer reading at an arbitrary index within the batch can
/// self-describe without needing to reseek to the lead slot.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct RequestSlot {
    pub cmd: Cmd,
    pub request_id: u64,
    pub increment_size: u32,
    pub key_len: u32,
    pub value_len: u32,
    /// Valid only for `Cmd::AsyncGetFinalize`: the ticket being finalized.
    pub ticket: u64,
    /// Valid only for `Cmd::AsyncGetInitiate`: raw address of the
    /// `valueMultiBuffer` the caller supplied to Initiate, one
    /// `max_value_size` slice per key in the batch. The host GET writes
    /// directly here in the background; Finalize never re-reads it through
    /// the CQ (SPEC_FULL.md §4.6).
    pub async_value_ptr: u64,
    /// Valid only for `Cmd::AsyncGetInitiate`: raw address of the
    /// `statusMultiBuffer` the caller supplied to Initiate, one [`crate::error::KVStatus`]
    /// per key.
    pub async_status_ptr: u64,
    pub key: [u8; MAX_KEY_INLINE],
}

impl RequestSlot {
    pub const EMPTY: RequestSlot = RequestSlot {
        cmd: Cmd::Exit,
        request_id: 0,
        increment_size: 0,
        key_len: 0,
        value_len: 0,
        ticket: 0,
        async_value_ptr: 0,
        async_status_ptr: 0,
        key: [0; MAX_KEY_INLINE],
    };
}

/// One Completion Queue slot: a single (status, backend-code) pair. For a
/// batch of `n` keys the host pushes `n` consecutive slots — one pair per
/// key — so the accelerator-side `pop_get`/`pop_default` calls gather exactly
/// `batch_size` consecutive slots into the caller's status array
/// (SPEC_FULL.md §4.3, resolving the spec's own SQ/CQ slot-count asymmetry in
/// favor of what the `pop*` signatures actually require).
#[repr(C)]
#[derive(Clone, Copy)]
pub struct ResponseSlot {
    pub status: u8,
    pub storelib_status: i32,
    /// Populated only on the one-slot handshake response to
    /// `Cmd::AsyncGetInitiate`: the ticket the accelerator should remember.
    pub ticket: u64,
}

impl ResponseSlot {
    pub const EMPTY: ResponseSlot = ResponseSlot {
        status: 0,
        storelib_status: 0,
        ticket: 0,
    };
}

/// Atomic head/tail cursors and the futex word the host dispatcher blocks on,
/// shared between one block's accelerator caller and its host worker.
#[repr(C)]
pub struct BlockControl {
    pub sq_head: CachePadded<AtomicU64>,
    pub sq_tail: CachePadded<AtomicU64>,
    pub cq_head: CachePadded<AtomicU64>,
    pub cq_tail: CachePadded<AtomicU64>,
    /// Bumped and futex-woken every time the accelerator publishes an SQ
    /// batch, letting the host worker block instead of spin (SPEC_FULL.md §5).
    pub sq_signal: AtomicU32,
}

impl BlockControl {
    pub fn new() -> Self {
        Self {
            sq_head: CachePadded::new(AtomicU64::new(0)),
            sq_tail: CachePadded::new(AtomicU64::new(0)),
            cq_head: CachePadded::new(AtomicU64::new(0)),
            cq_tail: CachePadded::new(AtomicU64::new(0)),
            sq_signal: AtomicU32::new(0),
        }
    }
}

impl Default for BlockControl {
    fn default() -> Self {
        Self::new()
    }
}

/// Byte offsets of one block's carved-out region within the shared arena.
#[derive(Debug, Clone, Copy)]
pub struct BlockRegion {
    pub control_offset: usize,
    pub sq_offset: usize,
    pub cq_offset: usize,
    pub put_bank_offset: usize,
    pub get_bank_offset: usize,
}

/// Computes the byte layout for one block given the store's fixed geometry.
/// Returns `(region, total_bytes)`.
pub fn block_region(base_offset: usize, queue_size: usize, max_value_size: usize) -> (BlockRegion, usize) {
    fn align_up(v: usize, align: usize) -> usize {
        (v + align - 1) & !(align - 1)
    }

    let mut offset = align_up(base_offset, 128);
    let control_offset = offset;
    offset += align_up(std::mem::size_of::<BlockControl>(), 128);

    let sq_offset = offset;
    offset += align_up(queue_size * std::mem::size_of::<RequestSlot>(), 128);

    let cq_offset = offset;
    offset += align_up(queue_size * std::mem::size_of::<ResponseSlot>(), 128);

    let put_bank_offset = offset;
    offset += align_up(queue_size * max_value_size, 128);

    let get_bank_offset = offset;
    offset += align_up(queue_size * max_value_size, 128);

    (
        BlockRegion {
            control_offset,
            sq_offset,
            cq_offset,
            put_bank_offset,
            get_bank_offset,
        },
        offset - base_offset,
    )
}
