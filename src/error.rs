//! Error taxonomy for the store's construction path and the per-key status
//! codes observed on the hot path (spec.md/SPEC_FULL.md §7).

use std::fmt;

/// Construction / administrative errors. Never raised from the accelerator-side
/// hot path (§4.4): invariant violations there are caller errors, not
/// recoverable `Result`s, per the spec's explicit "not bounds-checked at
/// steady state" contract.
#[derive(Debug, thiserror::Error)]
pub enum KvError {
    #[error("max_num_keys must be >= 1, got {0}")]
    InvalidMaxNumKeys(usize),

    #[error("queue_size ({queue_size}) must be >= max_num_keys ({max_num_keys})")]
    QueueTooSmall {
        queue_size: usize,
        max_num_keys: usize,
    },

    #[error("max_value_size must be >= 1, got {0}")]
    InvalidMaxValueSize(usize),

    #[error("max_key_size must be between 1 and {MAX_KEY_INLINE}, got {0}", MAX_KEY_INLINE = crate::queue::layout::MAX_KEY_INLINE)]
    InvalidMaxKeySize(usize),

    #[error("num_blocks must be >= 1, got {0}")]
    InvalidNumBlocks(usize),

    #[error("queue_size must be a power of two, got {0}")]
    QueueSizeNotPowerOfTwo(usize),

    #[error("shared memory allocation failed: {0}")]
    SharedMemory(#[from] std::io::Error),

    #[error("backend open failed: {0}")]
    BackendOpen(String),

    #[error("block index {index} out of range (num_blocks = {num_blocks})")]
    BlockOutOfRange { index: usize, num_blocks: usize },

    #[error("ticket table for block {block} is full, refusing async GET initiate")]
    TicketTableFull { block: usize },

    #[error("unknown ticket {ticket} for block {block}")]
    UnknownTicket { block: usize, ticket: u64 },

    #[error("store already closed")]
    AlreadyClosed,
}

/// Per-key completion status observed by a caller after a PUT/GET/DELETE,
/// exactly the four variants named in spec.md §7.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum KVStatus {
    /// Completed successfully.
    Success = 0,
    /// Key absent on GET/DELETE.
    NonExist = 1,
    /// Backend error; diagnostic was logged with command name and request id.
    Fail = 2,
    /// Informational status written on the EXIT completion.
    Exit = 3,
}

impl fmt::Display for KVStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            KVStatus::Success => "SUCCESS",
            KVStatus::NonExist => "NON_EXIST",
            KVStatus::Fail => "FAIL",
            KVStatus::Exit => "EXIT",
        };
        f.write_str(s)
    }
}

/// Backend return code space from §6: `0 = OK`, `5 = not-found`, anything
/// else is an opaque backend error. `StorelibStatus` in the data model is
/// this raw code, carried through for diagnostics without reinterpretation.
pub type StorelibStatus = i32;

pub const BACKEND_OK: StorelibStatus = 0;
pub const BACKEND_NOT_FOUND: StorelibStatus = 5;

/// Backend-agnostic status decoding (§4.5 "Status decoding"): translate a raw
/// backend return code into the caller-visible [`KVStatus`], logging `FAIL`
/// outcomes with the command name and request id.
pub fn decode_status(code: StorelibStatus, cmd: &str, request_id: u64) -> KVStatus {
    match code {
        BACKEND_OK => KVStatus::Success,
        BACKEND_NOT_FOUND => KVStatus::NonExist,
        other => {
            tracing::warn!(cmd, request_id, backend_code = other, "backend call failed");
            KVStatus::Fail
        }
    }
}
