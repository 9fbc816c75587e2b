//! Safe `Debug` formatting for the raw-pointer-holding queue and arena types,
//! following the teacher's `Debug/StructDebug.rs` pattern of standalone
//! formatting functions invoked from the real `impl Debug` blocks.

use std::fmt;

use crate::core::Arena;
use crate::queue::{CompletionQueue, SubmissionQueue};

/// Shows queue geometry and cursor positions without dereferencing the
/// underlying shared-memory pointers.
pub fn debug_submission_queue(sq: &SubmissionQueue, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("SubmissionQueue")
        .field("queue_size", &sq.queue_size())
        .field("head", &sq.head())
        .field("tail", &sq.tail())
        .finish_non_exhaustive()
}

pub fn debug_completion_queue(cq: &CompletionQueue, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("CompletionQueue")
        .field("queue_size", &cq.queue_size())
        .field("head", &cq.head())
        .field("tail", &cq.tail())
        .finish_non_exhaustive()
}

pub fn debug_arena(arena: &Arena, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Arena")
        .field("base", &format_args!("{:p}", arena.base_ptr()))
        .field("total_size", &arena.total_size())
        .finish()
}

impl fmt::Debug for SubmissionQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        debug_submission_queue(self, f)
    }
}

impl fmt::Debug for CompletionQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        debug_completion_queue(self, f)
    }
}

impl fmt::Debug for Arena {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        debug_arena(self, f)
    }
}
