//! Per-block ticket table backing the async GET pipeline (SPEC_FULL.md §4.4,
//! §9 Open Question (a)). `asyncGetInitiate` hands back a ticket and kicks
//! off the batch's GETs on the rayon pool in the background, writing results
//! directly into the caller's `valueMultiBuffer`/`statusMultiBuffer`;
//! `asyncGetFinalize` only waits for that background work to finish, however
//! long it takes — the future carries no value of its own (SPEC_FULL.md §4.6).

use dashmap::DashMap;
use futures::future::{BoxFuture, Shared};
use futures::FutureExt;

use crate::error::KvError;

type SharedGet = Shared<BoxFuture<'static, ()>>;

/// Keyed by ticket (SPEC_FULL.md invariant 5: the CQ tail snapshot taken at
/// `asyncGetInitiate` time). One table per block: tickets never cross
/// blocks, matching the one-producer-one-consumer SQ/CQ pairing.
pub struct TicketTable {
    inflight: DashMap<u64, SharedGet>,
    capacity: usize,
}

impl TicketTable {
    pub fn new(capacity: usize) -> Self {
        Self {
            inflight: DashMap::new(),
            capacity,
        }
    }

    /// Registers a freshly-initiated async GET. `block` is only used for the
    /// error message; tickets are namespaced per-table by construction.
    pub fn register(&self, block: usize, ticket: u64, fut: BoxFuture<'static, ()>) -> Result<(), KvError> {
        if self.inflight.len() >= self.capacity {
            return Err(KvError::TicketTableFull { block });
        }
        self.inflight.insert(ticket, fut.shared());
        Ok(())
    }

    /// Removes and returns the future registered for `ticket`, if any. The
    /// ticket is consumed: `asyncGetFinalize` may only be called once per
    /// ticket (SPEC_FULL.md §4.4).
    pub fn take(&self, block: usize, ticket: u64) -> Result<SharedGet, KvError> {
        self.inflight
            .remove(&ticket)
            .map(|(_, fut)| fut)
            .ok_or(KvError::UnknownTicket { block, ticket })
    }

    pub fn len(&self) -> usize {
        self.inflight.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inflight.is_empty()
    }
}
