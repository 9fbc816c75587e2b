//! The accelerator-side API (SPEC_FULL.md §4.4): one [`BlockContext`] per
//! thread block, each owning its own SQ/CQ pair and a monotonic per-block
//! request-id counter. Every wait here busy-spins; the accelerator never
//! voluntarily yields (SPEC_FULL.md §5).

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::error::KVStatus;
use crate::queue::{Cmd, CompletionQueue, PushItem, SubmissionQueue};

/// Accelerator-facing handle onto one block's queue pair. Shares the same
/// underlying `SubmissionQueue`/`CompletionQueue` as the host `Worker` for
/// that block — the accelerator is the producer on one ring and the
/// consumer on the other, not a separate copy of the state.
pub struct BlockContext {
    sq: Arc<SubmissionQueue>,
    cq: Arc<CompletionQueue>,
    next_request_id: AtomicU64,
    max_value_size: usize,
    max_key_size: usize,
}

impl BlockContext {
    pub(crate) fn new(
        sq: Arc<SubmissionQueue>,
        cq: Arc<CompletionQueue>,
        max_value_size: usize,
        max_key_size: usize,
    ) -> Self {
        Self {
            sq,
            cq,
            next_request_id: AtomicU64::new(0),
            max_value_size,
            max_key_size,
        }
    }

    fn next_request_id(&self) -> u64 {
        self.next_request_id.fetch_add(1, Ordering::Relaxed)
    }

    fn check_key(&self, key: &[u8]) {
        assert!(
            key.len() <= self.max_key_size,
            "key of length {} exceeds max_key_size {}",
            key.len(),
            self.max_key_size
        );
    }

    fn push_spin(&self, cmd: Cmd, request_id: u64, ticket: u64, items: &[PushItem<'_>]) {
        while !self.sq.try_push(cmd, request_id, ticket, items) {
            std::hint::spin_loop();
        }
    }

    fn pop_default_spin(&self, batch_size: usize) -> Vec<(u8, i32)> {
        let mut status = vec![(0u8, 0i32); batch_size];
        loop {
            if self.cq.try_pop_default(batch_size, &mut status) {
                return status;
            }
            std::hint::spin_loop();
        }
    }

    fn pop_get_spin(&self, batch_size: usize, buf: &mut [u8]) -> Vec<(u8, i32)> {
        let mut status = vec![(0u8, 0i32); batch_size];
        loop {
            if self.cq.try_pop_get(batch_size, self.max_value_size, buf, &mut status) {
                return status;
            }
            std::hint::spin_loop();
        }
    }

    fn pop_no_res_msg_spin(&self) {
        loop {
            if self.cq.try_pop_no_res_msg().is_some() {
                return;
            }
            std::hint::spin_loop();
        }
    }

    fn pop_async_get_init_spin(&self) -> u64 {
        loop {
            if let Some(ticket) = self.cq.try_pop_async_get_init() {
                return ticket;
            }
            std::hint::spin_loop();
        }
    }

    /// SPEC_FULL.md §4.4 `put(key, value) -> status`.
    pub fn kv_put(&self, key: &[u8], value: &[u8]) -> KVStatus {
        self.check_key(key);
        let request_id = self.next_request_id();
        let items = [PushItem { key, value: Some(value) }];
        self.push_spin(Cmd::Put, request_id, 0, &items);
        let (status, code) = self.pop_default_spin(1)[0];
        decode_slot(status, code)
    }

    /// SPEC_FULL.md §4.4 `multiPut(keys, values) -> status[]`.
    pub fn kv_multi_put(&self, keys: &[&[u8]], values: &[&[u8]]) -> Vec<KVStatus> {
        assert_eq!(keys.len(), values.len());
        for key in keys {
            self.check_key(key);
        }
        let request_id = self.next_request_id();
        let items: Vec<PushItem<'_>> = keys
            .iter()
            .zip(values.iter())
            .map(|(k, v)| PushItem { key: k, value: Some(v) })
            .collect();
        self.push_spin(Cmd::MultiPut, request_id, 0, &items);
        self.pop_default_spin(keys.len())
            .into_iter()
            .map(|(s, c)| decode_slot(s, c))
            .collect()
    }

    /// SPEC_FULL.md §4.4 `get(key, buf) -> status`.
    pub fn kv_get(&self, key: &[u8], buf: &mut [u8]) -> KVStatus {
        self.check_key(key);
        assert!(buf.len() >= self.max_value_size);
        let request_id = self.next_request_id();
        let items = [PushItem { key, value: None }];
        self.push_spin(Cmd::Get, request_id, 0, &items);
        let (status, code) = self.pop_get_spin(1, buf)[0];
        decode_slot(status, code)
    }

    /// SPEC_FULL.md §4.4 `multiGet(keys, userBuffs, batchSize) -> status[]`.
    /// `buf` must hold `keys.len() * max_value_size` bytes, one slot per key.
    pub fn kv_multi_get(&self, keys: &[&[u8]], buf: &mut [u8]) -> Vec<KVStatus> {
        for key in keys {
            self.check_key(key);
        }
        assert!(buf.len() >= keys.len() * self.max_value_size);
        let request_id = self.next_request_id();
        let items: Vec<PushItem<'_>> = keys.iter().map(|k| PushItem { key: k, value: None }).collect();
        self.push_spin(Cmd::MultiGet, request_id, 0, &items);
        self.pop_get_spin(keys.len(), buf)
            .into_iter()
            .map(|(s, c)| decode_slot(s, c))
            .collect()
    }

    /// SPEC_FULL.md §4.4 `delete(key) -> status`.
    pub fn kv_delete(&self, key: &[u8]) -> KVStatus {
        self.check_key(key);
        let request_id = self.next_request_id();
        let items = [PushItem { key, value: None }];
        self.push_spin(Cmd::Delete, request_id, 0, &items);
        let (status, code) = self.pop_default_spin(1)[0];
        decode_slot(status, code)
    }

    /// SPEC_FULL.md §4.4
    /// `asyncGetInitiate(keys[], valueMultiBuffer, statusMultiBuffer, n) -> ticket`.
    /// Blocks (spinning) only for the one-slot handshake, not for the GETs
    /// themselves: the host writes results directly into `value_multi_buf`/
    /// `status_multi_buf` in the background (SPEC_FULL.md §4.6), so those
    /// buffers must stay alive and unaliased until the matching
    /// [`Self::kv_async_get_finalize`] returns.
    pub fn kv_async_get_initiate(
        &self,
        keys: &[&[u8]],
        value_multi_buf: &mut [u8],
        status_multi_buf: &mut [KVStatus],
    ) -> u64 {
        assert_eq!(keys.len(), status_multi_buf.len());
        assert!(value_multi_buf.len() >= keys.len() * self.max_value_size);
        for key in keys {
            self.check_key(key);
        }
        let request_id = self.next_request_id();
        let items: Vec<PushItem<'_>> = keys.iter().map(|k| PushItem { key: k, value: None }).collect();
        let value_ptr = value_multi_buf.as_mut_ptr() as u64;
        let status_ptr = status_multi_buf.as_mut_ptr() as u64;
        while !self.sq.try_push_async_initiate(request_id, &items, value_ptr, status_ptr) {
            std::hint::spin_loop();
        }
        self.pop_async_get_init_spin()
    }

    /// SPEC_FULL.md §4.4 `asyncGetFinalize(ticket)`. Blocks until the host
    /// future behind `ticket` resolves; takes no output parameter because
    /// the result bytes and statuses were already written directly into the
    /// buffers supplied to the matching `asyncGetInitiate` call
    /// (SPEC_FULL.md §4.6).
    pub fn kv_async_get_finalize(&self, ticket: u64) {
        let request_id = self.next_request_id();
        let items = [PushItem { key: &[], value: None }];
        self.push_spin(Cmd::AsyncGetFinalize, request_id, ticket, &items);
        self.pop_no_res_msg_spin();
    }

    /// SPEC_FULL.md §4.4 `exit()`: tells the owning host worker to stop.
    pub fn kv_exit(&self) {
        let request_id = self.next_request_id();
        self.push_spin(Cmd::Exit, request_id, 0, &[]);
        self.pop_no_res_msg_spin();
    }
}

fn decode_slot(status: u8, storelib_status: i32) -> KVStatus {
    match status {
        0 => KVStatus::Success,
        1 => KVStatus::NonExist,
        3 => KVStatus::Exit,
        _ => {
            let _ = storelib_status;
            KVStatus::Fail
        }
    }
}
