//! The accelerator-producer / host-consumer Submission Queue (SPEC_FULL.md §4.2).

use std::sync::atomic::Ordering::{Acquire, Relaxed, Release};

use super::layout::{BlockControl, Cmd, RequestSlot, MAX_KEY_INLINE};
use crate::core::futex;

/// A view over one block's SQ slots and paired PUT data bank, carved out of
/// the shared arena. `SubmissionQueue` itself holds no lock: exactly one
/// accelerator caller produces and exactly one host worker consumes, per
/// SPEC_FULL.md invariant 7.
pub struct SubmissionQueue {
    control: *mut BlockControl,
    slots: *mut RequestSlot,
    put_bank: *mut u8,
    queue_size: usize,
    max_value_size: usize,
}

unsafe impl Send for SubmissionQueue {}
unsafe impl Sync for SubmissionQueue {}

/// Describes one push: either key-only (GET/DELETE/async-initiate) or
/// key+value (PUT).
pub struct PushItem<'a> {
    pub key: &'a [u8],
    pub value: Option<&'a [u8]>,
}

impl SubmissionQueue {
    /// # Safety
    /// `control` and `slots` must point into a live arena region sized for
    /// `queue_size` slots, and `put_bank` must have room for
    /// `queue_size * max_value_size` bytes.
    pub unsafe fn new(
        control: *mut BlockControl,
        slots: *mut RequestSlot,
        put_bank: *mut u8,
        queue_size: usize,
        max_value_size: usize,
    ) -> Self {
        for i in 0..queue_size {
            std::ptr::write(slots.add(i), RequestSlot::EMPTY);
        }
        Self {
            control,
            slots,
            put_bank,
            queue_size,
            max_value_size,
        }
    }

    fn control(&self) -> &BlockControl {
        unsafe { &*self.control }
    }

    unsafe fn slot_mut(&self, idx: u64) -> *mut RequestSlot {
        self.slots.add((idx as usize) & (self.queue_size - 1))
    }

    unsafe fn bank_mut(&self, idx: u64) -> *mut u8 {
        self.put_bank
            .add(((idx as usize) & (self.queue_size - 1)) * self.max_value_size)
    }

    /// Accelerator-side: attempt to publish a batch of `items.len()` slots
    /// for `cmd` under `request_id`/`ticket`. Returns `false` without
    /// mutating any state if the ring does not have `items.len()` free
    /// slots (SPEC_FULL.md invariant 2).
    pub fn try_push(
        &self,
        cmd: Cmd,
        request_id: u64,
        ticket: u64,
        items: &[PushItem<'_>],
    ) -> bool {
        self.try_push_inner(cmd, request_id, ticket, items, 0, 0)
    }

    /// Like [`Self::try_push`], but for `Cmd::AsyncGetInitiate`: also stamps
    /// every slot with the raw addresses of the caller's `valueMultiBuffer`/
    /// `statusMultiBuffer`, so the host dispatcher can write results there
    /// directly instead of round-tripping them through the CQ at Finalize
    /// time (SPEC_FULL.md §4.4/§4.6).
    pub fn try_push_async_initiate(
        &self,
        request_id: u64,
        items: &[PushItem<'_>],
        async_value_ptr: u64,
        async_status_ptr: u64,
    ) -> bool {
        self.try_push_inner(
            Cmd::AsyncGetInitiate,
            request_id,
            0,
            items,
            async_value_ptr,
            async_status_ptr,
        )
    }

    fn try_push_inner(
        &self,
        cmd: Cmd,
        request_id: u64,
        ticket: u64,
        items: &[PushItem<'_>],
        async_value_ptr: u64,
        async_status_ptr: u64,
    ) -> bool {
        let batch_size = items.len().max(1) as u64;
        let tail = self.control().sq_tail.load(Relaxed);
        let head = self.control().sq_head.load(Acquire);

        if tail - head + batch_size - 1 >= self.queue_size as u64 {
            return false;
        }

        if items.is_empty() {
            // push_no_data: one descriptor-only slot (EXIT / ASYNC_FINALIZE).
            unsafe {
                let slot = self.slot_mut(tail);
                std::ptr::write(
                    slot,
                    RequestSlot {
                        cmd,
                        request_id,
                        increment_size: 1,
                        key_len: 0,
                        value_len: 0,
                        ticket,
                        async_value_ptr,
                        async_status_ptr,
                        key: [0; MAX_KEY_INLINE],
                    },
                );
            }
        } else {
            for (i, item) in items.iter().enumerate() {
                assert!(
                    item.key.len() <= MAX_KEY_INLINE,
                    "key exceeds inline capacity"
                );
                let mut key_buf = [0u8; MAX_KEY_INLINE];
                key_buf[..item.key.len()].copy_from_slice(item.key);
                let value_len = item.value.map(|v| v.len()).unwrap_or(0) as u32;

                unsafe {
                    let idx = tail + i as u64;
                    let slot = self.slot_mut(idx);
                    std::ptr::write(
                        slot,
                        RequestSlot {
                            cmd,
                            request_id,
                            increment_size: batch_size as u32,
                            key_len: item.key.len() as u32,
                            value_len,
                            ticket,
                            async_value_ptr,
                            async_status_ptr,
                            key: key_buf,
                        },
                    );

                    if let Some(value) = item.value {
                        assert!(value.len() <= self.max_value_size, "value exceeds max_value_size");
                        let dst = self.bank_mut(idx);
                        std::ptr::copy_nonoverlapping(value.as_ptr(), dst, value.len());
                    }
                }
            }
        }

        self.control().sq_tail.store(tail + batch_size, Release);
        self.control().sq_signal.fetch_add(1, Release);
        futex::futex_wake(&self.control().sq_signal);
        true
    }

    /// Host-side: pop the leading slot of the next published batch, if any,
    /// advancing `head` by its `increment_size` and returning the starting
    /// index plus a copy of every slot in the batch.
    pub fn try_pop(&self) -> Option<(u64, Vec<RequestSlot>)> {
        let head = self.control().sq_head.load(Relaxed);
        let tail = self.control().sq_tail.load(Acquire);
        if head == tail {
            return None;
        }

        let leading = unsafe { *self.slot_mut(head) };
        let n = leading.increment_size.max(1) as u64;
        let mut batch = Vec::with_capacity(n as usize);
        for i in 0..n {
            batch.push(unsafe { *self.slot_mut(head + i) });
        }

        self.control().sq_head.store(head + n, Release);
        Some((head, batch))
    }

    /// Host-side: block (bounded spin, then sleep) until a batch is
    /// available, matching SPEC_FULL.md's "block on SQ.pop" dispatcher loop
    /// without introducing a condition variable on the hot path.
    pub fn pop_blocking(&self) -> (u64, Vec<RequestSlot>) {
        let mut attempt = 0u32;
        loop {
            if let Some(result) = self.try_pop() {
                return result;
            }
            let seen = self.control().sq_signal.load(Relaxed);
            futex::host_backoff(&mut attempt);
            if attempt >= 64 {
                futex::futex_wait(&self.control().sq_signal, seen);
            }
        }
    }

    /// Read the PUT value bytes staged for SQ slot `idx` (host-side, used by
    /// the dispatcher when executing PUT/MULTI_PUT).
    pub fn read_value<'a>(&'a self, idx: u64, len: usize) -> &'a [u8] {
        unsafe { std::slice::from_raw_parts(self.bank_mut(idx), len) }
    }

    pub fn queue_size(&self) -> usize {
        self.queue_size
    }

    pub fn max_value_size(&self) -> usize {
        self.max_value_size
    }

    /// Current tail value, used by the dispatcher to compute the ticket for
    /// an outstanding async GET against the *completion* queue, not this one;
    /// exposed here only for tests asserting invariant 2/3 directly.
    pub fn tail(&self) -> u64 {
        self.control().sq_tail.load(Acquire)
    }

    pub fn head(&self) -> u64 {
        self.control().sq_head.load(Acquire)
    }
}
