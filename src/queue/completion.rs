//! The host-producer / accelerator-consumer Completion Queue (SPEC_FULL.md §4.3).

use std::sync::atomic::Ordering::{Acquire, Relaxed, Release};

use super::layout::{BlockControl, ResponseSlot};

pub struct CompletionQueue {
    control: *mut BlockControl,
    slots: *mut ResponseSlot,
    get_bank: *mut u8,
    queue_size: usize,
    max_value_size: usize,
}

unsafe impl Send for CompletionQueue {}
unsafe impl Sync for CompletionQueue {}

impl CompletionQueue {
    /// # Safety
    /// Same requirements as [`super::submission::SubmissionQueue::new`].
    pub unsafe fn new(
        control: *mut BlockControl,
        slots: *mut ResponseSlot,
        get_bank: *mut u8,
        queue_size: usize,
        max_value_size: usize,
    ) -> Self {
        for i in 0..queue_size {
            std::ptr::write(slots.add(i), ResponseSlot::EMPTY);
        }
        Self {
            control,
            slots,
            get_bank,
            queue_size,
            max_value_size,
        }
    }

    fn control(&self) -> &BlockControl {
        unsafe { &*self.control }
    }

    unsafe fn slot_mut(&self, idx: u64) -> *mut ResponseSlot {
        self.slots.add((idx as usize) & (self.queue_size - 1))
    }

    unsafe fn bank_mut(&self, idx: u64) -> *mut u8 {
        self.get_bank
            .add(((idx as usize) & (self.queue_size - 1)) * self.max_value_size)
    }

    /// Host-side: the CQ tail snapshot *before* reserving any slots, used as
    /// the ticket for an outstanding async GET (SPEC_FULL.md invariant 5).
    pub fn tail(&self) -> u64 {
        self.control().cq_tail.load(Acquire)
    }

    pub fn head(&self) -> u64 {
        self.control().cq_head.load(Acquire)
    }

    /// Host-side: publish `entries.len()` consecutive completion slots,
    /// optionally writing GET result bytes into the paired data bank.
    /// Returns `false` (caller should spin and retry, per §4.5) if there is
    /// not enough free capacity.
    pub fn push_batch(&self, entries: &[ResponseSlot], get_values: Option<&[&[u8]]>) -> bool {
        let n = entries.len() as u64;
        if n == 0 {
            return true;
        }
        let tail = self.control().cq_tail.load(Relaxed);
        let head = self.control().cq_head.load(Acquire);
        if tail - head + n - 1 >= self.queue_size as u64 {
            return false;
        }

        for (i, entry) in entries.iter().enumerate() {
            let idx = tail + i as u64;
            unsafe {
                std::ptr::write(self.slot_mut(idx), *entry);
                if let Some(values) = get_values {
                    let value = values[i];
                    assert!(value.len() <= self.max_value_size, "value exceeds max_value_size");
                    let dst = self.bank_mut(idx);
                    std::ptr::copy_nonoverlapping(value.as_ptr(), dst, value.len());
                }
            }
        }

        self.control().cq_tail.store(tail + n, Release);
        true
    }

    /// Accelerator-side: pop `batch_size` consecutive slots carrying GET
    /// results, copying result bytes into `user_buffs` (one `max_value_size`
    /// slice per key) and statuses into `status_out`.
    pub fn try_pop_get(
        &self,
        batch_size: usize,
        value_len: usize,
        user_buffs: &mut [u8],
        status_out: &mut [(u8, i32)],
    ) -> bool {
        let n = batch_size as u64;
        let head = self.control().cq_head.load(Relaxed);
        let tail = self.control().cq_tail.load(Acquire);
        if tail - head < n {
            return false;
        }

        for i in 0..batch_size {
            let idx = head + i as u64;
            unsafe {
                let slot = *self.slot_mut(idx);
                status_out[i] = (slot.status, slot.storelib_status);
                let src = self.bank_mut(idx);
                let dst = &mut user_buffs[i * value_len..(i + 1) * value_len];
                std::ptr::copy_nonoverlapping(src, dst.as_mut_ptr(), value_len);
            }
        }

        self.control().cq_head.store(head + n, Release);
        true
    }

    /// Accelerator-side: pop `batch_size` consecutive status-only slots
    /// (PUT/DELETE completions — no data bank involved).
    pub fn try_pop_default(&self, batch_size: usize, status_out: &mut [(u8, i32)]) -> bool {
        let n = batch_size as u64;
        let head = self.control().cq_head.load(Relaxed);
        let tail = self.control().cq_tail.load(Acquire);
        if tail - head < n {
            return false;
        }

        for i in 0..batch_size {
            let idx = head + i as u64;
            let slot = unsafe { *self.slot_mut(idx) };
            status_out[i] = (slot.status, slot.storelib_status);
        }

        self.control().cq_head.store(head + n, Release);
        true
    }

    /// Accelerator-side: pop one slot with no associated data (EXIT /
    /// ASYNC_FINALIZE completions).
    pub fn try_pop_no_res_msg(&self) -> Option<ResponseSlot> {
        let head = self.control().cq_head.load(Relaxed);
        let tail = self.control().cq_tail.load(Acquire);
        if tail == head {
            return None;
        }
        let slot = unsafe { *self.slot_mut(head) };
        self.control().cq_head.store(head + 1, Release);
        Some(slot)
    }

    /// Accelerator-side: pop the one-slot handshake response to an
    /// `AsyncGetInitiate`, returning the ticket written there by the host.
    pub fn try_pop_async_get_init(&self) -> Option<u64> {
        self.try_pop_no_res_msg().map(|slot| slot.ticket)
    }

    pub fn queue_size(&self) -> usize {
        self.queue_size
    }
}
