//! Host-side dispatcher (SPEC_FULL.md §4.5): one [`Worker`] thread per block,
//! blocking on its Submission Queue and executing whatever batch it pops
//! against the configured [`Backend`], using a shared rayon pool for
//! intra-batch parallelism and for backgrounding async GETs.

use std::sync::Arc;
use std::thread::JoinHandle;

use futures::FutureExt;
use rayon::prelude::*;

use crate::backend::Backend;
use crate::error::{decode_status, KVStatus};
use crate::queue::layout::{Cmd, RequestSlot, ResponseSlot};
use crate::queue::{CompletionQueue, SubmissionQueue};
use crate::ticket::TicketTable;

/// Wraps the raw `valueMultiBuffer`/`statusMultiBuffer` addresses stamped
/// into an `AsyncGetInitiate` batch so they can cross into the rayon pool's
/// background task. Sound because the caller's contract (SPEC_FULL.md §4.4)
/// keeps those buffers alive, exclusively borrowed by this in-flight ticket,
/// until the matching `asyncGetFinalize` returns.
#[derive(Clone, Copy)]
struct AsyncTarget {
    value_ptr: *mut u8,
    status_ptr: *mut KVStatus,
}

unsafe impl Send for AsyncTarget {}

/// Owns one block's queue pair and runs its dispatch loop on its own thread.
pub struct Worker {
    handle: Option<JoinHandle<()>>,
}

impl Worker {
    pub fn spawn(
        block: usize,
        sq: Arc<SubmissionQueue>,
        cq: Arc<CompletionQueue>,
        backend: Arc<dyn Backend>,
        tickets: Arc<TicketTable>,
        pool: Arc<rayon::ThreadPool>,
    ) -> Self {
        let handle = std::thread::Builder::new()
            .name(format!("gpukv-worker-{block}"))
            .spawn(move || run(block, &sq, &cq, &backend, &tickets, &pool))
            .expect("failed to spawn host worker thread");
        Worker { handle: Some(handle) }
    }

    pub fn join(mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn run(
    block: usize,
    sq: &SubmissionQueue,
    cq: &CompletionQueue,
    backend: &Arc<dyn Backend>,
    tickets: &Arc<TicketTable>,
    pool: &Arc<rayon::ThreadPool>,
) {
    loop {
        let (start, batch) = sq.pop_blocking();
        let leading = batch[0];
        tracing::debug!(block, start, cmd = ?leading.cmd, n = batch.len(), "dispatch batch");

        let exit = process_batch(block, sq, cq, backend, tickets, pool, start, &batch);
        if exit {
            return;
        }
    }
}

/// Executes one popped batch against `backend`, pushing its completions.
/// Returns `true` once an `Exit` command has been handled and this block's
/// worker should stop.
fn process_batch(
    block: usize,
    sq: &SubmissionQueue,
    cq: &CompletionQueue,
    backend: &Arc<dyn Backend>,
    tickets: &Arc<TicketTable>,
    pool: &Arc<rayon::ThreadPool>,
    start: u64,
    batch: &[RequestSlot],
) -> bool {
    let leading = batch[0];
    match leading.cmd {
        Cmd::Exit => {
            push_no_res(cq, KVStatus::Exit, 0);
            true
        }

        Cmd::Put => {
            let slot = &batch[0];
            let key = &slot.key[..slot.key_len as usize];
            let value = sq.read_value(start, slot.value_len as usize);
            let code = backend.put(key, value);
            let status = decode_status(code, "PUT", slot.request_id);
            push_status_batch(cq, &[(status, code)]);
            false
        }

        Cmd::MultiPut => {
            let results: Vec<(KVStatus, i32)> = pool.install(|| {
                batch
                    .par_iter()
                    .enumerate()
                    .map(|(i, slot)| {
                        let key = &slot.key[..slot.key_len as usize];
                        let value = sq.read_value(start + i as u64, slot.value_len as usize);
                        let code = backend.put(key, value);
                        (decode_status(code, "MULTI_PUT", slot.request_id), code)
                    })
                    .collect()
            });
            push_status_batch(cq, &results);
            false
        }

        Cmd::Get => {
            let slot = &batch[0];
            let key = &slot.key[..slot.key_len as usize];
            let (code, value) = backend.get(key);
            let status = decode_status(code, "GET", slot.request_id);
            push_get_batch(cq, &[(status, code)], &[&value]);
            false
        }

        Cmd::MultiGet => {
            let results: Vec<((KVStatus, i32), Vec<u8>)> = pool.install(|| {
                batch
                    .par_iter()
                    .map(|slot| {
                        let key = &slot.key[..slot.key_len as usize];
                        let (code, value) = backend.get(key);
                        ((decode_status(code, "MULTI_GET", slot.request_id), code), value)
                    })
                    .collect()
            });
            let statuses: Vec<(KVStatus, i32)> = results.iter().map(|(s, _)| *s).collect();
            let values: Vec<&[u8]> = results.iter().map(|(_, v)| v.as_slice()).collect();
            push_get_batch(cq, &statuses, &values);
            false
        }

        Cmd::Delete => {
            let slot = &batch[0];
            let key = &slot.key[..slot.key_len as usize];
            let code = backend.delete(key);
            let status = decode_status(code, "DELETE", slot.request_id);
            push_status_batch(cq, &[(status, code)]);
            false
        }

        Cmd::AsyncGetInitiate => {
            let leading = batch[0];
            let request_id = leading.request_id;
            let keys: Vec<Vec<u8>> = batch
                .iter()
                .map(|slot| slot.key[..slot.key_len as usize].to_vec())
                .collect();
            let target = AsyncTarget {
                value_ptr: leading.async_value_ptr as *mut u8,
                status_ptr: leading.async_status_ptr as *mut KVStatus,
            };
            let max_value_size = sq.max_value_size();

            // Ticket = CQ tail snapshot taken before this batch's
            // completion is published (SPEC_FULL.md invariant 5).
            let ticket = cq.tail();
            let fut = {
                let (tx, rx) = tokio::sync::oneshot::channel::<()>();
                let backend = Arc::clone(backend);
                pool.spawn(move || {
                    for (i, key) in keys.iter().enumerate() {
                        let (code, value) = backend.get(key);
                        let status = decode_status(code, "ASYNC_GET", request_id);
                        let n = value.len().min(max_value_size);
                        unsafe {
                            let dst = target.value_ptr.add(i * max_value_size);
                            std::ptr::copy_nonoverlapping(value.as_ptr(), dst, n);
                            std::ptr::write(target.status_ptr.add(i), status);
                        }
                    }
                    let _ = tx.send(());
                });
                async move { let _ = rx.await; }.boxed()
            };

            if let Err(err) = tickets.register(block, ticket, fut) {
                tracing::warn!(block, ticket, error = %err, "ticket table full");
            }
            push_no_res(cq, KVStatus::Success, ticket);
            false
        }

        Cmd::AsyncGetFinalize => {
            let slot = &batch[0];
            match tickets.take(block, slot.ticket) {
                Ok(shared) => {
                    futures::executor::block_on(shared);
                    push_no_res(cq, KVStatus::Success, 0);
                }
                Err(err) => {
                    tracing::warn!(block, ticket = slot.ticket, error = %err, "finalize of unknown ticket");
                    push_no_res(cq, KVStatus::Fail, 0);
                }
            }
            false
        }
    }
}

fn push_status_batch(cq: &CompletionQueue, results: &[(KVStatus, i32)]) {
    let entries: Vec<ResponseSlot> = results
        .iter()
        .map(|(status, code)| ResponseSlot {
            status: *status as u8,
            storelib_status: *code,
            ticket: 0,
        })
        .collect();
    while !cq.push_batch(&entries, None) {
        std::hint::spin_loop();
    }
}

fn push_get_batch(cq: &CompletionQueue, results: &[(KVStatus, i32)], values: &[&[u8]]) {
    let entries: Vec<ResponseSlot> = results
        .iter()
        .map(|(status, code)| ResponseSlot {
            status: *status as u8,
            storelib_status: *code,
            ticket: 0,
        })
        .collect();
    while !cq.push_batch(&entries, Some(values)) {
        std::hint::spin_loop();
    }
}

fn push_no_res(cq: &CompletionQueue, status: KVStatus, ticket: u64) {
    let entry = [ResponseSlot {
        status: status as u8,
        storelib_status: 0,
        ticket,
    }];
    while !cq.push_batch(&entry, None) {
        std::hint::spin_loop();
    }
}
