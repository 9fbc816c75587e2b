use std::sync::Arc;
use std::thread;

use gpukv_core::core::Arena;
use gpukv_core::queue::{Cmd, CompletionQueue, PushItem, SubmissionQueue};

const QUEUE_SIZE: usize = 64;
const MAX_VALUE_SIZE: usize = 32;

fn build_queues() -> (Arc<Arena>, Arc<SubmissionQueue>, Arc<CompletionQueue>) {
    let arena = Arc::new(Arena::new(1, QUEUE_SIZE, MAX_VALUE_SIZE).expect("arena"));
    let region = arena.region(0);
    let base = arena.base_ptr();

    let control = unsafe { base.add(region.control_offset) as *mut gpukv_core::queue::BlockControl };
    unsafe { std::ptr::write(control, gpukv_core::queue::BlockControl::new()) };

    let sq_slots = unsafe { base.add(region.sq_offset) as *mut gpukv_core::queue::RequestSlot };
    let cq_slots = unsafe { base.add(region.cq_offset) as *mut gpukv_core::queue::ResponseSlot };
    let put_bank = unsafe { base.add(region.put_bank_offset) };
    let get_bank = unsafe { base.add(region.get_bank_offset) };

    let sq = Arc::new(unsafe { SubmissionQueue::new(control, sq_slots, put_bank, QUEUE_SIZE, MAX_VALUE_SIZE) });
    let cq = Arc::new(unsafe { CompletionQueue::new(control, cq_slots, get_bank, QUEUE_SIZE, MAX_VALUE_SIZE) });
    (arena, sq, cq)
}

#[test]
fn single_push_pop_round_trips_key_and_value() {
    let (_arena, sq, _cq) = build_queues();

    let items = [PushItem {
        key: b"hello",
        value: Some(b"world"),
    }];
    assert!(sq.try_push(Cmd::Put, 7, 0, &items));

    let (start, batch) = sq.try_pop().expect("a batch should be ready");
    assert_eq!(batch.len(), 1);
    let slot = batch[0];
    assert_eq!(slot.cmd, Cmd::Put);
    assert_eq!(slot.request_id, 7);
    assert_eq!(&slot.key[..slot.key_len as usize], b"hello");
    assert_eq!(sq.read_value(start, slot.value_len as usize), b"world");
}

#[test]
fn batch_push_occupies_consecutive_slots_with_shared_descriptor() {
    let (_arena, sq, _cq) = build_queues();

    let items = [
        PushItem { key: b"a", value: None },
        PushItem { key: b"b", value: None },
        PushItem { key: b"c", value: None },
    ];
    assert!(sq.try_push(Cmd::MultiGet, 42, 0, &items));

    let (_start, batch) = sq.try_pop().expect("batch ready");
    assert_eq!(batch.len(), 3);
    for (slot, expected) in batch.iter().zip([b"a", b"b", b"c"]) {
        assert_eq!(slot.cmd, Cmd::MultiGet);
        assert_eq!(slot.request_id, 42);
        assert_eq!(slot.increment_size, 3);
        assert_eq!(&slot.key[..slot.key_len as usize], expected);
    }
}

#[test]
fn push_fails_when_the_ring_has_no_room() {
    let (_arena, sq, _cq) = build_queues();

    // Fill the ring one slot at a time without ever popping.
    for i in 0..QUEUE_SIZE {
        let key = i.to_le_bytes();
        let items = [PushItem { key: &key, value: None }];
        assert!(sq.try_push(Cmd::Get, i as u64, 0, &items), "push {i} should fit");
    }

    let items = [PushItem { key: b"overflow", value: None }];
    assert!(!sq.try_push(Cmd::Get, 999, 0, &items), "ring is full, push must fail");
}

#[test]
fn one_producer_one_consumer_preserves_fifo_order() {
    let (_arena, sq, _cq) = build_queues();
    let sq_producer = Arc::clone(&sq);

    let producer = thread::spawn(move || {
        for i in 0..5_000u64 {
            let key = i.to_le_bytes();
            let items = [PushItem { key: &key, value: None }];
            while !sq_producer.try_push(Cmd::Get, i, 0, &items) {
                std::hint::spin_loop();
            }
        }
    });

    let mut expected = 0u64;
    while expected < 5_000 {
        if let Some((_start, batch)) = sq.try_pop() {
            for slot in batch {
                assert_eq!(slot.request_id, expected);
                expected += 1;
            }
        } else {
            std::hint::spin_loop();
        }
    }

    producer.join().unwrap();
}
