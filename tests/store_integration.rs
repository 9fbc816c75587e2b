use std::sync::Once;

use gpukv_core::config::StoreConfig;
use gpukv_core::error::{KVStatus, KvError};
use gpukv_core::store::KVStore;

static TRACING: Once = Once::new();

fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt().with_env_filter("gpukv_core=debug").try_init();
    });
}

fn test_config(num_blocks: usize) -> StoreConfig {
    init_tracing();
    StoreConfig {
        num_blocks,
        block_size: 32,
        queue_size: 64,
        max_value_size: 64,
        max_num_keys: 16,
        max_key_size: 32,
        ..StoreConfig::default()
    }
}

#[test]
fn put_then_get_round_trips_the_value() {
    let store = KVStore::open(test_config(1)).expect("open store");
    let block = store.block(0).expect("block 0");

    let mut buf = vec![0u8; 64];
    assert_eq!(block.kv_put(b"alpha", b"1"), KVStatus::Success);
    assert_eq!(block.kv_get(b"alpha", &mut buf), KVStatus::Success);
    assert_eq!(&buf[..1], b"1");
}

#[test]
fn get_of_missing_key_reports_non_exist() {
    let store = KVStore::open(test_config(1)).expect("open store");
    let block = store.block(0).expect("block 0");

    let mut buf = vec![0u8; 64];
    assert_eq!(block.kv_get(b"never-written", &mut buf), KVStatus::NonExist);
}

#[test]
fn put_is_idempotent_overwrite() {
    let store = KVStore::open(test_config(1)).expect("open store");
    let block = store.block(0).expect("block 0");

    let mut buf = vec![0u8; 64];
    assert_eq!(block.kv_put(b"k", b"first"), KVStatus::Success);
    assert_eq!(block.kv_put(b"k", b"second"), KVStatus::Success);
    assert_eq!(block.kv_get(b"k", &mut buf), KVStatus::Success);
    assert_eq!(&buf[..6], b"second");
}

#[test]
fn delete_then_get_reports_non_exist() {
    let store = KVStore::open(test_config(1)).expect("open store");
    let block = store.block(0).expect("block 0");

    assert_eq!(block.kv_put(b"doomed", b"x"), KVStatus::Success);
    assert_eq!(block.kv_delete(b"doomed"), KVStatus::Success);

    let mut buf = vec![0u8; 64];
    assert_eq!(block.kv_get(b"doomed", &mut buf), KVStatus::NonExist);
}

#[test]
fn multi_put_then_multi_get_round_trips_every_key() {
    let store = KVStore::open(test_config(1)).expect("open store");
    let block = store.block(0).expect("block 0");

    let keys: Vec<&[u8]> = vec![b"k0", b"k1", b"k2"];
    let values: Vec<&[u8]> = vec![b"v0", b"v1", b"v2"];
    let put_statuses = block.kv_multi_put(&keys, &values);
    assert!(put_statuses.iter().all(|s| *s == KVStatus::Success));

    let mut buf = vec![0u8; 64 * keys.len()];
    let get_statuses = block.kv_multi_get(&keys, &mut buf);
    assert!(get_statuses.iter().all(|s| *s == KVStatus::Success));
    assert_eq!(&buf[0..2], b"v0");
    assert_eq!(&buf[64..66], b"v1");
    assert_eq!(&buf[128..130], b"v2");
}

#[test]
fn async_get_initiate_then_finalize_writes_into_the_initiate_time_buffer() {
    let store = KVStore::open(test_config(1)).expect("open store");
    let block = store.block(0).expect("block 0");

    assert_eq!(block.kv_put(b"async-key", b"async-value"), KVStatus::Success);

    let keys: Vec<&[u8]> = vec![b"async-key"];
    let mut value_buf = vec![0u8; 64];
    let mut status_buf = vec![KVStatus::Fail; 1];
    let ticket = block.kv_async_get_initiate(&keys, &mut value_buf, &mut status_buf);
    block.kv_async_get_finalize(ticket);

    assert_eq!(status_buf[0], KVStatus::Success);
    assert_eq!(&value_buf[..11], b"async-value");
}

#[test]
fn async_get_of_missing_key_finalizes_as_non_exist() {
    let store = KVStore::open(test_config(1)).expect("open store");
    let block = store.block(0).expect("block 0");

    let keys: Vec<&[u8]> = vec![b"ghost"];
    let mut value_buf = vec![0u8; 64];
    let mut status_buf = vec![KVStatus::Fail; 1];
    let ticket = block.kv_async_get_initiate(&keys, &mut value_buf, &mut status_buf);
    block.kv_async_get_finalize(ticket);

    assert_eq!(status_buf[0], KVStatus::NonExist);
}

/// Testable Property 6 ("Async equivalence"): a batched Initiate/Finalize
/// pair must yield the same value bytes and statuses as a synchronous
/// MultiGet over the same keys.
#[test]
fn async_multi_get_matches_synchronous_multi_get() {
    let store = KVStore::open(test_config(1)).expect("open store");
    let block = store.block(0).expect("block 0");

    let keys: Vec<Vec<u8>> = (0u32..8).map(|i| i.to_le_bytes().to_vec()).collect();
    let key_refs: Vec<&[u8]> = keys.iter().map(|k| k.as_slice()).collect();
    let values: Vec<Vec<u8>> = (0u32..8)
        .map(|i| {
            let mut v = vec![0u8; 64];
            v[..4].copy_from_slice(&i.to_le_bytes());
            v
        })
        .collect();
    let value_refs: Vec<&[u8]> = values.iter().map(|v| v.as_slice()).collect();
    let put_statuses = block.kv_multi_put(&key_refs, &value_refs);
    assert!(put_statuses.iter().all(|s| *s == KVStatus::Success));

    let mut sync_buf = vec![0u8; 64 * 8];
    let sync_statuses = block.kv_multi_get(&key_refs, &mut sync_buf);

    let mut async_buf = vec![0u8; 64 * 8];
    let mut async_statuses = vec![KVStatus::Fail; 8];
    let ticket = block.kv_async_get_initiate(&key_refs, &mut async_buf, &mut async_statuses);
    block.kv_async_get_finalize(ticket);

    assert_eq!(sync_statuses, async_statuses);
    assert_eq!(sync_buf, async_buf);
}

/// Scenario S4-style async pipeline depth: several Initiate calls are issued
/// before any Finalize, then finalized in the same order, and every batch's
/// values/statuses must come back correct and uncorrupted.
#[test]
fn async_pipeline_supports_multiple_outstanding_tickets_finalized_in_order() {
    let mut config = test_config(1);
    config.queue_size = 128;
    config.max_num_keys = 32;
    let store = KVStore::open(config).expect("open store");
    let block = store.block(0).expect("block 0");

    const BATCHES: usize = 5;
    const BATCH_KEYS: usize = 8;

    let mut all_keys = Vec::with_capacity(BATCHES);
    for b in 0..BATCHES {
        let keys: Vec<Vec<u8>> = (0..BATCH_KEYS)
            .map(|i| format!("batch{b}-key{i}").into_bytes())
            .collect();
        let key_refs: Vec<&[u8]> = keys.iter().map(|k| k.as_slice()).collect();
        let values: Vec<Vec<u8>> = (0..BATCH_KEYS)
            .map(|i| format!("batch{b}-value{i}").into_bytes())
            .collect();
        let value_refs: Vec<&[u8]> = values.iter().map(|v| v.as_slice()).collect();
        let statuses = block.kv_multi_put(&key_refs, &value_refs);
        assert!(statuses.iter().all(|s| *s == KVStatus::Success));
        all_keys.push(keys);
    }

    let mut tickets = Vec::with_capacity(BATCHES);
    let mut value_bufs = Vec::with_capacity(BATCHES);
    let mut status_bufs = Vec::with_capacity(BATCHES);
    for keys in &all_keys {
        let key_refs: Vec<&[u8]> = keys.iter().map(|k| k.as_slice()).collect();
        let mut value_buf = vec![0u8; 64 * BATCH_KEYS];
        let mut status_buf = vec![KVStatus::Fail; BATCH_KEYS];
        let ticket = block.kv_async_get_initiate(&key_refs, &mut value_buf, &mut status_buf);
        tickets.push(ticket);
        value_bufs.push(value_buf);
        status_bufs.push(status_buf);
    }

    for ticket in &tickets {
        block.kv_async_get_finalize(*ticket);
    }

    for b in 0..BATCHES {
        assert!(status_bufs[b].iter().all(|s| *s == KVStatus::Success), "batch {b}");
        for i in 0..BATCH_KEYS {
            let expected = format!("batch{b}-value{i}");
            let got = &value_bufs[b][i * 64..i * 64 + expected.len()];
            assert_eq!(got, expected.as_bytes(), "batch {b} key {i}");
        }
    }
}

#[test]
fn each_block_has_an_independent_fifo_queue() {
    let store = KVStore::open(test_config(2)).expect("open store");
    let block0 = store.block(0).expect("block 0");
    let block1 = store.block(1).expect("block 1");

    assert_eq!(block0.kv_put(b"shared-key", b"from-block-0"), KVStatus::Success);
    assert_eq!(block1.kv_put(b"shared-key", b"from-block-1"), KVStatus::Success);

    let mut buf0 = vec![0u8; 64];
    let mut buf1 = vec![0u8; 64];
    block0.kv_get(b"shared-key", &mut buf0);
    block1.kv_get(b"shared-key", &mut buf1);
    // Both blocks dispatch to the same backend: whichever PUT landed last
    // wins for both readers, since the key space is shared across blocks.
    assert_eq!(&buf0[..], &buf1[..]);
}

#[test]
fn block_out_of_range_is_reported_not_panicked() {
    let store = KVStore::open(test_config(1)).expect("open store");
    let err = store.block(1).unwrap_err();
    assert!(matches!(
        err,
        KvError::BlockOutOfRange { index: 1, num_blocks: 1 }
    ));
}

#[test]
fn close_db_is_idempotent_and_reports_the_repeat_call() {
    let mut store = KVStore::open(test_config(1)).expect("open store");
    assert!(store.close_db().is_ok());
    assert!(matches!(store.close_db(), Err(KvError::AlreadyClosed)));
}

#[test]
fn rejects_queue_size_that_is_not_a_power_of_two() {
    let mut config = test_config(1);
    config.queue_size = 100;
    let err = KVStore::open(config).unwrap_err();
    assert!(matches!(err, gpukv_core::error::KvError::QueueSizeNotPowerOfTwo(100)));
}

#[test]
fn rejects_zero_blocks() {
    let mut config = test_config(1);
    config.num_blocks = 0;
    let err = KVStore::open(config).unwrap_err();
    assert!(matches!(err, gpukv_core::error::KvError::InvalidNumBlocks(0)));
}
