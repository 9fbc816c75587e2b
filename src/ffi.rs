//! C ABI surface (SPEC_FULL.md §6 Driver interface), mirroring the teacher's
//! `dmxp_*` FFI shape: opaque handles, negative codes on error, no panics
//! allowed to unwind across the boundary.

use std::slice;

use crate::config::{BackendKind, StoreConfig};
use crate::error::KVStatus;
use crate::store::KVStore;

const GPUKV_ERROR_NULL_POINTER: i32 = -1;
const GPUKV_ERROR_OUT_OF_RANGE: i32 = -2;

/// Opaque handle returned to C callers; never dereferenced on their side.
pub struct GpuKvStoreHandle {
    store: KVStore,
}

fn status_code(status: KVStatus) -> i32 {
    status as i32
}

/// Opens a store with an in-memory backend. Returns null on failure.
///
/// # Safety
/// The caller owns the returned pointer and must release it with
/// [`gpukv_store_free`].
#[no_mangle]
pub unsafe extern "C" fn gpukv_store_open_memory(
    num_blocks: usize,
    queue_size: usize,
    max_value_size: usize,
    max_num_keys: usize,
    max_key_size: usize,
) -> *mut GpuKvStoreHandle {
    let config = StoreConfig {
        num_blocks,
        block_size: max_value_size,
        queue_size,
        max_value_size,
        max_num_keys,
        max_key_size,
        backend: BackendKind::Memory,
    };
    match KVStore::open(config) {
        Ok(store) => Box::into_raw(Box::new(GpuKvStoreHandle { store })),
        Err(err) => {
            tracing::error!(error = %err, "gpukv_store_open_memory failed");
            std::ptr::null_mut()
        }
    }
}

/// Opens a store with a `sled`-backed persistent database rooted at `path`.
///
/// # Safety
/// `path` must be a valid, NUL-terminated UTF-8 C string for the call's
/// duration. The returned pointer follows the same ownership rules as
/// [`gpukv_store_open_memory`].
#[no_mangle]
pub unsafe extern "C" fn gpukv_store_open_persistent(
    path: *const std::os::raw::c_char,
    num_blocks: usize,
    queue_size: usize,
    max_value_size: usize,
    max_num_keys: usize,
    max_key_size: usize,
) -> *mut GpuKvStoreHandle {
    if path.is_null() {
        return std::ptr::null_mut();
    }
    let path = match std::ffi::CStr::from_ptr(path).to_str() {
        Ok(s) => s.to_owned(),
        Err(_) => return std::ptr::null_mut(),
    };
    let config = StoreConfig {
        num_blocks,
        block_size: max_value_size,
        queue_size,
        max_value_size,
        max_num_keys,
        max_key_size,
        backend: BackendKind::Sled { path: path.into() },
    };
    match KVStore::open(config) {
        Ok(store) => Box::into_raw(Box::new(GpuKvStoreHandle { store })),
        Err(err) => {
            tracing::error!(error = %err, "gpukv_store_open_persistent failed");
            std::ptr::null_mut()
        }
    }
}

/// # Safety
/// `handle` must be a pointer previously returned by one of the `open`
/// functions above, not yet freed.
#[no_mangle]
pub unsafe extern "C" fn gpukv_store_free(handle: *mut GpuKvStoreHandle) {
    if handle.is_null() {
        return;
    }
    drop(Box::from_raw(handle));
}

/// # Safety
/// `handle` must be live; `key`/`value` must point to at least
/// `key_len`/`value_len` readable bytes.
#[no_mangle]
pub unsafe extern "C" fn gpukv_put(
    handle: *mut GpuKvStoreHandle,
    block: usize,
    key: *const u8,
    key_len: usize,
    value: *const u8,
    value_len: usize,
) -> i32 {
    let handle = match handle.as_ref() {
        Some(h) => h,
        None => return GPUKV_ERROR_NULL_POINTER,
    };
    let block = match handle.store.block(block) {
        Ok(b) => b,
        Err(_) => return GPUKV_ERROR_OUT_OF_RANGE,
    };
    let key = slice::from_raw_parts(key, key_len);
    let value = slice::from_raw_parts(value, value_len);
    status_code(block.kv_put(key, value))
}

/// # Safety
/// Same requirements as [`gpukv_put`]; `out_value` must have room for at
/// least the store's configured `max_value_size` bytes.
#[no_mangle]
pub unsafe extern "C" fn gpukv_get(
    handle: *mut GpuKvStoreHandle,
    block: usize,
    key: *const u8,
    key_len: usize,
    out_value: *mut u8,
    out_value_len: usize,
) -> i32 {
    let handle = match handle.as_ref() {
        Some(h) => h,
        None => return GPUKV_ERROR_NULL_POINTER,
    };
    let block = match handle.store.block(block) {
        Ok(b) => b,
        Err(_) => return GPUKV_ERROR_OUT_OF_RANGE,
    };
    let key = slice::from_raw_parts(key, key_len);
    let out = slice::from_raw_parts_mut(out_value, out_value_len);
    status_code(block.kv_get(key, out))
}

/// # Safety
/// Same requirements as [`gpukv_put`].
#[no_mangle]
pub unsafe extern "C" fn gpukv_delete(
    handle: *mut GpuKvStoreHandle,
    block: usize,
    key: *const u8,
    key_len: usize,
) -> i32 {
    let handle = match handle.as_ref() {
        Some(h) => h,
        None => return GPUKV_ERROR_NULL_POINTER,
    };
    let block = match handle.store.block(block) {
        Ok(b) => b,
        Err(_) => return GPUKV_ERROR_OUT_OF_RANGE,
    };
    let key = slice::from_raw_parts(key, key_len);
    status_code(block.kv_delete(key))
}

/// Closes `handle`'s store. A repeat call on an already-closed store is a
/// caller error (`KvError::AlreadyClosed`); reported here as a warning since
/// this entry point has no return channel for it.
///
/// # Safety
/// `handle` must be live.
#[no_mangle]
pub unsafe extern "C" fn gpukv_close(handle: *mut GpuKvStoreHandle) {
    if let Some(handle) = handle.as_mut() {
        if let Err(err) = handle.store.close_db() {
            tracing::warn!(error = %err, "gpukv_close");
        }
    }
}
