//! In-memory backend (SPEC_FULL.md §6), used for tests and for stores opened
//! without a `DB_IDENTIFY` path. PUT of an existing key overwrites it
//! (§9 Open Question (b)): nothing in the spec text asks for conflict
//! detection, and the driver surface has no status code to report one.

use dashmap::DashMap;

use super::Backend;
use crate::error::{BACKEND_NOT_FOUND, BACKEND_OK};

pub struct MemoryBackend {
    map: DashMap<Vec<u8>, Vec<u8>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self { map: DashMap::new() }
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl Backend for MemoryBackend {
    fn put(&self, key: &[u8], value: &[u8]) -> i32 {
        self.map.insert(key.to_vec(), value.to_vec());
        BACKEND_OK
    }

    fn get(&self, key: &[u8]) -> (i32, Vec<u8>) {
        match self.map.get(key) {
            Some(value) => (BACKEND_OK, value.clone()),
            None => (BACKEND_NOT_FOUND, Vec::new()),
        }
    }

    fn delete(&self, key: &[u8]) -> i32 {
        match self.map.remove(key) {
            Some(_) => BACKEND_OK,
            None => BACKEND_NOT_FOUND,
        }
    }

    fn close_db(&self) -> i32 {
        BACKEND_OK
    }

    fn delete_db(&self) -> i32 {
        self.map.clear();
        BACKEND_OK
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overwrite_of_existing_key_keeps_latest_value() {
        let backend = MemoryBackend::new();
        assert_eq!(backend.put(b"k", b"first"), BACKEND_OK);
        assert_eq!(backend.put(b"k", b"second"), BACKEND_OK);
        let (code, value) = backend.get(b"k");
        assert_eq!(code, BACKEND_OK);
        assert_eq!(value, b"second");
    }

    #[test]
    fn delete_of_absent_key_reports_not_found() {
        let backend = MemoryBackend::new();
        assert_eq!(backend.delete(b"absent"), BACKEND_NOT_FOUND);
    }
}
