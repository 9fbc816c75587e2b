//! Persistent backend over `sled` (SPEC_FULL.md §6). No persistent
//! embedded-KV crate appears anywhere in the retrieved reference pack; `sled`
//! is the standard ecosystem choice for this role and is substituted in
//! deliberately (see DESIGN.md).

use std::path::{Path, PathBuf};

use super::{Backend, BACKEND_IO_ERROR};
use crate::error::{KvError, BACKEND_NOT_FOUND, BACKEND_OK};

pub struct SledBackend {
    db: sled::Db,
    path: PathBuf,
}

impl SledBackend {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, KvError> {
        let path = path.as_ref().to_path_buf();
        let db = sled::open(&path).map_err(|e| KvError::BackendOpen(e.to_string()))?;
        Ok(Self { db, path })
    }
}

impl Backend for SledBackend {
    fn put(&self, key: &[u8], value: &[u8]) -> i32 {
        match self.db.insert(key, value) {
            Ok(_) => BACKEND_OK,
            Err(e) => {
                tracing::warn!(error = %e, "sled put failed");
                BACKEND_IO_ERROR
            }
        }
    }

    fn get(&self, key: &[u8]) -> (i32, Vec<u8>) {
        match self.db.get(key) {
            Ok(Some(value)) => (BACKEND_OK, value.to_vec()),
            Ok(None) => (BACKEND_NOT_FOUND, Vec::new()),
            Err(e) => {
                tracing::warn!(error = %e, "sled get failed");
                (BACKEND_IO_ERROR, Vec::new())
            }
        }
    }

    fn delete(&self, key: &[u8]) -> i32 {
        match self.db.remove(key) {
            Ok(Some(_)) => BACKEND_OK,
            Ok(None) => BACKEND_NOT_FOUND,
            Err(e) => {
                tracing::warn!(error = %e, "sled delete failed");
                BACKEND_IO_ERROR
            }
        }
    }

    fn close_db(&self) -> i32 {
        match self.db.flush() {
            Ok(_) => BACKEND_OK,
            Err(e) => {
                tracing::warn!(error = %e, "sled flush on close failed");
                BACKEND_IO_ERROR
            }
        }
    }

    fn delete_db(&self) -> i32 {
        let _ = self.db.flush();
        match std::fs::remove_dir_all(&self.path) {
            Ok(_) => BACKEND_OK,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BACKEND_OK,
            Err(e) => {
                tracing::warn!(error = %e, "removing sled db directory failed");
                BACKEND_IO_ERROR
            }
        }
    }
}
