//! Constructor parameters for [`crate::store::KVStore`] (spec.md §6 "Driver
//! interface") plus the one environment-variable overlay the original design
//! relied on, applied only at the outermost layer (§9 "Global/process state").

use std::env;
use std::path::PathBuf;

/// Which reference backend (§6) the store dispatches PUT/GET/DELETE to.
#[derive(Debug, Clone)]
pub enum BackendKind {
    /// In-memory concurrent map backend.
    Memory,
    /// Persistent backend keyed by an external identity token (a filesystem
    /// path for the `sled`-backed reference implementation).
    Sled { path: PathBuf },
}

/// Fixed geometry for a [`crate::store::KVStore`]. All fields here are the
/// "constructor parameters" spec.md §6 calls out; nothing is read from the
/// environment except through [`StoreConfig::from_env`], and only for the two
/// knobs the original C++ exposed as environment variables.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Number of simulated thread blocks (one SQ/CQ pair and one host worker
    /// each).
    pub num_blocks: usize,
    /// Cooperative threads per block. Not used for queue sizing; carried for
    /// parity with the driver interface and exposed to callers that want to
    /// size their own per-block work.
    pub block_size: usize,
    /// Ring depth shared by every block's SQ and CQ.
    pub queue_size: usize,
    /// Maximum value size in bytes.
    pub max_value_size: usize,
    /// Maximum number of keys in a single MultiPut/MultiGet batch.
    pub max_num_keys: usize,
    /// Maximum key size in bytes (bounded by `queue::layout::MAX_KEY_INLINE`).
    pub max_key_size: usize,
    /// Backend selection.
    pub backend: BackendKind,
}

impl StoreConfig {
    /// Overlay `QUEUE_SIZE` and `DB_IDENTIFY` from the process environment
    /// onto an existing configuration, mirroring the original's environment
    /// knobs without baking environment reads into the hot path.
    pub fn from_env(mut self) -> Self {
        if let Ok(val) = env::var("QUEUE_SIZE") {
            if let Ok(parsed) = val.parse::<usize>() {
                self.queue_size = parsed;
            }
        }
        if let Ok(identify) = env::var("DB_IDENTIFY") {
            self.backend = BackendKind::Sled {
                path: PathBuf::from(identify),
            };
        }
        self
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            num_blocks: 1,
            block_size: 32,
            queue_size: 1024,
            max_value_size: 256,
            max_num_keys: 32,
            max_key_size: 16,
            backend: BackendKind::Memory,
        }
    }
}
