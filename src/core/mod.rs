pub mod arena;
pub mod futex;
pub mod shared_memory;

pub use arena::Arena;
pub use shared_memory::{DevicePtr, HostPtr, SharedRegion};
