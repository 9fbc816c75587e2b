//! Ring buffer layout and the SQ/CQ pair carved out of the shared arena
//! (SPEC_FULL.md §3, §4.2, §4.3).

pub mod completion;
pub mod layout;
pub mod submission;

pub use completion::CompletionQueue;
pub use layout::{block_region, BlockControl, BlockRegion, Cmd, RequestSlot, ResponseSlot, MAX_KEY_INLINE};
pub use submission::{PushItem, SubmissionQueue};
