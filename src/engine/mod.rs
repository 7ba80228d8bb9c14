//! Engine module for hashing and verification operations

pub mod batch;
pub mod digest;
pub mod hasher;
pub mod progress;
pub mod verify;

// Re-export commonly used items
pub use batch::{HashEngine, WorkItem, discover_files};
pub use digest::{StreamingDigest, hex_encode};
pub use hasher::{adaptive_buffer_size, hash_file};
pub use progress::{ThrottledProgressSink, VerifyProgressAggregator};
pub use verify::{compare_result_sets, deepest_common_dir};
