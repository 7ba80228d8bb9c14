//! Evihash: storage-aware parallel hashing and bidirectional verification
//! for large file collections.
//!
//! The crate profiles the device backing each path (NVMe / SSD / HDD /
//! external / network), plans a thread budget from published disk
//! parallelism measurements, and streams cryptographic digests (SHA-256,
//! SHA-1, MD5) with adaptive buffering, throttled progress, and cooperative
//! pause/cancel. Verification runs two independent hash passes concurrently
//! and classifies every logical entry; mismatches are data, not errors.

pub mod engine;
pub mod error;
pub mod planner;
pub mod storage;
pub mod types;
pub mod utils;

/// Re-export types for API
pub use engine::HashEngine;
pub use error::{HashCalcError, HashVerifyError};
pub use planner::{OpKind, ThreadPlanner};
pub use storage::{BusType, DriveType, StorageInfo, StorageProfiler};
pub use types::*;

use std::path::{Path, PathBuf};

/// Hash every file reachable from `paths` with a fresh engine.
///
/// Convenience wrapper over [`HashEngine::hash_files`]; build your own
/// engine when running several operations so the profiler cache is reused.
pub fn hash_files(
    paths: &[PathBuf],
    algorithm: Algorithm,
    options: &HashOptions,
) -> Result<BatchResult, HashCalcError> {
    HashEngine::new().hash_files(paths, algorithm, options)
}

/// Verify `source` against `target` with a fresh engine.
///
/// See [`HashEngine::verify`] for the outcome semantics.
pub fn verify(
    source: &[PathBuf],
    target: &[PathBuf],
    algorithm: Algorithm,
    options: &HashOptions,
) -> Result<VerificationReport, HashVerifyError> {
    HashEngine::new().verify(source, target, algorithm, options)
}

/// Profile `path` and plan a hash thread budget for `file_count` files in
/// one call. Returns `(threads, storage_info)`; useful for callers that
/// want to display the decision before starting work.
pub fn plan_for_path(path: &Path, file_count: u64) -> (u32, StorageInfo) {
    let profiler = StorageProfiler::new();
    let info = profiler.analyze(path);
    let threads = ThreadPlanner::new().plan(Some(&info), None, file_count, OpKind::Hash);
    (threads, info)
}
