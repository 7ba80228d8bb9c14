//! Public types for the evihash API: algorithms, options, control tokens,
//! per-file results, metrics, and verification outcomes.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use crate::error::HashCalcError;
use crate::storage::StorageInfo;
use crate::utils::config::ProgressConsts;

/// Supported digest algorithms. Closed set; dispatch happens at the digest
/// site, not through trait objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Algorithm {
    Sha256,
    Sha1,
    Md5,
}

impl Algorithm {
    /// Digest output length in bytes.
    pub fn digest_len(&self) -> usize {
        match self {
            Algorithm::Sha256 => 32,
            Algorithm::Sha1 => 20,
            Algorithm::Md5 => 16,
        }
    }

    /// Canonical lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Algorithm::Sha256 => "sha256",
            Algorithm::Sha1 => "sha1",
            Algorithm::Md5 => "md5",
        }
    }
}

impl std::str::FromStr for Algorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sha256" | "sha-256" => Ok(Algorithm::Sha256),
            "sha1" | "sha-1" => Ok(Algorithm::Sha1),
            "md5" => Ok(Algorithm::Md5),
            other => Err(format!("unsupported algorithm: {other}")),
        }
    }
}

impl std::fmt::Display for Algorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single progress event: percentage and status message.
pub type Progress = (u8, String);

/// Progress observer. May be invoked from any worker thread; implementations
/// must tolerate concurrent calls (typically by queueing to a UI thread).
pub type ProgressCallback = Arc<dyn Fn(u8, &str) + Send + Sync>;

/// Shared cooperative cancellation flag. Cloning shares the flag.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Workers observe it between read chunks and
    /// before each file dispatch.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_set(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

/// Shared cooperative pause gate. While paused, workers block at the next
/// read boundary until resumed.
#[derive(Clone, Debug, Default)]
pub struct PauseToken {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl PauseToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pause(&self) {
        let (lock, _) = &*self.inner;
        *lock.lock().unwrap() = true;
    }

    pub fn resume(&self) {
        let (lock, cvar) = &*self.inner;
        *lock.lock().unwrap() = false;
        cvar.notify_all();
    }

    pub fn is_paused(&self) -> bool {
        let (lock, _) = &*self.inner;
        *lock.lock().unwrap()
    }

    /// Block until the token is resumed. Returns immediately when not paused.
    pub fn wait_if_paused(&self) {
        let (lock, cvar) = &*self.inner;
        let mut paused = lock.lock().unwrap();
        while *paused {
            paused = cvar.wait(paused).unwrap();
        }
    }
}

/// Options for [`HashEngine`](crate::engine::HashEngine) operations.
#[derive(Clone)]
pub struct HashOptions {
    /// Allow parallel execution when the planner finds it beneficial.
    pub enable_parallel: bool,
    /// Fixed worker count. When set, storage profiling is skipped entirely
    /// and this value is used verbatim.
    pub max_workers_override: Option<u32>,
    /// Follow symbolic links during directory expansion. Off by default:
    /// forensic trees routinely contain links out of the evidence set.
    pub follow_symlinks: bool,
    /// Progress observer, rate-limited through the throttled sink.
    pub progress: Option<ProgressCallback>,
    /// Minimum interval between forwarded progress events.
    pub progress_interval: Duration,
    /// Cooperative cancellation signal.
    pub cancel: Option<CancelToken>,
    /// Cooperative pause gate.
    pub pause: Option<PauseToken>,
}

impl Default for HashOptions {
    fn default() -> Self {
        Self {
            enable_parallel: true,
            max_workers_override: None,
            follow_symlinks: false,
            progress: None,
            progress_interval: ProgressConsts::UPDATE_INTERVAL,
            cancel: None,
            pause: None,
        }
    }
}

/// Result of hashing a single file. `error` is `Some` when the file could
/// not be hashed; the entry still carries path and size context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HashResult {
    pub file_path: PathBuf,
    pub relative_path: PathBuf,
    pub algorithm: Algorithm,
    /// Lowercase hex digest; empty when `error` is set.
    pub hash_hex: String,
    pub file_size: u64,
    /// Wall-clock read duration (excludes the initial stat).
    pub duration: Duration,
    pub error: Option<HashCalcError>,
}

impl HashResult {
    pub fn success(&self) -> bool {
        self.error.is_none()
    }

    /// Hash throughput in MiB/s; 0 when size or duration is zero.
    pub fn speed_mbps(&self) -> f64 {
        let secs = self.duration.as_secs_f64();
        if secs > 0.0 && self.file_size > 0 {
            (self.file_size as f64 / (1024.0 * 1024.0)) / secs
        } else {
            0.0
        }
    }

    /// Build a failed entry carrying the error kind.
    pub fn failed(
        file_path: PathBuf,
        relative_path: PathBuf,
        algorithm: Algorithm,
        error: HashCalcError,
    ) -> Self {
        Self {
            file_path,
            relative_path,
            algorithm,
            hash_hex: String::new(),
            file_size: 0,
            duration: Duration::ZERO,
            error: Some(error),
        }
    }
}

/// Map of absolute path -> per-file result. Insertion order carries no
/// meaning.
pub type HashResultSet = HashMap<PathBuf, HashResult>;

/// Running counters for one batch operation.
#[derive(Debug, Clone, Default)]
pub struct HashOperationMetrics {
    pub start: Option<Instant>,
    pub end: Option<Instant>,
    pub total_files: u64,
    pub processed_files: u64,
    pub failed_files: u64,
    pub total_bytes: u64,
    pub processed_bytes: u64,
    pub current_file: String,
}

impl HashOperationMetrics {
    /// Elapsed time: end-to-start when finished, start-to-now while running.
    pub fn duration(&self) -> Duration {
        match (self.start, self.end) {
            (Some(s), Some(e)) => e.saturating_duration_since(s),
            (Some(s), None) => s.elapsed(),
            _ => Duration::ZERO,
        }
    }

    /// Percentage of files handled so far (successes and failures).
    pub fn progress_percent(&self) -> u8 {
        if self.total_files > 0 {
            (((self.processed_files + self.failed_files) * 100) / self.total_files) as u8
        } else {
            0
        }
    }

    /// Average throughput over processed bytes, in MiB/s.
    pub fn average_speed_mbps(&self) -> f64 {
        let secs = self.duration().as_secs_f64();
        if secs > 0.0 && self.processed_bytes > 0 {
            (self.processed_bytes as f64 / (1024.0 * 1024.0)) / secs
        } else {
            0.0
        }
    }
}

/// A hashed batch: the per-file result set plus operation counters.
#[derive(Debug, Clone)]
pub struct BatchResult {
    pub results: HashResultSet,
    pub metrics: HashOperationMetrics,
}

/// Classification of one logical entry after bidirectional verification.
/// Mismatched and one-sided entries are data, never errors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum VerificationOutcome {
    /// Both sides hashed and the digests are equal.
    ExactMatch {
        source: HashResult,
        target: HashResult,
    },
    /// Both sides hashed, digests differ.
    HashMismatch {
        source: HashResult,
        target: HashResult,
        note: String,
    },
    /// Present in the source set, absent in the target set by relative key.
    MissingTarget { source: HashResult, note: String },
    /// Present in the target set, absent in the source set by relative key.
    MissingSource { target: HashResult, note: String },
}

impl VerificationOutcome {
    pub fn is_match(&self) -> bool {
        matches!(self, VerificationOutcome::ExactMatch { .. })
    }

    /// Short kind tag for rendering and aggregation.
    pub fn kind(&self) -> &'static str {
        match self {
            VerificationOutcome::ExactMatch { .. } => "exact_match",
            VerificationOutcome::HashMismatch { .. } => "hash_mismatch",
            VerificationOutcome::MissingTarget { .. } => "missing_target",
            VerificationOutcome::MissingSource { .. } => "missing_source",
        }
    }
}

/// Successful verification run: outcome map plus the metadata bundle for
/// reporting (per-side metrics, storage verdicts, thread budgets, combined
/// throughput).
#[derive(Debug, Clone)]
pub struct VerificationReport {
    pub outcomes: HashMap<PathBuf, VerificationOutcome>,
    pub source_metrics: HashOperationMetrics,
    pub target_metrics: HashOperationMetrics,
    pub source_storage: StorageInfo,
    pub target_storage: StorageInfo,
    pub source_threads: u32,
    pub target_threads: u32,
    /// Wall-clock duration of the run; the sides execute concurrently, so
    /// this is the maximum of the two side durations.
    pub wall_clock_seconds: f64,
    /// Combined throughput: bytes hashed on both sides over wall-clock time.
    pub effective_mbps: f64,
}

impl VerificationReport {
    /// Count of outcomes of each kind: (matches, mismatches, missing).
    pub fn tally(&self) -> (usize, usize, usize) {
        let mut matches = 0;
        let mut mismatches = 0;
        let mut missing = 0;
        for outcome in self.outcomes.values() {
            match outcome {
                VerificationOutcome::ExactMatch { .. } => matches += 1,
                VerificationOutcome::HashMismatch { .. } => mismatches += 1,
                _ => missing += 1,
            }
        }
        (matches, mismatches, missing)
    }

    pub fn all_matched(&self) -> bool {
        self.outcomes.values().all(|o| o.is_match())
    }
}
