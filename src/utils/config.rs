//! Application configuration constants.
//! Tuning and thresholds in one place.

use std::time::Duration;

// ---- Hashing ----

/// Adaptive buffer thresholds and sizes for streaming hash I/O.
/// Small files are dominated by syscall and setup cost and prefer many small
/// reads; large files amortize bigger reads and keep kernel read-ahead full.
pub struct HashingConsts;

impl HashingConsts {
    /// Files below this size use the small buffer (bytes). 1 MB.
    pub const SMALL_FILE_THRESHOLD: u64 = 1_000_000;
    /// Files below this size use the medium buffer (bytes). 100 MB.
    pub const MEDIUM_FILE_THRESHOLD: u64 = 100_000_000;
    /// Read buffer for small files (bytes). 256 KiB.
    pub const SMALL_BUFFER: usize = 256 * 1024;
    /// Read buffer for medium files (bytes). 2 MiB.
    pub const MEDIUM_BUFFER: usize = 2 * 1024 * 1024;
    /// Read buffer for large files (bytes). 10 MiB.
    pub const LARGE_BUFFER: usize = 10 * 1024 * 1024;
}

// ---- Batch engine ----

/// Parallel batch submission and collection tuning.
pub struct BatchConsts;

impl BatchConsts {
    /// Chunk size multiplier: submit `workers * CHUNK_FACTOR` files at a time
    /// to keep threads busy without unbounded queue memory.
    pub const CHUNK_FACTOR: usize = 3;
    /// Hard cap on chunk size regardless of worker count.
    pub const CHUNK_MAX: usize = 100;
    /// Per-file result-retrieval timeout in parallel mode. Guards against
    /// wedged I/O (dying disks, dropped network mounts).
    pub const RESULT_TIMEOUT: Duration = Duration::from_secs(300);
}

// ---- Progress ----

/// Progress throttling tuning.
pub struct ProgressConsts;

impl ProgressConsts {
    /// Minimum interval between forwarded progress updates (10 updates/sec).
    /// Boundary values (0 and 100) bypass the throttle.
    pub const UPDATE_INTERVAL: Duration = Duration::from_millis(100);
}

// ---- Storage probe ----

/// Performance-heuristic probe tuning (see `storage::probe`).
pub struct ProbeConsts;

impl ProbeConsts {
    /// Probe file size (bytes). 10 MiB of random data, written then read back.
    pub const TEST_SIZE: usize = 10 * 1024 * 1024;
    /// Write speed below this is an HDD regardless of read speed (reads may
    /// be cache-inflated). MiB/s. The bound is strict: exactly 50 falls
    /// through to the uncertain branch.
    pub const HDD_WRITE_MAX: f64 = 50.0;
    /// Write speed above this combined with `NVME_READ_MIN` indicates NVMe. MiB/s.
    pub const NVME_WRITE_MIN: f64 = 100.0;
    /// Read speed floor for the NVMe classification. MiB/s.
    pub const NVME_READ_MIN: f64 = 200.0;
    /// Write speed floor for the SATA SSD classification. MiB/s.
    pub const SSD_WRITE_MIN: f64 = 50.0;
    /// Read speed floor for the SATA SSD classification. MiB/s.
    pub const SSD_READ_MIN: f64 = 100.0;
    /// Read speed below this is an HDD even when write speed was ambiguous. MiB/s.
    pub const HDD_READ_MAX: f64 = 50.0;
    /// Temp file name prefix for probe files.
    pub const PROBE_PREFIX: &'static str = ".evihash_probe";
}

// ---- Storage profiler ----

/// Profiler memoization and detector acceptance tuning.
pub struct ProfilerConsts;

impl ProfilerConsts {
    /// Cache TTL for per-mount detection results. Mounts can change, so keep
    /// this short.
    pub const CACHE_TTL: Duration = Duration::from_secs(300);
    /// Minimum confidence to accept a seek-penalty verdict.
    pub const SEEK_PENALTY_MIN_CONFIDENCE: f32 = 0.8;
    /// Minimum confidence to accept a performance-heuristic verdict.
    pub const PERF_MIN_CONFIDENCE: f32 = 0.7;
    /// Minimum confidence to accept an OS device-property verdict.
    pub const DEVICE_QUERY_MIN_CONFIDENCE: f32 = 0.6;
}

// ---- Thread planner ----

/// Planner caps and fixed rule outputs (see `planner` for the rule table).
pub struct PlannerConsts;

impl PlannerConsts {
    /// Upper bound on any planned thread count. Queue depths beyond this do
    /// not help even on NVMe.
    pub const MAX_THREADS: u32 = 64;
    /// Lower bound once a parallel rule has matched.
    pub const PARALLEL_FLOOR: u32 = 2;
    /// Threads for hashing from a spinning disk (OS read-queue reordering).
    pub const HDD_HASH_THREADS: u32 = 8;
    /// Threads for hashing when the source profile is missing or unknown.
    pub const UNKNOWN_HASH_THREADS: u32 = 4;
    /// Threads for copying HDD -> fast destination.
    pub const HDD_TO_FAST_COPY_THREADS: u32 = 8;
    /// Threads for copying between fast drives when at least one is NVMe.
    pub const FAST_NVME_COPY_THREADS: u32 = 32;
    /// Threads for copying SSD -> SSD (no NVMe on either side).
    pub const FAST_COPY_THREADS: u32 = 16;
}
