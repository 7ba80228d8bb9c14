//! Batch hash engine: discovery, storage-aware parallelism decision, and the
//! sequential / chunked-parallel execution paths.

use crossbeam_channel::{RecvTimeoutError, bounded};
use log::{debug, info, warn};
use std::collections::HashSet;
use std::path::PathBuf;
use std::thread;
use std::time::Instant;
use walkdir::WalkDir;

use crate::error::HashCalcError;
use crate::planner::{OpKind, ThreadPlanner};
use crate::storage::StorageProfiler;
use crate::types::{
    Algorithm, BatchResult, HashOperationMetrics, HashOptions, HashResult, HashResultSet,
};
use crate::utils::config::BatchConsts;

use super::hasher::hash_file;
use super::progress::ThrottledProgressSink;

/// One unit of hashing work: the absolute path plus the path relative to the
/// input root that produced it.
#[derive(Debug, Clone)]
pub struct WorkItem {
    pub absolute: PathBuf,
    pub relative: PathBuf,
}

/// Expand input paths into the work set. Files are taken as-is, directories
/// recurse; symlinks are followed only when `follow_symlinks` is set.
/// Unreadable subtrees are logged and skipped; inputs that are neither file
/// nor directory are ignored.
pub fn discover_files(paths: &[PathBuf], follow_symlinks: bool) -> Vec<WorkItem> {
    let mut items = Vec::new();
    for input in paths {
        if input.is_file() {
            let relative = input
                .file_name()
                .map(PathBuf::from)
                .unwrap_or_else(|| input.clone());
            items.push(WorkItem {
                absolute: input.clone(),
                relative,
            });
        } else if input.is_dir() {
            for entry in WalkDir::new(input).follow_links(follow_symlinks) {
                match entry {
                    Ok(e) if e.file_type().is_file() => {
                        let absolute = e.into_path();
                        let relative = absolute
                            .strip_prefix(input)
                            .map(|p| p.to_path_buf())
                            .unwrap_or_else(|_| absolute.clone());
                        items.push(WorkItem { absolute, relative });
                    }
                    Ok(_) => {}
                    Err(err) => {
                        warn!("Permission denied or error accessing path: {err}");
                    }
                }
            }
        } else {
            debug!(
                "Ignoring input that is neither file nor directory: {}",
                input.display()
            );
        }
    }
    items
}

/// Internal failure classification for a parallel pass. `Pool` failures
/// (spawn errors, worker panics) trigger the one-shot sequential retry;
/// `Engine` failures propagate to the caller.
enum PassError {
    Engine(HashCalcError),
    Pool(String),
}

/// Hashing and verification engine. Owns the storage profiler (and its
/// memoization cache) and the thread planner; operations take the algorithm
/// and options per call.
pub struct HashEngine {
    profiler: StorageProfiler,
    planner: ThreadPlanner,
}

impl Default for HashEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl HashEngine {
    pub fn new() -> Self {
        Self {
            profiler: StorageProfiler::new(),
            planner: ThreadPlanner::new(),
        }
    }

    /// Engine with injected profiler/planner (tests pin CPU count and FD cap).
    pub fn with_parts(profiler: StorageProfiler, planner: ThreadPlanner) -> Self {
        Self { profiler, planner }
    }

    pub fn profiler(&self) -> &StorageProfiler {
        &self.profiler
    }

    pub fn planner(&self) -> &ThreadPlanner {
        &self.planner
    }

    /// Hash every file reachable from `paths`.
    ///
    /// Per-file failures are folded into the result set and do not abort the
    /// batch; the whole call fails only on cancellation, when discovery finds
    /// nothing, or when every single file failed.
    pub fn hash_files(
        &self,
        paths: &[PathBuf],
        algorithm: Algorithm,
        options: &HashOptions,
    ) -> Result<BatchResult, HashCalcError> {
        let files = discover_files(paths, options.follow_symlinks);
        if files.is_empty() {
            return Err(HashCalcError::NoFiles);
        }
        self.run_batch(files, algorithm, options)
    }

    /// Run a batch over an already-discovered work set. Shared by
    /// `hash_files` and the verifier (which expands each side itself).
    pub(crate) fn run_batch(
        &self,
        files: Vec<WorkItem>,
        algorithm: Algorithm,
        options: &HashOptions,
    ) -> Result<BatchResult, HashCalcError> {
        let total_files = files.len() as u64;
        let mut metrics = HashOperationMetrics {
            start: Some(Instant::now()),
            total_files,
            total_bytes: files
                .iter()
                .filter_map(|f| std::fs::metadata(&f.absolute).ok())
                .map(|m| m.len())
                .sum(),
            ..Default::default()
        };
        let sink = options
            .progress
            .clone()
            .map(|cb| ThrottledProgressSink::new(cb, options.progress_interval));

        let workers = self.plan_workers(&files, options);
        let run = if workers > 1 {
            match self.parallel_pass(&files, workers, algorithm, options, sink.as_ref(), &mut metrics)
            {
                Ok(results) => Ok(results),
                Err(PassError::Engine(e)) => Err(e),
                Err(PassError::Pool(msg)) => {
                    // Safety net, not a performance path: one retry, sequential
                    warn!("Parallel hashing failed ({msg}); retrying in sequential mode");
                    metrics = HashOperationMetrics {
                        start: metrics.start,
                        total_files,
                        total_bytes: metrics.total_bytes,
                        ..Default::default()
                    };
                    self.sequential_pass(&files, algorithm, options, sink.as_ref(), &mut metrics)
                }
            }
        } else {
            self.sequential_pass(&files, algorithm, options, sink.as_ref(), &mut metrics)
        };

        let results = match run {
            Ok(results) => results,
            Err(e) => {
                if let Some(sink) = &sink {
                    sink.flush();
                }
                return Err(e);
            }
        };

        metrics.end = Some(Instant::now());
        metrics.current_file.clear();

        if metrics.processed_files == 0 {
            if let Some(sink) = &sink {
                sink.flush();
            }
            return Err(HashCalcError::AllFailed { count: total_files });
        }

        info!(
            "Hashing complete: {} files, {:.1}s, {:.1} MiB/s",
            metrics.processed_files,
            metrics.duration().as_secs_f64(),
            metrics.average_speed_mbps()
        );
        if let Some(sink) = &sink {
            sink.report(
                100,
                &format!("Hashing complete: {} files", metrics.processed_files),
            );
            sink.flush();
        }

        Ok(BatchResult { results, metrics })
    }

    /// Decide the worker count. An explicit override skips storage profiling
    /// entirely; otherwise the first file's device is profiled and fed to the
    /// planner together with the file count.
    fn plan_workers(&self, files: &[WorkItem], options: &HashOptions) -> u32 {
        if !options.enable_parallel || files.len() <= 1 {
            return 1;
        }
        if let Some(w) = options.max_workers_override {
            info!("Using manual worker override: {w} threads (skipping storage detection)");
            return w.max(1);
        }
        let storage = self.profiler.analyze(&files[0].absolute);
        info!("Storage detected: {storage}");
        let planned = self
            .planner
            .plan(Some(&storage), None, files.len() as u64, OpKind::Hash);
        info!("Planned {planned} threads for hash operation");
        planned
    }

    fn sequential_pass(
        &self,
        files: &[WorkItem],
        algorithm: Algorithm,
        options: &HashOptions,
        sink: Option<&ThrottledProgressSink>,
        metrics: &mut HashOperationMetrics,
    ) -> Result<HashResultSet, HashCalcError> {
        let total = files.len() as u64;
        report(sink, 0, &format!("Hashing {total} files"));

        let mut results = HashResultSet::with_capacity(files.len());
        let mut completed = 0u64;
        for item in files {
            if cancelled(options) {
                info!("Sequential hashing cancelled");
                return Err(HashCalcError::Cancelled);
            }
            metrics.current_file = item
                .absolute
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();

            let result = hash_file(
                &item.absolute,
                &item.relative,
                algorithm,
                options.cancel.as_ref(),
                options.pause.as_ref(),
            );
            if matches!(result.error, Some(HashCalcError::Cancelled)) {
                // in-flight partial result is dropped
                info!("Sequential hashing cancelled");
                return Err(HashCalcError::Cancelled);
            }
            completed += 1;
            record(&mut results, metrics, result);
            report(
                sink,
                percent(completed, total),
                &format!("Hashed {completed}/{total} files"),
            );
        }
        Ok(results)
    }

    /// Chunked parallel pass: a bounded worker pool consumes from a job
    /// channel while this thread collects results. Submission happens in
    /// chunks of `min(3 * workers, 100)` so at most one chunk of futures is
    /// outstanding and queue memory stays O(workers).
    fn parallel_pass(
        &self,
        files: &[WorkItem],
        workers: u32,
        algorithm: Algorithm,
        options: &HashOptions,
        sink: Option<&ThrottledProgressSink>,
        metrics: &mut HashOperationMetrics,
    ) -> Result<HashResultSet, PassError> {
        let workers = workers as usize;
        let chunk_size = (workers * BatchConsts::CHUNK_FACTOR).min(BatchConsts::CHUNK_MAX);
        let total = files.len() as u64;
        info!(
            "Parallel hashing: {total} files, {workers} workers, chunk size {chunk_size}"
        );
        report(sink, 0, &format!("Hashing {total} files"));

        let (job_tx, job_rx) = bounded::<WorkItem>(chunk_size);
        let (result_tx, result_rx) = bounded::<HashResult>(chunk_size);

        let mut handles: Vec<thread::JoinHandle<()>> = Vec::with_capacity(workers);
        for i in 0..workers {
            let job_rx = job_rx.clone();
            let result_tx = result_tx.clone();
            let cancel = options.cancel.clone();
            let pause = options.pause.clone();
            let spawned = thread::Builder::new()
                .name(format!("hash-worker-{i}"))
                .spawn(move || {
                    while let Ok(item) = job_rx.recv() {
                        let result = hash_file(
                            &item.absolute,
                            &item.relative,
                            algorithm,
                            cancel.as_ref(),
                            pause.as_ref(),
                        );
                        if result_tx.send(result).is_err() {
                            break;
                        }
                    }
                });
            match spawned {
                Ok(handle) => handles.push(handle),
                Err(e) => {
                    drop(job_tx);
                    for h in handles.drain(..) {
                        let _ = h.join();
                    }
                    return Err(PassError::Pool(format!("spawn hash worker: {e}")));
                }
            }
        }
        drop(job_rx);
        drop(result_tx);

        let mut results = HashResultSet::with_capacity(files.len());
        let mut completed = 0u64;
        // Paths that hit the timeout; their late results are discarded
        let mut stale: HashSet<PathBuf> = HashSet::new();
        let mut timed_out = false;
        let mut saw_cancel = false;

        'chunks: for chunk in files.chunks(chunk_size) {
            if cancelled(options) {
                saw_cancel = true;
                break 'chunks;
            }

            let mut pending: HashSet<PathBuf> =
                chunk.iter().map(|i| i.absolute.clone()).collect();
            for item in chunk {
                if job_tx.send(item.clone()).is_err() {
                    for h in handles.drain(..) {
                        let _ = h.join();
                    }
                    return Err(PassError::Pool("worker pool disconnected".into()));
                }
            }

            let deadline = Instant::now() + BatchConsts::RESULT_TIMEOUT;
            while !pending.is_empty() {
                if cancelled(options) {
                    saw_cancel = true;
                    break 'chunks;
                }
                match result_rx.recv_deadline(deadline) {
                    Ok(result) => {
                        if stale.remove(&result.file_path) {
                            debug!(
                                "Discarding late result for timed-out file {}",
                                result.file_path.display()
                            );
                            continue;
                        }
                        if matches!(result.error, Some(HashCalcError::Cancelled)) {
                            saw_cancel = true;
                            break 'chunks;
                        }
                        pending.remove(&result.file_path);
                        completed += 1;
                        record(&mut results, metrics, result);
                        report(
                            sink,
                            percent(completed, total),
                            &format!("Hashed {completed}/{total} files"),
                        );
                    }
                    Err(RecvTimeoutError::Timeout) => {
                        warn!(
                            "{} file(s) exceeded the {}s hash timeout; marking and continuing",
                            pending.len(),
                            BatchConsts::RESULT_TIMEOUT.as_secs()
                        );
                        for path in pending.drain() {
                            let relative = chunk
                                .iter()
                                .find(|i| i.absolute == path)
                                .map(|i| i.relative.clone())
                                .unwrap_or_else(|| path.clone());
                            completed += 1;
                            record(
                                &mut results,
                                metrics,
                                HashResult::failed(
                                    path.clone(),
                                    relative,
                                    algorithm,
                                    HashCalcError::Timeout { path: path.clone() },
                                ),
                            );
                            report(
                                sink,
                                percent(completed, total),
                                &format!("Hashed {completed}/{total} files"),
                            );
                            stale.insert(path);
                        }
                        timed_out = true;
                    }
                    Err(RecvTimeoutError::Disconnected) => {
                        for h in handles.drain(..) {
                            let _ = h.join();
                        }
                        return Err(PassError::Pool("worker pool disconnected".into()));
                    }
                }
            }
        }

        drop(job_tx);

        if saw_cancel {
            info!("Parallel hashing cancelled; draining workers");
            // Workers see the closed channel (and the cancel flag mid-file)
            // and exit within one read-buffer of work
            drop(result_rx);
            for h in handles.drain(..) {
                let _ = h.join();
            }
            return Err(PassError::Engine(HashCalcError::Cancelled));
        }

        drop(result_rx);
        if timed_out {
            // A wedged read can never be joined; detach rather than hang
            warn!("Abandoning worker pool after timeout; wedged workers detached");
            drop(handles);
        } else {
            for h in handles.drain(..) {
                if h.join().is_err() {
                    return Err(PassError::Pool("hash worker panicked".into()));
                }
            }
        }

        Ok(results)
    }
}

fn cancelled(options: &HashOptions) -> bool {
    options.cancel.as_ref().is_some_and(|c| c.is_set())
}

fn percent(completed: u64, total: u64) -> u8 {
    if total == 0 {
        0
    } else {
        ((completed * 100) / total) as u8
    }
}

fn report(sink: Option<&ThrottledProgressSink>, pct: u8, message: &str) {
    if let Some(sink) = sink {
        sink.report(pct, message);
    }
}

/// Fold one per-file result into the set and counters.
fn record(results: &mut HashResultSet, metrics: &mut HashOperationMetrics, result: HashResult) {
    if result.success() {
        metrics.processed_files += 1;
        metrics.processed_bytes += result.file_size;
    } else {
        metrics.failed_files += 1;
        if let Some(err) = &result.error {
            warn!("Hash failed for {}: {err}", result.file_path.display());
        }
    }
    results.insert(result.file_path.clone(), result);
}
