//! Bidirectional verification: two concurrent batch passes with independent
//! thread budgets, then a relative-path set compare.
//!
//! Mismatches and one-sided entries are results, never errors; the call
//! fails only on cancellation or a true per-side failure.

use log::{debug, info, warn};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;

use crate::error::{HashCalcError, HashVerifyError};
use crate::planner::OpKind;
use crate::types::{
    Algorithm, BatchResult, HashOptions, HashResult, HashResultSet, ProgressCallback,
    VerificationOutcome, VerificationReport,
};

use super::batch::{HashEngine, discover_files};
use super::progress::VerifyProgressAggregator;

impl HashEngine {
    /// Verify `source_paths` against `target_paths`: expand both sides,
    /// profile and plan each side independently, hash both concurrently, and
    /// classify every logical entry by relative path.
    pub fn verify(
        &self,
        source_paths: &[PathBuf],
        target_paths: &[PathBuf],
        algorithm: Algorithm,
        options: &HashOptions,
    ) -> Result<VerificationReport, HashVerifyError> {
        let source_files = discover_files(source_paths, options.follow_symlinks);
        if source_files.is_empty() {
            return Err(HashVerifyError::NoSourceFiles);
        }
        let target_files = discover_files(target_paths, options.follow_symlinks);
        if target_files.is_empty() {
            return Err(HashVerifyError::NoTargetFiles);
        }
        let source_count = source_files.len() as u64;
        let target_count = target_files.len() as u64;

        // One profile per side; the override only skips the planner
        let source_storage = self.profiler().analyze(&source_files[0].absolute);
        let target_storage = self.profiler().analyze(&target_files[0].absolute);
        let (source_threads, target_threads) = match options.max_workers_override {
            Some(w) => (w.max(1), w.max(1)),
            None => (
                self.planner()
                    .plan(Some(&source_storage), None, source_count, OpKind::Hash),
                self.planner()
                    .plan(Some(&target_storage), None, target_count, OpKind::Hash),
            ),
        };

        info!("Verification starting:");
        info!(
            "  Source: {} on '{}' ({} threads, {:.0}% confidence)",
            source_storage.drive_type,
            source_storage.drive_letter,
            source_threads,
            source_storage.confidence * 100.0
        );
        info!(
            "  Target: {} on '{}' ({} threads, {:.0}% confidence)",
            target_storage.drive_type,
            target_storage.drive_letter,
            target_threads,
            target_storage.confidence * 100.0
        );

        let aggregator = options.progress.clone().map(|cb| {
            Arc::new(VerifyProgressAggregator::new(
                source_count,
                target_count,
                cb,
                options.progress_interval,
            ))
        });
        let source_progress: Option<ProgressCallback> = aggregator.clone().map(|agg| {
            Arc::new(move |p: u8, m: &str| agg.update_source(p, m)) as ProgressCallback
        });
        let target_progress: Option<ProgressCallback> = aggregator.clone().map(|agg| {
            Arc::new(move |p: u8, m: &str| agg.update_target(p, m)) as ProgressCallback
        });

        // Each side gets its budget as an override so the per-side engine
        // does not profile again
        let side_options = |threads: u32, progress: Option<ProgressCallback>| HashOptions {
            enable_parallel: options.enable_parallel,
            max_workers_override: Some(threads),
            follow_symlinks: options.follow_symlinks,
            progress,
            progress_interval: options.progress_interval,
            cancel: options.cancel.clone(),
            pause: options.pause.clone(),
        };
        let source_options = side_options(source_threads, source_progress);
        let target_options = side_options(target_threads, target_progress);

        let (source_run, target_run) = thread::scope(|s| {
            let source_handle = s.spawn(move || self.run_batch(source_files, algorithm, &source_options));
            let target_handle = s.spawn(move || self.run_batch(target_files, algorithm, &target_options));
            (
                join_side(source_handle.join(), "source"),
                join_side(target_handle.join(), "target"),
            )
        });

        if let Some(agg) = &aggregator {
            agg.flush();
        }

        // Cancellation takes precedence over any in-flight error
        if options.cancel.as_ref().is_some_and(|c| c.is_set())
            || matches!(source_run, Err(HashCalcError::Cancelled))
            || matches!(target_run, Err(HashCalcError::Cancelled))
        {
            info!("Verification cancelled");
            return Err(HashVerifyError::Cancelled);
        }
        let source_run: BatchResult = source_run.map_err(HashVerifyError::SourceFailed)?;
        let target_run: BatchResult = target_run.map_err(HashVerifyError::TargetFailed)?;

        let outcomes = compare_result_sets(&source_run.results, &target_run.results);

        let wall_clock = source_run
            .metrics
            .duration()
            .max(target_run.metrics.duration());
        let wall_clock_seconds = wall_clock.as_secs_f64();
        let total_bytes = source_run.metrics.processed_bytes + target_run.metrics.processed_bytes;
        let effective_mbps = if wall_clock_seconds > 0.0 {
            (total_bytes as f64 / (1024.0 * 1024.0)) / wall_clock_seconds
        } else {
            0.0
        };

        info!(
            "Verification complete: {:.1}s | Source: {:.1} MiB/s | Target: {:.1} MiB/s | Combined: {:.1} MiB/s",
            wall_clock_seconds,
            source_run.metrics.average_speed_mbps(),
            target_run.metrics.average_speed_mbps(),
            effective_mbps
        );

        Ok(VerificationReport {
            outcomes,
            source_metrics: source_run.metrics,
            target_metrics: target_run.metrics,
            source_storage,
            target_storage,
            source_threads,
            target_threads,
            wall_clock_seconds,
            effective_mbps,
        })
    }
}

fn join_side(
    joined: thread::Result<Result<BatchResult, HashCalcError>>,
    side: &str,
) -> Result<BatchResult, HashCalcError> {
    match joined {
        Ok(result) => result,
        Err(_) => {
            warn!("{side} hashing thread panicked");
            Err(HashCalcError::Io {
                path: PathBuf::new(),
                message: format!("{side} hashing thread panicked"),
            })
        }
    }
}

/// Classify every logical entry across the two result sets.
///
/// Entries are matched by path relative to each side's deepest common
/// directory, so duplicate file names in different subtrees pair correctly.
/// Only successfully hashed entries participate; per-file failures stay
/// visible through the side metrics.
pub fn compare_result_sets(
    source: &HashResultSet,
    target: &HashResultSet,
) -> HashMap<PathBuf, VerificationOutcome> {
    let source_ok: Vec<(&PathBuf, &HashResult)> =
        source.iter().filter(|(_, r)| r.success()).collect();
    let target_ok: Vec<(&PathBuf, &HashResult)> =
        target.iter().filter(|(_, r)| r.success()).collect();

    let source_root = deepest_common_dir(source_ok.iter().map(|(p, _)| p.as_path()));
    let target_root = deepest_common_dir(target_ok.iter().map(|(p, _)| p.as_path()));
    debug!("Source common root: {}", source_root.display());
    debug!("Target common root: {}", target_root.display());

    let mut target_by_rel: HashMap<PathBuf, (&PathBuf, &HashResult)> = HashMap::new();
    for (path, result) in &target_ok {
        target_by_rel.insert(relative_key(path, &target_root), (*path, *result));
    }

    let mut outcomes = HashMap::new();
    let mut matched: HashSet<PathBuf> = HashSet::new();

    for (path, source_result) in &source_ok {
        let rel = relative_key(path, &source_root);
        match target_by_rel.get(&rel) {
            Some((_, target_result)) => {
                matched.insert(rel);
                let outcome = if source_result.hash_hex == target_result.hash_hex {
                    VerificationOutcome::ExactMatch {
                        source: (*source_result).clone(),
                        target: (*target_result).clone(),
                    }
                } else {
                    VerificationOutcome::HashMismatch {
                        source: (*source_result).clone(),
                        target: (*target_result).clone(),
                        note: format!(
                            "Hash mismatch: {}... != {}...",
                            short_hash(&source_result.hash_hex),
                            short_hash(&target_result.hash_hex)
                        ),
                    }
                };
                outcomes.insert((*path).clone(), outcome);
            }
            None => {
                outcomes.insert(
                    (*path).clone(),
                    VerificationOutcome::MissingTarget {
                        source: (*source_result).clone(),
                        note: format!(
                            "File with relative path '{}' not found in target",
                            rel.display()
                        ),
                    },
                );
            }
        }
    }

    for (rel, (target_path, target_result)) in &target_by_rel {
        if !matched.contains(rel) {
            outcomes.insert(
                (*target_path).clone(),
                VerificationOutcome::MissingSource {
                    target: (*target_result).clone(),
                    note: format!(
                        "File with relative path '{}' not found in source",
                        rel.display()
                    ),
                },
            );
        }
    }

    outcomes
}

/// Deepest directory containing every given file path (the parent of a
/// lone path).
pub fn deepest_common_dir<'a, I>(paths: I) -> PathBuf
where
    I: Iterator<Item = &'a Path>,
{
    let mut common: Option<PathBuf> = None;
    for path in paths {
        let parent = path.parent().unwrap_or(Path::new("")).to_path_buf();
        common = Some(match common {
            None => parent,
            Some(c) => common_prefix(&c, &parent),
        });
    }
    common.unwrap_or_default()
}

fn common_prefix(a: &Path, b: &Path) -> PathBuf {
    a.components()
        .zip(b.components())
        .take_while(|(x, y)| x == y)
        .map(|(x, _)| x.as_os_str())
        .collect()
}

/// Key a path relative to the side's common root; falls back to the file
/// name when the path is not under the root.
fn relative_key(path: &Path, root: &Path) -> PathBuf {
    path.strip_prefix(root)
        .map(|p| p.to_path_buf())
        .unwrap_or_else(|_| {
            path.file_name()
                .map(PathBuf::from)
                .unwrap_or_else(|| path.to_path_buf())
        })
}

fn short_hash(hex: &str) -> &str {
    &hex[..hex.len().min(8)]
}
