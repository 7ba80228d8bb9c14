//! CPU-aware thread planning for storage operations.
//!
//! Single source of truth for parallelism: no other component picks a
//! thread count on its own. The rule table encodes published disk
//! parallelism measurements (https://pkolaczk.github.io/disk-parallelism/):
//! HDD writes regress under multi-threading, NVMe scales to roughly twice
//! the core count but not usefully past 64 queued operations.

use log::debug;

use crate::storage::{DriveType, StorageInfo};
use crate::utils::config::PlannerConsts;

/// Descriptors held back from the worker budget: stdio, log sinks, report
/// writers, and whatever else the embedding application keeps open.
const RESERVED_FDS: u64 = 64;

/// Descriptors per hash worker: the data file plus one transient handle
/// (directory reads, the profiler's probe file).
const FDS_PER_WORKER: u64 = 2;

/// Worker-count ceiling derived from the process NOFILE limit, so a planned
/// pool can never starve the process of descriptors. `None` when the
/// platform exposes no usable limit.
fn fd_budget_cap() -> Option<u32> {
    let limit = nofile_soft_limit()?;
    let usable = limit.saturating_sub(RESERVED_FDS);
    if usable < FDS_PER_WORKER {
        return Some(1);
    }
    Some((usable / FDS_PER_WORKER).min(u32::MAX as u64) as u32)
}

#[cfg(unix)]
fn nofile_soft_limit() -> Option<u64> {
    use std::mem::MaybeUninit;
    let mut rlim = MaybeUninit::<libc::rlimit>::uninit();
    if unsafe { libc::getrlimit(libc::RLIMIT_NOFILE, rlim.as_mut_ptr()) } != 0 {
        return None;
    }
    let cur = unsafe { rlim.assume_init() }.rlim_cur;
    // RLIM_INFINITY and absurdly large limits mean "no practical limit"
    (cur != libc::RLIM_INFINITY && cur <= i64::MAX as u64).then_some(cur)
}

#[cfg(not(unix))]
fn nofile_soft_limit() -> Option<u64> {
    None
}

/// Operation kind the plan is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpKind {
    Hash,
    Copy,
}

/// Pure thread-count planner. CPU count and the FD-limit cap are sampled at
/// construction so `plan` itself is deterministic (and injectable in tests).
#[derive(Debug, Clone)]
pub struct ThreadPlanner {
    cpu_threads: u32,
    fd_cap: Option<u32>,
}

impl Default for ThreadPlanner {
    fn default() -> Self {
        Self::new()
    }
}

impl ThreadPlanner {
    /// Planner for this host: logical CPU count from rayon, FD cap from the
    /// process rlimit.
    pub fn new() -> Self {
        let cpu_threads = rayon::current_num_threads().max(1) as u32;
        let fd_cap = fd_budget_cap().map(|n| n.max(1));
        debug!("ThreadPlanner: {cpu_threads} CPU threads, fd cap {fd_cap:?}");
        Self {
            cpu_threads,
            fd_cap,
        }
    }

    /// Planner with explicit limits (tests, benchmarks). `fd_cap: None`
    /// disables the descriptor cap.
    pub fn with_limits(cpu_threads: u32, fd_cap: Option<u32>) -> Self {
        Self {
            cpu_threads: cpu_threads.max(1),
            fd_cap,
        }
    }

    /// Plan a thread count for an operation. Rules evaluate top to bottom,
    /// first match wins; the result is always in [1, 64] and additionally
    /// capped by the FD budget.
    pub fn plan(
        &self,
        source: Option<&StorageInfo>,
        dest: Option<&StorageInfo>,
        file_count: u64,
        op: OpKind,
    ) -> u32 {
        let threads = self.plan_uncapped(source, dest, file_count, op);
        match self.fd_cap {
            Some(cap) if cap < threads => {
                debug!("Capping planned threads {threads} -> {cap} (NOFILE budget)");
                cap
            }
            _ => threads,
        }
    }

    fn plan_uncapped(
        &self,
        source: Option<&StorageInfo>,
        dest: Option<&StorageInfo>,
        file_count: u64,
        op: OpKind,
    ) -> u32 {
        // Single file: no parallelism benefit
        if file_count == 1 {
            debug!("Single file - sequential operation");
            return 1;
        }

        match op {
            OpKind::Hash => self.plan_hash(source),
            OpKind::Copy => self.plan_copy(source, dest),
        }
    }

    fn plan_hash(&self, source: Option<&StorageInfo>) -> u32 {
        let Some(source) = source else {
            debug!("No source profile - conservative hash parallelism");
            return PlannerConsts::UNKNOWN_HASH_THREADS.min(self.cpu_threads);
        };

        match source.drive_type {
            // Spinning source: a short queue lets the OS reorder reads
            DriveType::Hdd | DriveType::ExternalHdd => {
                debug!(
                    "HDD source - {} threads for read-queue reordering",
                    PlannerConsts::HDD_HASH_THREADS
                );
                PlannerConsts::HDD_HASH_THREADS
            }
            DriveType::Nvme => {
                let threads = self.two_per_core();
                debug!(
                    "NVMe source - {threads} threads ({} CPU threads x 2, cap {})",
                    self.cpu_threads,
                    PlannerConsts::MAX_THREADS
                );
                threads
            }
            DriveType::Ssd | DriveType::ExternalSsd => {
                let threads = self.two_per_core();
                debug!(
                    "SSD source - {threads} threads ({} CPU threads x 2, cap {})",
                    self.cpu_threads,
                    PlannerConsts::MAX_THREADS
                );
                threads
            }
            _ => {
                debug!("Unclassified source - conservative hash parallelism");
                PlannerConsts::UNKNOWN_HASH_THREADS.min(self.cpu_threads)
            }
        }
    }

    fn plan_copy(&self, source: Option<&StorageInfo>, dest: Option<&StorageInfo>) -> u32 {
        let (Some(source), Some(dest)) = (source, dest) else {
            debug!("Missing storage profile for copy - sequential");
            return 1;
        };

        // Spinning destination: parallel writes thrash the head, always lose
        if dest.drive_type.is_spinning() {
            debug!("Destination is HDD - sequential to avoid write seek penalty");
            return 1;
        }

        if source.drive_type.is_spinning() {
            if dest.drive_type.is_fast() {
                debug!(
                    "HDD source -> {} destination - {} threads for read-queue reordering",
                    dest.drive_type,
                    PlannerConsts::HDD_TO_FAST_COPY_THREADS
                );
                return PlannerConsts::HDD_TO_FAST_COPY_THREADS;
            }
            debug!("HDD source with unclassified destination - sequential");
            return 1;
        }

        if source.drive_type == DriveType::Nvme && dest.drive_type == DriveType::Nvme {
            let threads = self.two_per_core();
            debug!(
                "NVMe -> NVMe - {threads} threads ({} CPU threads x 2, cap {})",
                self.cpu_threads,
                PlannerConsts::MAX_THREADS
            );
            return threads;
        }

        if source.drive_type.is_fast() && dest.drive_type.is_fast() {
            let threads = if source.drive_type == DriveType::Nvme
                || dest.drive_type == DriveType::Nvme
            {
                PlannerConsts::FAST_NVME_COPY_THREADS
            } else {
                PlannerConsts::FAST_COPY_THREADS
            };
            debug!(
                "{} -> {} - {threads} threads",
                source.drive_type, dest.drive_type
            );
            return threads;
        }

        debug!("Unclassified storage combination - sequential for safety");
        1
    }

    fn two_per_core(&self) -> u32 {
        (self.cpu_threads * 2).clamp(PlannerConsts::PARALLEL_FLOOR, PlannerConsts::MAX_THREADS)
    }
}
