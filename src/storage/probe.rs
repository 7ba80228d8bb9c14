//! Performance-heuristic probe: classify a device by measured throughput.
//!
//! Writes a fresh buffer of random bytes near the target path, fsyncs, reads
//! it back, and classifies from the two speeds. Key insight from field use:
//! spinning disks often show fast cache-inflated reads but cannot hide slow
//! writes, so write speed is checked first.

use anyhow::{Context, Result};
use log::debug;
use rand::RngCore;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use tempfile::Builder;

use super::{BusType, DriveType};
use crate::utils::config::ProbeConsts;

/// Measured probe speeds in MiB/s.
#[derive(Debug, Clone, Copy)]
pub struct ProbeSpeeds {
    pub write_mbps: f64,
    pub read_mbps: f64,
}

/// Pick the directory to probe: the path itself when it is a directory,
/// otherwise its parent.
fn probe_dir(path: &Path) -> PathBuf {
    if path.is_dir() {
        path.to_path_buf()
    } else {
        path.parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(std::env::temp_dir)
    }
}

/// Run the write/read throughput test near `path`. Falls back to the system
/// temp dir when the target is not writable. The probe file is removed on
/// every exit path (temp file handle owns it).
pub fn measure_throughput(path: &Path) -> Result<ProbeSpeeds> {
    let dir = probe_dir(path);
    let mut tmp = match Builder::new()
        .prefix(ProbeConsts::PROBE_PREFIX)
        .tempfile_in(&dir)
    {
        Ok(t) => t,
        Err(e) => {
            debug!(
                "Cannot create probe file in {}: {}, using system temp dir",
                dir.display(),
                e
            );
            Builder::new()
                .prefix(ProbeConsts::PROBE_PREFIX)
                .tempfile()
                .context("create probe file in temp dir")?
        }
    };

    let mut data = vec![0u8; ProbeConsts::TEST_SIZE];
    rand::rng().fill_bytes(&mut data);

    let start = Instant::now();
    let file = tmp.as_file_mut();
    file.write_all(&data).context("write probe data")?;
    file.flush().context("flush probe data")?;
    file.sync_all().context("fsync probe data")?;
    let write_secs = start.elapsed().as_secs_f64().max(f64::EPSILON);

    let mut readback = tmp.reopen().context("reopen probe file")?;
    let mut buf = Vec::with_capacity(ProbeConsts::TEST_SIZE);
    let start = Instant::now();
    readback.read_to_end(&mut buf).context("read probe data")?;
    let read_secs = start.elapsed().as_secs_f64().max(f64::EPSILON);

    let mb = ProbeConsts::TEST_SIZE as f64 / (1024.0 * 1024.0);
    let speeds = ProbeSpeeds {
        write_mbps: mb / write_secs,
        read_mbps: mb / read_secs,
    };
    debug!(
        "Probe at {}: write={:.1} MiB/s, read={:.1} MiB/s",
        dir.display(),
        speeds.write_mbps,
        speeds.read_mbps
    );
    Ok(speeds)
}

/// Classify measured throughput. Returns (drive type, bus type, is_ssd,
/// confidence). Bounds are strict on both sides of 50 MiB/s write: exactly
/// 50 lands in the uncertain branch.
pub fn classify_throughput(
    speeds: ProbeSpeeds,
    is_removable: bool,
) -> (DriveType, BusType, Option<bool>, f32) {
    let ProbeSpeeds {
        write_mbps,
        read_mbps,
    } = speeds;

    if write_mbps < ProbeConsts::HDD_WRITE_MAX {
        // Slow write is an HDD even when reads look fast (drive cache).
        let drive = if is_removable {
            DriveType::ExternalHdd
        } else {
            DriveType::Hdd
        };
        let bus = if is_removable {
            BusType::Usb
        } else {
            BusType::Sata
        };
        (drive, bus, Some(false), 0.8)
    } else if write_mbps > ProbeConsts::NVME_WRITE_MIN && read_mbps > ProbeConsts::NVME_READ_MIN {
        let drive = if is_removable {
            DriveType::ExternalSsd
        } else {
            DriveType::Nvme
        };
        let bus = if is_removable {
            BusType::Usb
        } else {
            BusType::Nvme
        };
        (drive, bus, Some(true), 0.8)
    } else if write_mbps > ProbeConsts::SSD_WRITE_MIN && read_mbps > ProbeConsts::SSD_READ_MIN {
        let drive = if is_removable {
            DriveType::ExternalSsd
        } else {
            DriveType::Ssd
        };
        let bus = if is_removable {
            BusType::Usb
        } else {
            BusType::Sata
        };
        (drive, bus, Some(true), 0.75)
    } else if read_mbps < ProbeConsts::HDD_READ_MAX {
        let drive = if is_removable {
            DriveType::ExternalHdd
        } else {
            DriveType::Hdd
        };
        let bus = if is_removable {
            BusType::Usb
        } else {
            BusType::Sata
        };
        (drive, bus, Some(false), 0.7)
    } else {
        // Uncertain (older SSD, odd controller). Assume spinning so an
        // unknown device is never over-parallelized.
        let drive = if is_removable {
            DriveType::ExternalHdd
        } else {
            DriveType::Hdd
        };
        (drive, BusType::Unknown, Some(false), 0.4)
    }
}
