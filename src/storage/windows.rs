//! Windows-specific device property query using sysinfo's WMI-backed disk
//! kind, plus the seek-penalty probe slot.

use log::debug;
use std::path::Path;
use sysinfo::DiskKind;

use super::{BusType, DriveType, MountSnapshot};

/// Query StorageDeviceSeekPenaltyProperty for the volume backing `path`.
/// `Some(false)` means no seek penalty (solid-state), `Some(true)` rotational.
///
/// TODO: wire up the DeviceIoControl(IOCTL_STORAGE_QUERY_PROPERTY) call; the
/// detection chain degrades to the performance heuristic until then.
pub fn seek_penalty(path: &Path) -> Option<bool> {
    debug!(
        "Seek-penalty query not implemented for {}; falling through",
        path.display()
    );
    None
}

pub fn detect(path: &Path, mount: &MountSnapshot) -> Option<(DriveType, BusType, &'static str)> {
    debug!(
        "Device query: path={}, mount={}, kind={:?}",
        path.display(),
        mount.mount_point.display(),
        mount.kind
    );

    match mount.kind {
        DiskKind::HDD => Some((DriveType::Hdd, BusType::Sata, "wmi_kind")),
        DiskKind::SSD => Some((DriveType::Ssd, BusType::Sata, "wmi_kind")),
        // WMI can fail or report Unknown for removable/virtual/NVMe drives;
        // let the conservative fallback take over rather than guess.
        DiskKind::Unknown(_) => None,
    }
}
