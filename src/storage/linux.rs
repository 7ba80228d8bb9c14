//! Linux-specific device property query using sysinfo and /sys/block

use log::debug;
use std::path::Path;
use sysinfo::DiskKind;

use super::{BusType, DriveType, MountSnapshot};

pub fn detect(path: &Path, mount: &MountSnapshot) -> Option<(DriveType, BusType, &'static str)> {
    debug!(
        "Device query: path={}, mount={}, device={}, kind={:?}",
        path.display(),
        mount.mount_point.display(),
        mount.device_name,
        mount.kind
    );

    let is_nvme = base_device(&mount.device_name)
        .map(|d| d.starts_with("nvme"))
        .unwrap_or(false);

    match mount.kind {
        DiskKind::HDD => Some((DriveType::Hdd, BusType::Sata, "sysinfo_kind")),
        DiskKind::SSD if is_nvme => Some((DriveType::Nvme, BusType::Nvme, "sysinfo_kind")),
        DiskKind::SSD => Some((DriveType::Ssd, BusType::Sata, "sysinfo_kind")),
        DiskKind::Unknown(_) => read_rotational_from_sys(&mount.device_name, is_nvme),
    }
}

/// Read /sys/block/{device}/queue/rotational to distinguish HDD (1) vs SSD (0).
fn read_rotational_from_sys(
    device_name: &str,
    is_nvme: bool,
) -> Option<(DriveType, BusType, &'static str)> {
    let base_dev = base_device(device_name)?;
    let sys_path = format!("/sys/block/{base_dev}/queue/rotational");
    let rotational = std::fs::read_to_string(&sys_path).ok()?;
    let verdict = if rotational.trim() == "1" {
        (DriveType::Hdd, BusType::Sata, "sysfs_rotational")
    } else if is_nvme {
        (DriveType::Nvme, BusType::Nvme, "sysfs_rotational")
    } else {
        (DriveType::Ssd, BusType::Sata, "sysfs_rotational")
    };
    Some(verdict)
}

/// Strip /dev/ prefix and partition suffix: sda1 -> sda, nvme0n1p1 -> nvme0n1.
fn base_device(device_name: &str) -> Option<&str> {
    let dev_name = device_name.strip_prefix("/dev/").unwrap_or(device_name);
    if dev_name.is_empty() {
        return None;
    }
    let base = if dev_name.starts_with("nvme") {
        dev_name.split('p').next().unwrap_or(dev_name)
    } else {
        dev_name.trim_end_matches(char::is_numeric)
    };
    Some(base)
}
