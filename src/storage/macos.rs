//! macOS-specific device property query using sysinfo, with a statfs check
//! for network mounts that sysinfo misses (SMB/NFS/AFP).

use log::debug;
use std::ffi::CString;
use std::mem::MaybeUninit;
use std::path::Path;
use sysinfo::DiskKind;

use super::{BusType, DriveType, MountSnapshot, is_network_fs};

/// Query the filesystem type via statfs and report whether it is a network
/// mount. Catches SMB/NFS/AFP mounts that don't show up in the disk list.
pub fn statfs_network(path: &Path) -> bool {
    let Ok(path_cstr) = CString::new(path.to_string_lossy().as_bytes()) else {
        return false;
    };
    unsafe {
        let mut stat: MaybeUninit<libc::statfs> = MaybeUninit::uninit();
        if libc::statfs(path_cstr.as_ptr(), stat.as_mut_ptr()) != 0 {
            return false;
        }
        let stat = stat.assume_init();
        let fs_type = std::ffi::CStr::from_ptr(stat.f_fstypename.as_ptr()).to_string_lossy();
        debug!("macOS statfs: path={}, fs_type={}", path.display(), fs_type);
        is_network_fs(&fs_type)
    }
}

pub fn detect(path: &Path, mount: &MountSnapshot) -> Option<(DriveType, BusType, &'static str)> {
    debug!(
        "Device query: path={}, mount={}, kind={:?}",
        path.display(),
        mount.mount_point.display(),
        mount.kind
    );

    match mount.kind {
        DiskKind::HDD => Some((DriveType::Hdd, BusType::Sata, "sysinfo_kind")),
        DiskKind::SSD => Some((DriveType::Ssd, BusType::Unknown, "sysinfo_kind")),
        // Apple hardware has shipped SSD-only for years; default that way
        DiskKind::Unknown(_) => Some((DriveType::Ssd, BusType::Unknown, "sysinfo_default")),
    }
}
