use evihash::storage::probe::{ProbeSpeeds, classify_throughput, measure_throughput};
use evihash::{BusType, DriveType, StorageInfo, StorageProfiler};
use std::path::Path;
use tempfile::TempDir;

fn speeds(write_mbps: f64, read_mbps: f64) -> ProbeSpeeds {
    ProbeSpeeds {
        write_mbps,
        read_mbps,
    }
}

// --- conservative fallback ---

#[test]
fn test_nonexistent_path_gets_conservative_fallback() {
    let profiler = StorageProfiler::new();
    let info = profiler.analyze(Path::new("/definitely/not/a/real/path/anywhere"));

    assert_eq!(info.drive_type, DriveType::ExternalHdd);
    assert_eq!(info.confidence, 0.0);
    assert_eq!(info.recommended_threads, 1);
    assert!(info.is_removable);
    assert!(info.detection_method.starts_with("conservative_fallback"));
    assert_eq!(info.performance_class, 1);
}

#[test]
fn test_fallback_invariant_zero_confidence_means_one_thread() {
    let info = StorageInfo::conservative_fallback("E:".to_string(), "all_methods_failed");
    assert_eq!(info.confidence, 0.0);
    assert_eq!(info.recommended_threads, 1);
    assert_eq!(info.drive_type, DriveType::ExternalHdd);
    assert_eq!(info.detection_method, "conservative_fallback:all_methods_failed");
}

// --- throughput classification ---

#[test]
fn test_slow_write_is_hdd_even_with_fast_reads() {
    // cache-inflated reads cannot hide a spinning disk's writes
    let (drive, bus, is_ssd, confidence) = classify_throughput(speeds(30.0, 500.0), false);
    assert_eq!(drive, DriveType::Hdd);
    assert_eq!(bus, BusType::Sata);
    assert_eq!(is_ssd, Some(false));
    assert_eq!(confidence, 0.8);
}

#[test]
fn test_fast_write_and_read_is_nvme() {
    let (drive, bus, is_ssd, confidence) = classify_throughput(speeds(1500.0, 3000.0), false);
    assert_eq!(drive, DriveType::Nvme);
    assert_eq!(bus, BusType::Nvme);
    assert_eq!(is_ssd, Some(true));
    assert_eq!(confidence, 0.8);
}

#[test]
fn test_removable_fast_drive_is_external_ssd() {
    let (drive, bus, _, _) = classify_throughput(speeds(1500.0, 3000.0), true);
    assert_eq!(drive, DriveType::ExternalSsd);
    assert_eq!(bus, BusType::Usb);

    let (drive, _, _, confidence) = classify_throughput(speeds(80.0, 150.0), true);
    assert_eq!(drive, DriveType::ExternalSsd);
    assert_eq!(confidence, 0.75);
}

#[test]
fn test_moderate_speeds_are_sata_ssd() {
    let (drive, bus, is_ssd, confidence) = classify_throughput(speeds(80.0, 150.0), false);
    assert_eq!(drive, DriveType::Ssd);
    assert_eq!(bus, BusType::Sata);
    assert_eq!(is_ssd, Some(true));
    assert_eq!(confidence, 0.75);
}

#[test]
fn test_slow_read_is_hdd() {
    let (drive, _, is_ssd, confidence) = classify_throughput(speeds(60.0, 40.0), false);
    assert_eq!(drive, DriveType::Hdd);
    assert_eq!(is_ssd, Some(false));
    assert_eq!(confidence, 0.7);
}

#[test]
fn test_ambiguous_speeds_default_to_hdd_low_confidence() {
    let (drive, bus, is_ssd, confidence) = classify_throughput(speeds(60.0, 80.0), false);
    assert_eq!(drive, DriveType::Hdd);
    assert_eq!(bus, BusType::Unknown);
    assert_eq!(is_ssd, Some(false));
    assert_eq!(confidence, 0.4);
}

#[test]
fn test_exactly_fifty_write_falls_to_uncertain() {
    // strict bounds on both sides of 50: neither HDD nor SSD branch takes it
    let (drive, _, _, confidence) = classify_throughput(speeds(50.0, 80.0), false);
    assert_eq!(drive, DriveType::Hdd);
    assert_eq!(confidence, 0.4);
}

// --- probe I/O ---

#[test]
fn test_measure_throughput_on_real_directory() {
    let dir = TempDir::new().unwrap();
    let speeds = measure_throughput(dir.path()).unwrap();
    assert!(speeds.write_mbps > 0.0);
    assert!(speeds.read_mbps > 0.0);
    // probe file cleaned up
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

// --- full analyze on a real path ---

#[test]
fn test_analyze_is_total_and_in_bounds() {
    let dir = TempDir::new().unwrap();
    let profiler = StorageProfiler::new();
    let info = profiler.analyze(dir.path());

    assert!((0.0..=1.0).contains(&info.confidence));
    assert!(info.recommended_threads >= 1);
    assert!((1..=5).contains(&info.performance_class));
    if info.confidence == 0.0 {
        assert_eq!(info.drive_type, DriveType::ExternalHdd);
        assert_eq!(info.recommended_threads, 1);
    }
}

#[test]
fn test_analyze_memoizes_per_mount() {
    let dir = TempDir::new().unwrap();
    let profiler = StorageProfiler::new();
    let first = profiler.analyze(dir.path());
    let second = profiler.analyze(dir.path());
    // positive verdicts are cached by mount root; the fallback (and a path
    // with no resolvable mount) is not
    if first.confidence > 0.0 && !first.drive_letter.is_empty() {
        assert_eq!(first, second);
    }
}

// --- drive type tables ---

#[test]
fn test_recommended_threads_table() {
    assert_eq!(DriveType::Nvme.recommended_threads(), 16);
    assert_eq!(DriveType::Ssd.recommended_threads(), 8);
    assert_eq!(DriveType::ExternalSsd.recommended_threads(), 4);
    assert_eq!(DriveType::Hdd.recommended_threads(), 1);
    assert_eq!(DriveType::ExternalHdd.recommended_threads(), 1);
    assert_eq!(DriveType::Network.recommended_threads(), 2);
    assert_eq!(DriveType::Unknown.recommended_threads(), 1);
}

#[test]
fn test_performance_class_table() {
    assert_eq!(DriveType::Nvme.performance_class(), 5);
    assert_eq!(DriveType::Ssd.performance_class(), 4);
    assert_eq!(DriveType::ExternalSsd.performance_class(), 3);
    assert_eq!(DriveType::Hdd.performance_class(), 2);
    assert_eq!(DriveType::ExternalHdd.performance_class(), 1);
    assert_eq!(DriveType::Network.performance_class(), 1);
}

#[test]
fn test_drive_type_predicates() {
    assert!(DriveType::Hdd.is_spinning());
    assert!(DriveType::ExternalHdd.is_spinning());
    assert!(!DriveType::Ssd.is_spinning());
    assert!(DriveType::Nvme.is_fast());
    assert!(DriveType::ExternalSsd.is_fast());
    assert!(!DriveType::Network.is_fast());
}

// --- display ---

#[test]
fn test_storage_info_display() {
    let info = StorageInfo::detected(
        DriveType::ExternalSsd,
        BusType::Usb,
        Some(true),
        true,
        0.8,
        "performance_heuristics".to_string(),
        "D:".to_string(),
    );
    let rendered = info.to_string();
    assert!(rendered.contains("SSD (External)"));
    assert!(rendered.contains("D:"));
    assert!(rendered.contains("[USB]"));
    assert!(rendered.contains("4 threads"));
    assert!(rendered.contains("80%"));
}

#[test]
fn test_bus_type_display() {
    assert_eq!(BusType::Usb.to_string(), "USB");
    assert_eq!(BusType::Nvme.to_string(), "NVME");
    assert_eq!(BusType::FibreChannel.to_string(), "FIBRE_CHANNEL");
}

// --- top-level planning helper ---

#[test]
fn test_plan_for_path_end_to_end() {
    let dir = TempDir::new().unwrap();
    let (threads, info) = evihash::plan_for_path(dir.path(), 10);
    assert!((1..=64).contains(&threads));
    assert!((0.0..=1.0).contains(&info.confidence));
}

// --- logging setup ---

#[test]
fn test_setup_logging_initializes() {
    // one-shot global init; other tests just log through it
    evihash::utils::setup_logging(true);
}

