use evihash::engine::{
    ThrottledProgressSink, VerifyProgressAggregator, adaptive_buffer_size, compare_result_sets,
    deepest_common_dir, hex_encode,
};
use evihash::engine::digest::StreamingDigest;
use evihash::{
    Algorithm, BusType, CancelToken, DriveType, HashCalcError, HashOperationMetrics, HashResult,
    HashResultSet, HashVerifyError, OpKind, PauseToken, StorageInfo, ThreadPlanner,
    VerificationOutcome,
};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// --- adaptive_buffer_size ---

#[test]
fn test_buffer_small_files() {
    assert_eq!(adaptive_buffer_size(0), 256 * 1024);
    assert_eq!(adaptive_buffer_size(1), 256 * 1024);
    assert_eq!(adaptive_buffer_size(999_999), 256 * 1024);
}

#[test]
fn test_buffer_medium_files() {
    assert_eq!(adaptive_buffer_size(1_000_000), 2 * 1024 * 1024);
    assert_eq!(adaptive_buffer_size(50_000_000), 2 * 1024 * 1024);
    assert_eq!(adaptive_buffer_size(99_999_999), 2 * 1024 * 1024);
}

#[test]
fn test_buffer_large_files() {
    assert_eq!(adaptive_buffer_size(100_000_000), 10 * 1024 * 1024);
    assert_eq!(adaptive_buffer_size(u64::MAX), 10 * 1024 * 1024);
}

// --- digest primitive ---

#[test]
fn test_sha256_known_vectors() {
    let d = StreamingDigest::new(Algorithm::Sha256);
    assert_eq!(
        d.finalize(),
        "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
    );

    let mut d = StreamingDigest::new(Algorithm::Sha256);
    d.update(b"abc");
    assert_eq!(
        d.finalize(),
        "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
    );
}

#[test]
fn test_sha1_known_vectors() {
    let d = StreamingDigest::new(Algorithm::Sha1);
    assert_eq!(d.finalize(), "da39a3ee5e6b4b0d3255bfef95601890afd80709");

    let mut d = StreamingDigest::new(Algorithm::Sha1);
    d.update(b"abc");
    assert_eq!(d.finalize(), "a9993e364706816aba3e25717850c26c9cd0d89d");
}

#[test]
fn test_md5_known_vectors() {
    let d = StreamingDigest::new(Algorithm::Md5);
    assert_eq!(d.finalize(), "d41d8cd98f00b204e9800998ecf8427e");

    let mut d = StreamingDigest::new(Algorithm::Md5);
    d.update(b"abc");
    assert_eq!(d.finalize(), "900150983cd24fb0d6963f7d28e17f72");
}

#[test]
fn test_digest_split_updates_equal_single_update() {
    let mut a = StreamingDigest::new(Algorithm::Sha256);
    a.update(b"hello ");
    a.update(b"world");
    let mut b = StreamingDigest::new(Algorithm::Sha256);
    b.update(b"hello world");
    assert_eq!(a.finalize(), b.finalize());
}

#[test]
fn test_hex_encode() {
    assert_eq!(hex_encode(&[]), "");
    assert_eq!(hex_encode(&[0x00, 0xff, 0x0a]), "00ff0a");
}

#[test]
fn test_algorithm_properties() {
    assert_eq!(Algorithm::Sha256.digest_len(), 32);
    assert_eq!(Algorithm::Sha1.digest_len(), 20);
    assert_eq!(Algorithm::Md5.digest_len(), 16);
    assert_eq!(Algorithm::Sha256.as_str(), "sha256");
    assert_eq!(Algorithm::Sha1.to_string(), "sha1");
    assert_eq!("SHA-256".parse::<Algorithm>().unwrap(), Algorithm::Sha256);
    assert_eq!("md5".parse::<Algorithm>().unwrap(), Algorithm::Md5);
    assert!("blake3".parse::<Algorithm>().is_err());
}

#[test]
fn test_algorithm_serde_lowercase() {
    assert_eq!(
        serde_json::to_string(&Algorithm::Sha256).unwrap(),
        "\"sha256\""
    );
}

// --- thread planner ---

fn info_for(drive_type: DriveType) -> StorageInfo {
    StorageInfo::detected(
        drive_type,
        BusType::Unknown,
        None,
        false,
        0.9,
        "test".to_string(),
        "/".to_string(),
    )
}

#[test]
fn test_planner_single_file_always_sequential() {
    let planner = ThreadPlanner::with_limits(16, None);
    let nvme = info_for(DriveType::Nvme);
    assert_eq!(planner.plan(Some(&nvme), None, 1, OpKind::Hash), 1);
    assert_eq!(planner.plan(Some(&nvme), Some(&nvme), 1, OpKind::Copy), 1);
}

#[test]
fn test_planner_hash_no_profile() {
    assert_eq!(
        ThreadPlanner::with_limits(16, None).plan(None, None, 100, OpKind::Hash),
        4
    );
    assert_eq!(
        ThreadPlanner::with_limits(2, None).plan(None, None, 100, OpKind::Hash),
        2
    );
}

#[test]
fn test_planner_hash_spinning_source() {
    let planner = ThreadPlanner::with_limits(16, None);
    let hdd = info_for(DriveType::Hdd);
    let ext = info_for(DriveType::ExternalHdd);
    assert_eq!(planner.plan(Some(&hdd), None, 100, OpKind::Hash), 8);
    assert_eq!(planner.plan(Some(&ext), None, 100, OpKind::Hash), 8);
}

#[test]
fn test_planner_hash_fast_source_two_per_core() {
    let planner = ThreadPlanner::with_limits(16, None);
    for dt in [DriveType::Nvme, DriveType::Ssd, DriveType::ExternalSsd] {
        assert_eq!(planner.plan(Some(&info_for(dt)), None, 100, OpKind::Hash), 32);
    }
    // clamp to 64 on large hosts, floor of 2 on tiny ones
    let big = ThreadPlanner::with_limits(48, None);
    assert_eq!(
        big.plan(Some(&info_for(DriveType::Nvme)), None, 100, OpKind::Hash),
        64
    );
    let tiny = ThreadPlanner::with_limits(1, None);
    assert_eq!(
        tiny.plan(Some(&info_for(DriveType::Nvme)), None, 100, OpKind::Hash),
        2
    );
}

#[test]
fn test_planner_hash_unclassified_source() {
    let planner = ThreadPlanner::with_limits(16, None);
    assert_eq!(
        planner.plan(Some(&info_for(DriveType::Unknown)), None, 100, OpKind::Hash),
        4
    );
    assert_eq!(
        planner.plan(Some(&info_for(DriveType::Network)), None, 100, OpKind::Hash),
        4
    );
}

#[test]
fn test_planner_copy_missing_profile() {
    let planner = ThreadPlanner::with_limits(16, None);
    let ssd = info_for(DriveType::Ssd);
    assert_eq!(planner.plan(None, Some(&ssd), 100, OpKind::Copy), 1);
    assert_eq!(planner.plan(Some(&ssd), None, 100, OpKind::Copy), 1);
    assert_eq!(planner.plan(None, None, 100, OpKind::Copy), 1);
}

#[test]
fn test_planner_copy_spinning_destination_sequential() {
    let planner = ThreadPlanner::with_limits(16, None);
    let nvme = info_for(DriveType::Nvme);
    let hdd = info_for(DriveType::Hdd);
    let ext = info_for(DriveType::ExternalHdd);
    assert_eq!(planner.plan(Some(&nvme), Some(&hdd), 500, OpKind::Copy), 1);
    assert_eq!(planner.plan(Some(&nvme), Some(&ext), 500, OpKind::Copy), 1);
}

#[test]
fn test_planner_copy_spinning_source() {
    let planner = ThreadPlanner::with_limits(16, None);
    let hdd = info_for(DriveType::Hdd);
    let ssd = info_for(DriveType::Ssd);
    let unknown = info_for(DriveType::Unknown);
    assert_eq!(planner.plan(Some(&hdd), Some(&ssd), 100, OpKind::Copy), 8);
    assert_eq!(planner.plan(Some(&hdd), Some(&unknown), 100, OpKind::Copy), 1);
}

#[test]
fn test_planner_copy_nvme_to_nvme() {
    let planner = ThreadPlanner::with_limits(16, None);
    let nvme = info_for(DriveType::Nvme);
    assert_eq!(planner.plan(Some(&nvme), Some(&nvme), 500, OpKind::Copy), 32);
}

#[test]
fn test_planner_copy_fast_combinations() {
    let planner = ThreadPlanner::with_limits(16, None);
    let nvme = info_for(DriveType::Nvme);
    let ssd = info_for(DriveType::Ssd);
    let ext_ssd = info_for(DriveType::ExternalSsd);
    assert_eq!(planner.plan(Some(&ssd), Some(&nvme), 100, OpKind::Copy), 32);
    assert_eq!(planner.plan(Some(&nvme), Some(&ssd), 100, OpKind::Copy), 32);
    assert_eq!(planner.plan(Some(&ssd), Some(&ssd), 100, OpKind::Copy), 16);
    assert_eq!(planner.plan(Some(&ext_ssd), Some(&ssd), 100, OpKind::Copy), 16);
}

#[test]
fn test_planner_copy_unclassified_source_sequential() {
    let planner = ThreadPlanner::with_limits(16, None);
    let unknown = info_for(DriveType::Unknown);
    let ssd = info_for(DriveType::Ssd);
    assert_eq!(planner.plan(Some(&unknown), Some(&ssd), 100, OpKind::Copy), 1);
}

#[test]
fn test_planner_output_always_in_bounds() {
    let drive_types = [
        DriveType::Nvme,
        DriveType::Ssd,
        DriveType::ExternalSsd,
        DriveType::Hdd,
        DriveType::ExternalHdd,
        DriveType::Network,
        DriveType::Unknown,
    ];
    for cpu in [1, 2, 8, 16, 128] {
        let planner = ThreadPlanner::with_limits(cpu, None);
        for op in [OpKind::Hash, OpKind::Copy] {
            for count in [1, 2, 10_000] {
                for src in drive_types {
                    for dst in drive_types {
                        let threads = planner.plan(
                            Some(&info_for(src)),
                            Some(&info_for(dst)),
                            count,
                            op,
                        );
                        assert!((1..=64).contains(&threads));
                    }
                }
            }
        }
    }
}

#[test]
fn test_planner_fd_cap_limits_result() {
    let planner = ThreadPlanner::with_limits(16, Some(4));
    let nvme = info_for(DriveType::Nvme);
    assert_eq!(planner.plan(Some(&nvme), None, 100, OpKind::Hash), 4);
    // the cap never raises a sequential verdict
    assert_eq!(planner.plan(Some(&nvme), None, 1, OpKind::Hash), 1);
}

#[test]
fn test_host_planner_stays_in_bounds() {
    // real CPU count and real NOFILE budget, whatever they are
    let planner = ThreadPlanner::new();
    let nvme = info_for(DriveType::Nvme);
    let threads = planner.plan(Some(&nvme), None, 100, OpKind::Hash);
    assert!((1..=64).contains(&threads));
}

// --- throttled progress sink ---

type Events = Arc<Mutex<Vec<(u8, String)>>>;

fn recording_sink(interval: Duration) -> (ThrottledProgressSink, Events) {
    let events: Events = Arc::new(Mutex::new(Vec::new()));
    let ev = Arc::clone(&events);
    let sink = ThrottledProgressSink::new(
        Arc::new(move |p, m: &str| ev.lock().unwrap().push((p, m.to_string()))),
        interval,
    );
    (sink, events)
}

#[test]
fn test_sink_boundary_values_bypass_throttle_once() {
    let (sink, events) = recording_sink(Duration::from_secs(3600));
    sink.report(0, "start");
    sink.report(0, "again");
    sink.report(100, "done");
    sink.report(100, "done again");
    let events = events.lock().unwrap();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0], (0, "start".to_string()));
    assert_eq!(events[1], (100, "done".to_string()));
}

#[test]
fn test_sink_throttles_and_flushes_pending() {
    let (sink, events) = recording_sink(Duration::from_secs(3600));
    sink.report(0, "start");
    sink.report(10, "ten");
    sink.report(20, "twenty");
    assert_eq!(events.lock().unwrap().len(), 1);
    sink.flush();
    let events = events.lock().unwrap();
    assert_eq!(events.len(), 2);
    assert_eq!(events[1], (20, "twenty".to_string()));
}

#[test]
fn test_sink_first_report_immediate() {
    let (sink, events) = recording_sink(Duration::from_secs(3600));
    sink.report(42, "mid");
    assert_eq!(events.lock().unwrap().as_slice(), &[(42, "mid".to_string())]);
}

#[test]
fn test_sink_duplicate_percent_suppressed() {
    let (sink, events) = recording_sink(Duration::ZERO);
    sink.report(50, "a");
    sink.report(50, "b");
    assert_eq!(events.lock().unwrap().len(), 1);
    sink.flush();
    // the suppressed report is recoverable through flush
    assert_eq!(events.lock().unwrap().last().unwrap().1, "b");
}

#[test]
fn test_sink_survives_panicking_callback() {
    let events: Events = Arc::new(Mutex::new(Vec::new()));
    let ev = Arc::clone(&events);
    let sink = ThrottledProgressSink::new(
        Arc::new(move |p, m: &str| {
            if p == 1 {
                panic!("observer bug");
            }
            ev.lock().unwrap().push((p, m.to_string()));
        }),
        Duration::ZERO,
    );
    sink.report(1, "boom");
    sink.report(2, "fine");
    sink.report(100, "done");
    let events = events.lock().unwrap();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].0, 2);
    assert_eq!(events[1].0, 100);
}

// --- verification progress aggregator ---

#[test]
fn test_aggregator_weights_by_file_count() {
    let events: Events = Arc::new(Mutex::new(Vec::new()));
    let ev = Arc::clone(&events);
    let agg = VerifyProgressAggregator::new(
        3,
        1,
        Arc::new(move |p, m: &str| ev.lock().unwrap().push((p, m.to_string()))),
        Duration::ZERO,
    );
    agg.update_source(100, "source done");
    assert_eq!(agg.combined_percent(), 75);
    agg.update_target(100, "target done");
    let events = events.lock().unwrap();
    assert_eq!(events.last().unwrap().0, 100);
    assert!(events.iter().any(|(p, _)| *p == 75));
}

#[test]
fn test_aggregator_message_carries_both_sides() {
    let events: Events = Arc::new(Mutex::new(Vec::new()));
    let ev = Arc::clone(&events);
    let agg = VerifyProgressAggregator::new(
        1,
        1,
        Arc::new(move |p, m: &str| ev.lock().unwrap().push((p, m.to_string()))),
        Duration::ZERO,
    );
    agg.update_source(40, "reading evidence");
    let events = events.lock().unwrap();
    let (_, message) = events.last().unwrap();
    assert!(message.contains("Source: 40% (reading evidence)"));
    assert!(message.contains("Target: 0% (Waiting...)"));
}

#[test]
fn test_aggregator_combined_percent_monotone() {
    let events: Events = Arc::new(Mutex::new(Vec::new()));
    let ev = Arc::clone(&events);
    let agg = VerifyProgressAggregator::new(
        1,
        1,
        Arc::new(move |p, m: &str| ev.lock().unwrap().push((p, m.to_string()))),
        Duration::ZERO,
    );
    agg.update_source(50, "a");
    agg.update_target(10, "b");
    agg.update_source(49, "c");
    agg.update_source(80, "d");
    agg.update_target(100, "e");
    agg.update_source(100, "f");
    let events = events.lock().unwrap();
    let percents: Vec<u8> = events.iter().map(|(p, _)| *p).collect();
    assert!(percents.windows(2).all(|w| w[0] <= w[1]), "{percents:?}");
    assert_eq!(*percents.last().unwrap(), 100);
}

// --- result set comparison ---

fn ok_result(path: &str, hex: &str) -> (PathBuf, HashResult) {
    let path = PathBuf::from(path);
    (
        path.clone(),
        HashResult {
            file_path: path.clone(),
            relative_path: path.file_name().map(PathBuf::from).unwrap_or_default(),
            algorithm: Algorithm::Sha256,
            hash_hex: hex.to_string(),
            file_size: 3,
            duration: Duration::from_millis(1),
            error: None,
        },
    )
}

fn failed_result(path: &str) -> (PathBuf, HashResult) {
    let path = PathBuf::from(path);
    (
        path.clone(),
        HashResult::failed(
            path.clone(),
            path.file_name().map(PathBuf::from).unwrap_or_default(),
            Algorithm::Sha256,
            HashCalcError::PermissionDenied { path: path.clone() },
        ),
    )
}

#[test]
fn test_compare_exact_match_and_mismatch() {
    let source: HashResultSet = [
        ok_result("/src/tree/a.bin", "aaaa"),
        ok_result("/src/tree/b.bin", "bbbb"),
    ]
    .into_iter()
    .collect();
    let target: HashResultSet = [
        ok_result("/dst/tree/a.bin", "aaaa"),
        ok_result("/dst/tree/b.bin", "beef"),
    ]
    .into_iter()
    .collect();

    let outcomes = compare_result_sets(&source, &target);
    assert_eq!(outcomes.len(), 2);
    assert!(matches!(
        outcomes[Path::new("/src/tree/a.bin")],
        VerificationOutcome::ExactMatch { .. }
    ));
    match &outcomes[Path::new("/src/tree/b.bin")] {
        VerificationOutcome::HashMismatch { note, .. } => {
            assert!(note.contains("bbbb"));
            assert!(note.contains("beef"));
        }
        other => panic!("expected mismatch, got {}", other.kind()),
    }
}

#[test]
fn test_compare_missing_target_and_source() {
    let source: HashResultSet = [
        ok_result("/s/a.bin", "aaaa"),
        ok_result("/s/only_source.bin", "cccc"),
    ]
    .into_iter()
    .collect();
    let target: HashResultSet = [
        ok_result("/t/a.bin", "aaaa"),
        ok_result("/t/only_target.bin", "dddd"),
    ]
    .into_iter()
    .collect();

    let outcomes = compare_result_sets(&source, &target);
    assert_eq!(outcomes.len(), 3);
    assert!(matches!(
        outcomes[Path::new("/s/only_source.bin")],
        VerificationOutcome::MissingTarget { .. }
    ));
    assert!(matches!(
        outcomes[Path::new("/t/only_target.bin")],
        VerificationOutcome::MissingSource { .. }
    ));
}

#[test]
fn test_compare_swap_symmetry() {
    let source: HashResultSet = [ok_result("/s/a", "aa"), ok_result("/s/b", "bb")]
        .into_iter()
        .collect();
    let target: HashResultSet = [ok_result("/t/a", "aa")].into_iter().collect();

    let forward = compare_result_sets(&source, &target);
    let backward = compare_result_sets(&target, &source);

    let count = |outcomes: &std::collections::HashMap<PathBuf, VerificationOutcome>,
                 kind: &str| {
        outcomes.values().filter(|o| o.kind() == kind).count()
    };
    assert_eq!(count(&forward, "exact_match"), 1);
    assert_eq!(count(&forward, "missing_target"), 1);
    assert_eq!(count(&backward, "exact_match"), 1);
    assert_eq!(count(&backward, "missing_source"), 1);
}

#[test]
fn test_compare_matches_by_relative_structure() {
    // same file name in different subtrees must pair by structure
    let source: HashResultSet = [
        ok_result("/src/cam1/video.mp4", "aaaa"),
        ok_result("/src/cam2/video.mp4", "bbbb"),
    ]
    .into_iter()
    .collect();
    let target: HashResultSet = [
        ok_result("/dst/cam1/video.mp4", "aaaa"),
        ok_result("/dst/cam2/video.mp4", "bbbb"),
    ]
    .into_iter()
    .collect();

    let outcomes = compare_result_sets(&source, &target);
    assert!(outcomes.values().all(|o| o.is_match()));
}

#[test]
fn test_compare_ignores_failed_entries() {
    let source: HashResultSet = [ok_result("/s/a", "aa"), failed_result("/s/b")]
        .into_iter()
        .collect();
    let target: HashResultSet = [ok_result("/t/a", "aa"), ok_result("/t/b", "bb")]
        .into_iter()
        .collect();

    let outcomes = compare_result_sets(&source, &target);
    // the failed source entry does not classify; target's b is unmatched
    assert!(matches!(
        outcomes[Path::new("/t/b")],
        VerificationOutcome::MissingSource { .. }
    ));
    assert!(!outcomes.contains_key(Path::new("/s/b")));
}

#[test]
fn test_deepest_common_dir() {
    let paths = [PathBuf::from("/a/b/c/x.txt"), PathBuf::from("/a/b/d/y.txt")];
    assert_eq!(
        deepest_common_dir(paths.iter().map(|p| p.as_path())),
        PathBuf::from("/a/b")
    );

    let single = [PathBuf::from("/a/b/x.txt")];
    assert_eq!(
        deepest_common_dir(single.iter().map(|p| p.as_path())),
        PathBuf::from("/a/b")
    );

    let none: Vec<PathBuf> = Vec::new();
    assert_eq!(
        deepest_common_dir(none.iter().map(|p| p.as_path())),
        PathBuf::new()
    );
}

// --- errors ---

#[test]
fn test_error_codes_stable() {
    assert_eq!(
        HashCalcError::NotFound {
            path: PathBuf::from("/x")
        }
        .code(),
        "not_found"
    );
    assert_eq!(HashCalcError::Cancelled.code(), "cancelled");
    assert_eq!(HashCalcError::AllFailed { count: 3 }.code(), "all_failed");
    assert_eq!(HashCalcError::NoFiles.code(), "no_files");
    assert_eq!(HashVerifyError::NoSourceFiles.code(), "no_source_files");
    assert_eq!(
        HashVerifyError::SourceFailed(HashCalcError::Cancelled).code(),
        "source_failed"
    );
}

#[test]
fn test_error_messages_carry_path() {
    let err = HashCalcError::PermissionDenied {
        path: PathBuf::from("/evidence/locked.bin"),
    };
    assert!(err.to_string().contains("/evidence/locked.bin"));
}

// --- control tokens ---

#[test]
fn test_cancel_token_shared_between_clones() {
    let token = CancelToken::new();
    let clone = token.clone();
    assert!(!clone.is_set());
    token.cancel();
    assert!(clone.is_set());
}

#[test]
fn test_pause_token_toggles() {
    let token = PauseToken::new();
    assert!(!token.is_paused());
    token.pause();
    assert!(token.is_paused());
    token.resume();
    assert!(!token.is_paused());
    // does not block when not paused
    token.wait_if_paused();
}

// --- metrics ---

#[test]
fn test_metrics_progress_percent() {
    let metrics = HashOperationMetrics {
        total_files: 4,
        processed_files: 1,
        failed_files: 1,
        ..Default::default()
    };
    assert_eq!(metrics.progress_percent(), 50);
    assert_eq!(HashOperationMetrics::default().progress_percent(), 0);
}

#[test]
fn test_metrics_speed_zero_without_bytes() {
    let metrics = HashOperationMetrics::default();
    assert_eq!(metrics.average_speed_mbps(), 0.0);
}

#[test]
fn test_hash_result_speed_zero_for_empty_file() {
    let (_, result) = ok_result("/s/a", "aa");
    let mut result = result;
    result.file_size = 0;
    assert_eq!(result.speed_mbps(), 0.0);
}
