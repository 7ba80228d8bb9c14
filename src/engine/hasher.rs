//! Single-file streaming hasher with adaptive buffering and cooperative
//! pause/cancel checks between reads.

use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::Path;
use std::time::Instant;

use crate::error::HashCalcError;
use crate::types::{Algorithm, CancelToken, HashResult, PauseToken};
use crate::utils::config::HashingConsts;

use super::digest::StreamingDigest;

/// Pick the read buffer size from the file size: 256 KiB below 1 MB, 2 MiB
/// below 100 MB, 10 MiB above.
pub fn adaptive_buffer_size(file_size: u64) -> usize {
    if file_size < HashingConsts::SMALL_FILE_THRESHOLD {
        HashingConsts::SMALL_BUFFER
    } else if file_size < HashingConsts::MEDIUM_FILE_THRESHOLD {
        HashingConsts::MEDIUM_BUFFER
    } else {
        HashingConsts::LARGE_BUFFER
    }
}

/// Hash one file. Never panics and never returns `Err`: failures come back
/// as a `HashResult` carrying the error kind, so batch callers can fold
/// them into the result set.
///
/// Between reads the pause gate is honored and the cancel flag checked; a
/// cancelled file produces no partial digest. The reported duration covers
/// the read loop only, not the initial stat.
pub fn hash_file(
    path: &Path,
    relative_path: &Path,
    algorithm: Algorithm,
    cancel: Option<&CancelToken>,
    pause: Option<&PauseToken>,
) -> HashResult {
    let failed = |error: HashCalcError, size: u64| {
        let mut result = HashResult::failed(
            path.to_path_buf(),
            relative_path.to_path_buf(),
            algorithm,
            error,
        );
        result.file_size = size;
        result
    };

    let file_size = match std::fs::metadata(path) {
        Ok(meta) => meta.len(),
        Err(e) => return failed(HashCalcError::from_io(path, &e), 0),
    };
    let buffer_size = adaptive_buffer_size(file_size);

    let start = Instant::now();
    let mut file = match File::open(path) {
        Ok(f) => f,
        Err(e) => return failed(HashCalcError::from_io(path, &e), file_size),
    };

    let mut digest = StreamingDigest::new(algorithm);
    let mut buffer = vec![0u8; buffer_size];
    loop {
        if let Some(pause) = pause {
            pause.wait_if_paused();
        }
        if let Some(cancel) = cancel
            && cancel.is_set()
        {
            return failed(HashCalcError::Cancelled, file_size);
        }
        let n = match file.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return failed(HashCalcError::from_io(path, &e), file_size),
        };
        digest.update(&buffer[..n]);
    }

    HashResult {
        file_path: path.to_path_buf(),
        relative_path: relative_path.to_path_buf(),
        algorithm,
        hash_hex: digest.finalize(),
        file_size,
        duration: start.elapsed(),
        error: None,
    }
}
