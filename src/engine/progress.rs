//! Progress plumbing: a rate-limited sink that collapses high-frequency
//! worker events, and the file-count-weighted aggregator for two-sided
//! verification.

use log::debug;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::types::ProgressCallback;

struct SinkState {
    last_update: Option<Instant>,
    last_percent: Option<u8>,
    pending: Option<(u8, String)>,
}

/// Thread-safe rate-limited forwarder of (percent, message) events.
///
/// Forwards at most once per `update_interval`, except that 0 and 100 bypass
/// the throttle (each delivered once). A suppressed report is kept pending so
/// `flush` can deliver the final state. A panicking downstream callback is
/// swallowed; the sink stays usable.
pub struct ThrottledProgressSink {
    callback: ProgressCallback,
    update_interval: Duration,
    state: Mutex<SinkState>,
}

impl ThrottledProgressSink {
    pub fn new(callback: ProgressCallback, update_interval: Duration) -> Self {
        Self {
            callback,
            update_interval,
            state: Mutex::new(SinkState {
                last_update: None,
                last_percent: None,
                pending: None,
            }),
        }
    }

    /// Report progress. Safe to call from many threads; ordering is fixed by
    /// the internal mutex.
    pub fn report(&self, percent: u8, message: &str) {
        let mut state = self.state.lock().unwrap();

        // Boundary milestones bypass the throttle but fire only once each
        if percent == 0 || percent == 100 {
            if state.last_percent == Some(percent) {
                return;
            }
            self.deliver(&mut state, percent, message);
            return;
        }

        let due = state
            .last_update
            .map(|t| t.elapsed() >= self.update_interval)
            .unwrap_or(true);
        let changed = state.last_percent != Some(percent);
        if due && changed {
            self.deliver(&mut state, percent, message);
        } else {
            state.pending = Some((percent, message.to_string()));
        }
    }

    /// Deliver the latest suppressed report, if any. Call when an operation
    /// finishes so the final state is never lost.
    pub fn flush(&self) {
        let mut state = self.state.lock().unwrap();
        if let Some((percent, message)) = state.pending.take() {
            self.deliver(&mut state, percent, &message);
        }
    }

    fn deliver(&self, state: &mut SinkState, percent: u8, message: &str) {
        // A panicking observer must not corrupt sink state
        if catch_unwind(AssertUnwindSafe(|| (self.callback)(percent, message))).is_err() {
            debug!("Progress callback panicked; swallowed");
        }
        state.last_update = Some(Instant::now());
        state.last_percent = Some(percent);
        state.pending = None;
    }
}

struct AggState {
    source: (u8, String),
    target: (u8, String),
    emitted_max: u8,
}

/// File-count-weighted merge of the two verification progress streams.
///
/// Each side reports independently; the combined percent is the weighted
/// average rounded to the nearest point, clamped to a running maximum so
/// rounding can never move it backwards. Output is pushed through one
/// throttled sink, so cross-side updates are also rate-limited.
pub struct VerifyProgressAggregator {
    source_files: u64,
    target_files: u64,
    sink: ThrottledProgressSink,
    state: Mutex<AggState>,
}

impl VerifyProgressAggregator {
    pub fn new(
        source_files: u64,
        target_files: u64,
        callback: ProgressCallback,
        update_interval: Duration,
    ) -> Self {
        Self {
            source_files,
            target_files,
            sink: ThrottledProgressSink::new(callback, update_interval),
            state: Mutex::new(AggState {
                source: (0, "Waiting...".to_string()),
                target: (0, "Waiting...".to_string()),
                emitted_max: 0,
            }),
        }
    }

    pub fn update_source(&self, percent: u8, message: &str) {
        self.update(true, percent, message);
    }

    pub fn update_target(&self, percent: u8, message: &str) {
        self.update(false, percent, message);
    }

    pub fn flush(&self) {
        self.sink.flush();
    }

    /// Combined percent for the current side states, weighted by file count.
    pub fn combined_percent(&self) -> u8 {
        let state = self.state.lock().unwrap();
        self.weighted(&state)
    }

    fn weighted(&self, state: &AggState) -> u8 {
        let total = self.source_files + self.target_files;
        if total == 0 {
            return 0;
        }
        let sum =
            state.source.0 as u64 * self.source_files + state.target.0 as u64 * self.target_files;
        ((sum + total / 2) / total) as u8
    }

    fn update(&self, is_source: bool, percent: u8, message: &str) {
        let mut state = self.state.lock().unwrap();
        if is_source {
            state.source = (percent, message.to_string());
        } else {
            state.target = (percent, message.to_string());
        }
        let combined = self.weighted(&state).max(state.emitted_max);
        state.emitted_max = combined;
        let combined_message = format!(
            "Source: {}% ({}) | Target: {}% ({})",
            state.source.0, state.source.1, state.target.0, state.target.1
        );
        // Report under the state lock so combined values reach the sink in
        // the order they were computed
        self.sink.report(combined, &combined_message);
    }
}
