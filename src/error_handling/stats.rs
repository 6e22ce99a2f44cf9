//! Export statistics tracking.
//!
//! This module provides thread-safe counters for export requests served by
//! the HTTP server: how many started, how many are still streaming, and how
//! many failed, broken down by [`ErrorKind`].

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use strum::IntoEnumIterator;

use super::types::ErrorKind;

/// Thread-safe export statistics tracker.
///
/// Uses atomic counters so request handlers and the completion tasks of
/// running exports can update it concurrently through an `Arc`. All failure
/// kinds are initialized to zero on creation.
pub struct ExportStats {
    started: AtomicUsize,
    completed: AtomicUsize,
    failures: HashMap<ErrorKind, AtomicUsize>,
}

impl Default for ExportStats {
    fn default() -> Self {
        Self::new()
    }
}

impl ExportStats {
    /// Creates a tracker with every counter at zero.
    pub fn new() -> Self {
        let mut failures = HashMap::new();
        for kind in ErrorKind::iter() {
            failures.insert(kind, AtomicUsize::new(0));
        }

        ExportStats {
            started: AtomicUsize::new(0),
            completed: AtomicUsize::new(0),
            failures,
        }
    }

    /// Records a pipeline that was started.
    pub fn record_started(&self) {
        self.started.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a pipeline that finished and closed its stream normally.
    pub fn record_completed(&self) {
        self.completed.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a request rejected before the pipeline started.
    ///
    /// Rejections never count as started, so they don't affect `in_flight`.
    pub fn record_rejected(&self) {
        self.increment_failure(ErrorKind::Validation);
    }

    /// Records a started pipeline that terminated with an error.
    pub fn record_failed(&self, kind: ErrorKind) {
        self.increment_failure(kind);
    }

    fn increment_failure(&self, kind: ErrorKind) {
        if let Some(counter) = self.failures.get(&kind) {
            counter.fetch_add(1, Ordering::Relaxed);
        } else {
            log::error!(
                "Attempted to increment failure counter for {:?} which is not in the map. \
                 This indicates a bug in ExportStats initialization.",
                kind
            );
        }
    }

    /// Number of pipelines started.
    pub fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }

    /// Number of pipelines that completed successfully.
    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }

    /// Number of started pipelines that have not terminated yet.
    pub fn in_flight(&self) -> usize {
        let failed_after_start = ErrorKind::iter()
            .filter(|k| *k != ErrorKind::Validation)
            .map(|k| self.get_failure_count(k))
            .sum::<usize>();
        self.started()
            .saturating_sub(self.completed())
            .saturating_sub(failed_after_start)
    }

    /// Get the failure count for an error kind.
    ///
    /// Returns 0 if the kind is not in the map (should never happen if properly initialized).
    pub fn get_failure_count(&self, kind: ErrorKind) -> usize {
        self.failures
            .get(&kind)
            .map(|c| c.load(Ordering::SeqCst))
            .unwrap_or(0)
    }

    /// Get total failure count across all kinds, rejections included.
    pub fn total_failures(&self) -> usize {
        ErrorKind::iter().map(|k| self.get_failure_count(k)).sum()
    }
}
