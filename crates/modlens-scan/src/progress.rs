//! Progress reporting
//!
//! Reports are fire-and-forget: a worker never waits for the throttle, and a
//! report that arrives inside the rate-limit window is dropped. Callbacks run
//! on the reporting thread and should be cheap.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Minimum time between two throttled reports
pub const PROGRESS_INTERVAL: Duration = Duration::from_millis(150);

/// Pipeline stage being reported
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Directory walk
    Collect,
    /// Filename and normalised-name grouping
    Name,
    /// Size pre-filter before hashing
    HashingInit,
    /// Content digests
    Hashing,
    /// Header validation
    Integrity,
    /// Resource-key indexing and classification
    Conflicts,
    /// Scan finished
    Done,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Collect => "collect",
            Self::Name => "name",
            Self::HashingInit => "hashing_init",
            Self::Hashing => "hashing",
            Self::Integrity => "integrity",
            Self::Conflicts => "conflicts",
            Self::Done => "done",
        };
        f.write_str(name)
    }
}

/// One progress notification
///
/// `current` and `total` are absent for phases of unknown length.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Progress {
    /// Stage
    pub phase: Phase,
    /// Items processed so far
    pub current: Option<u64>,
    /// Items in the stage
    pub total: Option<u64>,
    /// Human-readable status line
    pub message: String,
}

/// Callback receiving progress notifications
pub type ProgressCallback = Arc<dyn Fn(&Progress) + Send + Sync>;

/// Rate-limited progress sink shared by the walk and the workers
#[derive(Clone)]
pub struct ProgressReporter {
    callback: Option<ProgressCallback>,
    last: Arc<Mutex<Option<Instant>>>,
    interval: Duration,
}

impl fmt::Debug for ProgressReporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressReporter")
            .field("enabled", &self.callback.is_some())
            .field("interval", &self.interval)
            .finish()
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::silent()
    }
}

impl ProgressReporter {
    /// Reporter forwarding to `callback`
    pub fn new(callback: ProgressCallback) -> Self {
        Self {
            callback: Some(callback),
            last: Arc::new(Mutex::new(None)),
            interval: PROGRESS_INTERVAL,
        }
    }

    /// Reporter that drops everything
    pub fn silent() -> Self {
        Self {
            callback: None,
            last: Arc::new(Mutex::new(None)),
            interval: PROGRESS_INTERVAL,
        }
    }

    /// Override the throttle interval
    #[must_use]
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Throttled report; the message is only built when it will be sent
    pub fn report<F>(&self, phase: Phase, current: Option<u64>, total: Option<u64>, message: F)
    where
        F: FnOnce() -> String,
    {
        let Some(callback) = &self.callback else {
            return;
        };

        // Another thread holding the lock is mid-report; skip rather than wait
        let Some(mut last) = self.last.try_lock() else {
            return;
        };
        let now = Instant::now();
        if (*last).is_some_and(|t| now.duration_since(t) < self.interval) {
            return;
        }
        *last = Some(now);
        drop(last);

        callback(&Progress {
            phase,
            current,
            total,
            message: message(),
        });
    }

    /// Unthrottled report for stage boundaries
    pub fn report_now(
        &self,
        phase: Phase,
        current: Option<u64>,
        total: Option<u64>,
        message: impl Into<String>,
    ) {
        if let Some(callback) = &self.callback {
            callback(&Progress {
                phase,
                current,
                total,
                message: message.into(),
            });
        }
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    fn recording() -> (ProgressReporter, Arc<Mutex<Vec<Progress>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let reporter = ProgressReporter::new(Arc::new(move |p: &Progress| {
            sink.lock().push(p.clone());
        }));
        (reporter, seen)
    }

    #[test]
    fn test_throttle_drops_bursts() {
        let (reporter, seen) = recording();
        let reporter = reporter.with_interval(Duration::from_secs(3600));
        for i in 0..100 {
            reporter.report(Phase::Hashing, Some(i), Some(100), || format!("{i}"));
        }
        assert_eq!(seen.lock().len(), 1);
        assert_eq!(seen.lock()[0].current, Some(0));
    }

    #[test]
    fn test_zero_interval_passes_everything() {
        let (reporter, seen) = recording();
        let reporter = reporter.with_interval(Duration::ZERO);
        for i in 0..5 {
            reporter.report(Phase::Collect, Some(i), None, String::new);
        }
        assert_eq!(seen.lock().len(), 5);
    }

    #[test]
    fn test_report_now_ignores_throttle() {
        let (reporter, seen) = recording();
        let reporter = reporter.with_interval(Duration::from_secs(3600));
        reporter.report(Phase::Collect, None, None, || "walk".to_string());
        reporter.report_now(Phase::Done, None, None, "finished");
        let seen = seen.lock();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[1].phase, Phase::Done);
        assert_eq!(seen[1].total, None);
    }

    #[test]
    fn test_silent_reporter() {
        let reporter = ProgressReporter::silent();
        reporter.report(Phase::Collect, None, None, || unreachable!());
    }

    #[test]
    fn test_phase_display() {
        assert_eq!(Phase::HashingInit.to_string(), "hashing_init");
    }
}
