use std::time::{Duration, Instant};

use tracing::info;

/// Snapshot of a download run, emitted each time a segment completes
#[derive(Debug, Clone, PartialEq)]
pub struct Progress {
    pub completed: usize,
    pub total: usize,
    /// Segments that were already on disk
    pub skipped: usize,
    /// Bytes of every completed segment, skipped ones included
    pub bytes: u64,
    /// Bytes actually transferred during this run
    pub fetched_bytes: u64,
    /// Extrapolated from the average size of the completed segments
    pub estimated_total_bytes: u64,
    pub elapsed: Duration,
}

impl Progress {
    /// Transfer rate in bytes per second
    pub fn throughput(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.fetched_bytes as f64 / secs
        } else {
            0.0
        }
    }

    /// Estimated remaining time, if anything has been transferred yet
    pub fn eta(&self) -> Option<Duration> {
        let throughput = self.throughput();
        if throughput <= 0.0 {
            return None;
        }

        let remaining = self.estimated_total_bytes.saturating_sub(self.bytes);
        Some(Duration::from_secs_f64(remaining as f64 / throughput))
    }

    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            100.0
        } else {
            self.completed as f64 * 100.0 / self.total as f64
        }
    }
}

/// Receives a [`Progress`] in completion order.
///
/// Always called from the thread that started the download.
pub trait ProgressReporter {
    fn report(&mut self, progress: &Progress);
}

impl<F: FnMut(&Progress)> ProgressReporter for F {
    fn report(&mut self, progress: &Progress) {
        self(progress)
    }
}

/// Log the progress every few percents
#[derive(Debug, Default)]
pub struct LogProgress {
    last_step: Option<u64>,
}

impl LogProgress {
    const STEP_PERCENT: f64 = 10.0;

    pub fn new() -> Self {
        Self::default()
    }
}

impl ProgressReporter for LogProgress {
    fn report(&mut self, progress: &Progress) {
        let step = (progress.percent() / Self::STEP_PERCENT) as u64;
        if self.last_step == Some(step) && progress.completed != progress.total {
            return;
        }
        self.last_step = Some(step);

        let eta = progress
            .eta()
            .map_or_else(|| "?".to_owned(), |eta| format!("{}s", eta.as_secs()));
        info!(
            "{}/{} segments ({:.0}%), {:.1}/~{:.1} MiB, {:.2} MiB/s, ETA {eta}",
            progress.completed,
            progress.total,
            progress.percent(),
            mib(progress.bytes),
            mib(progress.estimated_total_bytes),
            progress.throughput() / MIB,
        );
    }
}

const MIB: f64 = 1024.0 * 1024.0;

fn mib(bytes: u64) -> f64 {
    bytes as f64 / MIB
}

/// Running totals of one download, owned by the aggregating thread
#[derive(Debug)]
pub(crate) struct ProgressTracker {
    started: Instant,
    total: usize,
    completed: usize,
    skipped: usize,
    bytes: u64,
    fetched_bytes: u64,
}

impl ProgressTracker {
    pub fn new(total: usize) -> Self {
        Self {
            started: Instant::now(),
            total,
            completed: 0,
            skipped: 0,
            bytes: 0,
            fetched_bytes: 0,
        }
    }

    pub fn record(&mut self, bytes: u64, skipped: bool) -> Progress {
        let elapsed = self.started.elapsed();
        self.record_at(bytes, skipped, elapsed)
    }

    fn record_at(&mut self, bytes: u64, skipped: bool, elapsed: Duration) -> Progress {
        self.completed += 1;
        self.bytes += bytes;
        if skipped {
            self.skipped += 1;
        } else {
            self.fetched_bytes += bytes;
        }

        let average = self.bytes / self.completed as u64;
        Progress {
            completed: self.completed,
            total: self.total,
            skipped: self.skipped,
            bytes: self.bytes,
            fetched_bytes: self.fetched_bytes,
            estimated_total_bytes: (average * self.total as u64).max(self.bytes),
            elapsed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn estimate_extrapolates_average() {
        let mut tracker = ProgressTracker::new(10);
        tracker.record_at(100, false, Duration::from_secs(1));
        let progress = tracker.record_at(300, false, Duration::from_secs(2));

        assert_eq!(progress.completed, 2);
        assert_eq!(progress.bytes, 400);
        assert_eq!(progress.estimated_total_bytes, 2000);
        assert_eq!(progress.throughput(), 200.0);
        assert_eq!(progress.eta(), Some(Duration::from_secs(8)));
    }

    #[test]
    fn skipped_segments_do_not_count_as_throughput() {
        let mut tracker = ProgressTracker::new(2);
        let progress = tracker.record_at(1000, true, Duration::from_secs(1));

        assert_eq!(progress.skipped, 1);
        assert_eq!(progress.fetched_bytes, 0);
        assert_eq!(progress.throughput(), 0.0);
        assert_eq!(progress.eta(), None);
    }

    #[test]
    fn closures_are_reporters() {
        let mut seen = Vec::new();
        {
            let mut reporter = |p: &Progress| seen.push(p.completed);
            let mut tracker = ProgressTracker::new(2);
            reporter.report(&tracker.record(1, false));
            reporter.report(&tracker.record(1, false));
        }
        assert_eq!(seen, [1, 2]);
    }
}
