use std::fmt;
use std::time::{Duration, Instant};
use log::info;

/// Point-in-time progress figures.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressSnapshot {
    pub processed: usize,
    pub total: usize,
    pub elapsed: Duration,
    pub percent: f64,
    /// `None` until at least one record has been processed.
    pub eta: Option<Duration>,
}

impl ProgressSnapshot {
    pub fn compute(processed: usize, total: usize, elapsed: Duration) -> Self {
        let percent = if total == 0 {
            100.0
        } else {
            processed as f64 / total as f64 * 100.0
        };

        let eta = if processed > 0 {
            let remaining = total.saturating_sub(processed);
            let secs = elapsed.as_secs_f64() * remaining as f64 / processed as f64;
            Some(Duration::from_secs_f64(secs))
        } else {
            None
        };

        ProgressSnapshot { processed, total, elapsed, percent, eta }
    }
}

impl fmt::Display for ProgressSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Progress: {}/{} ({:.1}%)", self.processed, self.total, self.percent)?;
        if let Some(eta) = self.eta {
            write!(
                f,
                " | Elapsed: {:.1}m | ETA: {:.1}m",
                minutes(self.elapsed),
                minutes(eta)
            )?;
        }
        Ok(())
    }
}

pub fn minutes(d: Duration) -> f64 {
    d.as_secs_f64() / 60.0
}

/// Tracks run start and logs snapshots against a fixed total.
pub struct ProgressReporter {
    start: Instant,
    total: usize,
}

impl ProgressReporter {
    pub fn start(total: usize) -> Self {
        ProgressReporter { start: Instant::now(), total }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    pub fn snapshot(&self, processed: usize) -> ProgressSnapshot {
        ProgressSnapshot::compute(processed, self.total, self.elapsed())
    }

    pub fn report(&self, processed: usize) -> ProgressSnapshot {
        let snapshot = self.snapshot(processed);
        info!("{}", snapshot);
        snapshot
    }
}
