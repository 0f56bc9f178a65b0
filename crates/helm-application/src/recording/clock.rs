use std::time::Duration;
use tokio::time::Instant;

/// Local elapsed-time clock for a capture session.
///
/// Time only accumulates while the clock runs, so pausing and resuming
/// leaves the reading continuous.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ElapsedClock {
    accumulated: Duration,
    running_since: Option<Instant>,
}

impl ElapsedClock {
    /// Starts (or resumes) the clock. No-op if it is already running.
    pub fn start(&mut self) {
        if self.running_since.is_none() {
            self.running_since = Some(Instant::now());
        }
    }

    /// Freezes the clock at its current reading.
    pub fn pause(&mut self) {
        if let Some(since) = self.running_since.take() {
            self.accumulated += since.elapsed();
        }
    }

    /// Replaces the reading, leaving the clock stopped.
    pub fn reset(&mut self, elapsed: Duration) {
        self.accumulated = elapsed;
        self.running_since = None;
    }

    pub fn is_running(&self) -> bool {
        self.running_since.is_some()
    }

    pub fn elapsed(&self) -> Duration {
        self.accumulated + self.running_since.map_or(Duration::ZERO, |since| since.elapsed())
    }

    pub fn elapsed_seconds(&self) -> u64 {
        self.elapsed().as_secs()
    }
}
