use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::{Duration, Instant};

/// Progress record of one batch run
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchRun {
    /// Entries captured when the run started
    pub total_count: usize,
    /// Entries finished so far, successful or not
    pub completed_count: usize,
    /// Whether the run is in progress
    pub running: bool,
    /// When the run started; cleared on stop
    pub started_at: Option<DateTime<Utc>>,
    /// Estimated time left, recomputed after every finished entry
    pub estimated_remaining: Option<Duration>,
    #[serde(skip)]
    started: Option<Instant>,
}

impl BatchRun {
    /// Begin a run over `total_count` entries
    pub fn start(&mut self, total_count: usize) {
        self.total_count = total_count;
        self.completed_count = 0;
        self.running = true;
        self.started_at = Some(Utc::now());
        self.started = Some(Instant::now());
        self.estimated_remaining = None;
    }

    /// Record one finished entry
    pub fn complete(&mut self) {
        self.complete_at(Instant::now());
    }

    fn complete_at(&mut self, now: Instant) {
        self.completed_count = (self.completed_count + 1).min(self.total_count);

        if self.completed_count == 0 {
            return;
        }
        if let Some(started) = self.started {
            let elapsed = now.saturating_duration_since(started);
            let remaining = (self.total_count - self.completed_count) as u32;
            self.estimated_remaining = Some(elapsed / self.completed_count as u32 * remaining);
        }
    }

    /// End the run, keeping the counters
    pub fn stop(&mut self) {
        self.running = false;
        self.started_at = None;
        self.started = None;
        self.estimated_remaining = None;
    }

    /// Fraction done, 0.0 when nothing was captured
    pub fn progress(&self) -> f64 {
        if self.total_count == 0 {
            return 0.0;
        }
        self.completed_count as f64 / self.total_count as f64
    }

    pub fn elapsed(&self) -> Option<Duration> {
        self.started.map(|s| s.elapsed())
    }
}

/// Format a duration as `1m 5s` / `42s`
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    let (minutes, seconds) = (secs / 60, secs % 60);
    if minutes > 0 {
        format!("{}m {}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}
