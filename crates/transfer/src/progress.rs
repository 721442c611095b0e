use std::time::Instant;

use artifactdrop_protocol::ProgressSnapshot;

/// Callback invoked with every progress snapshot.
pub type ProgressCallback = Box<dyn Fn(ProgressSnapshot) + Send + Sync>;

/// Turns cumulative byte counts into [`ProgressSnapshot`]s.
///
/// Speed is measured between consecutive notifications only, with no
/// smoothing window: `bytes_since_last / seconds_since_last`. The first
/// notification is measured against the start instant.
#[derive(Debug, Clone)]
pub struct ProgressMeter {
    total: u64,
    last_loaded: u64,
    last_at: Instant,
}

impl ProgressMeter {
    /// Creates a meter for a transfer of `total` bytes starting at `started_at`.
    pub fn new(total: u64, started_at: Instant) -> Self {
        Self {
            total,
            last_loaded: 0,
            last_at: started_at,
        }
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    /// Records that `loaded` bytes (cumulative) have been handed off at `now`.
    pub fn record(&mut self, loaded: u64, now: Instant) -> ProgressSnapshot {
        let elapsed = now.saturating_duration_since(self.last_at).as_secs_f64();
        let delta = loaded.saturating_sub(self.last_loaded);

        // Same timestamp: no meaningful rate for this instant.
        let speed = if elapsed > 0.0 {
            delta as f64 / elapsed
        } else {
            0.0
        };
        let remaining = self.total.saturating_sub(loaded);
        let estimated_time_remaining = if speed > 0.0 {
            remaining as f64 / speed
        } else {
            0.0
        };

        self.last_loaded = loaded;
        self.last_at = now;

        ProgressSnapshot {
            loaded,
            total: self.total,
            percentage: percentage(loaded, self.total),
            speed,
            estimated_time_remaining,
        }
    }
}

/// Floor of `100 * loaded / total`, clamped to 100.
fn percentage(loaded: u64, total: u64) -> u8 {
    if total == 0 {
        return 0;
    }
    let pct = u128::from(loaded.min(total)) * 100 / u128::from(total);
    pct as u8
}
