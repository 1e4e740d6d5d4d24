//! Audio clock sources the cursor tracker samples.

use std::time::Instant;

/// Current playback position of whatever is playing the clip.
#[cfg_attr(test, mockall::automock)]
pub trait AudioClock: Send + Sync {
    /// Seconds since the start of the clip.
    fn current_time(&self) -> f64;
}

/// Monotonic clock that starts at zero when created.
///
/// Stands in for a player's position when the clip is played elsewhere.
#[derive(Debug, Clone)]
pub struct WallClock {
    started: Instant,
}

impl WallClock {
    pub fn start() -> Self {
        Self {
            started: Instant::now(),
        }
    }
}

impl AudioClock for WallClock {
    fn current_time(&self) -> f64 {
        self.started.elapsed().as_secs_f64()
    }
}
