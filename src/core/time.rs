//! Frame timing and averaged measurements

use std::time::{Duration, Instant};

/// Number of samples the demo averages timings over before reporting
pub const AVERAGE_WINDOW: usize = 180;

/// Accumulates samples and yields their mean once a full window is collected.
///
/// The window then restarts, so reported values are block averages rather
/// than a sliding mean.
#[derive(Debug, Clone)]
pub struct BlockAverage {
    window: usize,
    sum: f64,
    count: usize,
    last: Option<f64>,
}

impl BlockAverage {
    pub fn new(window: usize) -> Self {
        Self {
            window: window.max(1),
            sum: 0.0,
            count: 0,
            last: None,
        }
    }

    /// Add a sample. Returns the block mean when this sample completes a window.
    pub fn push(&mut self, sample: f64) -> Option<f64> {
        self.sum += sample;
        self.count += 1;
        if self.count < self.window {
            return None;
        }
        let mean = self.sum / self.count as f64;
        self.sum = 0.0;
        self.count = 0;
        self.last = Some(mean);
        Some(mean)
    }

    /// Most recent completed block mean
    pub fn last(&self) -> Option<f64> {
        self.last
    }
}

/// FPS summary reported over the debug channel
#[derive(Debug, Clone, Copy, Default, serde::Serialize, serde::Deserialize)]
pub struct FpsStats {
    pub current_fps: f32,
    /// Mean frame time in milliseconds over the last completed block
    pub avg_frame_ms: f32,
    pub frame_count: u64,
    pub elapsed_secs: f32,
}

/// Tracks frame timing and calculates FPS
pub struct FrameTimer {
    start: Instant,
    last_frame: Instant,
    delta: Duration,
    frame_count: u64,
    frame_ms: BlockAverage,
}

impl FrameTimer {
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            start: now,
            last_frame: now,
            delta: Duration::ZERO,
            frame_count: 0,
            frame_ms: BlockAverage::new(AVERAGE_WINDOW),
        }
    }

    /// Call once per frame to update timing
    pub fn tick(&mut self) {
        let now = Instant::now();
        self.delta = now - self.last_frame;
        self.last_frame = now;
        self.frame_count += 1;
        if let Some(avg) = self.frame_ms.push(self.delta.as_secs_f64() * 1000.0) {
            log::debug!("frame time {:.3} ms (avg of {} frames)", avg, AVERAGE_WINDOW);
        }
    }

    /// Delta time in seconds
    pub fn delta_secs(&self) -> f32 {
        self.delta.as_secs_f32()
    }

    /// Seconds since the timer was created, drives the camera sweeps
    pub fn elapsed_secs(&self) -> f32 {
        (self.last_frame - self.start).as_secs_f32()
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub fn fps_stats(&self) -> FpsStats {
        let avg_frame_ms = self.frame_ms.last().unwrap_or(0.0) as f32;
        let delta = self.delta_secs();
        FpsStats {
            current_fps: if delta > 0.0 { 1.0 / delta } else { 0.0 },
            avg_frame_ms,
            frame_count: self.frame_count,
            elapsed_secs: self.elapsed_secs(),
        }
    }
}

impl Default for FrameTimer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_average_reports_once_per_window() {
        let mut avg = BlockAverage::new(3);
        assert_eq!(avg.push(1.0), None);
        assert_eq!(avg.push(2.0), None);
        assert_eq!(avg.push(3.0), Some(2.0));
        assert_eq!(avg.last(), Some(2.0));

        // Next block starts fresh
        assert_eq!(avg.push(10.0), None);
        assert_eq!(avg.push(10.0), None);
        assert_eq!(avg.push(10.0), Some(10.0));
    }

    #[test]
    fn test_zero_window_acts_as_one() {
        let mut avg = BlockAverage::new(0);
        assert_eq!(avg.push(4.0), Some(4.0));
    }

    #[test]
    fn test_timer_counts_frames() {
        let mut timer = FrameTimer::new();
        timer.tick();
        timer.tick();
        assert_eq!(timer.frame_count(), 2);
        assert!(timer.elapsed_secs() >= 0.0);
    }
}
