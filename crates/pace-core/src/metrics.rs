//! Rolling frame-time statistics.

use serde::Serialize;

/// Fixed-size ring of recent frame durations plus lifetime counters.
///
/// `average` and `stddev` cover only the filled part of the ring, so the
/// first few frames are not diluted by empty slots. Before the first
/// measured frame the average reads as the nominal period.
#[derive(Debug, Clone)]
pub struct FrameMetrics {
    ring: Vec<f64>,
    index: usize,
    filled: usize,
    average: f64,
    stddev: f64,
    current_rate: f64,
    last_duration: Option<f64>,
    total_frames: u64,
    dropped_frames: u64,
}

/// Copyable view of [`FrameMetrics`] for reports.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub average: f64,
    pub stddev: f64,
    pub current_rate: f64,
    pub last_duration: Option<f64>,
    pub total_frames: u64,
    pub dropped_frames: u64,
}

impl FrameMetrics {
    pub fn new(ring_size: usize, nominal_period: f64) -> Self {
        Self {
            ring: vec![0.0; ring_size.max(1)],
            index: 0,
            filled: 0,
            average: nominal_period,
            stddev: 0.0,
            current_rate: 1000.0 / nominal_period,
            last_duration: None,
            total_frames: 0,
            dropped_frames: 0,
        }
    }

    /// Record one frame duration. `dropped` is decided by the caller since
    /// it depends on the current target period.
    pub fn record(&mut self, duration_ms: f64, dropped: bool) {
        self.ring[self.index] = duration_ms;
        self.index = (self.index + 1) % self.ring.len();
        self.filled = (self.filled + 1).min(self.ring.len());
        self.total_frames += 1;
        if dropped {
            self.dropped_frames += 1;
        }
        self.last_duration = Some(duration_ms);
        self.recompute();
    }

    fn recompute(&mut self) {
        let window = self.window();
        let n = window.len() as f64;
        let mean = window.iter().sum::<f64>() / n;
        let variance = window.iter().map(|d| (d - mean).powi(2)).sum::<f64>() / n;
        self.average = mean;
        self.stddev = variance.sqrt();
        self.current_rate = if mean > 0.0 { 1000.0 / mean } else { 0.0 };
    }

    /// Filled samples in slot order (not chronological once wrapped).
    pub fn window(&self) -> &[f64] {
        &self.ring[..self.filled]
    }

    pub fn average(&self) -> f64 {
        self.average
    }

    pub fn stddev(&self) -> f64 {
        self.stddev
    }

    pub fn current_rate(&self) -> f64 {
        self.current_rate
    }

    pub fn last_duration(&self) -> Option<f64> {
        self.last_duration
    }

    pub fn total_frames(&self) -> u64 {
        self.total_frames
    }

    pub fn dropped_frames(&self) -> u64 {
        self.dropped_frames
    }

    pub fn capacity(&self) -> usize {
        self.ring.len()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            average: self.average,
            stddev: self.stddev,
            current_rate: self.current_rate,
            last_duration: self.last_duration,
            total_frames: self.total_frames,
            dropped_frames: self.dropped_frames,
        }
    }
}
