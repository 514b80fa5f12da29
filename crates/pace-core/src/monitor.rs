use std::collections::VecDeque;

use serde::Serialize;

use crate::config::{self, MonitorConfig};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Sample {
    pub timestamp: f64,
    pub rate: f64,
    pub frame_time: f64,
    pub level: f64,
    pub emergency: bool,
    pub thermal: bool,
    pub power_save: bool,
    pub health_score: f64,
}

/// Periodic sampler ticked from the frame loop rather than its own timer.
#[derive(Debug, Clone)]
pub struct Sampler {
    enabled: bool,
    interval_ms: f64,
    max_samples: usize,
    last_sample: Option<f64>,
    samples: VecDeque<Sample>,
}

impl Sampler {
    pub fn new(config: &MonitorConfig) -> Self {
        Self {
            enabled: config.enabled,
            interval_ms: config.interval_ms,
            max_samples: config.max_samples,
            last_sample: None,
            samples: VecDeque::with_capacity(config.max_samples),
        }
    }

    /// Enable sampling with new settings. Existing samples beyond the new
    /// capacity are discarded, oldest first.
    pub fn start(&mut self, interval_ms: f64, max_samples: usize) -> config::Result<()> {
        config::validate_monitoring(interval_ms, max_samples)?;
        self.enabled = true;
        self.interval_ms = interval_ms;
        self.max_samples = max_samples;
        self.last_sample = None;
        while self.samples.len() > max_samples {
            self.samples.pop_front();
        }
        Ok(())
    }

    pub fn stop(&mut self) {
        self.enabled = false;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// True when a sample is due at `now`.
    pub fn due(&self, now: f64) -> bool {
        self.enabled
            && match self.last_sample {
                None => true,
                Some(last) => now - last >= self.interval_ms,
            }
    }

    pub fn record(&mut self, sample: Sample) {
        if self.samples.len() == self.max_samples {
            self.samples.pop_front();
        }
        self.last_sample = Some(sample.timestamp);
        self.samples.push_back(sample);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// The `n` most recent samples, oldest first.
    pub fn recent(&self, n: usize) -> Vec<Sample> {
        let skip = self.samples.len().saturating_sub(n);
        self.samples.iter().skip(skip).copied().collect()
    }
}
