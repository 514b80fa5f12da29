use std::collections::BTreeMap;

use serde::Serialize;

/// One subsystem's slice of the current frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubsystemTimer {
    pub name: String,
    pub start: f64,
    pub duration: Option<f64>,
    pub exceeded: Option<bool>,
}

impl SubsystemTimer {
    pub fn start(name: &str, now: f64) -> Self {
        Self {
            name: name.to_string(),
            start: now,
            duration: None,
            exceeded: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.duration.is_none()
    }
}

/// Result of closing a subsystem timer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubsystemReport {
    pub name: String,
    pub duration: f64,
    pub budget: f64,
    pub exceeded: bool,
    /// `min(1, budget / duration)`; 1 for an instantaneous slice.
    pub efficiency: f64,
}

impl SubsystemReport {
    pub fn new(name: &str, duration: f64, budget: f64) -> Self {
        let efficiency = if duration > 0.0 {
            (budget / duration).min(1.0)
        } else {
            1.0
        };
        Self {
            name: name.to_string(),
            duration,
            budget,
            exceeded: duration > budget,
            efficiency,
        }
    }
}

/// Timers for the current frame, keyed by subsystem name.
#[derive(Debug, Clone, Default)]
pub struct FrameTimers {
    timers: BTreeMap<String, SubsystemTimer>,
}

impl FrameTimers {
    /// Start `name`. Returns true if a timer for `name` already existed this
    /// frame and was overwritten.
    pub fn begin(&mut self, name: &str, now: f64) -> (SubsystemTimer, bool) {
        let timer = SubsystemTimer::start(name, now);
        let replaced = self.timers.insert(name.to_string(), timer.clone()).is_some();
        (timer, replaced)
    }

    /// Close `name` and build its report. `None` if it never started or was
    /// already closed.
    pub fn end(&mut self, name: &str, now: f64, budget: f64) -> Option<SubsystemReport> {
        let timer = self.timers.get_mut(name).filter(|t| t.is_running())?;
        let duration = (now - timer.start).max(0.0);
        let report = SubsystemReport::new(name, duration, budget);
        timer.duration = Some(report.duration);
        timer.exceeded = Some(report.exceeded);
        Some(report)
    }

    pub fn get(&self, name: &str) -> Option<&SubsystemTimer> {
        self.timers.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &SubsystemTimer> {
        self.timers.values()
    }

    pub fn clear(&mut self) {
        self.timers.clear();
    }

    pub fn len(&self) -> usize {
        self.timers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }
}
