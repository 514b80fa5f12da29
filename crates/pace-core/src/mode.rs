//! Streak counting and the Normal/Emergency state machine.
//!
//! [`StreakTracker::observe`] is fed one band per measured frame and returns
//! at most one [`Decision`]. Applying the decision (moving the quality
//! ladder, rescaling budgets, emitting alerts) is the caller's job.

use serde::Serialize;

use crate::config::StreakConfig;
use crate::frame::PerformanceBand;

/// Operating flags visible to the host.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct ModeFlags {
    pub emergency: bool,
    pub thermal_throttling: bool,
    pub power_save: bool,
    /// Last reported battery level in `[0, 1]`, if any.
    pub battery_level: Option<f64>,
    /// Last reported temperature, if any.
    pub temperature: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Hold,
    StepDown,
    StepUp,
    EnterEmergency,
    ExitEmergency,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StreakTracker {
    limits: StreakConfig,
    poor: u32,
    good: u32,
}

impl StreakTracker {
    pub fn new(limits: StreakConfig) -> Self {
        Self {
            limits,
            poor: 0,
            good: 0,
        }
    }

    pub fn poor_streak(&self) -> u32 {
        self.poor
    }

    pub fn good_streak(&self) -> u32 {
        self.good
    }

    pub fn limits(&self) -> &StreakConfig {
        &self.limits
    }

    pub fn reset(&mut self) {
        self.poor = 0;
        self.good = 0;
    }

    pub fn observe(&mut self, band: PerformanceBand, emergency: bool) -> Decision {
        if band.is_degraded() {
            self.poor += 1;
            self.good = 0;
        } else if band.is_healthy() {
            self.good += 1;
            self.poor = 0;
        } else {
            self.reset();
        }

        if emergency {
            if self.good >= self.limits.exit_emergency {
                self.good = 0;
                return Decision::ExitEmergency;
            }
            return Decision::Hold;
        }

        if self.poor >= self.limits.enter_emergency {
            self.poor = 0;
            return Decision::EnterEmergency;
        }
        if band.is_degraded() {
            return Decision::StepDown;
        }
        if self.good >= self.limits.step_up {
            self.good = 0;
            return Decision::StepUp;
        }
        Decision::Hold
    }
}
